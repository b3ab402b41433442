//! Setup header analysis: locating the mode table without decoding.
//!
//! A Vorbis setup header is a deeply nested variable-length bitstream
//! (codebooks, floors, residues, mappings, then modes); walking it forward
//! would need most of a decoder. The mode table sits at the very end though,
//! just before the trailing framing bit, and every mode descriptor has a
//! rigid shape. So the header is scanned from its end instead: the buffer is
//! copied with its byte order reversed and read forward, anchoring on the
//! framing bit and pattern-matching mode descriptors until a plausible
//! "number of modes" field confirms the table.
//!
//! The byte-order-only reversal is not a bit-exact stream inverse; it lines
//! up with the byte-aligned fields this scan inspects and matches observed
//! encoder output, so it must be kept as-is.

use anyhow::{Result, bail};
use log::warn;

use crate::structs::VORBIS_SIGNATURE;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::HeaderError;

/// Packet-type tag of the setup header.
pub const PACKET_TYPE_SETUP: u8 = 5;

/// Hard protocol ceiling on the number of modes per stream.
pub const MAX_MODES: usize = 64;

/// Mode table recovered from the setup header.
#[derive(Debug, Clone)]
pub struct SetupHeader {
    /// Number of modes, 1..=64.
    pub mode_count: u32,

    /// Mask isolating the mode-index bits of a packet's first byte.
    ///
    /// The index occupies bits 1.. of the byte; bit 0 is the audio-packet
    /// marker and must be clear.
    pub mode_mask: u32,

    /// Block size selected by each mode index below `mode_count`.
    pub mode_block_size: [u32; MAX_MODES],
}

impl SetupHeader {
    /// Recovers the mode table from a setup-header packet.
    ///
    /// `block_size` is the short/long pair from the identification header.
    /// Fails with [`HeaderError::InvalidSetupHeader`] when no framing-bit
    /// anchor or no plausible mode table is found; the heuristic can in
    /// principle also false-positive, which is why unusually large tables
    /// are logged.
    pub fn parse(buf: &[u8], block_size: [u32; 2]) -> Result<Self> {
        if buf.len() < 7 {
            bail!(HeaderError::TooShort {
                len: buf.len(),
                need: 7,
            });
        }

        if buf[0] != PACKET_TYPE_SETUP {
            bail!(HeaderError::WrongPacketType {
                expected: PACKET_TYPE_SETUP,
                read: buf[0],
            });
        }

        if &buf[1..7] != VORBIS_SIGNATURE {
            bail!(HeaderError::BadSignature);
        }

        // Byte-order-reversed scratch copy; reading it forward walks the
        // header from its end at byte granularity.
        let rev_buf: Vec<u8> = buf.iter().rev().copied().collect();
        let mut reader = BsIoSliceReader::from_slice(&rev_buf);

        // The trailing framing bit of the header is the first set bit of the
        // reversed stream. Anything below 97 bits cannot hold a mode
        // descriptor plus the count field, so the scan stops there.
        let mut framing_bit_pos = 0;
        while reader.available()? > 97 {
            if reader.get()? {
                framing_bit_pos = reader.position()?;
                break;
            }
        }
        if framing_bit_pos == 0 {
            bail!(HeaderError::InvalidSetupHeader);
        }

        // Match mode descriptors forward from the framing bit. Each one is
        // an 8-bit mapping number (<= 63), two 16-bit fields that are zero
        // in all observed content, and the window flag. After each match,
        // probe whether the next 6 bits read as "number of modes minus one"
        // for the count so far; the last position where that holds is taken
        // as the end of the mode table.
        let mut mode_count: u32 = 0;
        let mut last_mode_count: u32 = 0;
        let mut got_mode_header = false;

        while reader.available()? >= 97 {
            if reader.get_n::<u32>(8)? > 63
                || reader.get_n::<u32>(16)? != 0
                || reader.get_n::<u32>(16)? != 0
            {
                break;
            }
            reader.skip_n(1)?;
            mode_count += 1;
            if mode_count > MAX_MODES as u32 {
                break;
            }

            let mut probe = reader.fork()?;
            if probe.get_n::<u32>(6)? + 1 == mode_count {
                got_mode_header = true;
                last_mode_count = mode_count;
            }
        }

        if !got_mode_header {
            bail!(HeaderError::InvalidSetupHeader);
        }

        // Real-world streams use one or two modes; larger counts are far
        // more likely a false positive of the pattern match than an exotic
        // encoder.
        if last_mode_count > 2 {
            warn!(
                "{last_mode_count} modes found in the setup header; \
                 this is either a false positive or an unknown encoder"
            );
        }

        let mode_count = last_mode_count;

        let index_bits = if mode_count > 1 {
            u32::BITS - (mode_count - 1).leading_zeros()
        } else {
            1
        };
        let mode_mask = ((1u32 << index_bits) - 1) << 1;

        // Second pass: rewind to the framing bit and pull the window flag of
        // each descriptor. The reversed stream lists modes from the highest
        // index down, with the flag 40 bits into each descriptor.
        let mut reader = BsIoSliceReader::from_slice(&rev_buf);
        reader.seek(framing_bit_pos as i64)?;

        let mut mode_block_size = [0u32; MAX_MODES];
        for index in (0..mode_count as usize).rev() {
            reader.seek(40)?;
            mode_block_size[index] = block_size[usize::from(reader.get()?)];
        }

        Ok(Self {
            mode_count,
            mode_mask,
            mode_block_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_MODES, SetupHeader};
    use crate::utils::errors::HeaderError;
    use anyhow::Result;

    const BLOCK_SIZE: [u32; 2] = [64, 512];

    /// Builds a setup header by laying out the byte-reversed stream the
    /// parser actually reads, then un-reversing it.
    ///
    /// Reversed layout: one framing bit, then one 41-bit descriptor per mode
    /// from the highest index down (8 + 16 + 16 zero bits and the window
    /// flag), then the 6-bit mode count minus one. `tail` pads the reversed
    /// stream so the scan's remaining-bit thresholds hold.
    fn synthetic_setup(window_flags_high_to_low: &[bool], tail: &[u8]) -> Vec<u8> {
        let mut bits: Vec<bool> = vec![true];
        for &flag in window_flags_high_to_low {
            bits.extend(std::iter::repeat_n(false, 40));
            bits.push(flag);
        }
        let count = window_flags_high_to_low.len() as u8 - 1;
        for i in (0..6).rev() {
            bits.push(count & (1 << i) != 0);
        }

        let mut rev = Vec::new();
        for chunk in bits.chunks(8) {
            let mut byte = 0u8;
            for (i, &bit) in chunk.iter().enumerate() {
                if bit {
                    byte |= 1 << (7 - i);
                }
            }
            rev.push(byte);
        }
        rev.extend_from_slice(tail);

        let mut buf = vec![5u8];
        buf.extend_from_slice(b"vorbis");
        // Signature bytes land at the end of the reversed stream and double
        // as padding there.
        buf.extend(rev.iter().rev());
        buf
    }

    #[test]
    fn recovers_two_mode_table() -> Result<()> {
        // 160 bits reversed: enough for the 97-bit scan floor, few enough
        // that the match loop ends by running dry instead of mismatching.
        let buf = synthetic_setup(&[true, false], &[]);
        assert_eq!(buf.len(), 19);

        let setup = SetupHeader::parse(&buf, BLOCK_SIZE)?;

        assert_eq!(setup.mode_count, 2);
        assert_eq!(setup.mode_mask, 0b10);
        assert_eq!(setup.mode_block_size[0], 64);
        assert_eq!(setup.mode_block_size[1], 512);

        Ok(())
    }

    #[test]
    fn recovers_single_mode_table() -> Result<()> {
        let buf = synthetic_setup(&[true], &[0; 2]);

        let setup = SetupHeader::parse(&buf, BLOCK_SIZE)?;

        assert_eq!(setup.mode_count, 1);
        assert_eq!(setup.mode_mask, 0b10);
        assert_eq!(setup.mode_block_size[0], 512);
        assert_eq!(setup.mode_block_size[1..], [0; MAX_MODES - 1]);

        Ok(())
    }

    #[test]
    fn rejects_short_buffer() {
        let err = SetupHeader::parse(&[5, b'v', b'o'], BLOCK_SIZE).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::TooShort { len: 3, need: 7 })
        ));
    }

    #[test]
    fn rejects_wrong_packet_type() {
        let mut buf = synthetic_setup(&[true, false], &[]);
        buf[0] = 1;
        let err = SetupHeader::parse(&buf, BLOCK_SIZE).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::WrongPacketType { read: 1, .. })
        ));
    }

    #[test]
    fn rejects_corrupt_signature() {
        let mut buf = synthetic_setup(&[true, false], &[]);
        buf[6] = b'z';
        let err = SetupHeader::parse(&buf, BLOCK_SIZE).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::BadSignature)
        ));
    }

    #[test]
    fn rejects_header_without_framing_bit() {
        // All-zero payload: the scan never finds a set bit before fewer
        // than 97 bits remain.
        let mut buf = vec![5u8];
        buf.extend_from_slice(b"vorbis");
        buf.extend_from_slice(&[0u8; 13]);

        let err = SetupHeader::parse(&buf, BLOCK_SIZE).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::InvalidSetupHeader)
        ));
    }

    #[test]
    fn rejects_header_without_mode_table() {
        // The framing bit is found immediately, but every descriptor probe
        // reads 0xFF > 63 and the match loop breaks with no candidate.
        let mut buf = vec![5u8];
        buf.extend_from_slice(b"vorbis");
        buf.extend_from_slice(&[0xFF; 13]);

        let err = SetupHeader::parse(&buf, BLOCK_SIZE).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::InvalidSetupHeader)
        ));
    }
}
