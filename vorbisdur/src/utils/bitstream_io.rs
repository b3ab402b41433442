//! Bitstream reading over in-memory header buffers.
//!
//! Thin wrapper around `bitstream_io::BitReader` providing bounded reads,
//! relative seeking and independent speculative cursors.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

/// MSB-first bit reader over a byte slice.
///
/// Tracks the total bit length so callers can query the exact number of
/// remaining bits, which the setup-header scan depends on.
#[derive(Debug)]
pub struct BsIoSliceReader<'a> {
    bs: BitReader<io::Cursor<&'a [u8]>, BigEndian>,
    buf: &'a [u8],
    len: u64,
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self {
            bs: BitReader::new(io::Cursor::new(buf)),
            buf,
            len: (buf.len() as u64) << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        self.bs.skip(n)
    }

    #[inline(always)]
    pub fn seek(&mut self, offset: i64) -> io::Result<u64> {
        if (offset < 0 && self.position()? as i64 + offset >= 0)
            || (offset >= 0 && self.available()? as i64 >= offset)
        {
            return self.bs.seek_bits(SeekFrom::Current(offset));
        }

        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "seek({}): out of bounds bits at {}",
                offset,
                self.position()?
            ),
        ))
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    /// Independent cursor at the current position over the same slice.
    ///
    /// Reads through the fork never move this reader; the setup-header scan
    /// uses this for its speculative mode-count probe.
    pub fn fork(&mut self) -> io::Result<Self> {
        let pos = self.position()?;
        let mut forked = Self::from_slice(self.buf);
        forked.bs.seek_bits(SeekFrom::Start(pos))?;
        Ok(forked)
    }
}

#[cfg(test)]
mod tests {
    use super::BsIoSliceReader;
    use anyhow::Result;

    #[test]
    fn reads_msb_first() -> Result<()> {
        let mut r = BsIoSliceReader::from_slice(&[0b1010_0110, 0x0F]);

        assert!(r.get()?);
        assert!(!r.get()?);
        assert_eq!(r.get_n::<u32>(6)?, 0b10_0110);
        assert_eq!(r.available()?, 8);
        assert_eq!(r.get_n::<u32>(8)?, 0x0F);
        assert_eq!(r.available()?, 0);

        Ok(())
    }

    #[test]
    fn fork_does_not_disturb_parent() -> Result<()> {
        let mut r = BsIoSliceReader::from_slice(&[0xA5, 0x5A]);
        r.skip_n(4)?;

        let mut probe = r.fork()?;
        assert_eq!(probe.get_n::<u32>(8)?, 0x55);

        assert_eq!(r.position()?, 4);
        assert_eq!(r.get_n::<u32>(8)?, 0x55);

        Ok(())
    }

    #[test]
    fn seek_rejects_out_of_bounds() {
        let mut r = BsIoSliceReader::from_slice(&[0x00]);
        assert!(r.seek(9).is_err());
        assert!(r.seek(-1).is_err());
        assert!(r.seek(8).is_ok());
    }
}
