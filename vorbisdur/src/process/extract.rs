//! Logical packet extraction from Ogg pages.
//!
//! Feeds on raw file bytes and yields complete Vorbis packets, reassembling
//! payloads across lacing and page boundaries. Page CRCs are not validated;
//! this is an analysis front end, not a decoder, and a bad page is handled
//! by resyncing to the next capture pattern.

use std::collections::VecDeque;

use log::debug;

use crate::utils::errors::ExtractError;

const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
const PAGE_HEADER_LEN: usize = 27;

const FLAG_CONTINUED: u8 = 0x01;
const FLAG_EOS: u8 = 0x04;

/// One logical packet reassembled from page segments.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Vec<u8>,

    /// Granule position of the containing page, attached to the last packet
    /// that completes on that page; -1 for every other packet.
    pub granule_position: i64,

    /// True when the packet completes on an end-of-stream page.
    pub eos: bool,
}

/// Streaming Ogg packet extractor.
///
/// Push raw bytes in any chunking, then drain packets through the
/// [`Iterator`] implementation. `None` from the iterator means more input is
/// needed, not end of stream.
#[derive(Debug, Default)]
pub struct Extractor {
    buffer: VecDeque<u8>,
    ready: VecDeque<Result<Packet, ExtractError>>,
    pending: Vec<u8>,
    drop_continued: bool,
    sequence: Option<u32>,
    pages: usize,
}

impl Extractor {
    /// Adds raw file data to the internal buffer.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Number of complete pages consumed so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Consumes one complete page from the buffer if available.
    ///
    /// Returns false when more input is needed.
    fn process_page(&mut self) -> bool {
        loop {
            let buf = self.buffer.make_contiguous();

            let Some(start) = buf
                .windows(CAPTURE_PATTERN.len())
                .position(|w| w == CAPTURE_PATTERN)
            else {
                // Keep a partial capture pattern at the tail, drop the rest.
                let keep = buf.len().min(CAPTURE_PATTERN.len() - 1);
                let skipped = buf.len() - keep;
                if skipped > 0 {
                    debug!("Skipped {skipped} bytes without a capture pattern");
                    self.buffer.drain(..skipped);
                }
                return false;
            };

            if start > 0 {
                debug!("Skipped {start} bytes to the next capture pattern");
                self.buffer.drain(..start);
                continue;
            }

            if buf.len() < PAGE_HEADER_LEN {
                return false;
            }

            let version = buf[4];
            if version != 0 {
                self.ready
                    .push_back(Err(ExtractError::UnsupportedVersion(version)));
                self.buffer.drain(..CAPTURE_PATTERN.len());
                continue;
            }

            let segments = buf[26] as usize;
            let header_len = PAGE_HEADER_LEN + segments;
            if buf.len() < header_len {
                return false;
            }

            let lacing = buf[PAGE_HEADER_LEN..header_len].to_vec();
            let payload_len: usize = lacing.iter().map(|&l| l as usize).sum();
            if buf.len() < header_len + payload_len {
                return false;
            }

            let flags = buf[5];
            let granule_position = i64::from_le_bytes([
                buf[6], buf[7], buf[8], buf[9], buf[10], buf[11], buf[12], buf[13],
            ]);
            let sequence = u32::from_le_bytes([buf[18], buf[19], buf[20], buf[21]]);
            let payload = buf[header_len..header_len + payload_len].to_vec();

            self.buffer.drain(..header_len + payload_len);
            self.pages += 1;

            self.check_sequence(sequence);
            self.split_page(flags, granule_position, &lacing, &payload);

            return true;
        }
    }

    fn check_sequence(&mut self, sequence: u32) {
        if let Some(prev) = self.sequence {
            let expected = prev.wrapping_add(1);
            if sequence != expected {
                self.ready.push_back(Err(ExtractError::Discontinuity {
                    expected,
                    read: sequence,
                }));
                // Whatever was mid-assembly is lost, and so is any
                // continuation data at the head of this page.
                self.pending.clear();
                self.drop_continued = true;
            }
        }
        self.sequence = Some(sequence);
    }

    fn split_page(&mut self, flags: u8, granule_position: i64, lacing: &[u8], payload: &[u8]) {
        let mut lacing = lacing.iter().copied();
        let mut at = 0usize;

        if flags & FLAG_CONTINUED != 0 {
            if self.drop_continued || self.pending.is_empty() {
                // Continuation of a packet we never saw the start of.
                let mut terminated = false;
                for lace in lacing.by_ref() {
                    at += lace as usize;
                    if lace < 255 {
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    return;
                }
                self.drop_continued = false;
            }
        } else {
            if !self.pending.is_empty() {
                debug!("Unterminated packet abandoned at page boundary");
                self.pending.clear();
            }
            self.drop_continued = false;
        }

        let mut last_completed: Option<usize> = None;
        for lace in lacing {
            self.pending.extend_from_slice(&payload[at..at + lace as usize]);
            at += lace as usize;
            if lace < 255 {
                self.ready.push_back(Ok(Packet {
                    data: std::mem::take(&mut self.pending),
                    granule_position: -1,
                    eos: false,
                }));
                last_completed = Some(self.ready.len() - 1);
            }
        }

        // The page granule position belongs to the last packet completing
        // on it, as does end-of-stream.
        if let Some(index) = last_completed {
            if let Some(Ok(packet)) = self.ready.get_mut(index) {
                packet.granule_position = granule_position;
                packet.eos = flags & FLAG_EOS != 0;
            }
        }
    }
}

impl Iterator for Extractor {
    type Item = Result<Packet, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if !self.process_page() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Extractor, Packet};
    use crate::utils::errors::ExtractError;

    fn page(flags: u8, granule: i64, sequence: u32, lacing: &[u8], payload: &[u8]) -> Vec<u8> {
        assert_eq!(
            payload.len(),
            lacing.iter().map(|&l| l as usize).sum::<usize>()
        );

        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0); // version
        page.push(flags);
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&0x1234_5678u32.to_le_bytes()); // serial
        page.extend_from_slice(&sequence.to_le_bytes());
        page.extend_from_slice(&[0; 4]); // crc, not validated
        page.push(lacing.len() as u8);
        page.extend_from_slice(lacing);
        page.extend_from_slice(payload);
        page
    }

    fn drain(extractor: &mut Extractor) -> Vec<Result<Packet, ExtractError>> {
        extractor.by_ref().collect()
    }

    #[test]
    fn extracts_packets_from_one_page() {
        let mut extractor = Extractor::default();
        extractor.push_bytes(&page(0, 1024, 0, &[2, 3], b"aabbb"));

        let packets = drain(&mut extractor);

        assert_eq!(packets.len(), 2);
        let first = packets[0].as_ref().unwrap();
        assert_eq!(first.data, b"aa");
        assert_eq!(first.granule_position, -1);
        let second = packets[1].as_ref().unwrap();
        assert_eq!(second.data, b"bbb");
        assert_eq!(second.granule_position, 1024);
    }

    #[test]
    fn reassembles_packet_across_pages() {
        let mut extractor = Extractor::default();

        let long = vec![7u8; 255];
        extractor.push_bytes(&page(0, -1, 0, &[255], &long));
        extractor.push_bytes(&page(super::FLAG_CONTINUED | super::FLAG_EOS, 2048, 1, &[3], b"xyz"));

        let packets = drain(&mut extractor);

        assert_eq!(packets.len(), 1);
        let packet = packets[0].as_ref().unwrap();
        assert_eq!(packet.data.len(), 258);
        assert_eq!(&packet.data[255..], b"xyz");
        assert_eq!(packet.granule_position, 2048);
        assert!(packet.eos);
    }

    #[test]
    fn waits_for_more_input_on_partial_page() {
        let mut extractor = Extractor::default();
        let full = page(0, 0, 0, &[4], b"data");

        extractor.push_bytes(&full[..10]);
        assert!(extractor.next().is_none());

        extractor.push_bytes(&full[10..]);
        assert_eq!(extractor.next().unwrap().unwrap().data, b"data");
    }

    #[test]
    fn resyncs_past_garbage() {
        let mut extractor = Extractor::default();
        extractor.push_bytes(b"garbage bytes");
        extractor.push_bytes(&page(0, 0, 0, &[2], b"ok"));

        let packets = drain(&mut extractor);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_ref().unwrap().data, b"ok");
    }

    #[test]
    fn reports_sequence_discontinuity_and_recovers() {
        let mut extractor = Extractor::default();
        extractor.push_bytes(&page(0, -1, 0, &[255], &[1u8; 255]));
        // Page 1 is lost; page 2 starts a fresh packet.
        extractor.push_bytes(&page(0, 4096, 2, &[2], b"ok"));

        let packets = drain(&mut extractor);

        assert_eq!(packets.len(), 2);
        assert_eq!(
            *packets[0].as_ref().unwrap_err(),
            ExtractError::Discontinuity {
                expected: 1,
                read: 2
            }
        );
        assert_eq!(packets[1].as_ref().unwrap().data, b"ok");
    }

    #[test]
    fn durations_flow_from_extracted_packets() {
        use crate::process::parse::Parser;

        // Identification header: 44.1 kHz stereo, block sizes 64/512.
        let mut id = vec![1u8];
        id.extend_from_slice(b"vorbis");
        id.extend_from_slice(&0u32.to_le_bytes());
        id.push(2);
        id.extend_from_slice(&44_100u32.to_le_bytes());
        id.extend_from_slice(&[0; 12]);
        id.extend_from_slice(&[0x96, 0x01]);

        // Setup header with two modes, short then long.
        let mut setup = vec![5u8];
        setup.extend_from_slice(b"vorbis");
        setup.extend_from_slice(&[
            0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x80,
        ]);

        let comment = [3u8; 8];
        let audio = [[0b10u8, 0xAA], [0b00, 0xBB]];

        let mut extractor = Extractor::default();
        extractor.push_bytes(&page(0x02, 0, 0, &[id.len() as u8], &id));
        let mut second = Vec::new();
        second.extend_from_slice(&comment);
        second.extend_from_slice(&setup);
        extractor.push_bytes(&page(
            0,
            0,
            1,
            &[comment.len() as u8, setup.len() as u8],
            &second,
        ));
        let mut third = Vec::new();
        third.extend_from_slice(&audio[0]);
        third.extend_from_slice(&audio[1]);
        extractor.push_bytes(&page(super::FLAG_EOS, 432, 2, &[2, 2], &third));

        let packets: Vec<Packet> = drain(&mut extractor)
            .into_iter()
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(packets.len(), 5);

        let mut parser = Parser::new();
        parser.set_headers(&packets[0].data, &packets[2].data);

        assert_eq!(parser.parse(&packets[3].data), Some((64 + 512) >> 2));
        assert_eq!(parser.parse(&packets[4].data), Some((512 + 64) >> 2));
        assert!(packets[4].eos);
    }

    #[test]
    fn reports_unsupported_version() {
        let mut extractor = Extractor::default();
        let mut bad = page(0, 0, 0, &[1], b"x");
        bad[4] = 1;
        extractor.push_bytes(&bad);

        let packets = drain(&mut extractor);

        assert_eq!(packets.len(), 1);
        assert_eq!(
            *packets[0].as_ref().unwrap_err(),
            ExtractError::UnsupportedVersion(1)
        );
    }
}
