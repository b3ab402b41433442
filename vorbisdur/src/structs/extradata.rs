//! Xiph-laced extradata framing.
//!
//! Containers such as Matroska and FLV carry the three Vorbis headers as a
//! single out-of-band blob: a count byte, 255-terminated lacing sums for the
//! first two header lengths, then the headers back to back. The third length
//! is whatever remains.

use crate::utils::errors::ExtradataError;

/// The three Vorbis headers split out of a laced extradata blob.
///
/// The comment header is carried but never consumed by duration analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XiphExtradata<'a> {
    pub identification: &'a [u8],
    pub comment: &'a [u8],
    pub setup: &'a [u8],
}

impl<'a> XiphExtradata<'a> {
    pub fn split(extradata: &'a [u8]) -> Result<Self, ExtradataError> {
        if extradata.len() < 3 {
            return Err(ExtradataError::TooShort(extradata.len()));
        }

        // Count byte is "number of laced headers minus one"; Vorbis always
        // laces identification and comment ahead of the implicit setup.
        if extradata[0] != 2 {
            return Err(ExtradataError::BadHeaderCount(extradata[0]));
        }

        let mut len = [0usize; 2];
        let mut at = 1;
        for len in &mut len {
            loop {
                if at >= extradata.len() - 1 {
                    return Err(ExtradataError::Corrupt);
                }
                let lace = extradata[at];
                at += 1;
                *len += lace as usize;
                if lace < 255 {
                    break;
                }
            }
        }

        if at + len[0] + len[1] > extradata.len() {
            return Err(ExtradataError::Corrupt);
        }

        let (identification, rest) = extradata[at..].split_at(len[0]);
        let (comment, setup) = rest.split_at(len[1]);

        Ok(Self {
            identification,
            comment,
            setup,
        })
    }
}
