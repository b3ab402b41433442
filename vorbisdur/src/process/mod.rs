//! Packet processing for Ogg Vorbis streams.
//!
//! 1. **Extraction** ([`extract`]): reassembles logical packets from Ogg
//!    pages fed in as raw bytes.
//! 2. **Parsing** ([`parse`]): assigns a sample duration to each audio
//!    packet from the stream headers, without decoding.

pub mod extract;
pub mod parse;
