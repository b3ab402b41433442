//! Vorbis packet duration analysis without decoding.
//!
//! Determines how many decoded samples each compressed Vorbis packet
//! represents, from the two out-of-band header packets plus one byte
//! inspected per packet. Packets are analyzed, never decoded and never
//! modified.
//!
//! ## How it works
//!
//! The identification header yields the stream's two window sizes. The
//! setup header is the hard part: the mode table that maps a packet's mode
//! index to a window size sits at the *end* of a deeply nested
//! variable-length bitstream, so [`structs::setup`] locates it by scanning a
//! byte-reversed copy of the header backwards from its trailing framing bit
//! instead of decoding everything in front of it. After that, each packet's
//! duration is the overlap-halved average of two window sizes.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vorbisdur::process::{extract::Extractor, parse::Parser};
//!
//! let mut extractor = Extractor::default();
//! let mut parser = Parser::new();
//!
//! extractor.push_bytes(&std::fs::read("stream.ogg")?);
//!
//! let mut headers = Vec::new();
//! for packet in extractor.by_ref() {
//!     let packet = packet?;
//!     if headers.len() < 3 {
//!         headers.push(packet);
//!         if headers.len() == 3 {
//!             parser.set_headers(&headers[0].data, &headers[2].data);
//!         }
//!         continue;
//!     }
//!     if let Some(duration) = parser.parse(&packet.data) {
//!         println!("{duration} samples");
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Packet processing pipeline.
///
/// 1. **Extraction** ([`process::extract`]): logical packets out of Ogg
///    pages.
/// 2. **Parsing** ([`process::parse`]): per-packet sample durations from
///    the stream headers.
pub mod process;

/// Structured representations of the Vorbis headers.
///
/// - **Identification** ([`structs::ident`]): window sizes and stream setup
/// - **Setup** ([`structs::setup`]): heuristic mode-table recovery
/// - **Extradata framing** ([`structs::extradata`]): Xiph lacing split
pub mod structs;

/// Supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): bit-level reading
/// - **Error handling** ([`utils::errors`]): error types
pub mod utils;
