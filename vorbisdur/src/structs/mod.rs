//! Structured representations of the Vorbis header packets.
//!
//! Contains the identification header, the setup-header mode table and the
//! Xiph-laced extradata framing that carries both out-of-band.

pub mod extradata;
pub mod ident;
pub mod setup;

/// Six-byte signature shared by all Vorbis header packets.
pub const VORBIS_SIGNATURE: &[u8; 6] = b"vorbis";
