//! Supporting infrastructure.
//!
//! Provides bitstream reading over header buffers and the error types
//! surfaced by header and packet analysis.

pub mod bitstream_io;
pub mod errors;
