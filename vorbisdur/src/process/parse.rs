//! Packet duration tracking.
//!
//! Header parsing runs at most once per stream; afterwards every packet
//! costs a single byte inspection. The parser never decodes audio and never
//! alters packet data.

use anyhow::Result;
use log::error;

use crate::structs::extradata::XiphExtradata;
use crate::structs::ident::IdentificationHeader;
use crate::structs::setup::{MAX_MODES, SetupHeader};
use crate::utils::errors::PacketError;

/// Header-parsing lifecycle of a stream.
///
/// Parsing is attempted at most once; only a successful attempt enables
/// duration computation. Transitions are monotonic:
/// `Unattempted` -> `Invalid` or `Valid`, then fixed for the stream's life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtradataState {
    #[default]
    Unattempted,
    Invalid,
    Valid,
}

/// Per-stream duration-tracking state.
///
/// One instance per logical audio stream, mutated by header parsing (once)
/// and by each packet's duration computation. Streams are independent; run
/// one state per stream with no shared data.
#[derive(Debug)]
pub struct ParserState {
    pub extradata: ExtradataState,

    /// Short and long window sizes from the identification header.
    pub block_size: [u32; 2],

    /// Window size used by the previous packet; seeded from mode 0.
    pub previous_block_size: u32,

    /// Window size mapping for each mode.
    pub mode_block_size: [u32; MAX_MODES],

    /// Number of modes, 1..=64 once valid.
    pub mode_count: u32,

    /// Bitmask extracting the mode index from a packet's first byte.
    pub mode_mask: u32,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            extradata: ExtradataState::Unattempted,
            block_size: [0; 2],
            previous_block_size: 0,
            mode_block_size: [0; MAX_MODES],
            mode_count: 0,
            mode_mask: 0,
        }
    }
}

impl ParserState {
    /// Parses both headers and arms duration computation.
    ///
    /// On any failure the state lands in [`ExtradataState::Invalid`] and
    /// stays there; duration computation remains disabled for the stream.
    pub fn parse_headers(&mut self, id: &[u8], setup: &[u8]) -> Result<()> {
        self.extradata = ExtradataState::Invalid;

        let ident = IdentificationHeader::parse(id)?;
        self.block_size = ident.block_size;

        let setup = SetupHeader::parse(setup, self.block_size)?;
        self.mode_count = setup.mode_count;
        self.mode_mask = setup.mode_mask;
        self.mode_block_size = setup.mode_block_size;

        self.previous_block_size = self.mode_block_size[0];
        self.extradata = ExtradataState::Valid;

        Ok(())
    }

    /// Computes the sample duration of one packet from its first byte.
    ///
    /// Must only be called once headers parsed successfully. A packet's
    /// audible contribution is the average of the previous and current
    /// window sizes halved again for the 50% overlap. On error nothing is
    /// mutated and the packet is still valid data for the caller, it just
    /// gets no duration.
    pub fn packet_duration(&mut self, first_byte: u8) -> Result<u32, PacketError> {
        if first_byte & 1 != 0 {
            return Err(PacketError::InvalidPacket);
        }

        let mode = (u32::from(first_byte) & self.mode_mask) >> 1;
        if mode >= self.mode_count {
            return Err(PacketError::InvalidMode {
                mode,
                mode_count: self.mode_count,
            });
        }

        let current = self.mode_block_size[mode as usize];
        let duration = (self.previous_block_size + current) >> 2;
        self.previous_block_size = current;

        Ok(duration)
    }
}

/// What the headers were supplied as, ahead of the lazy parse.
#[derive(Debug)]
enum HeaderSource {
    Laced(Vec<u8>),
    Split { id: Vec<u8>, setup: Vec<u8> },
}

/// Assigns a sample duration to each packet of one Vorbis stream.
///
/// Supply headers once, either as a laced extradata blob
/// ([`set_extradata`](Self::set_extradata)) or as already-split header
/// packets ([`set_headers`](Self::set_headers)); they are parsed lazily on
/// the first [`parse`](Self::parse) call. Packets flow through unmodified;
/// this is analysis only.
#[derive(Debug, Default)]
pub struct Parser {
    state: ParserState,
    headers: Option<HeaderSource>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the Xiph-laced extradata blob carrying all three headers.
    pub fn set_extradata(&mut self, extradata: &[u8]) {
        self.headers = Some(HeaderSource::Laced(extradata.to_vec()));
    }

    /// Supplies the identification and setup headers directly, for callers
    /// that already demuxed them (the Ogg path). The comment header is not
    /// needed.
    pub fn set_headers(&mut self, id: &[u8], setup: &[u8]) {
        self.headers = Some(HeaderSource::Split {
            id: id.to_vec(),
            setup: setup.to_vec(),
        });
    }

    /// Analyzes one packet and returns its sample duration.
    ///
    /// Returns `None` when headers are missing or invalid, the packet is
    /// empty, or the first byte does not parse as an audio packet; all
    /// failures are logged and none of them invalidate the packet itself.
    pub fn parse(&mut self, packet: &[u8]) -> Option<u32> {
        self.try_headers();

        if self.state.extradata != ExtradataState::Valid || packet.is_empty() {
            return None;
        }

        match self.state.packet_duration(packet[0]) {
            Ok(duration) => Some(duration),
            Err(e) => {
                error!("{e}");
                None
            }
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    fn try_headers(&mut self) {
        if self.state.extradata != ExtradataState::Unattempted {
            return;
        }
        let Some(source) = self.headers.take() else {
            return;
        };

        let result = match &source {
            HeaderSource::Laced(blob) => match XiphExtradata::split(blob) {
                Ok(headers) => self
                    .state
                    .parse_headers(headers.identification, headers.setup),
                Err(e) => {
                    self.state.extradata = ExtradataState::Invalid;
                    Err(e.into())
                }
            },
            HeaderSource::Split { id, setup } => self.state.parse_headers(id, setup),
        };

        if let Err(e) = result {
            error!("Header parsing failed, durations unavailable: {e}");
        }
    }
}
