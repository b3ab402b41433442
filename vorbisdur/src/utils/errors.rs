#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("Header is too short: {len} bytes, need at least {need}")]
    TooShort { len: usize, need: usize },

    #[error("Wrong packet type in header: expected {expected}, read {read}")]
    WrongPacketType { expected: u8, read: u8 },

    #[error("Invalid packet signature in header")]
    BadSignature,

    #[error("Missing framing bit at the end of the identification header")]
    MissingFramingBit,

    #[error("Unable to locate the mode table in the setup header")]
    InvalidSetupHeader,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("Invalid packet: bit 0 of the first byte must be clear in audio packets")]
    InvalidPacket,

    #[error("Invalid mode in packet: {mode} >= mode count {mode_count}")]
    InvalidMode { mode: u32, mode_count: u32 },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ExtradataError {
    #[error("Extradata is too short: {0} bytes")]
    TooShort(usize),

    #[error("Extradata must lace exactly 3 headers, count byte reads {0}")]
    BadHeaderCount(u8),

    #[error("Extradata corrupt: laced header sizes exceed the buffer")]
    Corrupt,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Unsupported Ogg stream structure version: {0}")]
    UnsupportedVersion(u8),

    #[error("Page sequence discontinuity: expected {expected}, read {read}")]
    Discontinuity { expected: u32, read: u32 },
}
