//! Error types shared across the core crate.

/// Failure while decoding an encoded polyline.
///
/// Offsets are byte positions into the encoded string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Non-ASCII byte 0x{byte:02x} at offset {offset}")]
    NonAscii { offset: usize, byte: u8 },

    #[error("Byte {byte:?} at offset {offset} is outside the polyline alphabet")]
    InvalidByte { offset: usize, byte: char },

    #[error("Polyline ends inside a value starting at offset {offset}")]
    Truncated { offset: usize },

    #[error("Polyline ends after a latitude at offset {offset} with no longitude")]
    MissingLongitude { offset: usize },

    #[error("Value starting at offset {offset} overflows 64 bits")]
    Overflow { offset: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
