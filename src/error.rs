//! Error types for reading and writing seismic data files.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataFileError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt record: leading length {leading}, trailing length {trailing}")]
    CorruptRecord { leading: u64, trailing: u64 },

    #[error("unexpected end of input: expected {expected} bytes, got {actual}")]
    UnexpectedEndOfInput { expected: usize, actual: usize },

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("unsupported encoding format: {0}")]
    UnsupportedEncoding(u8),

    #[error("missing channel data: {0}")]
    MissingChannelData(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("blockette 1000 not found")]
    MissingBlockette1000,

    #[error("sample count mismatch: header says {expected}, decoded {actual}")]
    SampleCountMismatch { expected: usize, actual: usize },

    #[error("{field} does not fit in {width} columns: {value:?}")]
    FieldOverflow {
        field: &'static str,
        width: usize,
        value: String,
    },

    #[error("encode error: {0}")]
    EncodeError(String),

    #[error("{dropped} of {total} records could not be written")]
    RecordsDropped { dropped: usize, total: usize },

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DataFileError>;
