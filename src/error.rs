use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed trailer: {0}")]
    MalformedTrailer(String),

    #[error("Unsupported trailer encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Offset {offset} is out of bounds (max: {max})")]
    OutOfBounds { offset: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
