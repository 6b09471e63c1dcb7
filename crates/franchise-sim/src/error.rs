use franchise_core::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Codec error: {0}")]
    CodecError(#[from] CodecError),

    #[error("Invalid behavior: {0}")]
    InvalidBehavior(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
