use thiserror::Error;

use crate::xcodec::CodecError;

/// Errors that can occur in the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("connection idle for too long")]
    IdleTimeout,
}

pub type Result<T> = std::result::Result<T, ProxyError>;
