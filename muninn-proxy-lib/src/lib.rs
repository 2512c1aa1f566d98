#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod proxy;
pub mod xcodec;

pub use config::{load_from_path, Config, Mode};
pub use error::{ProxyError, Result};
pub use xcodec::{CodecError, Decoder, Encoder};
