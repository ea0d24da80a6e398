use std::io;
use thiserror::Error;

/// Errors that can occur when writing to or reading from slab buffers
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer was closed and no longer accepts writes
    #[error("Buffer is closed")]
    Closed,

    /// IO errors from a sink or a source
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Slab sizes that cannot work together
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Seeking outside of a read view
    #[error("Position {position} is out of bounds for length {len}")]
    OutOfBounds { position: u64, len: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::OutOfBounds { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::other(other),
        }
    }
}
