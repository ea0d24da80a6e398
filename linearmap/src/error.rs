use thiserror::Error;

/// Errors that can occur when building or reshaping a `LinearMap`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The requested or implied capacity is above `MAX_CAPACITY`
    #[error("Map capacity exceeded: requested {requested}, maximum is {max}")]
    CapacityExceeded { requested: usize, max: usize },

    /// The map does not support the requested conversion
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
