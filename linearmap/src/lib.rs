mod error;
pub mod map;
pub mod row;
pub mod strategy;
pub use error::{Error, Result};
pub use map::{LinearMap, LOAD_FACTOR, MAX_CAPACITY};
pub use row::Row;
pub use strategy::Strategy;
