//! Error handling.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    #[error("invalid configuration {value:?} for {field:?}")]
    InvalidConfig { field: &'static str, value: String },
}
