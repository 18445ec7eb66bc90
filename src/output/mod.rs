//! Row consumers that write decoded rows somewhere.
use thiserror::Error;

pub mod csv;

/// Errors raised by row writers.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Column '{0}' is not part of the output schema {1:?}")]
    UnexpectedColumn(String, Vec<String>),
}
