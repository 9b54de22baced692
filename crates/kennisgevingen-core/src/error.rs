//! Error types for `kennisgevingen-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("not a valid BSN: {0:?}")]
  InvalidBsn(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
