//! Error type for `kennisgevingen-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] kennisgevingen_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// `set_end_date` was called with an id that matches no row.
  #[error("subscription not found: {0}")]
  SubscriptionNotFound(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
