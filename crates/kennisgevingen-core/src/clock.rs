//! Time source abstraction.
//!
//! "Today" decides whether a subscription is active, so every query takes
//! its reference time as an explicit argument instead of reading the wall
//! clock ambiently. Handlers resolve the time once per request through a
//! [`Clock`] and thread it down.

use chrono::{DateTime, NaiveDate, Utc};

/// A source of "now". The service clock runs in UTC.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// The current calendar date as seen by the service.
  fn today(&self) -> NaiveDate { self.now().date_naive() }
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock pinned to a single instant — deterministic tests only.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { self.0 }
}
