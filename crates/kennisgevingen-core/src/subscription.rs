//! Subscription — one application's interest in one BSN over a date range.
//!
//! A subscription is never hard-deleted: ending one means writing an
//! `end_date` in the past, which drops it out of the *active* view. A
//! lapsed subscription that restarts gets a fresh row (the uniqueness key
//! includes `start_date`), so reactivation never collides with history.

use chrono::{DateTime, NaiveDate, Utc};

use crate::bsn::Bsn;

/// A volgindicatie row.
///
/// Visibility rules, evaluated against an explicit `today`:
/// - *active*: `end_date` is null or strictly after today. A subscription
///   ending today is already out of the active view.
/// - *updatable*: active, plus rows whose `start_date` is today. A
///   subscription created and re-PUT on the same day must resolve to an
///   update, not a duplicate create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
  pub id:             i64,
  pub application_id: String,
  pub bsn:            Bsn,
  pub start_date:     NaiveDate,
  pub end_date:       Option<NaiveDate>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl Subscription {
  pub fn is_active(&self, today: NaiveDate) -> bool {
    match self.end_date {
      None => true,
      Some(end) => end > today,
    }
  }

  pub fn is_updatable(&self, today: NaiveDate) -> bool {
    self.is_active(today) || self.start_date == today
  }
}
