//! Change-feed window and row types.
//!
//! All three feeds share one shape: "which BSNs changed since `vanaf`?",
//! evaluated over the half-open interval `[vanaf @ midnight, now)`. The
//! exclusive upper bound is the request-processing instant, so a record
//! inserted at exactly that instant lands in the *next* poll, never in two
//! back-to-back polls straddling the insert.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

use crate::bsn::Bsn;

// ─── Window ──────────────────────────────────────────────────────────────────

/// Half-open time window `[from, until)` for feed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedWindow {
  /// Inclusive lower bound.
  pub from:  DateTime<Utc>,
  /// Exclusive upper bound, normally the request-processing time.
  pub until: DateTime<Utc>,
}

impl FeedWindow {
  /// Window from midnight at the start of `vanaf` up to (excluding) `now`.
  pub fn since(vanaf: NaiveDate, now: DateTime<Utc>) -> Self {
    Self {
      from:  vanaf.and_time(NaiveTime::MIN).and_utc(),
      until: now,
    }
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    at >= self.from && at < self.until
  }
}

// ─── New-resident age filter ─────────────────────────────────────────────────

/// The earliest birthdate that still counts as "at most `max_age` whole
/// years old" on `vanaf`. Feb 29 anchors clamp to Feb 28. An age that
/// reaches past the representable calendar saturates to [`NaiveDate::MIN`],
/// which passes every recorded birthdate.
pub fn min_birthdate(vanaf: NaiveDate, max_age: u32) -> NaiveDate {
  let year = i64::from(vanaf.year()) - i64::from(max_age);
  let Ok(year) = i32::try_from(year) else {
    return NaiveDate::MIN;
  };
  NaiveDate::from_ymd_opt(year, vanaf.month(), vanaf.day())
    .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
    .unwrap_or(NaiveDate::MIN)
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A newly registered person, fed in by the external change-detection
/// process. Independent of any subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResident {
  pub bsn:         Bsn,
  pub birthdate:   Option<DateTime<Utc>>,
  pub inserted_at: Option<DateTime<Utc>>,
}

/// A historical BSN renumbering event for one application.
///
/// `new_bsn` is `None` while the renumbering has not yet been resolved to a
/// replacement number; the API surfaces that as an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsnChange {
  pub application_id: String,
  pub old_bsn:        Bsn,
  pub new_bsn:        Option<Bsn>,
  pub inserted_at:    Option<DateTime<Utc>>,
  pub valid_from:     Option<DateTime<Utc>>,
}
