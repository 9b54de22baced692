//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD`. Timestamps are stored as
//! RFC 3339 UTC with microsecond precision — the fixed width keeps SQL's
//! lexicographic `>=`/`<` comparisons chronologically correct.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use kennisgevingen_core::{
  Bsn,
  feed::BsnChange,
  subscription::Subscription,
};

use crate::{Error, Result};

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── BSN ─────────────────────────────────────────────────────────────────────

pub fn decode_bsn(s: &str) -> Result<Bsn> { Ok(Bsn::parse(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subscriptions` row.
pub struct RawSubscription {
  pub id:             i64,
  pub application_id: String,
  pub bsn:            String,
  pub start_date:     String,
  pub end_date:       Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawSubscription {
  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      id:             self.id,
      application_id: self.application_id,
      bsn:            decode_bsn(&self.bsn)?,
      start_date:     decode_date(&self.start_date)?,
      end_date:       self.end_date.as_deref().map(decode_date).transpose()?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `bsn_changes` row.
pub struct RawBsnChange {
  pub application_id: String,
  pub old_bsn:        String,
  pub new_bsn:        Option<String>,
  pub inserted_at:    Option<String>,
  pub valid_from:     Option<String>,
}

impl RawBsnChange {
  pub fn into_change(self) -> Result<BsnChange> {
    Ok(BsnChange {
      application_id: self.application_id,
      old_bsn:        decode_bsn(&self.old_bsn)?,
      new_bsn:        self.new_bsn.as_deref().map(decode_bsn).transpose()?,
      inserted_at:    self.inserted_at.as_deref().map(decode_dt).transpose()?,
      valid_from:     self.valid_from.as_deref().map(decode_dt).transpose()?,
    })
  }
}
