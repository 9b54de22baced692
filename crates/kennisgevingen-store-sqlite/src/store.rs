//! [`SqliteStore`] — the SQLite implementation of [`SubscriptionStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::OptionalExtension as _;

use kennisgevingen_core::{
  bsn::Bsn,
  feed::{BsnChange, FeedWindow},
  store::SubscriptionStore,
  subscription::Subscription,
};

use crate::{
  Error, Result,
  encode::{RawBsnChange, RawSubscription, encode_date, encode_dt},
  schema::SCHEMA,
};

const SUBSCRIPTION_COLUMNS: &str =
  "id, application_id, bsn, start_date, end_date, created_at, updated_at";

fn read_subscription_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubscription> {
  Ok(RawSubscription {
    id:             row.get(0)?,
    application_id: row.get(1)?,
    bsn:            row.get(2)?,
    start_date:     row.get(3)?,
    end_date:       row.get(4)?,
    created_at:     row.get(5)?,
    updated_at:     row.get(6)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A kennisgevingen store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_subscription_by_id(&self, id: i64) -> Result<Option<Subscription>> {
    let raw: Option<RawSubscription> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"
              ),
              rusqlite::params![id],
              read_subscription_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubscription::into_subscription).transpose()
  }
}

// ─── SubscriptionStore impl ──────────────────────────────────────────────────

impl SubscriptionStore for SqliteStore {
  type Error = Error;

  // ── Subscriptions ─────────────────────────────────────────────────────────

  async fn list_active(
    &self,
    application_id: &str,
    today: NaiveDate,
  ) -> Result<Vec<Subscription>> {
    let app_id = application_id.to_owned();
    let today_str = encode_date(today);

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
           WHERE application_id = ?1
             AND (end_date IS NULL OR end_date > ?2)
           ORDER BY bsn, start_date"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![app_id, today_str], read_subscription_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawSubscription::into_subscription)
      .collect()
  }

  async fn list_updatable(
    &self,
    application_id: &str,
    today: NaiveDate,
  ) -> Result<Vec<Subscription>> {
    let app_id = application_id.to_owned();
    let today_str = encode_date(today);

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
           WHERE application_id = ?1
             AND (end_date IS NULL OR end_date > ?2 OR start_date = ?2)
           ORDER BY bsn, start_date"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![app_id, today_str], read_subscription_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawSubscription::into_subscription)
      .collect()
  }

  async fn find_subscription(
    &self,
    application_id: &str,
    bsn: &Bsn,
    today: NaiveDate,
    for_update: bool,
  ) -> Result<Option<Subscription>> {
    let app_id = application_id.to_owned();
    let bsn_str = bsn.as_str().to_owned();
    let today_str = encode_date(today);

    // The updatable view also admits rows whose start_date is today, so a
    // subscription created and re-PUT on the same day resolves to an
    // update instead of a duplicate create.
    let visibility = if for_update {
      "(end_date IS NULL OR end_date > ?3 OR start_date = ?3)"
    } else {
      "(end_date IS NULL OR end_date > ?3)"
    };

    let raw: Option<RawSubscription> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
                 WHERE application_id = ?1 AND bsn = ?2 AND {visibility}
                 ORDER BY start_date DESC
                 LIMIT 1"
              ),
              rusqlite::params![app_id, bsn_str, today_str],
              read_subscription_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubscription::into_subscription).transpose()
  }

  async fn create_subscription(
    &self,
    application_id: &str,
    bsn: &Bsn,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    now: DateTime<Utc>,
  ) -> Result<Subscription> {
    let app_id = application_id.to_owned();
    let bsn_str = bsn.as_str().to_owned();
    let start_str = encode_date(start_date);
    let end_str = end_date.map(encode_date);
    let now_str = encode_dt(now);

    let raw: RawSubscription = self
      .conn
      .call(move |conn| {
        // Lazy get-or-create of the mutation record. A racing create hits
        // the unique key and degrades to a no-op, which is the "retry as
        // get" the design calls for.
        conn.execute(
          "INSERT INTO bsn_mutations (bsn, inserted_at) VALUES (?1, NULL)
           ON CONFLICT(bsn) DO NOTHING",
          rusqlite::params![bsn_str],
        )?;

        // Concurrent PUTs for the same key are last-write-wins.
        conn.execute(
          "INSERT INTO subscriptions
             (application_id, bsn, start_date, end_date, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)
           ON CONFLICT(application_id, bsn, start_date) DO UPDATE
             SET end_date = excluded.end_date, updated_at = excluded.updated_at",
          rusqlite::params![app_id, bsn_str, start_str, end_str, now_str],
        )?;

        let raw = conn.query_row(
          &format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE application_id = ?1 AND bsn = ?2 AND start_date = ?3"
          ),
          rusqlite::params![app_id, bsn_str, start_str],
          read_subscription_row,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_subscription()
  }

  async fn set_end_date(
    &self,
    subscription_id: i64,
    end_date: Option<NaiveDate>,
    now: DateTime<Utc>,
  ) -> Result<Subscription> {
    let end_str = end_date.map(encode_date);
    let now_str = encode_dt(now);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subscriptions SET end_date = ?1, updated_at = ?2 WHERE id = ?3",
          rusqlite::params![end_str, now_str, subscription_id],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::SubscriptionNotFound(subscription_id));
    }

    self
      .get_subscription_by_id(subscription_id)
      .await?
      .ok_or(Error::SubscriptionNotFound(subscription_id))
  }

  // ── Change feeds ──────────────────────────────────────────────────────────

  async fn mutated_bsns(
    &self,
    application_id: &str,
    today: NaiveDate,
    window: FeedWindow,
  ) -> Result<Vec<Bsn>> {
    let app_id = application_id.to_owned();
    let today_str = encode_date(today);
    let from_str = encode_dt(window.from);
    let until_str = encode_dt(window.until);

    let bsns: Vec<String> = self
      .conn
      .call(move |conn| {
        // DISTINCT: two overlapping subscriptions on the same BSN must not
        // produce a duplicate entry in the feed.
        let mut stmt = conn.prepare(
          "SELECT DISTINCT m.bsn
           FROM bsn_mutations m
           JOIN subscriptions s ON s.bsn = m.bsn
           WHERE s.application_id = ?1
             AND (s.end_date IS NULL OR s.end_date > ?2)
             AND m.inserted_at IS NOT NULL
             AND m.inserted_at >= ?3
             AND m.inserted_at < ?4
           ORDER BY m.bsn",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![app_id, today_str, from_str, until_str],
            |row| row.get(0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    bsns
      .iter()
      .map(|s| crate::encode::decode_bsn(s))
      .collect()
  }

  async fn new_resident_bsns(
    &self,
    window: FeedWindow,
    min_birthdate: Option<NaiveDate>,
  ) -> Result<Vec<Bsn>> {
    let from_str = encode_dt(window.from);
    let until_str = encode_dt(window.until);
    let min_birth_str = min_birthdate
      .map(|d| encode_dt(d.and_time(NaiveTime::MIN).and_utc()));

    let bsns: Vec<String> = self
      .conn
      .call(move |conn| {
        // `birthdate >= ?3` is NULL-rejecting, so residents without a
        // recorded birthdate drop out exactly when an age filter applies.
        let mut stmt = conn.prepare(
          "SELECT bsn FROM new_residents
           WHERE inserted_at IS NOT NULL
             AND inserted_at >= ?1
             AND inserted_at < ?2
             AND (?3 IS NULL OR birthdate >= ?3)
           ORDER BY bsn",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![from_str, until_str, min_birth_str],
            |row| row.get(0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    bsns
      .iter()
      .map(|s| crate::encode::decode_bsn(s))
      .collect()
  }

  async fn bsn_changes(
    &self,
    application_id: &str,
    window: FeedWindow,
  ) -> Result<Vec<BsnChange>> {
    let app_id = application_id.to_owned();
    let from_str = encode_dt(window.from);
    let until_str = encode_dt(window.until);

    let raws: Vec<RawBsnChange> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT application_id, old_bsn, new_bsn, inserted_at, valid_from
           FROM bsn_changes
           WHERE application_id = ?1
             AND inserted_at IS NOT NULL
             AND inserted_at >= ?2
             AND inserted_at < ?3
           ORDER BY inserted_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![app_id, from_str, until_str], |row| {
            Ok(RawBsnChange {
              application_id: row.get(0)?,
              old_bsn:        row.get(1)?,
              new_bsn:        row.get(2)?,
              inserted_at:    row.get(3)?,
              valid_from:     row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBsnChange::into_change).collect()
  }

  // ── Ingest ────────────────────────────────────────────────────────────────

  async fn record_mutation(
    &self,
    bsn: &Bsn,
    inserted_at: Option<DateTime<Utc>>,
  ) -> Result<()> {
    let bsn_str = bsn.as_str().to_owned();
    let at_str = inserted_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO bsn_mutations (bsn, inserted_at) VALUES (?1, ?2)
           ON CONFLICT(bsn) DO UPDATE SET inserted_at = excluded.inserted_at",
          rusqlite::params![bsn_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_new_resident(
    &self,
    bsn: &Bsn,
    birthdate: Option<DateTime<Utc>>,
    inserted_at: Option<DateTime<Utc>>,
  ) -> Result<()> {
    let bsn_str = bsn.as_str().to_owned();
    let birth_str = birthdate.map(encode_dt);
    let at_str = inserted_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO new_residents (bsn, birthdate, inserted_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(bsn) DO UPDATE
             SET birthdate = excluded.birthdate,
                 inserted_at = excluded.inserted_at",
          rusqlite::params![bsn_str, birth_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_bsn_change(&self, change: BsnChange) -> Result<()> {
    let app_id = change.application_id;
    let old_str = change.old_bsn.as_str().to_owned();
    let new_str = change.new_bsn.map(|b| b.as_str().to_owned());
    let at_str = change.inserted_at.map(encode_dt);
    let valid_str = change.valid_from.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        // An unresolved renumbering may be resolved by a later ingest run.
        conn.execute(
          "INSERT INTO bsn_changes
             (application_id, old_bsn, new_bsn, inserted_at, valid_from)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(old_bsn) DO UPDATE
             SET new_bsn = excluded.new_bsn,
                 inserted_at = excluded.inserted_at,
                 valid_from = excluded.valid_from",
          rusqlite::params![app_id, old_str, new_str, at_str, valid_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
