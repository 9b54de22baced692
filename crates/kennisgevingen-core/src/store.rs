//! The `SubscriptionStore` trait.
//!
//! Implemented by storage backends (e.g. `kennisgevingen-store-sqlite`).
//! The API layer depends on this abstraction, not on any concrete backend.
//!
//! Every method takes its owner key and reference time explicitly; the
//! store never consults the wall clock or any ambient request state. A
//! lookup that matches nothing is a `None`, never an error — store methods
//! fail only on persistence-layer problems.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  bsn::Bsn,
  feed::{BsnChange, FeedWindow},
  subscription::Subscription,
};

/// Abstraction over the subscription/change-feed storage backend.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded async runtime (tokio with axum).
pub trait SubscriptionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subscriptions ─────────────────────────────────────────────────────

  /// All *active* subscriptions for one application: `end_date` null or
  /// strictly after `today`.
  fn list_active<'a>(
    &'a self,
    application_id: &'a str,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + 'a;

  /// The *updatable* superset of the active view: also admits rows whose
  /// `start_date` is today, so a subscription created earlier in the day
  /// can still be updated before it counts as active.
  fn list_updatable<'a>(
    &'a self,
    application_id: &'a str,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + 'a;

  /// Look up one subscription by BSN within the active view, or within the
  /// updatable view when `for_update` is set.
  fn find_subscription<'a>(
    &'a self,
    application_id: &'a str,
    bsn: &'a Bsn,
    today: NaiveDate,
    for_update: bool,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + 'a;

  /// Insert a subscription, lazily creating the BSN mutation record the
  /// first time any subscription references this BSN.
  ///
  /// A concurrent create for the same `(application_id, bsn, start_date)`
  /// resolves last-write-wins rather than erroring.
  fn create_subscription<'a>(
    &'a self,
    application_id: &'a str,
    bsn: &'a Bsn,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + 'a;

  /// Replace the end date of an existing subscription (null clears it) and
  /// bump `updated_at`. Returns the persisted row.
  fn set_end_date(
    &self,
    subscription_id: i64,
    end_date: Option<NaiveDate>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + '_;

  // ── Change feeds ──────────────────────────────────────────────────────

  /// Distinct BSNs with a mutation inside `window`, restricted to the
  /// application's currently-active subscriptions.
  fn mutated_bsns<'a>(
    &'a self,
    application_id: &'a str,
    today: NaiveDate,
    window: FeedWindow,
  ) -> impl Future<Output = Result<Vec<Bsn>, Self::Error>> + Send + 'a;

  /// BSNs of residents registered inside `window`. When `min_birthdate` is
  /// set, residents born before it — or with no recorded birthdate — are
  /// excluded.
  fn new_resident_bsns(
    &self,
    window: FeedWindow,
    min_birthdate: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Vec<Bsn>, Self::Error>> + Send + '_;

  /// BSN renumbering events for one application inside `window`.
  fn bsn_changes<'a>(
    &'a self,
    application_id: &'a str,
    window: FeedWindow,
  ) -> impl Future<Output = Result<Vec<BsnChange>, Self::Error>> + Send + 'a;

  // ── Ingest (external change-detection process) ────────────────────────

  /// Upsert the mutation timestamp for a BSN. The row is created if the
  /// external process gets there before any subscription does.
  fn record_mutation<'a>(
    &'a self,
    bsn: &'a Bsn,
    inserted_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Register a new resident.
  fn add_new_resident<'a>(
    &'a self,
    bsn: &'a Bsn,
    birthdate: Option<DateTime<Utc>>,
    inserted_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Register a BSN renumbering event.
  fn add_bsn_change(
    &self,
    change: BsnChange,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
