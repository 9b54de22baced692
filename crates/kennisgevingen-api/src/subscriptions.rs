//! Handlers for the `/volgindicaties` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/volgindicaties` | active subscriptions for the caller |
//! | `GET`  | `/volgindicaties/{bsn}` | 404 when not active |
//! | `PUT`  | `/volgindicaties/{bsn}` | 201 on create, 200 on update |

use axum::{
  Json,
  body::Bytes,
  extract::{OriginalUri, Path, State},
  http::StatusCode,
};
use chrono::{Days, NaiveDate};
use serde::Serialize;

use kennisgevingen_core::{Bsn, store::SubscriptionStore, subscription::Subscription};

use crate::{
  AppState,
  auth::Caller,
  problem::{InvalidParam, Problem, TITLE_INVALID_BSN, TITLE_INVALID_VALUE},
};

// ─── Resource shape ──────────────────────────────────────────────────────────

/// Wire shape of one subscription. `einddatum` is rendered as `null` for an
/// open-ended subscription, never omitted.
#[derive(Debug, Serialize)]
pub struct SubscriptionResource {
  pub burgerservicenummer: String,
  pub begindatum:          NaiveDate,
  pub einddatum:           Option<NaiveDate>,
}

impl From<Subscription> for SubscriptionResource {
  fn from(sub: Subscription) -> Self {
    Self {
      burgerservicenummer: sub.bsn.as_str().to_owned(),
      begindatum:          sub.start_date,
      einddatum:           sub.end_date,
    }
  }
}

// ─── Parameter validation ────────────────────────────────────────────────────

fn validate_bsn(raw: &str, instance: &str) -> Result<Bsn, Problem> {
  Bsn::parse(raw).map_err(|_| {
    Problem::parse_error(
      instance,
      TITLE_INVALID_BSN,
      vec![InvalidParam::new(
        "burgerservicenummer",
        "bsn",
        "Waarde is geen geldig BSN.",
      )],
    )
  })
}

/// Parse the PUT body: `{}`, `{"einddatum": null}` and an absent body all
/// mean "no end date"; a present `einddatum` must be a `YYYY-MM-DD` string.
fn parse_einddatum(body: &[u8], instance: &str) -> Result<Option<NaiveDate>, Problem> {
  if body.is_empty() {
    return Ok(None);
  }

  let value: serde_json::Value = serde_json::from_slice(body)
    .map_err(|_| Problem::parse_error(instance, TITLE_INVALID_VALUE, vec![]))?;

  let date_problem = || {
    Problem::parse_error(
      instance,
      TITLE_INVALID_VALUE,
      vec![InvalidParam::new(
        "einddatum",
        "date",
        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
      )],
    )
  };

  match value.get("einddatum") {
    None | Some(serde_json::Value::Null) => Ok(None),
    Some(serde_json::Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
      .map(Some)
      .map_err(|_| date_problem()),
    Some(_) => Err(date_problem()),
  }
}

/// Enforce the configured maximum end-date horizon, when one is set.
fn check_einddatum_policy(
  end_date: Option<NaiveDate>,
  today: NaiveDate,
  max_days: Option<i64>,
  instance: &str,
) -> Result<(), Problem> {
  let (Some(end), Some(max_days)) = (end_date, max_days) else {
    return Ok(());
  };

  let horizon = today
    .checked_add_days(Days::new(max_days.max(0) as u64))
    .unwrap_or(today);

  if end > horizon {
    return Err(Problem::parse_error(
      instance,
      TITLE_INVALID_VALUE,
      vec![InvalidParam::new(
        "einddatum",
        "date",
        format!("Einddatum mag maximaal {max_days} dagen in de toekomst liggen."),
      )],
    ));
  }
  Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /volgindicaties`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  OriginalUri(uri): OriginalUri,
) -> Result<Json<Vec<SubscriptionResource>>, Problem>
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subscriptions = state
    .store
    .list_active(&caller.application_id, state.clock.today())
    .await
    .map_err(|e| Problem::from_store_error(e, uri.path()))?;

  Ok(Json(
    subscriptions.into_iter().map(SubscriptionResource::from).collect(),
  ))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /volgindicaties/{bsn}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  OriginalUri(uri): OriginalUri,
  Path(bsn): Path<String>,
) -> Result<Json<SubscriptionResource>, Problem>
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let instance = uri.path();
  let bsn = validate_bsn(&bsn, instance)?;

  let subscription = state
    .store
    .find_subscription(&caller.application_id, &bsn, state.clock.today(), false)
    .await
    .map_err(|e| Problem::from_store_error(e, instance))?
    .ok_or_else(|| Problem::not_found(instance))?;

  Ok(Json(subscription.into()))
}

// ─── Create / update ─────────────────────────────────────────────────────────

/// `PUT /volgindicaties/{bsn}` — body: `{"einddatum": "YYYY-MM-DD"}`
///
/// Creates (201) when the caller has no updatable subscription on the BSN,
/// updates the end date in place (200) when it has. The updatable view
/// includes rows starting today, so a same-day re-PUT is an update.
pub async fn put<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  OriginalUri(uri): OriginalUri,
  Path(bsn): Path<String>,
  body: Bytes,
) -> Result<(StatusCode, Json<SubscriptionResource>), Problem>
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let instance = uri.path();
  let bsn = validate_bsn(&bsn, instance)?;

  let end_date = match parse_einddatum(&body, instance) {
    Ok(end_date) => end_date,
    Err(problem) => {
      tracing::info!(
        target: "audit",
        user = %caller.user,
        bsn = %bsn,
        "access denied for 'update subscription': invalid einddatum"
      );
      return Err(problem);
    }
  };

  let today = state.clock.today();
  let now = state.clock.now();

  check_einddatum_policy(end_date, today, state.config.max_einddatum_days, instance)?;

  let existing = state
    .store
    .find_subscription(&caller.application_id, &bsn, today, true)
    .await
    .map_err(|e| Problem::from_store_error(e, instance))?;

  match existing {
    None => {
      // A brand-new subscription must not be born expired.
      if end_date.is_some_and(|end| end < today) {
        tracing::info!(
          target: "audit",
          user = %caller.user,
          bsn = %bsn,
          "access denied for 'new subscription': einddatum in the past"
        );
        return Err(Problem::parse_error(
          instance,
          TITLE_INVALID_VALUE,
          vec![InvalidParam::new(
            "einddatum",
            "date",
            "Voor een nieuwe volgindicatie kan de einddatum niet in het \
             verleden liggen.",
          )],
        ));
      }

      let created = state
        .store
        .create_subscription(&caller.application_id, &bsn, today, end_date, now)
        .await
        .map_err(|e| Problem::from_store_error(e, instance))?;

      tracing::info!(
        target: "audit",
        user = %caller.user,
        bsn = %bsn,
        "access granted for 'new subscription'"
      );
      Ok((StatusCode::CREATED, Json(created.into())))
    }
    Some(subscription) => {
      let updated = state
        .store
        .set_end_date(subscription.id, end_date, now)
        .await
        .map_err(|e| Problem::from_store_error(e, instance))?;

      tracing::info!(
        target: "audit",
        user = %caller.user,
        bsn = %bsn,
        "access granted for 'update subscription'"
      );
      Ok((StatusCode::OK, Json(updated.into())))
    }
  }
}
