//! Handlers for the three change feeds.
//!
//! | Path | Returns |
//! |------|---------|
//! | `/wijzigingen?vanaf=` | BSNs of mutated persons the caller follows |
//! | `/nieuwe-ingezetenen?vanaf=&maxLeeftijd=` | BSNs of new residents |
//! | `/bsn-wijzigingen?vanaf=` | BSN renumbering events for the caller |
//!
//! All three share the `vanaf` window: `[vanaf @ midnight, now)`, lower
//! bound inclusive, upper bound the request-processing instant, exclusive.
//! Responses are HAL envelopes (`application/hal+json`).

use axum::{
  Json,
  extract::{OriginalUri, Query, State},
  http::{Uri, header},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use kennisgevingen_core::{
  feed::{BsnChange, FeedWindow, min_birthdate},
  store::SubscriptionStore,
};

use crate::{
  AppState,
  auth::Caller,
  problem::{InvalidParam, Problem, TITLE_INVALID_VALUE},
};

// ─── HAL envelope ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HalLink {
  pub href: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub templated: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct FeedLinks {
  #[serde(rename = "self")]
  pub self_link: HalLink,
  #[serde(rename = "ingeschrevenPersoon")]
  pub ingeschreven_persoon: HalLink,
}

#[derive(Debug, Serialize)]
pub struct BsnListEnvelope {
  pub burgerservicenummers: Vec<String>,
  #[serde(rename = "_links")]
  pub links: FeedLinks,
}

/// One BSN renumbering event. `nieuwBsn` is `""` while unresolved, never
/// null.
#[derive(Debug, Serialize)]
pub struct BsnChangeResource {
  #[serde(rename = "oudBsn")]
  pub oud_bsn: String,
  #[serde(rename = "nieuwBsn")]
  pub nieuw_bsn: String,
  pub wijzigingsdatum: Option<DateTime<Utc>>,
  pub ingangsdatum: Option<DateTime<Utc>>,
}

impl From<BsnChange> for BsnChangeResource {
  fn from(change: BsnChange) -> Self {
    Self {
      oud_bsn: change.old_bsn.as_str().to_owned(),
      nieuw_bsn: change
        .new_bsn
        .map(|b| b.as_str().to_owned())
        .unwrap_or_default(),
      wijzigingsdatum: change.inserted_at,
      ingangsdatum: change.valid_from,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct BsnChangesEnvelope {
  #[serde(rename = "bsnWijzigingen")]
  pub bsn_wijzigingen: Vec<BsnChangeResource>,
  #[serde(rename = "_links")]
  pub links: FeedLinks,
}

fn feed_links(uri: &Uri, state_persons_href: &str) -> FeedLinks {
  FeedLinks {
    self_link: HalLink {
      href:      uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned()),
      templated: None,
    },
    ingeschreven_persoon: HalLink {
      href:      state_persons_href.to_owned(),
      templated: Some(true),
    },
  }
}

fn hal_response<T: Serialize>(body: T) -> Response {
  (
    [(header::CONTENT_TYPE, "application/hal+json")],
    Json(body),
  )
    .into_response()
}

// ─── Query parameter validation ──────────────────────────────────────────────

/// Raw query parameters; validated by hand so every failure yields a
/// precise `invalidParams` entry.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
  pub vanaf: Option<String>,
  #[serde(rename = "maxLeeftijd")]
  pub max_leeftijd: Option<String>,
}

/// `vanaf` is required, must parse as `YYYY-MM-DD`, and must lie strictly
/// in the past; today is already invalid.
fn validate_vanaf(
  raw: Option<&str>,
  today: NaiveDate,
  instance: &str,
) -> Result<NaiveDate, Problem> {
  let problem = |reason: &str| {
    Problem::parse_error(
      instance,
      TITLE_INVALID_VALUE,
      vec![InvalidParam::new("vanaf", "date", reason)],
    )
  };

  let raw = raw.ok_or_else(|| problem("This field is required."))?;
  let vanaf = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
    problem("Date has wrong format. Use one of these formats instead: YYYY-MM-DD.")
  })?;

  if vanaf >= today {
    return Err(problem("Vanaf moet in het verleden liggen."));
  }
  Ok(vanaf)
}

fn validate_max_leeftijd(
  raw: Option<&str>,
  instance: &str,
) -> Result<Option<u32>, Problem> {
  let problem = |reason: &str| {
    Problem::parse_error(
      instance,
      TITLE_INVALID_VALUE,
      vec![InvalidParam::new("maxLeeftijd", "number", reason)],
    )
  };

  let Some(raw) = raw else { return Ok(None) };
  let age: i64 = raw
    .parse()
    .map_err(|_| problem("A valid integer is required."))?;
  if age < 0 {
    return Err(problem("Max leeftijd moet een positief getal zijn."));
  }
  // Ages beyond u32 saturate; the birthdate floor bottoms out at
  // `NaiveDate::MIN` long before that.
  Ok(Some(u32::try_from(age).unwrap_or(u32::MAX)))
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `GET /wijzigingen?vanaf=YYYY-MM-DD`
pub async fn updates<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  OriginalUri(uri): OriginalUri,
  Query(params): Query<FeedParams>,
) -> Result<Response, Problem>
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let instance = uri.path();
  let today = state.clock.today();
  let vanaf = validate_vanaf(params.vanaf.as_deref(), today, instance)?;
  let window = FeedWindow::since(vanaf, state.clock.now());

  let bsns = state
    .store
    .mutated_bsns(&caller.application_id, today, window)
    .await
    .map_err(|e| Problem::from_store_error(e, instance))?;

  Ok(hal_response(BsnListEnvelope {
    burgerservicenummers: bsns.iter().map(|b| b.as_str().to_owned()).collect(),
    links: feed_links(&uri, &state.config.persons_href),
  }))
}

/// `GET /nieuwe-ingezetenen?vanaf=YYYY-MM-DD[&maxLeeftijd=N]`
pub async fn new_residents<S>(
  State(state): State<AppState<S>>,
  _caller: Caller,
  OriginalUri(uri): OriginalUri,
  Query(params): Query<FeedParams>,
) -> Result<Response, Problem>
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let instance = uri.path();
  let today = state.clock.today();
  let vanaf = validate_vanaf(params.vanaf.as_deref(), today, instance)?;
  let max_age = validate_max_leeftijd(params.max_leeftijd.as_deref(), instance)?;
  let window = FeedWindow::since(vanaf, state.clock.now());

  let bsns = state
    .store
    .new_resident_bsns(window, max_age.map(|age| min_birthdate(vanaf, age)))
    .await
    .map_err(|e| Problem::from_store_error(e, instance))?;

  Ok(hal_response(BsnListEnvelope {
    burgerservicenummers: bsns.iter().map(|b| b.as_str().to_owned()).collect(),
    links: feed_links(&uri, &state.config.persons_href),
  }))
}

/// `GET /bsn-wijzigingen?vanaf=YYYY-MM-DD`
pub async fn bsn_changes<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  OriginalUri(uri): OriginalUri,
  Query(params): Query<FeedParams>,
) -> Result<Response, Problem>
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let instance = uri.path();
  let today = state.clock.today();
  let vanaf = validate_vanaf(params.vanaf.as_deref(), today, instance)?;
  let window = FeedWindow::since(vanaf, state.clock.now());

  let changes = state
    .store
    .bsn_changes(&caller.application_id, window)
    .await
    .map_err(|e| Problem::from_store_error(e, instance))?;

  Ok(hal_response(BsnChangesEnvelope {
    bsn_wijzigingen: changes.into_iter().map(BsnChangeResource::from).collect(),
    links: feed_links(&uri, &state.config.persons_href),
  }))
}
