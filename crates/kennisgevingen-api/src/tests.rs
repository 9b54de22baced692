use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use jsonwebtoken::{EncodingKey, Header};
use tower::ServiceExt as _;

use kennisgevingen_core::{
  Bsn, FixedClock, feed::BsnChange, store::SubscriptionStore as _,
};
use kennisgevingen_store_sqlite::SqliteStore;

use crate::{AppState, ServerConfig, auth::AuthConfig, router};

const SECRET: &str = "test-secret";
const SCOPE: &str = "benk-brp-volgindicaties-api";
const APP: &str = "test-app";
const OTHER_APP: &str = "other-app";

/// The pinned request-processing instant: 2025-06-15T12:00:00Z.
fn now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

fn today() -> NaiveDate {
  NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn bsn(s: &str) -> Bsn {
  Bsn::parse(s).unwrap()
}

async fn make_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState {
    store:  Arc::new(store),
    clock:  Arc::new(FixedClock(now())),
    auth:   Arc::new(AuthConfig {
      token_secret:   SECRET.to_string(),
      required_scope: SCOPE.to_string(),
    }),
    config: Arc::new(ServerConfig {
      host:               "127.0.0.1".to_string(),
      port:               8000,
      store_path:         ":memory:".into(),
      token_secret:       SECRET.to_string(),
      required_scope:     SCOPE.to_string(),
      persons_href:       "/ingeschrevenpersonen/{burgerservicenummer}"
        .to_string(),
      max_einddatum_days: None,
    }),
  }
}

fn token(app_id: &str, scopes: &[&str]) -> String {
  let claims = serde_json::json!({
    "sub":    "test@example.com",
    "appid":  app_id,
    "email":  "test@example.com",
    "scopes": scopes,
    "exp":    Utc::now().timestamp() + 300,
  });
  jsonwebtoken::encode(
    &Header::default(),
    &claims,
    &EncodingKey::from_secret(SECRET.as_bytes()),
  )
  .unwrap()
}

async fn send(
  state: AppState<SqliteStore>,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: &str,
) -> axum::response::Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let req = builder.body(Body::from(body.to_string())).unwrap();
  router(state).oneshot(req).await.unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
  let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

// ── Authentication / authorization ───────────────────────────────────────────

#[tokio::test]
async fn missing_token_yields_401_with_challenge() {
  let state = make_state().await;
  let resp = send(state, "GET", "/volgindicaties", None, "").await;

  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(
    resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
    "Bearer"
  );
  assert_eq!(
    resp.headers().get(header::CONTENT_TYPE).unwrap(),
    "application/problem+json"
  );

  let body = body_json(resp).await;
  assert_eq!(body["code"], "notAuthenticated");
  assert_eq!(body["status"], 401);
  assert_eq!(body["instance"], "/volgindicaties");
}

#[tokio::test]
async fn garbage_token_yields_401() {
  let state = make_state().await;
  let resp =
    send(state, "GET", "/volgindicaties", Some("not-a-jwt"), "").await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_scope_yields_403() {
  let state = make_state().await;
  let token = token(APP, &["some-other-api"]);
  let resp = send(state, "GET", "/volgindicaties", Some(&token), "").await;

  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  let body = body_json(resp).await;
  assert_eq!(body["code"], "permissionDenied");
}

#[tokio::test]
async fn all_responses_carry_api_version_header() {
  let state = make_state().await;
  let resp = send(state, "GET", "/volgindicaties", None, "").await;
  assert_eq!(resp.headers().get("api-version").unwrap(), "1.0.0");
}

// ── Subscriptions: list / get ────────────────────────────────────────────────

#[tokio::test]
async fn empty_store_lists_nothing() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);
  let resp = send(state, "GET", "/volgindicaties", Some(&token), "").await;

  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await, serde_json::json!([]));
}

#[tokio::test]
async fn list_is_scoped_to_the_calling_application() {
  let state = make_state().await;
  state
    .store
    .create_subscription(OTHER_APP, &bsn("999990019"), today(), None, now())
    .await
    .unwrap();

  let token = token(APP, &[SCOPE]);
  let resp = send(state, "GET", "/volgindicaties", Some(&token), "").await;

  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await, serde_json::json!([]));
}

#[tokio::test]
async fn expired_subscription_is_not_listed() {
  let state = make_state().await;
  let store = Arc::clone(&state.store);
  store
    .create_subscription(APP, &bsn("999990019"), date(2025, 1, 1), None, now())
    .await
    .unwrap();
  // Ends today, which already counts as expired.
  let sub = store
    .create_subscription(APP, &bsn("999990093"), date(2025, 1, 1), None, now())
    .await
    .unwrap();
  store.set_end_date(sub.id, Some(today()), now()).await.unwrap();

  let token = token(APP, &[SCOPE]);
  let resp = send(state, "GET", "/volgindicaties", Some(&token), "").await;

  let body = body_json(resp).await;
  let listed: Vec<&str> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|s| s["burgerservicenummer"].as_str().unwrap())
    .collect();
  assert_eq!(listed, vec!["999990019"]);
}

#[tokio::test]
async fn unknown_bsn_is_404() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);
  let resp =
    send(state, "GET", "/volgindicaties/999990019", Some(&token), "").await;

  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  let body = body_json(resp).await;
  assert_eq!(body["code"], "notFound");
  assert_eq!(body["title"], "Opgevraagde resource bestaat niet.");
}

#[tokio::test]
async fn syntactically_invalid_bsn_is_400() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);
  let resp =
    send(state, "GET", "/volgindicaties/123456789", Some(&token), "").await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(body["code"], "parseError");
  assert_eq!(body["title"], "Waarde is geen geldig BSN.");
  assert_eq!(
    body["invalidParams"],
    serde_json::json!([{
      "name":   "burgerservicenummer",
      "code":   "bsn",
      "reason": "Waarde is geen geldig BSN.",
    }])
  );
}

// ── Subscriptions: put ───────────────────────────────────────────────────────

#[tokio::test]
async fn put_creates_a_subscription() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);

  let resp = send(
    state.clone(),
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    r#"{"einddatum": "2025-07-15"}"#,
  )
  .await;

  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = body_json(resp).await;
  assert_eq!(body["burgerservicenummer"], "999990019");
  assert_eq!(body["begindatum"], "2025-06-15");
  assert_eq!(body["einddatum"], "2025-07-15");

  let resp =
    send(state, "GET", "/volgindicaties/999990019", Some(&token), "").await;
  assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn put_without_body_creates_open_ended() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);

  let resp = send(
    state,
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    "",
  )
  .await;

  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = body_json(resp).await;
  // Rendered as an explicit null, not omitted.
  assert!(body.as_object().unwrap().contains_key("einddatum"));
  assert_eq!(body["einddatum"], serde_json::Value::Null);
}

#[tokio::test]
async fn put_with_malformed_einddatum_is_400() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);

  let resp = send(
    state,
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    r#"{"einddatum": "15-06-2025"}"#,
  )
  .await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(body["invalidParams"][0]["name"], "einddatum");
  assert_eq!(
    body["invalidParams"][0]["reason"],
    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD."
  );
}

#[tokio::test]
async fn new_subscription_with_past_einddatum_is_rejected() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);

  let resp = send(
    state.clone(),
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    r#"{"einddatum": "2025-06-01"}"#,
  )
  .await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(body["title"], "Geen correcte waarde opgegeven.");

  // Nothing was created.
  let resp =
    send(state, "GET", "/volgindicaties/999990019", Some(&token), "").await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn same_day_re_put_is_an_update() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);

  let resp = send(
    state.clone(),
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    "",
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let resp = send(
    state,
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    r#"{"einddatum": "2025-08-01"}"#,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await["einddatum"], "2025-08-01");
}

#[tokio::test]
async fn put_einddatum_today_ends_the_subscription() {
  let state = make_state().await;
  state
    .store
    .create_subscription(APP, &bsn("999990019"), date(2025, 1, 1), None, now())
    .await
    .unwrap();
  let token = token(APP, &[SCOPE]);

  let resp = send(
    state.clone(),
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    r#"{"einddatum": "2025-06-15"}"#,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  // The subscription is no longer active.
  let resp =
    send(state, "GET", "/volgindicaties/999990019", Some(&token), "").await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_subscription_can_be_reactivated() {
  let state = make_state().await;
  state
    .store
    .create_subscription(
      APP,
      &bsn("999990019"),
      date(2025, 1, 1),
      Some(date(2025, 2, 1)),
      now(),
    )
    .await
    .unwrap();
  let token = token(APP, &[SCOPE]);

  // The old row is invisible, so the PUT creates a fresh subscription.
  let resp = send(
    state,
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    "",
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  assert_eq!(body_json(resp).await["begindatum"], "2025-06-15");
}

#[tokio::test]
async fn einddatum_horizon_is_enforced_when_configured() {
  let mut state = make_state().await;
  let mut config = (*state.config).clone();
  config.max_einddatum_days = Some(30);
  state.config = Arc::new(config);
  let token = token(APP, &[SCOPE]);

  let resp = send(
    state.clone(),
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    r#"{"einddatum": "2026-01-01"}"#,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(
    body["invalidParams"][0]["reason"],
    "Einddatum mag maximaal 30 dagen in de toekomst liggen."
  );

  // 30 days out exactly is still allowed.
  let resp = send(
    state,
    "PUT",
    "/volgindicaties/999990019",
    Some(&token),
    r#"{"einddatum": "2025-07-15"}"#,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
}

// ── Feeds: parameter validation ──────────────────────────────────────────────

#[tokio::test]
async fn feed_without_vanaf_is_400() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);
  let resp = send(state, "GET", "/wijzigingen", Some(&token), "").await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(
    body["invalidParams"],
    serde_json::json!([{
      "name":   "vanaf",
      "code":   "date",
      "reason": "This field is required.",
    }])
  );
}

#[tokio::test]
async fn feed_vanaf_must_lie_in_the_past() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);

  // Today and the future are both rejected.
  for vanaf in ["2025-06-15", "2025-06-16"] {
    let resp = send(
      state.clone(),
      "GET",
      &format!("/wijzigingen?vanaf={vanaf}"),
      Some(&token),
      "",
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "vanaf {vanaf}");
    let body = body_json(resp).await;
    assert_eq!(
      body["invalidParams"][0]["reason"],
      "Vanaf moet in het verleden liggen."
    );
  }
}

#[tokio::test]
async fn feed_with_unparseable_max_leeftijd_is_400() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);
  let resp = send(
    state,
    "GET",
    "/nieuwe-ingezetenen?vanaf=2025-06-01&maxLeeftijd=abc",
    Some(&token),
    "",
  )
  .await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(body["invalidParams"][0]["name"], "maxLeeftijd");
  assert_eq!(
    body["invalidParams"][0]["reason"],
    "A valid integer is required."
  );
}

#[tokio::test]
async fn feed_with_negative_max_leeftijd_is_400() {
  let state = make_state().await;
  let token = token(APP, &[SCOPE]);
  let resp = send(
    state,
    "GET",
    "/nieuwe-ingezetenen?vanaf=2025-06-01&maxLeeftijd=-3",
    Some(&token),
    "",
  )
  .await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(
    body["invalidParams"][0]["reason"],
    "Max leeftijd moet een positief getal zijn."
  );
}

// ── Feeds: wijzigingen ───────────────────────────────────────────────────────

#[tokio::test]
async fn wijzigingen_lists_followed_bsns_mutated_in_window() {
  let state = make_state().await;
  let store = Arc::clone(&state.store);

  // Followed, mutated inside the window.
  store
    .create_subscription(APP, &bsn("999990019"), date(2025, 1, 1), None, now())
    .await
    .unwrap();
  store
    .record_mutation(
      &bsn("999990019"),
      Some(Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()),
    )
    .await
    .unwrap();

  // Followed, mutated before the window.
  store
    .create_subscription(APP, &bsn("999990093"), date(2025, 1, 1), None, now())
    .await
    .unwrap();
  store
    .record_mutation(
      &bsn("999990093"),
      Some(Utc.with_ymd_and_hms(2025, 5, 20, 8, 0, 0).unwrap()),
    )
    .await
    .unwrap();

  // Mutated in the window, but not followed by this application.
  store
    .create_subscription(OTHER_APP, &bsn("999990147"), date(2025, 1, 1), None, now())
    .await
    .unwrap();
  store
    .record_mutation(
      &bsn("999990147"),
      Some(Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()),
    )
    .await
    .unwrap();

  let token = token(APP, &[SCOPE]);
  let resp = send(
    state,
    "GET",
    "/wijzigingen?vanaf=2025-06-01",
    Some(&token),
    "",
  )
  .await;

  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(
    resp.headers().get(header::CONTENT_TYPE).unwrap(),
    "application/hal+json"
  );

  let body = body_json(resp).await;
  assert_eq!(body["burgerservicenummers"], serde_json::json!(["999990019"]));
  assert_eq!(body["_links"]["self"]["href"], "/wijzigingen?vanaf=2025-06-01");
  assert_eq!(
    body["_links"]["ingeschrevenPersoon"],
    serde_json::json!({
      "href":      "/ingeschrevenpersonen/{burgerservicenummer}",
      "templated": true,
    })
  );
}

// ── Feeds: nieuwe-ingezetenen ────────────────────────────────────────────────

#[tokio::test]
async fn nieuwe_ingezetenen_applies_the_age_filter() {
  let state = make_state().await;
  let store = Arc::clone(&state.store);
  let inserted = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();

  // Ten years old on the vanaf date.
  store
    .add_new_resident(
      &bsn("999990019"),
      Some(Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap()),
      Some(inserted),
    )
    .await
    .unwrap();
  // Twenty years old.
  store
    .add_new_resident(
      &bsn("999990093"),
      Some(Utc.with_ymd_and_hms(2005, 3, 1, 0, 0, 0).unwrap()),
      Some(inserted),
    )
    .await
    .unwrap();
  // Registered before the window.
  store
    .add_new_resident(
      &bsn("999990147"),
      Some(Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap()),
      Some(Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()),
    )
    .await
    .unwrap();

  let token = token(APP, &[SCOPE]);
  let resp = send(
    state.clone(),
    "GET",
    "/nieuwe-ingezetenen?vanaf=2025-06-01&maxLeeftijd=15",
    Some(&token),
    "",
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["burgerservicenummers"], serde_json::json!(["999990019"]));

  // Without the filter, both in-window residents appear.
  let resp = send(
    state,
    "GET",
    "/nieuwe-ingezetenen?vanaf=2025-06-01",
    Some(&token),
    "",
  )
  .await;
  let body = body_json(resp).await;
  assert_eq!(
    body["burgerservicenummers"],
    serde_json::json!(["999990019", "999990093"])
  );
}

#[tokio::test]
async fn nieuwe_ingezetenen_tolerates_an_enormous_max_leeftijd() {
  let state = make_state().await;
  let store = Arc::clone(&state.store);
  let inserted = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();

  store
    .add_new_resident(
      &bsn("999990019"),
      Some(Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap()),
      Some(inserted),
    )
    .await
    .unwrap();
  store
    .add_new_resident(
      &bsn("999990093"),
      Some(Utc.with_ymd_and_hms(2005, 3, 1, 0, 0, 0).unwrap()),
      Some(inserted),
    )
    .await
    .unwrap();

  // Values past i32 and past u32 are still just a very permissive filter.
  let token = token(APP, &[SCOPE]);
  for max in ["2147483648", "4294967295", "99999999999"] {
    let resp = send(
      state.clone(),
      "GET",
      &format!("/nieuwe-ingezetenen?vanaf=2025-06-01&maxLeeftijd={max}"),
      Some(&token),
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK, "maxLeeftijd {max}");
    let body = body_json(resp).await;
    assert_eq!(
      body["burgerservicenummers"],
      serde_json::json!(["999990019", "999990093"])
    );
  }
}

// ── Feeds: bsn-wijzigingen ───────────────────────────────────────────────────

#[tokio::test]
async fn bsn_wijzigingen_is_scoped_and_renders_unresolved_as_empty() {
  let state = make_state().await;
  let store = Arc::clone(&state.store);
  let inserted = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();
  let valid_from = Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).unwrap();

  store
    .add_bsn_change(BsnChange {
      application_id: APP.to_string(),
      old_bsn:        bsn("999990019"),
      new_bsn:        None,
      inserted_at:    Some(inserted),
      valid_from:     Some(valid_from),
    })
    .await
    .unwrap();
  store
    .add_bsn_change(BsnChange {
      application_id: OTHER_APP.to_string(),
      old_bsn:        bsn("999990093"),
      new_bsn:        Some(bsn("999990147")),
      inserted_at:    Some(inserted),
      valid_from:     Some(valid_from),
    })
    .await
    .unwrap();

  let token = token(APP, &[SCOPE]);
  let resp = send(
    state,
    "GET",
    "/bsn-wijzigingen?vanaf=2025-06-01",
    Some(&token),
    "",
  )
  .await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  let changes = body["bsnWijzigingen"].as_array().unwrap();
  assert_eq!(changes.len(), 1);
  assert_eq!(changes[0]["oudBsn"], "999990019");
  assert_eq!(changes[0]["nieuwBsn"], "");
  assert!(changes[0]["wijzigingsdatum"].as_str().is_some());
}
