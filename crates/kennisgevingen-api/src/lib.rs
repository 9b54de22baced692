//! HTTP layer for the BRP kennisgevingen service.
//!
//! Exposes an axum [`Router`] implementing the subscription and
//! change-feed endpoints, backed by any [`SubscriptionStore`].
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/volgindicaties` | active subscriptions of the caller |
//! | GET | `/volgindicaties/{bsn}` | one subscription |
//! | PUT | `/volgindicaties/{bsn}` | create or update a subscription |
//! | GET | `/wijzigingen` | mutated BSNs the caller follows |
//! | GET | `/nieuwe-ingezetenen` | BSNs of newly registered residents |
//! | GET | `/bsn-wijzigingen` | BSN renumbering events for the caller |
//!
//! Errors are RFC 9457 problem documents; see [`problem`].

pub mod auth;
pub mod feeds;
pub mod problem;
pub mod subscriptions;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::{HeaderValue, header},
  routing::get,
};
use serde::Deserialize;
use tower_http::{
  set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use kennisgevingen_core::{clock::Clock, store::SubscriptionStore};

use auth::AuthConfig;

/// Advertised in the `api-version` response header.
pub const API_VERSION: &str = "1.0.0";

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_required_scope() -> String {
  "benk-brp-volgindicaties-api".to_owned()
}

fn default_persons_href() -> String {
  "/ingeschrevenpersonen/{burgerservicenummer}".to_owned()
}

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:         String,
  pub port:         u16,
  pub store_path:   PathBuf,
  pub token_secret: String,
  /// Scope a token must carry to use any endpoint.
  #[serde(default = "default_required_scope")]
  pub required_scope: String,
  /// URI template for the `ingeschrevenPersoon` HAL link.
  #[serde(default = "default_persons_href")]
  pub persons_href: String,
  /// Upper bound on how far `einddatum` may lie in the future, in days.
  /// Unset means no bound.
  #[serde(default)]
  pub max_einddatum_days: Option<i64>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S: SubscriptionStore> {
  pub store:  Arc<S>,
  pub clock:  Arc<dyn Clock>,
  pub auth:   Arc<AuthConfig>,
  pub config: Arc<ServerConfig>,
}

impl<S: SubscriptionStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      clock:  Arc::clone(&self.clock),
      auth:   Arc::clone(&self.auth),
      config: Arc::clone(&self.config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the kennisgevingen API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/volgindicaties", get(subscriptions::list::<S>))
    .route(
      "/volgindicaties/{burgerservicenummer}",
      get(subscriptions::get_one::<S>).put(subscriptions::put::<S>),
    )
    .route("/wijzigingen", get(feeds::updates::<S>))
    .route("/nieuwe-ingezetenen", get(feeds::new_residents::<S>))
    .route("/bsn-wijzigingen", get(feeds::bsn_changes::<S>))
    .layer(SetResponseHeaderLayer::overriding(
      header::HeaderName::from_static("api-version"),
      HeaderValue::from_static(API_VERSION),
    ))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
