//! Bearer-token access control.
//!
//! Token signatures are verified with a shared HS256 secret; the claims of
//! interest are `scopes` (granted scope set), `appid` (application
//! identity, the owner key for all store queries), `sub`, and `email`.
//!
//! Two rejections are kept distinct: a caller with no establishable
//! identity gets 401 `notAuthenticated`, an identified caller missing the
//! required scope gets 403 `permissionDenied`.

use axum::{
  extract::{FromRequestParts, OriginalUri},
  http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use kennisgevingen_core::store::SubscriptionStore;

use crate::{AppState, problem::Problem};

/// Token verification settings for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  /// HS256 shared secret the tokens are signed with.
  pub token_secret: String,
  /// Scope every endpoint of this API requires.
  pub required_scope: String,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
  #[serde(default)]
  sub:    Option<String>,
  #[serde(default)]
  scopes: Vec<String>,
  #[serde(default)]
  appid:  Option<String>,
  #[serde(default)]
  email:  Option<String>,
}

/// The authenticated, authorized caller. Present in a handler's arguments
/// means both checks passed.
#[derive(Debug, Clone)]
pub struct Caller {
  /// Owner key scoping all subscription queries.
  pub application_id: String,
  /// Display identity for audit lines (`email` claim, or the subject).
  pub user: String,
}

/// Verify credentials directly from headers.
pub fn authorize(
  headers: &HeaderMap,
  config: &AuthConfig,
  instance: &str,
) -> Result<Caller, Problem> {
  let token = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or_else(|| Problem::not_authenticated(instance))?;

  let key = DecodingKey::from_secret(config.token_secret.as_bytes());
  let claims = jsonwebtoken::decode::<TokenClaims>(
    token,
    &key,
    &Validation::new(Algorithm::HS256),
  )
  .map_err(|_| Problem::not_authenticated(instance))?
  .claims;

  // No subject and no scopes at all: not authenticated, as opposed to
  // authenticated with the wrong scopes.
  if claims.sub.is_none() && claims.scopes.is_empty() {
    return Err(Problem::not_authenticated(instance));
  }

  if !claims.scopes.iter().any(|s| s == &config.required_scope) {
    return Err(Problem::permission_denied(instance));
  }

  let user = claims
    .email
    .clone()
    .or_else(|| claims.sub.clone())
    .unwrap_or_default();

  let application_id = claims
    .appid
    .or(claims.sub)
    .ok_or_else(|| Problem::not_authenticated(instance))?;

  Ok(Caller { application_id, user })
}

/// The request path as seen by the client, for `instance` fields.
pub(crate) fn instance_path(parts: &Parts) -> String {
  parts
    .extensions
    .get::<OriginalUri>()
    .map(|uri| uri.0.path().to_owned())
    .unwrap_or_else(|| parts.uri.path().to_owned())
}

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: SubscriptionStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = Problem;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let instance = instance_path(parts);
    authorize(&parts.headers, &state.auth, &instance)
  }
}
