//! `application/problem+json` error bodies (RFC 7807).
//!
//! Every error leaves the service through exactly one door: a [`Problem`]
//! built as close to the detection point as possible, rendered once by the
//! [`IntoResponse`] impl. Handlers return `Result<_, Problem>`.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

// ─── Fixed vocabulary ────────────────────────────────────────────────────────

const TYPE_400: &str = "https://datatracker.ietf.org/doc/html/rfc7231#section-6.5.1";
const TYPE_401: &str = "https://datatracker.ietf.org/doc/html/rfc7235#section-3.1";
const TYPE_403: &str = "https://datatracker.ietf.org/doc/html/rfc7231#section-6.5.3";
const TYPE_404: &str = "https://datatracker.ietf.org/doc/html/rfc7231#section-6.5.4";
const TYPE_500: &str = "https://datatracker.ietf.org/doc/html/rfc7231#section-6.6.1";

pub const DETAIL_400: &str =
  "The request could not be understood by the server due to malformed \
   syntax. The client SHOULD NOT repeat the request without modification.";
pub const DETAIL_401: &str =
  "The request requires user authentication. The response MUST include a \
   WWW-Authenticate header field (section 14.47) containing a challenge \
   applicable to the requested resource.";
pub const DETAIL_404: &str =
  "The server has not found anything matching the Request-URI.";

pub const TITLE_INVALID_VALUE: &str = "Geen correcte waarde opgegeven.";
pub const TITLE_INVALID_BSN: &str = "Waarde is geen geldig BSN.";

// ─── Types ───────────────────────────────────────────────────────────────────

/// One offending input parameter inside a 400 response.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidParam {
  pub name:   &'static str,
  pub code:   &'static str,
  pub reason: String,
}

impl InvalidParam {
  pub fn new(name: &'static str, code: &'static str, reason: impl Into<String>) -> Self {
    Self { name, code, reason: reason.into() }
  }
}

/// A problem-detail response body.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{status} {title}")]
pub struct Problem {
  #[serde(rename = "type")]
  pub type_uri: &'static str,
  pub title:    String,
  pub status:   u16,
  pub detail:   String,
  pub code:     &'static str,
  /// The request path the problem occurred on.
  pub instance: String,
  #[serde(rename = "invalidParams", skip_serializing_if = "Option::is_none")]
  pub invalid_params: Option<Vec<InvalidParam>>,
}

impl Problem {
  /// 400 with one or more invalid-parameter entries.
  pub fn parse_error(
    instance: impl Into<String>,
    title: &str,
    invalid_params: Vec<InvalidParam>,
  ) -> Self {
    Self {
      type_uri: TYPE_400,
      title: title.to_owned(),
      status: 400,
      detail: DETAIL_400.to_owned(),
      code: "parseError",
      instance: instance.into(),
      invalid_params: (!invalid_params.is_empty()).then_some(invalid_params),
    }
  }

  /// 401 — no caller identity could be established.
  pub fn not_authenticated(instance: impl Into<String>) -> Self {
    Self {
      type_uri: TYPE_401,
      title: "Authentication credentials were not provided.".to_owned(),
      status: 401,
      detail: DETAIL_401.to_owned(),
      code: "notAuthenticated",
      instance: instance.into(),
      invalid_params: None,
    }
  }

  /// 403 — identified, but missing a required scope.
  pub fn permission_denied(instance: impl Into<String>) -> Self {
    Self {
      type_uri: TYPE_403,
      title: "You do not have permission to perform this action.".to_owned(),
      status: 403,
      detail: String::new(),
      code: "permissionDenied",
      instance: instance.into(),
      invalid_params: None,
    }
  }

  /// 404 — syntactically valid identifier, no matching resource.
  pub fn not_found(instance: impl Into<String>) -> Self {
    Self {
      type_uri: TYPE_404,
      title: "Opgevraagde resource bestaat niet.".to_owned(),
      status: 404,
      detail: DETAIL_404.to_owned(),
      code: "notFound",
      instance: instance.into(),
      invalid_params: None,
    }
  }

  /// 500 — persistence failure, surfaced opaquely.
  pub fn internal(instance: impl Into<String>) -> Self {
    Self {
      type_uri: TYPE_500,
      title: "A server error occurred.".to_owned(),
      status: 500,
      detail: String::new(),
      code: "internal",
      instance: instance.into(),
      invalid_params: None,
    }
  }

  /// Log a store error and fold it into an opaque 500.
  pub fn from_store_error(
    err: impl std::error::Error,
    instance: impl Into<String>,
  ) -> Self {
    let instance = instance.into();
    tracing::error!(error = %err, instance = %instance, "store error");
    Self::internal(instance)
  }
}

impl IntoResponse for Problem {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(self.status)
      .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let unauthorized = status == StatusCode::UNAUTHORIZED;

    let mut res = (
      status,
      [(header::CONTENT_TYPE, "application/problem+json")],
      Json(self),
    )
      .into_response();

    if unauthorized {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
