//! The generic HTTP client interface. The core describes each request with
//! [`HttpRequest`] and consumes a typed result from the returned
//! [`HttpResponse`]; timeouts, TLS policy, and connection reuse belong to the
//! implementation.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::error::{MFAError, MFAResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
  Get,
  Post,
  Patch,
  Put,
  Delete,
}

/// A request descriptor. Built by the core, executed by the capability.
#[derive(Clone, Debug)]
pub struct HttpRequest {
  pub method:  HttpMethod,
  pub url:     Url,
  pub headers: Vec<(String, String)>,
  pub body:    Option<Vec<u8>>,
}

impl HttpRequest {
  fn new(method: HttpMethod, url: Url) -> Self {
    Self { method, url, headers: Vec::new(), body: None }
  }

  pub fn get(url: Url) -> Self { Self::new(HttpMethod::Get, url) }

  pub fn post(url: Url) -> Self { Self::new(HttpMethod::Post, url) }

  pub fn patch(url: Url) -> Self { Self::new(HttpMethod::Patch, url) }

  /// Attaches a JSON body and the matching content type.
  pub fn json<T: Serialize>(mut self, body: &T) -> MFAResult<Self> {
    self.headers.push(("Content-Type".to_string(), "application/json".to_string()));
    self.body = Some(serde_json::to_vec(body)?);
    Ok(self)
  }

  pub fn authorization(mut self, value: &str) -> Self {
    self.headers.push(("Authorization".to_string(), value.to_string()));
    self
  }

  /// Header lookup, case-insensitive on the name.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  /// The body decoded as JSON, for implementations (and tests) that need to
  /// inspect what the core sent.
  pub fn body_json(&self) -> MFAResult<serde_json::Value> {
    let body = self.body.as_deref().unwrap_or(b"null");
    Ok(serde_json::from_slice(body)?)
  }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
  pub status: u16,
  pub body:   Vec<u8>,
}

impl HttpResponse {
  pub fn new(status: u16, body: Vec<u8>) -> Self { Self { status, body } }

  pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

  pub fn text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }

  pub fn json<T: DeserializeOwned>(&self) -> MFAResult<T> {
    Ok(serde_json::from_slice(&self.body)?)
  }

  /// Passes 2xx responses through and turns anything else into
  /// [`MFAError::RequestFailed`] carrying the status and a body hint.
  pub fn require_success(self) -> MFAResult<Self> {
    if self.is_success() {
      return Ok(self);
    }
    let body: String = self.text().chars().take(200).collect();
    Err(MFAError::RequestFailed { status: self.status, body })
  }
}

/// One HTTP round-trip. Transport failures map to
/// [`MFAError::UnderlyingError`]; non-2xx responses are returned as-is for the
/// core to interpret.
#[async_trait]
pub trait HttpClient: Send + Sync {
  async fn send(&self, request: HttpRequest) -> MFAResult<HttpResponse>;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn request_builder() {
    let request = HttpRequest::post(Url::parse("https://server/v1.0/endpoint").unwrap())
      .json(&json!({ "code": "abc" }))
      .unwrap()
      .authorization("Bearer token");

    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("Authorization"), Some("Bearer token"));
    assert_eq!(request.body_json().unwrap()["code"], "abc");
  }

  #[test]
  fn require_success_passes_2xx() {
    assert!(HttpResponse::new(204, Vec::new()).require_success().is_ok());
  }

  #[test]
  fn require_success_carries_status_and_hint() {
    let result = HttpResponse::new(503, b"upstream unavailable".to_vec()).require_success();
    match result {
      Err(MFAError::RequestFailed { status, body }) => {
        assert_eq!(status, 503);
        assert_eq!(body, "upstream unavailable");
      },
      other => panic!("unexpected result: {other:?}"),
    }
  }
}
