//! Scripted capability implementations shared by the integration tests.
#![allow(dead_code)]

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use async_trait::async_trait;
use mfa_client::prelude::*;
use serde_json::Value;
use url::Url;

/// HTTP client that replays a scripted queue of responses and records every
/// request for later assertions.
#[derive(Default)]
pub struct MockHttpClient {
  responses: Mutex<VecDeque<HttpResponse>>,
  requests:  Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  pub fn push_json(&self, status: u16, body: Value) {
    self.responses.lock().unwrap().push_back(HttpResponse::new(status, body.to_string().into()));
  }

  pub fn push_status(&self, status: u16) {
    self.responses.lock().unwrap().push_back(HttpResponse::new(status, Vec::new()));
  }

  pub fn requests(&self) -> Vec<HttpRequest> { self.requests.lock().unwrap().clone() }

  pub fn request(&self, index: usize) -> HttpRequest {
    self.requests.lock().unwrap()[index].clone()
  }

  pub fn request_count(&self) -> usize { self.requests.lock().unwrap().len() }
}

#[async_trait]
impl HttpClient for MockHttpClient {
  async fn send(&self, request: HttpRequest) -> MFAResult<HttpResponse> {
    self.requests.lock().unwrap().push(request);
    self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .ok_or_else(|| MFAError::UnderlyingError("no scripted response left".to_string()))
  }
}

/// Biometry evaluator with a fixed outcome.
pub struct MockBiometry {
  capability_error: Option<String>,
  outcome:          Result<BiometrySubtype, String>,
}

impl MockBiometry {
  pub fn subtype(subtype: BiometrySubtype) -> Arc<Self> {
    Arc::new(Self { capability_error: None, outcome: Ok(subtype) })
  }

  pub fn unavailable(reason: &str) -> Arc<Self> {
    Arc::new(Self { capability_error: Some(reason.to_string()), outcome: Ok(BiometrySubtype::None) })
  }

  pub fn failing(reason: &str) -> Arc<Self> {
    Arc::new(Self { capability_error: None, outcome: Err(reason.to_string()) })
  }
}

#[async_trait]
impl BiometryEvaluator for MockBiometry {
  fn capability(&self) -> Result<(), String> {
    match &self.capability_error {
      Some(reason) => Err(reason.clone()),
      None => Ok(()),
    }
  }

  async fn evaluate(&self, _reason: &str) -> Result<BiometrySubtype, String> {
    self.outcome.clone()
  }
}

/// One recorded OAuth grant.
#[derive(Clone, Debug)]
pub struct GrantRecord {
  pub token_endpoint: Url,
  pub client_id:      String,
  pub subject:        String,
  pub scope:          Vec<String>,
  pub extra:          Vec<(String, String)>,
}

/// OAuth provider returning a fixed token document and recording each grant.
pub struct MockOAuthProvider {
  token:  Value,
  grants: Mutex<Vec<GrantRecord>>,
}

impl MockOAuthProvider {
  pub fn returning(token: Value) -> Arc<Self> {
    Arc::new(Self { token, grants: Mutex::new(Vec::new()) })
  }

  pub fn grants(&self) -> Vec<GrantRecord> { self.grants.lock().unwrap().clone() }

  fn record_and_issue(
    &self,
    token_endpoint: &Url,
    client_id: &str,
    subject: &str,
    scope: &[&str],
    extra: &[(String, String)],
  ) -> MFAResult<OAuthToken> {
    self.grants.lock().unwrap().push(GrantRecord {
      token_endpoint: token_endpoint.clone(),
      client_id:      client_id.to_string(),
      subject:        subject.to_string(),
      scope:          scope.iter().map(|s| s.to_string()).collect(),
      extra:          extra.to_vec(),
    });
    Ok(serde_json::from_value(self.token.clone())?)
  }
}

#[async_trait]
impl OAuthProvider for MockOAuthProvider {
  async fn exchange_code(
    &self,
    token_endpoint: &Url,
    client_id: &str,
    code: &str,
    scope: &[&str],
    extra_parameters: &[(String, String)],
  ) -> MFAResult<OAuthToken> {
    self.record_and_issue(token_endpoint, client_id, code, scope, extra_parameters)
  }

  async fn refresh(
    &self,
    token_endpoint: &Url,
    client_id: &str,
    refresh_token: &str,
    extra_parameters: &[(String, String)],
  ) -> MFAResult<OAuthToken> {
    self.record_and_issue(token_endpoint, client_id, refresh_token, &[], extra_parameters)
  }
}

/// A fully mocked capability set around the given HTTP client.
pub fn capabilities(http: Arc<MockHttpClient>, key_store: Arc<MemoryKeyStore>) -> Capabilities {
  Capabilities {
    http,
    insecure_http: None,
    key_store,
    biometry: MockBiometry::subtype(BiometrySubtype::Face),
    oauth: MockOAuthProvider::returning(serde_json::json!({
      "access_token": "unused",
      "authenticator_id": "unused",
    })),
  }
}

/// Extracts the `value` entry for `name` from a cloud-style
/// `additionalData: [{name, value}]` array.
pub fn additional_data_value(body: &Value, name: &str) -> Option<String> {
  body.as_array()?.iter().find_map(|entry| {
    (entry["name"] == name).then(|| entry["value"].as_str().unwrap_or_default().to_string())
  })
}
