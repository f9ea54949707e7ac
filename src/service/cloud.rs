//! Transaction service for the managed cloud tenant.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, json};
use url::Url;

use crate::{
  capabilities::{Capabilities, HttpRequest},
  definitions::{
    authenticator::CloudAuthenticator,
    device::DeviceInfo,
    factor::FactorType,
    token::OAuthToken,
    transaction::{NextTransactionInfo, PendingTransaction, UserAction},
  },
  error::MFAResult,
  service::sign_with_factor,
};

const DEFAULT_FILTER: &str = "nextPending";

#[derive(Debug, Deserialize)]
struct VerificationPage {
  #[serde(default)]
  count:         usize,
  #[serde(default)]
  verifications: Vec<Verification>,
}

#[derive(Debug, Deserialize)]
struct Verification {
  id: String,
  message: String,
  #[serde(rename = "postbackUri")]
  postback_uri: Url,
  #[serde(rename = "keyName")]
  key_name: String,
  #[serde(rename = "factorId")]
  factor_id: String,
  #[serde(rename = "factorType")]
  factor_type: String,
  #[serde(rename = "dataToSign")]
  data_to_sign: String,
  #[serde(rename = "creationTime")]
  creation_time: String,
  #[serde(rename = "additionalData", default)]
  additional_data: Vec<NameValue>,
}

#[derive(Debug, Deserialize)]
struct NameValue {
  name:  String,
  value: String,
}

impl From<Verification> for PendingTransaction {
  fn from(verification: Verification) -> Self {
    Self {
      id:              verification.id,
      message:         verification.message,
      postback_uri:    verification.postback_uri,
      key_name:        verification.key_name,
      factor_id:       verification.factor_id,
      factor_type:     verification.factor_type,
      data_to_sign:    verification.data_to_sign,
      time_stamp:      verification.creation_time,
      additional_data: verification
        .additional_data
        .into_iter()
        .map(|pair| (pair.name, pair.value))
        .collect::<HashMap<_, _>>(),
    }
  }
}

/// Polls and completes pending verifications against the cloud tenant.
pub struct CloudService {
  authenticator: CloudAuthenticator,
  capabilities:  Capabilities,
  device:        DeviceInfo,
}

impl CloudService {
  pub fn new(authenticator: CloudAuthenticator, capabilities: Capabilities) -> Self {
    Self { authenticator, capabilities, device: DeviceInfo::default() }
  }

  pub fn set_device_info(&mut self, device: DeviceInfo) { self.device = device; }

  pub fn token(&self) -> &OAuthToken { &self.authenticator.token }

  /// GETs the transaction endpoint with a filter query and normalizes the
  /// first pending record.
  pub async fn next_transaction(&self, filter: Option<&str>) -> MFAResult<NextTransactionInfo> {
    let mut uri = self.authenticator.transaction_uri.clone();
    uri.query_pairs_mut().append_pair("filter", filter.unwrap_or(DEFAULT_FILTER));
    let response = self
      .capabilities
      .http
      .send(HttpRequest::get(uri).authorization(&self.authenticator.token.authorization_header()))
      .await?
      .require_success()?;

    let page: VerificationPage = response.json()?;
    Ok(NextTransactionInfo {
      current: page.verifications.into_iter().next().map(PendingTransaction::from),
      count:   page.count,
    })
  }

  /// POSTs the signed result to the transaction's postback endpoint; any 2xx
  /// (204 observed) counts as completion. No automatic retry on failure.
  pub async fn complete_transaction(
    &self,
    transaction: &PendingTransaction,
    action: UserAction,
    signed_data: &str,
  ) -> MFAResult<()> {
    let body = json!({ "action": action.wire(), "signedData": signed_data });
    self
      .capabilities
      .http
      .send(
        HttpRequest::post(transaction.postback_uri.clone())
          .json(&body)?
          .authorization(&self.authenticator.token.authorization_header()),
      )
      .await?
      .require_success()?;
    Ok(())
  }

  /// Signs `dataToSign` with the factor's key-store entry and verifies the
  /// transaction.
  pub async fn complete_transaction_with_factor(
    &self,
    transaction: &PendingTransaction,
    factor: &FactorType,
  ) -> MFAResult<()> {
    let signed_data = sign_with_factor(
      self.capabilities.key_store.as_ref(),
      factor,
      &transaction.data_to_sign,
    )
    .await?;
    self.complete_transaction(transaction, UserAction::Verify, &signed_data).await
  }

  /// POSTs the refresh token and current device attributes to the refresh
  /// endpoint and adopts the returned token.
  pub async fn refresh_token(
    &mut self,
    refresh_token: &str,
    account_name: Option<&str>,
    push_token: Option<&str>,
    additional_data: Option<&[(String, String)]>,
  ) -> MFAResult<OAuthToken> {
    let mut attributes = Map::new();
    attributes.insert(
      "accountName".to_string(),
      json!(account_name.unwrap_or(&self.authenticator.account_name)),
    );
    if let Some(push_token) = push_token {
      attributes.insert("pushToken".to_string(), json!(push_token));
    }
    for (name, value) in self.device.attributes() {
      attributes.entry(name).or_insert_with(|| json!(value));
    }
    if let Some(extra) = additional_data {
      for (name, value) in extra {
        attributes.entry(name.clone()).or_insert_with(|| json!(value));
      }
    }

    let body = json!({ "refreshToken": refresh_token, "attributes": attributes });
    let response = self
      .capabilities
      .http
      .send(
        HttpRequest::post(self.authenticator.refresh_uri.clone())
          .json(&body)?
          .authorization(&self.authenticator.token.authorization_header()),
      )
      .await?
      .require_success()?;

    let token: OAuthToken = response.json()?;
    self.authenticator.token = token.clone();
    Ok(token)
  }

  /// Confirms a QR login session.
  pub async fn login(&self, qrlogin_uri: &Url, code: &str) -> MFAResult<()> {
    let body = json!({ "lsi": code });
    self
      .capabilities
      .http
      .send(
        HttpRequest::post(qrlogin_uri.clone())
          .json(&body)?
          .authorization(&self.authenticator.token.authorization_header()),
      )
      .await?
      .require_success()?;
    Ok(())
  }
}
