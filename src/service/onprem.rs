//! Transaction service for the on-premise access manager. Mirrors the cloud
//! flow with snake_case wire keys, the SCIM postback shape, and token refresh
//! through the OAuth capability.

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{
  capabilities::{Capabilities, HttpClient, HttpRequest},
  definitions::{
    authenticator::OnPremiseAuthenticator,
    device::DeviceInfo,
    factor::FactorType,
    token::OAuthToken,
    transaction::{NextTransactionInfo, PendingTransaction, UserAction},
  },
  error::MFAResult,
  registration::onprem::SCIM_PATCH_SCHEMA,
  service::sign_with_factor,
};

const DEFAULT_FILTER: &str = "nextPending";

#[derive(Debug, Deserialize)]
struct TransactionPage {
  #[serde(default)]
  total: usize,
  #[serde(default)]
  transactions_pending: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
  id: String,
  message: String,
  postback_uri: Url,
  key_name: String,
  factor_id: String,
  factor_type: String,
  data_to_sign: String,
  creation_time: String,
  #[serde(default)]
  additional_data: HashMap<String, String>,
}

impl From<Transaction> for PendingTransaction {
  fn from(transaction: Transaction) -> Self {
    Self {
      id:              transaction.id,
      message:         transaction.message,
      postback_uri:    transaction.postback_uri,
      key_name:        transaction.key_name,
      factor_id:       transaction.factor_id,
      factor_type:     transaction.factor_type,
      data_to_sign:    transaction.data_to_sign,
      time_stamp:      transaction.creation_time,
      additional_data: transaction.additional_data,
    }
  }
}

/// Polls and completes pending transactions against the on-premise access
/// manager.
pub struct OnPremiseService {
  authenticator: OnPremiseAuthenticator,
  capabilities:  Capabilities,
  device:        DeviceInfo,
}

impl OnPremiseService {
  pub fn new(authenticator: OnPremiseAuthenticator, capabilities: Capabilities) -> Self {
    Self { authenticator, capabilities, device: DeviceInfo::default() }
  }

  pub fn set_device_info(&mut self, device: DeviceInfo) { self.device = device; }

  pub fn token(&self) -> &OAuthToken { &self.authenticator.token }

  fn client(&self) -> Arc<dyn HttpClient> {
    self.capabilities.client(self.authenticator.ignore_ssl_certificate)
  }

  pub async fn next_transaction(&self, filter: Option<&str>) -> MFAResult<NextTransactionInfo> {
    let mut uri = self.authenticator.transaction_uri.clone();
    uri.query_pairs_mut().append_pair("filter", filter.unwrap_or(DEFAULT_FILTER));
    let response = self
      .client()
      .send(HttpRequest::get(uri).authorization(&self.authenticator.token.authorization_header()))
      .await?
      .require_success()?;

    let page: TransactionPage = response.json()?;
    Ok(NextTransactionInfo {
      current: page.transactions_pending.into_iter().next().map(PendingTransaction::from),
      count:   page.total,
    })
  }

  /// Posts the signed result as a SCIM patch against the transaction's
  /// postback endpoint.
  pub async fn complete_transaction(
    &self,
    transaction: &PendingTransaction,
    action: UserAction,
    signed_data: &str,
  ) -> MFAResult<()> {
    let body = json!({
      "schemas": [SCIM_PATCH_SCHEMA],
      "Operations": [{
        "op": "add",
        "path": "transactionsPending",
        "value": [{ "action": action.wire(), "signedData": signed_data }],
      }],
    });
    self
      .client()
      .send(
        HttpRequest::post(transaction.postback_uri.clone())
          .json(&body)?
          .authorization(&self.authenticator.token.authorization_header()),
      )
      .await?
      .require_success()?;
    Ok(())
  }

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

  /// Refreshes the token through the OAuth capability, carrying the current
  /// device attributes as extra parameters.
  pub async fn refresh_token(
    &mut self,
    refresh_token: &str,
    account_name: Option<&str>,
    push_token: Option<&str>,
    additional_data: Option<&[(String, String)]>,
  ) -> MFAResult<OAuthToken> {
    let mut extra: Vec<(String, String)> = vec![(
      "account_name".to_string(),
      account_name.unwrap_or(&self.authenticator.account_name).to_string(),
    )];
    if let Some(push_token) = push_token {
      extra.push(("push_token".to_string(), push_token.to_string()));
    }
    for (name, value) in self.device.attributes() {
      if !extra.iter().any(|(existing, _)| *existing == name) {
        extra.push((name, value));
      }
    }
    if let Some(additional) = additional_data {
      for (name, value) in additional {
        if !extra.iter().any(|(existing, _)| existing == name) {
          extra.push((name.clone(), value.clone()));
        }
      }
    }

    let token = self
      .capabilities
      .oauth
      .refresh(
        &self.authenticator.refresh_uri,
        &self.authenticator.client_id,
        refresh_token,
        &extra,
      )
      .await?;
    self.authenticator.token = token.clone();
    Ok(token)
  }

  /// Confirms a QR login session against the authenticator's QR-login
  /// endpoint.
  pub async fn login(&self, qrlogin_uri: &Url, code: &str) -> MFAResult<()> {
    let body = json!({ "lsi": code });
    self
      .client()
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

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_normalizes_into_pending_transaction() {
    let page: TransactionPage = serde_json::from_value(json!({
      "total": 1,
      "transactions_pending": [{
        "id": "tx-42",
        "message": "Approve VPN sign-in",
        "postback_uri": "https://onprem/mga/sps/mmfa/user/mgmt/authntrxn/tx-42",
        "key_name": "K-bio",
        "factor_id": "f-1",
        "factor_type": "signature",
        "data_to_sign": "challenge-bytes",
        "creation_time": "2024-05-01T10:00:00Z",
        "additional_data": { "ip": "198.51.100.7" },
      }],
    }))
    .unwrap();

    assert_eq!(page.total, 1);
    let transaction = PendingTransaction::from(page.transactions_pending.into_iter().next().unwrap());
    assert_eq!(transaction.key_name, "K-bio");
    assert_eq!(transaction.additional_data["ip"], "198.51.100.7");
  }
}
