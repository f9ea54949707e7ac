//! # Service
//!
//! Transaction servicing for a registered authenticator: poll pending
//! verification requests, match each to an enrolled factor by key label, sign
//! the server-provided challenge under a user-presence or biometric gate, and
//! report the signed result back.

pub mod cloud;
pub mod onprem;

pub use cloud::CloudService;
pub use onprem::OnPremiseService;

use crate::{
  algorithm::SigningAlgorithm,
  capabilities::{Capabilities, KeyStore, keystore::KeyStoreError},
  definitions::{
    authenticator::MFAAuthenticator,
    factor::FactorType,
    token::OAuthToken,
    transaction::{NextTransactionInfo, PendingTransaction, UserAction},
  },
  error::MFAResult,
};

/// Produces the service object for a persisted authenticator and answers
/// factor lookups for pending transactions.
pub struct MFAServiceController {
  authenticator: MFAAuthenticator,
}

impl MFAServiceController {
  pub fn new(authenticator: MFAAuthenticator) -> Self { Self { authenticator } }

  pub fn authenticator(&self) -> &MFAAuthenticator { &self.authenticator }

  /// The first enrolled factor whose key label equals the transaction's
  /// `keyName`, or `None` when no factor matches.
  pub fn transaction_factor(&self, transaction: &PendingTransaction) -> Option<FactorType> {
    self
      .authenticator
      .enrolled_factors()
      .into_iter()
      .find(|factor| factor.name() == Some(transaction.key_name.as_str()))
  }

  pub fn service(&self, capabilities: Capabilities) -> MFAService {
    match &self.authenticator {
      MFAAuthenticator::Cloud(authenticator) =>
        MFAService::Cloud(CloudService::new(authenticator.clone(), capabilities)),
      MFAAuthenticator::OnPremise(authenticator) =>
        MFAService::OnPremise(OnPremiseService::new(authenticator.clone(), capabilities)),
    }
  }

  /// Removes the enrolled factors' keys from the local key store. This is the
  /// reconciliation path for resetting an authenticator; orphaned keys from a
  /// cancelled enrollment are collected here too.
  pub async fn reset(&self, key_store: &dyn KeyStore) -> MFAResult<()> {
    for label in self.authenticator.key_labels() {
      if key_store.exists(&label).await {
        key_store.delete(&label).await?;
      }
    }
    Ok(())
  }
}

/// The transaction service of either flavour.
pub enum MFAService {
  Cloud(CloudService),
  OnPremise(OnPremiseService),
}

impl MFAService {
  /// Returns the next pending transaction and the total pending count.
  pub async fn next_transaction(&self, filter: Option<&str>) -> MFAResult<NextTransactionInfo> {
    match self {
      Self::Cloud(service) => service.next_transaction(filter).await,
      Self::OnPremise(service) => service.next_transaction(filter).await,
    }
  }

  /// Posts a pre-signed result for the pending transaction.
  pub async fn complete_transaction(
    &self,
    transaction: &PendingTransaction,
    action: UserAction,
    signed_data: &str,
  ) -> MFAResult<()> {
    match self {
      Self::Cloud(service) => service.complete_transaction(transaction, action, signed_data).await,
      Self::OnPremise(service) =>
        service.complete_transaction(transaction, action, signed_data).await,
    }
  }

  /// Signs the transaction's challenge with the factor's key-store entry and
  /// verifies it. Fetching a biometry-protected key prompts the device owner.
  pub async fn complete_transaction_with_factor(
    &self,
    transaction: &PendingTransaction,
    factor: &FactorType,
  ) -> MFAResult<()> {
    match self {
      Self::Cloud(service) =>
        service.complete_transaction_with_factor(transaction, factor).await,
      Self::OnPremise(service) =>
        service.complete_transaction_with_factor(transaction, factor).await,
    }
  }

  /// Exchanges a refresh token for a new access/refresh pair, refreshing the
  /// device attributes server-side. The caller re-persists the authenticator
  /// with the returned token.
  pub async fn refresh_token(
    &mut self,
    refresh_token: &str,
    account_name: Option<&str>,
    push_token: Option<&str>,
    additional_data: Option<&[(String, String)]>,
  ) -> MFAResult<OAuthToken> {
    match self {
      Self::Cloud(service) =>
        service.refresh_token(refresh_token, account_name, push_token, additional_data).await,
      Self::OnPremise(service) =>
        service.refresh_token(refresh_token, account_name, push_token, additional_data).await,
    }
  }

  /// Confirms a QR login with the scanned session code.
  pub async fn login(&self, qrlogin_uri: &url::Url, code: &str) -> MFAResult<()> {
    match self {
      Self::Cloud(service) => service.login(qrlogin_uri, code).await,
      Self::OnPremise(service) => service.login(qrlogin_uri, code).await,
    }
  }
}

/// Reads the factor's private key and signs `data` with it.
///
/// Hash selection for this convenience path is algorithm-driven: sha384 and
/// sha512 keep their digest, everything else signs with SHA-256.
pub(crate) async fn sign_with_factor(
  key_store: &dyn KeyStore,
  factor: &FactorType,
  data: &str,
) -> MFAResult<String> {
  let (name, algorithm) = factor.name_and_algorithm().ok_or(KeyStoreError::InvalidKey)?;
  let material = key_store.read(name).await?;
  let algorithm = match algorithm {
    SigningAlgorithm::Sha384 | SigningAlgorithm::Sha512 => algorithm,
    _ => SigningAlgorithm::Sha256,
  };
  material.sign(algorithm, data.as_bytes())
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use url::Url;

  use super::*;
  use crate::{
    algorithm::SigningAlgorithm,
    definitions::{
      authenticator::CloudAuthenticator,
      factor::{BiometricFactorInfo, UserPresenceFactorInfo},
    },
  };

  fn authenticator() -> MFAAuthenticator {
    MFAAuthenticator::Cloud(CloudAuthenticator {
      id: "auth-1".to_string(),
      service_name: "Acme".to_string(),
      account_name: "Savings Account".to_string(),
      token: serde_json::from_str(r#"{"accessToken":"a1b2c3"}"#).unwrap(),
      refresh_uri: Url::parse("https://server/v1.0/authenticators/registration").unwrap(),
      transaction_uri: Url::parse("https://server/v1.0/authenticators/auth-1/verifications")
        .unwrap(),
      theme: HashMap::new(),
      custom_attributes: HashMap::new(),
      certificate: None,
      biometric: Some(BiometricFactorInfo {
        id:        "X0CF".to_string(),
        name:      "K-bio".to_string(),
        algorithm: SigningAlgorithm::Sha256,
      }),
      user_presence: Some(UserPresenceFactorInfo {
        id:        "F0CF".to_string(),
        name:      "K-up".to_string(),
        algorithm: SigningAlgorithm::Sha256,
      }),
    })
  }

  fn pending(key_name: &str) -> PendingTransaction {
    PendingTransaction {
      id:              "9b2f1a".to_string(),
      message:         "Sign in request".to_string(),
      postback_uri:    Url::parse("https://server/v1.0/authenticators/auth-1/verifications/9b2f")
        .unwrap(),
      key_name:        key_name.to_string(),
      factor_id:       "F0CF".to_string(),
      factor_type:     "signature".to_string(),
      data_to_sign:    "nonce".to_string(),
      time_stamp:      "2024-05-01T10:00:00Z".to_string(),
      additional_data: HashMap::new(),
    }
  }

  #[test]
  fn transaction_factor_matches_by_key_name() {
    let controller = MFAServiceController::new(authenticator());
    let factor = controller.transaction_factor(&pending("K-up")).unwrap();
    assert_eq!(factor.id(), "F0CF");
    assert_eq!(factor.tag(), "userPresence");
  }

  #[test]
  fn transaction_factor_none_when_unmatched() {
    let controller = MFAServiceController::new(authenticator());
    assert!(controller.transaction_factor(&pending("K-unknown")).is_none());
  }
}
