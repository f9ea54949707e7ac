//! The persisted authenticator record: endpoints, token, theme, and the
//! enrolled factor slots. Cloud and on-premise are two realizations of the
//! same capability set; the host persists whichever it created.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
  definitions::{
    factor::{BiometricFactorInfo, FactorType, UserPresenceFactorInfo},
    token::OAuthToken,
  },
  error::MFAResult,
};

/// Capability set shared by the two authenticator variants.
///
/// At most one biometric and one user-presence factor exist per
/// authenticator; their `name` fields identify keys in the local key store.
pub trait Authenticator {
  fn id(&self) -> &str;
  fn service_name(&self) -> &str;
  fn account_name(&self) -> &str;
  fn token(&self) -> &OAuthToken;
  fn refresh_uri(&self) -> &Url;
  fn transaction_uri(&self) -> &Url;
  fn theme(&self) -> &HashMap<String, String>;
  /// Base-64 X.509 certificate signalling certificate pinning.
  fn certificate(&self) -> Option<&str>;
  fn biometric(&self) -> Option<&BiometricFactorInfo>;
  fn user_presence(&self) -> Option<&UserPresenceFactorInfo>;

  fn set_account_name(&mut self, account_name: String);
  fn set_token(&mut self, token: OAuthToken);

  /// The enrolled factor slots wrapped into their [`FactorType`] variants.
  /// Exists to eliminate branching at lookup sites.
  fn enrolled_factors(&self) -> Vec<FactorType> {
    let mut factors = Vec::new();
    if let Some(biometric) = self.biometric() {
      factors.push(FactorType::Biometric(biometric.clone()));
    }
    if let Some(user_presence) = self.user_presence() {
      factors.push(FactorType::UserPresence(user_presence.clone()));
    }
    factors
  }
}

macro_rules! impl_authenticator {
  ($type:ty) => {
    impl Authenticator for $type {
      fn id(&self) -> &str { &self.id }

      fn service_name(&self) -> &str { &self.service_name }

      fn account_name(&self) -> &str { &self.account_name }

      fn token(&self) -> &OAuthToken { &self.token }

      fn refresh_uri(&self) -> &Url { &self.refresh_uri }

      fn transaction_uri(&self) -> &Url { &self.transaction_uri }

      fn theme(&self) -> &HashMap<String, String> { &self.theme }

      fn certificate(&self) -> Option<&str> { self.certificate.as_deref() }

      fn biometric(&self) -> Option<&BiometricFactorInfo> { self.biometric.as_ref() }

      fn user_presence(&self) -> Option<&UserPresenceFactorInfo> { self.user_presence.as_ref() }

      fn set_account_name(&mut self, account_name: String) { self.account_name = account_name; }

      fn set_token(&mut self, token: OAuthToken) { self.token = token; }
    }
  };
}

/// Authenticator registered against the managed cloud tenant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudAuthenticator {
  pub id:                String,
  pub service_name:      String,
  pub account_name:      String,
  pub token:             OAuthToken,
  pub refresh_uri:       Url,
  pub transaction_uri:   Url,
  #[serde(default)]
  pub theme:             HashMap<String, String>,
  #[serde(default)]
  pub custom_attributes: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub certificate:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub biometric:         Option<BiometricFactorInfo>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_presence:     Option<UserPresenceFactorInfo>,
}

impl_authenticator!(CloudAuthenticator);

/// Authenticator registered against the on-premise access manager.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnPremiseAuthenticator {
  pub id:                     String,
  pub service_name:           String,
  pub account_name:           String,
  pub token:                  OAuthToken,
  pub refresh_uri:            Url,
  pub transaction_uri:        Url,
  #[serde(default)]
  pub theme:                  HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub certificate:            Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub biometric:              Option<BiometricFactorInfo>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_presence:          Option<UserPresenceFactorInfo>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub qrlogin_uri:            Option<Url>,
  pub ignore_ssl_certificate: bool,
  pub client_id:              String,
}

impl_authenticator!(OnPremiseAuthenticator);

/// A persisted authenticator of either flavour.
///
/// Deserialization tries the variants in declaration order; on-premise comes
/// first because its required fields (`clientId`, `ignoreSslCertificate`) are
/// absent from cloud documents, while a cloud decode would accept an
/// on-premise document by ignoring the extras.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MFAAuthenticator {
  OnPremise(OnPremiseAuthenticator),
  Cloud(CloudAuthenticator),
}

impl MFAAuthenticator {
  /// Decodes a persisted authenticator document.
  pub fn from_json(data: &str) -> MFAResult<Self> { Ok(serde_json::from_str(data)?) }

  pub fn to_json(&self) -> MFAResult<String> { Ok(serde_json::to_string(self)?) }

  pub fn as_authenticator(&self) -> &dyn Authenticator {
    match self {
      Self::OnPremise(authenticator) => authenticator,
      Self::Cloud(authenticator) => authenticator,
    }
  }

  pub fn as_authenticator_mut(&mut self) -> &mut dyn Authenticator {
    match self {
      Self::OnPremise(authenticator) => authenticator,
      Self::Cloud(authenticator) => authenticator,
    }
  }

  pub fn id(&self) -> &str { self.as_authenticator().id() }

  pub fn enrolled_factors(&self) -> Vec<FactorType> { self.as_authenticator().enrolled_factors() }

  /// Key-store labels of the enrolled signature factors; the reconciliation
  /// handle for removing orphaned keys.
  pub fn key_labels(&self) -> Vec<String> {
    self
      .enrolled_factors()
      .iter()
      .filter_map(|factor| factor.name().map(str::to_string))
      .collect()
  }
}
