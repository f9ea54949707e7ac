//! # Registration
//!
//! The registration lifecycle: parse a bootstrap descriptor (usually a
//! scanned QR code), negotiate initialization metadata with the backend,
//! discover which signature methods the server permits, enroll factors one at
//! a time, and finalize into a persistent authenticator record.
//!
//! [`RegistrationController`] dispatches the bootstrap to the cloud or
//! on-premise provider; the providers realize the same abstract lifecycle
//! against their respective wire protocols. Operations within one provider
//! are not re-entrant; callers sequence `initiate`, `enroll*`, `finalize`.

pub mod cloud;
pub mod onprem;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub use cloud::CloudRegistrationProvider;
pub use onprem::OnPremiseRegistrationProvider;

use crate::{
  capabilities::{Capabilities, PrivateKeySink},
  definitions::authenticator::MFAAuthenticator,
  error::{MFAError, MFAResult},
};

/// A server-advertised enrollment path for a signature factor.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SignatureMethod {
  #[serde(rename = "enrollmentUri")]
  pub enrollment_uri: Url,
  #[serde(default)]
  pub attributes:     Option<SignatureMethodAttributes>,
  pub enabled:        bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SignatureMethodAttributes {
  #[serde(rename = "supportedAlgorithms", default)]
  pub supported_algorithms: Vec<String>,
  pub algorithm:            String,
}

/// Client version attached to bootstrap descriptors.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RegistrationVersion {
  pub number:   String,
  pub platform: String,
}

/// `true` iff the comma-separated `k=v` options string contains
/// `ignoreSslCerts=true` (token equality, whitespace-trimmed, value
/// lowercased).
pub(crate) fn ignore_ssl_flag(options: &str) -> bool {
  options.split(',').any(|entry| {
    let mut parts = entry.splitn(2, '=');
    matches!(
      (parts.next().map(str::trim), parts.next().map(str::trim)),
      (Some("ignoreSslCerts"), Some(value)) if value.eq_ignore_ascii_case("true")
    )
  })
}

pub(crate) fn titlecase(value: &str) -> String {
  let mut chars = value.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Parses a bootstrap JSON string and dispatches to the cloud or on-premise
/// registration provider.
pub struct RegistrationController {
  data: String,
  /// Host of the bootstrap's registration endpoint, when one parses.
  pub domain: Option<String>,
  /// Whether the bootstrap requests a self-signed-certificate-accepting
  /// trust policy (on-premise only).
  pub ignore_ssl_certificate: bool,
}

impl RegistrationController {
  pub fn new(data: impl Into<String>) -> Self {
    let data = data.into();
    let value: Value = serde_json::from_str(&data).unwrap_or(Value::Null);
    let domain = value
      .get("registrationUri")
      .and_then(Value::as_str)
      .or_else(|| value.get("details_url").and_then(Value::as_str))
      .and_then(|uri| Url::parse(uri).ok())
      .and_then(|uri| uri.host_str().map(str::to_string));
    let ignore_ssl_certificate =
      value.get("options").and_then(Value::as_str).map(ignore_ssl_flag).unwrap_or(false);

    Self { data, domain, ignore_ssl_certificate }
  }

  /// Constructs whichever provider accepts the bootstrap shape and runs its
  /// `initiate`. Construction failure means the JSON does not parse into the
  /// provider's descriptor; it is not a network failure.
  pub async fn initiate(
    &self,
    capabilities: &Capabilities,
    account_name: &str,
    push_token: Option<&str>,
    additional_data: Option<&[(String, String)]>,
  ) -> MFAResult<RegistrationProvider> {
    if let Ok(mut provider) = CloudRegistrationProvider::new(&self.data, capabilities.clone()) {
      provider.initiate(account_name, push_token, additional_data).await?;
      return Ok(RegistrationProvider::Cloud(provider));
    }
    if let Ok(mut provider) = OnPremiseRegistrationProvider::new(&self.data, capabilities.clone())
    {
      provider.initiate(account_name, push_token, additional_data).await?;
      return Ok(RegistrationProvider::OnPremise(provider));
    }
    Err(MFAError::InvalidRegistrationData)
  }
}

/// An initiated registration provider of either flavour.
pub enum RegistrationProvider {
  Cloud(CloudRegistrationProvider),
  OnPremise(OnPremiseRegistrationProvider),
}

impl RegistrationProvider {
  pub fn can_enroll_biometric(&self) -> bool {
    match self {
      Self::Cloud(provider) => provider.can_enroll_biometric(),
      Self::OnPremise(provider) => provider.can_enroll_biometric(),
    }
  }

  pub fn can_enroll_user_presence(&self) -> bool {
    match self {
      Self::Cloud(provider) => provider.can_enroll_user_presence(),
      Self::OnPremise(provider) => provider.can_enroll_user_presence(),
    }
  }

  /// Enrolls a user-presence factor, saving the key under the stock
  /// `"<uuid>.userPresence"` label.
  pub async fn enroll_user_presence(&mut self) -> MFAResult<()> {
    match self {
      Self::Cloud(provider) => provider.enroll_user_presence().await,
      Self::OnPremise(provider) => provider.enroll_user_presence().await,
    }
  }

  pub async fn enroll_user_presence_with(&mut self, sink: &dyn PrivateKeySink) -> MFAResult<()> {
    match self {
      Self::Cloud(provider) => provider.enroll_user_presence_with(sink).await,
      Self::OnPremise(provider) => provider.enroll_user_presence_with(sink).await,
    }
  }

  /// Enrolls a biometric factor, saving the key under the stock
  /// `"<uuid>.biometrics"` label.
  pub async fn enroll_biometric(&mut self) -> MFAResult<()> {
    match self {
      Self::Cloud(provider) => provider.enroll_biometric().await,
      Self::OnPremise(provider) => provider.enroll_biometric().await,
    }
  }

  pub async fn enroll_biometric_with(&mut self, sink: &dyn PrivateKeySink) -> MFAResult<()> {
    match self {
      Self::Cloud(provider) => provider.enroll_biometric_with(sink).await,
      Self::OnPremise(provider) => provider.enroll_biometric_with(sink).await,
    }
  }

  /// Finalizes the registration into a persistent authenticator. The
  /// provider is terminal afterwards.
  pub async fn finalize(self) -> MFAResult<MFAAuthenticator> {
    match self {
      Self::Cloud(provider) => provider.finalize().await.map(MFAAuthenticator::Cloud),
      Self::OnPremise(provider) => provider.finalize().await.map(MFAAuthenticator::OnPremise),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ignore_ssl_flag_token_equality() {
    assert!(ignore_ssl_flag("ignoreSslCerts=true"));
    assert!(ignore_ssl_flag("ignoreSslCerts=TRUE"));
    assert!(ignore_ssl_flag(" ignoreSslCerts = true , other=1"));
    assert!(!ignore_ssl_flag("ignoreSslCerts=false"));
    assert!(!ignore_ssl_flag("ignoreSslCertsX=true"));
    assert!(!ignore_ssl_flag(""));
  }

  #[test]
  fn titlecase_first_character() {
    assert_eq!(titlecase("userPresence"), "UserPresence");
    assert_eq!(titlecase("face"), "Face");
    assert_eq!(titlecase(""), "");
  }

  #[test]
  fn domain_from_registration_uri() {
    let controller = RegistrationController::new(
      r#"{"code":"c","registrationUri":"https://cloud.example.com/v1.0/authenticators/registration"}"#,
    );
    assert_eq!(controller.domain.as_deref(), Some("cloud.example.com"));
    assert!(!controller.ignore_ssl_certificate);
  }

  #[test]
  fn domain_from_details_url() {
    let controller = RegistrationController::new(
      r#"{"code":"c","details_url":"https://onprem.example.com/mga/sps/mmfa/user/mgmt/details","options":"ignoreSslCerts=true"}"#,
    );
    assert_eq!(controller.domain.as_deref(), Some("onprem.example.com"));
    assert!(controller.ignore_ssl_certificate);
  }

  #[test]
  fn domain_absent_for_garbage() {
    let controller = RegistrationController::new("not json");
    assert_eq!(controller.domain, None);
    assert!(!controller.ignore_ssl_certificate);
  }
}
