//! Registration provider for the on-premise access manager.
//!
//! Same abstract lifecycle as the cloud provider, different wire protocol:
//! initialization is a GET with snake_case keys and no embedded token, the
//! first token comes from an OAuth code exchange, and enrollment is a SCIM
//! PATCH that returns no factor id.

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::{
  algorithm::SigningAlgorithm,
  capabilities::{
    Capabilities, HttpClient, HttpRequest, KeyMaterial, PrivateKeySink, StoreKeySink,
    biometry::BiometrySubtype,
  },
  crypto,
  definitions::{
    authenticator::OnPremiseAuthenticator,
    device::DeviceInfo,
    factor::{BiometricFactorInfo, UserPresenceFactorInfo},
    token::OAuthToken,
  },
  error::{MFAError, MFAResult},
  registration::{SignatureMethod, SignatureMethodAttributes, ignore_ssl_flag, titlecase},
};

const MECHANISM_URN_PREFIX: &str =
  "urn:ibm:security:authentication:asf:mechanism:mobile_user_approval:";
const MECHANISM_FINGERPRINT: &str = "fingerprint";
const MECHANISM_USER_PRESENCE: &str = "user_presence";
const DEFAULT_ALGORITHM: &str = "SHA512withRSA";
const TOKEN_SCOPE: &str = "mmfaAuthn";
/// Incoming additional data beyond this count is dropped before the token
/// exchange.
const ADDITIONAL_DATA_LIMIT: usize = 10;

pub(crate) const SCIM_PATCH_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";
const SCIM_ATTRIBUTE_PATH_PREFIX: &str =
  "urn:ietf:params:scim:schemas:extension:isam:1.0:MMFA:Authenticator:";

/// On-premise bootstrap descriptor.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct OnPremiseRegistrationInfo {
  pub code: String,
  /// Comma-separated `k=v` flags, notably `ignoreSslCerts=true|false`.
  #[serde(default)]
  pub options: Option<String>,
  pub details_url: Url,
  #[allow(dead_code)]
  pub version: i64,
  pub client_id: String,
}

/// Initialization payload fetched from `details_url`. Wire keys are
/// snake_case; no token is embedded.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct OnPremiseInitializationInfo {
  pub authntrxn_endpoint:   Url,
  pub metadata:             OnPremiseMetadata,
  pub discovery_mechanisms: Vec<String>,
  pub enrollment_endpoint:  Url,
  #[serde(default)]
  pub qrlogin_endpoint:     Option<Url>,
  #[allow(dead_code)]
  pub version:              String,
  pub token_endpoint:       Url,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct OnPremiseMetadata {
  pub service_name: String,
  #[serde(default)]
  pub theme:        HashMap<String, String>,
}

/// Registers the device against an on-premise access manager.
pub struct OnPremiseRegistrationProvider {
  capabilities:     Capabilities,
  registration:     OnPremiseRegistrationInfo,
  initialization:   Option<OnPremiseInitializationInfo>,
  methods:          HashMap<String, SignatureMethod>,
  token:            Option<OAuthToken>,
  authenticator_id: Option<String>,
  biometric:        Option<BiometricFactorInfo>,
  user_presence:    Option<UserPresenceFactorInfo>,
  account_name:     String,
  push_token:       String,
  device:           DeviceInfo,
}

impl OnPremiseRegistrationProvider {
  /// Parses the on-premise bootstrap shape.
  pub fn new(data: &str, capabilities: Capabilities) -> MFAResult<Self> {
    let registration: OnPremiseRegistrationInfo = serde_json::from_str(data)?;
    Ok(Self {
      capabilities,
      registration,
      initialization: None,
      methods: HashMap::new(),
      token: None,
      authenticator_id: None,
      biometric: None,
      user_presence: None,
      account_name: String::new(),
      push_token: String::new(),
      device: DeviceInfo::default(),
    })
  }

  pub fn set_device_info(&mut self, device: DeviceInfo) { self.device = device; }

  pub fn account_name(&self) -> &str { &self.account_name }

  pub fn ignore_ssl_certificate(&self) -> bool {
    self.registration.options.as_deref().map(ignore_ssl_flag).unwrap_or(false)
  }

  fn client(&self) -> Arc<dyn HttpClient> {
    self.capabilities.client(self.ignore_ssl_certificate())
  }

  /// GETs the initialization payload, derives the discovery set, and
  /// exchanges the registration code for the first token. The token MUST
  /// carry an `authenticator_id`.
  pub async fn initiate(
    &mut self,
    account_name: &str,
    push_token: Option<&str>,
    additional_data: Option<&[(String, String)]>,
  ) -> MFAResult<()> {
    self.account_name = account_name.to_string();
    self.push_token = push_token.unwrap_or_default().to_string();

    log::debug!("fetching on-premise details from {}", self.registration.details_url);
    let response = self
      .client()
      .send(HttpRequest::get(self.registration.details_url.clone()))
      .await?
      .require_success()?;
    let initialization: OnPremiseInitializationInfo =
      response.json().map_err(|_| MFAError::DataInitializationFailed)?;

    let mut methods = HashMap::new();
    for mechanism in &initialization.discovery_mechanisms {
      let Some(kind) = mechanism.strip_prefix(MECHANISM_URN_PREFIX) else { continue };
      if kind != MECHANISM_FINGERPRINT && kind != MECHANISM_USER_PRESENCE {
        continue;
      }
      methods.insert(kind.to_string(), SignatureMethod {
        enrollment_uri: initialization.enrollment_endpoint.clone(),
        attributes:     Some(SignatureMethodAttributes {
          supported_algorithms: vec![DEFAULT_ALGORITHM.to_string()],
          algorithm:            DEFAULT_ALGORITHM.to_string(),
        }),
        enabled:        true,
      });
    }
    if methods.is_empty() {
      return Err(MFAError::NoEnrollableFactors);
    }

    let mut extra: Vec<(String, String)> = vec![
      ("tenant_id".to_string(), Uuid::new_v4().to_string()),
      ("account_name".to_string(), self.account_name.clone()),
      ("push_token".to_string(), self.push_token.clone()),
    ];
    for (name, value) in self.device.attributes() {
      if !extra.iter().any(|(existing, _)| *existing == name) {
        extra.push((name, value));
      }
    }
    if let Some(additional) = additional_data {
      for (name, value) in additional.iter().take(ADDITIONAL_DATA_LIMIT) {
        if !extra.iter().any(|(existing, _)| existing == name) {
          extra.push((name.clone(), value.clone()));
        }
      }
    }

    let token = self
      .capabilities
      .oauth
      .exchange_code(
        &initialization.token_endpoint,
        &self.registration.client_id,
        &self.registration.code,
        &[TOKEN_SCOPE],
        &extra,
      )
      .await?;
    let authenticator_id = token
      .authenticator_id()
      .ok_or(MFAError::MissingAuthenticatorIdentifier)?
      .to_string();

    self.token = Some(token);
    self.authenticator_id = Some(authenticator_id);
    self.methods = methods;
    self.initialization = Some(initialization);
    Ok(())
  }

  pub fn can_enroll_biometric(&self) -> bool {
    self.methods.get(MECHANISM_FINGERPRINT).is_some_and(|method| method.enabled)
  }

  pub fn can_enroll_user_presence(&self) -> bool {
    self.methods.get(MECHANISM_USER_PRESENCE).is_some_and(|method| method.enabled)
  }

  /// Enrolls a user-presence factor with the stock key sink.
  pub async fn enroll_user_presence(&mut self) -> MFAResult<()> {
    let sink = StoreKeySink::user_presence(self.capabilities.key_store.clone());
    self.enroll_user_presence_with(&sink).await
  }

  pub async fn enroll_user_presence_with(&mut self, sink: &dyn PrivateKeySink) -> MFAResult<()> {
    self.perform_signature_enrollment(MECHANISM_USER_PRESENCE, "userPresence", sink).await
  }

  /// Enrolls a biometric factor with the stock key sink.
  pub async fn enroll_biometric(&mut self) -> MFAResult<()> {
    let sink = StoreKeySink::biometrics(self.capabilities.key_store.clone());
    self.enroll_biometric_with(&sink).await
  }

  /// Evaluates biometry and enrolls. The server does not distinguish face
  /// from fingerprint; both map to the `fingerprint` method.
  pub async fn enroll_biometric_with(&mut self, sink: &dyn PrivateKeySink) -> MFAResult<()> {
    self.capabilities.biometry.capability().map_err(MFAError::BiometryFailed)?;
    let subtype = self
      .capabilities
      .biometry
      .evaluate("Register this device as an authenticator")
      .await
      .map_err(MFAError::BiometryFailed)?;
    match subtype {
      BiometrySubtype::Face | BiometrySubtype::Fingerprint => {},
      BiometrySubtype::None =>
        return Err(MFAError::BiometryFailed(
          "no biometry type available after authentication".to_string(),
        )),
    }
    self.perform_signature_enrollment(MECHANISM_FINGERPRINT, "fingerprint", sink).await
  }

  async fn perform_signature_enrollment(
    &mut self,
    method_key: &str,
    sub_type: &str,
    sink: &dyn PrivateKeySink,
  ) -> MFAResult<()> {
    if self.initialization.is_none() {
      return Err(MFAError::InvalidState);
    }
    let method = self.methods.get(method_key).ok_or(MFAError::InvalidRegistrationData)?;
    if !method.enabled {
      return Err(MFAError::SignatureMethodNotEnabled(titlecase(sub_type)));
    }
    let attributes = method.attributes.as_ref().ok_or(MFAError::InvalidRegistrationData)?;
    // Algorithm resolution comes before key generation; an unknown algorithm
    // leaves nothing behind in the key store.
    let preferred = SigningAlgorithm::parse(&attributes.algorithm)
      .ok_or_else(|| MFAError::InvalidAlgorithm(attributes.algorithm.clone()))?;
    let enrollment_uri = method.enrollment_uri.clone();
    let authorization =
      self.token.as_ref().ok_or(MFAError::TokenNotFound)?.authorization_header();

    let material = KeyMaterial::generate(crypto::DEFAULT_KEY_BITS)?;
    let key_label = sink.save(&material).await?;

    let path = format!("{SCIM_ATTRIBUTE_PATH_PREFIX}{sub_type}Methods");
    let mut uri = enrollment_uri;
    uri.query_pairs_mut().append_pair("attributes", &path);
    let body = json!({
      "schemas": [SCIM_PATCH_SCHEMA],
      "Operations": [{
        "op": "add",
        "path": path,
        "value": [{
          "enabled": true,
          "keyHandle": &key_label,
          "algorithm": preferred.onprem_spelling(),
          "publicKey": material.public_key_base64()?,
        }],
      }],
    });
    self
      .client()
      .send(HttpRequest::patch(uri).json(&body)?.authorization(&authorization))
      .await?
      .require_success()?;

    // The SCIM response carries no enrollment id; mint one locally for
    // correlation.
    let id = Uuid::new_v4().to_string();
    match sub_type {
      "fingerprint" =>
        self.biometric = Some(BiometricFactorInfo { id, name: key_label, algorithm: preferred }),
      _ =>
        self.user_presence =
          Some(UserPresenceFactorInfo { id, name: key_label, algorithm: preferred }),
    }
    Ok(())
  }

  /// Constructs the persistent authenticator from the already-held token and
  /// endpoints. Unlike the cloud path, no refresh round-trip happens here.
  pub async fn finalize(mut self) -> MFAResult<OnPremiseAuthenticator> {
    let ignore_ssl_certificate = self.ignore_ssl_certificate();
    let initialization = self.initialization.take().ok_or(MFAError::InvalidState)?;
    let token = self.token.take().ok_or(MFAError::TokenNotFound)?;
    let id = self.authenticator_id.take().ok_or(MFAError::MissingAuthenticatorIdentifier)?;

    Ok(OnPremiseAuthenticator {
      id,
      service_name: initialization.metadata.service_name,
      account_name: self.account_name,
      token,
      refresh_uri: initialization.token_endpoint,
      transaction_uri: initialization.authntrxn_endpoint,
      theme: initialization.metadata.theme,
      certificate: None,
      biometric: self.biometric,
      user_presence: self.user_presence,
      qrlogin_uri: initialization.qrlogin_endpoint,
      ignore_ssl_certificate,
      client_id: self.registration.client_id,
    })
  }
}
