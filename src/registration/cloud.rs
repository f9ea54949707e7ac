//! Registration provider for the managed cloud tenant.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::{Map, Value, json};
use url::Url;

use crate::{
  algorithm::SigningAlgorithm,
  capabilities::{
    Capabilities, HttpClient, HttpRequest, KeyMaterial, PrivateKeySink, StoreKeySink,
    biometry::BiometrySubtype,
  },
  crypto,
  definitions::{
    authenticator::CloudAuthenticator,
    device::DeviceInfo,
    factor::{BiometricFactorInfo, UserPresenceFactorInfo},
    token::OAuthToken,
  },
  error::{MFAError, MFAResult},
  registration::{RegistrationVersion, SignatureMethod, titlecase},
};

const METHOD_USER_PRESENCE: &str = "signature_userPresence";
const METHOD_FACE: &str = "signature_face";
const METHOD_FINGERPRINT: &str = "signature_fingerprint";

/// Cloud bootstrap descriptor, usually scanned from a QR code.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CloudRegistrationInfo {
  pub code: String,
  #[serde(rename = "accountName")]
  pub account_name: String,
  #[serde(rename = "registrationUri")]
  pub registration_uri: Url,
  #[allow(dead_code)]
  pub version: RegistrationVersion,
}

/// Initialization metadata returned by the registration endpoint. The same
/// response body also decodes into the first [`OAuthToken`].
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CloudInitializationInfo {
  #[serde(rename = "expiresIn")]
  #[allow(dead_code)]
  pub expires_in: u64,
  pub metadata:   CloudMetadata,
  pub id:         String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CloudMetadata {
  #[serde(rename = "authenticationMethods", deserialize_with = "signature_methods")]
  pub authentication_methods: HashMap<String, SignatureMethod>,
  #[serde(rename = "registrationUri", default)]
  pub registration_uri:       Option<Url>,
  #[serde(rename = "serviceName")]
  pub service_name:           String,
  #[serde(default)]
  pub theme:                  HashMap<String, String>,
  #[serde(rename = "customAttributes", default)]
  pub custom_attributes:      HashMap<String, String>,
}

/// Keeps the known signature methods and drops everything else the server
/// advertises, notably the `totp` method.
fn signature_methods<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<HashMap<String, SignatureMethod>, D::Error> {
  let raw = HashMap::<String, Value>::deserialize(deserializer)?;
  let mut methods = HashMap::new();
  for (key, value) in raw {
    if ![METHOD_USER_PRESENCE, METHOD_FACE, METHOD_FINGERPRINT].contains(&key.as_str()) {
      continue;
    }
    let method = serde_json::from_value(value).map_err(D::Error::custom)?;
    methods.insert(key, method);
  }
  Ok(methods)
}

#[derive(Debug, Deserialize)]
struct EnrollmentResult {
  #[serde(rename = "subType")]
  sub_type: String,
  id:       String,
}

/// Registers the device against a managed cloud tenant.
///
/// Lifecycle: [`new`](Self::new) parses the bootstrap,
/// [`initiate`](Self::initiate) fetches initialization metadata and the first
/// token, `enroll_*` registers one factor per call, and
/// [`finalize`](Self::finalize) refreshes the token and yields the persistent
/// authenticator.
pub struct CloudRegistrationProvider {
  capabilities:   Capabilities,
  registration:   CloudRegistrationInfo,
  initialization: Option<CloudInitializationInfo>,
  token:          Option<OAuthToken>,
  biometric:      Option<BiometricFactorInfo>,
  user_presence:  Option<UserPresenceFactorInfo>,
  account_name:   String,
  push_token:     String,
  device:         DeviceInfo,
}

impl CloudRegistrationProvider {
  /// Parses the cloud bootstrap shape. A shape mismatch is how the
  /// dispatcher decides this bootstrap belongs to the other provider.
  pub fn new(data: &str, capabilities: Capabilities) -> MFAResult<Self> {
    let registration: CloudRegistrationInfo = serde_json::from_str(data)?;
    Ok(Self {
      capabilities,
      account_name: registration.account_name.clone(),
      registration,
      initialization: None,
      token: None,
      biometric: None,
      user_presence: None,
      push_token: String::new(),
      device: DeviceInfo::default(),
    })
  }

  pub fn set_device_info(&mut self, device: DeviceInfo) { self.device = device; }

  pub fn account_name(&self) -> &str { &self.account_name }

  /// POSTs the registration code and device attributes; the response decodes
  /// twice, once into the initialization metadata and once into the first
  /// OAuth token.
  pub async fn initiate(
    &mut self,
    account_name: &str,
    push_token: Option<&str>,
    additional_data: Option<&[(String, String)]>,
  ) -> MFAResult<()> {
    self.account_name = account_name.to_string();
    self.push_token = push_token.unwrap_or_default().to_string();

    let mut uri = self.registration.registration_uri.clone();
    uri.set_query(Some("skipTotpEnrollment=true"));
    let body = json!({
      "code": self.registration.code,
      "attributes": self.attributes(additional_data),
    });
    log::debug!("initiating cloud registration against {uri}");
    let response =
      self.capabilities.http.send(HttpRequest::post(uri).json(&body)?).await?.require_success()?;

    // One response body, two decodes: the initialization metadata and the
    // first OAuth token.
    let initialization: CloudInitializationInfo =
      response.json().map_err(|_| MFAError::DataInitializationFailed)?;
    let token: OAuthToken = response.json().map_err(|_| MFAError::DataInitializationFailed)?;
    if initialization.metadata.authentication_methods.is_empty() {
      return Err(MFAError::NoEnrollableFactors);
    }

    self.initialization = Some(initialization);
    self.token = Some(token);
    Ok(())
  }

  fn method(&self, key: &str) -> Option<&SignatureMethod> {
    self.initialization.as_ref()?.metadata.authentication_methods.get(key)
  }

  pub fn can_enroll_biometric(&self) -> bool {
    self.method(METHOD_FACE).is_some_and(|method| method.enabled)
      || self.method(METHOD_FINGERPRINT).is_some_and(|method| method.enabled)
  }

  pub fn can_enroll_user_presence(&self) -> bool {
    self.method(METHOD_USER_PRESENCE).is_some_and(|method| method.enabled)
  }

  /// Enrolls a user-presence factor with the stock key sink.
  pub async fn enroll_user_presence(&mut self) -> MFAResult<()> {
    let sink = StoreKeySink::user_presence(self.capabilities.key_store.clone());
    self.enroll_user_presence_with(&sink).await
  }

  pub async fn enroll_user_presence_with(&mut self, sink: &dyn PrivateKeySink) -> MFAResult<()> {
    self.perform_signature_enrollment(METHOD_USER_PRESENCE, "userPresence", sink).await
  }

  /// Enrolls a biometric factor with the stock key sink.
  pub async fn enroll_biometric(&mut self) -> MFAResult<()> {
    let sink = StoreKeySink::biometrics(self.capabilities.key_store.clone());
    self.enroll_biometric_with(&sink).await
  }

  /// Evaluates biometry, maps the matched subtype to the server's signature
  /// method, and enrolls.
  pub async fn enroll_biometric_with(&mut self, sink: &dyn PrivateKeySink) -> MFAResult<()> {
    self.capabilities.biometry.capability().map_err(MFAError::BiometryFailed)?;
    let subtype = self
      .capabilities
      .biometry
      .evaluate("Register this device as an authenticator")
      .await
      .map_err(MFAError::BiometryFailed)?;
    let (method_key, sub_type) = match subtype {
      BiometrySubtype::Face => (METHOD_FACE, "face"),
      BiometrySubtype::Fingerprint => (METHOD_FINGERPRINT, "fingerprint"),
      BiometrySubtype::None =>
        return Err(MFAError::BiometryFailed(
          "no biometry type available after authentication".to_string(),
        )),
    };
    self.perform_signature_enrollment(method_key, sub_type, sink).await
  }

  async fn perform_signature_enrollment(
    &mut self,
    method_key: &str,
    sub_type: &str,
    sink: &dyn PrivateKeySink,
  ) -> MFAResult<()> {
    let initialization = self.initialization.as_ref().ok_or(MFAError::InvalidState)?;
    let method = initialization
      .metadata
      .authentication_methods
      .get(method_key)
      .ok_or(MFAError::InvalidRegistrationData)?;
    if !method.enabled {
      return Err(MFAError::SignatureMethodNotEnabled(titlecase(sub_type)));
    }
    let attributes = method.attributes.as_ref().ok_or(MFAError::InvalidRegistrationData)?;
    let preferred = SigningAlgorithm::parse(&attributes.algorithm)
      .ok_or_else(|| MFAError::InvalidAlgorithm(attributes.algorithm.clone()))?;
    let enrollment_uri = method.enrollment_uri.clone();
    let challenge = initialization.id.clone();
    let authorization =
      self.token.as_ref().ok_or(MFAError::TokenNotFound)?.authorization_header();

    let material = KeyMaterial::generate(crypto::DEFAULT_KEY_BITS)?;
    let signed_data = material.sign(preferred, challenge.as_bytes())?;
    let key_label = sink.save(&material).await?;

    let body = json!([{
      "subType": sub_type,
      "enabled": true,
      "attributes": {
        "signedData": signed_data,
        "publicKey": material.public_key_base64()?,
        "deviceSecurity": sub_type != "userPresence",
        "algorithm": preferred.cloud_spelling(),
        "additionalData": [{ "name": "name", "value": &key_label }],
      },
    }]);
    let response = self
      .capabilities
      .http
      .send(HttpRequest::post(enrollment_uri).json(&body)?.authorization(&authorization))
      .await?
      .require_success()?;

    let results: Vec<EnrollmentResult> = response.json()?;
    let id = results
      .into_iter()
      .find(|result| result.sub_type == sub_type)
      .map(|result| result.id)
      .ok_or_else(|| {
        MFAError::EnrollmentFailed(format!("no enrollment result for subtype {sub_type}"))
      })?;

    match sub_type {
      "face" | "fingerprint" =>
        self.biometric = Some(BiometricFactorInfo { id, name: key_label, algorithm: preferred }),
      _ =>
        self.user_presence =
          Some(UserPresenceFactorInfo { id, name: key_label, algorithm: preferred }),
    }
    Ok(())
  }

  /// Refreshes the token (the authenticator transitions from ENROLLING to
  /// ACTIVE server-side) and constructs the persistent authenticator.
  pub async fn finalize(mut self) -> MFAResult<CloudAuthenticator> {
    let initialization = self.initialization.take().ok_or(MFAError::InvalidState)?;
    let token = self.token.take().ok_or(MFAError::TokenNotFound)?;
    let refresh_token = token.refresh_token.clone().ok_or(MFAError::TokenNotFound)?;

    // The initiation response may advertise a fresher registration endpoint
    // than the bootstrap carried.
    let registration_uri = initialization
      .metadata
      .registration_uri
      .clone()
      .unwrap_or_else(|| self.registration.registration_uri.clone());
    let mut uri = registration_uri.clone();
    uri.set_query(Some("metadataInResponse=false"));
    let body = json!({
      "refreshToken": refresh_token,
      "attributes": self.attributes(None),
    });
    let response = self
      .capabilities
      .http
      .send(HttpRequest::post(uri).json(&body)?.authorization(&token.authorization_header()))
      .await?
      .require_success()?;
    let refreshed: OAuthToken = response.json()?;

    // …/authenticators/registration -> …/authenticators/{id}/verifications
    let mut transaction_uri = registration_uri.clone();
    {
      let mut segments =
        transaction_uri.path_segments_mut().map_err(|_| MFAError::InvalidRegistrationData)?;
      segments.pop();
      segments.push(&initialization.id);
      segments.push("verifications");
    }

    Ok(CloudAuthenticator {
      id: initialization.id,
      service_name: initialization.metadata.service_name,
      account_name: self.account_name,
      token: refreshed,
      refresh_uri: registration_uri,
      transaction_uri,
      theme: initialization.metadata.theme,
      custom_attributes: initialization.metadata.custom_attributes,
      certificate: None,
      biometric: self.biometric,
      user_presence: self.user_presence,
    })
  }

  /// In-app initiation: POSTs the client id and account name with an existing
  /// bearer token and returns the JSON response string, which feeds back into
  /// [`RegistrationController`](crate::registration::RegistrationController).
  pub async fn initiation_response(
    http: &dyn HttpClient,
    initiation_uri: Url,
    client_id: &str,
    account_name: &str,
    authorization: &str,
  ) -> MFAResult<String> {
    let body = json!({ "clientId": client_id, "accountName": account_name });
    let response = http
      .send(HttpRequest::post(initiation_uri).json(&body)?.authorization(authorization))
      .await?
      .require_success()?;
    Ok(response.text())
  }

  fn attributes(&self, additional_data: Option<&[(String, String)]>) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("accountName".to_string(), json!(self.account_name));
    attributes.insert("pushToken".to_string(), json!(self.push_token));
    for (name, value) in self.device.attributes() {
      attributes.entry(name).or_insert_with(|| json!(value));
    }
    if let Some(extra) = additional_data {
      for (name, value) in extra {
        attributes.entry(name.clone()).or_insert_with(|| json!(value));
      }
    }
    attributes
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bootstrap_parses() {
    let info: CloudRegistrationInfo = serde_json::from_str(
      r#"{"code":"abc123","accountName":"Savings Account",
          "registrationUri":"https://server/v1.0/authenticators/registration",
          "version":{"number":"1.0.0","platform":"com.acme.verify"}}"#,
    )
    .unwrap();
    assert_eq!(info.code, "abc123");
    assert_eq!(info.registration_uri.host_str(), Some("server"));
  }

  #[test]
  fn bootstrap_rejects_onprem_shape() {
    let result = serde_json::from_str::<CloudRegistrationInfo>(
      r#"{"code":"c","options":"","details_url":"https://onprem/details","version":1,
          "client_id":"x"}"#,
    );
    assert!(result.is_err());
  }

  #[test]
  fn method_discovery_ignores_totp() {
    let metadata: CloudMetadata = serde_json::from_value(serde_json::json!({
      "authenticationMethods": {
        "signature_userPresence": {
          "enrollmentUri": "https://server/v1.0/authnmethods/signatures",
          "attributes": { "supportedAlgorithms": ["RSASHA256"], "algorithm": "RSASHA256" },
          "enabled": true,
        },
        "totp": { "anything": "goes here, totp is dropped during decoding" },
        "unrelated_method": { "also": "dropped" },
      },
      "serviceName": "Acme",
    }))
    .unwrap();

    assert_eq!(metadata.authentication_methods.len(), 1);
    assert!(metadata.authentication_methods.contains_key("signature_userPresence"));
  }

  #[test]
  fn method_discovery_accepts_missing_attributes() {
    let metadata: CloudMetadata = serde_json::from_value(serde_json::json!({
      "authenticationMethods": {
        "signature_face": {
          "enrollmentUri": "https://server/v1.0/authnmethods/signatures",
          "enabled": false,
        },
      },
      "serviceName": "Acme",
    }))
    .unwrap();

    let method = &metadata.authentication_methods["signature_face"];
    assert!(!method.enabled);
    assert!(method.attributes.is_none());
  }
}
