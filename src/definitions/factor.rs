//! The factor model: a tagged union of the four enrolled factor variants and
//! its canonical persisted form.
//!
//! The persisted form of a [`FactorType`] is a single-key object whose key is
//! the variant tag (`"totp" | "hotp" | "biometric" | "userPresence"`) and
//! whose value is the variant's own object. Display name and image are static
//! attributes recomputed on decode; they never participate in encoding.

use serde::{Deserialize, Serialize, de::Error as _, ser::SerializeMap};

use crate::{
  algorithm::SigningAlgorithm,
  error::MFAResult,
  otpauth::{decode_base32_secret, generate_otp_token},
};

/// Common capability of every enrolled factor, independent of its variant.
pub trait Factor {
  fn id(&self) -> &str;
  fn display_name(&self) -> &'static str;
  fn image_name(&self) -> &'static str;
}

/// A time-based one-time-password credential.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TOTPFactorInfo {
  pub id:        String,
  /// Base-32 encoded shared secret.
  pub secret:    String,
  pub algorithm: SigningAlgorithm,
  pub digits:    u32,
  /// Validity period of one code, in seconds.
  pub period:    u64,
}

impl TOTPFactorInfo {
  /// The code valid at `time` (seconds since the Unix epoch).
  pub fn generate_code(&self, time: u64) -> MFAResult<u32> {
    let secret = decode_base32_secret(&self.secret)?;
    Ok(generate_otp_token(&secret, time / self.period, self.algorithm, self.digits))
  }
}

impl Factor for TOTPFactorInfo {
  fn id(&self) -> &str { &self.id }

  fn display_name(&self) -> &'static str { "Time-based one-time password" }

  fn image_name(&self) -> &'static str { "clock" }
}

/// A counter-based one-time-password credential.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HOTPFactorInfo {
  pub id:        String,
  /// Base-32 encoded shared secret.
  pub secret:    String,
  pub algorithm: SigningAlgorithm,
  pub digits:    u32,
  /// Monotonic counter, starting at 1.
  pub counter:   u64,
}

impl HOTPFactorInfo {
  /// The code for the current counter value; advances the counter.
  pub fn next_code(&mut self) -> MFAResult<u32> {
    let secret = decode_base32_secret(&self.secret)?;
    let code = generate_otp_token(&secret, self.counter, self.algorithm, self.digits);
    self.counter += 1;
    Ok(code)
  }
}

impl Factor for HOTPFactorInfo {
  fn id(&self) -> &str { &self.id }

  fn display_name(&self) -> &'static str { "Counter-based one-time password" }

  fn image_name(&self) -> &'static str { "number" }
}

/// A biometric factor backed by a locally generated RSA key pair.
///
/// `name` is the key-store label of the backing key; the server echoes it back
/// as `keyName` in pending transactions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BiometricFactorInfo {
  pub id:        String,
  pub name:      String,
  pub algorithm: SigningAlgorithm,
}

impl Factor for BiometricFactorInfo {
  fn id(&self) -> &str { &self.id }

  fn display_name(&self) -> &'static str { "Face ID" }

  fn image_name(&self) -> &'static str { "faceid" }
}

/// A user-presence factor backed by a locally generated RSA key pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPresenceFactorInfo {
  pub id:        String,
  pub name:      String,
  pub algorithm: SigningAlgorithm,
}

impl Factor for UserPresenceFactorInfo {
  fn id(&self) -> &str { &self.id }

  fn display_name(&self) -> &'static str { "User presence" }

  fn image_name(&self) -> &'static str { "hand.tap" }
}

/// Factor type enum representing all supported authentication factors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FactorType {
  Totp(TOTPFactorInfo),
  Hotp(HOTPFactorInfo),
  Biometric(BiometricFactorInfo),
  UserPresence(UserPresenceFactorInfo),
}

impl FactorType {
  /// The variant tag used as the key of the persisted form.
  pub fn tag(&self) -> &'static str {
    match self {
      Self::Totp(_) => "totp",
      Self::Hotp(_) => "hotp",
      Self::Biometric(_) => "biometric",
      Self::UserPresence(_) => "userPresence",
    }
  }

  pub fn id(&self) -> &str { self.as_factor().id() }

  pub fn display_name(&self) -> &'static str { self.as_factor().display_name() }

  pub fn image_name(&self) -> &'static str { self.as_factor().image_name() }

  /// The key-store label for factors backed by a local key pair, `None` for
  /// the OTP variants.
  pub fn name(&self) -> Option<&str> {
    match self {
      Self::Biometric(info) => Some(&info.name),
      Self::UserPresence(info) => Some(&info.name),
      _ => None,
    }
  }

  /// Alias for [`FactorType::name`].
  pub fn key_label(&self) -> Option<&str> { self.name() }

  /// The sole supported handle for locating the backing key-store entry and
  /// the signing hash. `Some` only for biometric and user-presence factors.
  pub fn name_and_algorithm(&self) -> Option<(&str, SigningAlgorithm)> {
    match self {
      Self::Biometric(info) => Some((&info.name, info.algorithm)),
      Self::UserPresence(info) => Some((&info.name, info.algorithm)),
      _ => None,
    }
  }

  /// Erases the variant tag, exposing the common factor capability.
  pub fn as_factor(&self) -> &dyn Factor {
    match self {
      Self::Totp(info) => info,
      Self::Hotp(info) => info,
      Self::Biometric(info) => info,
      Self::UserPresence(info) => info,
    }
  }
}

impl Serialize for FactorType {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    match self {
      Self::Totp(info) => map.serialize_entry("totp", info)?,
      Self::Hotp(info) => map.serialize_entry("hotp", info)?,
      Self::Biometric(info) => map.serialize_entry("biometric", info)?,
      Self::UserPresence(info) => map.serialize_entry("userPresence", info)?,
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for FactorType {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let mut object = serde_json::Map::deserialize(deserializer)?;
    if let Some(value) = object.remove("totp") {
      return serde_json::from_value(value).map(Self::Totp).map_err(D::Error::custom);
    }
    if let Some(value) = object.remove("hotp") {
      return serde_json::from_value(value).map(Self::Hotp).map_err(D::Error::custom);
    }
    if let Some(value) = object.remove("biometric") {
      return serde_json::from_value(value).map(Self::Biometric).map_err(D::Error::custom);
    }
    if let Some(value) = object.remove("userPresence") {
      return serde_json::from_value(value).map(Self::UserPresence).map_err(D::Error::custom);
    }
    Err(D::Error::custom("No valid factor type found."))
  }
}
