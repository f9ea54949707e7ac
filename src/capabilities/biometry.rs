//! Biometric evaluation capability. The core only needs to know whether the
//! device can evaluate biometrics and, after a successful prompt, which
//! subtype matched.

use async_trait::async_trait;

/// The biometry subtype reported after evaluation.
///
/// `None` covers the observed corner case where evaluation succeeded but the
/// platform subsequently reports no biometry type; callers treat it as a
/// biometry failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BiometrySubtype {
  Face,
  Fingerprint,
  None,
}

#[async_trait]
pub trait BiometryEvaluator: Send + Sync {
  /// Whether the device can evaluate biometrics at all. The error carries the
  /// platform's reason.
  fn capability(&self) -> Result<(), String>;

  /// Prompts the device owner under the "device owner authentication with
  /// biometrics" policy and resolves to the subtype that matched.
  async fn evaluate(&self, reason: &str) -> Result<BiometrySubtype, String>;
}
