use crate::capabilities::keystore::KeyStoreError;

pub type MFAResult<T> = Result<T, MFAError>;

/// Errors surfaced across the crate boundary.
///
/// Contract violations by the caller (missing initialization, unknown
/// algorithm, unavailable biometry) and transport failures are both reported
/// as values; the crate never retries on its own.
#[derive(thiserror::Error, Debug)]
pub enum MFAError {
  #[error(transparent)]
  DataDecodingFailed(#[from] serde_json::Error),

  #[error("invalid registration data!")]
  InvalidRegistrationData,

  #[error("operation requires an initiated provider!")]
  InvalidState,

  #[error("invalid algorithm: {0}")]
  InvalidAlgorithm(String),

  #[error("no enrollable factors were advertised by the server!")]
  NoEnrollableFactors,

  #[error("signature method {0} is not enabled!")]
  SignatureMethodNotEnabled(String),

  #[error("enrollment failed: {0}")]
  EnrollmentFailed(String),

  #[error("data initialization failed!")]
  DataInitializationFailed,

  #[error("token does not carry an authenticator identifier!")]
  MissingAuthenticatorIdentifier,

  #[error("biometry failed: {0}")]
  BiometryFailed(String),

  #[error("biometry verification failed: {0}")]
  FailedBiometryVerification(String),

  #[error("token not found!")]
  TokenNotFound,

  #[error("request failed with status {status}: {body}")]
  RequestFailed { status: u16, body: String },

  #[error("underlying error: {0}")]
  UnderlyingError(String),

  #[error(transparent)]
  KeyStore(#[from] KeyStoreError),

  #[error(transparent)]
  RsaError(#[from] rsa::errors::Error),

  #[error(transparent)]
  DecodeError(#[from] base64::DecodeError),

  #[error(transparent)]
  FmtError(#[from] std::fmt::Error),

  #[error("failed to encode public key!")]
  InvalidKeyEncoding,

  #[error("invalid otpauth url: {0}")]
  InvalidOtpAuthUrl(&'static str),

  #[error("invalid OTP digits! digits must be 6 or 8")]
  InvalidOTPDigits,

  #[error("invalid TOTP period! period must be between 10 and 300 seconds")]
  InvalidTOTPPeriod,

  #[error("invalid secret")]
  InvalidSecret,
}
