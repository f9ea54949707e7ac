//! # Prelude
//!
//! Re-exports the types a host application touches when wiring up
//! registration and transaction servicing, to reduce import boilerplate in
//! tests and samples.

pub use crate::{
  algorithm::SigningAlgorithm,
  capabilities::{
    BiometryEvaluator, BiometrySubtype, Capabilities, HttpClient, HttpMethod, HttpRequest,
    HttpResponse, KeyAccess, KeyMaterial, KeyStore, KeyStoreError, MemoryKeyStore, OAuthProvider,
    PrivateKeySink, StoreKeySink,
  },
  definitions::{
    Authenticator, BiometricFactorInfo, CloudAuthenticator, DeviceInfo, Factor, FactorType,
    HOTPFactorInfo, MFAAuthenticator, NextTransactionInfo, OAuthToken, OnPremiseAuthenticator,
    PendingTransaction, TOTPFactorInfo, UserAction, UserPresenceFactorInfo,
  },
  error::{MFAError, MFAResult},
  otpauth::OTPAuthenticator,
  registration::{RegistrationController, RegistrationProvider},
  service::{CloudService, MFAService, MFAServiceController, OnPremiseService},
};
