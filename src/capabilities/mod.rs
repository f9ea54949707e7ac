//! Platform capabilities consumed by the core.
//!
//! The crate performs no I/O of its own: every HTTP round-trip, key-store
//! access, biometric prompt, and OAuth token exchange funnels through the
//! traits in this module. Hosts supply implementations per platform; the
//! mocks used by the integration tests are implementations too.

pub mod biometry;
pub mod http;
pub mod keystore;
pub mod oauth;

use std::sync::Arc;

pub use biometry::{BiometryEvaluator, BiometrySubtype};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use keystore::{
  KeyAccess, KeyMaterial, KeyStore, KeyStoreError, MemoryKeyStore, PrivateKeySink, StoreKeySink,
};
pub use oauth::OAuthProvider;

/// The capability set a provider or service operates with.
#[derive(Clone)]
pub struct Capabilities {
  pub http: Arc<dyn HttpClient>,
  /// Client configured with a self-signed-certificate-accepting trust policy.
  /// Picked by the on-premise path when the bootstrap carries
  /// `ignoreSslCerts=true`; falls back to `http` when absent.
  pub insecure_http: Option<Arc<dyn HttpClient>>,
  pub key_store: Arc<dyn KeyStore>,
  pub biometry: Arc<dyn BiometryEvaluator>,
  pub oauth: Arc<dyn OAuthProvider>,
}

impl Capabilities {
  pub(crate) fn client(&self, ignore_ssl_certificate: bool) -> Arc<dyn HttpClient> {
    if ignore_ssl_certificate
      && let Some(insecure) = &self.insecure_http
    {
      return insecure.clone();
    }
    self.http.clone()
  }
}
