//! The secure local key store capability and the key material it holds.
//!
//! Labels are globally unique per device; a biometric or user-presence
//! factor's `name` is the label of its backing key. Fetching a key stored
//! under a biometry access control may prompt the device owner, which is why
//! every operation here is a suspend point.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use uuid::Uuid;

use crate::{algorithm::SigningAlgorithm, crypto, error::MFAResult};

/// Access-control flag attached to a stored key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAccess {
  None,
  UserPresence,
  Biometry,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum KeyStoreError {
  #[error("invalid key")]
  InvalidKey,

  #[error("duplicate key")]
  DuplicateKey,

  #[error("unexpected data")]
  UnexpectedData,

  #[error("unhandled error: {0}")]
  UnhandledError(String),
}

/// A locally generated RSA key pair.
#[derive(Clone)]
pub struct KeyMaterial {
  private_key: RsaPrivateKey,
}

impl KeyMaterial {
  pub fn new(private_key: RsaPrivateKey) -> Self { Self { private_key } }

  /// Generates a fresh key pair of the given modulus size.
  pub fn generate(bits: usize) -> MFAResult<Self> {
    Ok(Self { private_key: crypto::generate_key_pair(bits)? })
  }

  /// Signs `data` with the private key after hashing it with `algorithm`;
  /// the result is Base64URL without padding.
  pub fn sign(&self, algorithm: SigningAlgorithm, data: &[u8]) -> MFAResult<String> {
    crypto::sign(data, &self.private_key, algorithm)
  }

  /// X.509 public key, Base-64 encoded, as carried by enrollment payloads.
  pub fn public_key_base64(&self) -> MFAResult<String> {
    crypto::public_key_base64(&self.private_key)
  }

  pub fn private_key(&self) -> &RsaPrivateKey { &self.private_key }
}

impl std::fmt::Debug for KeyMaterial {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("KeyMaterial").field("private_key", &"<redacted>").finish()
  }
}

/// The secure local key store. Process-wide shared; the host decides where
/// keys actually live (keychain, TPM, file).
#[async_trait]
pub trait KeyStore: Send + Sync {
  async fn store(
    &self,
    label: &str,
    key: &KeyMaterial,
    access: KeyAccess,
  ) -> Result<(), KeyStoreError>;

  /// Reading a key stored with a biometry access control prompts the device
  /// owner before resolving.
  async fn read(&self, label: &str) -> Result<KeyMaterial, KeyStoreError>;

  async fn rename(&self, current: &str, new: &str) -> Result<(), KeyStoreError>;

  async fn delete(&self, label: &str) -> Result<(), KeyStoreError>;

  async fn exists(&self, label: &str) -> bool;
}

/// Destination for a freshly generated private key during enrollment. The
/// provider hands over the material and receives back the label it was stored
/// under; that label is echoed to the server and becomes the factor's `name`.
///
/// This inversion lets the caller decide access-control flags per platform;
/// [`StoreKeySink`] is the stock implementation.
#[async_trait]
pub trait PrivateKeySink: Send + Sync {
  async fn save(&self, material: &KeyMaterial) -> MFAResult<String>;
}

/// Saves enrollment keys into a [`KeyStore`] under a UUID-suffixed label
/// (`"<uuid>.biometrics"` or `"<uuid>.userPresence"`). The suffix encodes the
/// factor kind; the server echoes the full label back as `keyName` in pending
/// transactions.
pub struct StoreKeySink {
  store:  Arc<dyn KeyStore>,
  suffix: &'static str,
  access: KeyAccess,
}

impl StoreKeySink {
  pub fn biometrics(store: Arc<dyn KeyStore>) -> Self {
    Self { store, suffix: "biometrics", access: KeyAccess::Biometry }
  }

  pub fn user_presence(store: Arc<dyn KeyStore>) -> Self {
    Self { store, suffix: "userPresence", access: KeyAccess::UserPresence }
  }
}

#[async_trait]
impl PrivateKeySink for StoreKeySink {
  async fn save(&self, material: &KeyMaterial) -> MFAResult<String> {
    let label = format!("{}.{}", Uuid::new_v4(), self.suffix);
    self.store.store(&label, material, self.access).await?;
    Ok(label)
  }
}

/// In-memory [`KeyStore`] backed by a map. Useful for tests and for hosts
/// without a platform store.
#[derive(Default)]
pub struct MemoryKeyStore {
  keys: std::sync::Mutex<HashMap<String, (KeyMaterial, KeyAccess)>>,
}

impl MemoryKeyStore {
  pub fn new() -> Self { Self::default() }

  pub fn labels(&self) -> Vec<String> { self.keys.lock().unwrap().keys().cloned().collect() }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
  async fn store(
    &self,
    label: &str,
    key: &KeyMaterial,
    access: KeyAccess,
  ) -> Result<(), KeyStoreError> {
    let mut keys = self.keys.lock().unwrap();
    if keys.contains_key(label) {
      return Err(KeyStoreError::DuplicateKey);
    }
    keys.insert(label.to_string(), (key.clone(), access));
    Ok(())
  }

  async fn read(&self, label: &str) -> Result<KeyMaterial, KeyStoreError> {
    let keys = self.keys.lock().unwrap();
    keys.get(label).map(|(key, _)| key.clone()).ok_or(KeyStoreError::InvalidKey)
  }

  async fn rename(&self, current: &str, new: &str) -> Result<(), KeyStoreError> {
    let mut keys = self.keys.lock().unwrap();
    if keys.contains_key(new) {
      return Err(KeyStoreError::DuplicateKey);
    }
    let entry = keys.remove(current).ok_or(KeyStoreError::InvalidKey)?;
    keys.insert(new.to_string(), entry);
    Ok(())
  }

  async fn delete(&self, label: &str) -> Result<(), KeyStoreError> {
    self.keys.lock().unwrap().remove(label).map(|_| ()).ok_or(KeyStoreError::InvalidKey)
  }

  async fn exists(&self, label: &str) -> bool { self.keys.lock().unwrap().contains_key(label) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn material() -> KeyMaterial { KeyMaterial::generate(1024).unwrap() }

  #[tokio::test]
  async fn store_and_read() {
    let store = MemoryKeyStore::new();
    let key = material();
    store.store("label", &key, KeyAccess::None).await.unwrap();
    assert!(store.exists("label").await);
    store.read("label").await.unwrap();
  }

  #[tokio::test]
  async fn duplicate_store_fails() {
    let store = MemoryKeyStore::new();
    store.store("label", &material(), KeyAccess::None).await.unwrap();
    let result = store.store("label", &material(), KeyAccess::None).await;
    assert_eq!(result, Err(KeyStoreError::DuplicateKey));
  }

  #[tokio::test]
  async fn read_missing_fails() {
    let store = MemoryKeyStore::new();
    assert_eq!(store.read("missing").await.unwrap_err(), KeyStoreError::InvalidKey);
  }

  #[tokio::test]
  async fn rename_moves_entry() {
    let store = MemoryKeyStore::new();
    store.store("old", &material(), KeyAccess::None).await.unwrap();
    store.rename("old", "new").await.unwrap();
    assert!(!store.exists("old").await);
    assert!(store.exists("new").await);
  }

  #[tokio::test]
  async fn sink_labels_encode_factor_kind() {
    let store = Arc::new(MemoryKeyStore::new());
    let key = material();

    let label = StoreKeySink::biometrics(store.clone()).save(&key).await.unwrap();
    assert!(label.ends_with(".biometrics"));
    assert!(store.exists(&label).await);

    let label = StoreKeySink::user_presence(store.clone()).save(&key).await.unwrap();
    assert!(label.ends_with(".userPresence"));
    assert!(store.exists(&label).await);
  }
}
