use base64::{Engine, engine::general_purpose};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, pkcs8::EncodePublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::{
  algorithm::SigningAlgorithm,
  error::{MFAError, MFAResult},
  rng::GlobalRng,
};

/// RSA modulus size used for enrollment key pairs.
pub(crate) const DEFAULT_KEY_BITS: usize = 2048;

pub(crate) fn generate_key_pair(bits: usize) -> MFAResult<RsaPrivateKey> {
  Ok(RsaPrivateKey::new(&mut GlobalRng, bits)?)
}

/// PKCS#1 v1.5 signature over the digest of `data`, encoded as Base64URL
/// without padding.
pub(crate) fn sign(
  data: &[u8],
  key: &RsaPrivateKey,
  algorithm: SigningAlgorithm,
) -> MFAResult<String> {
  let digest = algorithm.hash(data);
  let padding = match algorithm {
    SigningAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
    SigningAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
    SigningAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
    SigningAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
  };
  let signature = key.sign(padding, &digest)?;
  Ok(general_purpose::URL_SAFE_NO_PAD.encode(signature))
}

/// X.509 SubjectPublicKeyInfo form of the public key, Base-64 encoded. This is
/// the `publicKey` value the enrollment payloads carry.
pub(crate) fn public_key_base64(key: &RsaPrivateKey) -> MFAResult<String> {
  let der = key.to_public_key().to_public_key_der().map_err(|_| MFAError::InvalidKeyEncoding)?;
  Ok(general_purpose::STANDARD.encode(der.as_bytes()))
}

#[cfg(test)]
mod tests {
  use rsa::Pkcs1v15Sign;
  use sha2::{Digest, Sha256};

  use super::*;

  // 1024-bit keys keep the tests fast; enrollment uses DEFAULT_KEY_BITS.
  const TEST_KEY_BITS: usize = 1024;

  #[test]
  fn sign_verifies_against_public_key() {
    let key = generate_key_pair(TEST_KEY_BITS).unwrap();
    let signature = sign(b"challenge", &key, SigningAlgorithm::Sha256).unwrap();

    let raw = general_purpose::URL_SAFE_NO_PAD.decode(signature).unwrap();
    let digest = Sha256::digest(b"challenge");
    key.to_public_key().verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &raw).unwrap();
  }

  #[test]
  fn sign_differs_by_algorithm() {
    let key = generate_key_pair(TEST_KEY_BITS).unwrap();
    let sha256 = sign(b"challenge", &key, SigningAlgorithm::Sha256).unwrap();
    let sha512 = sign(b"challenge", &key, SigningAlgorithm::Sha512).unwrap();
    assert_ne!(sha256, sha512);
  }

  #[test]
  fn public_key_is_der_spki() {
    let key = generate_key_pair(TEST_KEY_BITS).unwrap();
    let encoded = public_key_base64(&key).unwrap();
    let der = general_purpose::STANDARD.decode(encoded).unwrap();
    // DER SEQUENCE tag
    assert_eq!(der[0], 0x30);
  }
}
