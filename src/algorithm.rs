//! Signature hash selection and the aliasing layer that bridges the server-side
//! naming conventions (`RSASHA256`, `SHA256withRSA`, `HMACSHA256`, plain
//! `SHA256`) to a single internal identity and back to the two wire spellings.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha384, Sha512};

use crate::error::MFAError;

/// The hash algorithm backing an enrolled factor.
///
/// A factor's algorithm fixes both the digest applied before RSA signing and
/// the outbound algorithm string in enrollment payloads.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlgorithm {
  /// SHA-1. Accepted inbound for compatibility, never emitted outbound.
  Sha1,
  /// SHA-256
  Sha256,
  /// SHA-384
  Sha384,
  /// SHA-512
  Sha512,
}

impl SigningAlgorithm {
  /// Parses any of the known server spellings, case-insensitive. Unknown
  /// input returns `None`.
  pub fn parse(value: &str) -> Option<Self> {
    match value.to_ascii_uppercase().as_str() {
      "SHA1" | "HMACSHA1" | "RSASHA1" | "SHA1WITHRSA" => Some(Self::Sha1),
      "SHA256" | "HMACSHA256" | "RSASHA256" | "SHA256WITHRSA" => Some(Self::Sha256),
      "SHA384" | "HMACSHA384" | "RSASHA384" | "SHA384WITHRSA" => Some(Self::Sha384),
      "SHA512" | "HMACSHA512" | "RSASHA512" | "SHA512WITHRSA" => Some(Self::Sha512),
      _ => None,
    }
  }

  /// Canonical outbound spelling for the cloud tenant.
  ///
  /// The server never negotiates sha1 as preferred, so sha1 is substituted
  /// with `RSASHA256` instead of failing at the aliasing layer.
  pub fn cloud_spelling(&self) -> &'static str {
    match self {
      Self::Sha256 => "RSASHA256",
      Self::Sha384 => "RSASHA384",
      Self::Sha512 => "RSASHA512",
      Self::Sha1 => {
        log::debug!("sha1 has no outbound cloud spelling, substituting RSASHA256");
        "RSASHA256"
      },
    }
  }

  /// Canonical outbound spelling for the on-premise access manager, with the
  /// same sha1 substitution policy (`SHA512withRSA`).
  pub fn onprem_spelling(&self) -> &'static str {
    match self {
      Self::Sha256 => "SHA256withRSA",
      Self::Sha384 => "SHA384withRSA",
      Self::Sha512 => "SHA512withRSA",
      Self::Sha1 => {
        log::debug!("sha1 has no outbound on-premise spelling, substituting SHA512withRSA");
        "SHA512withRSA"
      },
    }
  }

  /// Digest of `data` under the selected hash.
  pub fn hash(&self, data: &[u8]) -> Vec<u8> {
    match self {
      Self::Sha1 => Sha1::digest(data).to_vec(),
      Self::Sha256 => Sha256::digest(data).to_vec(),
      Self::Sha384 => Sha384::digest(data).to_vec(),
      Self::Sha512 => Sha512::digest(data).to_vec(),
    }
  }
}

impl std::fmt::Display for SigningAlgorithm {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", match self {
      Self::Sha1 => "sha1",
      Self::Sha256 => "sha256",
      Self::Sha384 => "sha384",
      Self::Sha512 => "sha512",
    })
  }
}

impl std::str::FromStr for SigningAlgorithm {
  type Err = MFAError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| MFAError::InvalidAlgorithm(s.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALIASES: [(&str, SigningAlgorithm); 16] = [
    ("SHA1", SigningAlgorithm::Sha1),
    ("HMACSHA1", SigningAlgorithm::Sha1),
    ("RSASHA1", SigningAlgorithm::Sha1),
    ("SHA1WITHRSA", SigningAlgorithm::Sha1),
    ("SHA256", SigningAlgorithm::Sha256),
    ("HMACSHA256", SigningAlgorithm::Sha256),
    ("RSASHA256", SigningAlgorithm::Sha256),
    ("SHA256WITHRSA", SigningAlgorithm::Sha256),
    ("SHA384", SigningAlgorithm::Sha384),
    ("HMACSHA384", SigningAlgorithm::Sha384),
    ("RSASHA384", SigningAlgorithm::Sha384),
    ("SHA384WITHRSA", SigningAlgorithm::Sha384),
    ("SHA512", SigningAlgorithm::Sha512),
    ("HMACSHA512", SigningAlgorithm::Sha512),
    ("RSASHA512", SigningAlgorithm::Sha512),
    ("SHA512WITHRSA", SigningAlgorithm::Sha512),
  ];

  #[test]
  fn parse_aliases_both_cases() {
    for (alias, expected) in ALIASES {
      assert_eq!(SigningAlgorithm::parse(alias), Some(expected), "{alias}");
      assert_eq!(SigningAlgorithm::parse(&alias.to_lowercase()), Some(expected), "{alias}");
    }
  }

  #[test]
  fn parse_mixed_case() {
    assert_eq!(SigningAlgorithm::parse("SHA256withRSA"), Some(SigningAlgorithm::Sha256));
    assert_eq!(SigningAlgorithm::parse("Sha512WithRsa"), Some(SigningAlgorithm::Sha512));
  }

  #[test]
  fn parse_unknown() {
    assert_eq!(SigningAlgorithm::parse("INVALID"), None);
    assert_eq!(SigningAlgorithm::parse("MD5"), None);
    assert_eq!(SigningAlgorithm::parse(""), None);
  }

  #[test]
  fn cloud_spellings() {
    assert_eq!(SigningAlgorithm::Sha256.cloud_spelling(), "RSASHA256");
    assert_eq!(SigningAlgorithm::Sha384.cloud_spelling(), "RSASHA384");
    assert_eq!(SigningAlgorithm::Sha512.cloud_spelling(), "RSASHA512");
    assert_eq!(SigningAlgorithm::Sha1.cloud_spelling(), "RSASHA256");
  }

  #[test]
  fn onprem_spellings() {
    assert_eq!(SigningAlgorithm::Sha256.onprem_spelling(), "SHA256withRSA");
    assert_eq!(SigningAlgorithm::Sha384.onprem_spelling(), "SHA384withRSA");
    assert_eq!(SigningAlgorithm::Sha512.onprem_spelling(), "SHA512withRSA");
    assert_eq!(SigningAlgorithm::Sha1.onprem_spelling(), "SHA512withRSA");
  }

  #[test]
  fn outbound_spellings_round_trip() {
    for algorithm in [SigningAlgorithm::Sha256, SigningAlgorithm::Sha384, SigningAlgorithm::Sha512]
    {
      assert_eq!(SigningAlgorithm::parse(algorithm.cloud_spelling()), Some(algorithm));
      assert_eq!(SigningAlgorithm::parse(algorithm.onprem_spelling()), Some(algorithm));
    }
  }

  #[test]
  fn digest_lengths() {
    assert_eq!(SigningAlgorithm::Sha1.hash(b"data").len(), 20);
    assert_eq!(SigningAlgorithm::Sha256.hash(b"data").len(), 32);
    assert_eq!(SigningAlgorithm::Sha384.hash(b"data").len(), 48);
    assert_eq!(SigningAlgorithm::Sha512.hash(b"data").len(), 64);
  }

  #[test]
  fn serde_lowercase_spelling() {
    assert_eq!(serde_json::to_string(&SigningAlgorithm::Sha256).unwrap(), "\"sha256\"");
    let parsed: SigningAlgorithm = serde_json::from_str("\"sha384\"").unwrap();
    assert_eq!(parsed, SigningAlgorithm::Sha384);
  }
}
