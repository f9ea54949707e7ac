//! OTP Auth URI ingestion and generation for TOTP and HOTP credentials
//! compatible with Google Authenticator and other OTP authenticators, plus
//! RFC 4226 token generation.

use std::fmt::Write;

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use url::Url;
use uuid::Uuid;

use crate::{
  algorithm::SigningAlgorithm,
  definitions::factor::{FactorType, HOTPFactorInfo, TOTPFactorInfo},
  error::{MFAError, MFAResult},
};

/// An OATH credential is either a TOTP (time-based) or a HOTP (counter-based)
/// one-time password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  Totp,
  Hotp,
}

impl std::fmt::Display for Kind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", match self {
      Kind::Totp => "totp",
      Kind::Hotp => "hotp",
    })
  }
}

/// Decodes a Base-32 secret per RFC 4648: padding `=` terminates the input,
/// any other character outside the alphabet fails the entire decode.
pub fn decode_base32_secret(secret: &str) -> MFAResult<Vec<u8>> {
  let effective = secret.split('=').next().unwrap_or_default();
  BASE32_NOPAD.decode(effective.as_bytes()).map_err(|_| MFAError::InvalidSecret)
}

/// Generates a counter-based one-time token per RFC 4226 dynamic truncation.
pub fn generate_otp_token(
  secret: &[u8],
  counter: u64,
  algorithm: SigningAlgorithm,
  digits: u32,
) -> u32 {
  let counter_bytes = counter.to_be_bytes();

  let digest = match algorithm {
    SigningAlgorithm::Sha1 => {
      let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(secret).unwrap();
      mac.update(&counter_bytes);
      mac.finalize().into_bytes().to_vec()
    },
    SigningAlgorithm::Sha256 => {
      let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret).unwrap();
      mac.update(&counter_bytes);
      mac.finalize().into_bytes().to_vec()
    },
    SigningAlgorithm::Sha384 => {
      let mut mac = <Hmac<Sha384> as Mac>::new_from_slice(secret).unwrap();
      mac.update(&counter_bytes);
      mac.finalize().into_bytes().to_vec()
    },
    SigningAlgorithm::Sha512 => {
      let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(secret).unwrap();
      mac.update(&counter_bytes);
      mac.finalize().into_bytes().to_vec()
    },
  };

  // Dynamic truncation as per RFC 4226
  let offset = (digest[digest.len() - 1] & 0xf) as usize;
  let code = u32::from_be_bytes([
    digest[offset] & 0x7f,
    digest[offset + 1],
    digest[offset + 2],
    digest[offset + 3],
  ]);

  code % 10_u32.pow(digits)
}

/// A TOTP or HOTP credential ingested from an `otpauth://` provisioning URI,
/// typically scanned from a QR code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OTPAuthenticator {
  pub service_name: String,
  pub account_name: String,
  pub factor:       FactorType,
}

impl OTPAuthenticator {
  /// Parses a URI of the form
  /// `otpauth://{totp|hotp}/{label}?secret=…&issuer=…&algorithm=…&digits=…&period=…&counter=…`.
  ///
  /// `algorithm` defaults to sha1 and must parse under the alias table when
  /// supplied; `digits` defaults to 6 and must be 6 or 8; `period` defaults to
  /// 30 and must lie in `[10, 300]` for TOTP; `counter` defaults to 1.
  pub fn parse(uri: &str) -> MFAResult<Self> {
    let url = Url::parse(uri).map_err(|_| MFAError::InvalidOtpAuthUrl("malformed uri"))?;
    if url.scheme() != "otpauth" {
      return Err(MFAError::InvalidOtpAuthUrl("scheme must be otpauth"));
    }
    let kind = match url.host_str() {
      Some("totp") => Kind::Totp,
      Some("hotp") => Kind::Hotp,
      _ => return Err(MFAError::InvalidOtpAuthUrl("type must be totp or hotp")),
    };

    let mut secret = None;
    let mut issuer = None;
    let mut algorithm = None;
    let mut digits = None;
    let mut period = None;
    let mut counter = None;
    for (name, value) in url.query_pairs() {
      match name.as_ref() {
        "secret" => secret = Some(value.into_owned()),
        "issuer" => issuer = Some(value.into_owned()),
        "algorithm" => {
          algorithm = Some(
            SigningAlgorithm::parse(&value)
              .ok_or_else(|| MFAError::InvalidAlgorithm(value.into_owned()))?,
          );
        },
        "digits" => digits = Some(value.parse().map_err(|_| MFAError::InvalidOTPDigits)?),
        "period" => period = Some(value.parse().map_err(|_| MFAError::InvalidTOTPPeriod)?),
        "counter" => {
          counter = Some(value.parse().map_err(|_| MFAError::InvalidOtpAuthUrl("counter"))?);
        },
        _ => {},
      }
    }

    let secret = secret.ok_or(MFAError::InvalidOtpAuthUrl("secret is required"))?;
    let algorithm = algorithm.unwrap_or(SigningAlgorithm::Sha1);
    let digits: u32 = digits.unwrap_or(6);
    if digits != 6 && digits != 8 {
      return Err(MFAError::InvalidOTPDigits);
    }
    let period: u64 = period.unwrap_or(30);
    if matches!(kind, Kind::Totp) && !(10..=300).contains(&period) {
      return Err(MFAError::InvalidTOTPPeriod);
    }
    let counter: u64 = counter.unwrap_or(1);

    let label = url.path().trim_start_matches('/').to_string();
    let (service_name, account_name) = match (&issuer, label.split_once(':')) {
      (Some(issuer), Some((prefix, account))) if prefix == issuer =>
        (issuer.clone(), account.trim().to_string()),
      (Some(issuer), _) => (issuer.clone(), label),
      (None, _) => (label.clone(), label),
    };

    let id = Uuid::new_v4().to_string();
    let factor = match kind {
      Kind::Totp => FactorType::Totp(TOTPFactorInfo { id, secret, algorithm, digits, period }),
      Kind::Hotp => FactorType::Hotp(HOTPFactorInfo { id, secret, algorithm, digits, counter }),
    };

    Ok(Self { service_name, account_name, factor })
  }

  /// Renders the credential back into a provisioning URI.
  pub fn uri(&self) -> MFAResult<String> {
    let (kind, secret, algorithm, digits) = match &self.factor {
      FactorType::Totp(info) => (Kind::Totp, &info.secret, info.algorithm, info.digits),
      FactorType::Hotp(info) => (Kind::Hotp, &info.secret, info.algorithm, info.digits),
      _ => return Err(MFAError::InvalidOtpAuthUrl("factor is not an OTP credential")),
    };

    let label = if self.service_name.is_empty() || self.service_name == self.account_name {
      self.account_name.clone()
    } else {
      format!("{}:{}", self.service_name, self.account_name)
    };

    let mut url = format!("otpauth://{kind}/{label}?secret={secret}");
    if !self.service_name.is_empty() {
      write!(&mut url, "&issuer={}", self.service_name)?;
    }
    let algorithm = algorithm.to_string().to_ascii_uppercase();
    write!(&mut url, "&algorithm={algorithm}&digits={digits}")?;
    match &self.factor {
      FactorType::Totp(info) => write!(&mut url, "&period={}", info.period)?,
      FactorType::Hotp(info) => write!(&mut url, "&counter={}", info.counter)?,
      _ => unreachable!(),
    }

    Ok(url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_totp_with_defaults() {
    let authenticator =
      OTPAuthenticator::parse("otpauth://totp/alice@example.com?secret=JBSWY3DPEHPK3PXP").unwrap();
    assert_eq!(authenticator.account_name, "alice@example.com");
    let FactorType::Totp(info) = &authenticator.factor else { panic!("expected totp") };
    assert_eq!(info.algorithm, SigningAlgorithm::Sha1);
    assert_eq!(info.digits, 6);
    assert_eq!(info.period, 30);
  }

  #[test]
  fn parse_hotp_with_counter() {
    let authenticator = OTPAuthenticator::parse(
      "otpauth://hotp/Acme:alice?secret=JBSWY3DPEHPK3PXP&issuer=Acme&counter=7&digits=8",
    )
    .unwrap();
    assert_eq!(authenticator.service_name, "Acme");
    assert_eq!(authenticator.account_name, "alice");
    let FactorType::Hotp(info) = &authenticator.factor else { panic!("expected hotp") };
    assert_eq!(info.counter, 7);
    assert_eq!(info.digits, 8);
  }

  #[test]
  fn parse_hotp_defaults_counter_to_one() {
    let authenticator =
      OTPAuthenticator::parse("otpauth://hotp/alice?secret=JBSWY3DPEHPK3PXP").unwrap();
    let FactorType::Hotp(info) = &authenticator.factor else { panic!("expected hotp") };
    assert_eq!(info.counter, 1);
  }

  #[test]
  fn label_not_split_when_issuer_differs() {
    let authenticator = OTPAuthenticator::parse(
      "otpauth://totp/Other:alice?secret=JBSWY3DPEHPK3PXP&issuer=Acme",
    )
    .unwrap();
    assert_eq!(authenticator.service_name, "Acme");
    assert_eq!(authenticator.account_name, "Other:alice");
  }

  #[test]
  fn rejects_wrong_scheme() {
    let result = OTPAuthenticator::parse("https://totp/alice?secret=JBSWY3DPEHPK3PXP");
    assert!(matches!(result, Err(MFAError::InvalidOtpAuthUrl(_))));
  }

  #[test]
  fn rejects_missing_secret() {
    let result = OTPAuthenticator::parse("otpauth://totp/alice");
    assert!(matches!(result, Err(MFAError::InvalidOtpAuthUrl(_))));
  }

  #[test]
  fn rejects_unknown_algorithm() {
    let result =
      OTPAuthenticator::parse("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&algorithm=MD5");
    assert!(matches!(result, Err(MFAError::InvalidAlgorithm(_))));
  }

  #[test]
  fn rejects_seven_digits() {
    let result = OTPAuthenticator::parse("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&digits=7");
    assert!(matches!(result, Err(MFAError::InvalidOTPDigits)));
  }

  #[test]
  fn rejects_out_of_range_period() {
    for period in ["5", "301"] {
      let uri = format!("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&period={period}");
      assert!(matches!(OTPAuthenticator::parse(&uri), Err(MFAError::InvalidTOTPPeriod)));
    }
  }

  #[test]
  fn period_not_validated_for_hotp() {
    let authenticator =
      OTPAuthenticator::parse("otpauth://hotp/alice?secret=JBSWY3DPEHPK3PXP&period=5").unwrap();
    assert!(matches!(authenticator.factor, FactorType::Hotp(_)));
  }

  #[test]
  fn uri_round_trip() {
    let original = OTPAuthenticator::parse(
      "otpauth://totp/Acme:alice?secret=JBSWY3DPEHPK3PXP&issuer=Acme&algorithm=SHA256&digits=8&period=60",
    )
    .unwrap();
    let reparsed = OTPAuthenticator::parse(&original.uri().unwrap()).unwrap();
    assert_eq!(reparsed.service_name, original.service_name);
    assert_eq!(reparsed.account_name, original.account_name);
    let (FactorType::Totp(a), FactorType::Totp(b)) = (&original.factor, &reparsed.factor) else {
      panic!("expected totp")
    };
    assert_eq!((a.digits, a.period, a.algorithm), (b.digits, b.period, b.algorithm));
  }

  #[test]
  fn base32_padding_terminates_input() {
    let decoded = decode_base32_secret("JBSWY3DP======").unwrap();
    assert_eq!(decoded, b"Hello");
  }

  #[test]
  fn base32_rejects_illegal_characters() {
    // '1' and '!' are outside the RFC 4648 alphabet
    assert!(decode_base32_secret("JBSWY31P").is_err());
    assert!(decode_base32_secret("JBSW!").is_err());
  }

  #[test]
  fn rfc4226_reference_vectors() {
    // RFC 4226 appendix D, secret "12345678901234567890"
    let secret = b"12345678901234567890";
    let expected = [755224_u32, 287082, 359152, 969429, 338314];
    for (counter, expected) in expected.into_iter().enumerate() {
      assert_eq!(generate_otp_token(secret, counter as u64, SigningAlgorithm::Sha1, 6), expected);
    }
  }
}
