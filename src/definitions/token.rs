//! The OAuth token attached to an authenticator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_token_type() -> String { "Bearer".to_string() }

/// Access/refresh token pair plus whatever extra fields the issuer attached.
///
/// One document decodes from both wire conventions: the cloud tenant spells
/// fields camelCase, the on-premise token endpoint snake_case. Unrecognized
/// fields land in `additional_data` (the on-premise path relies on this for
/// `authenticator_id`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OAuthToken {
  #[serde(rename = "accessToken", alias = "access_token")]
  pub access_token: String,

  #[serde(
    rename = "refreshToken",
    alias = "refresh_token",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub refresh_token: Option<String>,

  #[serde(rename = "tokenType", alias = "token_type", default = "default_token_type")]
  pub token_type: String,

  #[serde(rename = "expiresIn", alias = "expires_in", default)]
  pub expires_in: u64,

  #[serde(flatten)]
  pub additional_data: Map<String, Value>,
}

impl OAuthToken {
  /// Value for the `Authorization` header, e.g. `"Bearer a1b2c3"`.
  pub fn authorization_header(&self) -> String {
    format!("{} {}", self.token_type, self.access_token)
  }

  /// The `authenticator_id` the on-premise token endpoint embeds in its
  /// response; expected to be a string.
  pub fn authenticator_id(&self) -> Option<&str> {
    self.additional_data.get("authenticator_id").and_then(Value::as_str)
  }
}
