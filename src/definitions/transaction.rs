//! Pending verification transactions raised by the backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// A server-raised authorization request, normalized from either backend's
/// wire shape. `data_to_sign` is signed as-is (UTF-8 bytes) by the factor
/// whose key label equals `key_name`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
  pub id:              String,
  pub message:         String,
  pub postback_uri:    Url,
  pub key_name:        String,
  pub factor_id:       String,
  pub factor_type:     String,
  pub data_to_sign:    String,
  pub time_stamp:      String,
  /// Contextual attributes such as ip, location, user-agent, type.
  #[serde(default)]
  pub additional_data: HashMap<String, String>,
}

impl PendingTransaction {
  /// The first 4 code points of the id, for compact display.
  pub fn short_id(&self) -> String { self.id.chars().take(4).collect() }
}

/// The next pending transaction, if any, and the total pending count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextTransactionInfo {
  pub current: Option<PendingTransaction>,
  pub count:   usize,
}

/// How the device owner answered a pending transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
  Verify,
  Deny,
}

impl UserAction {
  pub fn wire(&self) -> &'static str {
    match self {
      Self::Verify => "verify",
      Self::Deny => "deny",
    }
  }
}
