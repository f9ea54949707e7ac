//! Device attributes reported to the backend during registration, finalize,
//! and token refresh.

use serde::{Deserialize, Serialize};

/// Descriptive attributes of the device running the client.
///
/// `application_name` is carried for the host's benefit but is excluded from
/// outbound attribute payloads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
  pub device_name:      String,
  pub model_name:       String,
  pub os_version:       String,
  pub platform:         String,
  pub application_name: Option<String>,
}

impl Default for DeviceInfo {
  fn default() -> Self {
    Self {
      device_name:      std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
      model_name:       std::env::consts::ARCH.to_string(),
      os_version:       "unknown".to_string(),
      platform:         std::env::consts::OS.to_string(),
      application_name: None,
    }
  }
}

impl DeviceInfo {
  /// The attribute pairs sent to the backend, minus `applicationName`.
  pub fn attributes(&self) -> Vec<(String, String)> {
    vec![
      ("deviceName".to_string(), self.device_name.clone()),
      ("modelName".to_string(), self.model_name.clone()),
      ("osVersion".to_string(), self.os_version.clone()),
      ("platform".to_string(), self.platform.clone()),
    ]
  }
}
