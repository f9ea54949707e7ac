//! OAuth capability used by the on-premise path: exchanges the registration
//! code for an access/refresh token pair and later refreshes it. Extra
//! parameters ride along with the grant; the scope is fixed by the caller.

use async_trait::async_trait;
use url::Url;

use crate::{definitions::token::OAuthToken, error::MFAResult};

#[async_trait]
pub trait OAuthProvider: Send + Sync {
  /// Authorization-code grant with additional form parameters.
  async fn exchange_code(
    &self,
    token_endpoint: &Url,
    client_id: &str,
    code: &str,
    scope: &[&str],
    extra_parameters: &[(String, String)],
  ) -> MFAResult<OAuthToken>;

  /// Refresh-token grant with additional form parameters.
  async fn refresh(
    &self,
    token_endpoint: &Url,
    client_id: &str,
    refresh_token: &str,
    extra_parameters: &[(String, String)],
  ) -> MFAResult<OAuthToken>;
}
