pub mod authenticator;
pub mod device;
pub mod factor;
pub mod token;
pub mod transaction;

pub use authenticator::{
  Authenticator, CloudAuthenticator, MFAAuthenticator, OnPremiseAuthenticator,
};
pub use device::DeviceInfo;
pub use factor::{
  BiometricFactorInfo, Factor, FactorType, HOTPFactorInfo, TOTPFactorInfo, UserPresenceFactorInfo,
};
pub use token::OAuthToken;
pub use transaction::{NextTransactionInfo, PendingTransaction, UserAction};
