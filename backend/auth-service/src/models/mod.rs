pub mod account;
pub mod identity;
pub mod oauth;

pub use account::{
    Account, ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest, Role,
};
pub use identity::AuthenticatedIdentity;
pub use oauth::{
    ExternalIdentityLink, FederatedCallback, OAuthCallbackParams, OAuthProvider,
    StartOAuthFlowRequest,
};
