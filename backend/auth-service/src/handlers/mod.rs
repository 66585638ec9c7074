pub mod auth;
pub mod federated;

pub use auth::{LoginResponse, RefreshResponse};
pub use federated::{OAuthLoginResponse, OAuthStartResponse};
