pub mod auth;
pub mod federation;
pub mod tokens;

pub use auth::AuthOrchestrator;
pub use federation::{FederationService, IdentityReconciler};
pub use tokens::{TokenPair, TokenService};
