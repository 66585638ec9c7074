use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{LoginResponse, OAuthLoginResponse, OAuthStartResponse, RefreshResponse};
use crate::models::{
    ChangePasswordRequest, LoginRequest, OAuthCallbackParams, RefreshTokenRequest,
    RegisterRequest, StartOAuthFlowRequest,
};
use crate::services::TokenPair;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::auth::change_password,
        crate::handlers::auth::me,
        crate::handlers::federated::start_flow,
        crate::handlers::federated::callback,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        RefreshTokenRequest,
        ChangePasswordRequest,
        StartOAuthFlowRequest,
        OAuthCallbackParams,
        LoginResponse,
        RefreshResponse,
        OAuthStartResponse,
        OAuthLoginResponse,
        TokenPair,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Local credential authentication"),
        (name = "oauth", description = "Federated login via external providers"),
    ),
    info(
        title = "Storefront Auth Service",
        description = "Authentication and session-integrity API",
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
