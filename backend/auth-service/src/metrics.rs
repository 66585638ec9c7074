use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

// Registration only fails on a duplicate name or malformed descriptor, both
// programming errors: panic rather than serve without the metric.

pub static LOGIN_SUCCESS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("auth_login_success_total", "Successful logins")
        .expect("auth_login_success_total can be registered")
});

pub static LOGIN_FAILURE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("auth_login_failure_total", "Rejected login attempts")
        .expect("auth_login_failure_total can be registered")
});

pub static TOKEN_PAIRS_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "auth_token_pairs_issued_total",
        "Access/refresh token pairs issued"
    )
    .expect("auth_token_pairs_issued_total can be registered")
});

pub static TOKENS_REFRESHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "auth_tokens_refreshed_total",
        "Access tokens minted from refresh tokens"
    )
    .expect("auth_tokens_refreshed_total can be registered")
});

pub static TOKENS_REVOKED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "auth_tokens_revoked_total",
        "Access tokens inserted into the revocation store"
    )
    .expect("auth_tokens_revoked_total can be registered")
});

pub static REVOCATION_SWEEP_EVICTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "auth_revocation_sweep_evictions_total",
        "Expired entries removed by the periodic revocation sweep"
    )
    .expect("auth_revocation_sweep_evictions_total can be registered")
});

pub static REVOKED_TOKENS_LIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "auth_revoked_tokens_live",
        "Unexpired entries currently held by the revocation store"
    )
    .expect("auth_revoked_tokens_live can be registered")
});

pub static FEDERATED_LOGINS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "auth_federated_logins_total",
        "Completed federated login callbacks"
    )
    .expect("auth_federated_logins_total can be registered")
});
