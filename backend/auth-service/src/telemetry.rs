use tracing_subscriber::EnvFilter;

/// Initialise structured logging.
///
/// `RUST_LOG` overrides the default filter; the service logs at info and the
/// noisier HTTP internals stay quiet unless asked for.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("auth_service=info,tower_http=warn,info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
