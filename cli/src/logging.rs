use tracing_subscriber::EnvFilter;

/// Console logging to stderr. `RUST_LOG` overrides `default_level`.
pub fn init(default_level: tracing::Level) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
