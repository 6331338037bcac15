// Third Party
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Logs go to stderr, stdout is reserved for routed events.
/// `RUST_LOG` takes precedence over `level`, which otherwise applies to `crate_name` only.
pub fn init_tracing(crate_name: &str, level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{}={}",
            crate_name,
            level.to_string().to_lowercase()
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
