use tracing_subscriber::{EnvFilter, fmt};

/// `RUST_LOG` wins over the configured level.
pub fn init(log_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)?,
    };

    fmt().with_env_filter(filter).with_target(false).try_init()
}
