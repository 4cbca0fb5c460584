//! Tracing initialization

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize console tracing with an env-filter fallback chain.
pub fn init_tracing(default_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init so embedding tests can call this more than once
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
