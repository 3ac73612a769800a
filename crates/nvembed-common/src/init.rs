//! Global initialization utilities for processes embedding nvembed

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static ENV_INIT: Once = Once::new();
static TRACING_INIT: Once = Once::new();

/// Initialize the process environment
///
/// Loads variables from a `.env` file (current directory or any parent) so
/// that `NVIDIA_API_KEY` and `NVIDIA_TIMEOUT` can live outside the shell.
///
/// Safe to call multiple times - will only run once
pub fn initialize_environment() {
    ENV_INIT.call_once(|| {
        dotenvy::dotenv().ok();
    });
}

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over `default_level`. With `json` set, events
/// are emitted as one JSON object per line.
///
/// Safe to call multiple times - only the first call installs a subscriber,
/// and an already-installed subscriber (e.g. from the host application) is kept.
pub fn init_tracing(default_level: &str, json: bool) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr);

        let installed = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };

        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed, keeping it");
        }
    });
}

/// Initialize environment for tests
///
/// Loads `.env.test` (falling back to `.env`) and installs a test-friendly
/// subscriber at `debug` level.
pub fn initialize_test_environment() {
    ENV_INIT.call_once(|| {
        dotenvy::from_filename(".env.test")
            .or_else(|_| dotenvy::dotenv())
            .ok();
    });
    init_tracing("debug", false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_is_idempotent() {
        initialize_test_environment();
        initialize_environment();
        init_tracing("info", true);
        initialize_test_environment();
    }
}
