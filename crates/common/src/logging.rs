use crate::config::Environment;

/// Initialize the tracing subscriber: pretty output for development, JSON
/// for production.
///
/// Filtering comes from `RUST_LOG` (defaults to "info" if unset).
pub fn setup_logging(environment: Environment) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    match environment {
        Environment::Production => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .json()
                .with_level(true)
                .init();
        }
        Environment::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .pretty()
                .with_ansi(true)
                .init();
        }
    }
}
