pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// Filter precedence: `SOPFLOW_LOG`, then `RUST_LOG`, then
/// `config::default_log_filter()`. Logs go to stderr so `--json` output on
/// stdout stays machine-readable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(config::LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
