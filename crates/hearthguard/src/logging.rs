//! `tracing` subscriber setup for binaries built on Hearthguard.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a formatted `tracing` subscriber as the global default.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used (for
/// example `"info"` or `"hearthguard_session=debug,info"`). Calling this
/// twice is harmless: the second call leaves the first subscriber in place.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("global subscriber already set, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging("debug");
        init_logging("not a valid [filter");
        tracing::info!("still logging");
    }
}
