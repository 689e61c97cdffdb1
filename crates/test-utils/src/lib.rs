pub mod builders;
pub mod fake_backend;
pub mod fake_connector;
pub mod fake_provider;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Send cloudstep's tracing output to the test harness.
///
/// Safe to call from every test; only the first call installs the subscriber.
/// Output shows up for failing tests only. `RUST_LOG=cloudstep=debug` turns
/// on per-node dispatch and retry logs.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Bound an apply that runs on the real clock.
///
/// Fake providers and connectors answer immediately, so a whole stack applies
/// well within five seconds. Paused-clock tests leave this out.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("apply did not finish within 5 seconds")
}
