//! Shared helpers for the integration tests.

use std::time::Duration;

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Polls `cond` every `step` until it holds or `deadline` elapses.
pub async fn wait_until<F>(deadline: Duration, step: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let end = tokio::time::Instant::now() + deadline;
    while tokio::time::Instant::now() < end {
        if cond() {
            return true;
        }
        tokio::time::sleep(step).await;
    }
    cond()
}
