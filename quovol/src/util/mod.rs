use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use quovol_shared::errors::{QuovolError, QuovolResult};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::runtime::constants::filenames;
use crate::runtime::layout::StorageLayout;

/// Keeps the non-blocking writer flushing for the life of the process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the file logger under `<root>/logs`.
///
/// Only the first call installs a subscriber; later calls (another manager in
/// the same process, or a host that already set one up) are no-ops.
pub fn init_logging_for(layout: &StorageLayout) -> QuovolResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let logs_dir = layout.logs_dir();
    std::fs::create_dir_all(&logs_dir).map_err(|e| {
        QuovolError::Storage(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, filenames::LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Defaults to "info" if RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| QuovolError::Config(format!("invalid log filter: {}", e)))?;

    register_to_tracing(non_blocking, env_filter);
    let _ = LOG_GUARD.set(guard);

    Ok(())
}

pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();
}

/// Run `fut` with a deadline, mapping expiry through `on_timeout`.
///
/// The future is dropped on expiry, cancelling the underlying call.
pub async fn with_timeout<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce(String) -> QuovolError,
) -> QuovolResult<T>
where
    F: Future<Output = QuovolResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("timed out after {:?}", limit))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok(7) }, QuovolError::Internal).await;
        assert_eq!(ok, Ok(7));

        let err: QuovolResult<()> = with_timeout(
            Duration::from_secs(1),
            async { Err(QuovolError::Storage("disk".into())) },
            QuovolError::Internal,
        )
        .await;
        assert_eq!(err, Err(QuovolError::Storage("disk".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result: QuovolResult<()> = with_timeout(
            Duration::from_secs(5),
            std::future::pending(),
            |reason| QuovolError::Mount {
                name: "vol1".into(),
                reason,
            },
        )
        .await;

        match result {
            Err(QuovolError::Mount { name, reason }) => {
                assert_eq!(name, "vol1");
                assert!(reason.contains("timed out"), "{reason}");
            }
            other => panic!("expected mount timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_init_logging_creates_logs_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let layout = StorageLayout::new(temp_dir.path().to_path_buf());

        init_logging_for(&layout).unwrap();
        // Second install is a no-op
        init_logging_for(&layout).unwrap();
        assert!(LOG_GUARD.get().is_some());
    }
}
