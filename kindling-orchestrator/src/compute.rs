//! CPU work dispatch
//!
//! Frontend passes and emission are CPU-bound and run on the rayon pool;
//! coordination runs on the async scheduler. The bridge here keeps the two
//! models apart: the closure executes on a rayon thread while the caller
//! awaits a oneshot, so cross-unit waits never pin a worker thread and
//! compute never blocks the scheduler.

use tokio::sync::oneshot;

use crate::error::BuildError;

/// Run `f` on the worker pool and await its result
pub(crate) async fn run_compute<T, F>(f: F) -> Result<T, BuildError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    rayon::spawn(move || {
        // The receiver may be gone if the pass was abandoned; nothing to do.
        let _ = tx.send(f());
    });
    rx.await
        .map_err(|_| BuildError::FrontendFault("worker pool dropped a compute task".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compute_returns_closure_result() {
        let value = run_compute(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_compute_runs_off_the_async_thread() {
        let caller = std::thread::current().id();
        let worker = run_compute(move || std::thread::current().id())
            .await
            .unwrap();
        assert_ne!(caller, worker);
    }
}
