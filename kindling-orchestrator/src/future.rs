//! Pre-allocated build promise
//!
//! A unit's build future must exist before the producing work starts: during
//! the pre-build fan-out every sibling gets a citable handle to await, even
//! though no unit has begun building. A `tokio::sync::watch` channel gives
//! exactly that shape - constructible empty, cloneable to any number of
//! awaiters, resolved once by the coordinator.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::BuildError;
use crate::output::BuildOutput;

type Slot = Option<Arc<BuildOutput>>;

/// Producer side; resolved exactly once by the owning unit's build
pub(crate) struct BuildPromise {
    tx: watch::Sender<Slot>,
}

/// Awaitable handle to a build that may not have started yet
#[derive(Clone)]
pub struct BuildFuture {
    rx: watch::Receiver<Slot>,
}

/// Allocate an unresolved promise/future pair
pub(crate) fn build_channel() -> (BuildPromise, BuildFuture) {
    let (tx, rx) = watch::channel(None);
    (BuildPromise { tx }, BuildFuture { rx })
}

impl BuildPromise {
    /// Publish the final output to every current and future awaiter
    pub(crate) fn resolve(self, output: Arc<BuildOutput>) {
        // send_replace delivers even when no receiver is currently awaiting
        self.tx.send_replace(Some(output));
    }
}

impl BuildFuture {
    /// Wait for the build to publish its output.
    ///
    /// Errs only if the promise was dropped unresolved, which the coordinator
    /// prevents for every path it controls; the error exists so an awaiting
    /// unit degrades instead of hanging if that contract is ever broken.
    pub async fn wait(&self) -> Result<Arc<BuildOutput>, BuildError> {
        let mut rx = self.rx.clone();
        let slot = rx.wait_for(|slot| slot.is_some()).await.map_err(|_| {
            BuildError::InvalidOperation("build future abandoned before resolving".to_string())
        })?;
        Ok(slot.clone().expect("checked by wait_for"))
    }

    /// The output, if already published
    pub fn try_get(&self) -> Option<Arc<BuildOutput>> {
        self.rx.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(version: u64) -> Arc<BuildOutput> {
        Arc::new(BuildOutput {
            unit: "core".to_string(),
            version,
            success: true,
            binary: None,
            diagnostics: Vec::new(),
            exception: None,
        })
    }

    #[tokio::test]
    async fn test_wait_after_resolve() {
        let (promise, future) = build_channel();
        promise.resolve(output(1));
        let result = future.wait().await.unwrap();
        assert_eq!(result.version, 1);
    }

    #[tokio::test]
    async fn test_wait_before_resolve() {
        let (promise, future) = build_channel();
        assert!(!future.is_resolved());

        let waiter = tokio::spawn({
            let future = future.clone();
            async move { future.wait().await }
        });
        promise.resolve(output(2));

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.version, 2);
        assert!(future.is_resolved());
    }

    #[tokio::test]
    async fn test_many_awaiters_observe_same_output() {
        let (promise, future) = build_channel();
        let a = future.clone();
        let b = future.clone();
        promise.resolve(output(3));

        let out_a = a.wait().await.unwrap();
        let out_b = b.wait().await.unwrap();
        assert!(Arc::ptr_eq(&out_a, &out_b));
    }

    #[tokio::test]
    async fn test_dropped_promise_is_an_error() {
        let (promise, future) = build_channel();
        drop(promise);
        assert!(future.wait().await.is_err());
    }
}
