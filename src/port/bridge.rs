//! Hand-off between a blocked caller and one spawned channel task.
//!
//! The caller spawns a single task and parks on a one-shot receiver. The task
//! owns everything it touches (endpoints are moved in and handed back in the
//! result), applies its own deadline, and sends exactly once when finished.
//! If the task is dropped or panics the sender goes with it, which wakes the
//! caller with [`PortError::TaskLost`] instead of leaving it parked.
//!
//! Callers on plain threads and on `spawn_blocking` threads park directly.
//! Callers on a multi-thread runtime worker park through `block_in_place`.
//! Only a current-thread runtime is refused: parking its one thread would
//! stop every task on it.

use super::error::PortError;
use std::future::Future;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tokio::sync::oneshot;

/// Runtime the adapter spawns its channel tasks on.
#[derive(Debug)]
pub(crate) struct Executor {
    handle: Handle,
    owned: Option<Runtime>,
}

impl Executor {
    /// Build a dedicated multi-thread runtime.
    pub(crate) fn owned(worker_threads: usize) -> Result<Self, PortError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("serial-channel")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(runtime),
        })
    }

    /// Spawn onto a runtime someone else owns.
    pub(crate) fn shared(handle: Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Run `task` on the runtime and block until it signals completion.
    pub(crate) fn hand_off<T, F>(&self, task: F) -> Result<T, PortError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let on_runtime = ensure_blocking_allowed()?;

        let (release, released) = oneshot::channel();
        self.handle.spawn(async move {
            let _ = release.send(task.await);
        });
        let outcome = if on_runtime {
            tokio::task::block_in_place(|| released.blocking_recv())
        } else {
            released.blocking_recv()
        };
        outcome.map_err(|_| PortError::TaskLost)
    }

    /// Stop an owned runtime without waiting for its worker threads.
    pub(crate) fn shutdown(&mut self) {
        if let Some(runtime) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}

/// Refuse to park the only thread of a current-thread runtime.
///
/// Returns `true` when the caller is inside a multi-thread runtime context
/// and has to park through `block_in_place`.
pub(crate) fn ensure_blocking_allowed() -> Result<bool, PortError> {
    match Handle::try_current() {
        Err(_) => Ok(false),
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(PortError::BlockingInAsyncContext),
            _ => Ok(true),
        },
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_hand_off_returns_task_output() {
        let executor = Executor::owned(1).unwrap();
        let value = executor.hand_off(async { 41 + 1 }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_panicking_task_releases_caller() {
        let executor = Executor::owned(1).unwrap();
        let result: Result<(), _> = executor.hand_off(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            panic!("channel task blew up");
        });
        assert!(matches!(result, Err(PortError::TaskLost)));
    }

    #[test]
    fn test_shutdown_runtime_releases_caller() {
        let mut executor = Executor::owned(1).unwrap();
        let handle = executor.handle().clone();
        executor.shutdown();

        let shared = Executor::shared(handle);
        let result = shared.hand_off(async { 1 });
        assert!(matches!(result, Err(PortError::TaskLost)));
    }

    #[tokio::test]
    async fn test_refuses_to_block_current_thread_runtime() {
        let executor = Executor::shared(Handle::current());
        let result = executor.hand_off(async { 1 });
        assert!(matches!(result, Err(PortError::BlockingInAsyncContext)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hand_off_from_worker_thread() {
        let executor = Executor::shared(Handle::current());
        let value = tokio::spawn(async move { executor.hand_off(async { 6 * 7 }) })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_hand_off_from_blocking_pool() {
        let executor = Executor::shared(Handle::current());
        let value = tokio::task::spawn_blocking(move || executor.hand_off(async { 7 }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 7);
    }
}
