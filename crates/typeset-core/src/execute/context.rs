//! Cancellation and progress reporting for compile jobs.

use std::sync::Arc;

use tokio::sync::watch;

use crate::compile::JobReport;

/// Handle for cancelling an in-flight request.
///
/// `AbortHandle` can be cloned and shared across tasks; any clone can
/// trigger the abort, which is visible to all other clones. Running
/// compiler processes are killed as soon as the orchestrator observes it.
///
/// # Example
///
/// ```
/// use typeset_core::execute::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_aborted());
///
/// handle_clone.abort();
///
/// assert!(handle.is_aborted());
/// ```
#[derive(Clone)]
pub struct AbortHandle {
    /// Shared abort flag; receivers wake when it flips.
    state: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Create a new abort handle.
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Check if abort has been requested.
    pub fn is_aborted(&self) -> bool {
        *self.state.borrow()
    }

    /// Request abort of the request.
    pub fn abort(&self) {
        self.state.send_replace(true);
    }

    /// Reset the abort flag.
    ///
    /// Called before reusing a handle for a new request.
    pub fn reset(&self) {
        self.state.send_replace(false);
    }

    /// Resolve once abort has been requested.
    pub async fn aborted(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Callback trait for compile progress reporting.
pub trait CompileCallback: Send + Sync {
    /// Called when a job's compiler process has been launched.
    fn on_job_started(&self, _snippet_index: usize) {}

    /// Called when a job has reached its final status.
    fn on_job_finished(&self, _report: &JobReport) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_abort_handle_creation() {
        let handle = AbortHandle::new();
        assert!(!handle.is_aborted());
    }

    #[test]
    fn test_abort_handle_clone_shares_state() {
        let handle = AbortHandle::new();
        let clone = handle.clone();

        clone.abort();

        assert!(handle.is_aborted());
        assert!(clone.is_aborted());
    }

    #[test]
    fn test_abort_handle_reset() {
        let handle = AbortHandle::default();
        handle.abort();
        assert!(handle.is_aborted());

        handle.reset();
        assert!(!handle.is_aborted());
    }

    #[tokio::test]
    async fn test_aborted_resolves_after_abort() {
        let handle = AbortHandle::new();
        let trigger = handle.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.abort();
        });

        tokio::time::timeout(Duration::from_secs(5), handle.aborted())
            .await
            .expect("aborted() should resolve once abort is requested");
    }

    #[tokio::test]
    async fn test_aborted_resolves_immediately_when_already_aborted() {
        let handle = AbortHandle::new();
        handle.abort();

        tokio::time::timeout(Duration::from_millis(100), handle.aborted())
            .await
            .expect("aborted() should not wait when already aborted");
    }

    #[tokio::test]
    async fn test_aborted_pends_without_abort() {
        let handle = AbortHandle::new();
        let result = tokio::time::timeout(Duration::from_millis(50), handle.aborted()).await;
        assert!(result.is_err());
    }
}
