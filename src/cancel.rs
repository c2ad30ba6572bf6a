//! Session cancellation.

use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Hands out one cancellation token per session
///
/// `start` arms a fresh token for the session about to run; `cancel` trips
/// the token of the most recently started session. Sessions that already
/// finished keep their own tokens, so cancelling never leaks into a later
/// run.
#[derive(Debug, Default)]
pub struct CancellationController {
    current: Mutex<Option<CancellationToken>>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a new token and make it the current one
    pub fn start(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock() = Some(token.clone());
        token
    }

    /// Cancel the current session; `false` if none was running
    pub fn cancel(&self) -> bool {
        match self.lock().as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                tracing::info!("Cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Whether a started session has not been cancelled
    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_without_session() {
        let controller = CancellationController::new();
        assert!(!controller.is_active());
        assert!(!controller.cancel());
    }

    #[test]
    fn test_start_and_cancel() {
        let controller = CancellationController::new();
        let token = controller.start();
        assert!(controller.is_active());

        assert!(controller.cancel());
        assert!(token.is_cancelled());
        assert!(!controller.is_active());
        assert!(!controller.cancel());
    }

    #[test]
    fn test_new_session_is_not_affected_by_old_cancel() {
        let controller = CancellationController::new();
        let first = controller.start();
        controller.cancel();

        let second = controller.start();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(controller.is_active());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let controller = CancellationController::new();
        let token = controller.start();
        let waiter = tokio::spawn(async move { token.cancelled().await });

        controller.cancel();
        waiter.await.unwrap();
    }
}
