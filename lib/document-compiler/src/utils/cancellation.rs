use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken as SharedFlag;

/// Cooperative cancellation of a compilation batch.
///
/// Clones share the same flag, so a caller can keep one handle and cancel a
/// batch running on other threads. A token built with a timeout cancels
/// itself the first time it is checked past its deadline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: SharedFlag,
    deadline: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancellationError {
    #[error("compilation was cancelled")]
    Cancelled,
    #[error("compilation exceeded its deadline")]
    TimedOut,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: SharedFlag::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.bail_if_cancelled().is_err()
    }

    /// Checked between compilation stages and between documents.
    #[inline]
    pub fn bail_if_cancelled(&self) -> Result<(), CancellationError> {
        let expired = self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline);
        if expired {
            self.flag.cancel();
            return Err(CancellationError::TimedOut);
        }

        match self.flag.is_cancelled() {
            true => Err(CancellationError::Cancelled),
            false => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{CancellationError, CancellationToken};

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert_eq!(token.bail_if_cancelled(), Ok(()));
        handle.cancel();
        assert_eq!(token.bail_if_cancelled(), Err(CancellationError::Cancelled));
    }

    #[test]
    fn deadline_in_the_past_times_out() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        assert_eq!(token.bail_if_cancelled(), Err(CancellationError::TimedOut));
        assert!(token.is_cancelled());
    }

    #[test]
    fn generous_deadline_does_not_fire() {
        let token = CancellationToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }
}
