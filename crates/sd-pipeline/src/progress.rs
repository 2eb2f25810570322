use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Reported after every completed denoising iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepProgress {
    /// Zero-based index of the iteration that just finished.
    pub iteration: usize,
    pub total: usize,
    pub timestep: f32,
    pub elapsed: Duration,
}

impl StepProgress {
    pub fn is_last(&self) -> bool {
        self.iteration + 1 == self.total
    }
}

/// Shared stop flag, checked by the pipeline between iterations.
///
/// Clones observe the same flag, so a token can be handed to another thread
/// and cancelled from there while a run is in progress.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_is_last() {
        let p = StepProgress {
            iteration: 1,
            total: 2,
            timestep: 0.0,
            elapsed: Duration::ZERO,
        };
        assert!(p.is_last());
        assert!(!StepProgress { iteration: 0, ..p }.is_last());
    }
}
