//! Three-state lifecycle of the filter stage: `Uninitialized → Running → Closed`.
//!
//! Transitions are atomic so that the pipeline is started at most once even
//! if several callers race on the first read.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Uninitialized = 0,
    Running = 1,
    Closed = 2,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Running,
            _ => LifecycleState::Closed,
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Uninitialized → Running`. Returns true only for the single caller
    /// that performed the transition.
    pub fn try_start(&self) -> bool {
        self.state
            .compare_exchange(
                LifecycleState::Uninitialized as u8,
                LifecycleState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closed` from any state; returns the previous state.
    pub fn close(&self) -> LifecycleState {
        LifecycleState::from_u8(
            self.state
                .swap(LifecycleState::Closed as u8, Ordering::AcqRel),
        )
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_transitions() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Uninitialized);
        assert!(lc.try_start());
        assert!(!lc.try_start());
        assert_eq!(lc.state(), LifecycleState::Running);
        assert_eq!(lc.close(), LifecycleState::Running);
        assert_eq!(lc.close(), LifecycleState::Closed);
        assert!(!lc.try_start());
    }

    #[test]
    fn test_close_before_start_prevents_start() {
        let lc = Lifecycle::new();
        assert_eq!(lc.close(), LifecycleState::Uninitialized);
        assert!(!lc.try_start());
        assert_eq!(lc.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_concurrent_start_wins_once() {
        let lc = Arc::new(Lifecycle::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let lc = Arc::clone(&lc);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if lc.try_start() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
