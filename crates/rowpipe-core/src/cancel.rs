//! Cooperative cancellation shared by the caller and pipeline threads.
//!
//! A token owns the only sender of a zero-traffic channel. Cancelling drops
//! that sender, so `done()` becomes disconnected and wakes every `select!`
//! that is waiting on it. Child tokens are cancelled together with their
//! parent, never the other way around.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crossbeam_channel::{bounded, Receiver, Sender};

struct State {
    trigger: Option<Sender<()>>,
    children: Vec<Weak<Inner>>,
}

struct Inner {
    cancelled: AtomicBool,
    state: Mutex<State>,
    done: Receiver<()>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // State stays consistent even if a holder panicked.
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Flag, then the whole subtree, then wake `done()` waiters. Anyone woken
    /// by this token therefore sees every descendant already cancelled.
    fn cancel(&self) {
        let (trigger, children) = {
            let mut state = self.lock();
            let Some(trigger) = state.trigger.take() else {
                return;
            };
            self.cancelled.store(true, Ordering::Release);
            (trigger, std::mem::take(&mut state.children))
        };
        for child in children {
            if let Some(child) = child.upgrade() {
                child.cancel();
            }
        }
        drop(trigger);
    }
}

#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                state: Mutex::new(State {
                    trigger: Some(tx),
                    children: Vec::new(),
                }),
                done: rx,
            }),
        }
    }

    /// A token that is cancelled whenever `self` is. Cancelling the child
    /// leaves `self` untouched.
    pub fn child_token(&self) -> Self {
        let child = CancellationToken::new();
        let mut state = self.inner.lock();
        if state.trigger.is_none() {
            drop(state);
            child.cancel();
        } else {
            state.children.retain(|w| w.strong_count() > 0);
            state.children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that never yields a message and disconnects on cancel.
    /// Meant to be used as a `select!` arm.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
