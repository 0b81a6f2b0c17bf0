//! Upstream reader shared by the feeder thread and the consumer.
//!
//! The feeder holds the lock for the whole of each upstream `read`, so the
//! consumer never blocks on it: `close` and `on_close` fall back to a
//! request that whoever next holds the lock carries out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use rowpipe_core::prelude::*;
use rowpipe_operators::{CloseCallback, RowReader};

pub(crate) struct SharedUpstream {
    reader: Mutex<Box<dyn RowReader>>,
    close_requested: AtomicBool,
    pending_callbacks: Mutex<Vec<CloseCallback>>,
}

impl SharedUpstream {
    pub fn new(reader: Box<dyn RowReader>) -> Self {
        Self {
            reader: Mutex::new(reader),
            close_requested: AtomicBool::new(false),
            pending_callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Blocking lock. Callbacks registered while the lock was busy are handed
    /// to the reader before the guard is returned.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn RowReader>> {
        let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        self.flush_callbacks(&mut **guard);
        guard
    }

    fn try_lock(&self) -> Option<MutexGuard<'_, Box<dyn RowReader>>> {
        let mut guard = match self.reader.try_lock() {
            Ok(g) => g,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        self.flush_callbacks(&mut **guard);
        Some(guard)
    }

    fn flush_callbacks(&self, reader: &mut dyn RowReader) {
        let pending = std::mem::take(
            &mut *self
                .pending_callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for cb in pending {
            reader.on_close(cb);
        }
    }

    pub fn on_close(&self, callback: CloseCallback) {
        self.pending_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
        // Registers it now if the reader is idle; otherwise the next holder does.
        drop(self.try_lock());
    }

    /// Close upstream now if the lock is free, else leave the close to the
    /// feeder's exit path. A deferred close reports `Ok(())`.
    pub fn request_close(&self) -> Result<()> {
        // The flag is raised before `try_lock` so a feeder releasing the lock
        // concurrently is guaranteed to see it on exit.
        self.close_requested.store(true, Ordering::SeqCst);
        match self.try_lock() {
            Some(mut reader) if self.close_requested.swap(false, Ordering::SeqCst) => {
                reader.close()
            }
            _ => Ok(()),
        }
    }

    /// Feeder exit hook: perform a close the consumer could not.
    pub fn close_if_requested(&self) {
        if !self.close_requested.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(_e) = self.lock().close() {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "deferred upstream close failed");
        }
    }
}
