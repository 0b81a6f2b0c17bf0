//! Out-of-order buffer restoring upstream order.
//!
//! Holds results that completed before their turn, keyed by sequence
//! number. `next` advances by exactly one per consumed item.

use std::collections::HashMap;

use rowpipe_core::prelude::*;

use crate::pipeline::{Outcome, TaggedItem};

#[derive(Debug)]
pub(crate) struct ReorderBuffer {
    next: Seq,
    pending: HashMap<Seq, Outcome>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self {
            next: Seq::ZERO,
            pending: HashMap::new(),
        }
    }

    /// Sequence number the reader is waiting to deliver.
    pub fn next_seq(&self) -> Seq {
        self.next
    }

    /// Take the item at `next` if it has arrived, advancing the counter.
    pub fn pop_next(&mut self) -> Option<Outcome> {
        let outcome = self.pending.remove(&self.next)?;
        self.next = self.next.next();
        Some(outcome)
    }

    /// Stash an item that arrived from the result queue.
    pub fn insert(&mut self, item: TaggedItem) -> Result<()> {
        if item.seq < self.next || self.pending.contains_key(&item.seq) {
            return Err(Error::Invariant(format!(
                "duplicate result for {} (next expected {})",
                item.seq, self.next
            )));
        }
        self.pending.insert(item.seq, item.outcome);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
