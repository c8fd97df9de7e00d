//! Lock-free, wait-free work distribution over a finite index range.
//!
//! A worker calls `claim` to atomically grab the next unclaimed index; once
//! every index has been handed out, `claim` returns `None` and the worker
//! falls back to the retry queue.

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct ClaimCounter {
    next: AtomicUsize,
    limit: usize,
}

impl ClaimCounter {
    pub fn new(limit: usize) -> Self {
        ClaimCounter {
            next: AtomicUsize::new(0),
            limit,
        }
    }

    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        if index < self.limit {
            Some(index)
        } else {
            None
        }
    }
}
