//! The shared frontier: a LIFO of not-yet-fetched URLs guarded by a mutex
//! and a condition variable, plus the idle-worker bookkeeping the
//! termination predicate needs.
//!
//! Exploration order (LIFO) is not a correctness guarantee — only the set
//! of visited URLs is deterministic for a fixed link graph, per spec.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use reqwest::Url;

pub struct Frontier {
    queue: Mutex<Vec<Url>>,
    condvar: Condvar,
    idle: AtomicUsize,
    threads: usize,
    terminate: AtomicBool,
}

impl Frontier {
    pub fn new(threads: usize) -> Self {
        Frontier {
            queue: Mutex::new(Vec::new()),
            condvar: Condvar::new(),
            idle: AtomicUsize::new(0),
            threads,
            terminate: AtomicBool::new(false),
        }
    }

    /// Pushes a newly-discovered URL and wakes any worker waiting on an
    /// empty frontier.
    pub fn push(&self, url: Url) {
        let mut queue = self.queue.lock().expect("frontier mutex poisoned");
        queue.push(url);
        self.condvar.notify_all();
    }

    /// Blocks until a URL is available, the termination predicate holds, or
    /// another thread has already asked everyone to stop.
    ///
    /// `png_target_reached` is polled under the same lock so a worker that
    /// just pushed the M-th PNG hit doesn't race a sibling into one more
    /// pointless wait cycle.
    pub fn pop(&self, png_target_reached: impl Fn() -> bool) -> Option<Url> {
        let mut queue = self.queue.lock().expect("frontier mutex poisoned");
        loop {
            if let Some(url) = queue.pop() {
                return Some(url);
            }

            if self.terminate.load(Ordering::SeqCst) || png_target_reached() {
                self.terminate.store(true, Ordering::SeqCst);
                self.condvar.notify_all();
                return None;
            }

            self.idle.fetch_add(1, Ordering::SeqCst);
            if self.idle.load(Ordering::SeqCst) >= self.threads {
                // Every worker is idle and the frontier is empty: done.
                self.idle.fetch_sub(1, Ordering::SeqCst);
                self.terminate.store(true, Ordering::SeqCst);
                self.condvar.notify_all();
                return None;
            }

            let (guard, _timeout) = self
                .condvar
                .wait_timeout(queue, std::time::Duration::from_millis(50))
                .expect("frontier mutex poisoned");
            queue = guard;
            self.idle.fetch_sub(1, Ordering::SeqCst);

            if self.terminate.load(Ordering::SeqCst) {
                return None;
            }
        }
    }

    /// Forces every blocked worker to wake up and observe termination —
    /// called once a worker records the M-th PNG hit.
    pub fn stop(&self) {
        let _guard = self.queue.lock().expect("frontier mutex poisoned");
        self.terminate.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_none_once_all_workers_are_idle_and_queue_is_empty() {
        let frontier = Frontier::new(1);
        assert_eq!(frontier.pop(|| false), None);
        assert!(frontier.is_stopped());
    }

    #[test]
    fn pop_returns_pushed_urls_lifo() {
        let frontier = Frontier::new(2);
        frontier.push(Url::parse("http://example.com/a").unwrap());
        frontier.push(Url::parse("http://example.com/b").unwrap());
        assert_eq!(frontier.pop(|| false).unwrap().as_str(), "http://example.com/b");
    }

    #[test]
    fn pop_stops_once_png_target_is_reached() {
        let frontier = Frontier::new(4);
        assert_eq!(frontier.pop(|| true), None);
        assert!(frontier.is_stopped());
    }
}
