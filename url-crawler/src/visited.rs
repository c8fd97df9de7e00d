//! Mutex-protected deduplicating set of canonical URLs.
//!
//! The set owns every string it stores — callers must not hand it a
//! borrowed `&str` tied to a response's lifetime (the effective URL on a
//! `reqwest::Response` is freed on handle cleanup, which is exactly the
//! dangling-pointer trap the original crawler fell into).

use std::collections::HashSet;
use std::sync::Mutex;

/// Sized generously up front; the reference workload visits on the order
/// of tens of thousands of URLs.
const DEFAULT_CAPACITY: usize = 100_000;

pub struct VisitedSet {
    seen: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        VisitedSet {
            seen: Mutex::new(HashSet::with_capacity(capacity)),
        }
    }

    /// Returns `true` iff `url` was not already present, in which case it
    /// is now recorded. Only the caller that receives `true` may enqueue
    /// the URL onto the frontier.
    pub fn insert_if_absent(&self, url: &str) -> bool {
        let mut seen = self.seen.lock().expect("visited set mutex poisoned");
        if seen.contains(url) {
            false
        } else {
            seen.insert(url.to_owned());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().expect("visited set mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_insert_of_a_url_succeeds() {
        let visited = VisitedSet::new();
        assert!(visited.insert_if_absent("http://example.com/a"));
        assert!(!visited.insert_if_absent("http://example.com/a"));
        assert!(visited.insert_if_absent("http://example.com/b"));
        assert_eq!(visited.len(), 2);
    }
}
