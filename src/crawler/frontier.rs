//! URL frontier: the to-visit stack plus the set of visited URLs.
//!
//! The frontier is owned by a single crawl invocation. Global dedup
//! correctness depends on `mark_visited` being a single check-then-insert
//! operation: a URL enters the visited set exactly once before it is ever
//! fetched.

use std::collections::HashSet;

/// Pending URLs (LIFO) plus the set of already-visited URLs.
#[derive(Debug, Default)]
pub struct Frontier {
    to_visit: Vec<String>,
    visited: HashSet<String>,
}

impl Frontier {
    /// Create a frontier seeded with the given URLs.
    pub fn with_seeds(seeds: Vec<String>) -> Self {
        Self {
            to_visit: seeds,
            visited: HashSet::new(),
        }
    }

    /// Pop the next pending URL, if any.
    pub fn pop(&mut self) -> Option<String> {
        self.to_visit.pop()
    }

    /// Insert the URL into the visited set. Returns false if it was already
    /// visited, in which case the caller must skip it.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Whether the URL has already been visited.
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Push a discovered URL unless it has already been visited. Duplicates
    /// in the pending stack are allowed; the visited check at pop time keeps
    /// them from being fetched twice.
    pub fn push_if_unvisited(&mut self, url: String) {
        if !self.visited.contains(&url) {
            self.to_visit.push(url);
        }
    }

    /// Number of pending URLs.
    pub fn pending(&self) -> usize {
        self.to_visit.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_is_lifo() {
        let mut frontier = Frontier::with_seeds(vec!["a".into(), "b".into()]);
        frontier.push_if_unvisited("c".into());

        assert_eq!(frontier.pop().as_deref(), Some("c"));
        assert_eq!(frontier.pop().as_deref(), Some("b"));
        assert_eq!(frontier.pop().as_deref(), Some("a"));
        assert_eq!(frontier.pop(), None);
    }

    #[test]
    fn test_mark_visited_only_once() {
        let mut frontier = Frontier::default();
        assert!(frontier.mark_visited("https://example.com/a"));
        assert!(!frontier.mark_visited("https://example.com/a"));
        assert!(frontier.is_visited("https://example.com/a"));
    }

    #[test]
    fn test_push_skips_visited() {
        let mut frontier = Frontier::default();
        frontier.mark_visited("https://example.com/a");
        frontier.push_if_unvisited("https://example.com/a".into());
        frontier.push_if_unvisited("https://example.com/b".into());

        assert_eq!(frontier.pending(), 1);
        assert_eq!(frontier.pop().as_deref(), Some("https://example.com/b"));
    }
}
