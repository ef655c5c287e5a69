//! Entity set differencing

use std::collections::HashSet;

/// Ids that disappeared from, and newly appeared in, a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDiff {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl LogDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// `removed = previous - current`, `added = current - previous`, each in
/// first-seen order without duplicates.
#[must_use]
pub fn compute_diff(previous: &[String], current: &[String]) -> LogDiff {
    let previous_set: HashSet<&str> = previous.iter().map(String::as_str).collect();
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();

    LogDiff {
        removed: unique(previous.iter().filter(|id| !current_set.contains(id.as_str()))),
        added: unique(current.iter().filter(|id| !previous_set.contains(id.as_str()))),
    }
}

/// `ids` without repeats, keeping the first occurrence.
pub(crate) fn unique<'a>(ids: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.as_str())).cloned().collect()
}
