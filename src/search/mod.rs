//! Ranked name matching over the app index
//!
//! Matches fall into three buckets: exact name, name prefix, and name
//! substring. Only the best non-empty bucket is returned.

use crate::model::AppRecord;

/// How a record matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
}

impl MatchKind {
    /// Classify `name` against an already normalized query
    pub fn classify(name: &str, query: &str) -> Option<Self> {
        if name == query {
            Some(MatchKind::Exact)
        } else if name.starts_with(query) {
            Some(MatchKind::Prefix)
        } else if name.contains(query) {
            Some(MatchKind::Substring)
        } else {
            None
        }
    }
}

/// Records from the best matching bucket, in index order.
///
/// Callers reject empty queries before searching.
pub fn search(query: &str, apps: &[AppRecord]) -> Vec<AppRecord> {
    let query = query.trim().to_lowercase();

    let mut exact = Vec::new();
    let mut prefix = Vec::new();
    let mut substring = Vec::new();

    for app in apps {
        match MatchKind::classify(&app.name, &query) {
            Some(MatchKind::Exact) => exact.push(app.clone()),
            Some(MatchKind::Prefix) => prefix.push(app.clone()),
            Some(MatchKind::Substring) => substring.push(app.clone()),
            None => {}
        }
    }

    [exact, prefix, substring]
        .into_iter()
        .find(|bucket| !bucket.is_empty())
        .unwrap_or_default()
}
