//! Query log and lazy-load tracking
//!
//! Every database operation records exactly one entry in the [`QueryLog`].
//! Relation accesses that miss the prefetch cache are additionally counted
//! by the [`LazyLoadTracker`], which warns once per relation when the
//! count reaches its threshold (the N+1 pattern).

use std::collections::HashMap;
use std::sync::Mutex;

/// Ordered log of executed queries
#[derive(Debug, Default)]
pub struct QueryLog {
    entries: Mutex<Vec<String>>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one executed query
    pub fn record(&self, statement: impl Into<String>) {
        let statement = statement.into();
        tracing::trace!(target: "catalogue_orm::query", "{}", statement);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(statement);
        }
    }

    /// Number of queries recorded so far
    pub fn count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Copy of the recorded statements
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Statements recorded after the first `start` entries
    pub fn entries_since(&self, start: usize) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.iter().skip(start).cloned().collect())
            .unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Lazy-load statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LazyLoadStats {
    /// Total number of lazy loads recorded
    pub total_loads: usize,
    /// Number of distinct relations loaded lazily
    pub relations_loaded: usize,
    /// Relations that reached the warning threshold
    pub potential_n1: usize,
}

/// Counts lazy relation loads per (model, relation) pair
#[derive(Debug)]
pub struct LazyLoadTracker {
    counts: Mutex<HashMap<(String, String), usize>>,
    threshold: usize,
}

impl Default for LazyLoadTracker {
    fn default() -> Self {
        Self::new(3)
    }
}

impl LazyLoadTracker {
    pub fn new(threshold: usize) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Record a lazy load and warn when the relation reaches the threshold
    pub fn record(&self, model: &str, relation: &str) {
        let Ok(mut counts) = self.counts.lock() else {
            return;
        };
        let count = counts
            .entry((model.to_string(), relation.to_string()))
            .or_insert(0);
        *count += 1;

        if *count == self.threshold {
            tracing::warn!(
                target: "catalogue_orm::n1",
                model = model,
                relation = relation,
                queries = *count,
                threshold = self.threshold,
                "N+1 query pattern detected, register a prefetch for '{}'",
                relation
            );
        }
    }

    pub fn count_for(&self, model: &str, relation: &str) -> usize {
        self.counts
            .lock()
            .ok()
            .and_then(|counts| {
                counts
                    .get(&(model.to_string(), relation.to_string()))
                    .copied()
            })
            .unwrap_or(0)
    }

    pub fn stats(&self) -> LazyLoadStats {
        let Ok(counts) = self.counts.lock() else {
            return LazyLoadStats::default();
        };
        LazyLoadStats {
            total_loads: counts.values().sum(),
            relations_loaded: counts.len(),
            potential_n1: counts
                .values()
                .filter(|count| **count >= self.threshold)
                .count(),
        }
    }

    pub fn reset(&self) {
        if let Ok(mut counts) = self.counts.lock() {
            counts.clear();
        }
    }
}
