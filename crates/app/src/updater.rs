//! Updater — generic keyed differ for declared effects.
//!
//! Every effect manager owns one of these. Each tick the program declares the
//! full set of subscriptions it wants; the updater compares that set with the
//! previous one by key and reports what appeared and what disappeared, so the
//! manager only touches the edges.

use std::collections::BTreeMap;

/// What changed between two consecutive declarations.
#[derive(Debug)]
pub struct Diff<S> {
    pub added: Vec<S>,
    pub removed: Vec<S>,
}

impl<S> Default for Diff<S> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Tracks the previously declared set of specs, bucketed by key.
///
/// A key present in both generations is untouched even when its payload
/// changed; effect identity is the key alone.
pub struct Updater<S> {
    key_fn: fn(&S) -> String,
    buckets: BTreeMap<String, Vec<S>>,
}

impl<S: Clone> Updater<S> {
    #[must_use]
    pub fn new(key_fn: fn(&S) -> String) -> Self {
        Self {
            key_fn,
            buckets: BTreeMap::new(),
        }
    }

    /// Replaces the tracked set with `specs` and reports the difference.
    /// Removed entries carry the payloads from the *previous* generation.
    pub fn update(&mut self, specs: Vec<S>) -> Diff<S> {
        let mut next: BTreeMap<String, Vec<S>> = BTreeMap::new();
        for spec in specs {
            next.entry((self.key_fn)(&spec)).or_default().push(spec);
        }

        let mut diff = Diff::default();
        for (key, bucket) in &next {
            if !self.buckets.contains_key(key) {
                diff.added.extend(bucket.iter().cloned());
            }
        }
        let previous = std::mem::replace(&mut self.buckets, next);
        for (key, bucket) in previous {
            if !self.buckets.contains_key(&key) {
                diff.removed.extend(bucket);
            }
        }
        diff
    }
}
