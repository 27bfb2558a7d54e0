//! Set difference between fetched candidates and what a store already holds.

use std::collections::HashSet;
use std::hash::Hash;

use crate::store::{RecordStore, StoreError};

/// Result of a diff. `NothingNew` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff<T> {
    /// Candidates absent from the store, in candidate order (never empty)
    New(Vec<T>),
    NothingNew,
}

impl<T> Diff<T> {
    /// Wrap an already-filtered batch, normalizing empty to `NothingNew`.
    pub fn from_vec(records: Vec<T>) -> Self {
        if records.is_empty() {
            Diff::NothingNew
        } else {
            Diff::New(records)
        }
    }

    pub fn is_nothing_new(&self) -> bool {
        matches!(self, Diff::NothingNew)
    }

    pub fn len(&self) -> usize {
        match self {
            Diff::New(records) => records.len(),
            Diff::NothingNew => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Diff::New(records) => records,
            Diff::NothingNew => Vec::new(),
        }
    }
}

/// Keep the candidates whose key `lookup` does not report as present.
///
/// `lookup` is called at most once, with every distinct key of the batch.
/// An empty batch returns `NothingNew` without calling it.
pub fn diff<T, K, F, L>(candidates: Vec<T>, key_fn: F, lookup: L) -> Result<Diff<T>, StoreError>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
    L: FnOnce(&[K]) -> Result<HashSet<K>, StoreError>,
{
    if candidates.is_empty() {
        return Ok(Diff::NothingNew);
    }

    let keyed: Vec<(K, T)> = candidates.into_iter().map(|c| (key_fn(&c), c)).collect();

    let mut distinct = HashSet::with_capacity(keyed.len());
    let keys: Vec<K> = keyed
        .iter()
        .filter(|(k, _)| distinct.insert(k))
        .map(|(k, _)| k.clone())
        .collect();

    let existing = lookup(&keys)?;
    tracing::debug!(
        candidates = keyed.len(),
        existing = existing.len(),
        "diffed batch against store"
    );

    let fresh = keyed
        .into_iter()
        .filter(|(k, _)| !existing.contains(k))
        .map(|(_, c)| c)
        .collect();
    Ok(Diff::from_vec(fresh))
}

/// [`diff`] with the store's own existence lookup.
pub fn diff_against<S, T, F>(store: &S, candidates: Vec<T>, key_fn: F) -> Result<Diff<T>, StoreError>
where
    S: RecordStore + ?Sized,
    F: Fn(&T) -> S::Key,
{
    diff(candidates, key_fn, |keys| store.existing_keys(keys))
}
