use std::collections::HashSet;
use std::hash::Hash;

use crate::item::{Item, Tag};

/// The persistence boundary the sync engine writes through.
///
/// Implemented once per store (items, tags) with the same shape; the engine
/// never issues schema statements beyond `ensure_indexes`.
pub trait RecordStore {
    type Record;
    type Key: Eq + Hash + Clone;

    /// Store name for logs and error messages (the table name for SQL stores).
    fn name(&self) -> &str;

    /// Identity key of a record.
    fn key_of(record: &Self::Record) -> Self::Key;

    /// Insert records one at a time, calling `on_inserted` right after each
    /// successful insert. A failure stops the batch; earlier inserts stay.
    /// Returns the number of records inserted.
    fn insert(
        &self,
        records: &[Self::Record],
        on_inserted: &mut dyn FnMut(&Self::Record),
    ) -> Result<usize, StoreError>;

    /// Which of `keys` are already stored. One logical lookup per call.
    fn existing_keys(&self, keys: &[Self::Key]) -> Result<HashSet<Self::Key>, StoreError>;

    /// Whether `existing_keys` is available. Stores that answer `false` rely
    /// on their uniqueness constraint alone to reject duplicates.
    fn supports_existence_check(&self) -> bool {
        true
    }

    /// Delete every record.
    fn truncate(&self) -> Result<(), StoreError>;

    /// Delete the records owned by `user_id`; other owners are untouched.
    fn truncate_owner(&self, user_id: &str) -> Result<(), StoreError>;

    /// Establish the uniqueness constraint and lookup indexes. Idempotent.
    fn ensure_indexes(&self) -> Result<(), StoreError>;

    /// Whether the backing table/collection exists.
    fn exists(&self) -> Result<bool, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

/// Items store: keyed by `item_id`.
pub trait ItemStore: RecordStore<Record = Item, Key = String> {}
impl<S: RecordStore<Record = Item, Key = String>> ItemStore for S {}

/// Tags store: keyed by the whole `(tag, user_id)` pair.
pub trait TagStore: RecordStore<Record = Tag, Key = Tag> {}
impl<S: RecordStore<Record = Tag, Key = Tag>> TagStore for S {}

/// Errors from a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The uniqueness constraint rejected a record
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::AlreadyExists("229279689".into());
        assert!(err.to_string().contains("229279689"));

        let err = StoreError::InvalidTableName("items; DROP TABLE tags".into());
        assert!(err.to_string().contains("Invalid table name"));
    }
}
