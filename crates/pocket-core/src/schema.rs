//! SQLite table definitions for the items and tags stores.
//!
//! Sync runs never create tables; they expect them to exist. These
//! statements back the `init` command that prepares a fresh database.

use crate::store::StoreError;

/// Reject anything that is not a plain SQL identifier.
///
/// Table names come from configuration and are interpolated into SQL, so
/// only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid && !name.to_ascii_lowercase().starts_with("sqlite_") {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(name.to_string()))
    }
}

pub fn create_items_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    item_id TEXT NOT NULL,
    user_id TEXT,
    given_url TEXT,
    resolved_url TEXT,
    given_title TEXT,
    resolved_title TEXT,
    tags TEXT,
    extra TEXT NOT NULL,
    payload TEXT NOT NULL,
    imported_at INTEGER NOT NULL
);
"#
    )
}

pub fn create_tags_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    tag TEXT NOT NULL,
    user_id TEXT
);
"#
    )
}

pub fn items_indexes(table: &str) -> String {
    format!(
        r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_item_id ON {table}(item_id);
CREATE INDEX IF NOT EXISTS idx_{table}_given_title ON {table}(given_title);
CREATE INDEX IF NOT EXISTS idx_{table}_resolved_title ON {table}(resolved_title);
CREATE INDEX IF NOT EXISTS idx_{table}_given_url ON {table}(given_url);
CREATE INDEX IF NOT EXISTS idx_{table}_resolved_url ON {table}(resolved_url);
"#
    )
}

/// A NULL owner must still collide with another NULL owner, hence COALESCE.
pub fn tags_indexes(table: &str) -> String {
    format!(
        r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_tag_owner ON {table}(tag, COALESCE(user_id, ''));
"#
    )
}
