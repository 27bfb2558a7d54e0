use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::item::{Extra, Item, Tag};
use crate::query::SearchParams;
use crate::schema;
use crate::sql_query::compile_search;
use crate::store::{RecordStore, StoreError};

/// Keys per `IN (...)` statement; keeps well under SQLite's bound-parameter cap.
const LOOKUP_CHUNK: usize = 500;

const ITEM_COLUMNS: &str =
    "item_id, user_id, given_url, resolved_url, given_title, resolved_title, tags, extra, payload";

/// One SQLite connection shared by the items and tags stores of a run.
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        let conn =
            Connection::open(path).map_err(|e| StoreError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Open a database that must already exist. Never creates the file or
    /// its parent directories.
    pub fn open_existing(path: &Path) -> crate::Result<Self> {
        if !path.is_file() {
            return Err(ConfigError::MissingDatabase(path.display().to_string()).into());
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Storage(format!("open: {}", e)))?;
        Ok(Self::init_with_connection(conn)?)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| StoreError::Storage(format!("pragma: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn items(&self, table: &str) -> Result<SqliteItemStore, StoreError> {
        Ok(SqliteItemStore {
            table: Table::new(self.conn.clone(), table)?,
        })
    }

    pub fn tags(&self, table: &str) -> Result<SqliteTagStore, StoreError> {
        Ok(SqliteTagStore {
            table: Table::new(self.conn.clone(), table)?,
        })
    }

    /// Create both tables and their indexes if missing.
    pub fn bootstrap(&self, items_table: &str, tags_table: &str) -> Result<(), StoreError> {
        let items = self.items(items_table)?;
        let tags = self.tags(tags_table)?;
        items
            .table
            .execute_batch(&schema::create_items_table(items_table), "create items table")?;
        tags.table
            .execute_batch(&schema::create_tags_table(tags_table), "create tags table")?;
        items.ensure_indexes()?;
        tags.ensure_indexes()?;
        tracing::info!(items = items_table, tags = tags_table, "database initialized");
        Ok(())
    }
}

/// A validated table name on the shared connection.
struct Table {
    conn: Arc<Mutex<Connection>>,
    name: String,
}

impl Table {
    fn new(conn: Arc<Mutex<Connection>>, name: &str) -> Result<Self, StoreError> {
        schema::validate_table_name(name)?;
        Ok(Self {
            conn,
            name: name.to_string(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(format!("lock: {}", e)))
    }

    fn execute_batch(&self, sql: &str, what: &str) -> Result<(), StoreError> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| StoreError::Storage(format!("{} ({}): {}", what, self.name, e)))
    }

    fn truncate(&self) -> Result<(), StoreError> {
        self.lock()?
            .execute(&format!("DELETE FROM {}", self.name), [])
            .map_err(|e| StoreError::Storage(format!("truncate {}: {}", self.name, e)))?;
        Ok(())
    }

    fn truncate_owner(&self, user_id: &str) -> Result<(), StoreError> {
        self.lock()?
            .execute(
                &format!("DELETE FROM {} WHERE user_id = ?1", self.name),
                params![user_id],
            )
            .map_err(|e| StoreError::Storage(format!("truncate {}: {}", self.name, e)))?;
        Ok(())
    }

    fn exists(&self) -> Result<bool, StoreError> {
        let found = self
            .lock()?
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.name],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| StoreError::Storage(format!("exists: {}", e)))?;
        Ok(found.is_some())
    }

    fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .lock()?
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.name), [], |row| {
                row.get(0)
            })
            .map_err(|e| StoreError::Storage(format!("count {}: {}", self.name, e)))?;
        Ok(count as usize)
    }
}

fn insert_error(e: rusqlite::Error, key: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::AlreadyExists(key.to_string());
        }
    }
    StoreError::Storage(format!("insert {}: {}", key, e))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// SQLite-backed items store.
pub struct SqliteItemStore {
    table: Table,
}

/// Raw column values of an items row, before JSON decoding.
struct ItemRow {
    item_id: String,
    user_id: Option<String>,
    given_url: Option<String>,
    resolved_url: Option<String>,
    given_title: Option<String>,
    resolved_title: Option<String>,
    tags: Option<String>,
    extra: String,
    payload: String,
}

impl ItemRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            item_id: row.get(0)?,
            user_id: row.get(1)?,
            given_url: row.get(2)?,
            resolved_url: row.get(3)?,
            given_title: row.get(4)?,
            resolved_title: row.get(5)?,
            tags: row.get(6)?,
            extra: row.get(7)?,
            payload: row.get(8)?,
        })
    }

    fn into_item(self) -> Result<Item, StoreError> {
        let tags: Option<Map<String, Value>> =
            self.tags.as_deref().map(serde_json::from_str).transpose()?;
        let extra: Extra = serde_json::from_str(&self.extra)?;
        let payload: Map<String, Value> = serde_json::from_str(&self.payload)?;
        Ok(Item {
            item_id: self.item_id,
            user_id: self.user_id,
            given_url: self.given_url,
            resolved_url: self.resolved_url,
            given_title: self.given_title,
            resolved_title: self.resolved_title,
            tags,
            extra,
            payload,
        })
    }
}

impl SqliteItemStore {
    fn insert_item(conn: &Connection, table: &str, item: &Item, imported_at: i64) -> Result<(), StoreError> {
        let tags_json = item
            .tags
            .as_ref()
            .map(|t| serde_json::to_string(t))
            .transpose()?;
        let extra_json = serde_json::to_string(&item.extra)?;
        let payload_json = serde_json::to_string(&item.payload)?;

        conn.execute(
            &format!(
                "INSERT INTO {} ({}, imported_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                table, ITEM_COLUMNS
            ),
            params![
                item.item_id,
                item.user_id,
                item.given_url,
                item.resolved_url,
                item.given_title,
                item.resolved_title,
                tags_json,
                extra_json,
                payload_json,
                imported_at,
            ],
        )
        .map_err(|e| insert_error(e, &item.item_id))?;
        Ok(())
    }

    /// Get an item by its service id.
    pub fn get(&self, item_id: &str) -> Result<Option<Item>, StoreError> {
        let row = self
            .table
            .lock()?
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE item_id = ?1",
                    ITEM_COLUMNS, self.table.name
                ),
                params![item_id],
                ItemRow::read,
            )
            .optional()
            .map_err(|e| StoreError::Storage(format!("get: {}", e)))?;
        row.map(ItemRow::into_item).transpose()
    }

    /// Search stored items; most recent import first, service order within
    /// an import.
    pub fn search(&self, q: &SearchParams) -> Result<Vec<Item>, StoreError> {
        let compiled = compile_search(q);
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY imported_at DESC, rowid ASC LIMIT ?",
            ITEM_COLUMNS, self.table.name, compiled.where_clause
        );
        let mut params = compiled.params;
        params.push(SqlValue::Integer(q.limit as i64));

        let conn = self.table.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Storage(format!("prepare search: {} (sql: {})", e, sql)))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), ItemRow::read)
            .map_err(|e| StoreError::Storage(format!("search: {}", e)))?;

        let mut items = Vec::new();
        for row in rows {
            let row = row.map_err(|e| StoreError::Storage(format!("row: {}", e)))?;
            items.push(row.into_item()?);
        }
        Ok(items)
    }
}

impl RecordStore for SqliteItemStore {
    type Record = Item;
    type Key = String;

    fn name(&self) -> &str {
        &self.table.name
    }

    fn key_of(record: &Item) -> String {
        record.item_id.clone()
    }

    fn insert(
        &self,
        records: &[Item],
        on_inserted: &mut dyn FnMut(&Item),
    ) -> Result<usize, StoreError> {
        let imported_at = Utc::now().timestamp();
        let mut inserted = 0;
        for item in records {
            {
                let conn = self.table.lock()?;
                Self::insert_item(&conn, &self.table.name, item, imported_at)?;
            }
            inserted += 1;
            on_inserted(item);
        }
        Ok(inserted)
    }

    fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError> {
        let conn = self.table.lock()?;
        let mut found = HashSet::new();
        for chunk in keys.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT item_id FROM {} WHERE item_id IN ({})",
                self.table.name,
                placeholders(chunk.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| StoreError::Storage(format!("prepare lookup: {}", e)))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::Storage(format!("lookup: {}", e)))?;
            for row in rows {
                found.insert(row.map_err(|e| StoreError::Storage(format!("row: {}", e)))?);
            }
        }
        Ok(found)
    }

    fn truncate(&self) -> Result<(), StoreError> {
        self.table.truncate()
    }

    fn truncate_owner(&self, user_id: &str) -> Result<(), StoreError> {
        self.table.truncate_owner(user_id)
    }

    fn ensure_indexes(&self) -> Result<(), StoreError> {
        self.table
            .execute_batch(&schema::items_indexes(&self.table.name), "ensure indexes")
    }

    fn exists(&self) -> Result<bool, StoreError> {
        self.table.exists()
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.table.count()
    }
}

/// SQLite-backed tags store.
pub struct SqliteTagStore {
    table: Table,
}

impl SqliteTagStore {
    /// Every stored tag, in insertion order.
    pub fn all(&self) -> Result<Vec<Tag>, StoreError> {
        let conn = self.table.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT tag, user_id FROM {} ORDER BY rowid",
                self.table.name
            ))
            .map_err(|e| StoreError::Storage(format!("prepare all: {}", e)))?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    tag: row.get(0)?,
                    user_id: row.get(1)?,
                })
            })
            .map_err(|e| StoreError::Storage(format!("all: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::Storage(format!("row: {}", e)))?;
        Ok(tags)
    }
}

impl RecordStore for SqliteTagStore {
    type Record = Tag;
    type Key = Tag;

    fn name(&self) -> &str {
        &self.table.name
    }

    fn key_of(record: &Tag) -> Tag {
        record.clone()
    }

    fn insert(
        &self,
        records: &[Tag],
        on_inserted: &mut dyn FnMut(&Tag),
    ) -> Result<usize, StoreError> {
        let sql = format!("INSERT INTO {} (tag, user_id) VALUES (?1, ?2)", self.table.name);
        let mut inserted = 0;
        for tag in records {
            self.table
                .lock()?
                .execute(&sql, params![tag.tag, tag.user_id])
                .map_err(|e| insert_error(e, &tag.tag))?;
            inserted += 1;
            on_inserted(tag);
        }
        Ok(inserted)
    }

    fn existing_keys(&self, keys: &[Tag]) -> Result<HashSet<Tag>, StoreError> {
        let wanted: HashSet<&Tag> = keys.iter().collect();
        let conn = self.table.lock()?;
        let mut found = HashSet::new();
        for chunk in keys.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT tag, user_id FROM {} WHERE tag IN ({})",
                self.table.name,
                placeholders(chunk.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| StoreError::Storage(format!("prepare lookup: {}", e)))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter().map(|t| t.tag.as_str())), |row| {
                    Ok(Tag {
                        tag: row.get(0)?,
                        user_id: row.get(1)?,
                    })
                })
                .map_err(|e| StoreError::Storage(format!("lookup: {}", e)))?;
            for row in rows {
                let tag = row.map_err(|e| StoreError::Storage(format!("row: {}", e)))?;
                if wanted.contains(&tag) {
                    found.insert(tag);
                }
            }
        }
        Ok(found)
    }

    fn truncate(&self) -> Result<(), StoreError> {
        self.table.truncate()
    }

    fn truncate_owner(&self, user_id: &str) -> Result<(), StoreError> {
        self.table.truncate_owner(user_id)
    }

    fn ensure_indexes(&self) -> Result<(), StoreError> {
        self.table
            .execute_batch(&schema::tags_indexes(&self.table.name), "ensure indexes")
    }

    fn exists(&self) -> Result<bool, StoreError> {
        self.table.exists()
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.table.count()
    }
}
