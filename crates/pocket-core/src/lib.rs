//! pocket-core: bookmark synchronization engine
//!
//! Reconciles the records returned by the bookmarking service with a local
//! store:
//!
//! - **enrich**: derived, query-friendly fields (tag list, domains, owner)
//! - **tags**: the deduplicated tag taxonomy of a batch
//! - **diff**: which candidates a store does not hold yet, by one batch lookup
//! - **store**: the persistence boundary, with a SQLite implementation
//! - **sync**: the ordered wipe / fetch / tags / items pipeline
//!
//! Runs are idempotent: rerunning after a partial failure inserts only what
//! is missing.

pub mod config;
pub mod diff;
pub mod enrich;
pub mod error;
pub mod item;
pub mod query;
pub mod remote;
pub mod schema;
pub mod store;
pub mod sync;
pub mod tags;

#[cfg(feature = "sqlite")]
mod sql_query;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use config::{
    FileConfig, StoreTarget, SyncConfig, SyncMode, SyncOptions, DEFAULT_DAYS,
    DEFAULT_TAG_REFRESH_LIMIT, FULL_LIMIT, MAX_DAYS,
};
pub use diff::{diff, diff_against, Diff};
pub use enrich::{domain_of, enrich, enrich_all};
pub use error::{ConfigError, Result, SyncError};
pub use item::{Extra, Item, Tag};
pub use query::{SearchParams, DEFAULT_SEARCH_LIMIT};
pub use remote::RemoteClient;
pub use store::{ItemStore, RecordStore, StoreError, TagStore};
pub use sync::{BatchOutcome, NoProgress, SyncOrchestrator, SyncPhase, SyncProgress, SyncReport};
pub use tags::{owned_tags, parse_tags};

#[cfg(feature = "sqlite")]
pub use sqlite_store::{SqliteDatabase, SqliteItemStore, SqliteTagStore};
