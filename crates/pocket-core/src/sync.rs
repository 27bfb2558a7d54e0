//! The sync pipeline: wipe, fetch, tags, items.
//!
//! A run moves through [`SyncPhase`]s strictly in order. Tags are always
//! reconciled before items. Every fatal configuration problem is reported
//! before the service or either store is touched; later failures abort the
//! run and leave earlier inserts in place, which a rerun repairs through the
//! stores' uniqueness constraints and the diff.

use std::fmt;

use chrono::{DateTime, Utc};
use pocket_client::RawRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{SyncConfig, SyncMode, SyncOptions};
use crate::diff::{diff, diff_against, Diff};
use crate::enrich::enrich_all;
use crate::error::{ConfigError, Result};
use crate::item::Tag;
use crate::remote::RemoteClient;
use crate::store::{ItemStore, RecordStore, StoreError, TagStore};
use crate::tags::{owned_tags, parse_tags};

/// Steps of a sync run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    Init,
    ValidateConfig,
    /// Full run or explicit wipe: truncate both stores, re-establish indexes
    WipeAndReindex,
    FetchRemote,
    ExtractTags,
    DiffTags,
    InsertTags,
    /// Incremental runs only
    DiffItems,
    /// Full runs insert every fetched record
    SkipDiff,
    EnrichItems,
    InsertItems,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Init => "init",
            SyncPhase::ValidateConfig => "validate-config",
            SyncPhase::WipeAndReindex => "wipe-and-reindex",
            SyncPhase::FetchRemote => "fetch-remote",
            SyncPhase::ExtractTags => "extract-tags",
            SyncPhase::DiffTags => "diff-tags",
            SyncPhase::InsertTags => "insert-tags",
            SyncPhase::DiffItems => "diff-items",
            SyncPhase::SkipDiff => "skip-diff",
            SyncPhase::EnrichItems => "enrich-items",
            SyncPhase::InsertItems => "insert-items",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Observer for a run. Called synchronously, right after the event it
/// reports; `advance` follows each successful insert.
pub trait SyncProgress {
    fn phase(&mut self, _phase: SyncPhase) {}
    fn begin(&mut self, _label: &str, _total: usize) {}
    fn advance(&mut self) {}
    fn finish(&mut self) {}
}

/// Ignores every progress event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl SyncProgress for NoProgress {}

/// What happened to one store during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Inserted(usize),
    /// Nothing left to insert after diffing; a normal outcome
    NothingNew,
}

impl BatchOutcome {
    fn from_count(n: usize) -> Self {
        if n == 0 {
            BatchOutcome::NothingNew
        } else {
            BatchOutcome::Inserted(n)
        }
    }

    pub fn inserted(&self) -> usize {
        match self {
            BatchOutcome::Inserted(n) => *n,
            BatchOutcome::NothingNew => 0,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Both stores were truncated first
    pub wiped: bool,
    /// Records returned by the service
    pub fetched: usize,
    pub tags: BatchOutcome,
    pub items: BatchOutcome,
}

impl SyncReport {
    pub fn no_new_items(&self) -> bool {
        self.items == BatchOutcome::NothingNew
    }
}

/// Drives a run against one remote and one pair of stores.
pub struct SyncOrchestrator<'a, R, I, T> {
    config: &'a SyncConfig,
    remote: &'a R,
    items: &'a I,
    tags: &'a T,
}

impl<'a, R, I, T> SyncOrchestrator<'a, R, I, T>
where
    R: RemoteClient,
    I: ItemStore,
    T: TagStore,
{
    pub fn new(config: &'a SyncConfig, remote: &'a R, items: &'a I, tags: &'a T) -> Self {
        Self {
            config,
            remote,
            items,
            tags,
        }
    }

    /// Pre-flight checks. Only asks the stores whether they exist.
    pub fn validate(&self, options: &SyncOptions) -> Result<()> {
        options.validate()?;
        self.config.validate()?;
        require_store(self.items)?;
        require_store(self.tags)?;
        Ok(())
    }

    pub async fn run(
        &self,
        options: &SyncOptions,
        progress: &mut dyn SyncProgress,
    ) -> Result<SyncReport> {
        self.run_at(Utc::now(), options, progress).await
    }

    /// [`run`](Self::run) with an explicit clock for the incremental window.
    pub async fn run_at(
        &self,
        now: DateTime<Utc>,
        options: &SyncOptions,
        progress: &mut dyn SyncProgress,
    ) -> Result<SyncReport> {
        enter(progress, SyncPhase::Init);
        enter(progress, SyncPhase::ValidateConfig);
        self.validate(options)?;

        let mode = options.mode();
        let user = options.user();
        info!(%mode, user = user.unwrap_or("-"), "starting sync");

        let wiped = options.wipes();
        if wiped {
            enter(progress, SyncPhase::WipeAndReindex);
            if !mode.is_full() {
                warn!(
                    %mode,
                    "wipe without a full sync: records older than the window will be missing until a full sync"
                );
            }
            self.wipe_and_reindex()?;
        }

        enter(progress, SyncPhase::FetchRemote);
        let limit = match mode {
            SyncMode::Full { limit } => limit,
            SyncMode::Incremental { .. } => options.limit,
        };
        let records = self
            .remote
            .fetch(&self.config.credentials, limit, mode.since(now))
            .await?;
        let fetched = records.len();
        info!(fetched, "fetched records");

        enter(progress, SyncPhase::ExtractTags);
        let tags = owned_tags(parse_tags(&records), user);
        debug!(count = tags.len(), "extracted tags");
        let tag_outcome = self.sync_tags(tags, progress)?;

        let item_outcome = self.sync_items(mode, records, user, progress)?;
        if item_outcome == BatchOutcome::NothingNew {
            info!("there are no new items");
        }

        enter(progress, SyncPhase::Done);
        let report = SyncReport {
            mode,
            wiped,
            fetched,
            tags: tag_outcome,
            items: item_outcome,
        };
        info!(
            tags = report.tags.inserted(),
            items = report.items.inserted(),
            "sync finished"
        );
        Ok(report)
    }

    /// Replace the tag store with the tags of the newest `limit` records.
    ///
    /// No diff: after the fetch every extracted tag is inserted. With a
    /// `user_id` only that owner's tags are deleted first; without one the
    /// whole store is truncated.
    pub async fn refresh_tags(
        &self,
        limit: u32,
        user_id: Option<&str>,
        progress: &mut dyn SyncProgress,
    ) -> Result<BatchOutcome> {
        if limit == 0 {
            return Err(ConfigError::Invalid("limit must be positive".to_string()).into());
        }
        self.config.validate()?;
        require_store(self.tags)?;

        let records = self
            .remote
            .fetch(&self.config.credentials, limit, None)
            .await?;
        let user_id = user_id.filter(|u| !u.is_empty());
        let tags = owned_tags(parse_tags(&records), user_id);

        match user_id {
            Some(user) => {
                self.tags.truncate_owner(user)?;
                warn!(store = self.tags.name(), user, "wiped tags of owner");
            }
            None => {
                self.tags.truncate()?;
                warn!(store = self.tags.name(), "wiped tags");
            }
        }

        let outcome = insert_batch(self.tags, "tags", &tags, progress)?;
        info!(tags = outcome.inserted(), "tag refresh finished");
        Ok(outcome)
    }

    fn wipe_and_reindex(&self) -> std::result::Result<(), StoreError> {
        self.tags.truncate()?;
        self.items.truncate()?;
        warn!(
            items = self.items.name(),
            tags = self.tags.name(),
            "wiped collections"
        );
        self.items.ensure_indexes()?;
        self.tags.ensure_indexes()?;
        info!("indexes created");
        Ok(())
    }

    fn sync_tags(
        &self,
        tags: Vec<Tag>,
        progress: &mut dyn SyncProgress,
    ) -> std::result::Result<BatchOutcome, StoreError> {
        if !self.tags.supports_existence_check() {
            enter(progress, SyncPhase::InsertTags);
            return insert_skipping_duplicates(self.tags, "tags", &tags, progress);
        }

        enter(progress, SyncPhase::DiffTags);
        match diff_against(self.tags, tags, T::key_of)? {
            Diff::NothingNew => {
                info!("there are no new tags");
                Ok(BatchOutcome::NothingNew)
            }
            Diff::New(fresh) => {
                enter(progress, SyncPhase::InsertTags);
                insert_batch(self.tags, "tags", &fresh, progress)
            }
        }
    }

    fn sync_items(
        &self,
        mode: SyncMode,
        records: Vec<RawRecord>,
        user: Option<&str>,
        progress: &mut dyn SyncProgress,
    ) -> std::result::Result<BatchOutcome, StoreError> {
        let candidates = if mode.is_full() {
            enter(progress, SyncPhase::SkipDiff);
            Diff::from_vec(records)
        } else {
            enter(progress, SyncPhase::DiffItems);
            diff(
                records,
                |r: &RawRecord| r.item_id.clone(),
                |keys| self.items.existing_keys(keys),
            )?
        };

        let records = match candidates {
            Diff::NothingNew => return Ok(BatchOutcome::NothingNew),
            Diff::New(records) => records,
        };

        enter(progress, SyncPhase::EnrichItems);
        let items = enrich_all(records, user);

        enter(progress, SyncPhase::InsertItems);
        insert_batch(self.items, "items", &items, progress)
    }
}

fn enter(progress: &mut dyn SyncProgress, phase: SyncPhase) {
    debug!(%phase, "entering phase");
    progress.phase(phase);
}

fn require_store<S: RecordStore>(store: &S) -> Result<()> {
    if store.exists()? {
        Ok(())
    } else {
        Err(ConfigError::MissingStore(store.name().to_string()).into())
    }
}

fn insert_batch<S: RecordStore>(
    store: &S,
    label: &str,
    records: &[S::Record],
    progress: &mut dyn SyncProgress,
) -> std::result::Result<BatchOutcome, StoreError> {
    info!(store = store.name(), count = records.len(), "adding {}", label);
    progress.begin(label, records.len());
    let result = store.insert(records, &mut |_| progress.advance());
    progress.finish();
    Ok(BatchOutcome::from_count(result?))
}

/// Insert one record at a time, treating uniqueness rejections as
/// "already stored". Used for stores without an existence lookup.
fn insert_skipping_duplicates<S: RecordStore>(
    store: &S,
    label: &str,
    records: &[S::Record],
    progress: &mut dyn SyncProgress,
) -> std::result::Result<BatchOutcome, StoreError> {
    info!(store = store.name(), count = records.len(), "adding {}", label);
    progress.begin(label, records.len());
    let mut inserted = 0;
    for record in records {
        match store.insert(std::slice::from_ref(record), &mut |_| progress.advance()) {
            Ok(n) => inserted += n,
            Err(StoreError::AlreadyExists(key)) => debug!(store = store.name(), %key, "already stored"),
            Err(e) => {
                progress.finish();
                return Err(e);
            }
        }
    }
    progress.finish();
    Ok(BatchOutcome::from_count(inserted))
}
