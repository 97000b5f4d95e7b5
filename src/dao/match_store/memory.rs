//! Process-local match store used for development runs and as the test double
//! of the scheduler and remediation services.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    match_store::MatchStore,
    models::{MatchEntity, MatchFields, MatchStatus, MatchUpdate, StatusScan},
    storage::{StorageError, StorageResult},
};

/// Write-set limit mirroring the hosted document stores.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Faults the in-memory store can be told to produce.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// Raised by reads while [`MemoryMatchStore::set_fail_queries`] is on.
    #[error("injected query failure")]
    QueryFailure,
    /// Raised by commits while [`MemoryMatchStore::set_fail_commits`] is on.
    #[error("injected commit failure")]
    CommitFailure,
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        match err {
            MemoryStoreError::QueryFailure => StorageError::unavailable(err.to_string(), err),
            MemoryStoreError::CommitFailure => StorageError::rejected(err.to_string()),
        }
    }
}

/// [`MatchStore`] keeping every document in a map behind one lock.
///
/// Clones share the same documents.
#[derive(Clone)]
pub struct MemoryMatchStore {
    inner: Arc<MemoryInner>,
}

/// Stored document: either decodable or only known by id and status.
#[derive(Debug, Clone)]
enum Record {
    Valid(MatchEntity),
    Unreadable { status: MatchStatus },
}

impl Record {
    fn status(&self) -> MatchStatus {
        match self {
            Record::Valid(entity) => entity.status,
            Record::Unreadable { status } => *status,
        }
    }

    fn apply(&mut self, id: &str, fields: &MatchFields) {
        match self {
            Record::Valid(entity) => fields.apply_to(entity),
            // A full rewrite of status and visibility makes the document readable again.
            Record::Unreadable { .. } => match (fields.status, fields.visible) {
                (Some(status), Some(visible)) => {
                    *self = Record::Valid(MatchEntity {
                        id: id.to_owned(),
                        status,
                        date_time_start: None,
                        visible,
                    });
                }
                (Some(status), None) => *self = Record::Unreadable { status },
                _ => {}
            },
        }
    }
}

struct MemoryInner {
    matches: RwLock<BTreeMap<String, Record>>,
    max_batch_size: usize,
    fail_queries: AtomicBool,
    fail_commits: AtomicBool,
    commits: AtomicUsize,
}

impl Default for MemoryMatchStore {
    fn default() -> Self {
        Self::with_max_batch_size(DEFAULT_MAX_BATCH_SIZE)
    }
}

impl MemoryMatchStore {
    /// Empty store with the default write-set limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store whose atomic write sets are capped at `max_batch_size` updates.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                matches: RwLock::new(BTreeMap::new()),
                max_batch_size: max_batch_size.max(1),
                fail_queries: AtomicBool::new(false),
                fail_commits: AtomicBool::new(false),
                commits: AtomicUsize::new(0),
            }),
        }
    }

    /// Insert a new match and return the identifier assigned to it.
    pub async fn insert(
        &self,
        status: MatchStatus,
        date_time_start: Option<SystemTime>,
        visible: bool,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let entity = MatchEntity {
            id: id.clone(),
            status,
            date_time_start,
            visible,
        };
        self.inner
            .matches
            .write()
            .await
            .insert(id.clone(), Record::Valid(entity));
        id
    }

    /// Insert a document whose fields other than `status` cannot be decoded.
    pub async fn insert_unreadable(&self, status: MatchStatus) -> String {
        let id = Uuid::new_v4().to_string();
        self.inner
            .matches
            .write()
            .await
            .insert(id.clone(), Record::Unreadable { status });
        id
    }

    /// Decoded match stored under `id`; `None` for unknown or unreadable documents.
    pub async fn get(&self, id: &str) -> Option<MatchEntity> {
        match self.inner.matches.read().await.get(id) {
            Some(Record::Valid(entity)) => Some(entity.clone()),
            _ => None,
        }
    }

    /// Copy of every readable match, ordered by identifier.
    pub async fn snapshot(&self) -> Vec<MatchEntity> {
        self.inner
            .matches
            .read()
            .await
            .values()
            .filter_map(|record| match record {
                Record::Valid(entity) => Some(entity.clone()),
                Record::Unreadable { .. } => None,
            })
            .collect()
    }

    /// Make subsequent queries fail until reset.
    pub fn set_fail_queries(&self, fail: bool) {
        self.inner.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent commits fail until reset.
    pub fn set_fail_commits(&self, fail: bool) {
        self.inner.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of write sets applied successfully so far.
    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    fn check_queries(&self) -> Result<(), MemoryStoreError> {
        if self.inner.fail_queries.load(Ordering::SeqCst) {
            return Err(MemoryStoreError::QueryFailure);
        }
        Ok(())
    }

    async fn commit(&self, updates: Vec<MatchUpdate>) -> StorageResult<()> {
        if self.inner.fail_commits.load(Ordering::SeqCst) {
            return Err(MemoryStoreError::CommitFailure.into());
        }
        if updates.len() > self.inner.max_batch_size {
            return Err(StorageError::rejected(format!(
                "write set of {} updates exceeds limit of {}",
                updates.len(),
                self.inner.max_batch_size
            )));
        }

        // The write lock is held for the whole set, so readers never observe a partial batch.
        let mut matches = self.inner.matches.write().await;
        if let Some(missing) = updates.iter().find(|update| !matches.contains_key(&update.id)) {
            return Err(StorageError::NotFound {
                id: missing.id.clone(),
            });
        }

        for update in &updates {
            if let Some(record) = matches.get_mut(&update.id) {
                record.apply(&update.id, &update.fields);
            }
        }
        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MatchStore for MemoryMatchStore {
    fn find_by_status(&self, status: MatchStatus) -> BoxFuture<'static, StorageResult<StatusScan>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_queries()?;
            let mut scan = StatusScan::default();
            let matches = store.inner.matches.read().await;
            for (id, record) in matches.iter().filter(|(_, record)| record.status() == status) {
                match record {
                    Record::Valid(entity) => scan.matches.push(entity.clone()),
                    Record::Unreadable { .. } => scan.invalid.push(id.clone()),
                }
            }
            Ok(scan)
        })
    }

    fn list_ids(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_queries()?;
            Ok(store.inner.matches.read().await.keys().cloned().collect())
        })
    }

    fn commit_batch(&self, updates: Vec<MatchUpdate>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit(updates).await })
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_queries().map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
