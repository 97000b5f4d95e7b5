#[cfg(feature = "firestore-store")]
pub mod firestore;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{MatchStatus, MatchUpdate, StatusScan};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer holding match documents.
pub trait MatchStore: Send + Sync {
    /// Fetch every match whose `status` field equals `status`.
    ///
    /// A document that cannot be decoded lands in [`StatusScan::invalid`];
    /// only transport or backend failures fail the query.
    fn find_by_status(&self, status: MatchStatus) -> BoxFuture<'static, StorageResult<StatusScan>>;
    /// Identifiers of every match of the collection.
    ///
    /// No field is decoded, so documents with a corrupted `status` are still listed.
    fn list_ids(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    /// Apply `updates` as a single atomic write set: all of them or none.
    ///
    /// Callers never pass more than [`MatchStore::max_batch_size`] updates.
    fn commit_batch(&self, updates: Vec<MatchUpdate>) -> BoxFuture<'static, StorageResult<()>>;
    /// Largest write set the backend accepts atomically.
    fn max_batch_size(&self) -> usize;
    /// Cheap round-trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection in place after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
