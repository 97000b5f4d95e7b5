//! Commits staged match updates as atomic write sets.
//!
//! Each chunk of at most [`MatchStore::max_batch_size`] updates is applied
//! all-or-nothing. Chunks are committed sequentially and the first failure
//! stops the run; chunks applied before it stay applied.

use tracing::{debug, warn};

use crate::{
    dao::{match_store::MatchStore, models::MatchUpdate},
    error::ServiceError,
};

/// Commit `updates` and return how many were applied.
pub async fn commit(
    store: &dyn MatchStore,
    updates: Vec<MatchUpdate>,
) -> Result<usize, ServiceError> {
    if updates.is_empty() {
        return Ok(0);
    }

    let chunk_size = store.max_batch_size().max(1);
    let total = updates.len();
    let mut committed = 0;
    let mut remaining = updates.into_iter().peekable();

    while remaining.peek().is_some() {
        let chunk: Vec<MatchUpdate> = remaining.by_ref().take(chunk_size).collect();
        let size = chunk.len();

        if let Err(source) = store.commit_batch(chunk).await {
            if committed == 0 {
                return Err(ServiceError::Unavailable(source));
            }
            warn!(committed, total, error = %source, "chunked commit stopped part-way");
            return Err(ServiceError::PartialCommit { committed, source });
        }

        committed += size;
        debug!(size, committed, total, "committed match write set");
    }

    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        match_store::memory::MemoryMatchStore,
        models::{MatchFields, MatchStatus},
    };

    async fn seeded(store: &MemoryMatchStore, count: usize) -> Vec<MatchUpdate> {
        let mut updates = Vec::with_capacity(count);
        for _ in 0..count {
            let id = store.insert(MatchStatus::Open, None, false).await;
            updates.push(MatchUpdate::new(id, MatchFields::status(MatchStatus::Live)));
        }
        updates
    }

    #[tokio::test]
    async fn empty_update_list_commits_nothing() {
        let store = MemoryMatchStore::new();
        assert_eq!(commit(&store, Vec::new()).await.unwrap(), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn updates_beyond_limit_are_chunked() {
        let store = MemoryMatchStore::with_max_batch_size(2);
        let updates = seeded(&store, 5).await;

        assert_eq!(commit(&store, updates).await.unwrap(), 5);
        assert_eq!(store.commit_count(), 3);
        assert!(
            store
                .snapshot()
                .await
                .iter()
                .all(|entity| entity.status == MatchStatus::Live)
        );
    }

    #[tokio::test]
    async fn failed_single_batch_applies_nothing() {
        let store = MemoryMatchStore::new();
        let updates = seeded(&store, 3).await;
        store.set_fail_commits(true);

        let err = commit(&store, updates).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(
            store
                .snapshot()
                .await
                .iter()
                .all(|entity| entity.status == MatchStatus::Open)
        );
    }

    #[tokio::test]
    async fn failure_after_first_chunk_reports_partial_commit() {
        let store = MemoryMatchStore::with_max_batch_size(2);
        let mut updates = seeded(&store, 2).await;
        // The second chunk targets a match the store does not know.
        updates.push(MatchUpdate::new(
            "ghost",
            MatchFields::status(MatchStatus::Live),
        ));

        let err = commit(&store, updates).await.unwrap_err();
        assert!(matches!(err, ServiceError::PartialCommit { committed: 2, .. }));
        assert_eq!(store.commit_count(), 1);
    }
}
