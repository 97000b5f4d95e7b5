use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::warn;

use super::{
    config::MongoConfig,
    connection::connect_transactional,
    error::{MongoDaoError, MongoResult},
    models::{doc_id, id_to_string, scan_documents, set_document, status_filter},
};
use crate::dao::{
    match_store::MatchStore,
    models::{MatchStatus, MatchUpdate, StatusScan},
    storage::StorageResult,
};

/// Operations per transaction; matches the write-set limit of the hosted store it replaces.
const MAX_BATCH_SIZE: usize = 500;

/// [`MatchStore`] over one MongoDB collection; cheap to clone.
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            connect_transactional(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure the status index is present.
    ///
    /// Batches run inside multi-document transactions, so the deployment must be a
    /// replica set or a sharded cluster.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            connect_transactional(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_status_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: self.inner.config.collection.clone(),
                index: "status",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<Document>(&self.inner.config.collection)
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn find_by_status(&self, status: MatchStatus) -> MongoResult<StatusScan> {
        let collection = self.collection().await;
        let status_name = status.as_str();

        let documents: Vec<Document> = collection
            .find(status_filter(status))
            .await
            .map_err(|source| MongoDaoError::FindByStatus {
                status: status_name,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::FindByStatus {
                status: status_name,
                source,
            })?;

        Ok(scan_documents(&documents))
    }

    async fn list_ids(&self) -> MongoResult<Vec<String>> {
        let collection = self.collection().await;

        let documents: Vec<Document> = collection
            .find(doc! {})
            .projection(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;

        Ok(documents
            .iter()
            .filter_map(|document| {
                let raw = document.get("_id")?;
                let id = id_to_string(raw);
                if id.is_none() {
                    warn!(id = %raw, "skipping match with unsupported `_id` type");
                }
                id
            })
            .collect())
    }

    async fn commit_batch(&self, updates: Vec<MatchUpdate>) -> MongoResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let client = self.client().await;
        let collection = self.collection().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Transaction {
                stage: "start_session",
                source,
            })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction {
                stage: "start_transaction",
                source,
            })?;

        if let Err(err) = apply_updates(&collection, &mut session, &updates).await {
            if let Err(abort_err) = session.abort_transaction().await {
                warn!(error = %abort_err, "failed to abort MongoDB transaction");
            }
            return Err(err);
        }

        session
            .commit_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction {
                stage: "commit_transaction",
                source,
            })
    }
}

async fn apply_updates(
    collection: &Collection<Document>,
    session: &mut ClientSession,
    updates: &[MatchUpdate],
) -> MongoResult<()> {
    for update in updates {
        let result = collection
            .update_one(doc_id(&update.id), set_document(&update.fields))
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::Update {
                id: update.id.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::MatchNotFound {
                id: update.id.clone(),
            });
        }
    }
    Ok(())
}

impl MatchStore for MongoMatchStore {
    fn find_by_status(
        &self,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<StatusScan>> {
        let store = self.clone();
        Box::pin(async move { store.find_by_status(status).await.map_err(Into::into) })
    }

    fn list_ids(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.list_ids().await.map_err(Into::into) })
    }

    fn commit_batch(&self, updates: Vec<MatchUpdate>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit_batch(updates).await.map_err(Into::into) })
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
