use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::dao::{
    match_store::MatchStore,
    models::{MatchStatus, MatchUpdate, StatusScan},
    storage::StorageResult,
};

use super::{
    config::FirestoreConfig,
    error::{FirestoreDaoError, FirestoreResult},
    models::{
        CommitRequest, LIST_PAGE_SIZE, ListDocumentsResponse, MAX_WRITES_PER_COMMIT,
        RunQueryItem, Write, scan_query_results, status_query,
    },
};

/// [`MatchStore`] speaking the Firestore REST API; cheap to clone.
#[derive(Clone)]
pub struct FirestoreMatchStore {
    client: Client,
    config: Arc<FirestoreConfig>,
}

impl FirestoreMatchStore {
    /// Build the HTTP client and check that the collection is reachable.
    pub async fn connect(config: FirestoreConfig) -> FirestoreResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| FirestoreDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            config: Arc::new(config),
        };

        store.ping().await?;
        Ok(store)
    }

    /// `suffix` is appended to the documents root, either `/<collection>...` or `:<verb>`.
    fn request(&self, method: Method, suffix: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}{}",
            self.config.base_url,
            self.config.documents_root(),
            suffix
        );
        let builder = self.client.request(method, url);
        match self.config.bearer_token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        suffix: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> FirestoreResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let mut builder = self.request(method, suffix).query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| FirestoreDaoError::RequestSend {
                path: suffix.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FirestoreDaoError::RequestStatus {
                path: suffix.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| FirestoreDaoError::DecodeResponse {
                path: suffix.to_string(),
                source,
            })
    }

    async fn ping(&self) -> FirestoreResult<()> {
        let suffix = format!("/{}", self.config.collection);
        let query = [
            ("pageSize", "1".to_string()),
            ("mask.fieldPaths", "status".to_string()),
        ];
        self.send_json::<(), ListDocumentsResponse>(Method::GET, &suffix, &query, None)
            .await
            .map(|_| ())
    }

    async fn find_by_status(&self, status: MatchStatus) -> FirestoreResult<StatusScan> {
        let query = status_query(&self.config.collection, status);
        let items: Vec<RunQueryItem> = self
            .send_json(Method::POST, ":runQuery", &[], Some(&query))
            .await?;

        Ok(scan_query_results(items))
    }

    async fn list_ids(&self) -> FirestoreResult<Vec<String>> {
        let suffix = format!("/{}", self.config.collection);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("pageSize", LIST_PAGE_SIZE.to_string()),
                ("mask.fieldPaths", "status".to_string()),
            ];
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: ListDocumentsResponse = self
                .send_json::<(), _>(Method::GET, &suffix, &query, None)
                .await?;
            ids.extend(page.documents.iter().map(|document| document.id().to_owned()));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn commit_batch(&self, updates: Vec<MatchUpdate>) -> FirestoreResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let request = CommitRequest {
            writes: updates
                .iter()
                .map(|update| Write::update(self.config.document_name(&update.id), &update.fields))
                .collect(),
        };

        let response = self
            .request(Method::POST, ":commit")
            .json(&request)
            .send()
            .await
            .map_err(|source| FirestoreDaoError::RequestSend {
                path: ":commit".to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status @ (StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND
            | StatusCode::CONFLICT
            | StatusCode::PRECONDITION_FAILED) => {
                let message = response.text().await.unwrap_or_default();
                Err(FirestoreDaoError::CommitRejected { status, message })
            }
            other => Err(FirestoreDaoError::RequestStatus {
                path: ":commit".to_string(),
                status: other,
            }),
        }
    }
}

impl MatchStore for FirestoreMatchStore {
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
        MAX_WRITES_PER_COMMIT
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
