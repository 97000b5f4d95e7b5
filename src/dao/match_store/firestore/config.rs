use super::error::{FirestoreDaoError, FirestoreResult};

const PRODUCTION_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";

/// Runtime configuration describing how to reach the Firestore REST API.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// API root, overridable to point at the emulator.
    pub base_url: String,
    pub project_id: String,
    /// Database id, `(default)` unless configured.
    pub database: String,
    pub collection: String,
    /// OAuth access token sent as `Authorization: Bearer`; the emulator needs none.
    pub bearer_token: Option<String>,
}

impl FirestoreConfig {
    /// Target the production endpoint for `project_id` and its default database.
    pub fn new(project_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.into(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.into(),
            collection: collection.into(),
            bearer_token: None,
        }
    }

    /// Point the client at a local emulator (`host:port`), which needs no credentials.
    pub fn with_emulator(mut self, host: &str) -> Self {
        self.base_url = format!("http://{}/v1", host.trim_end_matches('/'));
        self
    }

    /// Attach an OAuth2 access token sent as `Authorization: Bearer`.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env(collection: impl Into<String>) -> FirestoreResult<Self> {
        let project_id = std::env::var("FIRESTORE_PROJECT_ID").map_err(|_| {
            FirestoreDaoError::MissingEnvVar {
                var: "FIRESTORE_PROJECT_ID",
            }
        })?;

        let mut config = Self::new(project_id, collection);

        if let Ok(database) = std::env::var("FIRESTORE_DATABASE") {
            config.database = database;
        }
        if let Ok(host) = std::env::var("FIRESTORE_EMULATOR_HOST") {
            config = config.with_emulator(&host);
        }
        if let Ok(token) = std::env::var("FIRESTORE_BEARER_TOKEN") {
            config = config.with_bearer_token(token);
        }

        Ok(config)
    }

    /// Resource name of the database documents root, e.g.
    /// `projects/p/databases/(default)/documents`.
    pub fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    /// Full resource name of a match document.
    pub fn document_name(&self, id: &str) -> String {
        format!("{}/{}/{}", self.documents_root(), self.collection, id)
    }
}
