use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "match_lifecycle";

/// Connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options, including the hosts and credentials from the URI.
    pub options: ClientOptions,
    pub database_name: String,
    /// Collection holding one document per match.
    pub collection: String,
}

impl MongoConfig {
    /// Parse `uri` into driver options; `db_name` defaults to `match_lifecycle`.
    pub async fn from_uri(
        uri: &str,
        db_name: Option<&str>,
        collection: impl Into<String>,
    ) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DB).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            collection: collection.into(),
        })
    }

    /// Read `MONGO_URI` (required) and `MONGO_DB` (optional) from the environment.
    pub async fn from_env(collection: impl Into<String>) -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        Self::from_uri(&uri, db.as_deref(), collection).await
    }
}
