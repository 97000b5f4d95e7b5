use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for the MongoDB backend.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB deployment is not a replica set or sharded cluster; no transactions")]
    TransactionsUnsupported,
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: String,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to query matches with status `{status}`")]
    FindByStatus {
        status: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to list matches")]
    ListMatches {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB transaction failed during `{stage}`")]
    Transaction {
        stage: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to update match `{id}`")]
    Update {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("invalid match document `{id}`: {reason}")]
    InvalidDocument { id: String, reason: String },
    #[error("match `{id}` not found")]
    MatchNotFound { id: String },
}
