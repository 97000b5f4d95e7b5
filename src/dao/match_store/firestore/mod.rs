mod config;
mod error;
mod models;
mod store;

pub use config::FirestoreConfig;
pub use error::FirestoreDaoError;
pub use store::FirestoreMatchStore;

use crate::dao::storage::StorageError;

impl From<FirestoreDaoError> for StorageError {
    fn from(err: FirestoreDaoError) -> Self {
        match err {
            FirestoreDaoError::CommitRejected { .. } => StorageError::rejected(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
