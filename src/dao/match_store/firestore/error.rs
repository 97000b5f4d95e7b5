//! Error types shared by the Firestore storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`FirestoreDaoError`] failures.
pub type FirestoreResult<T> = Result<T, FirestoreDaoError>;

/// Failures that can occur while interacting with the Firestore REST API.
#[derive(Debug, Error)]
pub enum FirestoreDaoError {
    /// Required environment variable is missing.
    #[error("missing Firestore environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Firestore client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send Firestore request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Firestore returned an unexpected status code.
    #[error("unexpected Firestore response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode Firestore response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A document did not have the shape of a match.
    #[error("invalid match document `{name}`: {reason}")]
    InvalidDocument { name: String, reason: String },
    /// The commit was refused as a whole (failed precondition, missing document, ...).
    #[error("Firestore rejected commit with status {status}: {message}")]
    CommitRejected { status: StatusCode, message: String },
}
