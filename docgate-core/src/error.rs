//! Error types and result types for connection and document operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`].
//! Errors raised by the remote transport are carried through as
//! [`DocumentStoreError::Backend`] without further interpretation.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// Represents all possible errors that can occur when connecting to or querying
/// a remote document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The connection URI is malformed or is missing a mandatory component
    /// (keyspace or application token).
    #[error("{0}")]
    Validation(String),
    /// The caller asked for a capability the remote store does not offer,
    /// such as collations or an unknown query operator.
    #[error("{0}")]
    UnsupportedCapability(String),
    /// The credential exchange failed. When the remote side supplied a
    /// human-readable description, it is the message.
    #[error("{0}")]
    AuthExchange(String),
    /// No usable client is attached to the connection.
    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),
    /// The operation is not valid in the connection's current state.
    #[error("Invalid connection state: expected {expected}, found {actual}")]
    InvalidState {
        expected: String,
        actual: String,
    },
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The payload is not a document or has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the keyspace.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// An error reported by the remote transport.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Builds an [`DocumentStoreError::InvalidState`] from any two displayable states.
    pub fn invalid_state(expected: impl ToString, actual: impl ToString) -> Self {
        DocumentStoreError::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<UrlParseError> for DocumentStoreError {
    fn from(err: UrlParseError) -> Self {
        DocumentStoreError::Validation(format!("Invalid URI: {}", err))
    }
}
