//! Remote document-store client abstraction.
//!
//! This module defines the narrow interface the connection layer consumes. A
//! [`DocumentClient`] is stateless from the connection's point of view: it is
//! bound to one keyspace and one bearer token when it is built, and every
//! method maps to a single remote call.
//!
//! # Traits
//!
//! - [`DocumentClient`]: collection management and document CRUD/search
//! - [`ClientConnector`]: builds a client from a parsed [`ConnectionDescriptor`]
//!
//! # Examples
//!
//! ```ignore
//! use docgate_core::client::{ClientConnector, CollectionOptions};
//!
//! let client = connector.connect(&descriptor).await?;
//! client.create_collection("carts", &CollectionOptions::default()).await?;
//! ```

use async_trait::async_trait;
use bson::Document;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

use crate::{
    descriptor::ConnectionDescriptor,
    error::DocumentStoreResult,
    query::{FindOptions, Predicate},
};

/// Options applied when a collection is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionOptions {
    /// JSON schema attached to the collection after creation.
    pub json_schema: Option<Value>,
}

impl CollectionOptions {
    pub fn with_json_schema(mut self, schema: Value) -> Self {
        self.json_schema = Some(schema);
        self
    }
}

/// Abstract interface for remote document stores.
///
/// Implementations must be thread-safe; a single client is shared by every
/// collection handle of a connection.
///
/// # Error Handling
///
/// Transport failures are reported as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
/// Implementations do not log failures at error level; the operation executor
/// does that once per failed operation.
#[async_trait]
pub trait DocumentClient: Send + Sync + Debug {
    /// Creates a collection in the client's keyspace.
    async fn create_collection(&self, name: &str, options: &CollectionOptions) -> DocumentStoreResult<()>;

    /// Drops a collection and all of its documents.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of the collections in the keyspace.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Writes a document under `id`, replacing any document already stored there.
    ///
    /// The collection is created on demand.
    async fn insert_document(&self, collection: &str, id: &str, document: Document) -> DocumentStoreResult<()>;

    /// Fetches one document by id. A missing document is `Ok(None)`.
    async fn get_document(&self, collection: &str, id: &str) -> DocumentStoreResult<Option<Document>>;

    /// Returns the documents matching `predicate`.
    ///
    /// The predicate is expected to come from
    /// [`format_query`](crate::query::format_query); `options.limit` and
    /// `options.fields` are honored, `options.collation` is ignored here.
    async fn find_documents(
        &self,
        collection: &str,
        predicate: &Predicate,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Merges `changes` into the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// if the document does not exist.
    async fn patch_document(&self, collection: &str, id: &str, changes: Document) -> DocumentStoreResult<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()>;
}

/// Factory for [`DocumentClient`]s, invoked once per successful descriptor
/// resolution in `open`.
#[async_trait]
pub trait ClientConnector: Send + Sync + Debug {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> DocumentStoreResult<Arc<dyn DocumentClient>>;
}

#[async_trait]
impl<C> ClientConnector for Arc<C>
where
    C: ClientConnector + ?Sized,
{
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> DocumentStoreResult<Arc<dyn DocumentClient>> {
        (**self).connect(descriptor).await
    }
}
