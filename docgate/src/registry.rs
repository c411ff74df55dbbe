//! Collection handles and the per-connection registry that caches them.
//!
//! A [`CollectionHandle`] is a lightweight, name-scoped view of a connection.
//! It does not own a client: every operation looks up the connection's
//! current client at call time, waiting for the connection to become ready
//! first. Handles therefore stay valid across reconnects of their connection.
//!
//! Like the connection itself, each operation returns its `Result` directly
//! and has a `_with` variant that settles through a [`Callback`] instead.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! let carts = connection.collection("carts");
//! let id = carts.insert_one(doc! { "name": "My Cart" }).await?;
//! let cart = carts.find_by_id(&id).await?;
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};
use bson::Document;
use parking_lot::Mutex;

use docgate_core::{
    client::DocumentClient,
    document::{DocumentExt, document_id, ensure_document_id},
    error::{DocumentStoreError, DocumentStoreResult},
    executor::{Callback, execute_operation},
    query::{FindOptions, format_query},
};

use crate::connection::ConnectionShared;


/// Cache of collection handles, keyed by name.
///
/// The first request for a name creates its handle; later requests return
/// the same `Arc`.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    handles: Mutex<HashMap<String, Arc<CollectionHandle>>>,
}

impl CollectionRegistry {
    pub(crate) fn get_or_create(&self, name: &str, connection: &Weak<ConnectionShared>) -> Arc<CollectionHandle> {
        self.handles
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(collection = name, "registering collection handle");
                Arc::new(CollectionHandle::new(name.to_string(), connection.clone()))
            })
            .clone()
    }

    /// Returns the handle registered under `name`, without creating one.
    pub fn get(&self, name: &str) -> Option<Arc<CollectionHandle>> {
        self.handles.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}


/// Operations on one named collection of a connection.
///
/// Every method waits until the owning connection is ready, runs through the
/// operation executor (so failures are logged once), and translates filter
/// documents before they reach the client.
#[derive(Debug)]
pub struct CollectionHandle {
    name: String,
    connection: Weak<ConnectionShared>,
}

impl CollectionHandle {
    fn new(name: String, connection: Weak<ConnectionShared>) -> Self {
        Self { name, connection }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn client(&self) -> DocumentStoreResult<Arc<dyn DocumentClient>> {
        let connection = self
            .connection
            .upgrade()
            .ok_or_else(|| DocumentStoreError::ConnectionUnavailable("connection has been dropped".into()))?;

        connection.ready_client().await
    }

    async fn insert_with(&self, client: &dyn DocumentClient, mut document: Document) -> DocumentStoreResult<String> {
        let id = ensure_document_id(&mut document)?;
        client.insert_document(&self.name, &id, document).await?;

        Ok(id)
    }

    /// Inserts a document, assigning a fresh `_id` when it has none.
    ///
    /// # Arguments
    ///
    /// * `document` - The document to store. An existing document with the same id is replaced.
    ///
    /// # Returns
    ///
    /// The id the document was stored under.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `_id` has an unsupported type,
    /// or the client's error.
    pub async fn insert_one(&self, document: Document) -> DocumentStoreResult<String> {
        execute_operation(self.insert_document(document), None).await
    }

    /// [`insert_one`](Self::insert_one), settling through `callback`.
    pub async fn insert_one_with(&self, document: Document, callback: Callback<String>) -> DocumentStoreResult<String> {
        execute_operation(self.insert_document(document), Some(callback)).await
    }

    async fn insert_document(&self, document: Document) -> DocumentStoreResult<String> {
        let client = self.client().await?;
        self.insert_with(client.as_ref(), document).await
    }

    /// Inserts documents one by one, in order.
    ///
    /// Stops at the first failure; documents inserted before it stay stored.
    pub async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<String>> {
        execute_operation(self.insert_documents(documents), None).await
    }

    pub async fn insert_many_with(
        &self,
        documents: Vec<Document>,
        callback: Callback<Vec<String>>,
    ) -> DocumentStoreResult<Vec<String>> {
        execute_operation(self.insert_documents(documents), Some(callback)).await
    }

    async fn insert_documents(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<String>> {
        let client = self.client().await?;
        let mut ids = Vec::with_capacity(documents.len());

        for document in documents {
            ids.push(self.insert_with(client.as_ref(), document).await?);
        }

        Ok(ids)
    }

    /// Serializes `value` and inserts it like [`insert_one`](Self::insert_one).
    pub async fn insert_value<T>(&self, value: &T) -> DocumentStoreResult<String>
    where
        T: DocumentExt + Sync,
    {
        execute_operation(
            async {
                let document = value.to_document()?;
                self.insert_document(document).await
            },
            None,
        )
        .await
    }

    /// Returns the documents matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `filter` - Field conditions; scalar values mean equality
    /// * `options` - Limit and projection. A collation makes the call fail.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedCapability`] if a collation is set.
    pub async fn find(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        execute_operation(self.find_documents(filter, options), None).await
    }

    /// [`find`](Self::find), settling through `callback`.
    pub async fn find_with(
        &self,
        filter: Document,
        options: FindOptions,
        callback: Callback<Vec<Document>>,
    ) -> DocumentStoreResult<Vec<Document>> {
        execute_operation(self.find_documents(filter, options), Some(callback)).await
    }

    /// Like [`find`](Self::find), deserializing each document into `T`.
    pub async fn find_as<T>(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Vec<T>>
    where
        T: DocumentExt + Send,
    {
        execute_operation(
            async {
                self.find_documents(filter, options)
                    .await?
                    .into_iter()
                    .map(T::from_document)
                    .collect::<DocumentStoreResult<Vec<T>>>()
            },
            None,
        )
        .await
    }

    /// Returns the first document matching `filter`, if any.
    pub async fn find_one(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Option<Document>> {
        execute_operation(self.find_first(filter, options), None).await
    }

    pub async fn find_one_with(
        &self,
        filter: Document,
        options: FindOptions,
        callback: Callback<Option<Document>>,
    ) -> DocumentStoreResult<Option<Document>> {
        execute_operation(self.find_first(filter, options), Some(callback)).await
    }

    async fn find_first(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Option<Document>> {
        let options = FindOptions { limit: Some(1), ..options };

        Ok(self
            .find_documents(filter, options)
            .await?
            .into_iter()
            .next())
    }

    pub async fn find_by_id(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        execute_operation(self.get_document(id), None).await
    }

    pub async fn find_by_id_with(
        &self,
        id: &str,
        callback: Callback<Option<Document>>,
    ) -> DocumentStoreResult<Option<Document>> {
        execute_operation(self.get_document(id), Some(callback)).await
    }

    async fn get_document(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        self.client().await?.get_document(&self.name, id).await
    }

    /// Counts the documents matching `filter`.
    ///
    /// Counts what a single search returns. The REST client reads one page
    /// of at most [`MAX_PAGE_SIZE`](docgate_rest::MAX_PAGE_SIZE) documents,
    /// so larger result sets are undercounted.
    pub async fn count_documents(&self, filter: Document) -> DocumentStoreResult<usize> {
        execute_operation(self.count(filter), None).await
    }

    pub async fn count_documents_with(&self, filter: Document, callback: Callback<usize>) -> DocumentStoreResult<usize> {
        execute_operation(self.count(filter), Some(callback)).await
    }

    async fn count(&self, filter: Document) -> DocumentStoreResult<usize> {
        Ok(self
            .find_documents(filter, FindOptions::default())
            .await?
            .len())
    }

    /// Merges `changes` into the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if there is no such document.
    pub async fn update_by_id(&self, id: &str, changes: Document) -> DocumentStoreResult<()> {
        execute_operation(self.patch_document(id, changes), None).await
    }

    pub async fn update_by_id_with(&self, id: &str, changes: Document, callback: Callback<()>) -> DocumentStoreResult<()> {
        execute_operation(self.patch_document(id, changes), Some(callback)).await
    }

    async fn patch_document(&self, id: &str, changes: Document) -> DocumentStoreResult<()> {
        self.client().await?.patch_document(&self.name, id, changes).await
    }

    pub async fn delete_by_id(&self, id: &str) -> DocumentStoreResult<()> {
        execute_operation(self.delete_document(id), None).await
    }

    pub async fn delete_by_id_with(&self, id: &str, callback: Callback<()>) -> DocumentStoreResult<()> {
        execute_operation(self.delete_document(id), Some(callback)).await
    }

    async fn delete_document(&self, id: &str) -> DocumentStoreResult<()> {
        self.client().await?.delete_document(&self.name, id).await
    }

    /// Deletes every document matching `filter` and returns how many were deleted.
    ///
    /// Deletes what a single search returns. With the REST client that is one
    /// page of at most [`MAX_PAGE_SIZE`](docgate_rest::MAX_PAGE_SIZE)
    /// documents; call again until it returns 0 to clear larger sets.
    pub async fn delete_many(&self, filter: Document) -> DocumentStoreResult<usize> {
        execute_operation(self.delete_matching(filter), None).await
    }

    pub async fn delete_many_with(&self, filter: Document, callback: Callback<usize>) -> DocumentStoreResult<usize> {
        execute_operation(self.delete_matching(filter), Some(callback)).await
    }

    async fn delete_matching(&self, filter: Document) -> DocumentStoreResult<usize> {
        let client = self.client().await?;
        let predicate = format_query(&filter, &FindOptions::default())?;
        let ids = client
            .find_documents(&self.name, &predicate, &FindOptions::default())
            .await?
            .iter()
            .filter_map(document_id)
            .collect::<Vec<_>>();

        for id in &ids {
            client.delete_document(&self.name, id).await?;
        }

        Ok(ids.len())
    }

    async fn find_documents(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        let predicate = format_query(&filter, &options)?;

        self.client()
            .await?
            .find_documents(&self.name, &predicate, &options)
            .await
    }
}
