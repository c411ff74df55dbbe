//! In-memory document client.
//!
//! This module provides a [`DocumentClient`] that keeps every keyspace
//! collection in process memory, behind async-aware read-write locks. It
//! mirrors the observable behavior of the REST client closely enough to stand
//! in for it during development and tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::Document;
use serde_json::Value;

use docgate_core::{
    client::{ClientConnector, CollectionOptions, DocumentClient},
    descriptor::ConnectionDescriptor,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FindOptions, Predicate},
};

use crate::evaluator::PredicateEvaluator;

type CollectionMap = BTreeMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;


/// Thread-safe in-memory document client.
///
/// Clones share the same underlying data, so a client handed to a connection
/// through [`InMemoryConnector`] can still be inspected by the test that
/// created it.
///
/// # Behavior
///
/// - Writing a document into a missing collection creates the collection.
/// - Documents are kept ordered by id, so searches return them in id order.
/// - `fields` projections keep only the listed top-level fields.
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryClient;
/// use docgate_core::client::{CollectionOptions, DocumentClient};
/// use bson::doc;
///
/// let client = InMemoryClient::new();
/// client.create_collection("carts", &CollectionOptions::default()).await?;
/// client.insert_document("carts", "c1", doc! { "name": "My Cart" }).await?;
///
/// let cart = client.get_document("carts", "c1").await?;
/// assert!(cart.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryClient {
    /// collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
    /// JSON schemas attached at collection creation
    schemas: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryClient {
    /// Creates a new client with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a connector that hands out this client (sharing its data).
    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector::new(self.clone())
    }

    /// Returns the JSON schema attached to `collection`, if any.
    pub async fn json_schema(&self, collection: &str) -> Option<Value> {
        self.schemas
            .read()
            .await
            .get(collection)
            .cloned()
    }
}


#[async_trait]
impl DocumentClient for InMemoryClient {
    async fn create_collection(&self, name: &str, options: &CollectionOptions) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        if let Some(schema) = &options.json_schema {
            self.schemas
                .write()
                .await
                .insert(name.to_string(), schema.clone());
        }

        tracing::debug!(collection = name, "created in-memory collection");

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        if self.store.write().await.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        self.schemas.write().await.remove(name);

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();

        Ok(names)
    }

    async fn insert_document(&self, collection: &str, id: &str, mut document: Document) -> DocumentStoreResult<()> {
        if !document.contains_key(ID_FIELD) {
            document.insert(ID_FIELD, id);
        }

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);

        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> DocumentStoreResult<Option<Document>> {
        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .and_then(|collection_map| collection_map.get(id))
                .cloned()
        )
    }

    async fn find_documents(
        &self,
        collection: &str,
        predicate: &Predicate,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let matched = PredicateEvaluator::filter_documents(collection_map.values(), predicate)?;

        Ok(
            matched
                .into_iter()
                .take(options.limit.unwrap_or(usize::MAX))
                .map(|document| match &options.fields {
                    Some(fields) => project(document, fields),
                    None => document,
                })
                .collect()
        )
    }

    async fn patch_document(&self, collection: &str, id: &str, changes: Document) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let document = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.get_mut(id))
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        for (field, value) in changes {
            document.insert(field, value);
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()> {
        if let Some(collection_map) = self.store.write().await.get_mut(collection) {
            collection_map.remove(id);
        }

        Ok(())
    }
}

fn project(document: Document, fields: &[String]) -> Document {
    document
        .into_iter()
        .filter(|(key, _)| fields.iter().any(|field| field == key))
        .collect()
}


/// [`ClientConnector`] for [`InMemoryClient`].
///
/// Every `connect` call returns a handle onto the same data, so documents
/// survive a reconnect of the owning connection.
#[derive(Default, Clone, Debug)]
pub struct InMemoryConnector {
    client: InMemoryClient,
}

impl InMemoryConnector {
    pub fn new(client: InMemoryClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &InMemoryClient {
        &self.client
    }
}

#[async_trait]
impl ClientConnector for InMemoryConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> DocumentStoreResult<Arc<dyn DocumentClient>> {
        tracing::debug!(keyspace = descriptor.keyspace(), "attaching in-memory client");

        Ok(Arc::new(self.client.clone()))
    }
}
