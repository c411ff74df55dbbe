//! HTTP client for the Stargate documents REST API.
//!
//! Every request is scoped to the keyspace of the descriptor the client was
//! built from and carries its application token in the `X-Cassandra-Token`
//! header. Endpoints live under `{base_url}{base_api_path}/{keyspace}/collections`.

use std::{collections::BTreeMap, sync::Arc};
use async_trait::async_trait;
use bson::Document;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header::ACCEPT};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use docgate_core::{
    client::{ClientConnector, CollectionOptions, DocumentClient},
    descriptor::ConnectionDescriptor,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FindOptions, Predicate},
};

use crate::json::JsonConverter;

/// Header carrying the bearer token on every request.
pub const TOKEN_HEADER: &str = "X-Cassandra-Token";

/// Largest page the documents API returns for one search. Searches always
/// request an explicit page size, since the remote default is smaller.
pub const MAX_PAGE_SIZE: usize = 20;


#[derive(Debug, Deserialize)]
struct CollectionInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    description: Option<String>,
}

/// Builds the error message of a failed response.
///
/// Uses the `description` of the error body when there is one, otherwise the
/// status code.
pub(crate) async fn failure_message(response: Response) -> String {
    let status = response.status();

    response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.description)
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}


/// [`DocumentClient`] over the documents REST API.
///
/// Cloning is cheap; clones share the underlying connection pool.
///
/// # Example
///
/// ```ignore
/// use docgate_core::descriptor::parse_descriptor;
/// use docgate_rest::RestClient;
///
/// let descriptor = parse_descriptor("https://host:8082/ks1?applicationToken=tok1")?;
/// let client = RestClient::new(reqwest::Client::new(), descriptor);
/// let names = client.list_collections().await?;
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    descriptor: Arc<ConnectionDescriptor>,
}

impl RestClient {
    pub fn new(http: reqwest::Client, descriptor: ConnectionDescriptor) -> Self {
        Self {
            http,
            descriptor: Arc::new(descriptor),
        }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    fn endpoint(&self, segments: &[&str]) -> DocumentStoreResult<Url> {
        let mut url = Url::parse(self.descriptor.base_url())?;

        url.path_segments_mut()
            .map_err(|_| DocumentStoreError::Validation(format!(
                "Invalid URI: {} cannot carry a path",
                self.descriptor.base_url()
            )))?
            .clear()
            .extend(self.descriptor.base_api_path().split('/').filter(|s| !s.is_empty()))
            .push(self.descriptor.keyspace())
            .push("collections")
            .extend(segments);

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, %url, "sending request");

        self.http
            .request(method, url)
            .header(TOKEN_HEADER, self.descriptor.application_token())
            .header(ACCEPT, "application/json")
    }

    /// Sends `request`, returning the response if it is a success or has one
    /// of the `tolerated` statuses.
    async fn send(&self, request: RequestBuilder, tolerated: &[StatusCode]) -> DocumentStoreResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        if response.status().is_success() || tolerated.contains(&response.status()) {
            return Ok(response);
        }

        Err(DocumentStoreError::Backend(failure_message(response).await))
    }

    async fn read_json(response: Response) -> DocumentStoreResult<Value> {
        response
            .json::<Value>()
            .await
            .map_err(|e| DocumentStoreError::Serialization(e.to_string()))
    }
}

/// Restores the `_id` of a document read back from the store.
fn with_id(mut document: Document, id: &str) -> Document {
    if !document.contains_key(ID_FIELD) {
        document.insert(ID_FIELD, id);
    }
    document
}

#[async_trait]
impl DocumentClient for RestClient {
    async fn create_collection(&self, name: &str, options: &CollectionOptions) -> DocumentStoreResult<()> {
        let request = self
            .request(Method::POST, self.endpoint(&[])?)
            .json(&json!({ "name": name }));
        self.send(request, &[]).await?;

        if let Some(schema) = &options.json_schema {
            let request = self
                .request(Method::PUT, self.endpoint(&[name, "json-schema"])?)
                .json(schema);
            self.send(request, &[]).await?;
        }

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let response = self
            .send(self.request(Method::DELETE, self.endpoint(&[name])?), &[StatusCode::NOT_FOUND])
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut url = self.endpoint(&[])?;
        url.query_pairs_mut().append_pair("raw", "true");

        let collections = self
            .send(self.request(Method::GET, url), &[])
            .await?
            .json::<Vec<CollectionInfo>>()
            .await
            .map_err(|e| DocumentStoreError::Serialization(e.to_string()))?;

        Ok(collections.into_iter().map(|info| info.name).collect())
    }

    async fn insert_document(&self, collection: &str, id: &str, document: Document) -> DocumentStoreResult<()> {
        let request = self
            .request(Method::PUT, self.endpoint(&[collection, id])?)
            .json(&JsonConverter::document_to_json(&document));
        self.send(request, &[]).await?;

        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> DocumentStoreResult<Option<Document>> {
        let mut url = self.endpoint(&[collection, id])?;
        url.query_pairs_mut().append_pair("raw", "true");

        let response = self
            .send(self.request(Method::GET, url), &[StatusCode::NOT_FOUND])
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::read_json(response).await?;

        Ok(Some(with_id(JsonConverter::to_document(&body)?, id)))
    }

    async fn find_documents(
        &self,
        collection: &str,
        predicate: &Predicate,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut url = self.endpoint(&[collection])?;
        {
            let mut query = url.query_pairs_mut();

            if !predicate.is_empty() {
                query.append_pair(
                    "where",
                    &JsonConverter::document_to_json(predicate.as_document()).to_string(),
                );
            }
            let page_size = options.limit.map_or(MAX_PAGE_SIZE, |limit| limit.min(MAX_PAGE_SIZE));
            query.append_pair("page-size", &page_size.to_string());
            if let Some(fields) = &options.fields {
                query.append_pair("fields", &json!(fields).to_string());
            }
            query.append_pair("raw", "true");
        }

        let response = self
            .send(self.request(Method::GET, url), &[StatusCode::NOT_FOUND])
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }

        let body = Self::read_json(response).await?;
        let documents = match body {
            Value::Null => BTreeMap::new(),
            Value::Object(map) => map.into_iter().collect::<BTreeMap<_, _>>(),
            _ => return Err(DocumentStoreError::InvalidDocument("Expected a JSON object of documents".into())),
        };

        documents
            .into_iter()
            .map(|(id, value)| -> DocumentStoreResult<Document> {
                Ok(with_id(JsonConverter::to_document(&value)?, &id))
            })
            .collect()
    }

    async fn patch_document(&self, collection: &str, id: &str, changes: Document) -> DocumentStoreResult<()> {
        let request = self
            .request(Method::PATCH, self.endpoint(&[collection, id])?)
            .json(&JsonConverter::document_to_json(&changes));
        let response = self.send(request, &[StatusCode::NOT_FOUND]).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()));
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()> {
        self.send(
            self.request(Method::DELETE, self.endpoint(&[collection, id])?),
            &[StatusCode::NOT_FOUND],
        )
        .await?;

        Ok(())
    }
}


/// [`ClientConnector`] producing [`RestClient`]s.
///
/// Every client built by one connector shares its `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct RestConnector {
    http: reqwest::Client,
}

impl RestConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured HTTP client (timeouts, proxies, TLS settings).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ClientConnector for RestConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> DocumentStoreResult<Arc<dyn DocumentClient>> {
        tracing::debug!(
            base_url = descriptor.base_url(),
            keyspace = descriptor.keyspace(),
            "building REST client"
        );

        Ok(Arc::new(RestClient::new(self.http.clone(), descriptor.clone())))
    }
}
