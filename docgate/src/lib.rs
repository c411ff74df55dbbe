//! Main docgate crate: a stateful connection layer over a stateless,
//! REST-based document store.
//!
//! This crate is the primary entry point of the docgate workspace. It provides
//! the [`Connection`] state machine and collection handles, and re-exports the
//! core types and the bundled clients.
//!
//! # Features
//!
//! - **Connection lifecycle** - Operations issued while connecting are deferred until the client is attached
//! - **Token resolution** - Application tokens from the URI, or exchanged from credentials
//! - **Query translation** - Scalar filters are normalized into `$eq` predicates
//! - **Dual calling convention** - Every operation returns a `Result`; `_with` variants take a callback
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::prelude::*;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let uri = build_production_uri("db-id", "us-east1", Some("ks1"), Some("AstraCS:token"), Some("info"))?;
//!
//!     let connection = Connection::builder().build();
//!     connection.open(&uri, OpenOptions::default()).await?;
//!
//!     let carts = connection.collection("carts");
//!     let id = carts.insert_one(doc! { "name": "My Cart", "total": 25 }).await?;
//!
//!     let found = carts
//!         .find(doc! { "name": "My Cart" }, FindOptions::default())
//!         .await?;
//!     println!("{} cart(s), first id {}", found.len(), id);
//!
//!     connection.close().await
//! }
//! ```
//!
//! # Self-hosted Stargate
//!
//! ```ignore
//! use docgate::prelude::*;
//!
//! let uri = CredentialResolver::new()
//!     .build_stargate_uri(
//!         "http://localhost:8082",
//!         "http://localhost:8081/v1/auth",
//!         "ks1",
//!         "cassandra",
//!         "cassandra",
//!         Some("debug"),
//!     )
//!     .await?;
//!
//! Connection::builder().build().open(&uri, OpenOptions::default()).await?;
//! ```
//!
//! # Clients
//!
//! - [`rest`] - The documents REST API over HTTP (default)
//! - [`memory`] - In-memory store for development and testing

pub mod connection;
pub mod logging;
pub mod prelude;
pub mod registry;
pub mod state;

pub use docgate_core::{client, descriptor, document, error, executor, query};

pub use connection::{Connection, ConnectionBuilder, DocumentConnection, OpenOptions};
pub use registry::{CollectionHandle, CollectionRegistry};
pub use state::ConnectionState;

// Re-export BSON types for convenience
pub use bson;

/// In-memory client implementation.
pub mod memory {
    pub use docgate_memory::{InMemoryClient, InMemoryConnector};
}

/// REST client implementation and credential exchange.
pub mod rest {
    pub use docgate_rest::{CredentialResolver, Credentials, MAX_PAGE_SIZE, RestClient, RestConnector, TOKEN_HEADER};
}
