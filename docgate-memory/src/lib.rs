//! In-memory document client for docgate.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `DocumentClient` trait. It uses async-aware read-write locks for concurrent
//! access and is meant for development and testing, where a remote document
//! store is not available.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Predicate evaluation** - `$eq`, `$ne`, range, `$in`/`$nin` and `$exists` operators
//! - **Shared data** - Clones and connectors share the same collections
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{Connection, memory::InMemoryClient};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = InMemoryClient::new();
//!     let connection = Connection::builder()
//!         .connector(client.connector())
//!         .build();
//!
//!     connection.open("https://localhost/ks1?applicationToken=dev", Default::default()).await?;
//!     connection.collection("carts").insert_one(doc! { "name": "My Cart" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

pub mod client;
mod evaluator;

pub use client::{InMemoryClient, InMemoryConnector};
