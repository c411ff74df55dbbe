//! REST client implementation for docgate.
//!
//! This crate talks to a Stargate/Astra style documents REST API, and
//! implements the `DocumentClient` and `ClientConnector` traits on top of
//! `reqwest`. It also resolves bearer tokens by exchanging credentials with an
//! auth endpoint.
//!
//! The `docgate` facade uses [`RestConnector`] unless a connection is built
//! with another connector.
//!
//! # Features
//!
//! - **Stateless HTTP** - Every call is one request scoped to a keyspace
//! - **Token exchange** - `POST {username, password}` to obtain `authToken`
//! - **Stargate URIs** - Builds connection URIs for self-hosted deployments
//!
//! # Example
//!
//! ```ignore
//! use docgate_rest::{CredentialResolver, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let uri = CredentialResolver::new()
//!         .build_stargate_uri(
//!             "http://localhost:8082",
//!             "http://localhost:8081/v1/auth",
//!             "ks1",
//!             "cassandra",
//!             "cassandra",
//!             None,
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_rest;

pub mod auth;
pub mod client;
mod json;

pub use auth::{CredentialResolver, Credentials};
pub use client::{MAX_PAGE_SIZE, RestClient, RestConnector, TOKEN_HEADER};
