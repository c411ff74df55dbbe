//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```
//!
//! This provides access to:
//! - The connection, its builder and options
//! - Collection handles
//! - Client traits and the REST credential types
//! - Query options, URI builders and error types

pub use crate::{
    connection::{Connection, ConnectionBuilder, DocumentConnection, OpenOptions},
    registry::CollectionHandle,
    state::ConnectionState,
};

pub use docgate_core::{
    client::{ClientConnector, CollectionOptions, DocumentClient},
    descriptor::{ConnectionDescriptor, build_production_uri, parse_descriptor},
    document::DocumentExt,
    executor::Callback,
    query::{FindOptions, format_query},
    error::{DocumentStoreError, DocumentStoreResult},
};

pub use docgate_rest::{CredentialResolver, Credentials};
