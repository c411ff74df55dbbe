//! Core of the docgate project: the pieces of a REST document-store adapter
//! that do not depend on a particular transport.
//!
//! This crate provides:
//!
//! - **Connection descriptors** ([`descriptor`]) - Parsing and building connection URIs
//! - **Query translation** ([`query`]) - Normalizing filter documents into remote predicates
//! - **Operation execution** ([`executor`]) - The direct-or-callback execution contract
//! - **Client abstraction** ([`client`]) - Traits for remote document-store clients and their connectors
//! - **Documents** ([`document`]) - Identifier assignment and serde helpers
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docgate_core::{descriptor::parse_descriptor, query::{FindOptions, format_query}};
//!
//! let descriptor = parse_descriptor("https://host/ks1?applicationToken=tok1")?;
//! let predicate = format_query(&doc! { "name": "Cart" }, &FindOptions::default())?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod client;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod executor;
pub mod query;
