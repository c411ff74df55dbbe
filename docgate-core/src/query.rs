//! Query translation from in-process filter documents to remote predicates.
//!
//! Callers express filters the way they would against an embedded document
//! database: a document mapping field names to either bare values or operator
//! documents. The remote store only understands explicit operators, so
//! [`format_query`] rewrites every bare scalar into an equality predicate:
//!
//! ```ignore
//! use bson::doc;
//! use docgate_core::query::{FindOptions, format_query};
//!
//! let predicate = format_query(&doc! { "name": "Cart" }, &FindOptions::default())?;
//!
//! assert_eq!(predicate.as_document(), &doc! { "name": { "$eq": "Cart" } });
//! ```
//!
//! Operator documents, nested documents and arrays pass through untouched, and
//! `null` values are kept as they are.

use bson::{Bson, Document};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// The operator used for explicit equality predicates.
pub const EQUALS: &str = "$eq";

/// The kind of a filter value, decided by its BSON variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `null` or undefined.
    Absent,
    Text,
    /// Any integer, floating point or decimal value.
    Number,
    Boolean,
    /// A generated document identifier.
    Identifier,
    /// Operator documents, nested documents, arrays and every other BSON type.
    Other,
}

impl ValueKind {
    pub fn of(value: &Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => ValueKind::Absent,
            Bson::String(_) => ValueKind::Text,
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => ValueKind::Number,
            Bson::Boolean(_) => ValueKind::Boolean,
            Bson::ObjectId(_) => ValueKind::Identifier,
            _ => ValueKind::Other,
        }
    }

    /// Whether values of this kind are rewritten into equality predicates.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueKind::Text | ValueKind::Number | ValueKind::Boolean | ValueKind::Identifier
        )
    }
}

/// A filter in the shape the remote store expects.
///
/// Every field maps to an operator document, a pass-through structure, or
/// `null`. Field order follows the input query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate(Document);

impl Predicate {
    /// A predicate that matches every document.
    pub fn all() -> Self {
        Predicate(Document::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bson)> {
        self.0.iter()
    }
}

/// Options accepted by query-bearing operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Collation settings. The remote store has no collation support, so any
    /// value here makes the query fail.
    pub collation: Option<Document>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Fields to project. `None` returns whole documents.
    pub fields: Option<Vec<String>>,
}

impl FindOptions {
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    pub fn collation(mut self, collation: Document) -> Self {
        self.options.collation = Some(collation);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Normalizes a filter document into a [`Predicate`].
///
/// # Errors
///
/// Returns [`DocumentStoreError::UnsupportedCapability`] whenever
/// `options.collation` is set, whatever the query contains.
pub fn format_query(query: &Document, options: &FindOptions) -> DocumentStoreResult<Predicate> {
    if options.collation.is_some() {
        return Err(DocumentStoreError::UnsupportedCapability(
            "Collations are not supported".to_string(),
        ));
    }

    Ok(Predicate(
        query
            .iter()
            .map(|(field, value)| (field.clone(), normalize(value)))
            .collect(),
    ))
}

fn normalize(value: &Bson) -> Bson {
    if ValueKind::of(value).is_scalar() {
        Bson::Document(Document::from_iter([(EQUALS.to_string(), value.clone())]))
    } else {
        value.clone()
    }
}
