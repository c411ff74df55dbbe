//! Document identifiers and serde conversion helpers.
//!
//! Documents travel through the connection layer as [`bson::Document`]s. The
//! remote store addresses documents by a string id in the request path, so
//! every inserted document carries an `_id` field that is a string.

use bson::{Bson, Document, de::deserialize_from_document, oid::ObjectId, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identifier field.
pub const ID_FIELD: &str = "_id";

/// Makes sure `document` has a usable identifier and returns it.
///
/// - A missing, `null` or empty-string `_id` is replaced by a fresh
///   [`ObjectId`] hex string.
/// - An [`ObjectId`] `_id` is rewritten to its hex string.
/// - String and integer ids are kept.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if `_id` holds any other type.
pub fn ensure_document_id(document: &mut Document) -> DocumentStoreResult<String> {
    let id = match document.get(ID_FIELD) {
        None | Some(Bson::Null) | Some(Bson::Undefined) => ObjectId::new().to_hex(),
        Some(Bson::String(id)) if id.is_empty() => ObjectId::new().to_hex(),
        Some(Bson::String(id)) => return Ok(id.clone()),
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::Int32(id)) => return Ok(id.to_string()),
        Some(Bson::Int64(id)) => return Ok(id.to_string()),
        Some(other) => {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "unsupported {} type: {:?}",
                ID_FIELD,
                other.element_type()
            )));
        }
    };

    document.insert(ID_FIELD, id.clone());

    Ok(id)
}

/// Reads the identifier of a stored document, if it has one.
pub fn document_id(document: &Document) -> Option<String> {
    match document.get(ID_FIELD)? {
        Bson::String(id) => Some(id.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::Int32(id) => Some(id.to_string()),
        Bson::Int64(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Extension trait converting serde types to and from BSON documents.
///
/// Implemented for every type that is both `Serialize` and `DeserializeOwned`.
pub trait DocumentExt: Sized {
    /// # Errors
    ///
    /// Returns an error if the value does not serialize to a document.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;
}

impl<T> DocumentExt for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_document(&self) -> DocumentStoreResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[test]
    fn missing_id_gets_an_object_id_hex() {
        let mut document = doc! { "name": "Cart" };

        let id = ensure_document_id(&mut document).unwrap();

        assert_eq!(id.len(), 24);
        assert!(ObjectId::parse_str(&id).is_ok());
        assert_eq!(document.get_str(ID_FIELD).unwrap(), id);
    }

    #[test]
    fn null_and_empty_ids_are_replaced() {
        for mut document in [doc! { "_id": Bson::Null }, doc! { "_id": "" }] {
            let id = ensure_document_id(&mut document).unwrap();
            assert!(!id.is_empty());
            assert_eq!(document.get_str(ID_FIELD).unwrap(), id);
        }
    }

    #[test]
    fn existing_ids_are_kept() {
        let mut document = doc! { "_id": "cart-1" };
        assert_eq!(ensure_document_id(&mut document).unwrap(), "cart-1");

        let mut document = doc! { "_id": 42_i64 };
        assert_eq!(ensure_document_id(&mut document).unwrap(), "42");
        assert_eq!(document.get_i64(ID_FIELD).unwrap(), 42);
    }

    #[test]
    fn object_ids_are_normalized_to_hex() {
        let oid = ObjectId::new();
        let mut document = doc! { "_id": oid };

        assert_eq!(ensure_document_id(&mut document).unwrap(), oid.to_hex());
        assert_eq!(document.get_str(ID_FIELD).unwrap(), oid.to_hex());
    }

    #[test]
    fn structured_ids_are_rejected() {
        let mut document = doc! { "_id": { "a": 1 } };

        assert!(matches!(
            ensure_document_id(&mut document),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Product {
        #[serde(rename = "_id")]
        id: String,
        name: String,
        price: i32,
    }

    #[test]
    fn serde_types_convert_through_documents() {
        let product = Product { id: "p1".into(), name: "Product 1".into(), price: 10 };

        let document = product.to_document().unwrap();
        assert_eq!(document, doc! { "_id": "p1", "name": "Product 1", "price": 10 });
        assert_eq!(document_id(&document).as_deref(), Some("p1"));

        assert_eq!(Product::from_document(document).unwrap(), product);
    }
}
