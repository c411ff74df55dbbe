//! BSON and JSON conversion for the REST wire format.
//!
//! The documents API speaks plain JSON. Identifiers are sent as their hex
//! string, dates as RFC 3339 strings and decimals as numbers; values with no
//! JSON counterpart fall back to their display form.

use bson::{Bson, Document};
use serde_json::{Map, Number, Value};

use docgate_core::error::{DocumentStoreError, DocumentStoreResult};


pub(crate) struct JsonConverter;

impl JsonConverter {
    /// Recursively converts a BSON value into its JSON wire form.
    pub(crate) fn to_json(value: &Bson) -> Value {
        match value {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Boolean(b) => Value::Bool(*b),
            Bson::Int32(n) => Value::from(*n),
            Bson::Int64(n) => Value::from(*n),
            Bson::Double(n) => Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Bson::String(s) => Value::String(s.clone()),
            Bson::ObjectId(oid) => Value::String(oid.to_hex()),
            Bson::DateTime(dt) => dt
                .try_to_rfc3339_string()
                .map(Value::String)
                .unwrap_or_else(|_| Value::from(dt.timestamp_millis())),
            Bson::Array(arr) => Value::Array(
                arr
                    .iter()
                    .map(Self::to_json)
                    .collect(),
            ),
            Bson::Decimal128(d) => d
                .to_string()
                .parse::<Number>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(d.to_string())),
            Bson::Document(doc) => Self::document_to_json(doc),
            other => Value::String(other.to_string()),
        }
    }

    pub(crate) fn document_to_json(document: &Document) -> Value {
        Value::Object(
            document
                .iter()
                .map(|(k, v)| (k.clone(), Self::to_json(v)))
                .collect::<Map<_, _>>(),
        )
    }

    /// Recursively converts a JSON value into BSON.
    ///
    /// Integers become `Int32` when they fit and `Int64` otherwise.
    pub(crate) fn to_bson(value: &Value) -> Bson {
        match value {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => i32::try_from(i)
                    .map(Bson::Int32)
                    .unwrap_or(Bson::Int64(i)),
                None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Bson::String(s.clone()),
            Value::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::to_bson)
                    .collect(),
            ),
            Value::Object(map) => Bson::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::to_bson(v)))
                    .collect(),
            ),
        }
    }

    /// Converts a JSON object into a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `value` is not an object.
    pub(crate) fn to_document(value: &Value) -> DocumentStoreResult<Document> {
        match Self::to_bson(value) {
            Bson::Document(document) => Ok(document),
            _ => Err(DocumentStoreError::InvalidDocument("Expected a JSON object".into())),
        }
    }
}
