//! Predicate evaluation for in-memory document filtering.
//!
//! This module evaluates [`Predicate`]s produced by
//! [`format_query`](docgate_core::query::format_query) against stored
//! documents, following the operator semantics of the remote store.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docgate_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::Predicate,
};


/// Comparable representation of BSON values.
///
/// Numeric types are normalized to f64. Identifiers compare equal to their
/// hex string so filters built from generated ids match stored string ids.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Identifier(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::Identifier(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Identifier(a), Comparable::Identifier(b)) => a == b,
            (Comparable::Identifier(oid), Comparable::String(s))
            | (Comparable::String(s), Comparable::Identifier(oid)) => oid.to_hex() == *s,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


pub(crate) struct PredicateEvaluator<'a> {
    document: &'a Document,
}

impl<'a> PredicateEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether every field condition of `predicate` holds.
    pub fn matches(&self, predicate: &Predicate) -> DocumentStoreResult<bool> {
        for (field, condition) in predicate.iter() {
            if !matches_condition(self.lookup(field), condition)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        predicate: &Predicate,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if PredicateEvaluator::new(document).matches(predicate)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    /// Resolves a dotted field path. Numeric segments index into arrays.
    fn lookup(&self, path: &str) -> Option<&'a Bson> {
        let mut segments = path.split('.');
        let mut current = self.document.get(segments.next()?)?;

        for segment in segments {
            current = match current {
                Bson::Document(doc) => doc.get(segment)?,
                Bson::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> DocumentStoreResult<bool> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (operator, operand) in operators {
                if !apply_operator(operator, value, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        other => Ok(equals(value, other)),
    }
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn apply_operator(operator: &str, value: Option<&Bson>, operand: &Bson) -> DocumentStoreResult<bool> {
    match operator {
        "$eq" => Ok(equals(value, operand)),
        "$ne" => Ok(!equals(value, operand)),
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let ordering = value.and_then(|value| Comparable::from(value).partial_cmp(&Comparable::from(operand)));

            Ok(match (operator, ordering) {
                (_, None) => false,
                ("$gt", Some(ordering)) => ordering == Ordering::Greater,
                ("$gte", Some(ordering)) => ordering != Ordering::Less,
                ("$lt", Some(ordering)) => ordering == Ordering::Less,
                (_, Some(ordering)) => ordering != Ordering::Greater,
            })
        }
        "$in" | "$nin" => {
            let candidates = operand.as_array().ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!("{} requires an array operand", operator))
            })?;
            let found = candidates.iter().any(|candidate| equals(value, candidate));

            Ok(if operator == "$in" { found } else { !found })
        }
        "$exists" => {
            let should_exist = operand.as_bool().ok_or_else(|| {
                DocumentStoreError::InvalidDocument("$exists requires a boolean operand".to_string())
            })?;

            Ok(value.is_some() == should_exist)
        }
        other => Err(DocumentStoreError::UnsupportedCapability(format!(
            "Operator {} is not supported",
            other
        ))),
    }
}

/// Equality with null-matches-missing and array-element semantics.
fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    let Some(value) = value else {
        return matches!(operand, Bson::Null | Bson::Undefined);
    };

    let expected = Comparable::from(operand);

    match Comparable::from(value) {
        Comparable::Array(items) if !matches!(expected, Comparable::Array(_)) => {
            items.iter().any(|item| item == &expected)
        }
        actual => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docgate_core::query::{FindOptions, format_query};
    use rstest::rstest;

    fn cart() -> Document {
        doc! {
            "_id": "c1",
            "name": "My Cart",
            "total": 25,
            "tags": ["gift", "express"],
            "owner": { "name": "Ada", "age": 36 },
            "coupon": Bson::Null,
        }
    }

    fn eval(query: Document) -> DocumentStoreResult<bool> {
        let predicate = format_query(&query, &FindOptions::default())?;
        PredicateEvaluator::new(&cart()).matches(&predicate)
    }

    #[rstest]
    #[case(doc! { "name": "My Cart" }, true)]
    #[case(doc! { "name": "Other" }, false)]
    #[case(doc! { "total": 25.0 }, true)]
    #[case(doc! { "total": { "$gt": 20, "$lte": 25 } }, true)]
    #[case(doc! { "total": { "$lt": 25 } }, false)]
    #[case(doc! { "total": { "$ne": 3 } }, true)]
    #[case(doc! { "tags": "gift" }, true)]
    #[case(doc! { "tags": { "$in": ["sale", "express"] } }, true)]
    #[case(doc! { "tags": { "$nin": ["gift"] } }, false)]
    #[case(doc! { "owner.name": "Ada" }, true)]
    #[case(doc! { "owner": { "name": "Ada", "age": 36 } }, true)]
    #[case(doc! { "tags.1": "express" }, true)]
    #[case(doc! { "coupon": Bson::Null }, true)]
    #[case(doc! { "missing": Bson::Null }, true)]
    #[case(doc! { "missing": { "$exists": false } }, true)]
    #[case(doc! { "name": { "$exists": false } }, false)]
    #[case(doc! {}, true)]
    fn evaluates_predicates(#[case] query: Document, #[case] expected: bool) {
        assert_eq!(eval(query).unwrap(), expected);
    }

    #[test]
    fn identifiers_match_hex_strings() {
        let oid = ObjectId::new();
        let document = doc! { "_id": oid.to_hex() };
        let predicate = format_query(&doc! { "_id": oid }, &FindOptions::default()).unwrap();

        assert!(PredicateEvaluator::new(&document).matches(&predicate).unwrap());
    }

    #[test]
    fn unknown_operators_are_unsupported() {
        let err = eval(doc! { "name": { "$regex": "^My" } }).unwrap_err();

        assert!(matches!(err, DocumentStoreError::UnsupportedCapability(_)));
    }

    #[test]
    fn malformed_operands_are_rejected() {
        assert!(matches!(
            eval(doc! { "tags": { "$in": "gift" } }),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            eval(doc! { "name": { "$exists": 1 } }),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }
}
