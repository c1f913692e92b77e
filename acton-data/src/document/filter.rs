//! Document filter expressions
//!
//! A [`DocumentFilter`] wraps a filter document in the usual document-store
//! shape: `{"field": value}` for equality, `{"field": {"$gte": value}}` for
//! operators, and `$and` / `$or` / `$nor` for logical combination. Filters are
//! validated when constructed, so stores can render them without re-checking.
//!
//! # Example
//!
//! ```rust
//! use acton_data::document::DocumentFilter;
//! use acton_data::repository::Compose;
//! use serde_json::json;
//!
//! let filter = DocumentFilter::eq("status", "active").compose(DocumentFilter::gte("age", 18));
//! assert!(filter.matches(&json!({"status": "active", "age": 30})));
//! assert!(!filter.matches(&json!({"status": "active", "age": 12})));
//!
//! let parsed = DocumentFilter::from_value(json!({"age": {"$between": [1, 2]}}));
//! assert!(parsed.is_err());
//! ```

use std::fmt;

use serde_json::{Map, Value};

use crate::repository::{Compose, RepositoryError, RepositoryOperation, RepositoryResult};
use crate::value;

const FIELD_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$exists", "$not",
];
const LOGICAL_OPERATORS: &[&str] = &["$and", "$or", "$nor"];

/// Validated filter document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentFilter {
    document: Map<String, Value>,
}

fn invalid(message: impl Into<String>) -> RepositoryError {
    RepositoryError::validation_failed(RepositoryOperation::FilterBy, message)
}

pub(super) fn is_operator_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| !o.is_empty() && o.keys().all(|k| k.starts_with('$')))
}

fn validate_document(document: &Map<String, Value>) -> RepositoryResult<()> {
    for (key, value) in document {
        if key.starts_with('$') {
            if !LOGICAL_OPERATORS.contains(&key.as_str()) {
                return Err(invalid(format!("unknown top-level operator {}", key)));
            }
            let branches = value
                .as_array()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| invalid(format!("{} expects a non-empty array", key)))?;
            for branch in branches {
                let branch = branch
                    .as_object()
                    .ok_or_else(|| invalid(format!("{} branches must be documents", key)))?;
                validate_document(branch)?;
            }
        } else {
            if key.is_empty() {
                return Err(invalid("field names must not be empty"));
            }
            if let Some(object) = value.as_object() {
                let has_ops = object.keys().any(|k| k.starts_with('$'));
                let all_ops = object.keys().all(|k| k.starts_with('$'));
                if has_ops && !all_ops {
                    return Err(invalid(format!(
                        "field {} mixes operators and plain keys",
                        key
                    )));
                }
                if has_ops {
                    validate_operators(key, object)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_operators(field: &str, operators: &Map<String, Value>) -> RepositoryResult<()> {
    for (op, operand) in operators {
        if !FIELD_OPERATORS.contains(&op.as_str()) {
            return Err(invalid(format!("unknown operator {} on {}", op, field)));
        }
        match op.as_str() {
            "$in" | "$nin" if !operand.is_array() => {
                return Err(invalid(format!("{} on {} expects an array", op, field)));
            }
            "$exists" if !operand.is_boolean() => {
                return Err(invalid(format!("$exists on {} expects a boolean", field)));
            }
            "$not" => {
                let inner = operand
                    .as_object()
                    .filter(|_| is_operator_object(operand))
                    .ok_or_else(|| {
                        invalid(format!("$not on {} expects an operator document", field))
                    })?;
                validate_operators(field, inner)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn single(field: impl Into<String>, value: Value) -> DocumentFilter {
    let mut document = Map::new();
    document.insert(field.into(), value);
    DocumentFilter { document }
}

fn operator(field: impl Into<String>, op: &str, operand: Value) -> DocumentFilter {
    let mut inner = Map::new();
    inner.insert(op.to_string(), operand);
    single(field, Value::Object(inner))
}

impl DocumentFilter {
    /// Filter matching every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Validate and wrap a filter document
    pub fn from_value(value: Value) -> RepositoryResult<Self> {
        match value {
            Value::Object(document) => {
                validate_document(&document)?;
                Ok(Self { document })
            }
            _ => Err(invalid("filter must be a document")),
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        single(field, value.into())
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        operator(field, "$ne", value.into())
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        operator(field, "$gt", value.into())
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        operator(field, "$gte", value.into())
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        operator(field, "$lt", value.into())
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        operator(field, "$lte", value.into())
    }

    /// `field` is one of `values`
    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        operator(
            field,
            "$in",
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// `field` is none of `values`
    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        operator(
            field,
            "$nin",
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// `field` is present (or absent)
    pub fn exists(field: impl Into<String>, present: bool) -> Self {
        operator(field, "$exists", Value::Bool(present))
    }

    /// At least one filter matches
    pub fn any_of<I: IntoIterator<Item = DocumentFilter>>(filters: I) -> Self {
        Self::logical("$or", filters)
    }

    /// No filter matches
    pub fn none_of<I: IntoIterator<Item = DocumentFilter>>(filters: I) -> Self {
        Self::logical("$nor", filters)
    }

    fn logical<I: IntoIterator<Item = DocumentFilter>>(op: &str, filters: I) -> Self {
        let branches: Vec<Value> = filters
            .into_iter()
            .map(|f| Value::Object(f.document))
            .collect();
        if branches.is_empty() {
            return Self::all();
        }
        single(op, Value::Array(branches))
    }

    /// Whether the filter matches everything
    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// The underlying filter document
    pub fn as_document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Canonical JSON rendering with sorted keys, used as the cache-key description
    pub fn describe(&self) -> String {
        let mut out = String::new();
        write_canonical_object(&self.document, &mut out);
        out
    }

    /// Evaluate against a serialized document
    pub fn matches(&self, document: &Value) -> bool {
        document_matches(&self.document, document)
    }
}

impl fmt::Display for DocumentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl TryFrom<Value> for DocumentFilter {
    type Error = RepositoryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl Compose for DocumentFilter {
    fn compose(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let mut branches = Vec::new();
        for filter in [self, other] {
            match sole_and(&filter.document) {
                Some(existing) => branches.extend(existing.iter().cloned()),
                None => branches.push(Value::Object(filter.document)),
            }
        }
        single("$and", Value::Array(branches))
    }
}

fn write_canonical_object(object: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(&object[key.as_str()], out);
    }
    out.push('}');
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(object) => write_canonical_object(object, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn sole_and(document: &Map<String, Value>) -> Option<&Vec<Value>> {
    if document.len() != 1 {
        return None;
    }
    document.get("$and").and_then(Value::as_array)
}

fn document_matches(filter: &Map<String, Value>, document: &Value) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => branches(condition).all(|b| document_matches(b, document)),
        "$or" => branches(condition).any(|b| document_matches(b, document)),
        "$nor" => !branches(condition).any(|b| document_matches(b, document)),
        field => {
            let actual = value::lookup(document, field);
            match condition.as_object() {
                Some(ops) if is_operator_object(condition) => operators_match(ops, actual),
                _ => literal_matches(actual, condition),
            }
        }
    })
}

fn branches(condition: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    condition
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn literal_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| value::equals(item, expected))
        }
        Some(actual) => value::equals(actual, expected),
    }
}

fn operators_match(operators: &Map<String, Value>, actual: Option<&Value>) -> bool {
    operators.iter().all(|(op, operand)| match op.as_str() {
        "$eq" => literal_matches(actual, operand),
        "$ne" => !literal_matches(actual, operand),
        "$gt" => ordering(actual, operand).is_some_and(|o| o.is_gt()),
        "$gte" => ordering(actual, operand).is_some_and(|o| o.is_ge()),
        "$lt" => ordering(actual, operand).is_some_and(|o| o.is_lt()),
        "$lte" => ordering(actual, operand).is_some_and(|o| o.is_le()),
        "$in" => in_list(actual, operand),
        "$nin" => !in_list(actual, operand),
        "$exists" => actual.is_some() == operand.as_bool().unwrap_or(true),
        "$not" => !operand
            .as_object()
            .is_some_and(|inner| operators_match(inner, actual)),
        _ => false,
    })
}

fn ordering(actual: Option<&Value>, operand: &Value) -> Option<std::cmp::Ordering> {
    value::compare(actual?, operand)
}

fn in_list(actual: Option<&Value>, operand: &Value) -> bool {
    operand
        .as_array()
        .is_some_and(|candidates| candidates.iter().any(|c| literal_matches(actual, c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "id": "a1",
            "title": "Rust",
            "pages": 300,
            "tags": ["systems", "async"],
            "is_deleted": false,
            "author": {"name": "Ferris"},
            "subtitle": null
        })
    }

    #[test]
    fn test_all_matches_everything() {
        assert!(DocumentFilter::all().is_empty());
        assert!(DocumentFilter::all().matches(&doc()));
        assert_eq!(DocumentFilter::all().describe(), "{}");
    }

    #[test]
    fn test_equality_and_nested_fields() {
        assert!(DocumentFilter::eq("title", "Rust").matches(&doc()));
        assert!(DocumentFilter::eq("author.name", "Ferris").matches(&doc()));
        assert!(DocumentFilter::eq("is_deleted", false).matches(&doc()));
        assert!(!DocumentFilter::eq("title", "Go").matches(&doc()));
        assert!(DocumentFilter::eq("tags", "async").matches(&doc()));
        assert!(DocumentFilter::eq("missing", Value::Null).matches(&doc()));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(DocumentFilter::gt("pages", 299).matches(&doc()));
        assert!(DocumentFilter::gte("pages", 300).matches(&doc()));
        assert!(!DocumentFilter::lt("pages", 300).matches(&doc()));
        assert!(DocumentFilter::lte("pages", 300).matches(&doc()));
        assert!(DocumentFilter::ne("title", "Go").matches(&doc()));
        assert!(!DocumentFilter::gt("missing", 1).matches(&doc()));
    }

    #[test]
    fn test_set_operators() {
        assert!(DocumentFilter::is_in("title", ["Go", "Rust"]).matches(&doc()));
        assert!(!DocumentFilter::not_in("title", ["Rust"]).matches(&doc()));
        assert!(DocumentFilter::exists("subtitle", true).matches(&doc()));
        assert!(DocumentFilter::exists("missing", false).matches(&doc()));
    }

    #[test]
    fn test_logical_operators() {
        let any = DocumentFilter::any_of([DocumentFilter::eq("title", "Go"), DocumentFilter::eq("pages", 300)]);
        assert!(any.matches(&doc()));
        let none = DocumentFilter::none_of([DocumentFilter::eq("title", "Rust")]);
        assert!(!none.matches(&doc()));
        let not = DocumentFilter::from_value(json!({"pages": {"$not": {"$gt": 500}}})).unwrap();
        assert!(not.matches(&doc()));
    }

    #[test]
    fn test_compose_flattens_and() {
        let composed = DocumentFilter::compose_all([
            DocumentFilter::eq("a", 1),
            DocumentFilter::eq("b", 2),
            DocumentFilter::eq("c", 3),
        ])
        .unwrap();
        let branches = composed.as_document()["$and"].as_array().unwrap();
        assert_eq!(branches.len(), 3);
        assert!(composed.matches(&json!({"a": 1, "b": 2, "c": 3})));
        assert!(!composed.matches(&json!({"a": 1, "b": 2, "c": 4})));
    }

    #[test]
    fn test_compose_with_all_is_identity() {
        let filter = DocumentFilter::eq("a", 1);
        assert_eq!(filter.clone().compose(DocumentFilter::all()), filter);
        assert_eq!(DocumentFilter::all().compose(filter.clone()), filter);
    }

    #[test]
    fn test_describe_is_canonical() {
        let left = DocumentFilter::from_value(json!({"b": 2, "a": 1})).unwrap();
        let right = DocumentFilter::from_value(json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(left.describe(), right.describe());
        assert_eq!(left.describe(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_validation_rejects_malformed_filters() {
        assert!(DocumentFilter::from_value(json!([1, 2])).is_err());
        assert!(DocumentFilter::from_value(json!({"$where": "1"})).is_err());
        assert!(DocumentFilter::from_value(json!({"$or": []})).is_err());
        assert!(DocumentFilter::from_value(json!({"$and": [1]})).is_err());
        assert!(DocumentFilter::from_value(json!({"a": {"$in": 1}})).is_err());
        assert!(DocumentFilter::from_value(json!({"a": {"$exists": "yes"}})).is_err());
        assert!(DocumentFilter::from_value(json!({"a": {"$gt": 1, "b": 2}})).is_err());
        assert!(DocumentFilter::from_value(json!({"a": {"$not": 3}})).is_err());
        assert!(DocumentFilter::from_value(json!({"": 1})).is_err());

        let error = DocumentFilter::from_value(json!("nope")).unwrap_err();
        assert_eq!(
            error.kind,
            crate::repository::RepositoryErrorKind::ValidationFailed
        );
    }

    #[test]
    fn test_validation_accepts_embedded_documents() {
        let filter = DocumentFilter::from_value(json!({"author": {"name": "Ferris"}})).unwrap();
        assert!(filter.matches(&doc()));
    }
}
