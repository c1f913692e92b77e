//! Relational predicates
//!
//! A [`Predicate`] is a boolean tree over [`FilterCondition`]s. Relational
//! stores render it to their own query language; the in-memory store evaluates
//! it against the serialized entity. Its `Display` form is normalized and
//! stable, and doubles as the predicate description used for cache keys.
//!
//! # Example
//!
//! ```rust
//! use acton_data::repository::{Compose, FilterCondition, Predicate};
//!
//! let active = Predicate::from(FilterCondition::eq("status", "active"));
//! let adult = Predicate::from(FilterCondition::gte("age", 18));
//!
//! let both = Predicate::compose_all([active, adult]).unwrap();
//! assert_eq!(both.to_string(), "(status = \"active\" AND age >= 18)");
//! ```

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::traits::Compose;
use crate::value;

/// Comparison operators for filter conditions
///
/// # Example
///
/// ```rust
/// use acton_data::repository::FilterOperator;
///
/// assert_eq!(format!("{}", FilterOperator::Equal), "=");
/// assert_eq!(format!("{}", FilterOperator::Like), "LIKE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Pattern matching (LIKE) with `%` and `_`
    Like,
    /// Value is in a list (IN)
    In,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::In => write!(f, "IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// A value that can be used in filter conditions
///
/// # Example
///
/// ```rust
/// use acton_data::repository::FilterValue;
///
/// let string_val: FilterValue = "active".into();
/// let int_val: FilterValue = 42_i64.into();
/// let bool_val: FilterValue = true.into();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Point in time
    Timestamp(DateTime<Utc>),
    /// UUID value
    Uuid(uuid::Uuid),
    /// List of string values (for IN operator)
    StringList(Vec<String>),
    /// List of integer values (for IN operator)
    IntegerList(Vec<i64>),
    /// Null value (for IS NULL / IS NOT NULL)
    Null,
}

impl FilterValue {
    /// The value as it appears in a serialized entity
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Float(n) => Value::from(*n),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Uuid(id) => Value::String(id.to_string()),
            Self::StringList(list) => Value::from(list.clone()),
            Self::IntegerList(list) => Value::from(list.clone()),
            Self::Null => Value::Null,
        }
    }

    fn list_items(&self) -> Vec<Value> {
        match self {
            Self::StringList(list) => list.iter().cloned().map(Value::String).collect(),
            Self::IntegerList(list) => list.iter().copied().map(Value::from).collect(),
            other => vec![other.to_json()],
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => write!(f, "\"{}\"", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Uuid(id) => write!(f, "\"{}\"", id),
            Self::StringList(list) => {
                let items: Vec<String> = list.iter().map(|s| format!("{:?}", s)).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::IntegerList(list) => {
                let items: Vec<String> = list.iter().map(i64::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Null => write!(f, "NULL"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<u32> for FilterValue {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<uuid::Uuid> for FilterValue {
    fn from(id: uuid::Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(list: Vec<String>) -> Self {
        Self::StringList(list)
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(list: Vec<i64>) -> Self {
        Self::IntegerList(list)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A single field comparison
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The field name to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// Create a not-equal filter (field != value)
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value.into())
    }

    /// Create a greater-than filter (field > value)
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value.into())
    }

    /// Create a greater-than-or-equal filter (field >= value)
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// Create a less-than filter (field < value)
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, value.into())
    }

    /// Create a less-than-or-equal filter (field <= value)
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// Create a LIKE pattern filter
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Like, FilterValue::String(pattern.into()))
    }

    /// Create an IN list filter for strings
    pub fn in_strings(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::StringList(values))
    }

    /// Create an IN list filter for integers
    pub fn in_integers(field: impl Into<String>, values: Vec<i64>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::IntegerList(values))
    }

    /// Create an IS NULL filter
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::Null)
    }

    /// Create an IS NOT NULL filter
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
    }

    /// Evaluate the condition against a serialized record
    pub fn matches(&self, record: &Value) -> bool {
        let actual = value::lookup(record, &self.field).filter(|v| !v.is_null());
        match self.operator {
            FilterOperator::IsNull => actual.is_none(),
            FilterOperator::IsNotNull => actual.is_some(),
            FilterOperator::Equal => match (actual, &self.value) {
                (None, FilterValue::Null) => true,
                (Some(actual), expected) => value::equals(actual, &expected.to_json()),
                (None, _) => false,
            },
            FilterOperator::NotEqual => match (actual, &self.value) {
                (None, FilterValue::Null) => false,
                (Some(actual), expected) => !value::equals(actual, &expected.to_json()),
                (None, _) => true,
            },
            FilterOperator::GreaterThan => self.ordering(actual).is_some_and(|o| o.is_gt()),
            FilterOperator::GreaterThanOrEqual => self.ordering(actual).is_some_and(|o| o.is_ge()),
            FilterOperator::LessThan => self.ordering(actual).is_some_and(|o| o.is_lt()),
            FilterOperator::LessThanOrEqual => self.ordering(actual).is_some_and(|o| o.is_le()),
            FilterOperator::Like => match (actual.and_then(Value::as_str), &self.value) {
                (Some(text), FilterValue::String(pattern)) => value::like(text, pattern),
                _ => false,
            },
            FilterOperator::In => actual.is_some_and(|actual| {
                self.value
                    .list_items()
                    .iter()
                    .any(|candidate| value::equals(actual, candidate))
            }),
        }
    }

    fn ordering(&self, actual: Option<&Value>) -> Option<std::cmp::Ordering> {
        value::compare(actual?, &self.value.to_json())
    }
}

impl fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => {
                write!(f, "{} {}", self.field, self.operator)
            }
            _ => write!(f, "{} {} {}", self.field, self.operator, self.value),
        }
    }
}

/// Boolean tree of filter conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A single comparison
    Condition(FilterCondition),
    /// All children must match; an empty list matches everything
    And(Vec<Predicate>),
    /// At least one child must match; an empty list matches nothing
    Or(Vec<Predicate>),
    /// The child must not match
    Not(Box<Predicate>),
}

impl Predicate {
    /// Equality shorthand
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Condition(FilterCondition::eq(field, value))
    }

    /// Combine with another predicate, both must match
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        self.compose(other)
    }

    /// Combine with another predicate, either may match
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negate
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate against a serialized record
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Self::Condition(condition) => condition.matches(record),
            Self::And(children) => children.iter().all(|c| c.matches(record)),
            Self::Or(children) => children.iter().any(|c| c.matches(record)),
            Self::Not(child) => !child.matches(record),
        }
    }

    /// Every condition in the tree, depth-first
    pub fn conditions(&self) -> Vec<&FilterCondition> {
        match self {
            Self::Condition(condition) => vec![condition],
            Self::And(children) | Self::Or(children) => {
                children.iter().flat_map(Predicate::conditions).collect()
            }
            Self::Not(child) => child.conditions(),
        }
    }
}

impl From<FilterCondition> for Predicate {
    fn from(condition: FilterCondition) -> Self {
        Self::Condition(condition)
    }
}

impl Compose for Predicate {
    fn compose(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), right) => {
                left.push(right);
                Self::And(left)
            }
            (left, Self::And(mut right)) => {
                right.insert(0, left);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], op: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(condition) => write!(f, "{}", condition),
            Self::And(children) if children.is_empty() => write!(f, "TRUE"),
            Self::Or(children) if children.is_empty() => write!(f, "FALSE"),
            Self::And(children) => write_joined(f, children, "AND"),
            Self::Or(children) => write_joined(f, children, "OR"),
            Self::Not(child) => write!(f, "NOT ({})", child),
        }
    }
}
