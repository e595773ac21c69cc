//! Metadata filters for search
//!
//! Filters use the JSON shape shared by every backend:
//!
//! ```json
//! { "category": "manual", "lang": ["en", "de"], "year": { "$gte": 2020, "$ne": 2021 } }
//! ```
//!
//! A plain value means equality, an array means "any of", and an object holds
//! comparison operators. All field conditions must hold.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::document::DocumentMetadata;
use crate::domain::errors::{RagError, RagResult};

/// Comparison operator inside an operator object
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Ne(Value),
}

impl FilterOp {
    /// Operator name on the wire, e.g. `$gte`
    pub const fn key(&self) -> &'static str {
        match self {
            Self::In(_) => "$in",
            Self::NotIn(_) => "$nin",
            Self::Gt(_) => "$gt",
            Self::Gte(_) => "$gte",
            Self::Lt(_) => "$lt",
            Self::Lte(_) => "$lte",
            Self::Ne(_) => "$ne",
        }
    }

    fn parse(key: &str, value: &Value) -> RagResult<Self> {
        let list = |value: &Value| -> RagResult<Vec<Value>> {
            value.as_array().cloned().ok_or_else(|| {
                RagError::Validation(format!("filter operator '{key}' expects an array"))
            })
        };

        match key {
            "$in" => Ok(Self::In(list(value)?)),
            "$nin" => Ok(Self::NotIn(list(value)?)),
            "$gt" => Ok(Self::Gt(value.clone())),
            "$gte" => Ok(Self::Gte(value.clone())),
            "$lt" => Ok(Self::Lt(value.clone())),
            "$lte" => Ok(Self::Lte(value.clone())),
            "$ne" => Ok(Self::Ne(value.clone())),
            other => Err(RagError::Validation(format!(
                "unsupported filter operator '{other}'"
            ))),
        }
    }

    /// Operand as JSON
    pub fn operand(&self) -> Value {
        match self {
            Self::In(values) | Self::NotIn(values) => Value::Array(values.clone()),
            Self::Gt(v) | Self::Gte(v) | Self::Lt(v) | Self::Lte(v) | Self::Ne(v) => v.clone(),
        }
    }

    fn matches(&self, actual: Option<&Value>) -> bool {
        match (self, actual) {
            // Absent fields satisfy the negative operators only
            (Self::Ne(_) | Self::NotIn(_), None) => true,
            (_, None) => false,
            (Self::In(values), Some(actual)) => values.iter().any(|v| value_matches(actual, v)),
            (Self::NotIn(values), Some(actual)) => !values.iter().any(|v| value_matches(actual, v)),
            (Self::Ne(expected), Some(actual)) => !value_matches(actual, expected),
            (Self::Gt(bound), Some(actual)) => compare(actual, bound) == Some(Ordering::Greater),
            (Self::Gte(bound), Some(actual)) => {
                matches!(compare(actual, bound), Some(Ordering::Greater | Ordering::Equal))
            }
            (Self::Lt(bound), Some(actual)) => compare(actual, bound) == Some(Ordering::Less),
            (Self::Lte(bound), Some(actual)) => {
                matches!(compare(actual, bound), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

/// Condition on a single metadata field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    AnyOf(Vec<Value>),
    /// Every operator must hold
    Operators(Vec<FilterOp>),
}

impl Condition {
    fn parse(value: &Value) -> RagResult<Self> {
        match value {
            Value::Array(values) => Ok(Self::AnyOf(values.clone())),
            Value::Object(ops) => {
                if ops.is_empty() {
                    return Err(RagError::Validation(
                        "filter operator object cannot be empty".to_string(),
                    ));
                }
                ops.iter()
                    .map(|(key, operand)| FilterOp::parse(key, operand))
                    .collect::<RagResult<Vec<_>>>()
                    .map(Self::Operators)
            }
            scalar => Ok(Self::Equals(scalar.clone())),
        }
    }

    /// Test a field value (`None` when the field is absent)
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Equals(expected) => actual.is_some_and(|a| value_matches(a, expected)),
            Self::AnyOf(values) => {
                actual.is_some_and(|a| values.iter().any(|v| value_matches(a, v)))
            }
            Self::Operators(ops) => ops.iter().all(|op| op.matches(actual)),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Equals(v) => v.clone(),
            Self::AnyOf(values) => Value::Array(values.clone()),
            Self::Operators(ops) => Value::Object(
                ops.iter()
                    .map(|op| (op.key().to_string(), op.operand()))
                    .collect(),
            ),
        }
    }
}

/// A conjunction of per-field conditions over document metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, Condition>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a filter from its JSON form
    pub fn from_value(value: &Value) -> RagResult<Self> {
        let Value::Object(fields) = value else {
            return Err(RagError::Validation(
                "filter must be a JSON object".to_string(),
            ));
        };

        let conditions = fields
            .iter()
            .map(|(field, condition)| -> RagResult<(String, Condition)> {
                Ok((field.clone(), Condition::parse(condition)?))
            })
            .collect::<RagResult<BTreeMap<_, _>>>()?;

        Ok(Self { conditions })
    }

    /// Parse a filter from JSON text
    pub fn parse(json: &str) -> RagResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| RagError::Validation(format!("invalid filter JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Require `field == value`
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .insert(field.into(), Condition::Equals(value.into()));
        self
    }

    /// Add an operator on `field`, combining with operators already present
    pub fn with_op(mut self, field: impl Into<String>, op: FilterOp) -> Self {
        let field = field.into();
        match self.conditions.get_mut(&field) {
            Some(Condition::Operators(ops)) => ops.push(op),
            _ => {
                self.conditions.insert(field, Condition::Operators(vec![op]));
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether every condition holds for `metadata`
    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(metadata.get(field).as_ref()))
    }

    /// JSON form of the filter
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.conditions
                .iter()
                .map(|(field, condition)| (field.clone(), condition.to_value()))
                .collect::<Map<_, _>>(),
        )
    }
}

impl Serialize for MetadataFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetadataFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Equality that treats numbers by value and matches scalars against array members
fn value_matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(items), expected) if !expected.is_array() => {
            items.iter().any(|item| value_matches(item, expected))
        }
        _ => actual == expected,
    }
}

/// Numbers compare numerically, strings lexicographically, anything else is incomparable
fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> DocumentMetadata {
        let Value::Object(map) = value else { unreachable!() };
        DocumentMetadata::from_map("src", map)
    }

    #[test]
    fn test_equality_and_missing_field() {
        let filter = MetadataFilter::parse(r#"{"category": "manual"}"#).unwrap();
        assert!(filter.matches(&metadata(json!({"category": "manual"}))));
        assert!(!filter.matches(&metadata(json!({"category": "blog"}))));
        assert!(!filter.matches(&metadata(json!({}))));
    }

    #[test]
    fn test_in_operator_equivalent_to_array() {
        let op = MetadataFilter::parse(r#"{"lang": {"$in": ["en", "de"]}}"#).unwrap();
        let array = MetadataFilter::parse(r#"{"lang": ["en", "de"]}"#).unwrap();

        for lang in ["en", "de", "fr"] {
            let m = metadata(json!({ "lang": lang }));
            assert_eq!(op.matches(&m), array.matches(&m), "lang {lang}");
        }
        assert!(array.matches(&metadata(json!({"lang": "de"}))));
    }

    #[test]
    fn test_range_operators() {
        let filter = MetadataFilter::parse(r#"{"year": {"$gte": 2020, "$lt": 2023}}"#).unwrap();
        assert!(filter.matches(&metadata(json!({"year": 2020}))));
        assert!(filter.matches(&metadata(json!({"year": 2022.5}))));
        assert!(!filter.matches(&metadata(json!({"year": 2023}))));
        assert!(!filter.matches(&metadata(json!({"year": "2021"}))));
    }

    #[test]
    fn test_string_comparison_for_dates() {
        let filter = MetadataFilter::new()
            .with_op("date", FilterOp::Gte(json!("2024-01-01")))
            .with_op("date", FilterOp::Lte(json!("2024-12-31")));
        assert!(filter.matches(&metadata(json!({"date": "2024-06-15T08:00:00Z"}))));
        assert!(!filter.matches(&metadata(json!({"date": "2025-01-02T00:00:00Z"}))));
    }

    #[test]
    fn test_negative_operators_pass_on_missing_field() {
        let filter = MetadataFilter::parse(r#"{"status": {"$ne": "archived"}}"#).unwrap();
        assert!(filter.matches(&metadata(json!({}))));
        assert!(!filter.matches(&metadata(json!({"status": "archived"}))));

        let filter = MetadataFilter::parse(r#"{"status": {"$nin": ["a", "b"]}}"#).unwrap();
        assert!(filter.matches(&metadata(json!({}))));
        assert!(filter.matches(&metadata(json!({"status": "c"}))));
        assert!(!filter.matches(&metadata(json!({"status": "b"}))));
    }

    #[test]
    fn test_scalar_matches_array_field() {
        let filter = MetadataFilter::new().equals("to", "bob@example.com");
        assert!(filter.matches(&metadata(json!({"to": ["amy@example.com", "bob@example.com"]}))));
    }

    #[test]
    fn test_well_known_fields_are_filterable() {
        let filter = MetadataFilter::new().equals("sourceId", "src");
        assert!(filter.matches(&DocumentMetadata::new("src")));
        assert!(!filter.matches(&DocumentMetadata::new("other")));
    }

    #[test]
    fn test_unknown_operator_is_validation_error() {
        let err = MetadataFilter::parse(r#"{"x": {"$regex": "a.*"}}"#).unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));

        assert!(MetadataFilter::parse(r#"["not", "an", "object"]"#).is_err());
        assert!(MetadataFilter::parse(r#"{"x": {"$in": "scalar"}}"#).is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_shape() {
        let raw = json!({"category": "manual", "year": {"$gt": 2000}});
        let filter: MetadataFilter = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&filter).unwrap(), raw);
    }
}
