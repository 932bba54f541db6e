//! Typed attribute container.
//!
//! Job items arrive with a loosely typed JSON attribute bag. Everything past
//! consolidation works on [`Attributes`], a string-keyed map of
//! [`AttributeValue`]s with typed accessors.

use std::collections::btree_map;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::job::{FieldType, JobFieldSpec, ID_ATTRIBUTE};

/// A single attribute value.
///
/// Lists hold scalars only; nested JSON arrays are flattened on conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Convert a JSON value. Returns `None` for `null`.
    ///
    /// JSON objects have no attribute representation and are kept as their
    /// serialized text.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Boolean(b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            }),
            Value::String(s) => Some(Self::Text(s)),
            Value::Array(items) => {
                let mut flat = Vec::with_capacity(items.len());
                for item in items {
                    match Self::from_json(item) {
                        Some(Self::List(nested)) => flat.extend(nested),
                        Some(value) => flat.push(value),
                        None => {}
                    }
                }
                Some(Self::List(flat))
            }
            Value::Object(map) => Some(Self::Text(Value::Object(map).to_string())),
        }
    }

    /// Convert back to JSON. Dates are rendered as RFC 3339 strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Date(d) => Value::String(d.to_rfc3339()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Read the value as a timestamp.
    ///
    /// Accepts native dates, RFC 3339 text, plain `YYYY-MM-DD` text and epoch
    /// milliseconds.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => parse_date(s),
            Self::Integer(ms) => DateTime::from_timestamp_millis(*ms),
            _ => None,
        }
    }

    /// Render the value as plain text. Lists are joined with `", "`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Date(d) => d.to_rfc3339(),
            Self::List(items) => items
                .iter()
                .map(Self::to_text)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Read the value as a document identity: a non-empty scalar, or a list
    /// holding exactly one such scalar.
    pub fn as_identity(&self) -> Option<String> {
        match self {
            Self::List(items) => match items.as_slice() {
                [single] => single.as_identity(),
                _ => None,
            },
            other => Some(other.to_text()).filter(|text| !text.is_empty()),
        }
    }

    /// Read the value as a list of strings; a scalar becomes a one-element list.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().map(Self::to_text).collect(),
            other => vec![other.to_text()],
        }
    }

    /// True if the value, or any element of a list value, renders as `needle`.
    pub fn contains_text(&self, needle: &str) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item.to_text() == needle),
            other => other.to_text() == needle,
        }
    }

    /// Remove repeated elements from a list value. Scalars are left as they are.
    pub fn dedupe(&mut self) {
        if let Self::List(items) = self {
            let mut unique: Vec<AttributeValue> = Vec::with_capacity(items.len());
            for item in items.drain(..) {
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            *items = unique;
        }
    }

    /// Coerce the value (or every element of a list) to `field_type`.
    ///
    /// A value that cannot be represented in the target type is returned
    /// unchanged.
    pub fn coerce(self, field_type: FieldType) -> Self {
        match self {
            Self::List(items) => Self::List(
                items
                    .into_iter()
                    .map(|item| item.coerce(field_type))
                    .collect(),
            ),
            scalar => scalar.coerce_scalar(field_type),
        }
    }

    fn coerce_scalar(self, field_type: FieldType) -> Self {
        let converted = match field_type {
            FieldType::Int | FieldType::Long => self.as_i64().map(Self::Integer),
            FieldType::Float | FieldType::Double => self.as_f64().map(Self::Float),
            FieldType::Bool => self.as_bool().map(Self::Boolean),
            FieldType::Date => self.as_date().map(Self::Date),
            FieldType::String | FieldType::Text => Some(Self::Text(self.to_text())),
            FieldType::Unknown => None,
        };
        converted.unwrap_or(self)
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// String-keyed attribute map, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw JSON object, dropping `null` values.
    pub fn from_json_map(map: Map<String, Value>) -> Self {
        map.into_iter()
            .filter_map(|(key, value)| AttributeValue::from_json(value).map(|v| (key, v)))
            .collect()
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect()
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder form of [`Attributes::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, AttributeValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    /// Read any value as text; empty strings count as absent.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(AttributeValue::to_text)
            .filter(|text| !text.is_empty())
    }

    /// The document identity held in the `id` attribute.
    ///
    /// See [`AttributeValue::as_identity`].
    pub fn document_id(&self) -> Option<String> {
        self.get(ID_ATTRIBUTE).and_then(AttributeValue::as_identity)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AttributeValue::as_i64)
    }

    pub fn get_date(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).and_then(AttributeValue::as_date)
    }

    /// Read a value as a list of strings; absent keys yield an empty list.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(AttributeValue::to_string_list)
            .unwrap_or_default()
    }

    /// Merge `other` into `self`. Keys present in both take `other`'s value;
    /// keys only in `self` are kept.
    pub fn merge(&mut self, other: Attributes) {
        self.values.extend(other.values);
    }

    /// Copy of the attributes whose key satisfies `keep`.
    pub fn select(&self, mut keep: impl FnMut(&str) -> bool) -> Attributes {
        self.values
            .iter()
            .filter(|(key, _)| keep(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Replace every list value with its distinct elements.
    pub fn dedupe_lists(&mut self) {
        for value in self.values.values_mut() {
            value.dedupe();
        }
    }

    /// Coerce values to the types declared by `specs`.
    ///
    /// Attributes without a spec are left untouched. `multiValued` specs wrap
    /// scalar values in a one-element list.
    pub fn conform(&mut self, specs: &[JobFieldSpec]) {
        for spec in specs {
            if let Some(value) = self.values.remove(&spec.name) {
                let mut value = value.coerce(spec.field_type);
                if spec.multi_valued && !value.is_list() {
                    value = AttributeValue::List(vec![value]);
                }
                self.values.insert(spec.name.clone(), value);
            }
        }
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Attributes {
    type Item = (String, AttributeValue);
    type IntoIter = btree_map::IntoIter<String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a AttributeValue);
    type IntoIter = btree_map::Iter<'a, String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_json_map(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_from_json_map_drops_nulls() {
        let attrs = Attributes::from_json_map(map(json!({
            "id": "1",
            "title": null,
            "views": 42
        })));

        assert_eq!(attrs.len(), 2);
        assert!(!attrs.contains_key("title"));
        assert_eq!(attrs.get_i64("views"), Some(42));
    }

    #[test]
    fn test_nested_arrays_are_flattened() {
        let value = AttributeValue::from_json(json!(["a", ["b", null, "c"]])).unwrap();

        assert_eq!(
            value,
            AttributeValue::List(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_objects_kept_as_text() {
        let value = AttributeValue::from_json(json!({"title": "x"})).unwrap();
        let text = value.as_str().unwrap();

        assert_eq!(
            serde_json::from_str::<Value>(text).unwrap(),
            json!({"title": "x"})
        );
    }

    #[test]
    fn test_dedupe_lists() {
        let mut attrs = Attributes::new()
            .with("id", "1")
            .with("tags", vec!["a", "b", "a", "c", "b"]);

        attrs.dedupe_lists();

        assert_eq!(attrs.get_string_list("tags"), vec!["a", "b", "c"]);
        assert_eq!(attrs.get_str("id"), Some("1"));
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let mut once = Attributes::new()
            .with("tags", vec!["x", "x", "y"])
            .with("ids", vec![1_i64, 2, 2, 3, 1])
            .with("title", "t");
        once.dedupe_lists();

        let mut twice = once.clone();
        twice.dedupe_lists();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_overwrites_shared_keys_only() {
        let mut base = Attributes::new().with("id", "1").with("title", "old");
        base.merge(Attributes::new().with("title", "new").with("person", "Ada"));

        assert_eq!(base.get_str("id"), Some("1"));
        assert_eq!(base.get_str("title"), Some("new"));
        assert_eq!(base.get_str("person"), Some("Ada"));
    }

    #[test]
    fn test_conform_coerces_declared_types() {
        let mut attrs = Attributes::new()
            .with("views", "17")
            .with("published", "2024-03-01")
            .with("tag", "news")
            .with("other", "untouched");

        attrs.conform(&[
            JobFieldSpec::new("views", FieldType::Int),
            JobFieldSpec::new("published", FieldType::Date),
            JobFieldSpec::new("tag", FieldType::String).multi_valued(),
        ]);

        assert_eq!(attrs.get("views"), Some(&AttributeValue::Integer(17)));
        assert_eq!(
            attrs.get_date("published").map(|d| d.to_rfc3339()),
            Some("2024-03-01T00:00:00+00:00".to_string())
        );
        assert_eq!(
            attrs.get("tag"),
            Some(&AttributeValue::List(vec!["news".into()]))
        );
        assert_eq!(attrs.get_str("other"), Some("untouched"));
    }

    #[test]
    fn test_conform_keeps_value_on_failed_coercion() {
        let mut attrs = Attributes::new().with("views", "many");
        attrs.conform(&[JobFieldSpec::new("views", FieldType::Long)]);

        assert_eq!(attrs.get_str("views"), Some("many"));
    }

    #[test]
    fn test_serde_round_trip_shape() {
        let attrs: Attributes =
            serde_json::from_value(json!({"id": "1", "tags": ["a", "b"], "gone": null})).unwrap();

        assert_eq!(
            serde_json::to_value(&attrs).unwrap(),
            json!({"id": "1", "tags": ["a", "b"]})
        );
    }
}
