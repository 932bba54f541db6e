//! Job items as delivered by the upstream transport.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attributes::AttributeValue;

/// Attribute carrying the logical document identity.
pub const ID_ATTRIBUTE: &str = "id";

/// Attribute carrying the document category.
pub const TYPE_ATTRIBUTE: &str = "type";

/// `type` value marking an item as externally managed spotlight content.
pub const SPOTLIGHT_TYPE: &str = "TUR_SPOTLIGHT";

/// What a job item asks the indexer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobAction {
    Create,
    Delete,
    Commit,
}

/// Declared type of a field in a job's field specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Int,
    Long,
    Float,
    Double,
    Bool,
    Date,
    #[default]
    String,
    Text,
    #[serde(other)]
    Unknown,
}

/// Field descriptor sent along with a job item by the source connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobFieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mandatory: bool,
    pub multi_valued: bool,
    pub facet: bool,
    pub facet_name: Option<String>,
}

impl JobFieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            ..Default::default()
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }
}

/// A single content change notification.
///
/// The attribute bag is kept in its wire form; the pipeline converts it to
/// [`crate::Attributes`] during consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    pub action: JobAction,
    #[serde(default)]
    pub site_names: Vec<String>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub field_specs: Vec<JobFieldSpec>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl JobItem {
    /// Create an item targeting a single site.
    pub fn new(action: JobAction, site_name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            action,
            site_names: vec![site_name.into()],
            locale: locale.into(),
            attributes: Map::new(),
            field_specs: Vec::new(),
            checksum: None,
            environment: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_field_spec(mut self, spec: JobFieldSpec) -> Self {
        self.field_specs.push(spec);
        self
    }

    /// The owning site. Only the first listed site is honoured.
    pub fn site_name(&self) -> Option<&str> {
        self.site_names.first().map(String::as_str)
    }

    /// Document identity, read the same way as [`crate::Attributes::document_id`].
    pub fn id(&self) -> Option<String> {
        self.attributes
            .get(ID_ATTRIBUTE)
            .cloned()
            .and_then(AttributeValue::from_json)
            .and_then(|value| value.as_identity())
    }

    pub fn item_type(&self) -> Option<String> {
        self.text_attribute(TYPE_ATTRIBUTE)
    }

    /// Read a scalar attribute as text. Empty strings count as absent.
    pub fn text_attribute(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Job items delivered together. Processed item by item, never as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobBatch {
    pub items: Vec<JobItem>,
}

impl JobBatch {
    pub fn new(items: Vec<JobItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for JobBatch {
    type Item = JobItem;
    type IntoIter = std::vec::IntoIter<JobItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_wire_item() {
        let item: JobItem = serde_json::from_value(json!({
            "action": "CREATE",
            "siteNames": ["site1"],
            "locale": "en_US",
            "attributes": {"id": "1", "title": "Hello"},
            "fieldSpecs": [
                {"name": "title", "type": "TEXT", "mandatory": true, "multiValued": false, "facet": false}
            ],
            "checksum": "abc",
            "environment": "PROD"
        }))
        .unwrap();

        assert_eq!(item.action, JobAction::Create);
        assert_eq!(item.site_name(), Some("site1"));
        assert_eq!(item.id(), Some("1".to_string()));
        assert_eq!(item.field_specs[0].field_type, FieldType::Text);
        assert!(item.field_specs[0].mandatory);
    }

    #[test]
    fn test_unknown_field_type() {
        let spec: JobFieldSpec =
            serde_json::from_value(json!({"name": "x", "type": "GEO_POINT"})).unwrap();
        assert_eq!(spec.field_type, FieldType::Unknown);
    }

    #[test]
    fn test_minimal_commit_item() {
        let item: JobItem = serde_json::from_value(json!({"action": "COMMIT"})).unwrap();

        assert_eq!(item.action, JobAction::Commit);
        assert!(item.site_name().is_none());
        assert!(item.attributes.is_empty());
    }

    #[test]
    fn test_numeric_id_reads_as_text() {
        let item = JobItem::new(JobAction::Delete, "site1", "en_US").with_attribute("id", 42);
        assert_eq!(item.id(), Some("42".to_string()));
    }

    #[test]
    fn test_id_matches_consolidated_identity() {
        use crate::Attributes;

        for raw in [json!(["7"]), json!("7"), json!(7), json!(["7", "8"]), json!([]), json!("")] {
            let item = JobItem::new(JobAction::Delete, "site1", "en_US").with_attribute("id", raw.clone());
            let consolidated = Attributes::from_json_map(item.attributes.clone());

            assert_eq!(item.id(), consolidated.document_id(), "id {}", raw);
        }

        let single = JobItem::new(JobAction::Delete, "site1", "en_US").with_attribute("id", json!(["7"]));
        assert_eq!(single.id(), Some("7".to_string()));
        let many = JobItem::new(JobAction::Delete, "site1", "en_US").with_attribute("id", json!(["7", "8"]));
        assert_eq!(many.id(), None);
    }

    #[test]
    fn test_batch_is_a_json_array() {
        let batch: JobBatch = serde_json::from_value(json!([
            {"action": "DELETE", "attributes": {"id": "1"}},
            {"action": "COMMIT"}
        ]))
        .unwrap();

        assert_eq!(batch.len(), 2);
    }
}
