//! Curated or externally synced content promoted for specific search terms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document pinned by a spotlight entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotlightDocument {
    pub position: u32,
    pub title: String,
    pub content: String,
    pub link: Option<String>,
    pub reference_id: Option<String>,
}

/// A spotlight for one (site, locale).
///
/// Entries with `managed_externally` set are owned by a content source and
/// replaced on every sync; all others belong to curators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotlightEntry {
    pub id: Uuid,
    pub site: String,
    pub locale: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub content: Vec<SpotlightDocument>,
    #[serde(default)]
    pub managed_externally: bool,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl SpotlightEntry {
    pub fn new(site: impl Into<String>, locale: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            site: site.into(),
            locale: locale.into(),
            name: name.into(),
            description: None,
            terms: Vec::new(),
            content: Vec::new(),
            managed_externally: false,
            external_id: None,
            modified_at: Utc::now(),
        }
    }

    /// Mark the entry as owned by the source that sent `external_id`.
    pub fn managed_by(mut self, external_id: impl Into<String>) -> Self {
        self.managed_externally = true;
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// True for an externally managed entry carrying `external_id`.
    pub fn is_managed_by(&self, external_id: &str) -> bool {
        self.managed_externally && self.external_id.as_deref() == Some(external_id)
    }
}
