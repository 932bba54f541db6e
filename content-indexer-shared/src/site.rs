//! Site configuration: search destinations, their locales, field specs and
//! merge rules.

use serde::{Deserialize, Serialize};

const DEFAULT_ROWS_PER_PAGE: u32 = 10;

fn default_rows_per_page() -> u32 {
    DEFAULT_ROWS_PER_PAGE
}

fn default_true() -> bool {
    true
}

/// Search engine family a site indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    OpenSearch,
    Solr,
}

/// Connection settings for a site's search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,
    pub url: String,
}

/// One search-backend target per (site, language).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteLocale {
    pub language: String,
    /// Index or core name. Defaults to `<site>_<language>` when absent.
    #[serde(default)]
    pub core: Option<String>,
    /// NLP instance to hand attributes to. `None` disables NLP for the locale.
    #[serde(default)]
    pub nlp_instance: Option<String>,
}

impl SiteLocale {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            core: None,
            nlp_instance: None,
        }
    }

    pub fn core_name(&self, site_name: &str) -> String {
        match self.core.as_deref() {
            Some(core) if !core.trim().is_empty() => core.to_string(),
            _ => format!("{}_{}", site_name, self.language).to_lowercase(),
        }
    }
}

/// Per-site field configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub nlp_enabled: bool,
    #[serde(default)]
    pub facet_enabled: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nlp_enabled: false,
            facet_enabled: false,
            enabled: true,
        }
    }

    pub fn with_nlp(mut self) -> Self {
        self.nlp_enabled = true;
        self
    }

    /// Whether attributes with this name are routed to NLP.
    pub fn routes_to_nlp(&self) -> bool {
        self.nlp_enabled && self.enabled
    }
}

/// How two providers' partial documents about one entity are joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRule {
    pub provider_from: String,
    pub provider_to: String,
    pub relation_field_from: String,
    pub relation_field_to: String,
    #[serde(default)]
    pub overwritten_fields: Vec<String>,
    /// Restricts the rule to one locale. `None` applies to every locale.
    #[serde(default)]
    pub locale: Option<String>,
}

impl MergeRule {
    pub fn applies_to(&self, locale: &str) -> bool {
        match self.locale.as_deref() {
            None | Some("") => true,
            Some(rule_locale) => rule_locale.eq_ignore_ascii_case(locale),
        }
    }
}

/// A configured search destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub name: String,
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: u32,
    #[serde(default)]
    pub thesaurus_enabled: bool,
    pub engine: EngineConfig,
    #[serde(default)]
    pub locales: Vec<SiteLocale>,
    #[serde(default)]
    pub merge_rules: Vec<MergeRule>,
    #[serde(default)]
    pub field_specs: Vec<FieldSpec>,
}

impl Site {
    pub fn new(name: impl Into<String>, engine: EngineConfig) -> Self {
        Self {
            name: name.into(),
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            thesaurus_enabled: false,
            engine,
            locales: Vec::new(),
            merge_rules: Vec::new(),
            field_specs: Vec::new(),
        }
    }

    /// Find the locale entry for `language`, falling back to a
    /// case-insensitive match (`en_US` vs `en_us`).
    pub fn locale(&self, language: &str) -> Option<&SiteLocale> {
        self.locales
            .iter()
            .find(|l| l.language == language)
            .or_else(|| {
                self.locales
                    .iter()
                    .find(|l| l.language.eq_ignore_ascii_case(language))
            })
    }

    pub fn is_nlp_field(&self, name: &str) -> bool {
        self.field_specs
            .iter()
            .any(|spec| spec.name == name && spec.routes_to_nlp())
    }

    pub fn merge_rules_for<'a>(&'a self, locale: &'a str) -> impl Iterator<Item = &'a MergeRule> {
        self.merge_rules
            .iter()
            .filter(move |rule| rule.applies_to(locale))
    }
}
