//! Cross-provider document merge.
//!
//! Two providers may each index a partial view of the same entity, e.g. a
//! CMS page and the DAM asset it embeds. A [`MergeRule`] names the fields
//! relating the two views and the fields one side takes from the other.
//! Merging only augments the in-flight attributes; documents already in the
//! backend are never touched.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use content_indexer_repository::{BackendInstance, SearchBackendGateway};
use content_indexer_shared::{Attributes, MergeRule, Site};

/// Attribute naming the provider that sent a document.
pub const PROVIDER_ATTRIBUTE: &str = "source_apps";

/// The counterpart lookup for one rule, from the incoming document's side.
struct Lookup<'a> {
    rule: &'a MergeRule,
    counterpart_provider: &'a str,
    relation_field: &'a str,
    value: String,
}

pub struct MergeProviderProcess {
    gateway: Arc<SearchBackendGateway>,
}

impl MergeProviderProcess {
    pub fn new(gateway: Arc<SearchBackendGateway>) -> Self {
        Self { gateway }
    }

    /// Overlay fields from counterpart documents onto `attributes`.
    ///
    /// Returns `attributes` unchanged when no rule applies, no counterpart
    /// exists, or the lookup fails.
    #[instrument(skip_all, fields(site = %site.name, locale = %locale))]
    pub async fn merge(&self, site: &Site, mut attributes: Attributes, locale: &str) -> Attributes {
        let lookups: Vec<Lookup<'_>> = site
            .merge_rules_for(locale)
            .filter_map(|rule| Self::lookup_for(rule, &attributes))
            .collect();

        if lookups.is_empty() {
            return attributes;
        }

        let Some(instance) = self.gateway.resolve_instance(site, locale).await else {
            warn!("No backend instance for merge lookup, skipping merge");
            return attributes;
        };

        for lookup in lookups {
            if let Some(counterpart) = self.find_counterpart(&instance, &lookup).await {
                Self::overlay(&mut attributes, &counterpart, &lookup.rule.overwritten_fields);
            }
        }

        attributes
    }

    /// Work out which side of `rule` the document is on.
    fn lookup_for<'a>(rule: &'a MergeRule, attributes: &Attributes) -> Option<Lookup<'a>> {
        let provider = attributes.get(PROVIDER_ATTRIBUTE)?;

        let (counterpart_provider, own_field, relation_field) =
            if provider.contains_text(&rule.provider_from) {
                (
                    rule.provider_to.as_str(),
                    rule.relation_field_from.as_str(),
                    rule.relation_field_to.as_str(),
                )
            } else if provider.contains_text(&rule.provider_to) {
                (
                    rule.provider_from.as_str(),
                    rule.relation_field_to.as_str(),
                    rule.relation_field_from.as_str(),
                )
            } else {
                return None;
            };

        let value = attributes.get_text(own_field)?;
        Some(Lookup {
            rule,
            counterpart_provider,
            relation_field,
            value,
        })
    }

    async fn find_counterpart(&self, instance: &BackendInstance, lookup: &Lookup<'_>) -> Option<Attributes> {
        let filters = vec![
            (PROVIDER_ATTRIBUTE.to_string(), lookup.counterpart_provider.to_string()),
            (lookup.relation_field.to_string(), lookup.value.clone()),
        ];

        match self.gateway.find_one(instance, filters).await {
            Ok(Some(hit)) => Some(hit.fields),
            Ok(None) => {
                debug!(
                    provider = %lookup.counterpart_provider,
                    field = %lookup.relation_field,
                    value = %lookup.value,
                    "No counterpart document"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Merge lookup failed, treating as no counterpart");
                None
            }
        }
    }

    /// Copy the listed fields present in `counterpart`. Nothing else changes.
    fn overlay(attributes: &mut Attributes, counterpart: &Attributes, fields: &[String]) {
        for field in fields {
            if let Some(value) = counterpart.get(field) {
                attributes.insert(field.clone(), value.clone());
            }
        }
    }
}
