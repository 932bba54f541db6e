//! Attribute enrichment for CREATE job items.
//!
//! Consolidates the raw item attributes, hands the configured subsets to the
//! external NLP and thesaurus services, and removes duplicate list values.

mod nlp;
mod pipeline;
mod thesaurus;

pub use nlp::{HttpNlpService, NlpService};
pub use pipeline::{dedupe, EnrichmentConfig, EnrichmentPipeline};
pub use thesaurus::{HttpThesaurusService, ThesaurusService};
