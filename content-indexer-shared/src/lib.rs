//! # Content Indexer Shared
//!
//! Shared types for the content indexer: job items as delivered by the
//! upstream transport, the typed attribute container that flows through the
//! pipeline, site configuration, spotlight entries and search result shapes.

pub mod attributes;
pub mod job;
pub mod search;
pub mod site;
pub mod spotlight;

pub use attributes::{AttributeValue, Attributes};
pub use job::{
    FieldType, JobAction, JobBatch, JobFieldSpec, JobItem, ID_ATTRIBUTE, SPOTLIGHT_TYPE,
    TYPE_ATTRIBUTE,
};
pub use search::{
    FacetResult, FacetValue, GroupResult, SearchHit, SearchParams, SearchResults, SortDirection,
    SortSpec, SpellCheck, MATCH_ALL,
};
pub use site::{EngineConfig, EngineKind, FieldSpec, MergeRule, Site, SiteLocale};
pub use spotlight::{SpotlightDocument, SpotlightEntry};
