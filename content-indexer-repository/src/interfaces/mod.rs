//! Interface definitions for the search backend and persistence.
//!
//! These traits are the seams between the pipeline and everything it talks
//! to: search engine drivers, the factory that connects them, and the stores
//! holding site configuration and spotlight entries.

mod backend_factory;
mod search_backend;
mod store;

pub use backend_factory::BackendFactory;
pub use search_backend::SearchBackend;
pub use store::{SiteStore, SpotlightStore};
