//! Explore how a word's nearest neighbors differ between the canonical and
//! naive poetry embeddings. All numeric work happens upstream; this crate
//! loads the exported JSON, classifies neighbors, lays them out and builds
//! render models for the terminal and web front ends.

pub mod classify;
pub mod config;
pub mod data;
pub mod error;
pub mod explorer;
pub mod layout;
pub mod render;
pub mod session;
pub mod store;
#[cfg(feature = "web")]
pub mod web;

pub use classify::{Category, CategoryStyle, ClassifiedWord, classify};
pub use config::ExplorerConfig;
pub use data::{
    CoordinateTable, Neighbor, Point, ProjectedPair, SearchIndex, ShiftClass, VisualizationData,
    WordRecord,
};
pub use error::{
    FetchError, InitializationError, LayoutError, LoadError, OptionalLoadError, WordNotFound,
};
pub use explorer::{Explorer, Outcome, Phase, Snapshot, Trigger, View};
pub use layout::{LayoutProvider, LayoutSeed, LayoutSource, ScatterPlan};
pub use render::{NotFoundModel, RenderModel, format_score};
pub use session::{SessionHandle, SessionRegistry};
pub use store::{DataStore, DatasetOrigin, DirectorySource, DocumentSource, MemorySource};
