//! Gazetteer data model and store boundary for the Ortelius geocoding engine.
//!
//! This crate owns everything the resolution engine treats as "the store":
//! the [`Feature`] data model, the [`GazetteerStore`] trait that the engine
//! queries through, and [`MemoryGazetteer`], an in-process reference store
//! backed by a Tantivy token index and an R-tree spatial index.
//!
//! The ingestion pipeline that populates a production gazetteer lives
//! elsewhere; from this crate's point of view features are immutable rows
//! that already carry their ranks, importance and containment edges.
//!
//! # Example
//!
//! ```rust
//! use ortelius_gazetteer::{Feature, FeatureKind, LatLon, MemoryGazetteer};
//!
//! let store = MemoryGazetteer::builder("example")
//!     .feature(
//!         Feature::new(1, FeatureKind::new("place", "city"))
//!             .with_name("name", "Antwerp")
//!             .with_centroid(LatLon::new(51.22, 4.40))
//!             .with_ranks(16, 16)
//!             .with_importance(0.6),
//!     )
//!     .build()?;
//! # Ok::<(), ortelius_gazetteer::StoreError>(())
//! ```

mod error;
mod feature;
mod memory;
mod normalize;
mod store;
pub mod test_data;

pub use error::{Result, StoreError};
pub use feature::{
    BoundingBox, ContainmentEdge, EdgeOrigin, Feature, FeatureId, FeatureKind, GeometrySummary,
    LatLon,
};
pub use memory::{MemoryGazetteer, MemoryGazetteerBuilder};
pub use normalize::{normalize, normalize_tokens};
pub use store::{GazetteerStore, NearbyHit, StoreStats, TextHit, TokenQuery};
