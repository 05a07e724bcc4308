//! The store boundary the resolution engine queries through.
//!
//! A production deployment implements [`GazetteerStore`] over its own
//! database; tests and small deployments use
//! [`MemoryGazetteer`](crate::MemoryGazetteer). All access is read-only and
//! every method is a potential suspension point for the engine.

use async_trait::async_trait;

use crate::{
    error::Result,
    feature::{BoundingBox, ContainmentEdge, Feature, FeatureId, LatLon},
};

/// Liveness and versioning information about a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Opaque data version, e.g. an import timestamp.
    pub version: String,
    pub feature_count: u64,
}

/// A token-index query, already normalized engine-side.
#[derive(Debug, Clone, Default)]
pub struct TokenQuery {
    /// Normalized tokens; all of them should appear in a matching feature's
    /// indexed text, though stores may return partial matches with a lower
    /// score.
    pub tokens: Vec<String>,
    /// Normalized multi-word groups whose words must appear adjacent and
    /// in order in the indexed text.
    pub phrases: Vec<String>,
    /// Bias (or, with `bounded`, restrict) matches to this box.
    pub viewbox: Option<BoundingBox>,
    /// When true, features outside `viewbox` are excluded instead of
    /// merely down-weighted.
    pub bounded: bool,
    /// Restrict to features whose kind matches any of these patterns
    /// (`"amenity"` or `"amenity/restaurant"`).
    pub kinds: Vec<String>,
    /// Restrict to these lower-cased country codes.
    pub countries: Vec<String>,
    /// Ceiling on returned hits; a policy tunable, not a correctness bound.
    pub limit: usize,
}

/// One hit from the token index, with the store's own pre-score.
///
/// The pre-score orders hits for the retrieval cap; relevance proper is
/// computed engine-side.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub feature: Feature,
    pub pre_score: f32,
}

/// One hit from a nearest-feature query.
#[derive(Debug, Clone)]
pub struct NearbyHit {
    pub feature: Feature,
    pub distance_m: f64,
}

/// Read-only access to the gazetteer.
///
/// Implementations must be cheap to share (`&self` methods, internal
/// synchronization if any) and must not retry internally; retry policy
/// belongs to the engine.
#[async_trait]
pub trait GazetteerStore: Send + Sync + 'static {
    /// Lightweight liveness check.
    async fn stats(&self) -> Result<StoreStats>;

    /// Fetch a single feature by identifier.
    async fn feature(&self, id: FeatureId) -> Result<Option<Feature>>;

    /// Fetch several features; missing identifiers are simply absent.
    async fn features(&self, ids: &[FeatureId]) -> Result<Vec<Feature>>;

    /// Token-index search over names and address tags.
    async fn search_tokens(&self, query: &TokenQuery) -> Result<Vec<TextHit>>;

    /// Polygon features containing `point` with
    /// `min_rank <= address_rank <= max_rank`, finest first.
    async fn containing(&self, point: LatLon, min_rank: u8, max_rank: u8)
    -> Result<Vec<Feature>>;

    /// Nearest features to `point` within `radius_m`, closest first,
    /// restricted to `address_rank <= max_rank`.
    async fn nearest(
        &self,
        point: LatLon,
        radius_m: f64,
        max_rank: u8,
        limit: usize,
    ) -> Result<Vec<NearbyHit>>;

    /// Containment edges leading out of `id` (its parents).
    async fn parents(&self, id: FeatureId) -> Result<Vec<ContainmentEdge>>;
}
