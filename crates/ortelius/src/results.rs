//! Result types returned by the public operations.
//!
//! Search, reverse and category results all share a [`ResolvedPlace`] core
//! (the matched feature plus its resolved address chain) and add their
//! kind-specific field on top, so callers can treat the address part
//! uniformly.

use ortelius_gazetteer::{Feature, FeatureId, FeatureKind, LatLon};

#[cfg(feature = "serde")]
use serde::Serialize;

/// A compact, caller-facing view of a feature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PlaceSummary {
    pub id: FeatureId,
    pub kind: FeatureKind,
    /// Display name in the requested language, when the feature has one.
    pub name: Option<String>,
    pub centroid: LatLon,
    pub address_rank: u8,
    pub importance: f64,
}

impl PlaceSummary {
    pub(crate) fn from_feature(feature: &Feature, language: Option<&str>) -> Self {
        Self {
            id: feature.id,
            kind: feature.kind.clone(),
            name: feature.name(language).map(str::to_owned),
            centroid: feature.centroid(),
            address_rank: feature.address_rank,
            importance: feature.importance,
        }
    }
}

/// One entry of a resolved address: hierarchy rank plus localized name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AddressPart {
    pub rank: u8,
    pub name: String,
}

/// Ordered address chain, finest entry first.
///
/// Invariant: ranks are pairwise distinct and strictly decrease from the
/// first (finest) part to the last (coarsest).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ResolvedAddress {
    parts: Vec<AddressPart>,
}

impl ResolvedAddress {
    /// Build from parts that must already be finest-first with strictly
    /// decreasing ranks; the constructor enforces the invariant by
    /// dropping any part that does not continue the descent.
    pub(crate) fn from_parts(parts: Vec<AddressPart>) -> Self {
        let mut out: Vec<AddressPart> = Vec::with_capacity(parts.len());
        for part in parts {
            match out.last() {
                Some(last) if part.rank >= last.rank => continue,
                _ => out.push(part),
            }
        }
        Self { parts: out }
    }

    #[must_use]
    pub fn parts(&self) -> &[AddressPart] {
        &self.parts
    }

    /// The finest (most specific) address entry.
    #[must_use]
    pub fn finest(&self) -> Option<&AddressPart> {
        self.parts.first()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Human-readable one-liner, finest to coarsest.
    #[must_use]
    pub fn display_line(&self) -> String {
        let names: Vec<&str> = self.parts.iter().map(|p| p.name.as_str()).collect();
        names.join(", ")
    }
}

/// Shared core of every ranked result: the place and its address chain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ResolvedPlace {
    pub place: PlaceSummary,
    pub address: ResolvedAddress,
}

/// One entry of a forward (text or category) search response.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SearchResult {
    pub resolved: ResolvedPlace,
    /// Relevance in `[0, 1]`, comparable only within one response.
    pub score: f64,
}

impl SearchResult {
    #[must_use]
    pub fn id(&self) -> FeatureId {
        self.resolved.place.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.resolved.place.name.as_deref()
    }

    #[must_use]
    pub fn address(&self) -> &ResolvedAddress {
        &self.resolved.address
    }
}

/// Response of a reverse lookup.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ReverseResult {
    pub resolved: ResolvedPlace,
    /// Metres from the query point; zero when the point lies inside the
    /// feature's geometry.
    pub distance_m: f64,
}

impl ReverseResult {
    #[must_use]
    pub fn id(&self) -> FeatureId {
        self.resolved.place.id
    }

    #[must_use]
    pub fn address(&self) -> &ResolvedAddress {
        &self.resolved.address
    }
}

/// Full feature introspection returned by `details`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PlaceDetails {
    pub feature: Feature,
    /// Parent chain, finest first; present when requested.
    pub hierarchy: Option<Vec<PlaceSummary>>,
}

/// Store liveness as seen through `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Health {
    Ok,
    /// The store answers but holds no data.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StatusReport {
    pub health: Health,
    pub store_version: String,
    pub feature_count: u64,
}
