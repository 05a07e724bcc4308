//! The gazetteer data model: features, geometry summaries and containment.
//!
//! A [`Feature`] is one row of the gazetteer. The resolution engine never
//! mutates features; it only reads them, scores ephemeral candidates around
//! them and walks [`ContainmentEdge`]s to build address chains.

use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier of a gazetteer feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FeatureId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Classification of a feature as a `class/value` tag pair,
/// e.g. `place/city` or `amenity/restaurant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureKind {
    pub class: String,
    pub value: String,
}

impl FeatureKind {
    pub fn new(class: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            value: value.into(),
        }
    }

    /// Matches either a bare class (`"amenity"`) or a full pair
    /// (`"amenity/restaurant"`).
    #[must_use]
    pub fn matches(&self, pattern: &str) -> bool {
        match pattern.split_once('/') {
            Some((class, value)) => self.class == class && self.value == value,
            None => self.class == pattern,
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class, self.value)
    }
}

/// A WGS84 coordinate, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether the coordinate lies inside the valid WGS84 range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance to `other` in metres (haversine).
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// An axis-aligned bounding box in degrees, also used as the search viewbox.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Degenerate box covering a single point.
    #[must_use]
    pub fn around_point(point: LatLon) -> Self {
        Self::new(point.lat, point.lon, point.lat, point.lon)
    }

    #[must_use]
    pub fn contains(&self, point: LatLon) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }

    #[must_use]
    pub fn center(&self) -> LatLon {
        LatLon::new(
            f64::midpoint(self.min_lat, self.max_lat),
            f64::midpoint(self.min_lon, self.max_lon),
        )
    }

    /// Expand the box by roughly `metres` on every side.
    ///
    /// Longitude expansion is scaled by the latitude of the box centre, so
    /// this stays usable away from the equator without pretending to be a
    /// proper projection.
    #[must_use]
    pub fn expanded_by_m(&self, metres: f64) -> Self {
        const M_PER_DEG_LAT: f64 = 111_320.0;
        let dlat = metres / M_PER_DEG_LAT;
        let cos_lat = self.center().lat.to_radians().cos().max(0.01);
        let dlon = metres / (M_PER_DEG_LAT * cos_lat);
        Self::new(
            self.min_lat - dlat,
            self.min_lon - dlon,
            self.max_lat + dlat,
            self.max_lon + dlon,
        )
    }
}

/// Geometry of a feature, reduced to what resolution needs: the shape class,
/// a centroid and a bounding box. Full polygon geometry stays store-side.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeometrySummary {
    Point(LatLon),
    Line { centroid: LatLon, bbox: BoundingBox },
    Polygon { centroid: LatLon, bbox: BoundingBox },
}

impl GeometrySummary {
    #[must_use]
    pub fn centroid(&self) -> LatLon {
        match self {
            Self::Point(p) => *p,
            Self::Line { centroid, .. } | Self::Polygon { centroid, .. } => *centroid,
        }
    }

    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        match self {
            Self::Point(p) => BoundingBox::around_point(*p),
            Self::Line { bbox, .. } | Self::Polygon { bbox, .. } => *bbox,
        }
    }
}

/// One gazetteer entry.
///
/// `address_rank` follows the usual 0..=30 scheme: 0 is unranked, 4 is
/// country level, 30 is house level. "Finer" always means numerically
/// larger. `search_rank` is the coarse classification used for candidate
/// filtering and need not equal `address_rank`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Feature {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub geometry: GeometrySummary,
    /// Display names keyed by tag: `name`, `name:en`, `old_name`, ...
    pub names: HashMap<String, String>,
    /// Address tags: `housenumber`, `street`, `postcode`, `country_code`, ...
    pub address_tags: HashMap<String, String>,
    pub search_rank: u8,
    pub address_rank: u8,
    /// Continuous prominence score in `[0, 1]`.
    pub importance: f64,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>, kind: FeatureKind) -> Self {
        Self {
            id: id.into(),
            kind,
            geometry: GeometrySummary::Point(LatLon::new(0.0, 0.0)),
            names: HashMap::new(),
            address_tags: HashMap::new(),
            search_rank: 0,
            address_rank: 0,
            importance: 0.0,
        }
    }

    #[must_use]
    pub fn with_name(mut self, tag: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(tag.into(), name.into());
        self
    }

    #[must_use]
    pub fn with_address_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.address_tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_centroid(mut self, centroid: LatLon) -> Self {
        self.geometry = GeometrySummary::Point(centroid);
        self
    }

    #[must_use]
    pub fn with_geometry(mut self, geometry: GeometrySummary) -> Self {
        self.geometry = geometry;
        self
    }

    #[must_use]
    pub fn with_ranks(mut self, search_rank: u8, address_rank: u8) -> Self {
        self.search_rank = search_rank;
        self.address_rank = address_rank;
        self
    }

    #[must_use]
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Preferred display name for a language, falling back to the default
    /// `name` tag, then to any name at all.
    #[must_use]
    pub fn name(&self, language: Option<&str>) -> Option<&str> {
        if let Some(lang) = language {
            if let Some(name) = self.names.get(&format!("name:{lang}")) {
                return Some(name);
            }
        }
        self.names
            .get("name")
            .or_else(|| self.names.values().next())
            .map(String::as_str)
    }

    #[must_use]
    pub fn address_tag(&self, key: &str) -> Option<&str> {
        self.address_tags.get(key).map(String::as_str)
    }

    /// Lower-cased ISO country code, when tagged.
    #[must_use]
    pub fn country_code(&self) -> Option<&str> {
        self.address_tag("country_code")
    }

    #[must_use]
    pub fn centroid(&self) -> LatLon {
        self.geometry.centroid()
    }
}

/// Where a containment edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeOrigin {
    /// Derived from point-in-polygon containment during import.
    Geometric,
    /// Derived from address tags on the child feature.
    TagDerived,
}

/// Directed child -> parent relation in the containment graph.
///
/// A feature may carry several parents at the same rank; the address
/// resolver flattens those to one linear chain per request using
/// `overlap` and `primary` as tie-breaks. The graph itself is never
/// mutated by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContainmentEdge {
    pub child: FeatureId,
    pub parent: FeatureId,
    /// Fraction of the child geometry covered by the parent, `[0, 1]`.
    pub overlap: f64,
    /// Flagged by the gazetteer as the preferred parent.
    pub primary: bool,
    pub origin: EdgeOrigin,
}

impl ContainmentEdge {
    pub fn new(child: impl Into<FeatureId>, parent: impl Into<FeatureId>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
            overlap: 1.0,
            primary: false,
            origin: EdgeOrigin::Geometric,
        }
    }

    #[must_use]
    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    #[must_use]
    pub fn tag_derived(mut self) -> Self {
        self.origin = EdgeOrigin::TagDerived;
        self
    }
}
