//! Canned gazetteer fixtures for tests and examples.
//!
//! Builds small but structurally realistic stores: a country containing a
//! city containing a street and house, plus a handful of points of interest
//! for category search. Engine tests across the workspace share these so
//! expectations stay in one place.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use tracing::info;

use crate::{
    BoundingBox, ContainmentEdge, Feature, FeatureKind, GeometrySummary, LatLon, MemoryGazetteer,
    Result,
};

/// Configuration for fixture generation.
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of extra filler cities spread around the country.
    pub filler_cities: usize,
    /// Whether to include points of interest (restaurants, cafes).
    pub with_pois: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            filler_cities: 5,
            with_pois: true,
        }
    }
}

impl TestDataConfig {
    /// Smallest useful fixture: just the containment chain.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            filler_cities: 0,
            with_pois: false,
        }
    }
}

/// Axis-aligned square polygon around a centre point, `half` degrees per side.
#[must_use]
pub fn square_polygon(center: LatLon, half: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Polygon::new(
        LineString::from(vec![
            Coord { x: center.lon - half, y: center.lat - half },
            Coord { x: center.lon + half, y: center.lat - half },
            Coord { x: center.lon + half, y: center.lat + half },
            Coord { x: center.lon - half, y: center.lat + half },
            Coord { x: center.lon - half, y: center.lat - half },
        ]),
        vec![],
    )])
}

/// Feature identifiers used by [`example_country_store`].
pub mod ids {
    pub const COUNTRY: u64 = 1;
    pub const CITY: u64 = 2;
    pub const STREET: u64 = 3;
    pub const HOUSE: u64 = 4;
    pub const RESTAURANT: u64 = 100;
    pub const CAFE: u64 = 101;
    /// First filler city id; fillers count upward from here.
    pub const FILLER_BASE: u64 = 1000;
}

/// The standard fixture: Exampleland > Example City > Example Street >
/// 10 Example Street, with optional POIs and filler cities.
pub fn example_country_store(config: &TestDataConfig) -> Result<MemoryGazetteer> {
    info!(?config, "building example country fixture");

    let country_center = LatLon::new(50.0, 4.0);
    let city_center = LatLon::new(50.1, 4.1);

    let country = Feature::new(ids::COUNTRY, FeatureKind::new("boundary", "administrative"))
        .with_name("name", "Exampleland")
        .with_name("name:en", "Exampleland")
        .with_address_tag("country_code", "ex")
        .with_geometry(GeometrySummary::Polygon {
            centroid: country_center,
            bbox: BoundingBox::new(48.0, 2.0, 52.0, 6.0),
        })
        .with_ranks(4, 4)
        .with_importance(0.8);

    let city = Feature::new(ids::CITY, FeatureKind::new("place", "city"))
        .with_name("name", "Example City")
        .with_address_tag("country_code", "ex")
        .with_geometry(GeometrySummary::Polygon {
            centroid: city_center,
            bbox: BoundingBox::new(50.0, 4.0, 50.2, 4.2),
        })
        .with_ranks(16, 8)
        .with_importance(0.6);

    let street = Feature::new(ids::STREET, FeatureKind::new("highway", "residential"))
        .with_name("name", "Example Street")
        .with_address_tag("country_code", "ex")
        .with_geometry(GeometrySummary::Line {
            centroid: LatLon::new(50.105, 4.105),
            bbox: BoundingBox::new(50.10, 4.10, 50.11, 4.11),
        })
        .with_ranks(26, 26)
        .with_importance(0.2);

    let house = Feature::new(ids::HOUSE, FeatureKind::new("place", "house"))
        .with_name("name", "10 Example Street")
        .with_address_tag("housenumber", "10")
        .with_address_tag("street", "Example Street")
        .with_address_tag("country_code", "ex")
        .with_centroid(LatLon::new(50.1051, 4.1052))
        .with_ranks(30, 30)
        .with_importance(0.1);

    let mut builder = MemoryGazetteer::builder("fixture-1")
        .feature_with_polygon(country, square_polygon(country_center, 2.0))
        .feature_with_polygon(city, square_polygon(city_center, 0.1))
        .feature(street)
        .feature(house)
        .edge(ContainmentEdge::new(ids::CITY, ids::COUNTRY).primary())
        .edge(ContainmentEdge::new(ids::STREET, ids::CITY).primary())
        .edge(ContainmentEdge::new(ids::HOUSE, ids::STREET).primary());

    if config.with_pois {
        let restaurant = Feature::new(ids::RESTAURANT, FeatureKind::new("amenity", "restaurant"))
            .with_name("name", "Example Diner")
            .with_address_tag("country_code", "ex")
            .with_centroid(LatLon::new(50.102, 4.103))
            .with_ranks(30, 30)
            .with_importance(0.15);
        let cafe = Feature::new(ids::CAFE, FeatureKind::new("amenity", "cafe"))
            .with_name("name", "Example Coffee House")
            .with_address_tag("country_code", "ex")
            .with_centroid(LatLon::new(50.103, 4.104))
            .with_ranks(30, 30)
            .with_importance(0.15);
        builder = builder
            .feature(restaurant)
            .feature(cafe)
            .edge(ContainmentEdge::new(ids::RESTAURANT, ids::CITY).primary())
            .edge(ContainmentEdge::new(ids::CAFE, ids::CITY).primary());
    }

    for i in 0..config.filler_cities {
        let id = ids::FILLER_BASE + i as u64;
        let lat = 49.0 + (i as f64) * 0.3;
        let lon = 3.0 + (i as f64) * 0.4;
        builder = builder
            .feature(
                Feature::new(id, FeatureKind::new("place", "town"))
                    .with_name("name", format!("Fillerton {i}"))
                    .with_address_tag("country_code", "ex")
                    .with_centroid(LatLon::new(lat, lon))
                    .with_ranks(18, 18)
                    .with_importance(0.3),
            )
            .edge(ContainmentEdge::new(id, ids::COUNTRY).primary());
    }

    builder.build()
}
