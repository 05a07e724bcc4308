//! Integration tests for the geocoding resolution engine.
//!
//! These run against the full public API over an in-memory gazetteer and
//! verify the externally observable contracts: ranked forward search,
//! reverse lookups, address chains with strictly decreasing ranks, and
//! deterministic ordering.

use std::sync::Arc;

use ortelius::{
    DetailsOptions, Geocoder, GeocoderConfig, Health, InputError, LookupOptions, MAX_LIMIT, Near,
    OrteliusError, ReverseOptions, SearchOptions,
};
use ortelius_gazetteer::{
    BoundingBox, ContainmentEdge, Feature, FeatureId, FeatureKind, GazetteerStore,
    GeometrySummary, LatLon, MemoryGazetteer,
    test_data::{TestDataConfig, example_country_store, ids, square_polygon},
};

fn setup_test_env() {
    let _ = ortelius::init_logging(tracing::Level::WARN);
}

fn fixture_geocoder() -> Geocoder {
    setup_test_env();
    let store = example_country_store(&TestDataConfig::default()).expect("fixture should build");
    Geocoder::new(Arc::new(store))
}

/// Three-level store built inline: a country (rank 4), a city (rank 8)
/// and a house (rank 30) contained directly in the city.
fn three_level_store() -> MemoryGazetteer {
    let country = Feature::new(1_u64, FeatureKind::new("boundary", "administrative"))
        .with_name("name", "Exampleland")
        .with_address_tag("country_code", "ex")
        .with_geometry(GeometrySummary::Polygon {
            centroid: LatLon::new(50.0, 4.0),
            bbox: BoundingBox::new(48.0, 2.0, 52.0, 6.0),
        })
        .with_ranks(4, 4)
        .with_importance(0.8);
    let city = Feature::new(2_u64, FeatureKind::new("place", "city"))
        .with_name("name", "Example City")
        .with_geometry(GeometrySummary::Polygon {
            centroid: LatLon::new(50.1, 4.1),
            bbox: BoundingBox::new(50.0, 4.0, 50.2, 4.2),
        })
        .with_ranks(16, 8)
        .with_importance(0.6);
    let house = Feature::new(3_u64, FeatureKind::new("place", "house"))
        .with_name("name", "10 Example Street")
        .with_address_tag("housenumber", "10")
        .with_address_tag("street", "Example Street")
        .with_centroid(LatLon::new(50.1, 4.1))
        .with_ranks(30, 30);

    MemoryGazetteer::builder("three-level-1")
        .feature_with_polygon(country, square_polygon(LatLon::new(50.0, 4.0), 2.0))
        .feature_with_polygon(city, square_polygon(LatLon::new(50.1, 4.1), 0.1))
        .feature(house)
        .edge(ContainmentEdge::new(3_u64, 2_u64).primary())
        .edge(ContainmentEdge::new(2_u64, 1_u64).primary())
        .build()
        .expect("store should build")
}

#[tokio::test]
async fn house_search_resolves_three_level_address() {
    setup_test_env();
    let geocoder = Geocoder::new(Arc::new(three_level_store()));

    let results = geocoder
        .search("10 Example Street", &SearchOptions::default())
        .await
        .expect("search should work");
    assert!(!results.is_empty(), "should find the house");

    let best = &results[0];
    assert_eq!(best.id().0, 3);

    let parts = best.address().parts();
    let ranks: Vec<u8> = parts.iter().map(|p| p.rank).collect();
    assert_eq!(ranks, vec![30, 8, 4]);
    assert!(
        ranks.windows(2).all(|w| w[0] > w[1]),
        "address ranks must strictly decrease finest-first"
    );
    let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["10 Example Street", "Example City", "Exampleland"]);
}

#[tokio::test]
async fn search_results_are_sorted_and_unique() {
    let geocoder = fixture_geocoder();

    let results = geocoder
        .search("example", &SearchOptions::default())
        .await
        .expect("search should work");
    assert!(!results.is_empty());

    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores must be descending");
    }
    let mut ids_seen: Vec<u64> = results.iter().map(|r| r.id().0).collect();
    ids_seen.sort_unstable();
    let before = ids_seen.len();
    ids_seen.dedup();
    assert_eq!(before, ids_seen.len(), "no feature may appear twice");
}

#[tokio::test]
async fn search_is_idempotent() {
    let geocoder = fixture_geocoder();
    let options = SearchOptions::default();

    let first = geocoder.search("Example City", &options).await.unwrap();
    let second = geocoder.search("Example City", &options).await.unwrap();
    assert_eq!(first, second, "equal inputs must produce equal responses");
}

#[tokio::test]
async fn fuzzy_search_survives_a_typo() {
    let geocoder = fixture_geocoder();

    let results = geocoder
        .search("Exmple City", &SearchOptions::default())
        .await
        .expect("search should work");
    assert!(
        results.iter().any(|r| r.id().0 == ids::CITY),
        "one edit away should still match"
    );
}

#[tokio::test]
async fn empty_and_separator_only_queries_are_input_errors() {
    let geocoder = fixture_geocoder();
    for query in ["", "   ", ",;--"] {
        let err = geocoder
            .search(query, &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrteliusError::Input(InputError::EmptyQuery)),
            "query {query:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn zero_limit_yields_empty_not_error() {
    let geocoder = fixture_geocoder();
    let options = SearchOptions {
        limit: Some(0),
        ..SearchOptions::default()
    };
    let results = geocoder.search("Example City", &options).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn oversized_limit_is_clamped() {
    let geocoder = fixture_geocoder();
    let options = SearchOptions {
        limit: Some(10_000),
        ..SearchOptions::default()
    };
    let results = geocoder.search("example", &options).await.unwrap();
    assert!(results.len() <= MAX_LIMIT);
}

#[tokio::test]
async fn bounded_viewbox_excludes_outside_features() {
    let geocoder = fixture_geocoder();
    // A box far away from every fixture feature.
    let options = SearchOptions {
        viewbox: Some(BoundingBox::new(10.0, 10.0, 11.0, 11.0)),
        bounded: true,
        ..SearchOptions::default()
    };
    let results = geocoder.search("Example City", &options).await.unwrap();
    assert!(results.is_empty(), "bounded viewbox must exclude, not bias");
}

#[tokio::test]
async fn country_restriction_filters_results() {
    let geocoder = fixture_geocoder();
    let options = SearchOptions {
        country_restriction: vec!["zz".into()],
        ..SearchOptions::default()
    };
    let results = geocoder.search("Exampleland", &options).await.unwrap();
    assert!(results.is_empty(), "no fixture feature is tagged 'zz'");

    let options = SearchOptions {
        country_restriction: vec!["EX".into()],
        ..SearchOptions::default()
    };
    let results = geocoder.search("Exampleland", &options).await.unwrap();
    assert!(results.iter().any(|r| r.id().0 == ids::COUNTRY));
}

#[tokio::test]
async fn structured_search_finds_the_house() {
    let geocoder = fixture_geocoder();
    let query = ortelius::StructuredQuery {
        house_number: Some("10".into()),
        street: Some("Example Street".into()),
        city: Some("Example City".into()),
        ..Default::default()
    };
    let results = geocoder
        .search_address(&query, &SearchOptions::default())
        .await
        .expect("structured search should work");
    assert!(results.iter().any(|r| r.id().0 == ids::HOUSE));
}

#[tokio::test]
async fn reverse_returns_finest_feature_first() {
    let geocoder = fixture_geocoder();

    // At the house's door the house wins over street, city and country.
    let place = geocoder
        .reverse(50.1051, 4.1052, &ReverseOptions::default())
        .await
        .expect("reverse should work");
    assert_eq!(place.id().0, ids::HOUSE);
    assert_eq!(place.address().finest().unwrap().rank, 30);
    assert!(place.distance_m < 50.0);

    // Capped at city level the city polygon wins with distance zero.
    let options = ReverseOptions {
        max_rank: 8,
        ..ReverseOptions::default()
    };
    let place = geocoder.reverse(50.1051, 4.1052, &options).await.unwrap();
    assert_eq!(place.id().0, ids::CITY);
    assert!((place.distance_m - 0.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn reverse_far_from_data_reports_no_coverage() {
    let geocoder = fixture_geocoder();
    let options = ReverseOptions {
        radius_ceiling_m: Some(1_000.0),
        ..ReverseOptions::default()
    };
    let err = geocoder.reverse(-40.0, -170.0, &options).await.unwrap_err();
    assert!(matches!(err, OrteliusError::NoCoverage { .. }));
}

#[tokio::test]
async fn lookup_skips_missing_identifiers() {
    let geocoder = fixture_geocoder();
    let requested = [
        FeatureId(ids::CITY),
        FeatureId(999_999),
        FeatureId(ids::COUNTRY),
    ];
    let places = geocoder
        .lookup(&requested, &LookupOptions::default())
        .await
        .expect("lookup should work");
    let found: Vec<u64> = places.iter().map(|p| p.place.id.0).collect();
    assert_eq!(found, vec![ids::CITY, ids::COUNTRY]);
}

#[tokio::test]
async fn details_includes_hierarchy_on_request() {
    let geocoder = fixture_geocoder();

    let bare = geocoder
        .details(FeatureId(ids::HOUSE), &DetailsOptions::default())
        .await
        .unwrap();
    assert!(bare.hierarchy.is_none());
    assert_eq!(bare.feature.id.0, ids::HOUSE);

    let options = DetailsOptions {
        include_hierarchy: true,
        ..DetailsOptions::default()
    };
    let with_chain = geocoder
        .details(FeatureId(ids::HOUSE), &options)
        .await
        .unwrap();
    let chain: Vec<u64> = with_chain
        .hierarchy
        .unwrap()
        .iter()
        .map(|s| s.id.0)
        .collect();
    assert_eq!(chain, vec![ids::STREET, ids::CITY, ids::COUNTRY]);
}

#[tokio::test]
async fn category_search_filters_by_kind() {
    let geocoder = fixture_geocoder();
    let near = Near::Point {
        center: LatLon::new(50.1, 4.1),
        radius_m: 20_000.0,
    };
    let results = geocoder
        .search_category(&["amenity/restaurant".to_owned()], near, &SearchOptions::default())
        .await
        .expect("category search should work");
    assert!(results.iter().any(|r| r.id().0 == ids::RESTAURANT));
    assert!(
        results.iter().all(|r| r.id().0 != ids::CAFE),
        "a cafe is not a restaurant"
    );
}

#[tokio::test]
async fn category_search_accepts_bare_class() {
    let geocoder = fixture_geocoder();
    let near = Near::Point {
        center: LatLon::new(50.1, 4.1),
        radius_m: 20_000.0,
    };
    let results = geocoder
        .search_category(&["amenity".to_owned()], near, &SearchOptions::default())
        .await
        .unwrap();
    let found: Vec<u64> = results.iter().map(|r| r.id().0).collect();
    assert!(found.contains(&ids::RESTAURANT));
    assert!(found.contains(&ids::CAFE));
}

#[tokio::test]
async fn status_reflects_store_health() {
    let geocoder = fixture_geocoder();
    let report = geocoder.status().await.unwrap();
    assert_eq!(report.health, Health::Ok);
    assert!(report.feature_count > 0);
    assert!(!report.store_version.is_empty());

    let empty = MemoryGazetteer::builder("empty-1").build().unwrap();
    let geocoder = Geocoder::new(Arc::new(empty));
    let report = geocoder.status().await.unwrap();
    assert_eq!(report.health, Health::Degraded);
    assert_eq!(report.feature_count, 0);
}

#[tokio::test]
async fn all_addresses_have_strictly_decreasing_ranks() {
    let geocoder = fixture_geocoder();
    let results = geocoder
        .search("example", &SearchOptions::default())
        .await
        .unwrap();
    for result in &results {
        let ranks: Vec<u8> = result.address().parts().iter().map(|p| p.rank).collect();
        assert!(
            ranks.windows(2).all(|w| w[0] > w[1]),
            "ranks must strictly decrease, got {ranks:?} for {}",
            result.id()
        );
    }
}

#[tokio::test]
async fn shut_down_engine_rejects_new_requests() {
    let geocoder = fixture_geocoder();
    geocoder.shut_down();
    let err = geocoder
        .search("Example City", &SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrteliusError::Store(_)));
}

#[tokio::test]
async fn custom_config_flows_through() {
    setup_test_env();
    let store = example_country_store(&TestDataConfig::default()).unwrap();
    let config = GeocoderConfig::builder()
        .default_limit(2)
        .scoring()
        .prioritize_text_match()
        .done()
        .build();
    let geocoder = Geocoder::with_config(Arc::new(store), config);
    let results = geocoder
        .search("example", &SearchOptions::default())
        .await
        .unwrap();
    assert!(results.len() <= 2, "configured default limit applies");
}

#[tokio::test]
async fn store_trait_object_is_usable_directly() {
    // The boundary trait stays object-safe for custom store backends.
    let store: Arc<dyn GazetteerStore> =
        Arc::new(example_country_store(&TestDataConfig::minimal()).unwrap());
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.feature_count, 4);
}
