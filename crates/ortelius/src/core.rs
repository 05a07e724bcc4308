//! The geocoding engine's public surface.
//!
//! [`Geocoder`] wires the pipeline together: tokenize, retrieve, score,
//! resolve addresses, assemble. Every operation opens one pooled
//! [`Session`](crate::session::Session), suspends only at store calls and
//! releases its pool permit on any exit path. [`BlockingGeocoder`] wraps
//! the same engine for callers without an async runtime.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ortelius::{BlockingGeocoder, SearchOptions};
//! use ortelius_gazetteer::test_data::{TestDataConfig, example_country_store};
//!
//! let store = example_country_store(&TestDataConfig::default())?;
//! let geocoder = BlockingGeocoder::new(Arc::new(store))?;
//!
//! let results = geocoder.search("Example City", &SearchOptions::default())?;
//! assert_eq!(results[0].name(), Some("Example City"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use ortelius_gazetteer::{Feature, FeatureId, GazetteerStore, LatLon, normalize_tokens};
use tracing::{info, instrument};

use crate::{
    address::AddressResolver,
    assemble::{assemble, effective_limit},
    config::GeocoderConfig,
    error::{InputError, OrteliusError, Result},
    options::{
        DetailsOptions, FINEST_RANK, LookupOptions, Near, ReverseOptions, SearchOptions,
        StructuredQuery,
    },
    results::{
        PlaceDetails, PlaceSummary, ResolvedPlace, ReverseResult, SearchResult, StatusReport,
    },
    retrieve::{Retriever, TextScope},
    score::{Candidate, Scorer},
    session::{Session, SessionPool},
    tokenize::TokenizedQuery,
};

/// Distance-decay scale used when a request carries no spatial anchor.
const DEFAULT_DISTANCE_SCALE_M: f64 = 10_000.0;

/// The async geocoding engine.
///
/// Cheap to share behind an `Arc`; all methods take `&self` and requests
/// never observe each other's state. Construction is synchronous and
/// performs no I/O; call [`Geocoder::warm_up`] to verify the store before
/// serving traffic.
pub struct Geocoder {
    pool: SessionPool,
    config: GeocoderConfig,
}

impl Geocoder {
    pub fn new(store: Arc<dyn GazetteerStore>) -> Self {
        Self::with_config(store, GeocoderConfig::default())
    }

    pub fn with_config(store: Arc<dyn GazetteerStore>, config: GeocoderConfig) -> Self {
        info!(
            max_sessions = config.pool.max_sessions,
            default_limit = config.default_limit,
            "geocoder created"
        );
        Self {
            pool: SessionPool::new(store, config.pool),
            config,
        }
    }

    /// Verify the store answers and carries data. Runs once; later calls
    /// are free.
    pub async fn warm_up(&self) -> Result<()> {
        self.pool.warm_up().await
    }

    /// Stop accepting new requests. In-flight requests finish normally.
    pub fn shut_down(&self) {
        self.pool.shut_down();
    }

    /// Engine and store liveness.
    pub async fn status(&self) -> Result<StatusReport> {
        self.pool.status().await
    }

    /// Full introspection of a single feature.
    ///
    /// Returns [`OrteliusError::NotFound`] for an unknown identifier.
    #[instrument(level = "debug", skip(self, options))]
    pub async fn details(&self, id: FeatureId, options: &DetailsOptions) -> Result<PlaceDetails> {
        let session = self.pool.open().await?;
        let feature = session
            .run("feature", session.store().feature(id))
            .await?
            .ok_or(OrteliusError::NotFound(id))?;
        let hierarchy = if options.include_hierarchy {
            let resolver = AddressResolver::new(&session);
            Some(
                resolver
                    .hierarchy(&feature, options.language.as_deref())
                    .await?,
            )
        } else {
            None
        };
        Ok(PlaceDetails { feature, hierarchy })
    }

    /// Resolve a batch of identifiers. Unknown identifiers are simply
    /// absent from the response; the output order follows the input.
    #[instrument(level = "debug", skip(self, options), fields(ids = ids.len()))]
    pub async fn lookup(
        &self,
        ids: &[FeatureId],
        options: &LookupOptions,
    ) -> Result<Vec<ResolvedPlace>> {
        let session = self.pool.open().await?;
        let features = session
            .run("features", session.store().features(ids))
            .await?;
        futures::future::try_join_all(
            features
                .iter()
                .map(|feature| self.resolved_place(&session, feature, options.language.as_deref())),
        )
        .await
    }

    /// Reverse geocoding: the finest feature at or around a coordinate.
    #[instrument(level = "debug", skip(self, options))]
    pub async fn reverse(&self, lat: f64, lon: f64, options: &ReverseOptions) -> Result<ReverseResult> {
        let point = LatLon::new(lat, lon);
        if !point.is_valid() {
            return Err(InputError::InvalidCoordinate { lat, lon }.into());
        }
        let max_rank = options.max_rank.min(FINEST_RANK);
        let ceiling = options
            .radius_ceiling_m
            .unwrap_or(self.config.retrieval.reverse_radius_ceiling_m);

        let session = self.pool.open().await?;
        let retriever = Retriever::new(&session, self.config.retrieval);
        let (feature, distance_m) = retriever.point_candidate(point, max_rank, ceiling).await?;
        let resolved = self
            .resolved_place(&session, &feature, options.language.as_deref())
            .await?;
        Ok(ReverseResult {
            resolved,
            distance_m,
        })
    }

    /// Free-text forward search.
    #[instrument(level = "debug", skip(self, options))]
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let tokenized = TokenizedQuery::parse(query)?;
        self.run_text_search(tokenized, options).await
    }

    /// Structured forward search over pre-separated address fields.
    ///
    /// An entirely empty query is an input error.
    #[instrument(level = "debug", skip_all)]
    pub async fn search_address(
        &self,
        query: &StructuredQuery,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if query.is_empty() {
            return Err(InputError::EmptyQuery.into());
        }
        let mut words = Vec::new();
        for field in [&query.street, &query.city, &query.region, &query.country] {
            if let Some(value) = field {
                words.extend(normalize_tokens(value));
            }
        }
        let house_number = query
            .house_number
            .as_deref()
            .map(normalize_tokens)
            .and_then(|mut t| (!t.is_empty()).then(|| t.swap_remove(0)));
        let postcode = query.postcode.as_deref().map(|p| {
            let tokens = normalize_tokens(p);
            tokens.join(" ")
        });
        let postcode = postcode.filter(|p| !p.is_empty());
        if words.is_empty() && house_number.is_none() && postcode.is_none() {
            return Err(InputError::EmptyQuery.into());
        }
        let tokenized = TokenizedQuery::from_parts(words, house_number, postcode);
        self.run_text_search(tokenized, options).await
    }

    /// Nameless search for features of the given kinds near an anchor.
    ///
    /// Kind patterns take the form `"amenity"` or `"amenity/restaurant"`.
    #[instrument(level = "debug", skip(self, options), fields(categories = categories.len()))]
    pub async fn search_category(
        &self,
        categories: &[String],
        near: Near,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if categories.iter().all(|c| c.trim().is_empty()) {
            return Err(InputError::EmptyCategories.into());
        }
        let scale = match near {
            Near::Point { center, radius_m } => {
                if !center.is_valid() {
                    return Err(InputError::InvalidCoordinate {
                        lat: center.lat,
                        lon: center.lon,
                    }
                    .into());
                }
                radius_m.max(1.0)
            }
            Near::Viewbox(vb) => {
                crate::options::validate_viewbox(&vb)?;
                vb.center().distance_m(&LatLon::new(vb.max_lat, vb.max_lon))
            }
        };
        let limit = effective_limit(options.limit, self.config.default_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let session = self.pool.open().await?;
        let retriever = Retriever::new(&session, self.config.retrieval);
        let mut candidates = retriever.category_candidates(categories, near, limit).await?;
        Scorer::new(self.config.weights, scale).score_category_batch(&mut candidates);
        let picked = assemble(candidates, limit);
        self.build_search_results(&session, picked, options.language.as_deref())
            .await
    }

    async fn run_text_search(
        &self,
        tokenized: TokenizedQuery,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let viewbox = options.validated_viewbox()?;
        let limit = effective_limit(options.limit, self.config.default_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let scope = TextScope {
            viewbox,
            bounded: options.bounded,
            countries: options.normalized_countries(),
        };

        let session = self.pool.open().await?;
        let retriever = Retriever::new(&session, self.config.retrieval);
        let mut candidates = retriever.text_candidates(tokenized.clone(), &scope).await?;

        // With a viewbox the box center acts as the spatial anchor.
        let scale = match viewbox {
            Some(vb) => {
                let center = vb.center();
                for candidate in &mut candidates {
                    let d = center.distance_m(&candidate.feature.centroid());
                    candidate.distance_m = Some(d);
                }
                center
                    .distance_m(&LatLon::new(vb.max_lat, vb.max_lon))
                    .max(1.0)
            }
            None => DEFAULT_DISTANCE_SCALE_M,
        };
        Scorer::new(self.config.weights, scale).score_text_batch(&mut candidates, &tokenized);
        let picked = assemble(candidates, limit);
        self.build_search_results(&session, picked, options.language.as_deref())
            .await
    }

    async fn build_search_results(
        &self,
        session: &Session,
        picked: Vec<Candidate>,
        language: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let resolved = futures::future::try_join_all(
            picked
                .iter()
                .map(|candidate| self.resolved_place(session, &candidate.feature, language)),
        )
        .await?;
        Ok(resolved
            .into_iter()
            .zip(picked)
            .map(|(resolved, candidate)| SearchResult {
                resolved,
                score: candidate.score,
            })
            .collect())
    }

    async fn resolved_place(
        &self,
        session: &Session,
        feature: &Feature,
        language: Option<&str>,
    ) -> Result<ResolvedPlace> {
        let resolver = AddressResolver::new(session);
        let address = resolver.resolve(feature, language).await?;
        Ok(ResolvedPlace {
            place: PlaceSummary::from_feature(feature, language),
            address,
        })
    }
}

/// Synchronous facade over [`Geocoder`].
///
/// Owns a private multi-threaded runtime; each call blocks the calling
/// thread until the engine finishes. Suitable for CLIs and tests.
pub struct BlockingGeocoder {
    runtime: tokio::runtime::Runtime,
    inner: Geocoder,
}

impl BlockingGeocoder {
    pub fn new(store: Arc<dyn GazetteerStore>) -> Result<Self> {
        Self::with_config(store, GeocoderConfig::default())
    }

    pub fn with_config(store: Arc<dyn GazetteerStore>, config: GeocoderConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| OrteliusError::Config(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            runtime,
            inner: Geocoder::with_config(store, config),
        })
    }

    pub fn warm_up(&self) -> Result<()> {
        self.runtime.block_on(self.inner.warm_up())
    }

    pub fn shut_down(&self) {
        self.inner.shut_down();
    }

    pub fn status(&self) -> Result<StatusReport> {
        self.runtime.block_on(self.inner.status())
    }

    pub fn details(&self, id: FeatureId, options: &DetailsOptions) -> Result<PlaceDetails> {
        self.runtime.block_on(self.inner.details(id, options))
    }

    pub fn lookup(&self, ids: &[FeatureId], options: &LookupOptions) -> Result<Vec<ResolvedPlace>> {
        self.runtime.block_on(self.inner.lookup(ids, options))
    }

    pub fn reverse(&self, lat: f64, lon: f64, options: &ReverseOptions) -> Result<ReverseResult> {
        self.runtime.block_on(self.inner.reverse(lat, lon, options))
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.runtime.block_on(self.inner.search(query, options))
    }

    pub fn search_address(
        &self,
        query: &StructuredQuery,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        self.runtime
            .block_on(self.inner.search_address(query, options))
    }

    pub fn search_category(
        &self,
        categories: &[String],
        near: Near,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        self.runtime
            .block_on(self.inner.search_category(categories, near, options))
    }
}
