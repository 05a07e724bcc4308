//! In-process reference implementation of [`GazetteerStore`].
//!
//! Text search runs over an in-RAM Tantivy index, spatial queries over an
//! R-tree of feature envelopes with exact point-in-polygon confirmation.
//! Suitable for tests and for small, fully-memory-resident gazetteers; a
//! production deployment would put the same trait over its database.

use ahash::AHashMap as HashMap;
use geo::{Contains, MultiPolygon, Point};
use rstar::{AABB, PointDistance, RTree, RTreeObject};
use tantivy::{
    Index, IndexReader, TantivyDocument, Term,
    collector::TopDocs,
    query::{BooleanQuery, FuzzyTermQuery, Occur, PhraseQuery, Query, TermQuery},
    schema::{FAST, Field, INDEXED, IndexRecordOption, STORED, Schema, SchemaBuilder, Value},
};
use tracing::{debug, info, instrument};

use crate::{
    error::{Result, StoreError},
    feature::{ContainmentEdge, Feature, FeatureId, LatLon},
    normalize::normalize,
    store::{GazetteerStore, NearbyHit, StoreStats, TextHit, TokenQuery},
};

/// Metres per degree of latitude, used for conservative degree-space cutoffs.
const M_PER_DEG: f64 = 111_320.0;

/// Boost applied to the pre-score of hits inside an unbounded viewbox.
const VIEWBOX_BIAS: f32 = 1.5;

/// An R-tree entry: envelope plus the data needed to pre-filter without
/// touching the feature map.
#[derive(Debug, Clone)]
struct SpatialEntry {
    id: FeatureId,
    envelope: AABB<[f64; 2]>,
    centroid: [f64; 2],
    address_rank: u8,
    has_polygon: bool,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for SpatialEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.centroid[0] - point[0];
        let dy = self.centroid[1] - point[1];
        dx * dx + dy * dy
    }
}

/// In-memory gazetteer store.
pub struct MemoryGazetteer {
    version: String,
    features: HashMap<FeatureId, Feature>,
    polygons: HashMap<FeatureId, MultiPolygon<f64>>,
    edges: HashMap<FeatureId, Vec<ContainmentEdge>>,
    rtree: RTree<SpatialEntry>,
    reader: IndexReader,
    id_field: Field,
    text_field: Field,
}

impl std::fmt::Debug for MemoryGazetteer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGazetteer")
            .field("version", &self.version)
            .field("features", &self.features.len())
            .finish_non_exhaustive()
    }
}

impl MemoryGazetteer {
    /// Start building a store with the given data version tag.
    pub fn builder(version: impl Into<String>) -> MemoryGazetteerBuilder {
        MemoryGazetteerBuilder {
            version: version.into(),
            features: Vec::new(),
            polygons: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    fn text_schema() -> (Schema, Field, Field) {
        let mut builder = SchemaBuilder::new();
        let id = builder.add_u64_field("feature_id", STORED | INDEXED | FAST);
        let text = builder.add_text_field("text", tantivy::schema::TEXT);
        (builder.build(), id, text)
    }

    /// Everything about a feature that should be findable by token search:
    /// every name variant plus the address tags users type.
    fn indexable_text(feature: &Feature) -> String {
        let mut parts: Vec<&str> = feature.names.values().map(String::as_str).collect();
        for key in ["housenumber", "street", "postcode", "city", "suburb"] {
            if let Some(value) = feature.address_tag(key) {
                parts.push(value);
            }
        }
        normalize(&parts.join(" "))
    }

    /// Each token must match, exactly or (for longer tokens) within edit
    /// distance one; each phrase must match with its words adjacent and in
    /// order. Near-misses surface with a lower BM25 score and get their
    /// edit penalty applied engine-side.
    fn token_query(&self, query: &TokenQuery) -> BooleanQuery {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = query
            .tokens
            .iter()
            .map(|token| {
                let term = Term::from_field_text(self.text_field, token);
                let exact = TermQuery::new(term.clone(), IndexRecordOption::WithFreqs);
                let clause: Box<dyn Query> = if token.chars().count() > 3 {
                    let fuzzy = FuzzyTermQuery::new(term, 1, true);
                    Box::new(BooleanQuery::new(vec![
                        (Occur::Should, Box::new(exact) as Box<dyn Query>),
                        (Occur::Should, Box::new(fuzzy)),
                    ]))
                } else {
                    Box::new(exact)
                };
                (Occur::Must, clause)
            })
            .collect();
        for phrase in &query.phrases {
            let terms: Vec<Term> = phrase
                .split(' ')
                .filter(|w| !w.is_empty())
                .map(|w| Term::from_field_text(self.text_field, w))
                .collect();
            let clause: Box<dyn Query> = if terms.len() > 1 {
                Box::new(PhraseQuery::new(terms))
            } else if let Some(term) = terms.into_iter().next() {
                Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
            } else {
                continue;
            };
            clauses.push((Occur::Must, clause));
        }
        BooleanQuery::new(clauses)
    }

    fn passes_filters(&self, feature: &Feature, query: &TokenQuery) -> bool {
        if !query.kinds.is_empty() && !query.kinds.iter().any(|k| feature.kind.matches(k)) {
            return false;
        }
        if !query.countries.is_empty() {
            match feature.country_code() {
                Some(cc) => {
                    if !query.countries.iter().any(|c| c == cc) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if query.bounded {
            if let Some(viewbox) = query.viewbox {
                return viewbox.contains(feature.centroid());
            }
        }
        true
    }
}

#[async_trait::async_trait]
impl GazetteerStore for MemoryGazetteer {
    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            version: self.version.clone(),
            feature_count: self.features.len() as u64,
        })
    }

    async fn feature(&self, id: FeatureId) -> Result<Option<Feature>> {
        Ok(self.features.get(&id).cloned())
    }

    async fn features(&self, ids: &[FeatureId]) -> Result<Vec<Feature>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.features.get(id).cloned())
            .collect())
    }

    #[instrument(level = "debug", skip_all, fields(tokens = ?query.tokens, limit = query.limit))]
    async fn search_tokens(&self, query: &TokenQuery) -> Result<Vec<TextHit>> {
        if (query.tokens.is_empty() && query.phrases.is_empty()) || query.limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let tantivy_query = self.token_query(query);
        // Over-fetch so post-filtering still fills the caller's limit.
        let fetch = query.limit.saturating_mul(4).max(16);
        let top_docs = searcher.search(&tantivy_query, &TopDocs::with_limit(fetch))?;
        debug!(raw_hits = top_docs.len(), "token index search complete");

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = doc
                .get_first(self.id_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    StoreError::Unavailable("text index document missing feature_id".into())
                })?;
            let Some(feature) = self.features.get(&FeatureId(id)) else {
                continue;
            };
            if !self.passes_filters(feature, query) {
                continue;
            }
            let mut pre_score = score;
            if !query.bounded {
                if let Some(viewbox) = query.viewbox {
                    if viewbox.contains(feature.centroid()) {
                        pre_score *= VIEWBOX_BIAS;
                    }
                }
            }
            hits.push(TextHit {
                feature: feature.clone(),
                pre_score,
            });
        }

        hits.sort_by(|a, b| b.pre_score.total_cmp(&a.pre_score));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn containing(
        &self,
        point: LatLon,
        min_rank: u8,
        max_rank: u8,
    ) -> Result<Vec<Feature>> {
        let query_point = [point.lon, point.lat];
        let envelope = AABB::from_point(query_point);
        let geo_point = Point::new(point.lon, point.lat);

        let mut matches: Vec<&Feature> = self
            .rtree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| {
                entry.has_polygon
                    && (min_rank..=max_rank).contains(&entry.address_rank)
            })
            .filter(|entry| {
                self.polygons
                    .get(&entry.id)
                    .is_some_and(|polygon| polygon.contains(&geo_point))
            })
            .filter_map(|entry| self.features.get(&entry.id))
            .collect();

        // Finest first, identifier as deterministic tail.
        matches.sort_by(|a, b| {
            b.address_rank
                .cmp(&a.address_rank)
                .then(a.id.cmp(&b.id))
        });
        Ok(matches.into_iter().cloned().collect())
    }

    async fn nearest(
        &self,
        point: LatLon,
        radius_m: f64,
        max_rank: u8,
        limit: usize,
    ) -> Result<Vec<NearbyHit>> {
        if limit == 0 || radius_m <= 0.0 {
            return Ok(Vec::new());
        }
        let query_point = [point.lon, point.lat];
        // Degree-space cutoff for the R-tree walk; generous on the
        // longitude shrink so nothing inside the radius is skipped.
        let cos_lat = point.lat.to_radians().cos().max(0.05);
        let cutoff_deg = radius_m / (M_PER_DEG * cos_lat);
        let cutoff_2 = cutoff_deg * cutoff_deg;

        let mut hits = Vec::new();
        for entry in self.rtree.nearest_neighbor_iter(&query_point) {
            if entry.distance_2(&query_point) > cutoff_2 {
                break;
            }
            if entry.address_rank > max_rank {
                continue;
            }
            let Some(feature) = self.features.get(&entry.id) else {
                continue;
            };
            let distance_m = point.distance_m(&feature.centroid());
            if distance_m <= radius_m {
                hits.push(NearbyHit {
                    feature: feature.clone(),
                    distance_m,
                });
            }
        }

        hits.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then(a.feature.id.cmp(&b.feature.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn parents(&self, id: FeatureId) -> Result<Vec<ContainmentEdge>> {
        Ok(self.edges.get(&id).cloned().unwrap_or_default())
    }
}

/// Builder collecting features, polygons and edges before indexing.
pub struct MemoryGazetteerBuilder {
    version: String,
    features: Vec<Feature>,
    polygons: HashMap<FeatureId, MultiPolygon<f64>>,
    edges: HashMap<FeatureId, Vec<ContainmentEdge>>,
}

impl MemoryGazetteerBuilder {
    #[must_use]
    pub fn feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Add a feature together with its full polygon geometry, making it
    /// eligible for containment queries.
    #[must_use]
    pub fn feature_with_polygon(mut self, feature: Feature, polygon: MultiPolygon<f64>) -> Self {
        self.polygons.insert(feature.id, polygon);
        self.features.push(feature);
        self
    }

    #[must_use]
    pub fn edge(mut self, edge: ContainmentEdge) -> Self {
        self.edges.entry(edge.child).or_default().push(edge);
        self
    }

    /// Index everything and produce the store.
    #[instrument(level = "info", skip_all, fields(version = self.version, features = self.features.len()))]
    pub fn build(self) -> Result<MemoryGazetteer> {
        let (schema, id_field, text_field) = MemoryGazetteer::text_schema();
        let index = Index::create_in_ram(schema);

        let mut writer = index.writer(50_000_000)?;
        for feature in &self.features {
            let mut doc = TantivyDocument::default();
            doc.add_u64(id_field, feature.id.0);
            doc.add_text(text_field, MemoryGazetteer::indexable_text(feature));
            writer.add_document(doc)?;
        }
        writer.commit()?;
        let reader = index.reader()?;

        let entries: Vec<SpatialEntry> = self
            .features
            .iter()
            .map(|feature| {
                let bbox = feature.geometry.bbox();
                let centroid = feature.centroid();
                SpatialEntry {
                    id: feature.id,
                    envelope: AABB::from_corners(
                        [bbox.min_lon, bbox.min_lat],
                        [bbox.max_lon, bbox.max_lat],
                    ),
                    centroid: [centroid.lon, centroid.lat],
                    address_rank: feature.address_rank,
                    has_polygon: self.polygons.contains_key(&feature.id),
                }
            })
            .collect();
        let rtree = RTree::bulk_load(entries);

        let features: HashMap<FeatureId, Feature> = self
            .features
            .into_iter()
            .map(|feature| (feature.id, feature))
            .collect();

        info!(features = features.len(), "memory gazetteer built");
        Ok(MemoryGazetteer {
            version: self.version,
            features,
            polygons: self.polygons,
            edges: self.edges,
            rtree,
            reader,
            id_field,
            text_field,
        })
    }
}
