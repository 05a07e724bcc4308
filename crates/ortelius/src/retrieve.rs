//! Candidate retrieval against the gazetteer store.
//!
//! Two retrieval modes feed the scorer: text mode walks the query's
//! decomposition sequence and merges the per-decomposition hits, point
//! mode combines polygon containment with expanding nearest-feature
//! probes. Transient store faults are retried exactly once with reduced
//! scope (half the hit budget, half the radius); retry policy lives here
//! and in the session layer only.

use ahash::AHashMap;
use ortelius_gazetteer::{BoundingBox, Feature, FeatureId, LatLon, TokenQuery};
use tracing::{debug, instrument, warn};

use crate::{
    config::RetrievalLimits,
    error::{OrteliusError, Result},
    options::Near,
    score::Candidate,
    session::Session,
    tokenize::{Token, TokenKind, TokenizedQuery},
};

/// Over-fetch multiplier for category probes, which are filtered by kind
/// engine-side after the store returns purely spatial hits.
const CATEGORY_FETCH_FACTOR: usize = 4;

/// Spatial restrictions applied during text retrieval.
#[derive(Debug, Clone, Default)]
pub(crate) struct TextScope {
    pub viewbox: Option<BoundingBox>,
    pub bounded: bool,
    pub countries: Vec<String>,
}

pub(crate) struct Retriever<'a> {
    session: &'a Session,
    limits: RetrievalLimits,
}

impl<'a> Retriever<'a> {
    pub(crate) fn new(session: &'a Session, limits: RetrievalLimits) -> Self {
        Self { session, limits }
    }

    /// Text-mode retrieval: run every decomposition of the query against
    /// the token index and merge hits by feature, keeping the best
    /// pre-score seen for each.
    #[instrument(level = "debug", skip_all, fields(decompositions = self.limits.max_decompositions))]
    pub(crate) async fn text_candidates(
        &self,
        query: TokenizedQuery,
        scope: &TextScope,
    ) -> Result<Vec<Candidate>> {
        let mut merged: AHashMap<FeatureId, Candidate> = AHashMap::new();
        for decomposition in query.decompositions(self.limits.max_decompositions) {
            let (tokens, phrases) = split_tokens(&decomposition);
            let token_query = TokenQuery {
                tokens,
                phrases,
                viewbox: scope.viewbox,
                bounded: scope.bounded,
                kinds: Vec::new(),
                countries: scope.countries.clone(),
                limit: self.limits.per_decomposition,
            };
            let hits = self.search_tokens(&token_query).await?;
            debug!(
                tokens = ?token_query.tokens,
                phrases = ?token_query.phrases,
                hits = hits.len(),
                "decomposition retrieved"
            );
            for hit in hits {
                merged
                    .entry(hit.feature.id)
                    .and_modify(|c| c.pre_score = c.pre_score.max(hit.pre_score))
                    .or_insert_with(|| Candidate::new(hit.feature, hit.pre_score));
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Point-mode retrieval for reverse lookups.
    ///
    /// Containment gives the finest polygon the point lies in (distance
    /// zero). Point features finer than any polygon are found by nearest
    /// probes; with a containing polygon in hand only the initial (door
    /// step) radius is probed, so a house forty kilometres away never
    /// outranks the town the point is in. Without containment the probe
    /// expands up to the ceiling. Returns the finest feature overall with
    /// its distance, or `NoCoverage` when nothing lies within the ceiling.
    #[instrument(level = "debug", skip(self))]
    pub(crate) async fn point_candidate(
        &self,
        point: LatLon,
        max_rank: u8,
        radius_ceiling_m: f64,
    ) -> Result<(Feature, f64)> {
        let contained = self.containing(point, max_rank).await?;
        let mut best: Option<(Feature, f64)> = contained.into_iter().next().map(|f| (f, 0.0));

        let mut radius = self.limits.reverse_initial_radius_m.min(radius_ceiling_m);
        loop {
            let hits = self.nearest(point, radius, max_rank).await?;
            if let Some(hit) = hits.into_iter().min_by(|a, b| {
                b.feature
                    .address_rank
                    .cmp(&a.feature.address_rank)
                    .then_with(|| a.distance_m.total_cmp(&b.distance_m))
                    .then_with(|| a.feature.id.cmp(&b.feature.id))
            }) {
                let finer = best
                    .as_ref()
                    .is_none_or(|(f, _)| hit.feature.address_rank > f.address_rank);
                if finer {
                    best = Some((hit.feature, hit.distance_m));
                }
                break;
            }
            // A containing polygon only yields to a finer feature right
            // at the point; never widen the probe past the first step
            // once one exists.
            if best.is_some() || radius >= radius_ceiling_m {
                break;
            }
            radius = (radius * self.limits.reverse_radius_growth).min(radius_ceiling_m);
        }

        best.ok_or(OrteliusError::NoCoverage {
            lat: point.lat,
            lon: point.lon,
            radius_m: radius_ceiling_m,
        })
    }

    /// Category retrieval: purely spatial probes around the anchor,
    /// filtered by kind engine-side.
    #[instrument(level = "debug", skip(self, kinds), fields(kinds = kinds.len()))]
    pub(crate) async fn category_candidates(
        &self,
        kinds: &[String],
        near: Near,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let (center, radius_m) = match near {
            Near::Point { center, radius_m } => (center, radius_m),
            // A box becomes a probe from its center out to the far corner.
            Near::Viewbox(vb) => {
                let center = vb.center();
                let corner = LatLon::new(vb.max_lat, vb.max_lon);
                (center, center.distance_m(&corner))
            }
        };

        let fetch = limit.saturating_mul(CATEGORY_FETCH_FACTOR).max(limit);
        let hits = self
            .nearest_fetch(center, radius_m, u8::MAX, fetch)
            .await?;
        let candidates = hits
            .into_iter()
            .filter(|hit| kinds.iter().any(|k| hit.feature.kind.matches(k)))
            .filter(|hit| match near {
                Near::Viewbox(vb) => vb.contains(hit.feature.centroid()),
                Near::Point { .. } => true,
            })
            .map(|hit| Candidate::new(hit.feature, 0.0).with_distance(hit.distance_m))
            .collect();
        Ok(candidates)
    }

    async fn search_tokens(
        &self,
        query: &TokenQuery,
    ) -> Result<Vec<ortelius_gazetteer::TextHit>> {
        let store = self.session.store();
        match self
            .session
            .run("search_tokens", store.search_tokens(query))
            .await
        {
            Ok(hits) => Ok(hits),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "token search failed, retrying with reduced budget");
                let reduced = TokenQuery {
                    limit: (query.limit / 2).max(1),
                    ..query.clone()
                };
                self.session
                    .run("search_tokens_retry", store.search_tokens(&reduced))
                    .await
            }
            Err(err) => Err(err),
        }
    }

    async fn containing(&self, point: LatLon, max_rank: u8) -> Result<Vec<Feature>> {
        let store = self.session.store();
        match self
            .session
            .run("containing", store.containing(point, 0, max_rank))
            .await
        {
            Ok(features) => Ok(features),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "containment query failed, retrying once");
                self.session
                    .run("containing_retry", store.containing(point, 0, max_rank))
                    .await
            }
            Err(err) => Err(err),
        }
    }

    async fn nearest(
        &self,
        point: LatLon,
        radius_m: f64,
        max_rank: u8,
    ) -> Result<Vec<ortelius_gazetteer::NearbyHit>> {
        self.nearest_fetch(point, radius_m, max_rank, self.limits.nearest_probe_limit)
            .await
    }

    async fn nearest_fetch(
        &self,
        point: LatLon,
        radius_m: f64,
        max_rank: u8,
        limit: usize,
    ) -> Result<Vec<ortelius_gazetteer::NearbyHit>> {
        let store = self.session.store();
        match self
            .session
            .run("nearest", store.nearest(point, radius_m, max_rank, limit))
            .await
        {
            Ok(hits) => Ok(hits),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "nearest query failed, retrying with half the radius");
                self.session
                    .run(
                        "nearest_retry",
                        store.nearest(point, radius_m / 2.0, max_rank, limit),
                    )
                    .await
            }
            Err(err) => Err(err),
        }
    }
}

/// Multi-word phrase groupings go to the store as phrases (adjacent, in
/// order); everything else is flattened to individual index tokens.
fn split_tokens(decomposition: &[Token]) -> (Vec<String>, Vec<String>) {
    let mut tokens = Vec::new();
    let mut phrases = Vec::new();
    for token in decomposition {
        if token.kind == TokenKind::Phrase && token.text.contains(' ') {
            phrases.push(token.text.clone());
        } else {
            tokens.extend(token.store_tokens().map(str::to_owned));
        }
    }
    (tokens, phrases)
}
