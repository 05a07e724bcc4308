//! Candidate relevance scoring.
//!
//! Retrieval produces an over-fetched candidate set; this module turns it
//! into comparable `[0, 1]` scores by blending four components: text match
//! quality, feature importance, affinity between the feature's address
//! rank and the rank the query shape implies, and distance to the spatial
//! anchor. Scores are only comparable within one response.

use ortelius_gazetteer::{Feature, normalize};
use rapidfuzz::distance::levenshtein;

use crate::tokenize::{Token, TokenizedQuery};

/// Component value used when a signal is absent for a candidate.
const NEUTRAL: f64 = 0.5;

/// Steepness of the sigmoid applied to z-normalized retrieval scores.
const Z_SCALE: f64 = 1.5;

/// Relevance weights for the four scoring components.
///
/// Must sum to approximately 1.0 so final scores stay in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    /// Weight for text match quality (default: 0.45)
    pub text: f64,
    /// Weight for feature importance (default: 0.25)
    pub importance: f64,
    /// Weight for address-rank affinity with the query shape (default: 0.15)
    pub rank_affinity: f64,
    /// Weight for distance to the spatial anchor (default: 0.15)
    pub distance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            text: 0.45,
            importance: 0.25,
            rank_affinity: 0.15,
            distance: 0.15,
        }
    }
}

/// One retrieved feature on its way through scoring and assembly.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub feature: Feature,
    /// Raw retrieval score from the store; comparable only within one
    /// retrieval batch.
    pub pre_score: f32,
    /// Metres to the spatial anchor, when the request has one.
    pub distance_m: Option<f64>,
    /// Final relevance, filled in by [`Scorer`].
    pub score: f64,
}

impl Candidate {
    pub(crate) fn new(feature: Feature, pre_score: f32) -> Self {
        Self {
            feature,
            pre_score,
            distance_m: None,
            score: 0.0,
        }
    }

    pub(crate) fn with_distance(mut self, distance_m: f64) -> Self {
        self.distance_m = Some(distance_m);
        self
    }
}

/// Applies [`ScoreWeights`] to a batch of candidates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scorer {
    weights: ScoreWeights,
    /// Distance at which the distance component decays to one half.
    distance_scale_m: f64,
}

impl Scorer {
    pub(crate) fn new(weights: ScoreWeights, distance_scale_m: f64) -> Self {
        Self {
            weights,
            distance_scale_m: distance_scale_m.max(1.0),
        }
    }

    /// Score a text-search batch against the tokenized query.
    pub(crate) fn score_text_batch(&self, candidates: &mut [Candidate], query: &TokenizedQuery) {
        let pre = z_sigmoid(candidates);
        let implied = query.implied_rank();
        let tokens: Vec<&Token> = query
            .words
            .iter()
            .chain(&query.house_number)
            .chain(&query.postcode)
            .collect();
        for (candidate, pre_component) in candidates.iter_mut().zip(pre) {
            let text = text_component(&candidate.feature, &tokens, pre_component);
            candidate.score = self.combine(candidate, text, implied);
        }
    }

    /// Score a category batch. Every candidate already matches the
    /// requested kind, so the text component is saturated and ranking is
    /// carried by importance and distance.
    pub(crate) fn score_category_batch(&self, candidates: &mut [Candidate]) {
        for candidate in candidates.iter_mut() {
            candidate.score = self.combine(candidate, 1.0, None);
        }
    }

    fn combine(&self, candidate: &Candidate, text: f64, implied_rank: Option<u8>) -> f64 {
        let affinity = rank_affinity(candidate.feature.address_rank, implied_rank);
        let distance = match candidate.distance_m {
            Some(d) => 1.0 / (1.0 + d / self.distance_scale_m),
            None => NEUTRAL,
        };
        let score = self.weights.text * text
            + self.weights.importance * candidate.feature.importance
            + self.weights.rank_affinity * affinity
            + self.weights.distance * distance;
        score.clamp(0.0, 1.0)
    }
}

/// How well the feature's address rank matches the rank the query shape
/// implies. A query with a house number wants house-level features; one
/// with no shape signal treats all ranks neutrally.
fn rank_affinity(address_rank: u8, implied: Option<u8>) -> f64 {
    match implied {
        Some(rank) => 1.0 - f64::from(address_rank.abs_diff(rank)) / 30.0,
        None => NEUTRAL,
    }
}

/// Text match quality in `[0, 1]`.
///
/// An exact match between the joined query and a normalized feature term
/// wins outright; otherwise the weighted per-token best edit similarity
/// against the feature's terms is blended with the batch-relative
/// retrieval score. Token weights let a postcode count for more than a
/// house number.
fn text_component(feature: &Feature, tokens: &[&Token], pre_component: f64) -> f64 {
    if tokens.is_empty() {
        return NEUTRAL;
    }
    let terms = feature_terms(feature);
    let joined = tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if terms.iter().any(|t| *t == joined) {
        return 1.0;
    }

    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for token in tokens {
        let weight = f64::from(token.weight);
        if weight <= 0.0 {
            continue;
        }
        let best = terms
            .iter()
            .flat_map(|term| term.split(' '))
            .map(|word| levenshtein::normalized_similarity(token.text.chars(), word.chars()))
            .fold(0.0_f64, f64::max);
        total += weight * best;
        weight_sum += weight;
    }
    if weight_sum <= 0.0 {
        return NEUTRAL;
    }
    let fuzzy = total / weight_sum;
    (0.5 * (fuzzy + pre_component)).clamp(0.0, 1.0)
}

/// Normalized text every candidate can be matched against: all of its
/// names plus the address tags that show up in typed queries.
fn feature_terms(feature: &Feature) -> Vec<String> {
    const ADDRESS_KEYS: [&str; 5] = ["housenumber", "street", "postcode", "city", "suburb"];
    let mut terms: Vec<String> = feature.names.values().map(|name| normalize(name)).collect();
    for key in ADDRESS_KEYS {
        if let Some(value) = feature.address_tag(key) {
            terms.push(normalize(value));
        }
    }
    terms
}

/// Z-normalize raw retrieval scores within the batch and squash through a
/// sigmoid, so one outlier store score cannot dominate.
fn z_sigmoid(candidates: &[Candidate]) -> Vec<f64> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let n = candidates.len() as f64;
    let mean = candidates.iter().map(|c| f64::from(c.pre_score)).sum::<f64>() / n;
    let variance = candidates
        .iter()
        .map(|c| (f64::from(c.pre_score) - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    let std = if std > 0.0 { std } else { 1.0 };
    candidates
        .iter()
        .map(|c| {
            let z = (f64::from(c.pre_score) - mean) / std;
            1.0 / (1.0 + (-Z_SCALE * z).exp())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ortelius_gazetteer::{FeatureId, FeatureKind, LatLon};

    use super::*;

    fn city(id: u64, name: &str, importance: f64) -> Feature {
        Feature::new(FeatureId(id), FeatureKind::new("place", "city"))
            .with_name("name", name)
            .with_centroid(LatLon::new(50.0, 4.0))
            .with_ranks(16, 8)
            .with_importance(importance)
    }

    fn text_for(feature: &Feature, raw: &str) -> f64 {
        let query = TokenizedQuery::parse(raw).unwrap();
        let tokens: Vec<&Token> = query
            .words
            .iter()
            .chain(&query.house_number)
            .chain(&query.postcode)
            .collect();
        text_component(feature, &tokens, 0.5)
    }

    #[test]
    fn exact_name_match_saturates_text() {
        let feature = city(1, "Example City", 0.3);
        assert!((text_for(&feature, "Example City") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn typo_scores_below_exact_but_high() {
        let feature = city(1, "Example City", 0.3);
        let exact = text_for(&feature, "Example City");
        let typo = text_for(&feature, "example cty");
        assert!(typo < exact);
        assert!(typo > 0.6, "one-typo match should stay strong, got {typo}");
    }

    #[test]
    fn rank_affinity_prefers_implied_rank() {
        assert!((rank_affinity(30, Some(30)) - 1.0).abs() < f64::EPSILON);
        assert!(rank_affinity(8, Some(30)) < rank_affinity(26, Some(30)));
        assert!((rank_affinity(8, None) - NEUTRAL).abs() < f64::EPSILON);
    }

    #[test]
    fn text_batch_ranks_exact_match_first() {
        let query = TokenizedQuery::parse("example city").unwrap();
        let mut candidates = vec![
            Candidate::new(city(1, "Example City", 0.4), 9.0),
            Candidate::new(city(2, "Exampleville", 0.4), 5.0),
        ];
        Scorer::new(ScoreWeights::default(), 10_000.0).score_text_batch(&mut candidates, &query);
        assert!(candidates[0].score > candidates[1].score);
        assert!(candidates.iter().all(|c| (0.0..=1.0).contains(&c.score)));
    }

    #[test]
    fn category_batch_ranks_by_importance_and_distance() {
        let mut candidates = vec![
            Candidate::new(city(1, "Near and dull", 0.1), 0.0).with_distance(100.0),
            Candidate::new(city(2, "Far and famous", 0.9), 0.0).with_distance(40_000.0),
            Candidate::new(city(3, "Near and famous", 0.9), 0.0).with_distance(100.0),
        ];
        Scorer::new(ScoreWeights::default(), 10_000.0).score_category_batch(&mut candidates);
        assert!(candidates[2].score > candidates[0].score);
        assert!(candidates[2].score > candidates[1].score);
    }

    #[test]
    fn z_sigmoid_is_order_preserving() {
        let candidates = vec![
            Candidate::new(city(1, "a", 0.5), 1.0),
            Candidate::new(city(2, "b", 0.5), 3.0),
            Candidate::new(city(3, "c", 0.5), 2.0),
        ];
        let squashed = z_sigmoid(&candidates);
        assert!(squashed[1] > squashed[2] && squashed[2] > squashed[0]);
        assert!(squashed.iter().all(|s| (0.0..=1.0).contains(s)));
    }
}
