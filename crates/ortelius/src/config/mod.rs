//! Process-wide engine configuration.
//!
//! Everything here is a policy tunable, not a contract: retrieval ceilings,
//! radius steps and scoring weights shape ranking quality and latency but
//! never correctness. [`GeocoderConfigBuilder`] provides ergonomic defaults
//! and presets.

use std::time::Duration;

use crate::{error::OrteliusError, score::ScoreWeights};

/// Ceilings on candidate retrieval volume.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalLimits {
    /// Top-K text hits fetched per token decomposition.
    pub per_decomposition: usize,
    /// Maximum decompositions tried per query.
    pub max_decompositions: usize,
    /// First reverse-fallback radius in metres.
    pub reverse_initial_radius_m: f64,
    /// Multiplier between successive fallback radii.
    pub reverse_radius_growth: f64,
    /// Default ceiling on the reverse search radius in metres.
    pub reverse_radius_ceiling_m: f64,
    /// Hits fetched per nearest-feature probe.
    pub nearest_probe_limit: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            per_decomposition: 30,
            max_decompositions: 8,
            reverse_initial_radius_m: 100.0,
            reverse_radius_growth: 4.0,
            reverse_radius_ceiling_m: 50_000.0,
            nearest_probe_limit: 10,
        }
    }
}

/// Session pool sizing and per-operation store timeouts.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// How many requests may be mid-flight against the store at once;
    /// further requests queue at session-open time.
    pub max_sessions: usize,
    /// Timeout applied to each individual store operation.
    pub store_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 16,
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// Result count used when a request does not specify one.
    pub default_limit: usize,
    pub retrieval: RetrievalLimits,
    pub weights: ScoreWeights,
    pub pool: PoolConfig,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            retrieval: RetrievalLimits::default(),
            weights: ScoreWeights::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl GeocoderConfig {
    pub fn builder() -> GeocoderConfigBuilder {
        GeocoderConfigBuilder::default()
    }
}

/// Builder for creating engine configurations with ergonomic defaults.
#[derive(Debug, Clone, Default)]
pub struct GeocoderConfigBuilder {
    config: GeocoderConfig,
}

impl GeocoderConfigBuilder {
    /// Create a new builder with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset optimized for latency: fewer candidates, smaller radii.
    pub fn fast() -> Self {
        let mut builder = Self::new();
        builder.config.retrieval.per_decomposition = 15;
        builder.config.retrieval.max_decompositions = 4;
        builder.config.retrieval.reverse_radius_ceiling_m = 10_000.0;
        builder.config.pool.store_timeout = Duration::from_secs(1);
        builder
    }

    /// Preset optimized for recall: more candidates, wider radii.
    pub fn comprehensive() -> Self {
        let mut builder = Self::new();
        builder.config.retrieval.per_decomposition = 100;
        builder.config.retrieval.max_decompositions = 12;
        builder.config.retrieval.reverse_radius_ceiling_m = 100_000.0;
        builder
    }

    /// Set the result count used when a request does not specify one.
    pub fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    /// Set the top-K text hits fetched per decomposition.
    pub fn per_decomposition(mut self, k: usize) -> Self {
        self.config.retrieval.per_decomposition = k.max(1);
        self
    }

    /// Set the maximum number of decompositions tried per query.
    pub fn max_decompositions(mut self, n: usize) -> Self {
        self.config.retrieval.max_decompositions = n.max(1);
        self
    }

    /// Set the default ceiling on the reverse search radius.
    pub fn reverse_radius_ceiling_m(mut self, metres: f64) -> Self {
        self.config.retrieval.reverse_radius_ceiling_m = metres.max(1.0);
        self
    }

    /// Set the session pool size.
    pub fn max_sessions(mut self, n: usize) -> Self {
        self.config.pool.max_sessions = n.max(1);
        self
    }

    /// Set the per-operation store timeout.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool.store_timeout = timeout;
        self
    }

    /// Configure scoring weights.
    pub fn scoring(self) -> ScoringBuilder {
        ScoringBuilder { parent: self }
    }

    /// Build the final configuration.
    pub fn build(self) -> GeocoderConfig {
        self.config
    }
}

/// Builder for relevance-scoring weights.
pub struct ScoringBuilder {
    parent: GeocoderConfigBuilder,
}

impl ScoringBuilder {
    /// Prioritize text-match quality over other factors.
    pub fn prioritize_text_match(mut self) -> Self {
        self.parent.config.weights = ScoreWeights {
            text: 0.6,
            importance: 0.2,
            rank_affinity: 0.1,
            distance: 0.1,
        };
        self
    }

    /// Prioritize feature prominence over text match.
    pub fn prioritize_importance(mut self) -> Self {
        self.parent.config.weights = ScoreWeights {
            text: 0.3,
            importance: 0.45,
            rank_affinity: 0.1,
            distance: 0.15,
        };
        self
    }

    /// Set custom weights (must sum to approximately 1.0).
    pub fn custom_weights(
        mut self,
        text: f64,
        importance: f64,
        rank_affinity: f64,
        distance: f64,
    ) -> Result<Self, OrteliusError> {
        let total = text + importance + rank_affinity + distance;
        if (total - 1.0).abs() > 0.1 {
            return Err(OrteliusError::Config(format!(
                "scoring weights must sum to approximately 1.0, got {total}"
            )));
        }
        self.parent.config.weights = ScoreWeights {
            text,
            importance,
            rank_affinity,
            distance,
        };
        Ok(self)
    }

    /// Return to the main configuration builder.
    pub fn done(self) -> GeocoderConfigBuilder {
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builder() {
        let config = GeocoderConfigBuilder::new().build();
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.retrieval.per_decomposition, 30);
        assert_eq!(config.pool.max_sessions, 16);
    }

    #[test]
    fn fast_preset() {
        let config = GeocoderConfigBuilder::fast().build();
        assert_eq!(config.retrieval.per_decomposition, 15);
        assert_eq!(config.retrieval.max_decompositions, 4);
        assert_eq!(config.pool.store_timeout, Duration::from_secs(1));
    }

    #[test]
    fn comprehensive_preset() {
        let config = GeocoderConfigBuilder::comprehensive().build();
        assert_eq!(config.retrieval.per_decomposition, 100);
        assert!(config.retrieval.reverse_radius_ceiling_m > 50_000.0);
    }

    #[test]
    fn method_chaining_overrides_presets() {
        let config = GeocoderConfigBuilder::fast()
            .default_limit(25)
            .per_decomposition(40)
            .build();
        assert_eq!(config.default_limit, 25);
        assert_eq!(config.retrieval.per_decomposition, 40);
        // Preset values not overridden stay in place.
        assert_eq!(config.retrieval.max_decompositions, 4);
    }

    #[test]
    fn custom_weights_validation() {
        let ok = GeocoderConfigBuilder::new()
            .scoring()
            .custom_weights(0.5, 0.3, 0.1, 0.05);
        assert!(ok.is_ok());

        let bad = GeocoderConfigBuilder::new()
            .scoring()
            .custom_weights(0.5, 0.2, 0.1, 0.05);
        assert!(bad.is_err());
    }

    #[test]
    fn scoring_presets_apply() {
        let config = GeocoderConfigBuilder::new()
            .scoring()
            .prioritize_text_match()
            .done()
            .build();
        assert!((config.weights.text - 0.6).abs() < f64::EPSILON);
    }
}
