//! Result assembly: deduplication, ordering and truncation.
//!
//! The retriever may surface the same feature through several
//! decompositions and the scorer only fills in scores, so the last step
//! before building the response is deterministic: collapse duplicates to
//! their best-scored instance, order by score with a stable tie-break,
//! and cut to the effective limit.

use ahash::AHashMap;
use itertools::Itertools;
use ortelius_gazetteer::FeatureId;

use crate::{options::MAX_LIMIT, score::Candidate};

/// Resolve the per-request limit against the configured default and the
/// hard ceiling. A requested limit of zero yields an empty response.
pub(crate) fn effective_limit(requested: Option<usize>, default_limit: usize) -> usize {
    requested.unwrap_or(default_limit).min(MAX_LIMIT)
}

/// Collapse duplicates, order deterministically, truncate.
///
/// Ordering is score descending, then address rank descending (finer
/// features first), then identifier ascending, so equal inputs always
/// produce byte-equal responses.
pub(crate) fn assemble(candidates: Vec<Candidate>, limit: usize) -> Vec<Candidate> {
    if limit == 0 {
        return Vec::new();
    }
    let mut best: AHashMap<FeatureId, Candidate> = AHashMap::with_capacity(candidates.len());
    for candidate in candidates {
        match best.entry(candidate.feature.id) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                if candidate.score > slot.get().score {
                    slot.insert(candidate);
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
        }
    }
    best.into_values()
        .sorted_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.feature.address_rank.cmp(&a.feature.address_rank))
                .then_with(|| a.feature.id.cmp(&b.feature.id))
        })
        .take(limit)
        .collect()
}
