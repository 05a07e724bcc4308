//! Address hierarchy resolution.
//!
//! Given a matched feature, walk its containment edges upward and emit an
//! ordered address chain, finest entry first. At each step the chosen
//! parent must be strictly coarser than the current feature, so the walk
//! always makes progress through the rank scheme; edge overlap and the
//! primary flag break ties between competing parents. Unnamed ancestors
//! are skipped in the output but the walk continues through them.

use ahash::AHashMap;
use ortelius_gazetteer::{ContainmentEdge, Feature, FeatureId};
use tracing::{instrument, trace};

use crate::{
    error::{OrteliusError, Result},
    results::{AddressPart, PlaceSummary, ResolvedAddress},
    session::Session,
};

/// Ceiling on the length of a parent walk. The rank scheme only has 31
/// levels, so anything deeper points at malformed containment data.
pub(crate) const MAX_HIERARCHY_DEPTH: usize = 20;

pub(crate) struct AddressResolver<'a> {
    session: &'a Session,
}

impl<'a> AddressResolver<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Resolve the full address chain of `feature`, finest first.
    ///
    /// The feature's own name is the finest entry when it has one.
    #[instrument(level = "debug", skip_all, fields(id = %feature.id))]
    pub(crate) async fn resolve(
        &self,
        feature: &Feature,
        language: Option<&str>,
    ) -> Result<ResolvedAddress> {
        let mut parts = Vec::new();
        if let Some(name) = feature.name(language) {
            parts.push(AddressPart {
                rank: feature.address_rank,
                name: display_name(feature, name),
            });
        }
        for ancestor in self.parent_chain(feature).await? {
            if let Some(name) = ancestor.name(language) {
                parts.push(AddressPart {
                    rank: ancestor.address_rank,
                    name: name.to_owned(),
                });
            }
        }
        Ok(ResolvedAddress::from_parts(parts))
    }

    /// The parent chain as caller-facing summaries, finest first.
    pub(crate) async fn hierarchy(
        &self,
        feature: &Feature,
        language: Option<&str>,
    ) -> Result<Vec<PlaceSummary>> {
        Ok(self
            .parent_chain(feature)
            .await?
            .iter()
            .map(|f| PlaceSummary::from_feature(f, language))
            .collect())
    }

    /// Walk containment edges upward from `feature`.
    ///
    /// At each level the parent with the finest rank strictly coarser
    /// than the current feature wins; ties go to the edge with the larger
    /// overlap, then the primary edge, then the smaller identifier. The
    /// walk ends when no eligible parent remains and aborts with
    /// [`OrteliusError::HierarchyCycle`] past [`MAX_HIERARCHY_DEPTH`].
    async fn parent_chain(&self, feature: &Feature) -> Result<Vec<Feature>> {
        let store = self.session.store();
        let mut chain: Vec<Feature> = Vec::new();
        let mut current_id = feature.id;
        let mut current_rank = feature.address_rank;

        for _ in 0..MAX_HIERARCHY_DEPTH {
            let edges = self
                .session
                .run("parents", store.parents(current_id))
                .await?;
            if edges.is_empty() {
                return Ok(chain);
            }
            let ids: Vec<FeatureId> = edges.iter().map(|e| e.parent).collect();
            let parents = self.session.run("features", store.features(&ids)).await?;
            let by_id: AHashMap<FeatureId, Feature> =
                parents.into_iter().map(|f| (f.id, f)).collect();

            let next = edges
                .iter()
                .filter_map(|edge| by_id.get(&edge.parent).map(|f| (edge, f)))
                .filter(|(_, f)| f.address_rank < current_rank)
                .max_by(|(ea, fa), (eb, fb)| ordering(ea, fa, eb, fb));

            let Some((_, parent)) = next else {
                return Ok(chain);
            };
            trace!(parent = %parent.id, rank = parent.address_rank, "hierarchy step");
            current_id = parent.id;
            current_rank = parent.address_rank;
            chain.push(parent.clone());
        }

        Err(OrteliusError::HierarchyCycle {
            at: current_id,
            max_depth: MAX_HIERARCHY_DEPTH,
        })
    }
}

fn ordering(
    edge_a: &ContainmentEdge,
    feat_a: &Feature,
    edge_b: &ContainmentEdge,
    feat_b: &Feature,
) -> std::cmp::Ordering {
    feat_a
        .address_rank
        .cmp(&feat_b.address_rank)
        .then_with(|| edge_a.overlap.total_cmp(&edge_b.overlap))
        .then_with(|| edge_a.primary.cmp(&edge_b.primary))
        .then_with(|| feat_b.id.cmp(&feat_a.id))
}

/// A house-level feature with a house number displays as
/// `<number> <name>` when its name does not already carry the number.
fn display_name(feature: &Feature, name: &str) -> String {
    match feature.address_tag("housenumber") {
        Some(number) if !name.contains(number) => format!("{number} {name}"),
        _ => name.to_owned(),
    }
}
