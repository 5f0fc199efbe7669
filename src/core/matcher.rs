use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::core::classifier::Classifier;
use crate::core::features::FeatureBuilder;
use crate::core::geometry::{self, GeometryError};
use crate::models::{Item, ItemKind, MatchResult};

/// Default probability cutoff for keeping a pair.
pub const DEFAULT_PROBABILITY_THRESHOLD: f64 = 0.05;

/// Candidate scoring engine.
///
/// Fans one trigger item out against the opposite-kind candidate set:
/// per candidate it assigns lost/found roles, builds the feature vector,
/// reindexes it against the classifier schema and keeps the pair when the
/// predicted probability clears the threshold.
///
/// All dependencies are injected at construction and read-only; nothing is
/// carried across scoring passes.
pub struct Matcher {
    features: FeatureBuilder,
    classifier: Arc<dyn Classifier>,
    threshold: f64,
}

impl Matcher {
    pub fn new(features: FeatureBuilder, classifier: Arc<dyn Classifier>, threshold: f64) -> Self {
        Self {
            features,
            classifier,
            threshold,
        }
    }

    /// Score every candidate against the trigger item.
    ///
    /// The trigger's own geometry is resolved up front: if it cannot be
    /// normalized, no pair can be scored and the whole message is poison.
    /// A candidate whose geometry fails resolves to a skip, never to an
    /// aborted batch. Results come back in candidate order; ordering is
    /// not a contract, rank client-side if needed.
    pub fn score_candidates(
        &self,
        trigger: &Item,
        candidates: &[Item],
    ) -> Result<Vec<MatchResult>, GeometryError> {
        geometry::normalize(&trigger.location)?;

        let names = self.classifier.feature_names();
        let results: Vec<MatchResult> = candidates
            .par_iter()
            .filter_map(|candidate| self.score_pair(trigger, candidate, names))
            .collect();

        debug!(
            "scored {} candidates for item {}, {} above threshold",
            candidates.len(),
            trigger.id,
            results.len()
        );
        Ok(results)
    }

    fn score_pair(
        &self,
        trigger: &Item,
        candidate: &Item,
        names: &[String],
    ) -> Option<MatchResult> {
        if candidate.kind == trigger.kind {
            debug!(
                "candidate {} has the same kind as trigger {}, skipping",
                candidate.id, trigger.id
            );
            return None;
        }

        // The lost-typed record is always the lost side of the feature
        // computation, whichever side triggered the event.
        let (lost, found) = if trigger.kind == ItemKind::Lost {
            (trigger, candidate)
        } else {
            (candidate, trigger)
        };

        let features = match self.features.build(lost, found) {
            Ok(features) => features,
            Err(error) => {
                warn!(
                    "skipping pair ({}, {}): {}",
                    lost.id, found.id, error
                );
                return None;
            }
        };

        let row = features.reindex(names);
        let probability = self.classifier.predict_proba(&row);

        (probability > self.threshold).then(|| MatchResult {
            lost_id: lost.id.clone(),
            found_id: found.id.clone(),
            match_probability: probability,
        })
    }
}
