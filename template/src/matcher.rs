use std::sync::Arc;

use facetriage_store::Identity;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::distance::Metric;
use crate::store::{TemplateSnapshot, TemplateStore};
use crate::TemplateError;

/// Default maximum distance for a match.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Matcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum distance for a match. Lower means fewer false positives and
    /// more unrecognized returning patients.
    pub threshold: f32,

    pub metric: Metric,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            metric: Metric::default(),
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<(), TemplateError> {
        check_threshold(self.threshold)
    }
}

fn check_threshold(threshold: f32) -> Result<(), TemplateError> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(())
    } else {
        Err(TemplateError::InvalidThreshold(threshold))
    }
}

/// Result of matching one probe.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Known {
        identity: Identity,
        distance: f32,
    },
    /// No representative within the threshold. `nearest` is the smallest
    /// distance seen, or `None` when nothing is enrolled.
    Unknown { nearest: Option<f32> },
}

impl MatchOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            MatchOutcome::Known { identity, .. } => Some(identity),
            MatchOutcome::Unknown { .. } => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, MatchOutcome::Known { .. })
    }
}

/// Linear nearest-centroid search over one snapshot.
///
/// Templates are scanned in enrollment order and only a strictly smaller
/// distance replaces the current best, so the earliest enrolled identity
/// wins exact ties.
pub fn nearest(
    snapshot: &TemplateSnapshot,
    probe: &[f32],
    metric: Metric,
    threshold: f32,
) -> Result<MatchOutcome, TemplateError> {
    if probe.len() != snapshot.dim() {
        return Err(TemplateError::DimensionMismatch {
            expected: snapshot.dim(),
            got: probe.len(),
        });
    }
    if probe.iter().any(|x| !x.is_finite()) {
        return Err(TemplateError::InvalidEmbedding { index: 0 });
    }

    let mut best: Option<(&Identity, f32)> = None;
    for (identity, rep) in snapshot.entries() {
        let d = metric.distance(probe, rep);
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((identity, d)),
        }
    }

    Ok(match best {
        Some((identity, distance)) if distance <= threshold => MatchOutcome::Known {
            identity: identity.clone(),
            distance,
        },
        Some((_, distance)) => MatchOutcome::Unknown {
            nearest: Some(distance),
        },
        None => MatchOutcome::Unknown { nearest: None },
    })
}

/// Identifies probes against the live template registry.
///
/// Each call matches against one snapshot taken at call time; concurrent
/// enrollments become visible on the next call.
pub struct Matcher {
    store: Arc<TemplateStore>,
    metric: Metric,
    threshold: RwLock<f32>,
}

impl Matcher {
    pub fn new(store: Arc<TemplateStore>, config: MatcherConfig) -> Result<Self, TemplateError> {
        config.validate()?;
        Ok(Self {
            store,
            metric: config.metric,
            threshold: RwLock::new(config.threshold),
        })
    }

    /// Matches `probe` against the current snapshot.
    pub fn identify(&self, probe: &[f32]) -> Result<MatchOutcome, TemplateError> {
        let snapshot = self.store.snapshot();
        self.match_in(&snapshot, probe)
    }

    /// Matches `probe` against a caller-held snapshot.
    pub fn match_in(
        &self,
        snapshot: &TemplateSnapshot,
        probe: &[f32],
    ) -> Result<MatchOutcome, TemplateError> {
        nearest(snapshot, probe, self.metric, self.threshold())
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn threshold(&self) -> f32 {
        *self.threshold.read()
    }

    /// Changes the threshold for subsequent matches.
    pub fn set_threshold(&self, threshold: f32) -> Result<(), TemplateError> {
        check_threshold(threshold)?;
        *self.threshold.write() = threshold;
        Ok(())
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("templates", &self.store.len())
            .field("metric", &self.metric)
            .field("threshold", &self.threshold())
            .finish()
    }
}
