//! Labeled feature-vector store with open-set k-NN classification.
//!
//! The acceptance threshold is derived from the spread of same-label
//! samples, so a probe far from everything known is rejected before any
//! voting takes place.

use crate::config::ClassifierConfig;
use crate::error::{RecognitionError, Result};
use crate::types::{l2, FeatureVector};
use serde::Serialize;
use std::fmt;

/// Label reported when a probe is rejected.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Min/max/avg Euclidean distance over all same-label sample pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceStatistics {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Number of same-label pairs the figures are based on.
    pub pairs: usize,
}

impl Default for DistanceStatistics {
    fn default() -> Self {
        Self {
            min: f64::MAX,
            max: 0.0,
            avg: 0.0,
            pairs: 0,
        }
    }
}

/// A stored training vector. The label is never empty.
#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub label: String,
    pub vector: FeatureVector,
}

/// A stored sample's distance to a probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    /// Insertion index of the sample.
    pub index: usize,
    pub label: String,
    pub distance: f64,
}

/// Why a probe was classified as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    EmptyDatabase,
    BeyondThreshold,
    NoMajority,
}

/// Outcome of a k-NN query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Winning label; `None` when rejected.
    pub label: Option<String>,
    pub rejection: Option<RejectReason>,
    /// Votes cast for the reported (or best rejected) label.
    pub votes: usize,
    /// Effective k after clamping.
    pub k: usize,
    pub nearest_distance: Option<f64>,
    pub threshold: f64,
}

impl Classification {
    /// The winning label, or `"Unknown"`.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn is_known(&self) -> bool {
        self.label.is_some()
    }

    fn rejected(
        reason: RejectReason,
        votes: usize,
        k: usize,
        nearest: Option<f64>,
        threshold: f64,
    ) -> Self {
        Self {
            label: None,
            rejection: Some(reason),
            votes,
            k,
            nearest_distance: nearest,
            threshold,
        }
    }
}

/// Summary figures for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatabaseSummary {
    pub samples: usize,
    pub classes: usize,
    pub statistics: DistanceStatistics,
}

impl fmt::Display for DatabaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Feature space: {} faces, {} classes\nMin distance: {:.2}, Max distance: {:.2}, Avg distance: {:.2}",
            self.samples,
            self.classes,
            self.statistics.min,
            self.statistics.max,
            self.statistics.avg
        )
    }
}

#[derive(Debug)]
struct Vote<'a> {
    label: &'a str,
    votes: usize,
    closest: f64,
}

/// In-memory gallery of labeled feature vectors.
///
/// Not internally synchronized; callers serialize access.
#[derive(Debug, Clone, Default)]
pub struct ClassifierDatabase {
    samples: Vec<LabeledSample>,
    labels: Vec<String>,
    statistics: DistanceStatistics,
    config: ClassifierConfig,
}

impl ClassifierDatabase {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Store a labeled vector and recompute the intra-class statistics.
    ///
    /// Returns `Ok(false)` without touching anything when the vector has no
    /// (or an empty) label.
    pub fn insert(&mut self, vector: FeatureVector) -> Result<bool> {
        let label = match vector.label.as_deref() {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => {
                tracing::warn!(len = vector.len(), "skipping feature vector without a label");
                return Ok(false);
            }
        };
        if let Some(first) = self.samples.first() {
            if first.vector.len() != vector.len() {
                return Err(RecognitionError::DimensionMismatch {
                    expected: first.vector.len(),
                    actual: vector.len(),
                });
            }
        }

        if !self.labels.contains(&label) {
            self.labels.push(label.clone());
        }
        self.samples.push(LabeledSample { label, vector });
        self.recompute_statistics();
        Ok(true)
    }

    /// Rebuild statistics from every same-label pair. O(n²).
    fn recompute_statistics(&mut self) {
        let mut stats = DistanceStatistics::default();
        let mut total = 0.0;
        for (i, a) in self.samples.iter().enumerate() {
            for b in &self.samples[i + 1..] {
                if a.label != b.label {
                    continue;
                }
                let dist = l2(&a.vector.values, &b.vector.values);
                total += dist;
                stats.pairs += 1;
                stats.min = stats.min.min(dist);
                stats.max = stats.max.max(dist);
            }
        }
        if stats.pairs > 0 {
            stats.avg = total / stats.pairs as f64;
            tracing::info!(
                min = stats.min,
                max = stats.max,
                avg = stats.avg,
                pairs = stats.pairs,
                "intra-class distance statistics updated"
            );
        }
        self.statistics = stats;
    }

    /// Every stored sample ordered by distance to `probe`, nearest first.
    /// Equal distances keep insertion order.
    pub fn rank(&self, probe: &[f64]) -> Result<Vec<Neighbor>> {
        let mut ranked = Vec::with_capacity(self.samples.len());
        for (index, sample) in self.samples.iter().enumerate() {
            if sample.vector.len() != probe.len() {
                return Err(RecognitionError::DimensionMismatch {
                    expected: sample.vector.len(),
                    actual: probe.len(),
                });
            }
            ranked.push(Neighbor {
                index,
                label: sample.label.clone(),
                distance: l2(probe, &sample.vector.values),
            });
        }
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(ranked)
    }

    /// Open-set k-NN classification of `probe`.
    pub fn classify(&self, probe: &[f64], k: usize) -> Result<Classification> {
        let ranked = self.rank(probe)?;
        let threshold = self.acceptance_threshold();

        let Some(nearest) = ranked.first() else {
            tracing::info!("empty database; probe is unknown");
            return Ok(Classification::rejected(
                RejectReason::EmptyDatabase,
                0,
                0,
                None,
                threshold,
            ));
        };
        let k = k.clamp(1, ranked.len());

        tracing::debug!(
            nearest = nearest.distance,
            threshold,
            top = ?ranked
                .iter()
                .take(3)
                .map(|n| (n.label.as_str(), n.distance))
                .collect::<Vec<_>>(),
            "ranked gallery"
        );

        if nearest.distance > threshold {
            tracing::info!(nearest = nearest.distance, threshold, "rejected: beyond threshold");
            return Ok(Classification::rejected(
                RejectReason::BeyondThreshold,
                0,
                k,
                Some(nearest.distance),
                threshold,
            ));
        }

        let winner = vote(&ranked[..k]);
        let (label, votes) = match winner {
            Some(w) => (w.label, w.votes),
            None => ("", 0),
        };
        if votes <= k / 2 {
            tracing::info!(votes, k, "rejected: no clear majority");
            return Ok(Classification::rejected(
                RejectReason::NoMajority,
                votes,
                k,
                Some(nearest.distance),
                threshold,
            ));
        }

        tracing::info!(label, votes, k, "accepted");
        Ok(Classification {
            label: Some(label.to_string()),
            rejection: None,
            votes,
            k,
            nearest_distance: Some(nearest.distance),
            threshold,
        })
    }

    /// Current acceptance threshold for the nearest-neighbor distance.
    pub fn acceptance_threshold(&self) -> f64 {
        self.config.threshold(self.statistics.avg)
    }

    pub fn statistics(&self) -> DistanceStatistics {
        self.statistics
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Distinct labels in first-insertion order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn summary(&self) -> DatabaseSummary {
        DatabaseSummary {
            samples: self.samples.len(),
            classes: self.labels.len(),
            statistics: self.statistics,
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.labels.clear();
        self.statistics = DistanceStatistics::default();
    }

    /// First three coordinates of every sample (then the probe, if given),
    /// each axis min-max scaled to `[0, 100]`. Missing coordinates are 0 and
    /// axes with no spread are left as is.
    pub fn feature_space_3d(&self, probe: Option<&[f64]>) -> Vec<[f64; 3]> {
        let mut points: Vec<[f64; 3]> = self
            .samples
            .iter()
            .map(|s| first_three(&s.vector.values))
            .collect();
        if let Some(probe) = probe {
            points.push(first_three(probe));
        }
        if points.is_empty() {
            return points;
        }

        for axis in 0..3 {
            let min = points.iter().map(|p| p[axis]).fold(f64::INFINITY, f64::min);
            let max = points.iter().map(|p| p[axis]).fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            if range > 0.0 {
                for p in points.iter_mut() {
                    p[axis] = (p[axis] - min) / range * 100.0;
                }
            }
        }
        points
    }
}

/// Tally votes per label. Most votes wins; ties go to the label with the
/// smallest distance among its votes.
fn vote(neighbors: &[Neighbor]) -> Option<Vote<'_>> {
    let mut tally: Vec<Vote<'_>> = Vec::new();
    for n in neighbors {
        match tally.iter_mut().find(|v| v.label == n.label) {
            Some(v) => {
                v.votes += 1;
                v.closest = v.closest.min(n.distance);
            }
            None => tally.push(Vote {
                label: &n.label,
                votes: 1,
                closest: n.distance,
            }),
        }
    }

    let mut best: Option<Vote<'_>> = None;
    for v in tally {
        let better = match &best {
            None => true,
            Some(b) => v.votes > b.votes || (v.votes == b.votes && v.closest < b.closest),
        };
        if better {
            best = Some(v);
        }
    }
    best
}

fn first_three(values: &[f64]) -> [f64; 3] {
    [
        values.first().copied().unwrap_or(0.0),
        values.get(1).copied().unwrap_or(0.0),
        values.get(2).copied().unwrap_or(0.0),
    ]
}
