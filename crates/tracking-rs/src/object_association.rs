use crate::*;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Gating parameters for associating range sensor detections with tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectAssociationConfig {
    /// Maximum Euclidean distance between a track and a detection centroid, in meters.
    max_distance: f64,
    /// Maximum ratio between the larger and the smaller footprint area.
    max_area_ratio: f64,
    /// Maximum squared Mahalanobis distance between a track and a detection centroid.
    gating_threshold: f64,
}

impl Default for ObjectAssociationConfig {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl ObjectAssociationConfig {
    /// Returns a new ObjectAssociationConfig
    ///
    /// # Arguments
    ///
    /// * `max_distance`: Maximum Euclidean distance between a track and a detection centroid, in meters. Default `4.0`.
    /// * `max_area_ratio`: Maximum ratio between the larger and the smaller footprint area. Default `10.0`.
    /// * `gating_threshold`: Maximum squared Mahalanobis distance. Default is the 0.95 quantile of the chi-square distribution with 2 degrees of freedom.
    pub fn new(
        max_distance: Option<f64>,
        max_area_ratio: Option<f64>,
        gating_threshold: Option<f64>,
    ) -> ObjectAssociationConfig {
        ObjectAssociationConfig {
            max_distance: max_distance.unwrap_or(4.0),
            max_area_ratio: max_area_ratio.unwrap_or(10.0),
            gating_threshold: gating_threshold.unwrap_or(CHI2INV95[&2]),
        }
    }

    /// Set max_distance
    pub fn with_max_distance(&mut self, max_distance: f64) -> &mut Self {
        self.max_distance = max_distance;
        self
    }

    /// Set max_area_ratio
    pub fn with_max_area_ratio(&mut self, max_area_ratio: f64) -> &mut Self {
        self.max_area_ratio = max_area_ratio;
        self
    }

    /// Set gating_threshold
    pub fn with_gating_threshold(&mut self, gating_threshold: f64) -> &mut Self {
        self.gating_threshold = gating_threshold;
        self
    }

    /// Return the max_distance
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Return the max_area_ratio
    pub fn max_area_ratio(&self) -> f64 {
        self.max_area_ratio
    }

    /// Return the gating_threshold
    pub fn gating_threshold(&self) -> f64 {
        self.gating_threshold
    }
}

/// Associates range sensor detections with tracks by squared Mahalanobis distance.
#[derive(Debug, Clone, Default)]
pub struct ObjectAssociator {
    config: ObjectAssociationConfig,
}

impl ObjectAssociator {
    /// Returns a new ObjectAssociator
    pub fn new(config: ObjectAssociationConfig) -> ObjectAssociator {
        ObjectAssociator { config }
    }

    /// Return the config
    pub fn config(&self) -> &ObjectAssociationConfig {
        &self.config
    }

    /// Returns the association cost between a track and a detection, or infinity if the pair is gated.
    fn cost(&self, track: &TrackedObject, detection: &DetectedObject) -> f64 {
        let offset = detection.kinematics.centroid_position - track.position();
        if offset.xy().norm() > self.config.max_distance {
            return f64::INFINITY;
        }

        let (track_area, detection_area) = (track.shape_area(), detection.shape.area());
        if track_area.max(detection_area)
            > self.config.max_area_ratio * track_area.min(detection_area)
        {
            return f64::INFINITY;
        }

        match track.mahalanobis_distance(detection) {
            Ok(distance) if distance <= self.config.gating_threshold => distance,
            Ok(_) => f64::INFINITY,
            Err(err) => {
                trace!(object_id = %track.object_id(), "gating failed: {}", err);
                f64::INFINITY
            }
        }
    }
}

impl Associator<DetectedObjects> for ObjectAssociator {
    fn assign(&self, observations: &DetectedObjects, tracks: &[TrackedObject]) -> AssociatorResult {
        let detections = &observations.objects;

        let valid = detections
            .iter()
            .map(|detection| detection.is_valid())
            .collect::<Vec<_>>();
        let had_errors = valid.iter().any(|valid| !valid);

        let cost_matrix = Array2::from_shape_fn((tracks.len(), detections.len()), |(row, col)| {
            if valid[col] {
                self.cost(&tracks[row], &detections[col])
            } else {
                f64::INFINITY
            }
        });

        match linear_assignment::min_cost_matching(&cost_matrix, self.config.gating_threshold) {
            Ok((matches, _, _)) => {
                trace!(
                    tracks = tracks.len(),
                    detections = detections.len(),
                    matches = matches.len(),
                    "object association"
                );
                AssociatorResult::from_matches(tracks.len(), detections.len(), &matches, had_errors)
            }
            Err(err) => {
                warn!("object association failed: {}", err);
                AssociatorResult::unassigned(tracks.len(), detections.len(), had_errors)
            }
        }
    }
}
