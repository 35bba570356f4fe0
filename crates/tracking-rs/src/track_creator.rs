use crate::*;
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

/// Enumeration type for the track creation policy:
///
/// - `LidarClusters` spawns a track for every valid unassigned detection.
/// - `LidarClustersIfVision` only spawns a track for an unassigned detection that is confirmed by
///   an unassigned camera region of interest captured at about the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackCreationPolicy {
    #[default]
    LidarClusters,
    LidarClustersIfVision,
}

/// Parameters for spawning new tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackCreatorConfig {
    policy: TrackCreationPolicy,
    /// Variance of any part of the initial state the detection does not measure.
    default_variance: f64,
    /// Measurement variance used when a detection carries no covariance.
    noise_variance: f64,
    /// Maximum time between a detection batch and the region of interest batch confirming it.
    max_vision_lidar_timestamp_diff: Duration,
    /// Maximum number of region of interest batches kept while waiting for detections.
    max_buffered_roi_batches: usize,
    vision_association: VisionAssociationConfig,
    kalman: KalmanFilter,
}

impl Default for TrackCreatorConfig {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TrackCreatorConfig {
    /// Returns a new TrackCreatorConfig
    ///
    /// # Arguments
    ///
    /// * `policy`: The track creation policy. Default `TrackCreationPolicy::LidarClusters`.
    ///
    /// The remaining parameters default to a `default_variance` of `10.0`, a `noise_variance` of
    /// `1.0`, a `max_vision_lidar_timestamp_diff` of 200ms and 10 buffered region of interest batches.
    pub fn new(policy: Option<TrackCreationPolicy>) -> TrackCreatorConfig {
        TrackCreatorConfig {
            policy: policy.unwrap_or_default(),
            default_variance: 10.0,
            noise_variance: 1.0,
            max_vision_lidar_timestamp_diff: Duration::from_millis(200),
            max_buffered_roi_batches: 10,
            vision_association: VisionAssociationConfig::default(),
            kalman: KalmanFilter::default(),
        }
    }

    /// Set policy
    pub fn with_policy(&mut self, policy: TrackCreationPolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Set default_variance
    pub fn with_default_variance(&mut self, default_variance: f64) -> &mut Self {
        self.default_variance = default_variance;
        self
    }

    /// Set noise_variance
    pub fn with_noise_variance(&mut self, noise_variance: f64) -> &mut Self {
        self.noise_variance = noise_variance;
        self
    }

    /// Set max_vision_lidar_timestamp_diff
    pub fn with_max_vision_lidar_timestamp_diff(&mut self, diff: Duration) -> &mut Self {
        self.max_vision_lidar_timestamp_diff = diff;
        self
    }

    /// Set max_buffered_roi_batches
    pub fn with_max_buffered_roi_batches(&mut self, max_buffered_roi_batches: usize) -> &mut Self {
        self.max_buffered_roi_batches = max_buffered_roi_batches;
        self
    }

    /// Set vision_association
    pub fn with_vision_association(&mut self, config: VisionAssociationConfig) -> &mut Self {
        self.vision_association = config;
        self
    }

    /// Set kalman
    pub fn with_kalman(&mut self, kalman: KalmanFilter) -> &mut Self {
        self.kalman = kalman;
        self
    }

    /// Return the policy
    pub fn policy(&self) -> TrackCreationPolicy {
        self.policy
    }

    /// Return the default_variance
    pub fn default_variance(&self) -> f64 {
        self.default_variance
    }

    /// Return the noise_variance
    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    /// Return the max_vision_lidar_timestamp_diff
    pub fn max_vision_lidar_timestamp_diff(&self) -> Duration {
        self.max_vision_lidar_timestamp_diff
    }

    /// Return the max_buffered_roi_batches
    pub fn max_buffered_roi_batches(&self) -> usize {
        self.max_buffered_roi_batches
    }

    /// Return the vision_association config
    pub fn vision_association(&self) -> &VisionAssociationConfig {
        &self.vision_association
    }

    /// Return the kalman filter
    pub fn kalman(&self) -> &KalmanFilter {
        &self.kalman
    }
}

/// Unassigned regions of interest from one camera image.
#[derive(Debug, Clone)]
struct RoiBatch {
    stamp: Duration,
    rois: Vec<ClassifiedRoi>,
    tf_camera_from_track: Isometry3<f64>,
}

/// Collects the observations no track claimed and turns them into new tracks.
#[derive(Debug, Clone)]
pub struct TrackCreator {
    config: TrackCreatorConfig,
    vision_associator: VisionAssociator,
    /// Unassigned detections of the latest detection cycle.
    detections: Vec<DetectedObject>,
    /// Capture time of the latest detection cycle.
    detection_stamp: Option<Duration>,
    /// Unassigned regions of interest, oldest first.
    roi_batches: VecDeque<RoiBatch>,
}

impl Default for TrackCreator {
    fn default() -> Self {
        Self::new(TrackCreatorConfig::default())
    }
}

impl TrackCreator {
    /// Returns a new TrackCreator
    pub fn new(config: TrackCreatorConfig) -> TrackCreator {
        TrackCreator {
            vision_associator: VisionAssociator::new(config.vision_association.clone()),
            config,
            detections: vec![],
            detection_stamp: None,
            roi_batches: VecDeque::new(),
        }
    }

    /// Return the config
    pub fn config(&self) -> &TrackCreatorConfig {
        &self.config
    }

    /// Return the number of detections waiting for `create_tracks`
    pub fn num_buffered_detections(&self) -> usize {
        self.detections.len()
    }

    /// Return the number of regions of interest waiting for a confirming detection
    pub fn num_buffered_rois(&self) -> usize {
        self.roi_batches.iter().map(|batch| batch.rois.len()).sum()
    }

    /// Store the detections of a batch that were not assigned to any track.
    ///
    /// # Parameters
    ///
    /// * `detections`: The batch, already in the tracking frame.
    /// * `result`: The association of `detections` with the live tracks.
    pub fn add_objects(&mut self, detections: &DetectedObjects, result: &AssociatorResult) {
        self.detection_stamp = Some(detections.header.stamp);

        result
            .unassigned_detection_indices
            .iter()
            .filter_map(|idx| detections.objects.get(*idx).map(|detection| (idx, detection)))
            .for_each(|(idx, detection)| {
                if detection.is_valid() {
                    self.detections.push(detection.clone());
                } else {
                    debug!(detection = idx, "skipping invalid detection");
                }
            });
    }

    /// Store the regions of interest of a batch that were not assigned to any track.
    ///
    /// # Parameters
    ///
    /// * `rois`: The batch of regions of interest.
    /// * `tf_camera_from_track`: Transform from the tracking frame into the camera optical frame.
    /// * `result`: The association of `rois` with the live tracks.
    pub fn add_rois(
        &mut self,
        rois: &ClassifiedRoiArray,
        tf_camera_from_track: &Isometry3<f64>,
        result: &AssociatorResult,
    ) {
        if self.config.policy != TrackCreationPolicy::LidarClustersIfVision {
            return;
        }

        let unassigned = result
            .unassigned_detection_indices
            .iter()
            .filter_map(|idx| rois.rois.get(*idx))
            .filter(|roi| roi.bbox().is_some())
            .cloned()
            .collect::<Vec<_>>();
        if unassigned.is_empty() {
            return;
        }

        self.roi_batches.push_back(RoiBatch {
            stamp: rois.header.stamp,
            rois: unassigned,
            tf_camera_from_track: *tf_camera_from_track,
        });
        while self.roi_batches.len() > self.config.max_buffered_roi_batches {
            self.roi_batches.pop_front();
        }
    }

    /// Returns new tracks for the buffered detections and clears the detection buffer.
    pub fn create_tracks(&mut self) -> Vec<TrackedObject> {
        let detections = std::mem::take(&mut self.detections);

        match self.config.policy {
            TrackCreationPolicy::LidarClusters => detections
                .iter()
                .map(|detection| self.spawn(detection))
                .collect(),
            TrackCreationPolicy::LidarClustersIfVision => self.create_vision_confirmed(&detections),
        }
    }

    fn spawn(&self, detection: &DetectedObject) -> TrackedObject {
        TrackedObject::new(
            detection,
            self.config.kalman,
            self.config.default_variance,
            self.config.noise_variance,
        )
    }

    fn create_vision_confirmed(&mut self, detections: &[DetectedObject]) -> Vec<TrackedObject> {
        let stamp = match self.detection_stamp {
            Some(stamp) => stamp,
            None => return vec![],
        };
        let window = self.config.max_vision_lidar_timestamp_diff;

        self.roi_batches
            .retain(|batch| batch.stamp + window >= stamp);

        let closest = self
            .roi_batches
            .iter()
            .enumerate()
            .map(|(idx, batch)| (idx, abs_diff(batch.stamp, stamp)))
            .filter(|(_, diff)| *diff <= window)
            .min_by_key(|(_, diff)| *diff)
            .map(|(idx, _)| idx);

        let batch_idx = match closest {
            Some(batch_idx) if !detections.is_empty() => batch_idx,
            _ => {
                trace!(
                    detections = detections.len(),
                    "no regions of interest to confirm detections"
                );
                return vec![];
            }
        };

        let batch = &self.roi_batches[batch_idx];
        let shapes = detections
            .iter()
            .map(|detection| detection.shape.clone())
            .collect::<Vec<_>>();
        let result =
            self.vision_associator
                .assign_shapes(&batch.rois, &shapes, &batch.tf_camera_from_track);

        let tracks = detections
            .iter()
            .zip(result.track_assignments.iter())
            .filter_map(|(detection, assignment)| assignment.map(|roi_idx| (detection, roi_idx)))
            .map(|(detection, roi_idx)| {
                let mut track = self.spawn(detection);
                track.seed_classification(&batch.rois[roi_idx].classifications);
                track
            })
            .collect::<Vec<_>>();

        debug!(
            detections = detections.len(),
            confirmed = tracks.len(),
            "vision confirmed detections"
        );

        // consume the matched regions of interest
        let batch = &mut self.roi_batches[batch_idx];
        batch.rois = std::mem::take(&mut batch.rois)
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| result.unassigned_detection_indices.contains(idx))
            .map(|(_, roi)| roi)
            .collect();
        if batch.rois.is_empty() {
            self.roi_batches.remove(batch_idx);
        }

        tracks
    }
}

fn abs_diff(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion};
    use std::time::Duration;

    fn tf_camera_from_track() -> Isometry3<f64> {
        #[rustfmt::skip]
        let rotation = Rotation3::from_matrix_unchecked(Matrix3::new(
            0.0, -1.0, 0.0,
            0.0, 0.0, -1.0,
            1.0, 0.0, 0.0,
        ));
        Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }

    fn detection(x: f64, y: f64) -> DetectedObject {
        let centroid = Point3::new(x, y, 0.0);
        DetectedObject::new(centroid, Shape::from_box(&centroid, 2.0, 2.0, 1.5))
    }

    fn detections(millis: u64) -> DetectedObjects {
        let mut degenerate = detection(20.0, 0.0);
        degenerate.shape.polygon.truncate(2);

        DetectedObjects::new(
            Header::new(Duration::from_millis(millis), "map"),
            vec![detection(10.0, 0.0), detection(10.0, 8.0), degenerate],
        )
    }

    fn rois(millis: u64) -> ClassifiedRoiArray {
        ClassifiedRoiArray::new(
            Header::new(Duration::from_millis(millis), "camera"),
            vec![ClassifiedRoi::new(
                vec![ObjectClassification::new(ObjectClass::Pedestrian, 0.8)],
                vec![
                    Point2::new(850.0, 375.0),
                    Point2::new(1070.0, 375.0),
                    Point2::new(1070.0, 540.0),
                    Point2::new(850.0, 540.0),
                ],
            )],
        )
    }

    fn vision_creator() -> TrackCreator {
        let mut config = TrackCreatorConfig::default();
        config.with_policy(TrackCreationPolicy::LidarClustersIfVision);
        TrackCreator::new(config)
    }

    #[test]
    fn create_tracks_lidar_clusters() {
        let mut creator = TrackCreator::default();
        let detections = detections(1000);

        creator.add_objects(&detections, &AssociatorResult::unassigned(0, 3, true));
        assert_eq!(creator.num_buffered_detections(), 2);

        let tracks = creator.create_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].position(), Point3::new(10.0, 0.0, 0.0));
        assert_eq!(tracks[1].position(), Point3::new(10.0, 8.0, 0.0));
        assert_ne!(tracks[0].object_id(), tracks[1].object_id());

        assert_eq!(creator.num_buffered_detections(), 0);
        assert!(creator.create_tracks().is_empty());
    }

    #[test]
    fn create_tracks_only_unassigned() {
        let mut creator = TrackCreator::default();
        let detections = detections(1000);

        let mut result = AssociatorResult::unassigned(1, 3, false);
        result.track_assignments = vec![Some(0)];
        result.unassigned_track_indices = vec![];
        result.unassigned_detection_indices = vec![1, 2];
        creator.add_objects(&detections, &result);

        let tracks = creator.create_tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].position(), Point3::new(10.0, 8.0, 0.0));
    }

    #[test]
    fn lidar_clusters_ignores_rois() {
        let mut creator = TrackCreator::default();
        creator.add_rois(
            &rois(1000),
            &tf_camera_from_track(),
            &AssociatorResult::unassigned(0, 1, false),
        );

        assert_eq!(creator.num_buffered_rois(), 0);
    }

    #[test]
    fn create_tracks_if_vision() {
        let mut creator = vision_creator();

        creator.add_rois(
            &rois(1000),
            &tf_camera_from_track(),
            &AssociatorResult::unassigned(0, 1, false),
        );
        assert_eq!(creator.num_buffered_rois(), 1);

        creator.add_objects(&detections(1100), &AssociatorResult::unassigned(0, 3, true));
        let tracks = creator.create_tracks();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].position(), Point3::new(10.0, 0.0, 0.0));
        assert_eq!(
            tracks[0].classification().most_likely().classification,
            ObjectClass::Pedestrian
        );
        assert_eq!(creator.num_buffered_rois(), 0);

        // the region of interest was consumed
        creator.add_objects(&detections(1150), &AssociatorResult::unassigned(0, 3, true));
        assert!(creator.create_tracks().is_empty());
    }

    #[test]
    fn create_tracks_if_vision_without_rois() {
        let mut creator = vision_creator();

        creator.add_objects(&detections(1000), &AssociatorResult::unassigned(0, 3, false));
        assert!(creator.create_tracks().is_empty());
        assert_eq!(creator.num_buffered_detections(), 0);
    }

    #[test]
    fn create_tracks_if_vision_outside_window() {
        let mut creator = vision_creator();

        creator.add_rois(
            &rois(1000),
            &tf_camera_from_track(),
            &AssociatorResult::unassigned(0, 1, false),
        );
        creator.add_objects(&detections(1300), &AssociatorResult::unassigned(0, 3, false));

        assert!(creator.create_tracks().is_empty());
        assert_eq!(creator.num_buffered_rois(), 0);
    }

    #[test]
    fn roi_buffer_is_bounded() {
        let mut creator = {
            let mut config =
                TrackCreatorConfig::new(Some(TrackCreationPolicy::LidarClustersIfVision));
            config.with_max_buffered_roi_batches(3);
            TrackCreator::new(config)
        };

        (0..5).for_each(|idx| {
            creator.add_rois(
                &rois(1000 + idx * 10),
                &tf_camera_from_track(),
                &AssociatorResult::unassigned(0, 1, false),
            )
        });

        assert_eq!(creator.num_buffered_rois(), 3);
    }
}
