use crate::*;
use anyhow::{ensure, Result};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Parameters of the multi-object tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiObjectTrackerOptions {
    /// The frame all tracks are maintained in.
    frame: String,
    /// Tracks not updated for longer than this are removed.
    pruning_time_threshold: Duration,
    /// Tracks not updated for more detection cycles than this are removed.
    pruning_ticks_threshold: usize,
    object_association_config: ObjectAssociationConfig,
    vision_association_config: VisionAssociationConfig,
    track_creator_config: TrackCreatorConfig,
}

impl Default for MultiObjectTrackerOptions {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl MultiObjectTrackerOptions {
    /// Returns a new MultiObjectTrackerOptions
    ///
    /// # Arguments
    ///
    /// * `frame`: The frame all tracks are maintained in. Default `map`.
    /// * `pruning_time_threshold`: Tracks not updated for longer than this are removed. Default 1s.
    /// * `pruning_ticks_threshold`: Tracks not updated for more detection cycles than this are removed. Default `5`.
    pub fn new(
        frame: Option<String>,
        pruning_time_threshold: Option<Duration>,
        pruning_ticks_threshold: Option<usize>,
    ) -> MultiObjectTrackerOptions {
        MultiObjectTrackerOptions {
            frame: frame.unwrap_or_else(|| "map".to_string()),
            pruning_time_threshold: pruning_time_threshold.unwrap_or(Duration::from_secs(1)),
            pruning_ticks_threshold: pruning_ticks_threshold.unwrap_or(5),
            object_association_config: ObjectAssociationConfig::default(),
            vision_association_config: VisionAssociationConfig::default(),
            track_creator_config: TrackCreatorConfig::default(),
        }
    }

    /// Set frame
    pub fn with_frame(&mut self, frame: impl Into<String>) -> &mut Self {
        self.frame = frame.into();
        self
    }

    /// Set pruning_time_threshold
    pub fn with_pruning_time_threshold(&mut self, pruning_time_threshold: Duration) -> &mut Self {
        self.pruning_time_threshold = pruning_time_threshold;
        self
    }

    /// Set pruning_ticks_threshold
    pub fn with_pruning_ticks_threshold(&mut self, pruning_ticks_threshold: usize) -> &mut Self {
        self.pruning_ticks_threshold = pruning_ticks_threshold;
        self
    }

    /// Set object_association_config
    pub fn with_object_association_config(&mut self, config: ObjectAssociationConfig) -> &mut Self {
        self.object_association_config = config;
        self
    }

    /// Set vision_association_config
    pub fn with_vision_association_config(&mut self, config: VisionAssociationConfig) -> &mut Self {
        self.vision_association_config = config;
        self
    }

    /// Set track_creator_config
    pub fn with_track_creator_config(&mut self, config: TrackCreatorConfig) -> &mut Self {
        self.track_creator_config = config;
        self
    }

    /// Return the frame
    pub fn frame(&self) -> &str {
        &self.frame
    }

    /// Return the pruning_time_threshold
    pub fn pruning_time_threshold(&self) -> Duration {
        self.pruning_time_threshold
    }

    /// Return the pruning_ticks_threshold
    pub fn pruning_ticks_threshold(&self) -> usize {
        self.pruning_ticks_threshold
    }

    /// Return the object_association_config
    pub fn object_association_config(&self) -> &ObjectAssociationConfig {
        &self.object_association_config
    }

    /// Return the vision_association_config
    pub fn vision_association_config(&self) -> &VisionAssociationConfig {
        &self.vision_association_config
    }

    /// Return the track_creator_config
    pub fn track_creator_config(&self) -> &TrackCreatorConfig {
        &self.track_creator_config
    }

    /// Check that every threshold and variance can be used by the tracker. An infinite gate is
    /// accepted and disables that gate.
    pub fn validate(&self) -> Result<()> {
        let object = &self.object_association_config;
        ensure!(
            object.max_distance() >= 0.0,
            "invalid max_distance {}",
            object.max_distance()
        );
        ensure!(
            object.max_area_ratio() >= 1.0,
            "invalid max_area_ratio {}",
            object.max_area_ratio()
        );
        ensure!(
            object.gating_threshold() >= 0.0,
            "invalid gating_threshold {}",
            object.gating_threshold()
        );

        let creator = &self.track_creator_config;
        for vision in [
            &self.vision_association_config,
            creator.vision_association(),
        ] {
            ensure!(
                (0.0..=1.0).contains(&vision.iou_threshold()),
                "invalid iou_threshold {}",
                vision.iou_threshold()
            );
        }
        for (name, variance) in [
            ("default_variance", creator.default_variance()),
            ("noise_variance", creator.noise_variance()),
        ] {
            ensure!(
                variance.is_finite() && variance > 0.0,
                "invalid {} {}",
                name,
                variance
            );
        }
        let process_noise = creator.kalman().process_noise();
        ensure!(
            process_noise.is_finite() && process_noise >= 0.0,
            "invalid process_noise {}",
            process_noise
        );

        Ok(())
    }
}

/// Enumeration type for the outcome of a detection cycle.
///
/// - `Ok` and `InvalidShape` mean the cycle ran. `InvalidShape` additionally reports that at least one detection could not be interpreted and was skipped.
/// - Every other status means the cycle was rejected before any state was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackerUpdateStatus {
    Ok,
    WentBackInTime,
    DetectionFrameMismatch,
    TrackerFrameMismatch,
    FrameNotGravityAligned,
    InvalidShape,
}

impl TrackerUpdateStatus {
    /// Returns true if the detection cycle ran.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            TrackerUpdateStatus::Ok | TrackerUpdateStatus::InvalidShape
        )
    }
}

impl fmt::Display for TrackerUpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            TrackerUpdateStatus::Ok => "ok",
            TrackerUpdateStatus::WentBackInTime => "detections are older than the last update",
            TrackerUpdateStatus::DetectionFrameMismatch => {
                "detection frame does not match the odometry child frame"
            }
            TrackerUpdateStatus::TrackerFrameMismatch => {
                "odometry frame does not match the tracking frame"
            }
            TrackerUpdateStatus::FrameNotGravityAligned => "odometry is not gravity aligned",
            TrackerUpdateStatus::InvalidShape => "invalid detections were skipped",
        };
        write!(f, "{}", description)
    }
}

/// The live tracks after a detection cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackedObjects {
    pub header: Header,
    pub objects: Vec<TrackedObjectSnapshot>,
}

/// The outcome of a detection cycle. `objects` is only present when the cycle ran.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerUpdateResult {
    pub status: TrackerUpdateStatus,
    pub objects: Option<TrackedObjects>,
}

impl TrackerUpdateResult {
    fn rejected(status: TrackerUpdateStatus) -> TrackerUpdateResult {
        TrackerUpdateResult {
            status,
            objects: None,
        }
    }
}

/// This is the multi-object tracker.
///
/// # Examples
///
/// ```
/// use nalgebra::Point3;
/// use std::time::Duration;
/// use tracking_rs::{
///     DetectedObject, DetectedObjects, Header, MultiObjectTracker, MultiObjectTrackerOptions,
///     Odometry, Shape,
/// };
///
/// // instantiate tracker with default parameters
/// let mut tracker = MultiObjectTracker::new(MultiObjectTrackerOptions::default());
///
/// // a detection in the sensor frame
/// let centroid = Point3::new(10.0, 0.0, 0.0);
/// let detections = DetectedObjects::new(
///     Header::new(Duration::from_millis(100), "base_link"),
///     vec![DetectedObject::new(centroid, Shape::from_box(&centroid, 4.0, 2.0, 1.5))],
/// );
///
/// // the pose of the sensor frame in the tracking frame
/// let odometry = Odometry::identity(Header::new(Duration::from_millis(100), "map"), "base_link");
///
/// let result = tracker.update(detections, &odometry);
///
/// // print tracks
/// for track in result.objects.unwrap().objects {
///     println!("{} {:?} {:?}", track.object_id, track.position, track.velocity);
/// }
///```
#[derive(Debug, Clone)]
pub struct MultiObjectTracker<OA = ObjectAssociator, VA = VisionAssociator> {
    options: MultiObjectTrackerOptions,
    /// Associates detections with tracks.
    object_associator: OA,
    /// Associates camera regions of interest with tracks.
    vision_associator: VA,
    /// Spawns tracks for unassociated observations.
    track_creator: TrackCreator,
    /// The live tracks.
    tracks: Vec<TrackedObject>,
    /// Capture time of the last detection cycle that ran.
    last_update: Option<Duration>,
}

impl Default for MultiObjectTracker {
    fn default() -> Self {
        Self::new(MultiObjectTrackerOptions::default())
    }
}

impl MultiObjectTracker {
    /// Returns a new MultiObjectTracker using the default associators
    ///
    /// # Parameters
    ///
    /// * `options`: Parameters of the tracker.
    pub fn new(options: MultiObjectTrackerOptions) -> MultiObjectTracker {
        let object_associator = ObjectAssociator::new(options.object_association_config.clone());
        let vision_associator = VisionAssociator::new(options.vision_association_config.clone());
        MultiObjectTracker::with_associators(options, object_associator, vision_associator)
    }
}

impl<OA, VA> MultiObjectTracker<OA, VA>
where
    OA: Associator<DetectedObjects>,
    VA: for<'a> Associator<CameraRois<'a>>,
{
    /// Returns a new MultiObjectTracker
    ///
    /// # Parameters
    ///
    /// * `options`: Parameters of the tracker. The association configs are not used by custom associators.
    /// * `object_associator`: Associates detections with tracks.
    /// * `vision_associator`: Associates camera regions of interest with tracks.
    pub fn with_associators(
        options: MultiObjectTrackerOptions,
        object_associator: OA,
        vision_associator: VA,
    ) -> MultiObjectTracker<OA, VA> {
        MultiObjectTracker {
            track_creator: TrackCreator::new(options.track_creator_config.clone()),
            options,
            object_associator,
            vision_associator,
            tracks: vec![],
            last_update: None,
        }
    }

    /// Return the options
    pub fn options(&self) -> &MultiObjectTrackerOptions {
        &self.options
    }

    /// Return the live tracks
    pub fn tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    /// Return the capture time of the last detection cycle that ran
    pub fn last_update(&self) -> Option<Duration> {
        self.last_update
    }

    /// Return the track creator
    pub fn track_creator(&self) -> &TrackCreator {
        &self.track_creator
    }

    /// Check that a detection cycle can be applied. The checks run in a fixed order and the first
    /// failure is returned.
    ///
    /// # Parameters
    ///
    /// * `detections`: A batch of detections in the odometry child frame.
    /// * `odometry`: The pose of the odometry child frame in the tracking frame.
    pub fn validate(
        &self,
        detections: &DetectedObjects,
        odometry: &Odometry,
    ) -> TrackerUpdateStatus {
        if matches!(self.last_update, Some(last_update) if detections.header.stamp < last_update) {
            return TrackerUpdateStatus::WentBackInTime;
        }
        if detections.header.frame_id != odometry.child_frame_id {
            return TrackerUpdateStatus::DetectionFrameMismatch;
        }
        if odometry.header.frame_id != self.options.frame {
            return TrackerUpdateStatus::TrackerFrameMismatch;
        }
        if !geometry::is_gravity_aligned(&odometry.pose.rotation) {
            return TrackerUpdateStatus::FrameNotGravityAligned;
        }
        TrackerUpdateStatus::Ok
    }

    /// Run one detection cycle: predict the tracks to the capture time of the batch, update them
    /// with the associated detections, spawn tracks for the rest and prune stale tracks.
    ///
    /// Nothing is changed if the cycle is rejected.
    ///
    /// # Parameters
    ///
    /// * `detections`: A batch of detections in the odometry child frame.
    /// * `odometry`: The pose of the odometry child frame in the tracking frame.
    pub fn update(
        &mut self,
        mut detections: DetectedObjects,
        odometry: &Odometry,
    ) -> TrackerUpdateResult {
        let status = self.validate(&detections, odometry);
        if status != TrackerUpdateStatus::Ok {
            warn!(
                stamp = ?detections.header.stamp,
                frame_id = %detections.header.frame_id,
                "rejecting detections: {}",
                status
            );
            return TrackerUpdateResult::rejected(status);
        }

        geometry::transform_detections(&mut detections, odometry, &self.options.frame);

        let stamp = detections.header.stamp;
        let dt = self
            .last_update
            .map(|last_update| stamp.saturating_sub(last_update))
            .unwrap_or_default();
        self.tracks.iter_mut().for_each(|track| track.predict(dt));

        let result = self.object_associator.assign(&detections, &self.tracks);

        self.tracks.iter_mut().enumerate().for_each(|(idx, track)| {
            let detection = result
                .assigned_observation(idx)
                .and_then(|detection_idx| detections.objects.get(detection_idx));
            match detection {
                Some(detection) => {
                    if let Err(err) = track.update(detection) {
                        warn!(object_id = %track.object_id(), "track update failed: {}", err);
                        track.no_update();
                    }
                }
                None => track.no_update(),
            }
        });

        self.track_creator.add_objects(&detections, &result);
        let created = self.track_creator.create_tracks();
        let num_created = created.len();
        self.tracks.extend(created);

        let num_tracks = self.tracks.len();
        let (time_threshold, ticks_threshold) = (
            self.options.pruning_time_threshold,
            self.options.pruning_ticks_threshold,
        );
        self.tracks
            .retain(|track| !track.should_be_removed(time_threshold, ticks_threshold));

        self.last_update = Some(stamp);

        debug!(
            stamp = ?stamp,
            detections = detections.objects.len(),
            matched = result.num_assigned(),
            created = num_created,
            pruned = num_tracks - self.tracks.len(),
            tracks = self.tracks.len(),
            "detection cycle"
        );

        let status = if result.had_errors {
            TrackerUpdateStatus::InvalidShape
        } else {
            TrackerUpdateStatus::Ok
        };

        TrackerUpdateResult {
            status,
            objects: Some(self.msg(stamp)),
        }
    }

    /// Merge the classifications of camera regions of interest into the tracks they match. The
    /// remaining regions are handed to the track creator.
    ///
    /// Track kinematics, the track count and the last update time are not changed.
    ///
    /// # Parameters
    ///
    /// * `rois`: The regions of interest found in one camera image.
    /// * `tf_camera_from_track`: Transform from the tracking frame into the camera optical frame.
    pub fn update_vision(
        &mut self,
        rois: &ClassifiedRoiArray,
        tf_camera_from_track: &Isometry3<f64>,
    ) {
        let result = self.vision_associator.assign(
            &CameraRois {
                rois,
                tf_camera_from_track,
            },
            &self.tracks,
        );

        self.tracks.iter_mut().enumerate().for_each(|(idx, track)| {
            if let Some(roi) = result
                .assigned_observation(idx)
                .and_then(|roi_idx| rois.rois.get(roi_idx))
            {
                track.update_classification(&roi.classifications);
            }
        });

        self.track_creator
            .add_rois(rois, tf_camera_from_track, &result);

        debug!(
            stamp = ?rois.header.stamp,
            rois = rois.rois.len(),
            matched = result.num_assigned(),
            had_errors = result.had_errors,
            "vision cycle"
        );
    }

    /// Returns the output representation of the live tracks.
    fn msg(&self, stamp: Duration) -> TrackedObjects {
        TrackedObjects {
            header: Header::new(stamp, self.options.frame.clone()),
            objects: self.tracks.iter().map(|track| track.msg()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use anyhow::Result;
    use assert_approx_eq::assert_approx_eq;
    use itertools::Itertools;
    use nalgebra::{
        Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3,
    };
    use rand::prelude::*;
    use rand_distr::Normal;
    use rand_pcg::{Lcg64Xsh32, Pcg32};
    use std::time::Duration;

    fn detection(x: f64, y: f64) -> DetectedObject {
        let centroid = Point3::new(x, y, 0.0);
        DetectedObject::new(centroid, Shape::from_box(&centroid, 2.0, 2.0, 1.5))
    }

    fn batch(millis: u64, objects: Vec<DetectedObject>) -> DetectedObjects {
        DetectedObjects::new(Header::new(Duration::from_millis(millis), "base_link"), objects)
    }

    fn odometry(millis: u64) -> Odometry {
        Odometry::identity(Header::new(Duration::from_millis(millis), "map"), "base_link")
    }

    fn tracker(pruning_time: Duration, pruning_ticks: usize) -> MultiObjectTracker {
        MultiObjectTracker::new(MultiObjectTrackerOptions::new(
            None,
            Some(pruning_time),
            Some(pruning_ticks),
        ))
    }

    /// Camera at the tracking frame origin looking along +x.
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

    fn ids(tracker: &MultiObjectTracker) -> Vec<uuid::Uuid> {
        tracker.tracks().iter().map(|track| track.object_id()).collect()
    }

    #[test]
    fn options() -> Result<()> {
        let options = MultiObjectTrackerOptions::default();
        assert_eq!(options.frame(), "map");
        assert_eq!(options.pruning_time_threshold(), Duration::from_secs(1));
        assert_eq!(options.pruning_ticks_threshold(), 5);

        let options = serde_json::from_str::<MultiObjectTrackerOptions>(
            r#"{
                "frame": "odom",
                "pruning_ticks_threshold": 3,
                "object_association_config": { "max_distance": 2.5 },
                "track_creator_config": { "policy": "LidarClustersIfVision" }
            }"#,
        )?;
        assert_eq!(options.frame(), "odom");
        assert_eq!(options.pruning_time_threshold(), Duration::from_secs(1));
        assert_eq!(options.pruning_ticks_threshold(), 3);
        assert_eq!(options.object_association_config().max_distance(), 2.5);
        assert_eq!(options.object_association_config().max_area_ratio(), 10.0);
        assert_eq!(
            options.track_creator_config().policy(),
            TrackCreationPolicy::LidarClustersIfVision
        );
        assert_eq!(options.track_creator_config().default_variance(), 10.0);

        Ok(())
    }

    #[test]
    fn went_back_in_time() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        let result = tracker.update(batch(1000, vec![detection(10.0, 0.0)]), &odometry(1000));
        assert_eq!(result.status, TrackerUpdateStatus::Ok);

        let before = ids(&tracker);
        let position = tracker.tracks()[0].position();

        for _ in 0..3 {
            let result = tracker.update(batch(900, vec![detection(20.0, 0.0)]), &odometry(900));
            assert_eq!(result.status, TrackerUpdateStatus::WentBackInTime);
            assert!(result.objects.is_none());
        }

        assert_eq!(ids(&tracker), before);
        assert_eq!(tracker.tracks()[0].position(), position);
        assert_eq!(tracker.tracks()[0].ticks_since_last_update(), 0);
        assert_eq!(tracker.last_update(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn same_stamp_is_accepted() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        tracker.update(batch(1000, vec![detection(10.0, 0.0)]), &odometry(1000));
        let result = tracker.update(batch(1000, vec![detection(10.0, 0.0)]), &odometry(1000));

        assert_eq!(result.status, TrackerUpdateStatus::Ok);
        assert_eq!(tracker.tracks().len(), 1);
    }

    /// A tracker holding one track created at 1s.
    fn seeded() -> MultiObjectTracker {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        let result = tracker.update(batch(1000, vec![detection(10.0, 0.0)]), &odometry(1000));
        assert_eq!(result.status, TrackerUpdateStatus::Ok);
        tracker
    }

    fn assert_unchanged(tracker: &MultiObjectTracker, before: &MultiObjectTracker) {
        assert_eq!(ids(tracker), ids(before));
        tracker
            .tracks()
            .iter()
            .zip(before.tracks())
            .for_each(|(track, expected)| {
                assert_eq!(track.position(), expected.position());
                assert_eq!(track.covariance(), expected.covariance());
                assert_eq!(
                    track.ticks_since_last_update(),
                    expected.ticks_since_last_update()
                );
                assert_eq!(
                    track.time_since_last_update(),
                    expected.time_since_last_update()
                );
            });
        assert_eq!(tracker.last_update(), before.last_update());
    }

    #[test]
    fn detection_frame_mismatch() {
        let mut tracker = seeded();
        let before = tracker.clone();
        let mut detections = batch(1100, vec![detection(10.1, 0.0), detection(30.0, 0.0)]);
        detections.header.frame_id = "lidar".to_string();

        let result = tracker.update(detections, &odometry(1100));

        assert_eq!(result.status, TrackerUpdateStatus::DetectionFrameMismatch);
        assert!(result.objects.is_none());
        assert_unchanged(&tracker, &before);
    }

    #[test]
    fn tracker_frame_mismatch() {
        let mut tracker = seeded();
        let before = tracker.clone();
        let mut odometry = odometry(1100);
        odometry.header.frame_id = "odom".to_string();

        let result = tracker.update(
            batch(1100, vec![detection(10.1, 0.0), detection(30.0, 0.0)]),
            &odometry,
        );

        assert_eq!(result.status, TrackerUpdateStatus::TrackerFrameMismatch);
        assert!(result.objects.is_none());
        assert_unchanged(&tracker, &before);
    }

    #[test]
    fn frame_not_gravity_aligned() {
        let mut tracker = seeded();
        let before = tracker.clone();
        let mut odometry = odometry(1100);
        odometry.pose.rotation = UnitQuaternion::from_euler_angles(0.2, 0.0, 0.0);

        let result = tracker.update(
            batch(1100, vec![detection(10.1, 0.0), detection(30.0, 0.0)]),
            &odometry,
        );

        assert_eq!(result.status, TrackerUpdateStatus::FrameNotGravityAligned);
        assert!(result.objects.is_none());
        assert_unchanged(&tracker, &before);

        odometry.pose.rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, 2.0);
        let result = tracker.update(batch(1100, vec![]), &odometry);
        assert_eq!(result.status, TrackerUpdateStatus::Ok);
        assert_eq!(tracker.last_update(), Some(Duration::from_millis(1100)));
    }

    #[test]
    fn validation_order() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        tracker.update(batch(1000, vec![]), &odometry(1000));

        let mut odometry = odometry(900);
        odometry.header.frame_id = "odom".to_string();
        odometry.pose.rotation = UnitQuaternion::from_euler_angles(0.5, 0.0, 0.0);
        let mut detections = batch(900, vec![]);
        detections.header.frame_id = "lidar".to_string();

        assert_eq!(
            tracker.validate(&detections, &odometry),
            TrackerUpdateStatus::WentBackInTime
        );
        detections.header.stamp = Duration::from_millis(1100);
        assert_eq!(
            tracker.validate(&detections, &odometry),
            TrackerUpdateStatus::DetectionFrameMismatch
        );
        detections.header.frame_id = "base_link".to_string();
        assert_eq!(
            tracker.validate(&detections, &odometry),
            TrackerUpdateStatus::TrackerFrameMismatch
        );
        odometry.header.frame_id = "map".to_string();
        assert_eq!(
            tracker.validate(&detections, &odometry),
            TrackerUpdateStatus::FrameNotGravityAligned
        );
    }

    #[test]
    fn invalid_shape() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        let mut degenerate = detection(20.0, 0.0);
        degenerate.shape.polygon.truncate(2);

        let result = tracker.update(
            batch(1000, vec![degenerate, detection(10.0, 0.0)]),
            &odometry(1000),
        );

        assert_eq!(result.status, TrackerUpdateStatus::InvalidShape);
        let objects = result.objects.unwrap();
        assert_eq!(objects.objects.len(), 1);
        assert_eq!(objects.objects[0].position, Point3::new(10.0, 0.0, 0.0));
        assert_eq!(tracker.last_update(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn invalid_centroid() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        let mut not_finite = detection(20.0, 0.0);
        not_finite.kinematics.centroid_position.x = f64::NAN;

        let result = tracker.update(
            batch(1000, vec![not_finite, detection(10.0, 0.0)]),
            &odometry(1000),
        );

        assert_eq!(result.status, TrackerUpdateStatus::InvalidShape);
        assert!(result.status.is_applied());
        let objects = result.objects.unwrap();
        assert_eq!(objects.objects.len(), 1);
        assert_eq!(objects.objects[0].position, Point3::new(10.0, 0.0, 0.0));
        assert_eq!(tracker.track_creator().num_buffered_detections(), 0);
    }

    #[test]
    fn invalid_covariance() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();

        for millis in [1000, 1100, 1200, 1300] {
            let corrupt = detection(10.0, 0.0)
                .with_position_covariance(Matrix3::from_element(f64::NAN));
            let result = tracker.update(batch(millis, vec![corrupt]), &odometry(millis));

            assert_eq!(result.status, TrackerUpdateStatus::InvalidShape);
            assert!(result.objects.unwrap().objects.is_empty());
            assert!(tracker.tracks().is_empty());
        }

        let result = tracker.update(batch(1400, vec![detection(10.0, 0.0)]), &odometry(1400));
        assert_eq!(result.status, TrackerUpdateStatus::Ok);
        assert_eq!(tracker.tracks().len(), 1);
    }

    #[test]
    fn infinite_gating_threshold() {
        let mut options = MultiObjectTrackerOptions::default();
        let mut object_association = ObjectAssociationConfig::default();
        object_association.with_gating_threshold(f64::INFINITY);
        options.with_object_association_config(object_association);
        assert!(options.validate().is_ok());

        let mut tracker = MultiObjectTracker::new(options);
        tracker.update(batch(0, vec![detection(10.0, 0.0)]), &odometry(0));
        let before = ids(&tracker);

        for millis in [100, 200, 300] {
            let result =
                tracker.update(batch(millis, vec![detection(10.0, 0.0)]), &odometry(millis));
            assert_eq!(result.status, TrackerUpdateStatus::Ok);
            assert_eq!(ids(&tracker), before);
            assert_eq!(tracker.tracks()[0].ticks_since_last_update(), 0);
        }
    }

    #[test]
    fn options_validate() {
        assert!(MultiObjectTrackerOptions::default().validate().is_ok());

        let mut options = MultiObjectTrackerOptions::default();
        let mut object_association = ObjectAssociationConfig::default();
        object_association.with_gating_threshold(f64::NAN);
        options.with_object_association_config(object_association);
        assert!(options.validate().is_err());

        let mut options = MultiObjectTrackerOptions::default();
        let mut vision_association = VisionAssociationConfig::default();
        vision_association.with_iou_threshold(1.5);
        options.with_vision_association_config(vision_association);
        assert!(options.validate().is_err());

        let mut options = MultiObjectTrackerOptions::default();
        let mut track_creator = TrackCreatorConfig::default();
        track_creator.with_noise_variance(0.0);
        options.with_track_creator_config(track_creator);
        assert!(options.validate().is_err());

        let mut options = MultiObjectTrackerOptions::default();
        let mut track_creator = TrackCreatorConfig::default();
        track_creator.with_kalman(KalmanFilter::new(Some(f64::NAN)));
        options.with_track_creator_config(track_creator);
        assert!(options.validate().is_err());
    }

    #[test]
    fn prune_by_ticks() {
        let mut tracker = tracker(Duration::from_secs(100), 2);
        tracker.update(batch(0, vec![detection(10.0, 0.0)]), &odometry(0));

        for millis in [100, 200] {
            tracker.update(batch(millis, vec![]), &odometry(millis));
            assert_eq!(tracker.tracks().len(), 1);
        }
        tracker.update(batch(300, vec![]), &odometry(300));
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn prune_by_time() {
        let mut tracker = tracker(Duration::from_secs(1), 100);
        tracker.update(batch(0, vec![detection(10.0, 0.0)]), &odometry(0));

        tracker.update(batch(1000, vec![]), &odometry(1000));
        assert_eq!(tracker.tracks().len(), 1);

        let result = tracker.update(batch(1500, vec![]), &odometry(1500));
        assert!(tracker.tracks().is_empty());
        assert!(result.objects.unwrap().objects.is_empty());
    }

    #[test]
    fn updated_tracks_survive() {
        let mut tracker = tracker(Duration::from_millis(300), 1);

        for millis in (0..2000).step_by(100) {
            tracker.update(batch(millis, vec![detection(10.0, 0.0)]), &odometry(millis));
        }

        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].hits(), 20);
    }

    #[test]
    fn end_to_end() -> Result<()> {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        tracker.update(batch(1000, vec![detection(10.0, 0.0)]), &odometry(1000));
        let existing = tracker.tracks()[0].object_id();

        let result = tracker.update(
            batch(1100, vec![detection(30.0, 5.0), detection(10.2, 0.0)]),
            &odometry(1100),
        );

        assert_eq!(result.status, TrackerUpdateStatus::Ok);
        let objects = result
            .objects
            .ok_or_else(|| anyhow::anyhow!("objects missing"))?;
        assert_eq!(objects.header.frame_id, "map");
        assert_eq!(objects.header.stamp, Duration::from_millis(1100));
        assert_eq!(objects.objects.len(), 2);

        let updated = tracker
            .tracks()
            .iter()
            .find(|track| track.object_id() == existing)
            .ok_or_else(|| anyhow::anyhow!("track missing"))?;
        assert!(updated.position().x > 10.0 && updated.position().x <= 10.2);
        assert_eq!(updated.ticks_since_last_update(), 0);
        assert_eq!(updated.hits(), 2);

        let created = tracker
            .tracks()
            .iter()
            .filter(|track| track.object_id() != existing)
            .collect::<Vec<_>>();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].position(), Point3::new(30.0, 5.0, 0.0));

        Ok(())
    }

    #[test]
    fn transform_into_tracking_frame() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        let odometry = Odometry::new(
            Header::new(Duration::from_millis(1000), "map"),
            "base_link",
            Isometry3::new(Vector3::new(100.0, 50.0, 0.0), Vector3::z() * std::f64::consts::PI),
            Twist::default(),
        );

        let result = tracker.update(batch(1000, vec![detection(10.0, 0.0)]), &odometry);
        let position = result.objects.unwrap().objects[0].position;

        assert_approx_eq!(position.x, 90.0);
        assert_approx_eq!(position.y, 50.0);
    }

    #[test]
    fn vision_only() {
        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        tracker.update(
            batch(1000, vec![detection(10.0, 0.0), detection(10.0, 8.0)]),
            &odometry(1000),
        );
        let before = tracker
            .tracks()
            .iter()
            .map(|track| (track.object_id(), track.position(), *track.covariance()))
            .collect::<Vec<_>>();

        let rois = ClassifiedRoiArray::new(
            Header::new(Duration::from_millis(1050), "camera"),
            vec![ClassifiedRoi::new(
                vec![ObjectClassification::new(ObjectClass::Pedestrian, 1.0)],
                vec![
                    Point2::new(850.0, 375.0),
                    Point2::new(1070.0, 375.0),
                    Point2::new(1070.0, 540.0),
                    Point2::new(850.0, 540.0),
                ],
            )],
        );
        tracker.update_vision(&rois, &tf_camera_from_track());

        let after = tracker
            .tracks()
            .iter()
            .map(|track| (track.object_id(), track.position(), *track.covariance()))
            .collect::<Vec<_>>();
        assert_eq!(after, before);
        assert_eq!(tracker.last_update(), Some(Duration::from_millis(1000)));

        assert_approx_eq!(
            tracker.tracks()[0]
                .classification()
                .probability(ObjectClass::Pedestrian),
            0.5
        );
        assert_approx_eq!(
            tracker.tracks()[1]
                .classification()
                .probability(ObjectClass::Unknown),
            1.0
        );
    }

    /// An associator that flags every batch as containing an uninterpretable shape.
    struct FlaggingAssociator;

    impl Associator<DetectedObjects> for FlaggingAssociator {
        fn assign(
            &self,
            observations: &DetectedObjects,
            tracks: &[TrackedObject],
        ) -> AssociatorResult {
            AssociatorResult::unassigned(tracks.len(), observations.objects.len(), true)
        }
    }

    #[test]
    fn custom_associator() {
        let mut tracker = MultiObjectTracker::with_associators(
            MultiObjectTrackerOptions::default(),
            FlaggingAssociator,
            VisionAssociator::default(),
        );

        let result = tracker.update(batch(1000, vec![detection(10.0, 0.0)]), &odometry(1000));
        assert_eq!(result.status, TrackerUpdateStatus::InvalidShape);
        assert_eq!(tracker.tracks().len(), 1);

        let result = tracker.update(batch(1100, vec![detection(10.0, 0.0)]), &odometry(1100));
        assert_eq!(result.status, TrackerUpdateStatus::InvalidShape);
        assert_eq!(tracker.tracks().len(), 2);
        assert_eq!(tracker.tracks()[0].ticks_since_last_update(), 1);
    }

    #[test]
    fn vision_confirmed_creation() {
        let mut options = MultiObjectTrackerOptions::default();
        options.with_track_creator_config(TrackCreatorConfig::new(Some(
            TrackCreationPolicy::LidarClustersIfVision,
        )));
        let mut tracker = MultiObjectTracker::new(options);

        let rois = ClassifiedRoiArray::new(
            Header::new(Duration::from_millis(950), "camera"),
            vec![ClassifiedRoi::new(
                vec![ObjectClassification::new(ObjectClass::Car, 0.7)],
                vec![
                    Point2::new(850.0, 375.0),
                    Point2::new(1070.0, 375.0),
                    Point2::new(1070.0, 540.0),
                    Point2::new(850.0, 540.0),
                ],
            )],
        );
        tracker.update_vision(&rois, &tf_camera_from_track());

        let result = tracker.update(
            batch(1000, vec![detection(10.0, 0.0), detection(10.0, 8.0)]),
            &odometry(1000),
        );

        assert_eq!(result.status, TrackerUpdateStatus::Ok);
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(
            tracker.tracks()[0].classification().most_likely().classification,
            ObjectClass::Car
        );
    }

    /// Returns a vec of length n with a normal distribution
    fn normal_vec(rng: &mut Lcg64Xsh32, mean: f64, std_dev: f64, n: usize) -> Vec<f64> {
        let normal = Normal::<f64>::new(mean, std_dev).unwrap();
        (0..n).map(|_| normal.sample(rng)).collect()
    }

    #[test]
    fn tracker_scenario() {
        let iterations = 50;

        // deterministic generator
        let mut rng = Pcg32::seed_from_u64(0);
        let mut jitter = normal_vec(&mut rng, 0.0, 0.05, 4 * iterations);

        let mut tracker: MultiObjectTracker = MultiObjectTracker::default();
        let mut first_ids = vec![];

        for iteration in 0..iterations {
            let millis = 100 * iteration as u64;
            let t = iteration as f64 * 0.1;

            // move right
            let d0 = detection(
                0.0 + t + jitter.pop().unwrap(),
                0.0 + jitter.pop().unwrap(),
            );
            // move left
            let d1 = detection(
                20.0 - t + jitter.pop().unwrap(),
                10.0 + jitter.pop().unwrap(),
            );

            let result = tracker.update(batch(millis, vec![d0, d1]), &odometry(millis));
            assert_eq!(result.status, TrackerUpdateStatus::Ok);

            if iteration == 0 {
                first_ids = ids(&tracker);
            }
        }

        assert_eq!(tracker.tracks().len(), 2);
        assert_eq!(
            ids(&tracker).into_iter().sorted().collect::<Vec<_>>(),
            first_ids.into_iter().sorted().collect::<Vec<_>>()
        );

        let (right, left) = tracker
            .tracks()
            .iter()
            .sorted_by(|a, b| a.position().y.total_cmp(&b.position().y))
            .collect_tuple()
            .unwrap();
        assert!((right.velocity().x - 1.0).abs() < 0.2);
        assert!(right.velocity().y.abs() < 0.2);
        assert!((left.velocity().x + 1.0).abs() < 0.2);
        assert!(left.velocity().y.abs() < 0.2);
        assert!((right.position().x - 4.9).abs() < 0.3);
        assert!((left.position().x - 15.1).abs() < 0.3);
    }
}
