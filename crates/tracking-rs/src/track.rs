use crate::*;
use anyhow::{anyhow, Result};
use nalgebra::{Matrix2, Matrix3, Matrix4, Point3, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use uuid::Uuid;

/// A single tracked object with planar state space `(x, y, vx, vy)`, where `(x, y)` is the
/// centroid of the object in the tracking frame and `(vx, vy)` its velocity.
#[derive(Clone)]
pub struct TrackedObject {
    /// A unique track identifier.
    object_id: Uuid,
    /// The Kalman filter driving the kinematic state.
    kf: KalmanFilter,
    /// Mean vector of the state distribution.
    mean: Vector4<f64>,
    /// Covariance matrix of the state distribution.
    covariance: Matrix4<f64>,
    /// Height of the centroid, taken from the latest detection.
    z: f64,
    /// Shape of the object relative to the centroid.
    shape: Shape,
    /// Smoothed class distribution.
    classifier: ClassificationTracker,
    /// Existence probability of the latest detection.
    existence_probability: f32,
    /// Measurement variance used when a detection carries no covariance.
    noise_variance: f64,
    /// Time elapsed since the last measurement update.
    time_since_last_update: Duration,
    /// Number of detection cycles since the last measurement update.
    ticks_since_last_update: usize,
    /// Total number of measurement updates.
    hits: usize,
}

impl std::fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedObject")
            .field("object_id", &self.object_id)
            .field("position", &self.position())
            .field("velocity", &self.velocity())
            .field("classification", &self.classifier.most_likely())
            .field("time_since_last_update", &self.time_since_last_update)
            .field("ticks_since_last_update", &self.ticks_since_last_update)
            .field("hits", &self.hits)
            .finish()
    }
}

impl PartialEq for TrackedObject {
    fn eq(&self, other: &Self) -> bool {
        self.object_id == other.object_id
    }
}

impl Eq for TrackedObject {}

impl Hash for TrackedObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object_id.hash(state);
    }
}

impl TrackedObject {
    /// Returns a new TrackedObject initialized from an unassociated detection.
    ///
    /// # Parameters
    ///
    /// * `detection`: The detection this track originates from, in the tracking frame.
    /// * `kf`: The Kalman filter.
    /// * `default_variance`: Variance used for any part of the initial state the detection does not measure.
    /// * `noise_variance`: Measurement variance used when a detection carries no covariance.
    pub fn new(
        detection: &DetectedObject,
        kf: KalmanFilter,
        default_variance: f64,
        noise_variance: f64,
    ) -> TrackedObject {
        let centroid = detection.kinematics.centroid_position;

        let position_covariance = detection
            .planar_position_covariance()
            .unwrap_or_else(|| Matrix2::identity() * default_variance);
        let (velocity, velocity_covariance) = match &detection.kinematics.twist {
            Some(twist) => (twist.linear.xy(), Matrix2::identity() * noise_variance),
            None => (Vector2::zeros(), Matrix2::identity() * default_variance),
        };

        let (mean, covariance) = kf.initiate(
            &centroid.xy().coords,
            &position_covariance,
            &velocity,
            &velocity_covariance,
        );

        TrackedObject {
            object_id: Uuid::new_v4(),
            kf,
            mean,
            covariance,
            z: centroid.z,
            shape: relative_shape(detection),
            classifier: ClassificationTracker::from_classifications(&detection.classification),
            existence_probability: detection.existence_probability,
            noise_variance,
            time_since_last_update: Duration::ZERO,
            ticks_since_last_update: 0,
            hits: 1,
        }
    }

    /// Return the identifier of the track
    pub fn object_id(&self) -> Uuid {
        self.object_id
    }

    /// Return the mean of the track
    pub fn mean(&self) -> &Vector4<f64> {
        &self.mean
    }

    /// Return the covariance of the track
    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.covariance
    }

    /// Return the centroid position of the track
    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.mean[0], self.mean[1], self.z)
    }

    /// Return the velocity of the track
    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.mean[2], self.mean[3], 0.0)
    }

    /// Return the shape of the track in the tracking frame
    pub fn shape(&self) -> Shape {
        let mut shape = self.shape.clone();
        shape.translate(&self.position().coords);
        shape
    }

    /// Return the footprint area of the track
    pub fn shape_area(&self) -> f64 {
        self.shape.area()
    }

    /// Return the class distribution of the track
    pub fn classification(&self) -> &ClassificationTracker {
        &self.classifier
    }

    /// Return the existence probability of the track
    pub fn existence_probability(&self) -> f32 {
        self.existence_probability
    }

    /// Return the time since the last measurement update
    pub fn time_since_last_update(&self) -> Duration {
        self.time_since_last_update
    }

    /// Return the number of detection cycles since the last measurement update
    pub fn ticks_since_last_update(&self) -> usize {
        self.ticks_since_last_update
    }

    /// Return the total number of measurement updates
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Propagate the state distribution to the current time step using a Kalman filter prediction step.
    ///
    /// # Parameters
    ///
    /// * `dt`: Time elapsed since the previous prediction.
    pub fn predict(&mut self, dt: Duration) {
        (self.mean, self.covariance) = self.kf.predict(&self.mean, &self.covariance, dt);
        self.time_since_last_update += dt;
    }

    /// Perform Kalman filter measurement update step with an associated detection.
    ///
    /// The state is only replaced when every correction succeeds, so a failed update leaves the
    /// track as it was.
    ///
    /// # Parameters
    ///
    /// * `detection`: The associated detection, in the tracking frame.
    pub fn update(&mut self, detection: &DetectedObject) -> Result<()> {
        let (mean, covariance) = self.kf.update(
            &self.mean,
            &self.covariance,
            &detection.kinematics.centroid_position.xy().coords,
            &self.measurement_noise(detection),
        )?;

        let (mean, covariance) = match &detection.kinematics.twist {
            Some(twist) => self.kf.update_velocity(
                &mean,
                &covariance,
                &twist.linear.xy(),
                &(Matrix2::identity() * self.noise_variance),
            )?,
            None => (mean, covariance),
        };

        self.mean = mean;
        self.covariance = covariance;
        self.z = detection.kinematics.centroid_position.z;
        self.shape = relative_shape(detection);
        self.existence_probability = detection.existence_probability;
        self.classifier.update(&detection.classification);
        self.hits += 1;
        self.time_since_last_update = Duration::ZERO;
        self.ticks_since_last_update = 0;

        Ok(())
    }

    /// Blend a set of class hypotheses into the class distribution.
    pub fn update_classification(&mut self, classification: &[ObjectClassification]) {
        self.classifier.update(classification);
    }

    /// Replace the class distribution with a set of class hypotheses.
    pub(crate) fn seed_classification(&mut self, classification: &[ObjectClassification]) {
        self.classifier = ClassificationTracker::from_classifications(classification);
    }

    /// Mark this track as missed for one detection cycle.
    pub fn no_update(&mut self) {
        self.ticks_since_last_update += 1;
    }

    /// Returns true if this track has not been updated for longer than either threshold.
    ///
    /// # Parameters
    ///
    /// * `time_threshold`: Maximum time since the last measurement update.
    /// * `ticks_threshold`: Maximum number of detection cycles since the last measurement update.
    pub fn should_be_removed(&self, time_threshold: Duration, ticks_threshold: usize) -> bool {
        self.time_since_last_update > time_threshold
            || self.ticks_since_last_update > ticks_threshold
    }

    /// Returns the squared Mahalanobis distance between the track position and a detection centroid.
    pub fn mahalanobis_distance(&self, detection: &DetectedObject) -> Result<f64> {
        self.kf
            .gating_distance(
                &self.mean,
                &self.covariance,
                &self.measurement_noise(detection),
                &[detection.kinematics.centroid_position.xy().coords],
            )?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("no gating distance computed"))
    }

    /// Returns the output representation of the track.
    pub fn msg(&self) -> TrackedObjectSnapshot {
        let mut position_covariance = Matrix3::zeros();
        position_covariance
            .fixed_view_mut::<2, 2>(0, 0)
            .copy_from(&self.covariance.fixed_view::<2, 2>(0, 0));

        TrackedObjectSnapshot {
            object_id: self.object_id,
            existence_probability: self.existence_probability,
            classification: self.classifier.classifications(),
            position: self.position(),
            position_covariance,
            velocity: self.velocity(),
            shape: self.shape(),
            time_since_last_update: self.time_since_last_update,
            ticks_since_last_update: self.ticks_since_last_update,
        }
    }

    fn measurement_noise(&self, detection: &DetectedObject) -> Matrix2<f64> {
        detection
            .planar_position_covariance()
            .unwrap_or_else(|| Matrix2::identity() * self.noise_variance)
    }
}

/// The shape of a detection expressed relative to its centroid.
fn relative_shape(detection: &DetectedObject) -> Shape {
    let mut shape = detection.shape.clone();
    shape.translate(&-detection.kinematics.centroid_position.coords);
    shape
}

/// The output representation of a track in the tracking frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObjectSnapshot {
    pub object_id: Uuid,
    pub existence_probability: f32,
    /// Class hypotheses, most likely first.
    pub classification: Vec<ObjectClassification>,
    pub position: Point3<f64>,
    /// Position covariance. Only the x-y block is estimated.
    pub position_covariance: Matrix3<f64>,
    pub velocity: Vector3<f64>,
    pub shape: Shape,
    pub time_since_last_update: Duration,
    pub ticks_since_last_update: usize,
}
