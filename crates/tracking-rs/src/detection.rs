use crate::*;
use nalgebra::{Matrix2, Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

const COVARIANCE_TOLERANCE: f64 = 1e-9;

/// Linear and angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Twist::new(Vector3::zeros(), Vector3::zeros())
    }
}

impl Twist {
    /// Returns a new Twist
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Twist {
        Twist { linear, angular }
    }
}

/// Kinematic part of a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObjectKinematics {
    /// Position of the object centroid.
    pub centroid_position: Point3<f64>,
    /// Covariance of `centroid_position`, if the detector provides one.
    pub position_covariance: Option<Matrix3<f64>>,
    /// Velocity of the object, if the detector provides one.
    pub twist: Option<Twist>,
}

/// DetectedObject represents a single object observed by a range sensor in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Probability that the object exists.
    pub existence_probability: f32,
    /// Class hypotheses from the detector.
    pub classification: Vec<ObjectClassification>,
    pub kinematics: DetectedObjectKinematics,
    pub shape: Shape,
}

impl DetectedObject {
    /// Returns a new DetectedObject without covariance, twist or class hypotheses.
    ///
    /// # Parameters
    ///
    /// * `centroid_position`: Position of the object centroid.
    /// * `shape`: Footprint and height of the object, in the same frame as `centroid_position`.
    pub fn new(centroid_position: Point3<f64>, shape: Shape) -> DetectedObject {
        DetectedObject {
            existence_probability: 1.0,
            classification: vec![],
            kinematics: DetectedObjectKinematics {
                centroid_position,
                position_covariance: None,
                twist: None,
            },
            shape,
        }
    }

    /// Set the position covariance
    pub fn with_position_covariance(mut self, position_covariance: Matrix3<f64>) -> Self {
        self.kinematics.position_covariance = Some(position_covariance);
        self
    }

    /// Set the twist
    pub fn with_twist(mut self, twist: Twist) -> Self {
        self.kinematics.twist = Some(twist);
        self
    }

    /// Set the class hypotheses
    pub fn with_classification(mut self, classification: Vec<ObjectClassification>) -> Self {
        self.classification = classification;
        self
    }

    /// Returns true if the detection can be tracked: the shape is valid, the centroid is finite,
    /// the covariance (if present) is finite, symmetric and positive semi-definite, and the twist
    /// (if present) is finite.
    pub fn is_valid(&self) -> bool {
        let kinematics = &self.kinematics;
        self.shape.is_valid()
            && kinematics.centroid_position.coords.iter().all(|v| v.is_finite())
            && kinematics
                .position_covariance
                .as_ref()
                .map_or(true, is_valid_covariance)
            && kinematics.twist.as_ref().map_or(true, |twist| {
                twist.linear.iter().chain(twist.angular.iter()).all(|v| v.is_finite())
            })
    }

    /// Returns the x-y block of the position covariance, if present.
    pub fn planar_position_covariance(&self) -> Option<Matrix2<f64>> {
        self.kinematics
            .position_covariance
            .as_ref()
            .map(|covariance| covariance.fixed_view::<2, 2>(0, 0).into_owned())
    }
}

fn is_valid_covariance(covariance: &Matrix3<f64>) -> bool {
    if !covariance.iter().all(|v| v.is_finite()) {
        return false;
    }
    let tolerance = COVARIANCE_TOLERANCE * covariance.amax().max(1.0);
    if (covariance - covariance.transpose()).amax() > tolerance {
        return false;
    }
    covariance
        .symmetric_eigenvalues()
        .iter()
        .all(|eigenvalue| *eigenvalue >= -tolerance)
}

/// An ordered batch of detections sharing one capture time and frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedObjects {
    pub header: Header,
    pub objects: Vec<DetectedObject>,
}

impl DetectedObjects {
    /// Returns a new DetectedObjects
    pub fn new(header: Header, objects: Vec<DetectedObject>) -> DetectedObjects {
        DetectedObjects { header, objects }
    }
}
