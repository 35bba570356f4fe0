use crate::*;
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

/// Odometry describes the pose and velocity of a child frame relative to the parent frame named
/// in its header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    /// The parent frame, which must be the tracking frame.
    pub header: Header,
    /// The frame the detections were captured in.
    pub child_frame_id: String,
    /// Transform from the child frame into the parent frame.
    pub pose: Isometry3<f64>,
    /// Velocity of the child frame, expressed in the parent frame.
    pub twist: Twist,
}

impl Odometry {
    /// Returns a new Odometry
    pub fn new(
        header: Header,
        child_frame_id: impl Into<String>,
        pose: Isometry3<f64>,
        twist: Twist,
    ) -> Odometry {
        Odometry {
            header,
            child_frame_id: child_frame_id.into(),
            pose,
            twist,
        }
    }

    /// Returns an Odometry with no translation, rotation or velocity.
    pub fn identity(header: Header, child_frame_id: impl Into<String>) -> Odometry {
        Odometry::new(
            header,
            child_frame_id,
            Isometry3::identity(),
            Twist::default(),
        )
    }
}
