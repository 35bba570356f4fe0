//! Validation and transformation of detections into the tracking frame.

use crate::*;
use nalgebra::UnitQuaternion;

/// Maximum rotation angle, in radians, for an orientation to count as gravity aligned.
pub const ANGLE_THRESHOLD: f64 = 0.1;

/// Maximum tilt, in radians, of the rotation axis away from the z axis for an orientation to
/// count as gravity aligned.
pub const AXIS_TILT_THRESHOLD: f64 = 0.1;

/// Returns true if the orientation has negligible pitch and roll: either the rotation is small,
/// or its axis is close to vertical.
pub fn is_gravity_aligned(orientation: &UnitQuaternion<f64>) -> bool {
    // coords are stored as [i, j, k, w]
    let coords = orientation.quaternion().coords;
    let (x, y, z, w) = (coords[0], coords[1], coords[2], coords[3]);

    if w.abs() >= (0.5 * ANGLE_THRESHOLD).cos() {
        return true;
    }

    let axis_norm = (x * x + y * y + z * z).sqrt();
    axis_norm > 0.0 && z.abs() / axis_norm >= AXIS_TILT_THRESHOLD.cos()
}

/// Transform a batch of detections from the odometry child frame into the tracking frame.
///
/// Positions and shapes are moved by the odometry pose. Covariances are rotated and twists are
/// rotated and offset by the odometry linear velocity; the pose uncertainty and the angular
/// velocity of the odometry are not taken into account.
///
/// # Parameters
///
/// * `detections`: The batch to transform in place.
/// * `odometry`: The pose and velocity of the detection frame in the tracking frame.
/// * `tracking_frame`: The frame identifier written to the batch header.
pub fn transform_detections(
    detections: &mut DetectedObjects,
    odometry: &Odometry,
    tracking_frame: &str,
) {
    let pose = &odometry.pose;
    let rotation = pose.rotation.to_rotation_matrix().into_inner();

    detections.objects.iter_mut().for_each(|detection| {
        let kinematics = &mut detection.kinematics;
        kinematics.centroid_position = pose * kinematics.centroid_position;

        if let Some(covariance) = kinematics.position_covariance.as_mut() {
            *covariance = rotation * *covariance * rotation.transpose();
        }

        if let Some(twist) = kinematics.twist.as_mut() {
            twist.linear = odometry.twist.linear + rotation * twist.linear;
        }

        detection.shape.transform(pose);
    });

    detections.header.frame_id = tracking_frame.to_string();
}
