#[macro_use]
extern crate lazy_static;

mod associator;
mod bounding_box;
mod classification;
mod detection;
pub mod geometry;
mod header;
pub mod iou_matching;
mod kalman_filter;
pub mod linear_assignment;
mod object_association;
mod odometry;
mod roi;
mod shape;
mod track;
mod track_creator;
mod tracker;
mod vision_association;

pub use associator::{Associator, AssociatorResult};
pub use bounding_box::BoundingBox;
pub use classification::{ClassificationTracker, ObjectClass, ObjectClassification};
pub use detection::{DetectedObject, DetectedObjectKinematics, DetectedObjects, Twist};
pub use header::Header;
pub use kalman_filter::{KalmanFilter, CHI2INV95};
pub use linear_assignment::Match;
pub use object_association::{ObjectAssociationConfig, ObjectAssociator};
pub use odometry::Odometry;
pub use roi::{ClassifiedRoi, ClassifiedRoiArray};
pub use shape::Shape;
pub use track::{TrackedObject, TrackedObjectSnapshot};
pub use track_creator::{TrackCreationPolicy, TrackCreator, TrackCreatorConfig};
pub use tracker::{
    MultiObjectTracker, MultiObjectTrackerOptions, TrackedObjects, TrackerUpdateResult,
    TrackerUpdateStatus,
};
pub use vision_association::{
    CameraIntrinsics, CameraRois, VisionAssociationConfig, VisionAssociator,
};
