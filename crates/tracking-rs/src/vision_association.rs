use crate::*;
use nalgebra::{Isometry3, Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Pinhole camera model. Points are expressed in the optical frame: z forward, x right, y down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Image width in pixels.
    pub width: f64,
    /// Image height in pixels.
    pub height: f64,
    /// Focal length along x, in pixels.
    pub fx: f64,
    /// Focal length along y, in pixels.
    pub fy: f64,
    /// Principal point x, in pixels.
    pub ox: f64,
    /// Principal point y, in pixels.
    pub oy: f64,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        CameraIntrinsics {
            width: 1920.0,
            height: 1080.0,
            fx: 1000.0,
            fy: 1000.0,
            ox: 960.0,
            oy: 540.0,
        }
    }
}

impl CameraIntrinsics {
    /// Returns the pixel a point projects to, or None if the point is not in front of the camera.
    pub fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= f64::EPSILON || !point.coords.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Point2::new(
            self.fx * point.x / point.z + self.ox,
            self.fy * point.y / point.z + self.oy,
        ))
    }
}

/// Parameters for associating camera regions of interest with tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionAssociationConfig {
    intrinsics: CameraIntrinsics,
    /// Minimum intersection over union for a region to match a track.
    iou_threshold: f64,
}

impl Default for VisionAssociationConfig {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl VisionAssociationConfig {
    /// Returns a new VisionAssociationConfig
    ///
    /// # Arguments
    ///
    /// * `intrinsics`: The camera model. Default 1920x1080 pixels with a focal length of 1000 pixels.
    /// * `iou_threshold`: Minimum intersection over union for a region to match a track. Default `0.1`.
    pub fn new(
        intrinsics: Option<CameraIntrinsics>,
        iou_threshold: Option<f64>,
    ) -> VisionAssociationConfig {
        VisionAssociationConfig {
            intrinsics: intrinsics.unwrap_or_default(),
            iou_threshold: iou_threshold.unwrap_or(0.1),
        }
    }

    /// Set intrinsics
    pub fn with_intrinsics(&mut self, intrinsics: CameraIntrinsics) -> &mut Self {
        self.intrinsics = intrinsics;
        self
    }

    /// Set iou_threshold
    pub fn with_iou_threshold(&mut self, iou_threshold: f64) -> &mut Self {
        self.iou_threshold = iou_threshold;
        self
    }

    /// Return the intrinsics
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Return the iou_threshold
    pub fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }
}

/// A batch of regions of interest together with the transform from the tracking frame into the
/// camera optical frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraRois<'a> {
    pub rois: &'a ClassifiedRoiArray,
    pub tf_camera_from_track: &'a Isometry3<f64>,
}

/// Associates camera regions of interest with tracks by intersection over union of their
/// image space bounding boxes.
#[derive(Debug, Clone, Default)]
pub struct VisionAssociator {
    config: VisionAssociationConfig,
}

impl VisionAssociator {
    /// Returns a new VisionAssociator
    pub fn new(config: VisionAssociationConfig) -> VisionAssociator {
        VisionAssociator { config }
    }

    /// Return the config
    pub fn config(&self) -> &VisionAssociationConfig {
        &self.config
    }

    /// Returns the image space bounding box of a shape, or None if no part of it is visible.
    ///
    /// # Parameters
    ///
    /// * `shape`: A shape in the tracking frame.
    /// * `tf_camera_from_track`: Transform from the tracking frame into the camera optical frame.
    pub fn project_shape(
        &self,
        shape: &Shape,
        tf_camera_from_track: &Isometry3<f64>,
    ) -> Option<BoundingBox> {
        let intrinsics = &self.config.intrinsics;
        let pixels = shape
            .vertices()
            .filter_map(|vertex| intrinsics.project(&(tf_camera_from_track * vertex)))
            .collect::<Vec<_>>();

        BoundingBox::from_points(pixels.iter())?.clip(intrinsics.width, intrinsics.height)
    }

    /// Associate regions of interest with arbitrary shapes.
    ///
    /// # Parameters
    ///
    /// * `rois`: The regions of interest.
    /// * `shapes`: Shapes in the tracking frame, one per track.
    /// * `tf_camera_from_track`: Transform from the tracking frame into the camera optical frame.
    pub fn assign_shapes(
        &self,
        rois: &[ClassifiedRoi],
        shapes: &[Shape],
        tf_camera_from_track: &Isometry3<f64>,
    ) -> AssociatorResult {
        let projections = shapes
            .iter()
            .map(|shape| self.project_shape(shape, tf_camera_from_track))
            .collect::<Vec<_>>();
        let roi_boxes = rois.iter().map(|roi| roi.bbox()).collect::<Vec<_>>();
        let had_errors = roi_boxes.iter().any(|bbox| bbox.is_none());

        let matches = iou_matching::iou_cost(&projections, &roi_boxes).and_then(|cost_matrix| {
            linear_assignment::min_cost_matching(&cost_matrix, 1.0 - self.config.iou_threshold)
        });

        match matches {
            Ok((matches, _, _)) => {
                trace!(
                    shapes = shapes.len(),
                    visible = projections.iter().flatten().count(),
                    rois = rois.len(),
                    matches = matches.len(),
                    "vision association"
                );
                AssociatorResult::from_matches(shapes.len(), rois.len(), &matches, had_errors)
            }
            Err(err) => {
                warn!("vision association failed: {}", err);
                AssociatorResult::unassigned(shapes.len(), rois.len(), had_errors)
            }
        }
    }
}

impl<'a> Associator<CameraRois<'a>> for VisionAssociator {
    fn assign(&self, observations: &CameraRois<'a>, tracks: &[TrackedObject]) -> AssociatorResult {
        let shapes = tracks.iter().map(|track| track.shape()).collect::<Vec<_>>();
        self.assign_shapes(
            &observations.rois.rois,
            &shapes,
            observations.tf_camera_from_track,
        )
    }
}
