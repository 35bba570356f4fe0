use crate::*;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A classified region of interest in a camera image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRoi {
    pub classifications: Vec<ObjectClassification>,
    /// Outline of the region in pixel coordinates.
    pub polygon: Vec<Point2<f64>>,
}

impl ClassifiedRoi {
    /// Returns a new ClassifiedRoi
    pub fn new(
        classifications: Vec<ObjectClassification>,
        polygon: Vec<Point2<f64>>,
    ) -> ClassifiedRoi {
        ClassifiedRoi {
            classifications,
            polygon,
        }
    }

    /// Returns the bounding box of the region, or None if the polygon cannot be interpreted.
    pub fn bbox(&self) -> Option<BoundingBox> {
        if self.polygon.len() < 3 {
            return None;
        }
        BoundingBox::from_points(self.polygon.iter())
    }
}

/// The regions of interest found in one camera image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassifiedRoiArray {
    pub header: Header,
    pub rois: Vec<ClassifiedRoi>,
}

impl ClassifiedRoiArray {
    /// Returns a new ClassifiedRoiArray
    pub fn new(header: Header, rois: Vec<ClassifiedRoi>) -> ClassifiedRoiArray {
        ClassifiedRoiArray { header, rois }
    }
}
