use nalgebra::Point2;
use ndarray::*;

/// BoundingBox represents an axis aligned region in image space.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    /// Left of the bounding box (i.e. min-x)
    x: f64,
    /// Top of the bounding box (i.e. min-y)
    y: f64,
    /// Width of the bounding box
    width: f64,
    /// Height of the bounding box
    height: f64,
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
    }
}

impl BoundingBox {
    /// Returns a new BoundingBox
    ///
    /// # Parameters
    ///
    /// * `x`: Bounding box left.
    /// * `y`: Bounding box top.
    /// * `width`: Bounding box width.
    /// * `height`: Bounding box height.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the smallest BoundingBox containing every point, or None if there are no points,
    /// a coordinate is not finite, or the points do not enclose any area.
    pub fn from_points<'a>(
        points: impl IntoIterator<Item = &'a Point2<f64>>,
    ) -> Option<BoundingBox> {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for point in points {
            if !point.x.is_finite() || !point.y.is_finite() {
                return None;
            }
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        if max_x > min_x && max_y > min_y {
            Some(BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y))
        } else {
            None
        }
    }

    /// Returns the part of the bounding box inside an image of the given size, or None if they do
    /// not overlap.
    pub fn clip(&self, image_width: f64, image_height: f64) -> Option<BoundingBox> {
        let min_x = self.x.max(0.0);
        let min_y = self.y.max(0.0);
        let max_x = (self.x + self.width).min(image_width);
        let max_y = (self.y + self.height).min(image_height);

        if max_x > min_x && max_y > min_y {
            Some(BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y))
        } else {
            None
        }
    }

    /// Returns the x of the bounding box
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Returns the y of the bounding box
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Returns the width of the bounding box
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Returns the height of the bounding box
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Returns the area of the bounding box
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Returns the bounding box in left, top, width, height format, i.e., `(min x, min y, width, height)`.
    pub fn to_tlwh(&self) -> Array1<f64> {
        arr1::<f64>(&[self.x, self.y, self.width, self.height])
    }

    /// Returns the bounding box in top-left, bottom-right format, i.e., `(min x, min y, max x, max y)`.
    pub fn to_tlbr(&self) -> Array1<f64> {
        arr1::<f64>(&[self.x, self.y, self.x + self.width, self.y + self.height])
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use nalgebra::Point2;
    use ndarray::*;

    #[test]
    fn to_tlwh() {
        let bbox = BoundingBox::new(1.0, 2.0, 13.0, 4.0);
        assert_eq!(bbox.to_tlwh(), arr1::<f64>(&[1.0, 2.0, 13.0, 4.0]));
    }

    #[test]
    fn to_tlbr() {
        let bbox = BoundingBox::new(1.0, 2.0, 13.0, 4.0);
        assert_eq!(bbox.to_tlbr(), arr1::<f64>(&[1.0, 2.0, 14.0, 6.0]));
    }

    #[test]
    fn from_points() {
        let points = [
            Point2::new(4.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(2.0, 6.0),
        ];
        assert_eq!(
            BoundingBox::from_points(points.iter()),
            Some(BoundingBox::new(1.0, 1.0, 3.0, 5.0))
        );

        let line = [Point2::new(1.0, 1.0), Point2::new(1.0, 5.0)];
        assert_eq!(BoundingBox::from_points(line.iter()), None);

        let not_finite = [Point2::new(1.0, 1.0), Point2::new(f64::NAN, 5.0)];
        assert_eq!(BoundingBox::from_points(not_finite.iter()), None);
    }

    #[test]
    fn clip() {
        let bbox = BoundingBox::new(-10.0, 20.0, 30.0, 100.0);
        assert_eq!(
            bbox.clip(640.0, 100.0),
            Some(BoundingBox::new(0.0, 20.0, 20.0, 80.0))
        );
        assert_eq!(bbox.clip(640.0, 10.0), None);
    }
}
