use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Shape represents the extent of an object: a footprint polygon extruded upwards by `height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Footprint vertices in order. The z coordinate of each vertex is the bottom of the object.
    pub polygon: Vec<Point3<f64>>,
    /// Extent of the object above its footprint.
    pub height: f64,
}

impl Shape {
    /// Returns a new Shape
    ///
    /// # Parameters
    ///
    /// * `polygon`: Footprint vertices in order.
    /// * `height`: Extent of the object above its footprint.
    pub fn new(polygon: Vec<Point3<f64>>, height: f64) -> Shape {
        Shape { polygon, height }
    }

    /// Returns an axis aligned box shape whose footprint is centered on `center`.
    ///
    /// # Parameters
    ///
    /// * `center`: Center of the footprint. Its z coordinate is the bottom of the box.
    /// * `length`: Extent along the x axis.
    /// * `width`: Extent along the y axis.
    /// * `height`: Extent along the z axis.
    pub fn from_box(center: &Point3<f64>, length: f64, width: f64, height: f64) -> Shape {
        let (dx, dy) = (length / 2.0, width / 2.0);
        Shape {
            polygon: vec![
                Point3::new(center.x - dx, center.y - dy, center.z),
                Point3::new(center.x + dx, center.y - dy, center.z),
                Point3::new(center.x + dx, center.y + dy, center.z),
                Point3::new(center.x - dx, center.y + dy, center.z),
            ],
            height,
        }
    }

    /// Returns the area of the footprint projected onto the x-y plane.
    pub fn area(&self) -> f64 {
        if self.polygon.len() < 3 {
            return 0.0;
        }
        let doubled = self
            .polygon
            .iter()
            .zip(self.polygon.iter().cycle().skip(1))
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>();
        doubled.abs() / 2.0
    }

    /// Returns true if the shape can be interpreted: at least three finite vertices enclosing a
    /// non-zero area and a finite, non-negative height.
    pub fn is_valid(&self) -> bool {
        self.polygon.len() >= 3
            && self
                .polygon
                .iter()
                .all(|point| point.coords.iter().all(|v| v.is_finite()))
            && self.height.is_finite()
            && self.height >= 0.0
            && self.area() > f64::EPSILON
    }

    /// Apply a rigid transform to every vertex of the footprint.
    pub fn transform(&mut self, isometry: &Isometry3<f64>) {
        self.polygon
            .iter_mut()
            .for_each(|point| *point = isometry * *point);
    }

    /// Move every vertex of the footprint by `offset`.
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        self.polygon
            .iter_mut()
            .for_each(|point| *point += *offset);
    }

    /// Returns the corners of the extruded shape: the footprint vertices followed by the same
    /// vertices raised by `height`.
    pub fn vertices(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        let lift = Vector3::new(0.0, 0.0, self.height);
        self.polygon
            .iter()
            .copied()
            .chain(self.polygon.iter().map(move |point| point + lift))
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::{Isometry3, Point3, Vector3};

    #[test]
    fn area() {
        let shape = Shape::from_box(&Point3::new(3.0, -2.0, 0.0), 4.0, 2.0, 1.5);
        assert_approx_eq!(shape.area(), 8.0);

        let triangle = Shape::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 2.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            1.0,
        );
        assert_approx_eq!(triangle.area(), 2.0);
    }

    #[test]
    fn is_valid() {
        assert!(Shape::from_box(&Point3::origin(), 1.0, 1.0, 1.0).is_valid());

        let two_points = Shape::new(
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            1.0,
        );
        assert!(!two_points.is_valid());

        let collinear = Shape::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            1.0,
        );
        assert!(!collinear.is_valid());

        let mut not_finite = Shape::from_box(&Point3::origin(), 1.0, 1.0, 1.0);
        not_finite.polygon[2].x = f64::NAN;
        assert!(!not_finite.is_valid());

        let negative_height = Shape::from_box(&Point3::origin(), 1.0, 1.0, -1.0);
        assert!(!negative_height.is_valid());
    }

    #[test]
    fn transform() {
        let mut shape = Shape::from_box(&Point3::origin(), 2.0, 2.0, 1.0);
        shape.transform(&Isometry3::new(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::z() * std::f64::consts::FRAC_PI_2,
        ));

        assert_approx_eq!(shape.polygon[0].x, 11.0);
        assert_approx_eq!(shape.polygon[0].y, -1.0);
        assert_approx_eq!(shape.polygon[2].x, 9.0);
        assert_approx_eq!(shape.polygon[2].y, 1.0);
        assert_approx_eq!(shape.area(), 4.0);
    }

    #[test]
    fn vertices() {
        let shape = Shape::from_box(&Point3::new(0.0, 0.0, 0.5), 2.0, 2.0, 1.5);
        let vertices = shape.vertices().collect::<Vec<_>>();

        assert_eq!(vertices.len(), 8);
        assert_eq!(vertices[0], Point3::new(-1.0, -1.0, 0.5));
        assert_eq!(vertices[4], Point3::new(-1.0, -1.0, 2.0));
    }
}
