use std::fmt::Debug;

use num_traits::Float;
use serde::{Deserialize, Serialize};

use super::Vec3;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox<T> {
    // Minimum coordinate of the box
    pub min: Vec3<T>,
    // Maximum coordinate of the box
    pub max: Vec3<T>,
}

impl<T> BoundingBox<T> {
    /// Create a new BoundingBox from a min and max coordinate.
    ///
    /// # Arguments
    ///
    /// * `min` - The minimum coordinate of the Box.
    /// * `max` - The maximum coordinate of the Box.
    pub fn new(min: Vec3<T>, max: Vec3<T>) -> Self {
        Self { min, max }
    }
}

impl<T: Float> BoundingBox<T> {
    /// Create a new BoundingBox with zero size at the origin.
    pub fn zero() -> Self {
        Self {
            min: Vec3::origin(),
            max: Vec3::origin(),
        }
    }

    /// Compute the smallest box containing both this box and another.
    ///
    /// # Arguments
    ///
    /// * `other` - The other box to include.
    pub fn union(&self, other: &BoundingBox<T>) -> BoundingBox<T> {
        Self {
            min: self.min.min(&other.min),
            max: self.max.max(&other.max),
        }
    }

    /// Compute the smallest box containing all the boxes in a list.
    ///
    /// Returns a zero box at the origin if the list is empty.
    ///
    /// # Arguments
    ///
    /// * `boxes` - The boxes to contain.
    pub fn from_boxes(boxes: &[BoundingBox<T>]) -> BoundingBox<T> {
        let mut iter = boxes.iter();
        let Some(first) = iter.next() else {
            return BoundingBox::zero();
        };

        iter.fold(*first, |acc, b| acc.union(b))
    }

    /// Compute the smallest box containing a list of points.
    ///
    /// Returns a zero box at the origin if the list is empty.
    ///
    /// # Arguments
    ///
    /// * `points` - The points to contain.
    pub fn from_points(points: &[Vec3<T>]) -> BoundingBox<T> {
        let mut iter = points.iter();
        let Some(first) = iter.next() else {
            return BoundingBox::zero();
        };

        iter.fold(BoundingBox::new(*first, *first), |acc, p| BoundingBox {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    /// Return the size of the box in x, y and z
    ///
    /// # Returns
    ///
    /// * `(x_size, y_size, z_size)` - A tuple with the size in x, y and z.
    pub fn dimensions(&self) -> (T, T, T) {
        (
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }

    /// Compute the centre of the box.
    pub fn centroid(&self) -> Vec3<T> {
        (self.min + self.max) * T::from(0.5).expect("Failed to convert number to T")
    }

    /// Checks if the box contains a point
    ///
    /// # Arguments
    ///
    /// * `point` - Point for contains check.
    pub fn contains(&self, point: &Vec3<T>) -> bool {
        point.x >= self.min.x
            && point.y >= self.min.y
            && point.z >= self.min.z
            && point.x <= self.max.x
            && point.y <= self.max.y
            && point.z <= self.max.z
    }

    /// Checks if the box intersects another box.
    ///
    /// # Arguments
    ///
    /// * `other` - The other box to check against.
    pub fn intersects(&self, other: &BoundingBox<T>) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns a new box grown by a fixed amount in all directions.
    ///
    /// # Arguments
    ///
    /// * `distance` - The offset distance applied to each side.
    pub fn offset(&self, distance: T) -> BoundingBox<T> {
        let d = Vec3::new(distance, distance, distance);
        BoundingBox::new(self.min - d, self.max + d)
    }

    /// Compute the closest point on or inside the box from a query point.
    ///
    /// # Arguments
    ///
    /// * `query_point` - The point to compute the closest point from.
    pub fn closest_point(&self, query_point: &Vec3<T>) -> Vec3<T> {
        Vec3::new(
            query_point.x.clamp(self.min.x, self.max.x),
            query_point.y.clamp(self.min.y, self.max.y),
            query_point.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Compute the distance from a point to the box. Zero if the point is inside.
    ///
    /// # Arguments
    ///
    /// * `query_point` - The point to compute the distance from.
    pub fn distance_to_point(&self, query_point: &Vec3<T>) -> T {
        self.closest_point(query_point).distance_to_vec3(query_point)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_contains_point() {
        let bounds = BoundingBox::new(Vec3::origin(), Vec3::new(1.0, 1.0, 1.0));

        assert!(bounds.contains(&Vec3::new(0.5, 0.5, 0.5)));
        assert!(bounds.contains(&Vec3::new(1.0, 1.0, 1.0)));
        assert!(!bounds.contains(&Vec3::new(1.5, 0.5, 0.5)));
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::new(Vec3::origin(), Vec3::new(1.0, 1.0, 1.0));
        let b = BoundingBox::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(2.0, 2.0, 2.0));
        let c = BoundingBox::new(Vec3::new(1.5, 1.5, 1.5), Vec3::new(2.0, 2.0, 2.0));

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_closest_point_outside() {
        let bounds = BoundingBox::new(Vec3::origin(), Vec3::new(1.0, 1.0, 1.0));

        let closest = bounds.closest_point(&Vec3::new(2.0, 0.5, -1.0));
        assert!(closest.distance_to_coord(1.0, 0.5, 0.0) < f64::epsilon());

        let distance = bounds.distance_to_point(&Vec3::new(2.0, 0.5, 0.5));
        assert!((distance - 1.0).abs() < f64::epsilon());
    }

    #[test]
    fn test_from_boxes() {
        let a = BoundingBox::new(Vec3::origin(), Vec3::new(1.0, 1.0, 1.0));
        let b = BoundingBox::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.5, 2.0, 0.5));

        let combined = BoundingBox::from_boxes(&[a, b]);
        assert!(combined.min.distance_to_coord(-1.0, 0.0, 0.0) < f64::epsilon());
        assert!(combined.max.distance_to_coord(1.0, 2.0, 1.0) < f64::epsilon());
    }
}
