use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fmt::{self, Display};

use super::traits::Bounded;
use super::{BoundingBox, Vec3};

/// Classification of where on a triangle a closest point look-up landed.
///
/// The vertex and edge variants are named after the vertex order `{a, b, c}`
/// of the queried triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClosestPointType {
    /// Closest point is the first vertex.
    AtA,
    /// Closest point is the second vertex.
    AtB,
    /// Closest point is the third vertex.
    AtC,
    /// Closest point lies on the edge between the first and second vertex.
    AtAB,
    /// Closest point lies on the edge between the second and third vertex.
    AtBC,
    /// Closest point lies on the edge between the first and third vertex.
    AtAC,
    /// Closest point lies strictly inside the triangle.
    AtInterior,
    /// No closest point has been found.
    NotFound,
}

impl ClosestPointType {
    /// Returns true if the closest point is one of the three triangle vertices.
    pub fn is_vertex(&self) -> bool {
        matches!(
            self,
            ClosestPointType::AtA | ClosestPointType::AtB | ClosestPointType::AtC
        )
    }

    /// Returns true if the closest point lies on one of the three triangle edges.
    pub fn is_edge(&self) -> bool {
        matches!(
            self,
            ClosestPointType::AtAB | ClosestPointType::AtBC | ClosestPointType::AtAC
        )
    }
}

/// Result of a closest point computation on a triangle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClosestPoint<T> {
    /// The closest point location.
    pub point: Vec3<T>,
    /// Barycentric coordinates of the closest point in `{a, b, c}` order, summing to one.
    pub barycentrics: Vec3<T>,
    /// The triangle feature the closest point belongs to.
    pub point_type: ClosestPointType,
}

/// A single triangle with vertices in 3d space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Triangle<T> {
    /// Positions of the three vertices.
    pub p: [Vec3<T>; 3],
}

impl<T> Triangle<T> {
    /// Create a new Triangle from three vertices.
    /// # Arguments
    ///
    /// * `p1` - First vertex.
    /// * `p2` - Second vertex.
    /// * `p3` - Third vertex.
    pub fn new(p1: Vec3<T>, p2: Vec3<T>, p3: Vec3<T>) -> Self {
        Self { p: [p1, p2, p3] }
    }
}

impl<T: Float> Triangle<T> {
    /// Return a copy of the first vertex in the triangle.
    #[inline]
    pub fn p1(&self) -> Vec3<T> {
        self.p[0]
    }

    /// Return a copy of the second vertex in the triangle.
    #[inline]
    pub fn p2(&self) -> Vec3<T> {
        self.p[1]
    }

    /// Return a copy of the third vertex in the triangle.
    #[inline]
    pub fn p3(&self) -> Vec3<T> {
        self.p[2]
    }

    /// Compute the normal to the triangle face plane.
    pub fn face_normal(&self) -> Vec3<T> {
        let v1 = self.p2() - self.p1();
        let v2 = self.p3() - self.p1();
        v1.cross(&v2).normalize()
    }

    /// Compute the average of the three triangle vertices.
    pub fn centroid(&self) -> Vec3<T> {
        (self.p1() + self.p2() + self.p3())
            * (T::one() / T::from(3.0).expect("Failed to convert number to T"))
    }

    /// Compute the closest point on the triangle from a query point.
    ///
    /// Uses the Voronoi region method: the query point is classified against
    /// the vertex and edge regions in a fixed priority (vertices, then edges,
    /// then interior), and the point is projected onto the winning feature.
    /// Ties on region boundaries resolve to the earlier listed feature.
    ///
    /// # Arguments
    ///
    /// * `query_point` - Point to compute the closest point from.
    pub fn closest_point(&self, query_point: &Vec3<T>) -> ClosestPoint<T> {
        let a = self.p[0];
        let b = self.p[1];
        let c = self.p[2];

        let ab = b - a;
        let ac = c - a;
        let ap = *query_point - a;

        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= T::zero() && d2 <= T::zero() {
            return ClosestPoint {
                point: a,
                barycentrics: Vec3::new(T::one(), T::zero(), T::zero()),
                point_type: ClosestPointType::AtA,
            };
        }

        let bp = *query_point - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= T::zero() && d4 <= d3 {
            return ClosestPoint {
                point: b,
                barycentrics: Vec3::new(T::zero(), T::one(), T::zero()),
                point_type: ClosestPointType::AtB,
            };
        }

        let cp = *query_point - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= T::zero() && d5 <= d6 {
            return ClosestPoint {
                point: c,
                barycentrics: Vec3::new(T::zero(), T::zero(), T::one()),
                point_type: ClosestPointType::AtC,
            };
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= T::zero() && d1 >= T::zero() && d3 <= T::zero() {
            let v = d1 / (d1 - d3);
            return ClosestPoint {
                point: a + ab * v,
                barycentrics: Vec3::new(T::one() - v, v, T::zero()),
                point_type: ClosestPointType::AtAB,
            };
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= T::zero() && d2 >= T::zero() && d6 <= T::zero() {
            let v = d2 / (d2 - d6);
            return ClosestPoint {
                point: a + ac * v,
                barycentrics: Vec3::new(T::one() - v, T::zero(), v),
                point_type: ClosestPointType::AtAC,
            };
        }

        let va = d3 * d6 - d5 * d4;
        if va <= T::zero() && (d4 - d3) >= T::zero() && (d5 - d6) >= T::zero() {
            let v = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return ClosestPoint {
                point: b + (c - b) * v,
                barycentrics: Vec3::new(T::zero(), T::one() - v, v),
                point_type: ClosestPointType::AtBC,
            };
        }

        let denom = T::one() / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        ClosestPoint {
            point: a + ab * v + ac * w,
            barycentrics: Vec3::new(T::one() - v - w, v, w),
            point_type: ClosestPointType::AtInterior,
        }
    }

    /// Intersect a ray with the triangle.
    ///
    /// Returns the ray parameter of the intersection point, or [`None`] if the
    /// ray misses or runs parallel to the triangle plane. The tolerance
    /// loosens both the parametric bound (`t >= -epsilon`) and the barycentric
    /// bounds, so rays grazing an edge or vertex still register a hit.
    ///
    /// # Arguments
    ///
    /// * `origin` - Origin of the ray.
    /// * `direction` - Direction of the ray. Does not need to be normalized,
    ///   the returned parameter is in units of its length.
    /// * `epsilon` - Tolerance applied to the parametric and barycentric bounds.
    pub fn ray_intersect(&self, origin: &Vec3<T>, direction: &Vec3<T>, epsilon: T) -> Option<T> {
        let ab = self.p[1] - self.p[0];
        let ac = self.p[2] - self.p[0];

        let pvec = direction.cross(&ac);
        let det = ab.dot(&pvec);

        if det.abs() < T::epsilon() {
            return None;
        }

        let inv_det = T::one() / det;
        let tvec = *origin - self.p[0];
        let u = tvec.dot(&pvec) * inv_det;
        if u < -epsilon || u > T::one() + epsilon {
            return None;
        }

        let qvec = tvec.cross(&ab);
        let v = direction.dot(&qvec) * inv_det;
        if v < -epsilon || u + v > T::one() + epsilon {
            return None;
        }

        let t = ac.dot(&qvec) * inv_det;
        if t < -epsilon {
            return None;
        }

        Some(t)
    }
}

impl<T: Display> fmt::Display for Triangle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "T: {}, {}, {}", self.p[0], self.p[1], self.p[2])
    }
}

impl<T: Float> Bounded<T> for Triangle<T> {
    fn bounds(&self) -> BoundingBox<T> {
        BoundingBox::from_points(&self.p)
    }
}
