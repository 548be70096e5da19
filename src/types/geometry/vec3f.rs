use std::{
    fmt::{self, Debug, Display},
    ops,
};

use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Vector or Point with 3 coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vec3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Vec3<T> {
    /// Create a new Vec3 from coordinates.
    /// # Arguments
    ///
    /// * `x` - X coordinate.
    /// * `y` - Y coordinate.
    /// * `z` - Z coordinate.
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T: Float> Vec3<T> {
    /// Construct a new point at {0,0,0}
    pub fn origin() -> Vec3<T> {
        Self {
            x: T::zero(),
            y: T::zero(),
            z: T::zero(),
        }
    }

    /// Compute the minium x, y and z coordinates compared to another point.
    ///
    /// # Arguments
    /// * `other` - Other point to compare coordinates to.
    pub fn min(&self, other: &Vec3<T>) -> Vec3<T> {
        Vec3::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Compute the maximum x, y and z coordinates compared to another point.
    ///
    /// # Arguments
    /// * `other` - Other point to compare coordinates to.
    #[inline(always)]
    pub fn max(&self, other: &Vec3<T>) -> Vec3<T> {
        Vec3::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Compute the euclidian distance to another Vec3.
    ///
    /// # Arguments
    /// * `pt` - Other point to compute distance to.
    #[inline(always)]
    pub fn distance_to_vec3(&self, pt: &Vec3<T>) -> T {
        self.distance_to_vec3_squared(pt).sqrt()
    }

    /// Compute the euclidian distance to a location defined by x, y and z coordinates.
    ///
    /// # Arguments
    /// * `x` - X coordinate.
    /// * `y` - Y coordinate.
    /// * `z` - Z coordinate.
    #[inline(always)]
    pub fn distance_to_coord(&self, x: T, y: T, z: T) -> T {
        self.distance_to_coord_squared(x, y, z).sqrt()
    }

    /// Compute the euclidian squared distance to another Vec3.
    ///
    /// # Arguments
    /// * `pt` - Other point to compute distance to.
    #[inline(always)]
    pub fn distance_to_vec3_squared(&self, pt: &Vec3<T>) -> T {
        self.distance_to_coord_squared(pt.x, pt.y, pt.z)
    }

    /// Compute the euclidian squared distance to a location defined by x, y and z coordinates.
    ///
    /// # Arguments
    /// * `x` - X coordinate.
    /// * `y` - Y coordinate.
    /// * `z` - Z coordinate.
    #[inline(always)]
    pub fn distance_to_coord_squared(&self, x: T, y: T, z: T) -> T {
        (self.x - x).powi(2) + (self.y - y).powi(2) + (self.z - z).powi(2)
    }

    /// Computes the dot product between two Vec3 values.
    ///
    /// (x_1 * x_2) + (y_1 * y_2) + (z_1 * z_2)
    ///
    /// # Arguments
    /// * `rhs` - Vec to compute dot product with.
    #[inline(always)]
    pub fn dot(&self, rhs: &Vec3<T>) -> T {
        (self.x * rhs.x) + (self.y * rhs.y) + (self.z * rhs.z)
    }

    /// Computes the cross product between two Vec3 values.
    /// # Arguments
    ///
    /// * `rhs` - Vec to compute cross product with.
    #[inline(always)]
    pub fn cross(&self, rhs: &Vec3<T>) -> Vec3<T> {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    /// Computes the angle between two Vec3 values.
    /// # Arguments
    ///
    /// * `rhs` - Vec to compute angle with.
    pub fn angle(&self, rhs: &Vec3<T>) -> Option<T> {
        let dot = self.dot(rhs);
        let len_self = self.magnitude();
        let len_other = rhs.magnitude();
        if len_self.is_zero() || len_other.is_zero() {
            None
        } else {
            let cosine = (dot / (len_self * len_other)).clamp(-T::one(), T::one());
            Some(cosine.acos())
        }
    }

    /// Compute the total length of a vector (distance to origin).
    #[inline(always)]
    pub fn magnitude(&self) -> T {
        self.distance_to_coord(T::zero(), T::zero(), T::zero())
    }

    /// Scale the magnitude of a vector with a scalar value.
    /// # Arguments
    ///
    /// * `scalar` - Scale factor.
    #[inline(always)]
    pub fn scale(self, scalar: T) -> Vec3<T> {
        Vec3 {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }

    /// Normalize the vector, giving it a unit length.
    #[inline(always)]
    pub fn normalize(&self) -> Vec3<T> {
        *self * (T::one() / self.magnitude())
    }
}

impl<T: Float> ops::Add<Vec3<T>> for Vec3<T> {
    type Output = Vec3<T>;
    fn add(self, _rhs: Vec3<T>) -> Vec3<T> {
        {
            Self {
                x: self.x + _rhs.x,
                y: self.y + _rhs.y,
                z: self.z + _rhs.z,
            }
        }
    }
}

impl<T: Float> ops::Sub<Vec3<T>> for Vec3<T> {
    type Output = Vec3<T>;
    fn sub(self, _rhs: Vec3<T>) -> Vec3<T> {
        Self {
            x: self.x - _rhs.x,
            y: self.y - _rhs.y,
            z: self.z - _rhs.z,
        }
    }
}

impl<T: Float> ops::Mul<T> for Vec3<T> {
    type Output = Vec3<T>;
    fn mul(self, rhs: T) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

impl<T: Float> ops::Neg for Vec3<T> {
    type Output = Vec3<T>;
    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl<T: Display> fmt::Display for Vec3<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}, {}, {}}}", self.x, self.y, self.z)
    }
}
