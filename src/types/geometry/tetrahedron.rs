use num_traits::Float;
use serde::{Deserialize, Serialize};

use super::traits::Bounded;
use super::{BoundingBox, Triangle, Vec3};

/// A single tetrahedron with vertices in 3d space.
///
/// Vertices are expected in positive orientation, meaning the signed volume
/// `det(b-a, c-a, d-a) / 6` is positive. With that convention the four local
/// faces listed in [`Tetrahedron::FACE_VERTICES`] all wind outwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tetrahedron<T> {
    /// Positions of the four vertices.
    pub p: [Vec3<T>; 4],
}

impl<T> Tetrahedron<T> {
    /// Local vertex indices of the four faces, each opposite the vertex with
    /// its own index. Windings are outward for positively oriented tets.
    pub const FACE_VERTICES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

    /// Create a new Tetrahedron from four vertices.
    /// # Arguments
    ///
    /// * `p1` - First vertex.
    /// * `p2` - Second vertex.
    /// * `p3` - Third vertex.
    /// * `p4` - Fourth vertex.
    pub fn new(p1: Vec3<T>, p2: Vec3<T>, p3: Vec3<T>, p4: Vec3<T>) -> Self {
        Self {
            p: [p1, p2, p3, p4],
        }
    }
}

impl<T: Float> Tetrahedron<T> {
    /// Compute the average of the four tetrahedron vertices.
    pub fn centroid(&self) -> Vec3<T> {
        (self.p[0] + self.p[1] + self.p[2] + self.p[3])
            * (T::one() / T::from(4.0).expect("Failed to convert number to T"))
    }

    /// Compute the signed volume of the tetrahedron. Positive for positively
    /// oriented vertex order.
    pub fn signed_volume(&self) -> T {
        let ab = self.p[1] - self.p[0];
        let ac = self.p[2] - self.p[0];
        let ad = self.p[3] - self.p[0];
        ab.dot(&ac.cross(&ad)) / T::from(6.0).expect("Failed to convert number to T")
    }

    /// Return one of the four faces as a triangle.
    ///
    /// # Arguments
    ///
    /// * `local_face` - The local face index, 0 to 3, following [`Tetrahedron::FACE_VERTICES`].
    pub fn face(&self, local_face: usize) -> Triangle<T> {
        let [i, j, k] = Self::FACE_VERTICES[local_face];
        Triangle::new(self.p[i], self.p[j], self.p[k])
    }

    /// Compute the four barycentric coordinates of an arbitrary point.
    ///
    /// The coordinates are returned in vertex order and sum to one. Each is
    /// the ratio of the signed volume of the sub-tet formed by replacing the
    /// matching vertex with the query point, over the full volume.
    ///
    /// # Arguments
    ///
    /// * `query_point` - Point to compute the barycentric coordinates for.
    pub fn barycentrics(&self, query_point: &Vec3<T>) -> [T; 4] {
        let q = *query_point;
        let volume = signed_volume_of(&self.p[0], &self.p[1], &self.p[2], &self.p[3]);
        if volume.abs() < T::epsilon() {
            return [T::zero(); 4];
        }

        let inv = T::one() / volume;
        [
            signed_volume_of(&q, &self.p[1], &self.p[2], &self.p[3]) * inv,
            signed_volume_of(&self.p[0], &q, &self.p[2], &self.p[3]) * inv,
            signed_volume_of(&self.p[0], &self.p[1], &q, &self.p[3]) * inv,
            signed_volume_of(&self.p[0], &self.p[1], &self.p[2], &q) * inv,
        ]
    }

    /// Checks if a point is inside the tetrahedron.
    ///
    /// Points exactly on a face, edge or vertex count as inside, so a point on
    /// a face shared by two tets is reported by both.
    ///
    /// # Arguments
    ///
    /// * `query_point` - Point for the contains check.
    pub fn contains(&self, query_point: &Vec3<T>) -> bool {
        self.barycentrics(query_point)
            .iter()
            .all(|&coordinate| coordinate >= T::zero())
    }
}

fn signed_volume_of<T: Float>(a: &Vec3<T>, b: &Vec3<T>, c: &Vec3<T>, d: &Vec3<T>) -> T {
    let ab = *b - *a;
    let ac = *c - *a;
    let ad = *d - *a;
    ab.dot(&ac.cross(&ad)) / T::from(6.0).expect("Failed to convert number to T")
}

impl<T: Float> Bounded<T> for Tetrahedron<T> {
    fn bounds(&self) -> BoundingBox<T> {
        BoundingBox::from_points(&self.p)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn unit_tet() -> Tetrahedron<f64> {
        Tetrahedron::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn test_signed_volume() {
        let tet = unit_tet();
        assert!((tet.signed_volume() - 1.0 / 6.0).abs() < f64::epsilon());
    }

    #[test]
    fn test_faces_wind_outwards() {
        let tet = unit_tet();
        let centroid = tet.centroid();

        for local_face in 0..4 {
            let face = tet.face(local_face);
            let outward = face.centroid() - centroid;
            assert!(
                face.face_normal().dot(&outward) > 0.0,
                "Face {} winds inwards",
                local_face
            );
        }
    }

    #[test]
    fn test_contains_point() {
        let tet = unit_tet();

        assert!(tet.contains(&Vec3::new(0.25, 0.25, 0.25)));
        assert!(!tet.contains(&Vec3::new(0.5, 0.5, 0.5)));
        assert!(!tet.contains(&Vec3::new(-0.1, 0.2, 0.2)));

        // Boundary counts as inside.
        assert!(tet.contains(&Vec3::new(0.0, 0.25, 0.25)));
        assert!(tet.contains(&Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_barycentrics_at_vertices() {
        let tet = unit_tet();

        let b0 = tet.barycentrics(&tet.p[0]);
        assert!((b0[0] - 1.0).abs() < 1e-12);

        let b3 = tet.barycentrics(&tet.p[3]);
        assert!((b3[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_barycentrics_reconstruct_point() {
        let tet = Tetrahedron::new(
            Vec3::new(0.3, -0.2, 0.1),
            Vec3::new(1.4, 0.2, -0.3),
            Vec3::new(0.2, 1.6, 0.4),
            Vec3::new(-0.1, 0.3, 1.2),
        );

        let query = Vec3::new(0.4, 0.3, 0.25);
        let b = tet.barycentrics(&query);

        let sum: f64 = b.iter().sum();
        assert!(
            (sum - 1.0).abs() < 1e-9,
            "Barycentrics should sum to one. Was {}",
            sum
        );

        let reconstructed =
            tet.p[0] * b[0] + tet.p[1] * b[1] + tet.p[2] * b[2] + tet.p[3] * b[3];
        assert!(reconstructed.distance_to_vec3(&query) < 1e-9);
    }
}
