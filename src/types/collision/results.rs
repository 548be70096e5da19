use serde::{Deserialize, Serialize};

use crate::types::geometry::{ClosestPointType, Vec3};

/// Result of a penetration query for a single query vertex, extended in place
/// by the closest surface query.
///
/// After the closest surface pass the `closest_*` and `shortest_path_found`
/// lists run parallel to `intersected_tets`: entries where no admissible
/// closest point was found hold sentinel values (`-1` face id,
/// [`ClosestPointType::NotFound`]) without aborting the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenetrationResult<T> {
    /// Mesh the query vertex belongs to.
    pub query_mesh_id: usize,
    /// The query vertex.
    pub query_vertex_id: usize,
    /// Optional tet of the query mesh to exclude from detection, -1 when unused.
    pub query_tet_id: i32,

    /// Tets whose interior contains the query vertex.
    pub intersected_tets: Vec<usize>,
    /// Mesh of each embracing tet, parallel to `intersected_tets`.
    pub intersected_mesh_ids: Vec<usize>,

    /// Total candidate visits across the closest surface searches.
    pub number_of_bvh_query: usize,
    /// Total tet traversals started across the closest surface searches.
    pub number_of_tet_traversal: usize,
    /// Total tets entered across all traversals.
    pub number_of_tets_traversed: usize,

    /// Whether an admissible closest point was found per embracing tet.
    pub shortest_path_found: Vec<bool>,
    /// Barycentric coordinates of each closest point on its surface face.
    pub closest_barycentrics: Vec<Vec3<T>>,
    /// Closest point locations in the deformed configuration.
    pub closest_points: Vec<Vec3<T>>,
    /// Surface face of each closest point, -1 where not found.
    pub closest_face_ids: Vec<i32>,
    /// Triangle feature classification of each closest point.
    pub closest_point_types: Vec<ClosestPointType>,
    /// Outward surface normals at the closest points, when requested.
    pub closest_normals: Vec<Vec3<T>>,
}

impl<T> PenetrationResult<T> {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self {
            query_mesh_id: 0,
            query_vertex_id: 0,
            query_tet_id: -1,
            intersected_tets: Vec::new(),
            intersected_mesh_ids: Vec::new(),
            number_of_bvh_query: 0,
            number_of_tet_traversal: 0,
            number_of_tets_traversed: 0,
            shortest_path_found: Vec::new(),
            closest_barycentrics: Vec::new(),
            closest_points: Vec::new(),
            closest_face_ids: Vec::new(),
            closest_point_types: Vec::new(),
            closest_normals: Vec::new(),
        }
    }

    /// Number of embracing tets recorded by the penetration query.
    pub fn num_intersections(&self) -> usize {
        self.intersected_tets.len()
    }

    /// Reset the result for reuse in a new query.
    pub fn clear(&mut self) {
        self.query_mesh_id = 0;
        self.query_vertex_id = 0;
        self.query_tet_id = -1;
        self.intersected_tets.clear();
        self.intersected_mesh_ids.clear();
        self.number_of_bvh_query = 0;
        self.number_of_tet_traversal = 0;
        self.number_of_tets_traversed = 0;
        self.shortest_path_found.clear();
        self.closest_barycentrics.clear();
        self.closest_points.clear();
        self.closest_face_ids.clear();
        self.closest_point_types.clear();
        self.closest_normals.clear();
    }
}

impl<T> Default for PenetrationResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scratch state for the closest surface search around one embracing tet.
#[derive(Debug, Clone)]
pub(crate) struct ClosestPointRecord<T> {
    pub embracing_tet_id: usize,
    pub face_id: i32,
    pub barycentrics: Vec3<T>,
    pub point: Vec3<T>,
    pub point_type: ClosestPointType,
    pub found: bool,
    pub number_of_bvh_query: usize,
    pub number_of_tet_traversal: usize,
    pub number_of_tets_traversed: usize,
}

impl<T: num_traits::Float> ClosestPointRecord<T> {
    pub fn new(embracing_tet_id: usize) -> Self {
        Self {
            embracing_tet_id,
            face_id: -1,
            barycentrics: Vec3::origin(),
            point: Vec3::origin(),
            point_type: ClosestPointType::NotFound,
            found: false,
            number_of_bvh_query: 0,
            number_of_tet_traversal: 0,
            number_of_tets_traversed: 0,
        }
    }
}
