use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Configuration for a collision detector, immutable over its lifetime.
///
/// The defaults enable self-collision handling, feasible region filtering and
/// loop-less tetrahedral traversal, which is the steady-state configuration
/// for a deformable body simulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollisionDetectionParameters<T> {
    /// Detect penetrations of a mesh into its own volume.
    pub handle_self_collision: bool,
    /// Run closest surface queries in the rest-pose configuration and map the
    /// result back to the deformed configuration.
    pub rest_pose_closest_point: bool,
    /// Filter closest point candidates with the feasible region predicate.
    pub check_feasible_region: bool,
    /// Filter closest point candidates by traversing tets from the candidate
    /// surface face back to the embracing tet.
    pub check_tet_traverse: bool,
    /// Also apply the traversal filter when the intersected mesh is not the
    /// query mesh.
    pub tetrahedral_traverse_for_non_self_intersection: bool,
    /// Budget of candidate visits per closest surface search. Exceeding it
    /// terminates the search without a result.
    pub max_number_of_bvh_query: usize,
    /// Relative relaxation of the feasible region half-space tests.
    pub feasible_region_epsilon: T,
    /// Blend factor in [0, 1] shifting traversal endpoints towards triangle
    /// and tet centroids, keeping rays off edges and vertices.
    pub center_shift_level: T,
    /// Shift the traversal target towards the embracing tet centroid.
    pub shift_query_point_to_center: bool,
    /// Bound the traversal length to a multiple of the origin-target distance
    /// instead of walking unbounded.
    pub stop_traversing_after_passing_query_point: bool,
    /// Length bound multiplier used when traversal stops after passing the
    /// query point.
    pub max_search_distance_multiplier: T,
    /// Tolerance for the ray-triangle intersections taken during traversal.
    pub ray_tri_intersection_epsilon: T,
    /// Walk with the loop-less epoch-stamped variant.
    pub loop_less_traverse: bool,
    /// Walk with the fixed-capacity stack variant, falling back to the
    /// dynamic variant on overflow. Ignored when `loop_less_traverse` is set.
    pub use_static_traverse: bool,
}

impl<T: Float> Default for CollisionDetectionParameters<T> {
    fn default() -> Self {
        Self {
            handle_self_collision: true,
            rest_pose_closest_point: false,
            check_feasible_region: true,
            check_tet_traverse: true,
            tetrahedral_traverse_for_non_self_intersection: false,
            max_number_of_bvh_query: 1000,
            feasible_region_epsilon: T::from(1e-2).expect("Failed to convert number to T"),
            center_shift_level: T::from(0.2).expect("Failed to convert number to T"),
            shift_query_point_to_center: false,
            stop_traversing_after_passing_query_point: true,
            max_search_distance_multiplier: T::from(1.5).expect("Failed to convert number to T"),
            ray_tri_intersection_epsilon: T::from(1e-6).expect("Failed to convert number to T"),
            loop_less_traverse: true,
            use_static_traverse: false,
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_default_parameters() {
        let params: CollisionDetectionParameters<f64> = Default::default();

        assert!(params.handle_self_collision);
        assert!(!params.rest_pose_closest_point);
        assert!(params.check_feasible_region);
        assert!(params.loop_less_traverse);
        assert!(params.center_shift_level >= 0.0 && params.center_shift_level <= 1.0);
    }

    #[test]
    fn test_serialize_parameters() {
        let params: CollisionDetectionParameters<f64> = Default::default();

        let json = serde_json::to_string_pretty(&params).unwrap();
        let deserialized: CollisionDetectionParameters<f64> = serde_json::from_str(&json).unwrap();

        assert_eq!(
            params.max_number_of_bvh_query,
            deserialized.max_number_of_bvh_query
        );
        assert!((params.feasible_region_epsilon - deserialized.feasible_region_epsilon).abs() < 1e-12);
        assert_eq!(params.loop_less_traverse, deserialized.loop_less_traverse);
    }
}
