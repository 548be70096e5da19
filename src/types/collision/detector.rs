use std::time::Instant;

use log::{debug, info};
use num_traits::Float;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::types::geometry::{BuildQuality, Bvh, ClosestPointType, QueryAction, Vec3};
use crate::utils;

use super::{
    check_feasible_region, check_edge_feasible_region, check_vertex_feasible_region,
    ClosestPointRecord, CollisionDetectionParameters, CollisionError, PenetrationResult, TetMesh,
    TetWalker, TraverseStopReason,
};

/// One mesh worth of tetrahedra in the global tet index.
#[derive(Debug, Clone)]
struct TetGeometry<T> {
    enabled: bool,
    bvh: Bvh<T>,
}

/// Discrete collision detector over a collection of tetrahedral meshes.
///
/// The detector owns the spatial indexes: one surface triangle index per mesh
/// and a global index over the tetrahedra of all meshes, keyed by mesh id.
/// The meshes themselves stay with the caller and are passed into every
/// operation, so the simulator is free to integrate new vertex positions
/// between frames. The per-frame discipline is:
///
/// 1. mutate vertex positions,
/// 2. [`CollisionDetector::update_bvh`],
/// 3. for each candidate vertex [`CollisionDetector::penetration_query`]
///    followed by [`CollisionDetector::closest_surface`].
///
/// Queries take `&self` and are safe to fan out over disjoint
/// [`PenetrationResult`] values, see [`CollisionDetector::query_batch`].
#[derive(Debug, Clone)]
pub struct CollisionDetector<T> {
    params: CollisionDetectionParameters<T>,
    surface_scenes: Vec<Bvh<T>>,
    tet_geometries: Vec<TetGeometry<T>>,
    initialized: bool,
}

impl<T: Float> CollisionDetector<T> {
    /// Create a new detector with the given parameters. Call
    /// [`CollisionDetector::initialize`] before querying.
    pub fn new(params: CollisionDetectionParameters<T>) -> Self {
        Self {
            params,
            surface_scenes: Vec::new(),
            tet_geometries: Vec::new(),
            initialized: false,
        }
    }

    /// Returns the detector parameters.
    pub fn params(&self) -> &CollisionDetectionParameters<T> {
        &self.params
    }

    /// Register the mesh collection and build the spatial indexes.
    ///
    /// In rest-pose mode the surface indexes are built over the rest
    /// positions, which every mesh must have assigned.
    ///
    /// # Arguments
    ///
    /// * `meshes` - The mesh collection. Later operations must be passed the
    ///   same collection.
    pub fn initialize(&mut self, meshes: &[TetMesh<T>]) -> Result<(), CollisionError> {
        let before = Instant::now();

        if self.params.rest_pose_closest_point {
            for (mesh_id, mesh) in meshes.iter().enumerate() {
                if mesh.rest_positions().is_none() {
                    return Err(CollisionError::MissingRestPositions(mesh_id));
                }
            }
        }

        self.surface_scenes = meshes
            .iter()
            .map(|mesh| {
                Bvh::build(
                    &mesh.surface_face_bounds(self.params.rest_pose_closest_point),
                    BuildQuality::Low,
                )
            })
            .collect();

        self.tet_geometries = meshes
            .iter()
            .map(|mesh| TetGeometry {
                enabled: mesh.active_for_collision,
                bvh: Bvh::build(&mesh.tet_bounds(), BuildQuality::Low),
            })
            .collect();

        self.initialized = true;

        info!(
            "Collision detector initialized for {} meshes in {:.2?}",
            utils::math_helper::format_integer(meshes.len()),
            before.elapsed()
        );

        Ok(())
    }

    /// Refresh the spatial indexes after vertex positions changed.
    ///
    /// Geometries are enabled or disabled following each mesh's
    /// `active_for_collision` flag. [`BuildQuality::Refit`] recomputes bounds
    /// over the existing structures, the other qualities rebuild. Surface
    /// indexes are only touched in live-pose mode, since rest-pose buffers
    /// are immutable.
    ///
    /// # Arguments
    ///
    /// * `meshes` - The registered mesh collection.
    /// * `tet_quality` - Build quality for the global tet index.
    /// * `surface_quality` - Build quality for the surface indexes.
    /// * `update_surface` - Whether to refresh the surface indexes at all.
    pub fn update_bvh(
        &mut self,
        meshes: &[TetMesh<T>],
        tet_quality: BuildQuality,
        surface_quality: BuildQuality,
        update_surface: bool,
    ) -> Result<(), CollisionError> {
        self.check_mesh_table(meshes)?;
        let before = Instant::now();

        for (mesh_id, mesh) in meshes.iter().enumerate() {
            let geometry = &mut self.tet_geometries[mesh_id];
            geometry.enabled = mesh.active_for_collision;
            if !geometry.enabled {
                continue;
            }

            let tet_bounds = mesh.tet_bounds();
            if tet_quality == BuildQuality::Refit {
                geometry.bvh.refit(&tet_bounds);
            } else {
                geometry.bvh = Bvh::build(&tet_bounds, tet_quality);
            }

            if update_surface && !self.params.rest_pose_closest_point {
                let surface_bounds = mesh.surface_face_bounds(false);
                if surface_quality == BuildQuality::Refit {
                    self.surface_scenes[mesh_id].refit(&surface_bounds);
                } else {
                    self.surface_scenes[mesh_id] = Bvh::build(&surface_bounds, surface_quality);
                }
            }
        }

        debug!(
            "Spatial indexes updated for {} meshes in {:.2?}",
            meshes.len(),
            before.elapsed()
        );

        Ok(())
    }

    /// Find every tetrahedron whose interior contains a query vertex.
    ///
    /// The result is cleared and refilled. Self-intersections are skipped
    /// unless `handle_self_collision` is set, tets the query vertex is part
    /// of are always skipped, and a tet pinned through the result's
    /// `query_tet_id` is skipped as well.
    ///
    /// # Arguments
    ///
    /// * `meshes` - The registered mesh collection.
    /// * `mesh_id` - Mesh the query vertex belongs to.
    /// * `vertex_id` - The query vertex.
    /// * `result` - Result storage, reusable across queries.
    pub fn penetration_query(
        &self,
        meshes: &[TetMesh<T>],
        mesh_id: usize,
        vertex_id: usize,
        result: &mut PenetrationResult<T>,
    ) -> Result<(), CollisionError> {
        self.check_mesh_table(meshes)?;

        let query_tet_id = result.query_tet_id;
        result.clear();
        result.query_mesh_id = mesh_id;
        result.query_vertex_id = vertex_id;
        result.query_tet_id = query_tet_id;

        let query_point = meshes[mesh_id].positions()[vertex_id];

        for (geometry_id, geometry) in self.tet_geometries.iter().enumerate() {
            if !geometry.enabled {
                continue;
            }
            if !self.params.handle_self_collision && geometry_id == mesh_id {
                continue;
            }

            let mesh = &meshes[geometry_id];

            geometry.bvh.point_query(&query_point, T::zero(), &mut |tet_id, _| {
                if geometry_id == mesh_id {
                    // A vertex always touches its own tets, skip them.
                    let tet = mesh.tet_vertices(tet_id);
                    if tet.contains(&(vertex_id as u32)) {
                        return QueryAction::Keep;
                    }
                    if query_tet_id != -1 && query_tet_id as usize == tet_id {
                        return QueryAction::Keep;
                    }
                }

                if mesh.tetrahedron(tet_id).contains(&query_point) {
                    result.intersected_tets.push(tet_id);
                    result.intersected_mesh_ids.push(geometry_id);
                }

                // The zero-radius query stays exhaustive.
                QueryAction::Keep
            });
        }

        Ok(())
    }

    /// For each embracing tet recorded by a penetration query, find the
    /// nearest admissible point on the surface of the intersected mesh.
    ///
    /// Candidates are filtered by the feasible region predicate and the
    /// tetrahedral traversal test per the detector parameters. Results append
    /// to the lists of the penetration result, parallel to its embracing tet
    /// list; entries without an admissible point hold sentinel values.
    ///
    /// # Arguments
    ///
    /// * `meshes` - The registered mesh collection.
    /// * `result` - The penetration result to extend in place.
    /// * `compute_normals` - Also record the outward surface normal at each
    ///   closest point.
    pub fn closest_surface(
        &self,
        meshes: &[TetMesh<T>],
        result: &mut PenetrationResult<T>,
        compute_normals: bool,
    ) -> Result<(), CollisionError> {
        self.check_mesh_table(meshes)?;

        let query_mesh_id = result.query_mesh_id;
        let query_vertex_id = result.query_vertex_id;
        let live_query_point = meshes[query_mesh_id].positions()[query_vertex_id];

        let mut walker = TetWalker::from_parameters(&self.params);

        for intersection in 0..result.num_intersections() {
            let mesh_id = result.intersected_mesh_ids[intersection];
            let tet_id = result.intersected_tets[intersection];
            let mesh = &meshes[mesh_id];

            let mut record = ClosestPointRecord::new(tet_id);

            if self.params.rest_pose_closest_point {
                self.closest_surface_rest_pose(mesh, mesh_id, &live_query_point, &mut record)?;
            } else {
                self.closest_surface_live(
                    mesh,
                    mesh_id,
                    query_mesh_id,
                    query_vertex_id,
                    &live_query_point,
                    &mut walker,
                    &mut record,
                );
            }

            if record.found {
                result.shortest_path_found.push(true);
                result.closest_barycentrics.push(record.barycentrics);
                result.closest_points.push(record.point);
                result.closest_face_ids.push(record.face_id);
                result.closest_point_types.push(record.point_type);

                result.number_of_bvh_query += record.number_of_bvh_query;
                result.number_of_tet_traversal += record.number_of_tet_traversal;
                result.number_of_tets_traversed += record.number_of_tets_traversed;

                if compute_normals {
                    result.closest_normals.push(closest_point_normal(
                        mesh,
                        record.face_id as usize,
                        record.point_type,
                    ));
                }
            } else {
                let sentinel = -T::one();
                result.shortest_path_found.push(false);
                result
                    .closest_barycentrics
                    .push(Vec3::new(sentinel, sentinel, sentinel));
                result
                    .closest_points
                    .push(Vec3::new(sentinel, sentinel, sentinel));
                result.closest_face_ids.push(-1);
                result.closest_point_types.push(ClosestPointType::NotFound);

                if compute_normals {
                    result.closest_normals.push(Vec3::origin());
                }
            }
        }

        Ok(())
    }

    /// Run penetration and closest surface queries for many vertices in
    /// parallel, one independent result per query.
    ///
    /// # Arguments
    ///
    /// * `meshes` - The registered mesh collection.
    /// * `queries` - `(mesh_id, vertex_id)` pairs to process.
    /// * `compute_normals` - Also record closest point normals.
    pub fn query_batch(
        &self,
        meshes: &[TetMesh<T>],
        queries: &[(usize, usize)],
        compute_normals: bool,
    ) -> Result<Vec<PenetrationResult<T>>, CollisionError>
    where
        T: Send + Sync,
    {
        self.check_mesh_table(meshes)?;

        queries
            .par_iter()
            .map(|&(mesh_id, vertex_id)| {
                let mut result = PenetrationResult::new();
                self.penetration_query(meshes, mesh_id, vertex_id, &mut result)?;
                self.closest_surface(meshes, &mut result, compute_normals)?;
                Ok(result)
            })
            .collect()
    }

    /// Feasible region test at the detector's configured relaxation, see
    /// [`check_feasible_region`].
    pub fn check_feasible_region(
        &self,
        query_point: &Vec3<T>,
        mesh: &TetMesh<T>,
        face_id: usize,
        point_type: ClosestPointType,
    ) -> bool {
        check_feasible_region(
            query_point,
            mesh,
            face_id,
            point_type,
            self.params.feasible_region_epsilon,
        )
    }

    /// Edge feasibility test at the detector's configured relaxation, see
    /// [`check_edge_feasible_region`].
    pub fn check_edge_feasible_region(
        &self,
        query_point: &Vec3<T>,
        mesh: &TetMesh<T>,
        face_id: usize,
        edge: usize,
    ) -> bool {
        check_edge_feasible_region(
            query_point,
            mesh,
            face_id,
            edge,
            self.params.feasible_region_epsilon,
        )
    }

    /// Vertex feasibility test at the detector's configured relaxation, see
    /// [`check_vertex_feasible_region`].
    pub fn check_vertex_feasible_region(
        &self,
        query_point: &Vec3<T>,
        mesh: &TetMesh<T>,
        vertex_id: usize,
    ) -> bool {
        check_vertex_feasible_region(
            query_point,
            mesh,
            vertex_id,
            self.params.feasible_region_epsilon,
        )
    }

    fn check_mesh_table(&self, meshes: &[TetMesh<T>]) -> Result<(), CollisionError> {
        if !self.initialized {
            return Err(CollisionError::NotInitialized);
        }
        if meshes.len() != self.tet_geometries.len() {
            return Err(CollisionError::MeshCountMismatch {
                expected: self.tet_geometries.len(),
                actual: meshes.len(),
            });
        }
        Ok(())
    }

    /// The live-pose closest point search around one embracing tet.
    #[allow(clippy::too_many_arguments)]
    fn closest_surface_live(
        &self,
        mesh: &TetMesh<T>,
        mesh_id: usize,
        query_mesh_id: usize,
        query_vertex_id: usize,
        query_point: &Vec3<T>,
        walker: &mut TetWalker<T>,
        record: &mut ClosestPointRecord<T>,
    ) {
        let params = &self.params;
        let embracing_centroid = mesh.tetrahedron(record.embracing_tet_id).centroid();
        let one_third = T::one() / T::from(3.0).expect("Failed to convert number to T");

        self.surface_scenes[mesh_id].point_query(query_point, T::infinity(), &mut |face_id,
                                                                                   radius| {
            record.number_of_bvh_query += 1;
            if record.number_of_bvh_query > params.max_number_of_bvh_query {
                // Budget exhausted, collapse the radius to end the search.
                record.found = false;
                return QueryAction::Shrink(T::zero());
            }

            let triangle = mesh.surface_triangle(face_id);
            let candidate = triangle.closest_point(query_point);
            let distance = query_point.distance_to_vec3(&candidate.point);

            if mesh_id == query_mesh_id && candidate.point_type.is_vertex() {
                // The query vertex itself is not a valid closest point.
                let face = mesh.surface_face(face_id);
                let corner = match candidate.point_type {
                    ClosestPointType::AtA => 0,
                    ClosestPointType::AtB => 1,
                    _ => 2,
                };
                if face[corner] == query_vertex_id as u32 {
                    return QueryAction::Keep;
                }
            }

            if distance >= radius {
                return QueryAction::Keep;
            }

            if params.check_feasible_region
                && !check_feasible_region(
                    query_point,
                    mesh,
                    face_id,
                    candidate.point_type,
                    params.feasible_region_epsilon,
                )
            {
                return QueryAction::Keep;
            }

            if params.check_tet_traverse
                && (mesh_id == query_mesh_id || params.tetrahedral_traverse_for_non_self_intersection)
            {
                record.number_of_tet_traversal += 1;

                // Nudge non-interior origins towards the triangle centroid so
                // the ray does not start exactly on an edge or vertex.
                let shift = params.center_shift_level;
                let tracing_origin = if candidate.point_type == ClosestPointType::AtInterior {
                    candidate.point
                } else {
                    candidate.point * (T::one() - shift)
                        + (triangle.p1() + triangle.p2() + triangle.p3()) * (shift * one_third)
                };

                let target = if params.shift_query_point_to_center {
                    *query_point * (T::one() - shift) + embracing_centroid * shift
                } else {
                    *query_point
                };

                let ray = target - tracing_origin;
                let ray_length = ray.magnitude();
                let direction = ray * (T::one() / ray_length);
                let max_distance = if params.stop_traversing_after_passing_query_point {
                    params.max_search_distance_multiplier * ray_length
                } else {
                    -T::one()
                };

                let (success, stats) = walker.traverse(
                    mesh,
                    &tracing_origin,
                    &direction,
                    max_distance,
                    mesh.surface_face_belonging_tet(face_id),
                    mesh.surface_face_id_in_tet(face_id),
                    record.embracing_tet_id,
                    params.ray_tri_intersection_epsilon,
                );

                record.number_of_tets_traversed += stats.num_tets_traversed;

                if !success {
                    if stats.stop_reason == TraverseStopReason::EmptyStack {
                        info!(
                            "Dead end encountered, discarding the ray from face {} towards tet {}",
                            face_id, record.embracing_tet_id
                        );
                    }
                    return QueryAction::Keep;
                }
            }

            record.face_id = face_id as i32;
            record.barycentrics = candidate.barycentrics;
            record.point = candidate.point;
            record.point_type = candidate.point_type;
            record.found = true;
            QueryAction::Shrink(distance)
        });
    }

    /// The rest-pose closest point search around one embracing tet. The query
    /// point is mapped into rest space through the embracing tet barycentrics
    /// and accepted points are mapped back by interpolating the current
    /// triangle vertices.
    fn closest_surface_rest_pose(
        &self,
        mesh: &TetMesh<T>,
        mesh_id: usize,
        live_query_point: &Vec3<T>,
        record: &mut ClosestPointRecord<T>,
    ) -> Result<(), CollisionError> {
        let embracing = mesh.tetrahedron(record.embracing_tet_id);
        let barycentrics = embracing.barycentrics(live_query_point);

        let Some(rest_positions) = mesh.rest_positions() else {
            return Err(CollisionError::MissingRestPositions(mesh_id));
        };

        let tet = mesh.tet_vertices(record.embracing_tet_id);
        let mut rest_query_point: Vec3<T> = Vec3::origin();
        for (corner, &vertex_id) in tet.iter().enumerate() {
            rest_query_point =
                rest_query_point + rest_positions[vertex_id as usize] * barycentrics[corner];
        }

        self.surface_scenes[mesh_id].point_query(
            &rest_query_point,
            T::infinity(),
            &mut |face_id, radius| {
                rest_pose_visit(mesh, face_id, radius, &rest_query_point, record)
            },
        );

        Ok(())
    }
}

/// One candidate visit of the rest-pose closest point search. No feasibility
/// or traversal filtering applies in rest space.
#[cfg(feature = "rest-pose")]
fn rest_pose_visit<T: Float>(
    mesh: &TetMesh<T>,
    face_id: usize,
    radius: T,
    rest_query_point: &Vec3<T>,
    record: &mut ClosestPointRecord<T>,
) -> QueryAction<T> {
    let rest_positions = mesh
        .rest_positions()
        .expect("Rest positions checked before the query");
    let triangle = mesh.surface_triangle_from(face_id, rest_positions);

    let candidate = triangle.closest_point(rest_query_point);
    let distance = rest_query_point.distance_to_vec3(&candidate.point);

    if distance >= radius {
        return QueryAction::Keep;
    }

    // Map back to the deformed configuration.
    let live = mesh.surface_triangle(face_id);
    record.point = live.p1() * candidate.barycentrics.x
        + live.p2() * candidate.barycentrics.y
        + live.p3() * candidate.barycentrics.z;

    record.face_id = face_id as i32;
    record.barycentrics = candidate.barycentrics;
    record.point_type = candidate.point_type;
    record.found = true;
    QueryAction::Shrink(distance)
}

/// Stand-in when the crate is built without the `rest-pose` feature: report
/// the mode mismatch once and end the search without a result.
#[cfg(not(feature = "rest-pose"))]
fn rest_pose_visit<T: Float>(
    _mesh: &TetMesh<T>,
    _face_id: usize,
    _radius: T,
    _rest_query_point: &Vec3<T>,
    record: &mut ClosestPointRecord<T>,
) -> QueryAction<T> {
    static REST_POSE_DISABLED: std::sync::Once = std::sync::Once::new();
    REST_POSE_DISABLED.call_once(|| {
        log::warn!(
            "Rest-pose closest point query called, but the rest-pose feature is disabled"
        );
    });

    record.found = false;
    QueryAction::Shrink(T::zero())
}

/// Outward surface normal at a closest point, dispatched on the triangle
/// feature the point landed on.
fn closest_point_normal<T: Float>(
    mesh: &TetMesh<T>,
    face_id: usize,
    point_type: ClosestPointType,
) -> Vec3<T> {
    let vertex_normal = |corner: usize| {
        let surface_vertex = mesh.surface_face_surface_vids(face_id)[corner] as usize;
        mesh.surface_vertex_normal(surface_vertex)
    };

    match point_type {
        ClosestPointType::AtA => vertex_normal(0),
        ClosestPointType::AtB => vertex_normal(1),
        ClosestPointType::AtC => vertex_normal(2),
        ClosestPointType::AtAB => mesh.surface_edge_normal(face_id, 0),
        ClosestPointType::AtBC => mesh.surface_edge_normal(face_id, 1),
        ClosestPointType::AtAC => mesh.surface_edge_normal(face_id, 2),
        ClosestPointType::AtInterior => mesh.surface_face_normal(face_id),
        ClosestPointType::NotFound => Vec3::origin(),
    }
}

#[cfg(test)]
mod tests {

    use super::super::tet_mesh::test_fixtures::*;
    use super::*;

    fn probe_mesh_at(origin: Vec3<f64>) -> TetMesh<f64> {
        TetMesh::new(
            vec![
                origin,
                origin + Vec3::new(1.0, 0.0, 0.0),
                origin + Vec3::new(0.0, 1.0, 0.0),
                origin + Vec3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2, 3]],
        )
    }

    #[test]
    fn test_query_before_initialize_fails() {
        let detector: CollisionDetector<f64> = CollisionDetector::new(Default::default());
        let meshes = vec![unit_tet_mesh()];
        let mut result = PenetrationResult::new();

        let outcome = detector.penetration_query(&meshes, 0, 0, &mut result);
        assert!(matches!(outcome, Err(CollisionError::NotInitialized)));
    }

    #[test]
    fn test_mesh_count_mismatch_fails() {
        let meshes = vec![unit_tet_mesh()];
        let mut detector = CollisionDetector::new(Default::default());
        detector.initialize(&meshes).unwrap();

        let more_meshes = vec![unit_tet_mesh(), unit_tet_mesh()];
        let mut result = PenetrationResult::new();
        let outcome = detector.penetration_query(&more_meshes, 0, 0, &mut result);
        assert!(matches!(
            outcome,
            Err(CollisionError::MeshCountMismatch { .. })
        ));
    }

    #[test]
    fn test_vertex_on_shared_face_of_touching_meshes() {
        // Two unit tets meeting at the plane x+y+z=1, and a probe whose first
        // vertex sits exactly on the shared face. The probe location is
        // chosen exactly representable so its coordinates sum to 1 in
        // floating point.
        let lower = unit_tet_mesh();
        let upper = TetMesh::new(
            vec![
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0),
            ],
            vec![[0, 1, 2, 3]],
        );
        let probe = probe_mesh_at(Vec3::new(0.25, 0.25, 0.5));
        let meshes = vec![lower, upper, probe];

        let mut detector = CollisionDetector::new(Default::default());
        detector.initialize(&meshes).unwrap();

        let mut result = PenetrationResult::new();
        detector.penetration_query(&meshes, 2, 0, &mut result).unwrap();

        // The vertex lies on the boundary of both tets.
        assert_eq!(result.num_intersections(), 2);
        assert_eq!(result.intersected_mesh_ids, vec![0, 1]);

        detector.closest_surface(&meshes, &mut result, true).unwrap();

        let query_point = meshes[2].positions()[0];
        for intersection in 0..2 {
            assert!(result.shortest_path_found[intersection]);
            assert!(
                result.closest_points[intersection].distance_to_vec3(&query_point) < 1e-9,
                "Closest point should coincide with the on-surface query point"
            );
            assert_eq!(
                result.closest_point_types[intersection],
                ClosestPointType::AtInterior
            );
            assert!((result.closest_normals[intersection].magnitude() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_self_collision_disabled_finds_nothing() {
        let meshes = vec![cube_with_inner_tet_mesh()];

        let params = CollisionDetectionParameters {
            handle_self_collision: false,
            ..Default::default()
        };
        let mut detector = CollisionDetector::new(params);
        detector.initialize(&meshes).unwrap();

        // Vertex 8 is the inner tet apex at the cube centre.
        let mut result = PenetrationResult::new();
        detector.penetration_query(&meshes, 0, 8, &mut result).unwrap();

        assert_eq!(result.num_intersections(), 0);
    }

    #[test]
    fn test_self_collision_finds_embracing_tet() {
        let meshes = vec![cube_with_inner_tet_mesh()];

        let mut detector = CollisionDetector::new(Default::default());
        detector.initialize(&meshes).unwrap();

        let mut result = PenetrationResult::new();
        detector.penetration_query(&meshes, 0, 8, &mut result).unwrap();

        // Only the central cube tet embraces the centre vertex. The inner tet
        // is excluded because the query vertex is one of its corners.
        assert_eq!(result.intersected_tets, vec![4]);
        assert_eq!(result.intersected_mesh_ids, vec![0]);

        detector.closest_surface(&meshes, &mut result, true).unwrap();

        assert!(result.shortest_path_found[0]);
        assert!(
            (result.closest_points[0].distance_to_coord(0.5, 0.5, 0.5) - 0.5).abs() < 1e-9,
            "Closest cube face lies at distance 0.5 from the centre"
        );

        // The winning face must be a cube face, not one of the inner tet
        // faces (those are either self-excluded or dead-end on traversal).
        let face_id = result.closest_face_ids[0];
        assert!(face_id >= 0);
        let face = meshes[0].surface_face(face_id as usize);
        assert!(face.iter().all(|&v| v < 8), "Closest face {:?} is not a cube face", face);

        assert_ne!(result.closest_point_types[0], ClosestPointType::NotFound);

        // Outward unit normal at the closest point.
        let normal = result.closest_normals[0];
        let outward = result.closest_points[0] - Vec3::new(0.5, 0.5, 0.5);
        assert!((normal.magnitude() - 1.0).abs() < 1e-9);
        assert!(normal.dot(&outward) > 0.0);

        // The candidate visit counter stays within the configured budget.
        assert!(result.number_of_bvh_query <= detector.params().max_number_of_bvh_query);
        assert!(result.number_of_tet_traversal > 0);
    }

    #[test]
    fn test_budget_exhaustion_yields_not_found() {
        let meshes = vec![cube_with_inner_tet_mesh()];

        let params = CollisionDetectionParameters {
            max_number_of_bvh_query: 3,
            ..Default::default()
        };
        let mut detector = CollisionDetector::new(params);
        detector.initialize(&meshes).unwrap();

        let mut result = PenetrationResult::new();
        detector.penetration_query(&meshes, 0, 8, &mut result).unwrap();
        detector.closest_surface(&meshes, &mut result, true).unwrap();

        assert_eq!(result.num_intersections(), 1);
        assert!(!result.shortest_path_found[0]);
        assert_eq!(result.closest_face_ids[0], -1);
        assert_eq!(result.closest_point_types[0], ClosestPointType::NotFound);
        assert!(result.closest_normals[0].magnitude() < 1e-12);
        assert!(result.number_of_bvh_query <= 3);
    }

    #[test]
    fn test_refit_matches_rebuild() {
        let mut cube = cube_mesh();
        let probe = probe_mesh_at(Vec3::new(0.2, 0.25, 0.3));

        // Initialize against the undeformed cube, then stretch it in place.
        let meshes = vec![cube.clone(), probe.clone()];
        let mut refit_detector = CollisionDetector::new(Default::default());
        refit_detector.initialize(&meshes).unwrap();

        for p in cube.positions_mut() {
            *p = *p * 1.1;
        }
        let deformed_meshes = vec![cube, probe];
        refit_detector
            .update_bvh(
                &deformed_meshes,
                BuildQuality::Refit,
                BuildQuality::Refit,
                true,
            )
            .unwrap();

        let mut refit_result = PenetrationResult::new();
        refit_detector
            .penetration_query(&deformed_meshes, 1, 0, &mut refit_result)
            .unwrap();
        refit_detector
            .closest_surface(&deformed_meshes, &mut refit_result, false)
            .unwrap();

        // A fresh build over the deformed state must agree bit for bit.
        let mut rebuild_detector = CollisionDetector::new(Default::default());
        rebuild_detector.initialize(&deformed_meshes).unwrap();

        let mut rebuild_result = PenetrationResult::new();
        rebuild_detector
            .penetration_query(&deformed_meshes, 1, 0, &mut rebuild_result)
            .unwrap();
        rebuild_detector
            .closest_surface(&deformed_meshes, &mut rebuild_result, false)
            .unwrap();

        assert!(!refit_result.intersected_tets.is_empty());
        assert_eq!(refit_result.intersected_tets, rebuild_result.intersected_tets);
        assert_eq!(refit_result.closest_face_ids, rebuild_result.closest_face_ids);
        for (a, b) in refit_result
            .closest_points
            .iter()
            .zip(rebuild_result.closest_points.iter())
        {
            assert!(a.x == b.x && a.y == b.y && a.z == b.z);
        }
    }

    #[cfg(feature = "rest-pose")]
    #[test]
    fn test_rest_pose_round_trip() {
        let mut cube = cube_mesh();
        let rest = cube.positions().to_vec();
        assert!(cube.set_rest_positions(rest));
        for p in cube.positions_mut() {
            *p = *p * 1.2;
        }

        let mut probe = probe_mesh_at(Vec3::new(0.6, 0.6, 0.6));
        let probe_rest = probe.positions().to_vec();
        assert!(probe.set_rest_positions(probe_rest));

        let meshes = vec![cube, probe];

        let params = CollisionDetectionParameters {
            rest_pose_closest_point: true,
            ..Default::default()
        };
        let mut detector = CollisionDetector::new(params);
        detector.initialize(&meshes).unwrap();

        let mut result = PenetrationResult::new();
        detector.penetration_query(&meshes, 1, 0, &mut result).unwrap();
        assert_eq!(result.intersected_tets, vec![4]);

        detector.closest_surface(&meshes, &mut result, false).unwrap();
        assert!(result.shortest_path_found[0]);

        // The reported point must be exactly the barycentric interpolation of
        // the deformed triangle vertices.
        let face_id = result.closest_face_ids[0] as usize;
        let barycentrics = result.closest_barycentrics[0];
        let triangle = meshes[0].surface_triangle(face_id);
        let expected = triangle.p1() * barycentrics.x
            + triangle.p2() * barycentrics.y
            + triangle.p3() * barycentrics.z;

        let reported = result.closest_points[0];
        assert!(reported.x == expected.x && reported.y == expected.y && reported.z == expected.z);
    }

    #[test]
    fn test_rest_pose_requires_rest_positions() {
        let meshes = vec![cube_mesh()];

        let params = CollisionDetectionParameters {
            rest_pose_closest_point: true,
            ..Default::default()
        };
        let mut detector = CollisionDetector::new(params);
        let outcome = detector.initialize(&meshes);
        assert!(matches!(
            outcome,
            Err(CollisionError::MissingRestPositions(0))
        ));
    }

    #[test]
    fn test_inactive_mesh_is_skipped() {
        let mut mesh = cube_with_inner_tet_mesh();
        mesh.active_for_collision = false;
        let meshes = vec![mesh];

        let mut detector = CollisionDetector::new(Default::default());
        detector.initialize(&meshes).unwrap();

        let mut result = PenetrationResult::new();
        detector.penetration_query(&meshes, 0, 8, &mut result).unwrap();
        assert_eq!(result.num_intersections(), 0);

        // Re-activating through update_bvh brings the mesh back.
        let mut meshes = meshes;
        meshes[0].active_for_collision = true;
        detector
            .update_bvh(&meshes, BuildQuality::Low, BuildQuality::Low, true)
            .unwrap();

        detector.penetration_query(&meshes, 0, 8, &mut result).unwrap();
        assert_eq!(result.intersected_tets, vec![4]);
    }

    #[test]
    fn test_query_batch_matches_sequential() {
        let meshes = vec![cube_with_inner_tet_mesh()];

        let mut detector = CollisionDetector::new(Default::default());
        detector.initialize(&meshes).unwrap();

        let queries = vec![(0, 8), (0, 9), (0, 8)];
        let batch = detector.query_batch(&meshes, &queries, true).unwrap();
        assert_eq!(batch.len(), 3);

        for (&(mesh_id, vertex_id), batched) in queries.iter().zip(batch.iter()) {
            let mut expected = PenetrationResult::new();
            detector
                .penetration_query(&meshes, mesh_id, vertex_id, &mut expected)
                .unwrap();
            detector.closest_surface(&meshes, &mut expected, true).unwrap();

            assert_eq!(batched.intersected_tets, expected.intersected_tets);
            assert_eq!(batched.closest_face_ids, expected.closest_face_ids);
            assert_eq!(batched.shortest_path_found, expected.shortest_path_found);
        }
    }

    #[test]
    fn test_feasibility_accessors() {
        let meshes = vec![cube_mesh()];
        let detector: CollisionDetector<f64> = CollisionDetector::new(Default::default());

        // Outside the cube facing the x=0 plane: interior candidates pass.
        let query = Vec3::new(-0.01, 0.4, 0.5);
        for face_id in 0..meshes[0].num_surface_faces() {
            let triangle = meshes[0].surface_triangle(face_id);
            if triangle.p.iter().all(|p| p.x == 0.0) {
                let candidate = triangle.closest_point(&query);
                if candidate.point_type == ClosestPointType::AtInterior {
                    assert!(detector.check_feasible_region(
                        &query,
                        &meshes[0],
                        face_id,
                        candidate.point_type
                    ));
                }
            }
        }

        // A corner of the unit tet accepts only queries in its normal cone.
        let tet = unit_tet_mesh();
        assert!(detector.check_vertex_feasible_region(&Vec3::new(-0.1, -0.1, -0.1), &tet, 0));
        assert!(!detector.check_vertex_feasible_region(&Vec3::new(-0.1, -0.1, -0.1), &tet, 1));
    }
}
