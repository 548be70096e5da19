use log::error;
use num_traits::Float;

use crate::types::geometry::{ClosestPointType, Vec3};

use super::{TetMesh, NO_NEIGHBOR};

// Absolute term of the half-space relaxation. Only the relative term is used.
const ABSOLUTE_RELAXATION: f64 = 0.0;

/// Check whether a candidate closest point is geometrically admissible for
/// the triangle feature it landed on.
///
/// A closest point that wins the pure distance comparison can still be a
/// spurious contact when the query point does not lie in the region from
/// which the feature is actually the nearest part of the surface. Edge and
/// vertex candidates are filtered against the inner half-spaces spanned by
/// the incident faces and edges; interior candidates are always admissible.
///
/// # Arguments
///
/// * `query_point` - The point the closest point was computed from.
/// * `mesh` - The mesh the candidate face belongs to.
/// * `face_id` - The candidate surface face.
/// * `point_type` - Feature classification of the candidate closest point.
/// * `epsilon` - Relative relaxation of the half-space tests.
pub fn check_feasible_region<T: Float>(
    query_point: &Vec3<T>,
    mesh: &TetMesh<T>,
    face_id: usize,
    point_type: ClosestPointType,
    epsilon: T,
) -> bool {
    let face = mesh.surface_face(face_id);
    match point_type {
        // A closest point inside the triangle is always admissible.
        ClosestPointType::AtInterior => true,
        ClosestPointType::AtAB => check_edge_feasible_region(query_point, mesh, face_id, 0, epsilon),
        ClosestPointType::AtBC => check_edge_feasible_region(query_point, mesh, face_id, 1, epsilon),
        ClosestPointType::AtAC => check_edge_feasible_region(query_point, mesh, face_id, 2, epsilon),
        ClosestPointType::AtA => {
            check_vertex_feasible_region(query_point, mesh, face[0] as usize, epsilon)
        }
        ClosestPointType::AtB => {
            check_vertex_feasible_region(query_point, mesh, face[1] as usize, epsilon)
        }
        ClosestPointType::AtC => {
            check_vertex_feasible_region(query_point, mesh, face[2] as usize, epsilon)
        }
        ClosestPointType::NotFound => false,
    }
}

/// Check the feasible region of a surface edge.
///
/// The region is the inner prism over the edge bounded by four half-spaces:
/// the two planes through the endpoints perpendicular to the edge, and the
/// two planes spanned by the edge and the inward normal of each incident
/// face. All four tests are relaxed by `-|edge|^2 * epsilon`.
///
/// # Arguments
///
/// * `query_point` - The point to classify.
/// * `mesh` - The mesh the edge belongs to.
/// * `face_id` - The surface face the edge was found on.
/// * `edge` - Local edge index: 0 for ab, 1 for bc, 2 for ca.
/// * `epsilon` - Relative relaxation of the half-space tests.
pub fn check_edge_feasible_region<T: Float>(
    query_point: &Vec3<T>,
    mesh: &TetMesh<T>,
    face_id: usize,
    edge: usize,
    epsilon: T,
) -> bool {
    let neighbor_face_id = mesh.surface_face_neighbor(face_id, edge);
    if neighbor_face_id == NO_NEIGHBOR {
        debug_assert!(false, "Boundary edge encountered in feasibility filtering");
        error!("Boundary edge encountered! The mesh is supposed to be watertight.");
        return true;
    }

    let face = mesh.surface_face(face_id);
    let v1 = mesh.positions()[face[edge] as usize];
    let v2 = mesh.positions()[face[(edge + 1) % 3] as usize];

    // Looking from the inside of the mesh, so the face normals are inverted.
    let normal_1 = -mesh.surface_face_normal(face_id);
    let normal_2 = -mesh.surface_face_normal(neighbor_face_id as usize);

    let ap = *query_point - v1;
    let bp = *query_point - v2;
    let ab = v2 - v1;
    let ba = -ab;

    let relaxed = -ab.dot(&ab) * epsilon
        - T::from(ABSOLUTE_RELAXATION).expect("Failed to convert number to T");

    if ap.dot(&ab) < relaxed {
        return false;
    }

    if bp.dot(&ba) < relaxed {
        return false;
    }

    if ap.dot(&normal_1.cross(&ab)) < relaxed {
        return false;
    }

    if ap.dot(&normal_2.cross(&ba)) < relaxed {
        return false;
    }

    true
}

/// Check the feasible region of a surface vertex.
///
/// The region is the intersection of the half-spaces through the vertex
/// perpendicular to each one-ring edge, relaxed by `-|edge|^2 * epsilon`. A
/// query point inside it has the vertex as the nearest part of the local
/// surface.
///
/// # Arguments
///
/// * `query_point` - The point to classify.
/// * `mesh` - The mesh the vertex belongs to.
/// * `vertex_id` - The vertex, in volume-vertex space. Must lie on the surface.
/// * `epsilon` - Relative relaxation of the half-space tests.
pub fn check_vertex_feasible_region<T: Float>(
    query_point: &Vec3<T>,
    mesh: &TetMesh<T>,
    vertex_id: usize,
    epsilon: T,
) -> bool {
    let a = mesh.positions()[vertex_id];
    let ap = *query_point - a;

    let surface_vertex_id = mesh.surface_vertex_id(vertex_id);
    debug_assert!(surface_vertex_id != NO_NEIGHBOR);

    for &neighbor in mesh.surface_vertex_neighbors(surface_vertex_id as usize) {
        let b = mesh.positions()[neighbor as usize];
        let ba = a - b;

        let relaxed = -ba.dot(&ba) * epsilon
            - T::from(ABSOLUTE_RELAXATION).expect("Failed to convert number to T");

        // ap . ba >= 0 puts the query point on the far side of the plane
        // through the vertex whose normal is the incoming edge direction. The
        // negative margin makes the determination more conservative.
        if ap.dot(&ba) < relaxed {
            return false;
        }
    }

    true
}
