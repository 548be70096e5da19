use std::time::Instant;

use hashbrown::HashMap;
use log::{info, warn};
use num_traits::Float;

use crate::types::geometry::{traits::Bounded, BoundingBox, Tetrahedron, Triangle, Vec3};
use crate::utils;

/// Sentinel for a missing neighbor in adjacency tables.
pub const NO_NEIGHBOR: i32 = -1;

/// A volumetric body discretized into tetrahedra.
///
/// The mesh owns the raw vertex and tet buffers and derives the full surface
/// and adjacency topology at construction time: the exterior triangle faces
/// (those appearing in exactly one tet), the tet each surface face belongs
/// to, the per-edge neighbor face of every surface face, the tet-to-tet face
/// adjacency, and the surface vertex one-rings.
///
/// Tets must be positively oriented, see [`Tetrahedron`]. Surface faces are
/// stored with outward winding. The surface is expected to be watertight:
/// every surface edge shared by exactly two surface faces. Boundary edges are
/// tolerated with a warning, but feasibility filtering treats them as a
/// structural defect.
///
/// During collision queries the mesh is read-only. Between frames a simulator
/// integrates new vertex locations through [`TetMesh::positions_mut`] and
/// refreshes the detector's spatial indexes.
#[derive(Debug, Clone)]
pub struct TetMesh<T> {
    positions: Vec<Vec3<T>>,
    rest_positions: Option<Vec<Vec3<T>>>,
    tets: Vec<[u32; 4]>,

    surface_faces: Vec<[u32; 3]>,
    surface_faces_surface_vids: Vec<[u32; 3]>,
    surface_face_belonging_tet: Vec<u32>,
    surface_face_id_in_tet: Vec<u8>,
    surface_face_neighbors: Vec<[i32; 3]>,

    tet_vid_to_surface_vid: Vec<i32>,
    surface_vertex_neighbors: Vec<Vec<u32>>,
    surface_vertex_faces: Vec<Vec<u32>>,

    tet_neighbors: Vec<[i32; 4]>,
    tet_neighbor_entry_faces: Vec<[i8; 4]>,

    /// Whether the mesh takes part in collision detection. Honored when the
    /// detector updates its spatial indexes.
    pub active_for_collision: bool,
}

impl<T: Float> TetMesh<T> {
    /// Create a new mesh from vertex positions and tet indices, deriving the
    /// surface and adjacency topology.
    ///
    /// # Arguments
    ///
    /// * `positions` - One position per vertex.
    /// * `tets` - Four vertex indices per tet, positively oriented.
    pub fn new(positions: Vec<Vec3<T>>, tets: Vec<[u32; 4]>) -> Self {
        let before = Instant::now();

        let mut mesh = Self {
            positions,
            rest_positions: None,
            tets,
            surface_faces: Vec::new(),
            surface_faces_surface_vids: Vec::new(),
            surface_face_belonging_tet: Vec::new(),
            surface_face_id_in_tet: Vec::new(),
            surface_face_neighbors: Vec::new(),
            tet_vid_to_surface_vid: Vec::new(),
            surface_vertex_neighbors: Vec::new(),
            surface_vertex_faces: Vec::new(),
            tet_neighbors: Vec::new(),
            tet_neighbor_entry_faces: Vec::new(),
            active_for_collision: true,
        };

        mesh.derive_tet_adjacency();
        mesh.derive_surface_vertices();
        mesh.derive_surface_adjacency();

        info!(
            "Tet mesh topology derived for {} tets and {} surface faces in {:.2?}",
            utils::math_helper::format_integer(mesh.num_tets()),
            utils::math_helper::format_integer(mesh.num_surface_faces()),
            before.elapsed()
        );

        mesh
    }

    /// Assign the reference configuration used for rest-pose queries.
    ///
    /// Returns true if the positions are sucessfully assigned.
    ///
    /// # Arguments
    ///
    /// * `rest_positions` - One position per vertex, matching the vertex count.
    pub fn set_rest_positions(&mut self, rest_positions: Vec<Vec3<T>>) -> bool {
        if rest_positions.len() != self.positions.len() {
            false
        } else {
            self.rest_positions = Some(rest_positions);
            true
        }
    }

    fn derive_tet_adjacency(&mut self) {
        self.tet_neighbors = vec![[NO_NEIGHBOR; 4]; self.tets.len()];
        self.tet_neighbor_entry_faces = vec![[NO_NEIGHBOR as i8; 4]; self.tets.len()];

        let mut face_map: HashMap<[u32; 3], (u32, u8)> =
            HashMap::with_capacity(4 * self.tets.len());

        for (tet_id, tet) in self.tets.iter().enumerate() {
            debug_assert!(
                self.tetrahedron(tet_id).signed_volume() > T::zero(),
                "Tet {} is not positively oriented",
                tet_id
            );

            for (local_face, face_vertices) in Tetrahedron::<T>::FACE_VERTICES.iter().enumerate() {
                let mut key = [
                    tet[face_vertices[0]],
                    tet[face_vertices[1]],
                    tet[face_vertices[2]],
                ];
                key.sort_unstable();

                match face_map.remove(&key) {
                    Some((other_tet, other_face)) => {
                        self.tet_neighbors[tet_id][local_face] = other_tet as i32;
                        self.tet_neighbor_entry_faces[tet_id][local_face] = other_face as i8;
                        self.tet_neighbors[other_tet as usize][other_face as usize] =
                            tet_id as i32;
                        self.tet_neighbor_entry_faces[other_tet as usize][other_face as usize] =
                            local_face as i8;
                    }
                    None => {
                        face_map.insert(key, (tet_id as u32, local_face as u8));
                    }
                }
            }
        }

        // Faces left unpaired form the exterior surface. Collected in tet
        // order to keep surface face ids deterministic.
        for (tet_id, tet) in self.tets.iter().enumerate() {
            for (local_face, face_vertices) in Tetrahedron::<T>::FACE_VERTICES.iter().enumerate() {
                if self.tet_neighbors[tet_id][local_face] != NO_NEIGHBOR {
                    continue;
                }

                self.surface_faces.push([
                    tet[face_vertices[0]],
                    tet[face_vertices[1]],
                    tet[face_vertices[2]],
                ]);
                self.surface_face_belonging_tet.push(tet_id as u32);
                self.surface_face_id_in_tet.push(local_face as u8);
            }
        }
    }

    fn derive_surface_vertices(&mut self) {
        self.tet_vid_to_surface_vid = vec![NO_NEIGHBOR; self.positions.len()];
        for face in self.surface_faces.iter() {
            for &vertex in face {
                self.tet_vid_to_surface_vid[vertex as usize] = 0;
            }
        }

        let mut next_surface_id = 0;
        for entry in self.tet_vid_to_surface_vid.iter_mut() {
            if *entry != NO_NEIGHBOR {
                *entry = next_surface_id;
                next_surface_id += 1;
            }
        }

        self.surface_faces_surface_vids = self
            .surface_faces
            .iter()
            .map(|face| {
                [
                    self.tet_vid_to_surface_vid[face[0] as usize] as u32,
                    self.tet_vid_to_surface_vid[face[1] as usize] as u32,
                    self.tet_vid_to_surface_vid[face[2] as usize] as u32,
                ]
            })
            .collect();

        self.surface_vertex_neighbors = vec![Vec::new(); next_surface_id as usize];
        self.surface_vertex_faces = vec![Vec::with_capacity(6); next_surface_id as usize];
        for (face_id, face) in self.surface_faces_surface_vids.iter().enumerate() {
            for &vertex in face {
                self.surface_vertex_faces[vertex as usize].push(face_id as u32);
            }
        }
    }

    fn derive_surface_adjacency(&mut self) {
        self.surface_face_neighbors = vec![[NO_NEIGHBOR; 3]; self.surface_faces.len()];

        let mut edge_map: HashMap<(u32, u32), (u32, u8)> =
            HashMap::with_capacity(3 * self.surface_faces.len());

        for (face_id, face) in self.surface_faces.iter().enumerate() {
            for edge in 0..3 {
                let v1 = face[edge];
                let v2 = face[(edge + 1) % 3];
                let key = (v1.min(v2), v1.max(v2));

                match edge_map.remove(&key) {
                    Some((other_face, other_edge)) => {
                        self.surface_face_neighbors[face_id][edge] = other_face as i32;
                        self.surface_face_neighbors[other_face as usize][other_edge as usize] =
                            face_id as i32;

                        // Record the one-ring once per unique surface edge.
                        let surface_v1 = self.tet_vid_to_surface_vid[v1 as usize] as usize;
                        let surface_v2 = self.tet_vid_to_surface_vid[v2 as usize] as usize;
                        self.surface_vertex_neighbors[surface_v1].push(v2);
                        self.surface_vertex_neighbors[surface_v2].push(v1);
                    }
                    None => {
                        edge_map.insert(key, (face_id as u32, edge as u8));
                    }
                }
            }
        }

        if !edge_map.is_empty() {
            warn!(
                "Surface is not watertight, {} boundary edges found",
                edge_map.len()
            );
        }
    }

    /// Total number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Total number of tets.
    pub fn num_tets(&self) -> usize {
        self.tets.len()
    }

    /// Total number of surface faces.
    pub fn num_surface_faces(&self) -> usize {
        self.surface_faces.len()
    }

    /// Total number of surface vertices.
    pub fn num_surface_vertices(&self) -> usize {
        self.surface_vertex_neighbors.len()
    }

    /// Returns the current vertex positions.
    pub fn positions(&self) -> &[Vec3<T>] {
        &self.positions
    }

    /// Returns a mutable view of the current vertex positions, for the
    /// simulator to write integrated locations into between query phases.
    pub fn positions_mut(&mut self) -> &mut [Vec3<T>] {
        &mut self.positions
    }

    /// Returns the rest-pose vertex positions, if assigned.
    pub fn rest_positions(&self) -> Option<&[Vec3<T>]> {
        self.rest_positions.as_deref()
    }

    /// Returns the tet vertex index buffer.
    pub fn tets(&self) -> &[[u32; 4]] {
        &self.tets
    }

    /// Returns the vertex indices of a tet.
    pub fn tet_vertices(&self, tet_id: usize) -> [u32; 4] {
        self.tets[tet_id]
    }

    /// Returns the surface face index buffer, in volume-vertex space.
    pub fn surface_faces(&self) -> &[[u32; 3]] {
        &self.surface_faces
    }

    /// Returns the vertex indices of a surface face, in volume-vertex space.
    pub fn surface_face(&self, face_id: usize) -> [u32; 3] {
        self.surface_faces[face_id]
    }

    /// Returns the vertex indices of a surface face, in surface-vertex space.
    pub fn surface_face_surface_vids(&self, face_id: usize) -> [u32; 3] {
        self.surface_faces_surface_vids[face_id]
    }

    /// Returns the tet a surface face belongs to.
    pub fn surface_face_belonging_tet(&self, face_id: usize) -> usize {
        self.surface_face_belonging_tet[face_id] as usize
    }

    /// Returns which of the four local faces of its owning tet a surface face is.
    pub fn surface_face_id_in_tet(&self, face_id: usize) -> usize {
        self.surface_face_id_in_tet[face_id] as usize
    }

    /// Returns the neighboring surface face across an edge of a surface face,
    /// or [`NO_NEIGHBOR`] for a boundary edge.
    ///
    /// # Arguments
    ///
    /// * `face_id` - The surface face.
    /// * `edge` - Local edge index: 0 for ab, 1 for bc, 2 for ca.
    pub fn surface_face_neighbor(&self, face_id: usize, edge: usize) -> i32 {
        self.surface_face_neighbors[face_id][edge]
    }

    /// Returns the surface vertex index of a volume vertex, or [`NO_NEIGHBOR`]
    /// for interior vertices.
    pub fn surface_vertex_id(&self, vertex_id: usize) -> i32 {
        self.tet_vid_to_surface_vid[vertex_id]
    }

    /// Returns the one-ring neighbors of a surface vertex, as volume-vertex
    /// indices usable for position look-ups.
    ///
    /// # Arguments
    ///
    /// * `surface_vertex_id` - The surface vertex index.
    pub fn surface_vertex_neighbors(&self, surface_vertex_id: usize) -> &[u32] {
        &self.surface_vertex_neighbors[surface_vertex_id]
    }

    /// Returns the surface faces incident to a surface vertex.
    pub fn surface_vertex_faces(&self, surface_vertex_id: usize) -> &[u32] {
        &self.surface_vertex_faces[surface_vertex_id]
    }

    /// Returns the neighboring tet across a local face of a tet, or
    /// [`NO_NEIGHBOR`] for a surface face.
    pub fn tet_neighbor(&self, tet_id: usize, local_face: usize) -> i32 {
        self.tet_neighbors[tet_id][local_face]
    }

    /// Returns the local face in the neighboring tet that matches a local
    /// face of a tet, or [`NO_NEIGHBOR`] as `i8` for a surface face.
    pub fn tet_neighbor_entry_face(&self, tet_id: usize, local_face: usize) -> i8 {
        self.tet_neighbor_entry_faces[tet_id][local_face]
    }

    /// Returns a tet as a geometric [`Tetrahedron`] at the current positions.
    pub fn tetrahedron(&self, tet_id: usize) -> Tetrahedron<T> {
        let tet = self.tets[tet_id];
        Tetrahedron::new(
            self.positions[tet[0] as usize],
            self.positions[tet[1] as usize],
            self.positions[tet[2] as usize],
            self.positions[tet[3] as usize],
        )
    }

    /// Returns a surface face as a geometric [`Triangle`] at the current positions.
    pub fn surface_triangle(&self, face_id: usize) -> Triangle<T> {
        self.surface_triangle_from(face_id, &self.positions)
    }

    pub(crate) fn surface_triangle_from(
        &self,
        face_id: usize,
        vertices: &[Vec3<T>],
    ) -> Triangle<T> {
        let face = self.surface_faces[face_id];
        Triangle::new(
            vertices[face[0] as usize],
            vertices[face[1] as usize],
            vertices[face[2] as usize],
        )
    }

    /// Compute the bounds of every tet at the current positions.
    pub fn tet_bounds(&self) -> Vec<BoundingBox<T>> {
        (0..self.num_tets())
            .map(|tet_id| self.tetrahedron(tet_id).bounds())
            .collect()
    }

    /// Compute the bounds of every surface face.
    ///
    /// # Arguments
    ///
    /// * `use_rest_positions` - Evaluate at the rest pose instead of the
    ///   current positions. Requires rest positions to be assigned.
    pub fn surface_face_bounds(&self, use_rest_positions: bool) -> Vec<BoundingBox<T>> {
        let vertices: &[Vec3<T>] = if use_rest_positions {
            self.rest_positions
                .as_deref()
                .expect("Rest positions not assigned")
        } else {
            &self.positions
        };

        (0..self.num_surface_faces())
            .map(|face_id| self.surface_triangle_from(face_id, vertices).bounds())
            .collect()
    }

    /// Compute the outward normal of a surface face at the current positions.
    pub fn surface_face_normal(&self, face_id: usize) -> Vec3<T> {
        self.surface_triangle(face_id).face_normal()
    }

    /// Compute the normal at a surface vertex as the angle weighted average of
    /// the incident surface face normals.
    ///
    /// # Arguments
    ///
    /// * `surface_vertex_id` - The surface vertex index.
    pub fn surface_vertex_normal(&self, surface_vertex_id: usize) -> Vec3<T> {
        let mut normal: Vec3<T> = Vec3::origin();
        for &face_id in &self.surface_vertex_faces[surface_vertex_id] {
            let triangle = self.surface_triangle(face_id as usize);
            let weight = self.face_angle_at_surface_vertex(face_id as usize, surface_vertex_id);
            normal = normal + triangle.face_normal() * weight;
        }
        normal.normalize()
    }

    /// Compute the normal of a surface edge as the average of the two incident
    /// face normals.
    ///
    /// # Arguments
    ///
    /// * `face_id` - The surface face.
    /// * `edge` - Local edge index: 0 for ab, 1 for bc, 2 for ca.
    pub fn surface_edge_normal(&self, face_id: usize, edge: usize) -> Vec3<T> {
        let normal = self.surface_face_normal(face_id);
        let neighbor = self.surface_face_neighbors[face_id][edge];
        if neighbor == NO_NEIGHBOR {
            return normal;
        }

        (normal + self.surface_face_normal(neighbor as usize)).normalize()
    }

    fn face_angle_at_surface_vertex(&self, face_id: usize, surface_vertex_id: usize) -> T {
        let face = self.surface_faces_surface_vids[face_id];
        let corner = face
            .iter()
            .position(|&v| v as usize == surface_vertex_id)
            .expect("Vertex not found in adjacent face. Surface topology must be corrupt.");

        let triangle = self.surface_triangle(face_id);
        let vertex = triangle.p[corner];
        let v1 = triangle.p[(corner + 1) % 3] - vertex;
        let v2 = triangle.p[(corner + 2) % 3] - vertex;

        v1.angle(&v2).unwrap_or(T::zero())
    }
}


#[cfg(test)]
mod tests {

    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn test_single_tet_topology() {
        let mesh = unit_tet_mesh();

        assert_eq!(mesh.num_surface_faces(), 4);
        assert_eq!(mesh.num_surface_vertices(), 4);

        // All faces are exterior, so the tet has no neighbors.
        for local_face in 0..4 {
            assert_eq!(mesh.tet_neighbor(0, local_face), NO_NEIGHBOR);
        }

        // Watertight: every surface edge pairs two faces.
        for face_id in 0..mesh.num_surface_faces() {
            for edge in 0..3 {
                assert_ne!(mesh.surface_face_neighbor(face_id, edge), NO_NEIGHBOR);
            }
        }

        // Each surface vertex connects to the three others.
        for surface_vid in 0..mesh.num_surface_vertices() {
            assert_eq!(mesh.surface_vertex_neighbors(surface_vid).len(), 3);
        }
    }

    #[test]
    fn test_two_tet_adjacency() {
        let mesh = two_tet_mesh();

        // The shared face {1,2,3} is local face 0 of the first tet and local
        // face 3 of the second.
        assert_eq!(mesh.tet_neighbor(0, 0), 1);
        assert_eq!(mesh.tet_neighbor_entry_face(0, 0), 3);
        assert_eq!(mesh.tet_neighbor(1, 3), 0);
        assert_eq!(mesh.tet_neighbor_entry_face(1, 3), 0);

        // Six faces remain on the surface.
        assert_eq!(mesh.num_surface_faces(), 6);
    }

    #[test]
    fn test_cube_topology() {
        let mesh = cube_mesh();

        assert_eq!(mesh.num_tets(), 5);
        assert_eq!(mesh.num_surface_faces(), 12);
        assert_eq!(mesh.num_surface_vertices(), 8);

        // The central tet is enclosed by the four corner tets.
        let central = 4;
        for local_face in 0..4 {
            assert_ne!(mesh.tet_neighbor(central, local_face), NO_NEIGHBOR);
        }

        // Watertight surface.
        for face_id in 0..mesh.num_surface_faces() {
            for edge in 0..3 {
                assert_ne!(mesh.surface_face_neighbor(face_id, edge), NO_NEIGHBOR);
            }
        }
    }

    #[test]
    fn test_surface_faces_wind_outwards() {
        let mesh = cube_mesh();
        let centre = Vec3::new(0.5, 0.5, 0.5);

        for face_id in 0..mesh.num_surface_faces() {
            let triangle = mesh.surface_triangle(face_id);
            let outward = triangle.centroid() - centre;
            assert!(
                triangle.face_normal().dot(&outward) > 0.0,
                "Surface face {} winds inwards",
                face_id
            );
        }
    }

    #[test]
    fn test_owning_tet_matches_face() {
        let mesh = cube_mesh();

        for face_id in 0..mesh.num_surface_faces() {
            let tet_id = mesh.surface_face_belonging_tet(face_id);
            let local_face = mesh.surface_face_id_in_tet(face_id);

            let tet = mesh.tet_vertices(tet_id);
            let mut from_tet: Vec<u32> = Tetrahedron::<f64>::FACE_VERTICES[local_face]
                .iter()
                .map(|&corner| tet[corner])
                .collect();
            let mut from_face = mesh.surface_face(face_id).to_vec();

            from_tet.sort_unstable();
            from_face.sort_unstable();
            assert_eq!(from_tet, from_face);
        }
    }

    #[test]
    fn test_cube_face_normals() {
        let mesh = cube_mesh();

        // Face z=0 contains vertices 0..4 only; its normal points down.
        for face_id in 0..mesh.num_surface_faces() {
            let face = mesh.surface_face(face_id);
            if face.iter().all(|&v| v < 4) {
                let normal = mesh.surface_face_normal(face_id);
                assert!(normal.distance_to_coord(0.0, 0.0, -1.0) < 1e-12);
            }
        }
    }

    #[test]
    fn test_cube_vertex_normal_diagonal() {
        let mesh = cube_mesh();

        // The corner at the origin is surrounded by the three faces at x=0,
        // y=0 and z=0, its angle weighted normal points down the diagonal.
        let surface_vid = mesh.surface_vertex_id(0);
        assert_ne!(surface_vid, NO_NEIGHBOR);

        let normal = mesh.surface_vertex_normal(surface_vid as usize);
        let expected = Vec3::new(-1.0, -1.0, -1.0).normalize();
        assert!(
            normal.distance_to_vec3(&expected) < 1e-9,
            "Incorrect corner normal. Was {} but expected {}",
            normal,
            expected
        );
    }

    #[test]
    fn test_surface_vertex_ids_cover_both_components() {
        // Every vertex of the two-component fixture lies on some surface.
        let mesh = cube_with_inner_tet_mesh();
        for vertex_id in 0..mesh.num_vertices() {
            assert_ne!(mesh.surface_vertex_id(vertex_id), NO_NEIGHBOR);
        }
        assert_eq!(mesh.num_surface_faces(), 16);
    }

    #[test]
    fn test_rest_positions_length_check() {
        let mut mesh = unit_tet_mesh();
        assert!(!mesh.set_rest_positions(vec![Vec3::origin(); 3]));
        assert!(mesh.set_rest_positions(vec![Vec3::origin(); 4]));
        assert!(mesh.rest_positions().is_some());
    }
}
