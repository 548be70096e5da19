//! # Tetcollide
//!
//! `Tetcollide` is a discrete collision detection (DCD) core for simulators of
//! deformable volumetric bodies represented as tetrahedral meshes.
//!
//! ## Overview
//!
//! Given a collection of tetrahedral meshes, the detector answers two coupled
//! spatial queries per simulation frame:
//!
//! - **Penetration query**: for a query vertex of one mesh, enumerate every
//!   tetrahedron (of any mesh, including its own when self-collision handling
//!   is enabled) whose interior contains the vertex.
//! - **Closest surface query**: for each embracing tetrahedron, find the
//!   nearest point on the surface of the intersected mesh that passes two
//!   admissibility filters: a *feasible region* test around the candidate
//!   triangle feature, and a *tetrahedral traversal* test that walks a ray
//!   through the tet adjacency from the candidate back to the embracing tet.
//!
//! Both queries are driven by radius-bounded point queries against spatial
//! indexes owned by the detector: one triangle index per mesh surface and a
//! single global index over all tetrahedra. The caller owns the meshes and
//! mutates vertex positions between frames; [`CollisionDetector::update_bvh`]
//! refits or rebuilds the indexes before the next query phase.
//!
//! ### Key features
//!
//! - **Topology derivation**: [`TetMesh`](types::collision::TetMesh) derives
//!   surface faces, tet adjacency, and surface one-rings from raw vertex and
//!   tet buffers.
//! - **Three traversal variants**: dynamic, static-stack (with transparent
//!   fallback), and loop-less epoch-stamped walkers share one contract.
//! - **Rest-pose queries**: optional material-space closest point look-ups via
//!   the `rest-pose` feature and the corresponding runtime parameter.
//! - **Batch driver**: fan out independent query pipelines over many vertices
//!   with `rayon`.
//!
//! ## Example: detecting a vertex inside another body
//!
//! ```rust
//! use tetcollide::types::collision::{
//!     CollisionDetectionParameters, CollisionDetector, PenetrationResult, TetMesh,
//! };
//! use tetcollide::types::geometry::Vec3;
//!
//! // A single positively oriented tetrahedron.
//! let body = TetMesh::new(
//!     vec![
//!         Vec3::new(0.0, 0.0, 0.0),
//!         Vec3::new(1.0, 0.0, 0.0),
//!         Vec3::new(0.0, 1.0, 0.0),
//!         Vec3::new(0.0, 0.0, 1.0),
//!     ],
//!     vec![[0, 1, 2, 3]],
//! );
//!
//! // A second body with its first vertex penetrating the body above.
//! let probe = TetMesh::new(
//!     vec![
//!         Vec3::new(0.2, 0.2, 0.2),
//!         Vec3::new(2.0, 0.2, 0.2),
//!         Vec3::new(2.0, 1.2, 0.2),
//!         Vec3::new(2.0, 0.2, 1.2),
//!     ],
//!     vec![[0, 1, 2, 3]],
//! );
//!
//! let meshes = vec![body, probe];
//!
//! let mut detector = CollisionDetector::new(CollisionDetectionParameters::default());
//! detector.initialize(&meshes).unwrap();
//!
//! let mut result = PenetrationResult::new();
//! detector.penetration_query(&meshes, 1, 0, &mut result).unwrap();
//! assert_eq!(result.intersected_tets.len(), 1);
//!
//! detector.closest_surface(&meshes, &mut result, true).unwrap();
//! assert!(result.shortest_path_found[0]);
//! ```
//!
//! The main modules of the crate are [`types::collision`], which holds the
//! detector, mesh and traversal machinery, and [`types::geometry`], which
//! holds the vector, triangle, tetrahedron and spatial index primitives.

/// The current version of the `Tetcollide` library.
pub const TETCOLLIDE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Types for collision detection and mesh queries.
pub mod types {
    /// Collision detection over tetrahedral meshes.
    pub mod collision;
    /// General geometry types for spatial operations and representations.
    pub mod geometry;
}

/// Utility modules for logging and math operations.
pub mod utils {
    /// Logging utilities for debugging and tracing.
    pub mod logging;
    /// Mathematical helper functions.
    pub mod math_helper;
}
