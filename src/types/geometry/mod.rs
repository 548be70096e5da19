mod bounding_box;
mod bvh;
mod tetrahedron;
mod triangle;
mod vec3f;

/// Traits related to geometric computations.
pub mod traits;

pub use bounding_box::*;
pub use bvh::*;
pub use tetrahedron::*;
pub use triangle::*;
pub use vec3f::*;
