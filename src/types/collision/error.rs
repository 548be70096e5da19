/// Error variants returned from collision detector operations, in the event
/// that something went wrong.
#[derive(Debug)]
pub enum CollisionError {
    /// An operation was invoked before the detector was initialized.
    NotInitialized,
    /// The mesh table passed to an operation does not match the table the
    /// detector was initialized with.
    MeshCountMismatch {
        expected: usize,
        actual: usize,
    },
    /// Rest-pose queries were requested for a mesh without rest positions.
    MissingRestPositions(usize),
}

impl std::fmt::Display for CollisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionError::NotInitialized => {
                write!(
                    f,
                    "Collision detector is not initialized. Call initialize before querying."
                )
            }
            CollisionError::MeshCountMismatch { expected, actual } => {
                write!(
                    f,
                    "Mesh table mismatch. The detector was initialized with {expected} meshes but received {actual}."
                )
            }
            CollisionError::MissingRestPositions(mesh_id) => {
                write!(
                    f,
                    "Rest-pose closest point queries requested, but mesh {mesh_id} has no rest positions assigned."
                )
            }
        }
    }
}

impl std::error::Error for CollisionError {}
