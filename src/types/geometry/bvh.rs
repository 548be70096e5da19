use log::debug;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use super::{BoundingBox, Vec3};

type BvhChildren<T> = Box<[Option<BvhNode<T>>; 8]>;

/// Build quality for a spatial index.
///
/// The quality trades construction time against query pruning. `Refit` keeps
/// the existing tree structure and only recomputes the node bounds, which is
/// the cheap option when vertex buffers change in place between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildQuality {
    /// Shallow tree with large leaves. Fast to build.
    Low,
    /// Balanced tree depth and leaf size.
    Medium,
    /// Deep tree with small leaves. Best pruning.
    High,
    /// Keep the current structure and recompute bounds only.
    Refit,
}

impl BuildQuality {
    /// Maximum recursion depth and leaf size for the quality level.
    pub(crate) fn profile(&self) -> (u32, usize) {
        match self {
            BuildQuality::Low | BuildQuality::Refit => (6, 16),
            BuildQuality::Medium => (8, 8),
            BuildQuality::High => (12, 4),
        }
    }
}

/// Action returned from a point query visitor for each candidate primitive.
#[derive(Debug, Clone, Copy)]
pub enum QueryAction<T> {
    /// Leave the query radius unchanged.
    Keep,
    /// Shrink the query radius to the given value.
    Shrink(T),
}

/// Spatial index over a set of primitives, used for radius-bounded point queries.
///
/// The tree stores primitive indices only. Primitive bounds are provided at
/// build and refit time, so the backing geometry buffers stay with the caller
/// and can be shared between several indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bvh<T> {
    root: Option<BvhNode<T>>,
    num_primitives: usize,
}

impl<T: Float> Bvh<T> {
    /// Build an index over a set of primitive bounds.
    ///
    /// Each primitive is assigned to the single child octant containing its
    /// box centre, and node bounds are the union of the contained primitive
    /// bounds, so a refit can recompute them without touching the structure.
    ///
    /// # Arguments
    ///
    /// * `bounds` - One bounding box per primitive, indexed by primitive id.
    /// * `quality` - Build quality controlling tree depth and leaf size.
    pub fn build(bounds: &[BoundingBox<T>], quality: BuildQuality) -> Self {
        if bounds.is_empty() {
            return Self {
                root: None,
                num_primitives: 0,
            };
        }

        let (max_depth, max_leaf_size) = quality.profile();
        let mut root = BvhNode::new(
            BoundingBox::from_boxes(bounds),
            (0..bounds.len()).collect(),
        );
        root.build(max_depth, max_leaf_size, bounds);

        debug!(
            "Built spatial index over {} primitives at {:?} quality",
            bounds.len(),
            quality
        );

        Self {
            root: Some(root),
            num_primitives: bounds.len(),
        }
    }

    /// Recompute all node bounds from updated primitive bounds, keeping the
    /// tree structure unchanged.
    ///
    /// # Arguments
    ///
    /// * `bounds` - One bounding box per primitive, matching the build-time count.
    pub fn refit(&mut self, bounds: &[BoundingBox<T>]) {
        debug_assert!(
            bounds.len() == self.num_primitives,
            "Refit called with a different primitive count than the build"
        );
        if let Some(root) = &mut self.root {
            root.refit(bounds);
        }
    }

    /// Returns the number of primitives the index was built over.
    pub fn num_primitives(&self) -> usize {
        self.num_primitives
    }

    /// Returns the full bounds of the index if built.
    pub fn bounds(&self) -> Option<BoundingBox<T>> {
        self.root.as_ref().map(|r| r.bounds)
    }

    /// Run a radius-bounded point query against the index.
    ///
    /// The visitor is invoked once for every primitive whose node is within
    /// the current radius of the query point, nearest nodes first, and
    /// receives the primitive id along with the current radius. The visitor
    /// controls the radius: returning [`QueryAction::Shrink`] lowers it,
    /// which culls the remaining traversal. Shrinking to zero limits the
    /// remainder of the search to nodes containing the query point.
    ///
    /// # Arguments
    ///
    /// * `query_point` - The point to search around.
    /// * `initial_radius` - Starting search radius. Use infinity for an
    ///   unbounded closest point search, or zero for a containment-style query.
    /// * `visit` - Visitor invoked per candidate primitive id.
    ///
    /// # Returns
    ///
    /// * The query radius remaining after the traversal.
    pub fn point_query<F>(&self, query_point: &Vec3<T>, initial_radius: T, visit: &mut F) -> T
    where
        F: FnMut(usize, T) -> QueryAction<T>,
    {
        let mut radius = initial_radius;
        if let Some(root) = &self.root {
            root.point_query(query_point, &mut radius, visit);
        }
        radius
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BvhNode<T> {
    pub bounds: BoundingBox<T>,
    pub prim_indices: Vec<usize>,
    pub children: Option<BvhChildren<T>>,
}

impl<T: Float> BvhNode<T> {
    pub fn new(bounds: BoundingBox<T>, prim_indices: Vec<usize>) -> Self {
        Self {
            bounds,
            prim_indices,
            children: None,
        }
    }

    pub fn build(&mut self, max_depth: u32, max_leaf_size: usize, all_bounds: &[BoundingBox<T>]) {
        if self.prim_indices.len() <= max_leaf_size || max_depth == 0 {
            return;
        }

        let center = self.bounds.centroid();
        let mut child_indices: [Vec<usize>; 8] = Default::default();

        for &index in self.prim_indices.iter() {
            let prim_center = all_bounds[index].centroid();
            let mut octant = 0;
            if prim_center.x > center.x {
                octant |= 1;
            }
            if prim_center.y > center.y {
                octant |= 2;
            }
            if prim_center.z > center.z {
                octant |= 4;
            }
            child_indices[octant].push(index);
        }

        // Degenerate spread, splitting further makes no progress.
        if child_indices.iter().any(|c| c.len() == self.prim_indices.len()) {
            return;
        }

        let mut children: BvhChildren<T> = Default::default();
        for (octant, indices) in child_indices.into_iter().enumerate() {
            if indices.is_empty() {
                continue;
            }

            let child_bounds =
                BoundingBox::from_boxes(&indices.iter().map(|&i| all_bounds[i]).collect::<Vec<_>>());
            let mut child_node = BvhNode::new(child_bounds, indices);
            child_node.build(max_depth - 1, max_leaf_size, all_bounds);
            children[octant] = Some(child_node);
        }

        self.children = Some(children);
        self.prim_indices.clear();
    }

    pub fn refit(&mut self, all_bounds: &[BoundingBox<T>]) {
        if let Some(children) = &mut self.children {
            let mut bounds: Option<BoundingBox<T>> = None;
            for child in children.iter_mut().flatten() {
                child.refit(all_bounds);
                bounds = Some(match bounds {
                    Some(b) => b.union(&child.bounds),
                    None => child.bounds,
                });
            }
            if let Some(b) = bounds {
                self.bounds = b;
            }
        } else {
            self.bounds = BoundingBox::from_boxes(
                &self
                    .prim_indices
                    .iter()
                    .map(|&i| all_bounds[i])
                    .collect::<Vec<_>>(),
            );
        }
    }

    fn point_query<F>(&self, point: &Vec3<T>, radius: &mut T, visit: &mut F)
    where
        F: FnMut(usize, T) -> QueryAction<T>,
    {
        for &index in &self.prim_indices {
            match visit(index, *radius) {
                QueryAction::Keep => {}
                QueryAction::Shrink(r) => *radius = r,
            }
        }

        if let Some(children) = &self.children {
            let mut child_nodes: Vec<_> = children
                .iter()
                .filter_map(|c| {
                    c.as_ref()
                        .map(|child| (child, child.bounds.distance_to_point(point)))
                })
                .collect();

            child_nodes
                .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            for (child, distance) in child_nodes {
                if distance > *radius {
                    break;
                }
                child.point_query(point, radius, visit);
            }
        }
    }
}
