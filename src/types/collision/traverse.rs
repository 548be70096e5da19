use log::debug;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::types::geometry::Vec3;

use super::{CollisionDetectionParameters, TetMesh, NO_NEIGHBOR};

/// Stack and visited-list capacity of the static traversal variant.
pub const STATIC_TRAVERSE_CAPACITY: usize = 64;

/// Why a tetrahedral traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraverseStopReason {
    /// The goal tet was entered.
    ReachedGoal,
    /// Every remaining crossing lies beyond the distance bound.
    ExceededDistance,
    /// The walk ran out of tets to enter before reaching the goal.
    EmptyStack,
    /// The static stack or visited list capacity was exhausted.
    Overflow,
}

/// Statistics reported by a tetrahedral traversal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TraverseStatistics {
    /// Number of tets entered, the starting tet included.
    pub num_tets_traversed: usize,
    /// Why the walk stopped.
    pub stop_reason: TraverseStopReason,
}

/// The traversal variant backing a [`TetWalker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraverseVariant {
    /// Heap-growable stack and visited list. No capacity limit.
    Dynamic,
    /// Fixed-capacity stack and visited list, with a transparent fallback to
    /// the dynamic variant on overflow.
    Static,
    /// No stack at all. A single greedy path with revisits detected through
    /// monotonically increasing epoch stamps. Minimal allocation in steady
    /// state, at the price of giving up on dead ends.
    LoopLess,
}

/// Walks a ray through the face adjacency of a tetrahedral mesh.
///
/// Starting from a known tet and entry face, each step intersects the ray
/// against the remaining three faces of the current tet and crosses the face
/// with the smallest positive ray parameter. The walk succeeds as soon as the
/// goal tet is entered.
///
/// The walker owns all traversal scratch, so each worker in a parallel query
/// batch holds its own walker and no state is shared through the mesh.
#[derive(Debug, Clone)]
pub struct TetWalker<T> {
    variant: TraverseVariant,
    // Loop-less scratch: one stamp per tet, valid for the current epoch only.
    epochs: Vec<u32>,
    epoch: u32,
    // Dynamic scratch, kept allocated between traversals.
    frontier: Vec<FrontierEntry<T>>,
    visited: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FrontierEntry<T> {
    tet: usize,
    entry_face: i8,
    t: T,
}

impl<T: Float> TetWalker<T> {
    /// Create a new walker backed by the given variant.
    pub fn new(variant: TraverseVariant) -> Self {
        Self {
            variant,
            epochs: Vec::new(),
            epoch: 0,
            frontier: Vec::new(),
            visited: Vec::new(),
        }
    }

    /// Create a walker with the variant selected by the detector parameters:
    /// loop-less when `loop_less_traverse` is set, otherwise static when
    /// `use_static_traverse` is set, otherwise dynamic.
    pub fn from_parameters(params: &CollisionDetectionParameters<T>) -> Self {
        let variant = if params.loop_less_traverse {
            TraverseVariant::LoopLess
        } else if params.use_static_traverse {
            TraverseVariant::Static
        } else {
            TraverseVariant::Dynamic
        };
        Self::new(variant)
    }

    /// Returns the variant backing this walker.
    pub fn variant(&self) -> TraverseVariant {
        self.variant
    }

    /// Walk from a surface face towards the goal tet along a ray.
    ///
    /// # Arguments
    ///
    /// * `mesh` - The mesh whose tet adjacency is traversed.
    /// * `origin` - Ray origin, on or near the starting face.
    /// * `direction` - Unit ray direction.
    /// * `max_distance` - Upper bound on the ray parameter of any crossing
    ///   taken, or any negative value for an unbounded walk.
    /// * `start_tet` - The tet to start in.
    /// * `start_face` - The local face of `start_tet` the ray enters through.
    /// * `goal_tet` - The tet to reach.
    /// * `epsilon` - Tolerance for the ray-triangle intersections.
    ///
    /// # Returns
    ///
    /// * A tuple with the success flag and the traversal statistics. The walk
    ///   succeeds if and only if the goal tet is entered.
    #[allow(clippy::too_many_arguments)]
    pub fn traverse(
        &mut self,
        mesh: &TetMesh<T>,
        origin: &Vec3<T>,
        direction: &Vec3<T>,
        max_distance: T,
        start_tet: usize,
        start_face: usize,
        goal_tet: usize,
        epsilon: T,
    ) -> (bool, TraverseStatistics) {
        self.traverse_with_static_capacity(
            mesh,
            origin,
            direction,
            max_distance,
            start_tet,
            start_face,
            goal_tet,
            epsilon,
            STATIC_TRAVERSE_CAPACITY,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn traverse_with_static_capacity(
        &mut self,
        mesh: &TetMesh<T>,
        origin: &Vec3<T>,
        direction: &Vec3<T>,
        max_distance: T,
        start_tet: usize,
        start_face: usize,
        goal_tet: usize,
        epsilon: T,
        static_capacity: usize,
    ) -> (bool, TraverseStatistics) {
        match self.variant {
            TraverseVariant::LoopLess => self.traverse_loop_less(
                mesh,
                origin,
                direction,
                max_distance,
                start_tet,
                start_face,
                goal_tet,
                epsilon,
            ),
            TraverseVariant::Static => {
                let outcome = self.traverse_stack(
                    mesh,
                    origin,
                    direction,
                    max_distance,
                    start_tet,
                    start_face,
                    goal_tet,
                    epsilon,
                    Some(static_capacity),
                );
                if outcome.1.stop_reason == TraverseStopReason::Overflow {
                    debug!(
                        "Static traverse overflow at {} tets, retrying with the dynamic variant",
                        outcome.1.num_tets_traversed
                    );
                    self.traverse_stack(
                        mesh,
                        origin,
                        direction,
                        max_distance,
                        start_tet,
                        start_face,
                        goal_tet,
                        epsilon,
                        None,
                    )
                } else {
                    outcome
                }
            }
            TraverseVariant::Dynamic => self.traverse_stack(
                mesh,
                origin,
                direction,
                max_distance,
                start_tet,
                start_face,
                goal_tet,
                epsilon,
                None,
            ),
        }
    }

    /// Depth-first walk over the candidate crossings, backing the dynamic and
    /// static variants. A bounded capacity turns it into the static variant.
    #[allow(clippy::too_many_arguments)]
    fn traverse_stack(
        &mut self,
        mesh: &TetMesh<T>,
        origin: &Vec3<T>,
        direction: &Vec3<T>,
        max_distance: T,
        start_tet: usize,
        start_face: usize,
        goal_tet: usize,
        epsilon: T,
        capacity: Option<usize>,
    ) -> (bool, TraverseStatistics) {
        self.frontier.clear();
        self.visited.clear();

        self.frontier.push(FrontierEntry {
            tet: start_tet,
            entry_face: start_face as i8,
            t: T::zero(),
        });

        let bounded = max_distance >= T::zero();
        let mut exceeded = false;
        let mut num_tets_traversed = 0;

        while let Some(entry) = self.frontier.pop() {
            if self.visited.contains(&entry.tet) {
                continue;
            }
            if let Some(capacity) = capacity {
                if self.visited.len() >= capacity {
                    return (
                        false,
                        TraverseStatistics {
                            num_tets_traversed,
                            stop_reason: TraverseStopReason::Overflow,
                        },
                    );
                }
            }
            self.visited.push(entry.tet);
            num_tets_traversed += 1;

            if entry.tet == goal_tet {
                return (
                    true,
                    TraverseStatistics {
                        num_tets_traversed,
                        stop_reason: TraverseStopReason::ReachedGoal,
                    },
                );
            }

            // Up to three candidate crossings, pushed far-to-near so the
            // nearest is popped first.
            let mut exits = exit_candidates(mesh, &entry, origin, direction, epsilon);
            exits.sort_by(|a, b| b.t.partial_cmp(&a.t).unwrap_or(std::cmp::Ordering::Equal));

            for exit in exits {
                if bounded && exit.t > max_distance {
                    exceeded = true;
                    continue;
                }
                if self.visited.contains(&exit.tet) {
                    continue;
                }
                if let Some(capacity) = capacity {
                    if self.frontier.len() >= capacity {
                        return (
                            false,
                            TraverseStatistics {
                                num_tets_traversed,
                                stop_reason: TraverseStopReason::Overflow,
                            },
                        );
                    }
                }
                self.frontier.push(exit);
            }
        }

        (
            false,
            TraverseStatistics {
                num_tets_traversed,
                stop_reason: if exceeded {
                    TraverseStopReason::ExceededDistance
                } else {
                    TraverseStopReason::EmptyStack
                },
            },
        )
    }

    /// Greedy single-path walk with epoch-stamped revisit detection, backing
    /// the loop-less variant.
    #[allow(clippy::too_many_arguments)]
    fn traverse_loop_less(
        &mut self,
        mesh: &TetMesh<T>,
        origin: &Vec3<T>,
        direction: &Vec3<T>,
        max_distance: T,
        start_tet: usize,
        start_face: usize,
        goal_tet: usize,
        epsilon: T,
    ) -> (bool, TraverseStatistics) {
        if self.epochs.len() < mesh.num_tets() {
            self.epochs.resize(mesh.num_tets(), 0);
        }
        self.epoch += 1;

        let bounded = max_distance >= T::zero();
        let mut num_tets_traversed = 0;

        let mut current = FrontierEntry {
            tet: start_tet,
            entry_face: start_face as i8,
            t: T::zero(),
        };

        loop {
            if self.epochs[current.tet] == self.epoch {
                // Walked into a tet already on the path, the greedy walk loops.
                return (
                    false,
                    TraverseStatistics {
                        num_tets_traversed,
                        stop_reason: TraverseStopReason::EmptyStack,
                    },
                );
            }
            self.epochs[current.tet] = self.epoch;
            num_tets_traversed += 1;

            if current.tet == goal_tet {
                return (
                    true,
                    TraverseStatistics {
                        num_tets_traversed,
                        stop_reason: TraverseStopReason::ReachedGoal,
                    },
                );
            }

            let exits = exit_candidates(mesh, &current, origin, direction, epsilon);
            let Some(nearest) = exits.into_iter().min_by(|a, b| {
                a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal)
            }) else {
                return (
                    false,
                    TraverseStatistics {
                        num_tets_traversed,
                        stop_reason: TraverseStopReason::EmptyStack,
                    },
                );
            };

            if bounded && nearest.t > max_distance {
                return (
                    false,
                    TraverseStatistics {
                        num_tets_traversed,
                        stop_reason: TraverseStopReason::ExceededDistance,
                    },
                );
            }

            current = nearest;
        }
    }
}

/// Collect the crossings out of a tet: the non-entry faces the ray intersects,
/// as frontier entries into the neighboring tets. Crossings through surface
/// faces have no neighbor and are dropped.
fn exit_candidates<T: Float>(
    mesh: &TetMesh<T>,
    entry: &FrontierEntry<T>,
    origin: &Vec3<T>,
    direction: &Vec3<T>,
    epsilon: T,
) -> Vec<FrontierEntry<T>> {
    let tetrahedron = mesh.tetrahedron(entry.tet);
    let mut exits = Vec::with_capacity(3);

    for local_face in 0..4 {
        if local_face as i8 == entry.entry_face {
            continue;
        }

        let Some(t) = tetrahedron
            .face(local_face)
            .ray_intersect(origin, direction, epsilon)
        else {
            continue;
        };

        let neighbor = mesh.tet_neighbor(entry.tet, local_face);
        if neighbor == NO_NEIGHBOR {
            continue;
        }

        exits.push(FrontierEntry {
            tet: neighbor as usize,
            entry_face: mesh.tet_neighbor_entry_face(entry.tet, local_face),
            t,
        });
    }

    exits
}
