//! # grid_replan
//!
//! Shortest paths on an 8-connected grid with blocked cells. Two planners are provided:
//!
//! - [AstarPlanner](solver::astar::AstarPlanner), a one-shot
//!   [A*](https://en.wikipedia.org/wiki/A*_search_algorithm) search that avoids clearing its
//!   per-cell arrays between queries by comparing against a generation counter.
//! - [DStarPlanner](solver::dstar::DStarPlanner), the incremental
//!   [D*](https://www.ri.cmu.edu/pub_files/pub3/stentz_anthony__tony__1994_2/stentz_anthony__tony__1994_2.pdf)
//!   algorithm of Stentz. After an initial backwards search from the goal it repairs its
//!   solution when obstacles are added or removed, revisiting only the affected region.
//!
//! Both planners share the [IndexedHeap](node_heap::IndexedHeap), a binary heap over cell
//! indices whose keys live in the planner's own arrays.
//!
//! Costs are integers: a straight step costs [C] and a diagonal step [D], approximating 1 and
//! √2. Diagonal moves may not cut the corner of an obstacle.
//!
//! A* is guided by [Heuristic::Octile] unless configured otherwise. [Heuristic::Manhattan]
//! (`C` times the Manhattan distance) overestimates diagonal steps and may return longer paths.
pub mod error;
pub mod node_heap;
pub mod pathing_grid;
pub mod solver;

pub use error::{EmptyQueueError, EndpointFault, PlanError};
pub use pathing_grid::PathingGrid;
pub use solver::{astar::AstarPlanner, dstar::DStarPlanner, dstar::FieldDStarPlanner};
pub use solver::{GridPlanner, Heuristic};

use grid_util::Point;

/// Cost of a cardinal (straight) move.
pub const C: i32 = 10;
/// Cost of a diagonal move.
pub const D: i32 = 14;
/// Helper constant for the octile distance, see [Heuristic::Octile].
pub const E: i32 = 2 * C - D;

/// Diagonal moves past the corner of an obstacle are never allowed.
pub const ALLOW_CORNER_CUTTING: bool = false;

/// Inline capacity of neighbour lists, large enough for the full Moore neighbourhood.
pub const N_SMALLVEC_SIZE: usize = 8;

/// Cost of a move the grid forbids. Sums involving it saturate at this value.
pub const INFINITE_COST: i32 = i32::MAX / 2;

/// Predecessor of the first node of a path.
pub const NOWHERE: Point = Point { x: -1, y: -1 };

/// Adds two costs, saturating at [INFINITE_COST].
pub(crate) fn add_cost(a: i32, b: i32) -> i32 {
    a.saturating_add(b).min(INFINITE_COST)
}
