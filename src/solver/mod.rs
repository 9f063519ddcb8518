use crate::{
    error::{EndpointFault, PlanError},
    pathing_grid::{step_cost, PathingGrid},
    C, D, E,
};
use grid_util::{Point, ValueGrid};
use itertools::Itertools;

pub mod astar;
pub mod dstar;

/// Converts the integer cost to an approximate floating point equivalent where cardinal directions have cost 1.0.
pub fn convert_cost_to_unit_cost_float(cost: i32) -> f64 {
    (cost as f64) / (C as f64)
}

/// Distance estimates used to order the A* frontier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Heuristic {
    /// Exact cost on an obstacle-free 8-connected grid. Admissible and consistent.
    #[default]
    Octile,
    /// `C` times the Manhattan distance. Overestimates diagonal moves, so paths are not
    /// guaranteed to be optimal, but fewer nodes are expanded.
    Manhattan,
    /// No estimate; A* degenerates to Dijkstra's algorithm.
    Zero,
}

impl Heuristic {
    pub fn estimate(&self, p1: &Point, p2: &Point) -> i32 {
        let delta_x = (p1.x - p2.x).abs();
        let delta_y = (p1.y - p2.y).abs();
        match self {
            // Formula from https://github.com/riscy/a_star_on_grids
            // to efficiently compute the cost of a path taking the maximal amount
            // of diagonal steps before going straight
            Heuristic::Octile => (E * (delta_x - delta_y).abs() + D * (delta_x + delta_y)) / 2,
            Heuristic::Manhattan => C * (delta_x + delta_y),
            Heuristic::Zero => 0,
        }
    }
}

/// Rejects endpoints that are outside the grid or blocked.
pub fn validate_endpoint(grid: &PathingGrid, point: Point) -> Result<(), PlanError> {
    let fault = if !grid.point_in_bounds(point) {
        EndpointFault::OutOfBounds
    } else if grid.is_obstacle(point) {
        EndpointFault::Obstacle
    } else {
        return Ok(());
    };
    Err(PlanError::InvalidEndpoint { point, fault })
}

pub trait GridPlanner {
    /// Computes a path from `start` to `goal`, both included. An empty path means the goal is
    /// unreachable.
    fn find_path(
        &mut self,
        grid: &PathingGrid,
        start: Point,
        goal: Point,
    ) -> Result<Vec<Point>, PlanError>;

    /// Sum of the step costs along a path.
    fn get_path_cost(&self, path: &[Point]) -> i32 {
        path.iter()
            .tuple_windows()
            .map(|(p1, p2)| step_cost(p1, p2))
            .sum()
    }

    fn get_path_cost_float(&self, path: &[Point]) -> f64 {
        convert_cost_to_unit_cost_float(self.get_path_cost(path))
    }
}

/// Checks that consecutive points of a path are legal moves on the grid.
pub fn is_valid_path(grid: &PathingGrid, path: &[Point]) -> bool {
    path.iter().all(|p| grid.can_move_to_simple(*p))
        && path
            .iter()
            .tuple_windows()
            .all(|(p1, p2)| {
                let (dx, dy) = ((p1.x - p2.x).abs(), (p1.y - p2.y).abs());
                dx <= 1 && dy <= 1 && dx + dy > 0 && grid.can_move_to(*p2, *p1)
            })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octile_matches_obstacle_free_cost() {
        let h = Heuristic::Octile;
        let origin = Point::new(0, 0);
        assert_eq!(h.estimate(&origin, &Point::new(4, 4)), 4 * D);
        assert_eq!(h.estimate(&origin, &Point::new(3, 1)), D + 2 * C);
        assert_eq!(h.estimate(&origin, &Point::new(0, 5)), 5 * C);
        assert_eq!(Heuristic::Manhattan.estimate(&origin, &Point::new(3, 1)), 40);
        assert_eq!(Heuristic::Zero.estimate(&origin, &Point::new(3, 1)), 0);
    }

    #[test]
    fn rejects_bad_endpoints() {
        let mut grid = PathingGrid::new(3, 3, false);
        grid.set(1, 1, true);
        assert_eq!(validate_endpoint(&grid, Point::new(0, 0)), Ok(()));
        assert_eq!(
            validate_endpoint(&grid, Point::new(3, 0)),
            Err(PlanError::InvalidEndpoint {
                point: Point::new(3, 0),
                fault: EndpointFault::OutOfBounds
            })
        );
        assert_eq!(
            validate_endpoint(&grid, Point::new(1, 1)),
            Err(PlanError::InvalidEndpoint {
                point: Point::new(1, 1),
                fault: EndpointFault::Obstacle
            })
        );
    }

    #[test]
    fn path_validity() {
        let mut grid = PathingGrid::new(3, 3, false);
        grid.set(1, 0, true);
        let good = [Point::new(0, 0), Point::new(0, 1), Point::new(1, 1)];
        let cut = [Point::new(0, 0), Point::new(1, 1)];
        assert!(is_valid_path(&grid, &good));
        assert!(!is_valid_path(&grid, &cut));
    }
}
