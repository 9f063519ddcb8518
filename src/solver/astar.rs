use grid_util::Point;
use log::{debug, info};

use crate::{
    error::PlanError,
    node_heap::{HeapKeyed, IndexedHeap, NOT_IN_HEAP},
    pathing_grid::PathingGrid,
    solver::{validate_endpoint, GridPlanner, Heuristic},
};

/// Predecessor of the start cell.
const NO_PARENT: usize = usize::MAX;

/// Per-cell search data, one entry per grid cell. A cell takes part in the current search only
/// if its `which_list` equals the open or closed generation of that search.
#[derive(Clone, Debug, Default)]
struct SearchNodes {
    which_list: Vec<u32>,
    from: Vec<usize>,
    g: Vec<i32>,
    h: Vec<i32>,
    heap_ix: Vec<usize>,
}

impl SearchNodes {
    fn with_len(n: usize) -> SearchNodes {
        SearchNodes {
            which_list: vec![0; n],
            from: vec![NO_PARENT; n],
            g: vec![0; n],
            h: vec![0; n],
            heap_ix: vec![NOT_IN_HEAP; n],
        }
    }

    fn len(&self) -> usize {
        self.which_list.len()
    }
}

impl HeapKeyed for SearchNodes {
    type Key = i32;

    /// F = G + H.
    fn key(&self, item: usize) -> i32 {
        self.g[item] + self.h[item]
    }
    fn heap_ix(&self, item: usize) -> usize {
        self.heap_ix[item]
    }
    fn set_heap_ix(&mut self, item: usize, slot: usize) {
        self.heap_ix[item] = slot;
    }
}

/// One-shot A* search. The planner keeps its per-cell arrays between queries and tells the
/// cells of different queries apart by a generation counter that advances by two per query,
/// so nothing has to be cleared.
#[derive(Clone, Debug)]
pub struct AstarPlanner {
    pub heuristic: Heuristic,
    pub heuristic_factor: f32,
    /// Maximum number of expanded nodes per query, unlimited if [None].
    pub expansion_limit: Option<usize>,
    nodes: SearchNodes,
    open: IndexedHeap,
    generation: u32,
    expansions: usize,
}

impl Default for AstarPlanner {
    fn default() -> Self {
        AstarPlanner::new()
    }
}

impl AstarPlanner {
    pub fn new() -> AstarPlanner {
        AstarPlanner {
            heuristic: Heuristic::default(),
            heuristic_factor: 1.0,
            expansion_limit: None,
            nodes: SearchNodes::default(),
            open: IndexedHeap::new(),
            generation: 0,
            expansions: 0,
        }
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> AstarPlanner {
        self.heuristic = heuristic;
        self
    }

    pub fn with_expansion_limit(mut self, limit: usize) -> AstarPlanner {
        self.expansion_limit = Some(limit);
        self
    }

    /// Nodes expanded by the last query.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    /// Just the heuristic times a heuristic factor.
    fn estimate(&self, p1: &Point, p2: &Point) -> i32 {
        (self.heuristic.estimate(p1, p2) as f32 * self.heuristic_factor) as i32
    }

    /// Starts a new generation, (re)allocating the arrays if the grid size changed.
    fn next_generation(&mut self, grid: &PathingGrid) {
        let n = grid.cell_count();
        if self.nodes.len() != n {
            self.nodes = SearchNodes::with_len(n);
            self.open = IndexedHeap::with_capacity(n);
            self.generation = 0;
        } else if self.generation >= u32::MAX - 2 {
            self.nodes.which_list.fill(0);
            self.generation = 0;
        }
        self.open.clear();
        self.generation += 2;
    }

    fn reconstruct(&self, grid: &PathingGrid, goal_ix: usize) -> Vec<Point> {
        let mut path = std::iter::successors(Some(goal_ix), |&ix| {
            let parent = self.nodes.from[ix];
            (parent != NO_PARENT).then_some(parent)
        })
        .map(|ix| grid.cell_point(ix))
        .collect::<Vec<Point>>();
        path.reverse();
        path
    }
}

impl GridPlanner for AstarPlanner {
    fn find_path(
        &mut self,
        grid: &PathingGrid,
        start: Point,
        goal: Point,
    ) -> Result<Vec<Point>, PlanError> {
        validate_endpoint(grid, start)?;
        validate_endpoint(grid, goal)?;
        if !grid.components_dirty && grid.unreachable(&start, &goal) {
            info!("{} is not reachable from {}", goal, start);
            return Ok(Vec::new());
        }

        self.next_generation(grid);
        self.expansions = 0;
        let open = self.generation;
        let closed = open + 1;

        let start_ix = grid.cell_ix(start);
        let goal_ix = grid.cell_ix(goal);
        self.nodes.which_list[start_ix] = open;
        self.nodes.from[start_ix] = NO_PARENT;
        self.nodes.g[start_ix] = 0;
        self.nodes.h[start_ix] = self.estimate(&start, &goal);
        self.open.insert(&mut self.nodes, start_ix);

        while let Ok(cur_ix) = self.open.pop(&mut self.nodes) {
            self.nodes.which_list[cur_ix] = closed;
            if cur_ix == goal_ix {
                return Ok(self.reconstruct(grid, cur_ix));
            }
            if let Some(limit) = self.expansion_limit {
                if self.expansions >= limit {
                    debug!("A* gave up after {} expansions", self.expansions);
                    return Err(PlanError::BudgetExhausted { limit });
                }
            }
            self.expansions += 1;

            let cur = grid.cell_point(cur_ix);
            let cur_g = self.nodes.g[cur_ix];
            for (nbr, cost) in grid.neighbors_of(&cur) {
                let n_ix = grid.cell_ix(nbr);
                let g = cur_g + cost;
                let which = self.nodes.which_list[n_ix];
                // A closed node is only reopened if this is a strictly better way to reach it.
                if which == closed && g >= self.nodes.g[n_ix] {
                    continue;
                }
                if which != open {
                    self.nodes.from[n_ix] = cur_ix;
                    self.nodes.g[n_ix] = g;
                    self.nodes.h[n_ix] = self.estimate(&nbr, &goal);
                    self.nodes.which_list[n_ix] = open;
                    self.open.insert(&mut self.nodes, n_ix);
                } else if g < self.nodes.g[n_ix] {
                    self.nodes.from[n_ix] = cur_ix;
                    self.nodes.g[n_ix] = g;
                    let slot = self.nodes.heap_ix[n_ix];
                    self.open.update(&mut self.nodes, slot);
                }
            }
            debug_assert!(self.open.check_invariants(&self.nodes));
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use grid_util::ValueGrid;

    use super::*;
    use crate::{solver::is_valid_path, C, D};

    /// Asserts that the case in which start and goal are equal is handled correctly.
    #[test]
    fn equal_start_goal() {
        let pathing_grid: PathingGrid = PathingGrid::new(1, 1, false);
        let mut planner = AstarPlanner::new();
        let start = Point::new(0, 0);
        let path = planner.find_path(&pathing_grid, start, start).unwrap();
        assert_eq!(path, vec![start]);
    }

    /// The diagonal of an empty 5x5 grid is four diagonal steps.
    #[test]
    fn open_grid_diagonal() {
        let pathing_grid: PathingGrid = PathingGrid::new(5, 5, false);
        let mut planner = AstarPlanner::new();
        let start = Point::new(0, 0);
        let end = Point::new(4, 4);
        let path = planner.find_path(&pathing_grid, start, end).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert_eq!(planner.get_path_cost(&path), 4 * D);
        assert_eq!(planner.get_path_cost(&path), 56);
    }

    /// Asserts that the optimal 4 step solution is found around a blocked centre.
    #[test]
    fn solve_simple_problem() {
        // |  E|
        // | # |
        // |S  |
        let mut pathing_grid: PathingGrid = PathingGrid::new(3, 3, false);
        pathing_grid.set(1, 1, true);
        pathing_grid.generate_components();
        let mut planner = AstarPlanner::new();
        let start = Point::new(0, 0);
        let end = Point::new(2, 2);
        let path = planner.find_path(&pathing_grid, start, end).unwrap();
        // Every diagonal step is flanked by the centre, so only straight moves remain.
        assert_eq!(path.len(), 5);
        assert_eq!(planner.get_path_cost(&path), 4 * C);
        assert!(is_valid_path(&pathing_grid, &path));
    }

    /// A start whose whole neighbourhood is blocked has no path.
    #[test]
    fn enclosed_start() {
        let mut pathing_grid: PathingGrid = PathingGrid::new(5, 5, false);
        let start = Point::new(2, 2);
        for p in pathing_grid.neighborhood_points(&start) {
            pathing_grid.set(p.x, p.y, true);
        }
        let mut planner = AstarPlanner::new();
        let goal = Point::new(4, 4);
        // Components are dirty here, so the search itself has to run dry.
        assert!(pathing_grid.components_dirty);
        assert!(planner.find_path(&pathing_grid, start, goal).unwrap().is_empty());
        assert_eq!(planner.expansions(), 1);
        pathing_grid.update();
        assert!(planner.find_path(&pathing_grid, start, goal).unwrap().is_empty());
    }

    #[test]
    fn invalid_endpoints() {
        let mut pathing_grid: PathingGrid = PathingGrid::new(3, 3, false);
        pathing_grid.set(2, 2, true);
        let mut planner = AstarPlanner::new();
        let start = Point::new(0, 0);
        assert!(matches!(
            planner.find_path(&pathing_grid, start, Point::new(2, 2)),
            Err(PlanError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            planner.find_path(&pathing_grid, Point::new(-1, 0), start),
            Err(PlanError::InvalidEndpoint { .. })
        ));
    }

    /// Consecutive queries reuse the arrays without interfering with each other.
    #[test]
    fn repeated_queries() {
        let mut pathing_grid: PathingGrid = PathingGrid::new(8, 8, false);
        for y in 0..7 {
            pathing_grid.set(4, y, true);
        }
        pathing_grid.generate_components();
        let mut planner = AstarPlanner::new();
        let start = Point::new(0, 0);
        let end = Point::new(7, 0);
        let first = planner.find_path(&pathing_grid, start, end).unwrap();
        let other = planner
            .find_path(&pathing_grid, Point::new(1, 1), Point::new(2, 2))
            .unwrap();
        let second = planner.find_path(&pathing_grid, start, end).unwrap();
        assert_eq!(other.len(), 2);
        assert_eq!(first, second);
        assert!(is_valid_path(&pathing_grid, &first));
        assert!(first.contains(&Point::new(4, 7)));
    }

    #[test]
    fn generation_wraps_around() {
        let pathing_grid: PathingGrid = PathingGrid::new(4, 4, false);
        let mut planner = AstarPlanner::new();
        let start = Point::new(0, 0);
        let end = Point::new(3, 1);
        let expected = planner.find_path(&pathing_grid, start, end).unwrap();
        planner.generation = u32::MAX - 3;
        for _ in 0..3 {
            let path = planner.find_path(&pathing_grid, start, end).unwrap();
            assert_eq!(planner.get_path_cost(&path), planner.get_path_cost(&expected));
        }
    }

    #[test]
    fn expansion_limit() {
        let pathing_grid: PathingGrid = PathingGrid::new(20, 20, false);
        let mut planner = AstarPlanner::new()
            .with_heuristic(Heuristic::Zero)
            .with_expansion_limit(10);
        let result = planner.find_path(&pathing_grid, Point::new(0, 0), Point::new(19, 19));
        assert_eq!(result, Err(PlanError::BudgetExhausted { limit: 10 }));
    }

    /// The Manhattan estimate finds the diagonal too, just without an optimality guarantee in
    /// general.
    #[test]
    fn manhattan_heuristic() {
        let pathing_grid: PathingGrid = PathingGrid::new(5, 5, false);
        let mut planner = AstarPlanner::new().with_heuristic(Heuristic::Manhattan);
        let path = planner
            .find_path(&pathing_grid, Point::new(0, 0), Point::new(4, 4))
            .unwrap();
        assert_eq!(planner.get_path_cost(&path), 56);
    }
}
