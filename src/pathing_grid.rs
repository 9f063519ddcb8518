use crate::{ALLOW_CORNER_CUTTING, C, D, INFINITE_COST, N_SMALLVEC_SIZE};
use core::fmt;
use grid_util::{BoolGrid, Point, ValueGrid};
use log::info;
use petgraph::unionfind::UnionFind;
use smallvec::SmallVec;

/// Offsets of the Moore neighbourhood. Straight moves have a zero component.
pub(crate) const MOORE_OFFSETS: [(i32, i32); 8] = [
    (-1, 1),
    (0, 1),
    (1, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// [PathingGrid] stores which cells are blocked ([true]) or free ([false]) in a [BoolGrid] and
/// maintains the connected components of the free cells in a [UnionFind] structure so that
/// queries between different components can be rejected without searching.
///
/// The planners only ever borrow the grid immutably while searching; edits go through
/// [set_obstacle](Self::set_obstacle) or [ValueGrid::set] between searches.
#[derive(Clone, Debug)]
pub struct PathingGrid {
    pub grid: BoolGrid,
    pub components: UnionFind<usize>,
    pub components_dirty: bool,
}

impl Default for PathingGrid {
    fn default() -> PathingGrid {
        PathingGrid {
            grid: BoolGrid::default(),
            components: UnionFind::new(0),
            components_dirty: false,
        }
    }
}

impl PathingGrid {
    /// Number of cells, which is also the size of every per-cell planner array.
    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Row-major index of an in-bounds point.
    pub fn cell_ix(&self, point: Point) -> usize {
        debug_assert!(self.point_in_bounds(point));
        point.y as usize * self.width() + point.x as usize
    }

    pub fn cell_point(&self, ix: usize) -> Point {
        let w = self.width();
        Point::new((ix % w) as i32, (ix / w) as i32)
    }

    /// Out-of-bounds positions count as obstacles.
    pub fn is_obstacle(&self, pos: Point) -> bool {
        !self.point_in_bounds(pos) || self.grid.get_point(pos)
    }

    pub fn can_move_to_simple(&self, pos: Point) -> bool {
        self.point_in_bounds(pos) && !self.grid.get_point(pos)
    }

    /// Whether the single step from `start` to the adjacent `pos` is legal.
    pub fn can_move_to(&self, pos: Point, start: Point) -> bool {
        if ALLOW_CORNER_CUTTING {
            self.can_move_to_simple(pos)
        } else {
            debug_assert!((start.x - pos.x).abs() <= 1 && (start.y - pos.y).abs() <= 1);
            self.can_move_to_simple(pos)
                && !self.is_obstacle(Point::new(start.x, pos.y))
                && !self.is_obstacle(Point::new(pos.x, start.y))
        }
    }

    /// In-bounds points of the Moore neighbourhood, whether blocked or not.
    pub fn neighborhood_points(&self, point: &Point) -> SmallVec<[Point; N_SMALLVEC_SIZE]> {
        MOORE_OFFSETS
            .iter()
            .map(|&(dx, dy)| Point::new(point.x + dx, point.y + dy))
            .filter(|p| self.point_in_bounds(*p))
            .collect()
    }

    /// Legal moves out of `pos` with their step cost.
    pub fn neighbors_of(&self, pos: &Point) -> SmallVec<[(Point, i32); N_SMALLVEC_SIZE]> {
        self.neighborhood_points(pos)
            .into_iter()
            .filter(|p| self.can_move_to(*p, *pos))
            .map(|p| (p, step_cost(pos, &p)))
            .collect()
    }

    /// Cost of moving between two adjacent cells, [INFINITE_COST] if either is blocked or the
    /// move would cut a corner. Moves are symmetric.
    pub fn arc_cost(&self, from: &Point, to: &Point) -> i32 {
        if self.can_move_to_simple(*from) && self.can_move_to(*to, *from) {
            step_cost(from, to)
        } else {
            INFINITE_COST
        }
    }

    /// Marks a cell as blocked or free. Returns whether anything changed.
    pub fn set_obstacle(&mut self, pos: Point, blocked: bool) -> bool {
        if !self.point_in_bounds(pos) || self.grid.get_point(pos) == blocked {
            return false;
        }
        self.set(pos.x, pos.y, blocked);
        true
    }

    /// Retrieves the component id a given [Point] belongs to.
    pub fn get_component(&self, point: &Point) -> usize {
        self.components.find(self.get_ix_point(point))
    }

    /// Checks if start and goal are on the same component.
    pub fn reachable(&self, start: &Point, goal: &Point) -> bool {
        !self.unreachable(start, goal)
    }

    /// Checks if start and goal are not on the same component.
    pub fn unreachable(&self, start: &Point, goal: &Point) -> bool {
        if self.point_in_bounds(*start) && self.point_in_bounds(*goal) {
            let start_ix = self.get_ix_point(start);
            let goal_ix = self.get_ix_point(goal);
            !self.components.equiv(start_ix, goal_ix)
        } else {
            true
        }
    }

    /// Regenerates the components if they are marked as dirty.
    pub fn update(&mut self) {
        if self.components_dirty {
            info!("Components are dirty: regenerating components");
            self.generate_components();
        }
    }

    /// Generates a new [UnionFind] structure and links up grid neighbours to the same components.
    pub fn generate_components(&mut self) {
        let w = self.grid.width;
        let h = self.grid.height;
        self.components = UnionFind::new(w * h);
        self.components_dirty = false;
        for x in 0..w as i32 {
            for y in 0..h as i32 {
                if self.grid.get(x, y) {
                    continue;
                }
                let point = Point::new(x, y);
                let parent_ix = self.grid.get_ix_point(&point);
                // Moves are symmetric, so linking towards larger x and along the column covers
                // every edge once.
                [
                    Point::new(x, y + 1),
                    Point::new(x + 1, y - 1),
                    Point::new(x + 1, y),
                    Point::new(x + 1, y + 1),
                ]
                .into_iter()
                .filter(|p| self.can_move_to(*p, point))
                .map(|p| self.grid.get_ix_point(&p))
                .collect::<SmallVec<[usize; 4]>>()
                .into_iter()
                .for_each(|ix| {
                    self.components.union(parent_ix, ix);
                });
            }
        }
    }
}

/// Step cost between two adjacent points.
pub fn step_cost(p1: &Point, p2: &Point) -> i32 {
    if p1.x != p2.x && p1.y != p2.y {
        D
    } else {
        C
    }
}

impl fmt::Display for PathingGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for y in (0..self.grid.height as i32).rev() {
            let row = (0..self.grid.width as i32)
                .map(|x| if self.grid.get(x, y) { '#' } else { '.' })
                .collect::<String>();
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

impl ValueGrid<bool> for PathingGrid {
    fn new(width: usize, height: usize, default_value: bool) -> Self {
        let mut base_grid = PathingGrid {
            grid: BoolGrid::new(width, height, default_value),
            components: UnionFind::new(width * height),
            components_dirty: false,
        };
        base_grid.generate_components();
        base_grid
    }
    fn get(&self, x: i32, y: i32) -> bool {
        self.grid.get(x, y)
    }
    /// Updates a position on the grid. Joins newly connected components and flags the components
    /// as dirty if components are (potentially) broken apart into multiple.
    fn set(&mut self, x: i32, y: i32, blocked: bool) {
        let p = Point::new(x, y);
        let was_blocked = self.grid.get(x, y);
        self.grid.set(x, y, blocked);
        if blocked {
            if !was_blocked {
                self.components_dirty = true;
            }
        } else {
            let p_ix = self.grid.get_ix_point(&p);
            for n in self.neighborhood_points(&p) {
                if self.can_move_to(n, p) {
                    self.components.union(p_ix, self.grid.get_ix_point(&n));
                }
            }
        }
    }
    fn width(&self) -> usize {
        self.grid.width()
    }
    fn height(&self) -> usize {
        self.grid.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests whether points are correctly mapped to different connected components
    #[test]
    fn test_component_generation() {
        // Corresponds to the following 3x2 grid:
        //  ___
        // | # |
        // | # |
        //  ___
        let mut path_graph = PathingGrid::new(3, 2, false);
        path_graph.grid.set(1, 0, true);
        path_graph.grid.set(1, 1, true);
        path_graph.generate_components();
        let p1 = Point::new(0, 0);
        let p2 = Point::new(1, 1);
        let p3 = Point::new(0, 1);
        let p4 = Point::new(2, 0);
        assert!(path_graph.unreachable(&p1, &p2));
        assert!(path_graph.reachable(&p1, &p3));
        assert!(path_graph.unreachable(&p1, &p4));
    }

    // Diagonal neighbours separated by two obstacles are not connected without corner cutting.
    #[test]
    fn test_diagonal_components() {
        //  __
        // |#.|
        // |.#|
        //  __
        let mut pathing_grid = PathingGrid::new(2, 2, false);
        pathing_grid.set(1, 0, true);
        pathing_grid.set(0, 1, true);
        pathing_grid.update();
        let start = Point::new(0, 0);
        let end = Point::new(1, 1);
        assert_eq!(pathing_grid.reachable(&start, &end), ALLOW_CORNER_CUTTING);
        pathing_grid.set(0, 1, false);
        assert!(!pathing_grid.components_dirty);
        assert!(pathing_grid.reachable(&start, &end));
    }

    #[test]
    fn test_neighbors_open_grid() {
        let pathing_grid = PathingGrid::new(3, 3, false);
        let neighbours = pathing_grid.neighbors_of(&Point::new(1, 1));
        assert_eq!(neighbours.len(), 8);
        assert_eq!(neighbours.iter().filter(|(_, c)| *c == C).count(), 4);
        assert_eq!(neighbours.iter().filter(|(_, c)| *c == D).count(), 4);
        // A corner cell only has three neighbours.
        assert_eq!(pathing_grid.neighbors_of(&Point::new(0, 0)).len(), 3);
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut pathing_grid = PathingGrid::new(3, 3, false);
        pathing_grid.set(1, 0, true);
        let origin = Point::new(0, 0);
        let neighbours = pathing_grid.neighbors_of(&origin);
        // (1, 0) is blocked and (1, 1) is flanked by it.
        assert_eq!(neighbours.as_slice(), &[(Point::new(0, 1), C)]);
        assert_eq!(
            pathing_grid.arc_cost(&origin, &Point::new(1, 1)),
            INFINITE_COST
        );
        assert_eq!(pathing_grid.arc_cost(&origin, &Point::new(0, 1)), C);
    }

    #[test]
    fn test_set_obstacle_reports_changes() {
        let mut pathing_grid = PathingGrid::new(4, 4, false);
        assert!(pathing_grid.set_obstacle(Point::new(2, 2), true));
        assert!(!pathing_grid.set_obstacle(Point::new(2, 2), true));
        assert!(!pathing_grid.set_obstacle(Point::new(9, 2), true));
        assert!(pathing_grid.is_obstacle(Point::new(2, 2)));
        assert!(pathing_grid.is_obstacle(Point::new(-1, 0)));
        assert!(pathing_grid.components_dirty);
    }

    /// A wall splits the grid, and the components match on either side.
    #[test]
    fn test_components_from_constructor() {
        let mut pathing_grid = PathingGrid::new(4, 3, false);
        assert!(pathing_grid.reachable(&Point::new(0, 0), &Point::new(3, 2)));
        for y in 0..3 {
            pathing_grid.set(2, y, true);
        }
        pathing_grid.update();
        assert!(!pathing_grid.components_dirty);
        assert!(pathing_grid.reachable(&Point::new(0, 0), &Point::new(1, 2)));
        assert!(pathing_grid.unreachable(&Point::new(0, 0), &Point::new(3, 0)));
    }

    #[test]
    fn test_cell_index_round_trip() {
        let pathing_grid = PathingGrid::new(5, 3, false);
        for ix in 0..pathing_grid.cell_count() {
            assert_eq!(pathing_grid.cell_ix(pathing_grid.cell_point(ix)), ix);
        }
    }

    #[test]
    fn test_display() {
        let mut pathing_grid = PathingGrid::new(3, 2, false);
        pathing_grid.set(0, 1, true);
        pathing_grid.set(1, 1, true);
        assert_eq!(format!("{pathing_grid}"), "##.\n...\n");
    }
}
