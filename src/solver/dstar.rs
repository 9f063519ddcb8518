//! The D* algorithm of Stentz (1994), "Optimal and Efficient Path Planning for Partially-Known
//! Environments".
//!
//! D* searches backwards from the goal. Every visited cell stores `h`, the cost of its path to
//! the goal along back-pointers, and the back-pointer itself. Once the start has been reached the
//! path is read off by following back-pointers from the start. When obstacles appear or vanish
//! the cells around them are put back on the OPEN list and the same propagation step repairs
//! only the part of the solution that depends on them.
//!
//! Cells on the OPEN list are ordered by `k = min(p, h)`, where `p` is the value `h` had when the
//! cell was last put on the list. A cell with `p < h` is a *raise* state: its cost went up and
//! it first tries to find a cheaper neighbour before passing the increase on. A cell with
//! `p >= h` is a *lower* state and passes its (possibly reduced) cost on to its neighbours.
use fxhash::FxBuildHasher;
use grid_util::{Point, ValueGrid};
use indexmap::IndexSet;
use log::{debug, info, warn};

use crate::{
    add_cost,
    error::PlanError,
    node_heap::{HeapKeyed, IndexedHeap, NOT_IN_HEAP},
    pathing_grid::PathingGrid,
    solver::{validate_endpoint, GridPlanner},
    INFINITE_COST, NOWHERE,
};

type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Back-pointer of the goal and of cells that were never reached.
pub const NO_NODE: usize = usize::MAX;

/// Which list a cell is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Never visited.
    #[default]
    New,
    /// On the OPEN list, waiting to propagate its cost.
    Open,
    /// Cost has been propagated.
    Closed,
}

/// Storage of the per-cell D* state. The planner only talks to cells through this trait, so the
/// same state machine runs on [CellArrays] and on [NodeArena].
pub trait NodeStorage: HeapKeyed<Key = i32> {
    fn with_len(n: usize) -> Self;
    fn len(&self) -> usize;
    /// Puts every cell back into the [Tag::New] state.
    fn reset(&mut self);

    fn tag(&self, ix: usize) -> Tag;
    fn set_tag(&mut self, ix: usize, tag: Tag);
    fn from(&self, ix: usize) -> usize;
    fn set_from(&mut self, ix: usize, from: usize);
    fn p(&self, ix: usize) -> i32;
    fn set_p(&mut self, ix: usize, p: i32);
    fn h(&self, ix: usize) -> i32;
    fn set_h(&mut self, ix: usize, h: i32);
    fn k(&self, ix: usize) -> i32;
    fn set_k(&mut self, ix: usize, k: i32);
}

/// One vector per field, indexed by cell.
#[derive(Clone, Debug, Default)]
pub struct CellArrays {
    tag: Vec<Tag>,
    from: Vec<usize>,
    p: Vec<i32>,
    h: Vec<i32>,
    k: Vec<i32>,
    heap_ix: Vec<usize>,
}

impl HeapKeyed for CellArrays {
    type Key = i32;
    fn key(&self, item: usize) -> i32 {
        self.k[item]
    }
    fn heap_ix(&self, item: usize) -> usize {
        self.heap_ix[item]
    }
    fn set_heap_ix(&mut self, item: usize, slot: usize) {
        self.heap_ix[item] = slot;
    }
}

impl NodeStorage for CellArrays {
    fn with_len(n: usize) -> Self {
        CellArrays {
            tag: vec![Tag::New; n],
            from: vec![NO_NODE; n],
            p: vec![0; n],
            h: vec![0; n],
            k: vec![0; n],
            heap_ix: vec![NOT_IN_HEAP; n],
        }
    }
    fn len(&self) -> usize {
        self.tag.len()
    }
    fn reset(&mut self) {
        self.tag.fill(Tag::New);
        self.from.fill(NO_NODE);
        self.p.fill(0);
        self.h.fill(0);
        self.k.fill(0);
        self.heap_ix.fill(NOT_IN_HEAP);
    }
    fn tag(&self, ix: usize) -> Tag {
        self.tag[ix]
    }
    fn set_tag(&mut self, ix: usize, tag: Tag) {
        self.tag[ix] = tag;
    }
    fn from(&self, ix: usize) -> usize {
        self.from[ix]
    }
    fn set_from(&mut self, ix: usize, from: usize) {
        self.from[ix] = from;
    }
    fn p(&self, ix: usize) -> i32 {
        self.p[ix]
    }
    fn set_p(&mut self, ix: usize, p: i32) {
        self.p[ix] = p;
    }
    fn h(&self, ix: usize) -> i32 {
        self.h[ix]
    }
    fn set_h(&mut self, ix: usize, h: i32) {
        self.h[ix] = h;
    }
    fn k(&self, ix: usize) -> i32 {
        self.k[ix]
    }
    fn set_k(&mut self, ix: usize, k: i32) {
        self.k[ix] = k;
    }
}

/// D* state of a single cell, as stored by [NodeArena].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    /// Back-pointer, the next cell on the way to the goal.
    pub from: usize,
    pub tag: Tag,
    /// `h` at the time the node was last put on the OPEN list.
    pub p: i32,
    /// Path cost estimate.
    pub h: i32,
    /// Key, `min(p, h)`.
    pub k: i32,
    pub heap_ix: usize,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            from: NO_NODE,
            tag: Tag::New,
            p: 0,
            h: 0,
            k: 0,
            heap_ix: NOT_IN_HEAP,
        }
    }
}

/// One [Node] per cell, the layout of the Field D* planner.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn node(&self, ix: usize) -> &Node {
        &self.nodes[ix]
    }
}

impl HeapKeyed for NodeArena {
    type Key = i32;
    fn key(&self, item: usize) -> i32 {
        self.nodes[item].k
    }
    fn heap_ix(&self, item: usize) -> usize {
        self.nodes[item].heap_ix
    }
    fn set_heap_ix(&mut self, item: usize, slot: usize) {
        self.nodes[item].heap_ix = slot;
    }
}

impl NodeStorage for NodeArena {
    fn with_len(n: usize) -> Self {
        NodeArena {
            nodes: vec![Node::default(); n],
        }
    }
    fn len(&self) -> usize {
        self.nodes.len()
    }
    fn reset(&mut self) {
        self.nodes.fill(Node::default());
    }
    fn tag(&self, ix: usize) -> Tag {
        self.nodes[ix].tag
    }
    fn set_tag(&mut self, ix: usize, tag: Tag) {
        self.nodes[ix].tag = tag;
    }
    fn from(&self, ix: usize) -> usize {
        self.nodes[ix].from
    }
    fn set_from(&mut self, ix: usize, from: usize) {
        self.nodes[ix].from = from;
    }
    fn p(&self, ix: usize) -> i32 {
        self.nodes[ix].p
    }
    fn set_p(&mut self, ix: usize, p: i32) {
        self.nodes[ix].p = p;
    }
    fn h(&self, ix: usize) -> i32 {
        self.nodes[ix].h
    }
    fn set_h(&mut self, ix: usize, h: i32) {
        self.nodes[ix].h = h;
    }
    fn k(&self, ix: usize) -> i32 {
        self.nodes[ix].k
    }
    fn set_k(&mut self, ix: usize, k: i32) {
        self.nodes[ix].k = k;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Endpoints {
    start: usize,
    goal: usize,
}

/// Incremental D* planner.
///
/// ```
/// use grid_replan::{DStarPlanner, PathingGrid};
/// use grid_util::{Point, ValueGrid};
///
/// let mut grid = PathingGrid::new(6, 6, false);
/// let mut planner: DStarPlanner = DStarPlanner::new(&grid);
/// let (start, goal) = (Point::new(0, 0), Point::new(5, 5));
/// assert!(planner.initialize(&grid, start, goal).unwrap());
///
/// // Block the diagonal and let the planner repair its solution.
/// planner.update_cell(&mut grid, Point::new(3, 3), true);
/// assert!(planner.replan(&grid).unwrap());
/// assert!(!planner.path(&grid).contains(&Point::new(3, 3)));
/// ```
#[derive(Clone, Debug)]
pub struct DStarPlanner<S: NodeStorage = CellArrays> {
    /// Maximum number of [process_state](Self::process_state) calls per planning request,
    /// unlimited if [None]. A request that hits the limit can be resumed with
    /// [replan](Self::replan).
    pub expansion_limit: Option<usize>,
    nodes: S,
    open: IndexedHeap,
    endpoints: Option<Endpoints>,
    /// Cells edited since the last replan, in edit order.
    pending: FxIndexSet<usize>,
    expansions: usize,
}

/// D* on a node-per-cell layout.
pub type FieldDStarPlanner = DStarPlanner<NodeArena>;

impl<S: NodeStorage> DStarPlanner<S> {
    pub fn new(grid: &PathingGrid) -> Self {
        let n = grid.cell_count();
        DStarPlanner {
            expansion_limit: None,
            nodes: S::with_len(n),
            open: IndexedHeap::with_capacity(n),
            endpoints: None,
            pending: FxIndexSet::default(),
            expansions: 0,
        }
    }

    pub fn with_expansion_limit(mut self, limit: usize) -> Self {
        self.expansion_limit = Some(limit);
        self
    }

    /// Forgets the endpoints and all search state.
    pub fn clear(&mut self) {
        self.nodes.reset();
        self.open.clear();
        self.pending.clear();
        self.endpoints = None;
    }

    /// Computes path costs from `goal` until the start is reached. Returns whether a path from
    /// `start` to `goal` exists; read it with [path](Self::path).
    pub fn initialize(
        &mut self,
        grid: &PathingGrid,
        start: Point,
        goal: Point,
    ) -> Result<bool, PlanError> {
        validate_endpoint(grid, start)?;
        validate_endpoint(grid, goal)?;
        if self.nodes.len() != grid.cell_count() {
            self.nodes = S::with_len(grid.cell_count());
            self.open = IndexedHeap::with_capacity(grid.cell_count());
        }
        self.clear();
        let endpoints = Endpoints {
            start: grid.cell_ix(start),
            goal: grid.cell_ix(goal),
        };
        self.endpoints = Some(endpoints);
        self.nodes.set_from(endpoints.goal, NO_NODE);
        self.insert(endpoints.goal, 0);

        let found = self.run(grid)?;
        info!(
            "D* from {} to {}: {} after {} expansions",
            start,
            goal,
            if found { "path found" } else { "no path" },
            self.expansions
        );
        Ok(found)
    }

    /// Takes the cell with the smallest key off the OPEN list and propagates its cost. Returns
    /// the smallest key left on the OPEN list afterwards, or [None] once the list is empty.
    pub fn process_state(&mut self, grid: &PathingGrid) -> Option<i32> {
        let cur_ix = self.open.pop(&mut self.nodes).ok()?;
        let k_old = self.nodes.k(cur_ix);
        self.nodes.set_tag(cur_ix, Tag::Closed);
        // Reaching the start ends the search. A start whose cost went up still has to look for
        // a cheaper neighbour, so it is expanded like any other cell.
        if self.is_start(cur_ix) && self.nodes.p(cur_ix) >= self.nodes.h(cur_ix) {
            return Some(k_old);
        }

        let cur = grid.cell_point(cur_ix);
        let neighbours = grid.neighborhood_points(&cur);

        // Reduce h(cur) through a neighbour whose cost is already final.
        for nbr in &neighbours {
            let n_ix = grid.cell_ix(*nbr);
            let path_cost = add_cost(self.nodes.h(n_ix), grid.arc_cost(nbr, &cur));
            if self.nodes.tag(n_ix) == Tag::Closed
                && self.nodes.h(n_ix) <= k_old
                && self.nodes.h(cur_ix) > path_cost
            {
                self.nodes.set_from(cur_ix, n_ix);
                self.nodes.set_h(cur_ix, path_cost);
            }
        }

        let cur_h = self.nodes.h(cur_ix);
        let stable = self.nodes.p(cur_ix) >= cur_h;
        for nbr in &neighbours {
            let n_ix = grid.cell_ix(*nbr);
            let path_cost = add_cost(cur_h, grid.arc_cost(&cur, nbr));
            let n_tag = self.nodes.tag(n_ix);
            let n_from = self.nodes.from(n_ix);
            let n_h = self.nodes.h(n_ix);

            if n_tag == Tag::New {
                if path_cost < INFINITE_COST {
                    self.nodes.set_from(n_ix, cur_ix);
                    self.insert(n_ix, path_cost);
                }
            } else if n_from == cur_ix && n_h != path_cost {
                // The cost along the back-pointer changed.
                self.insert(n_ix, path_cost);
            } else if n_from != cur_ix && n_h > path_cost {
                if stable {
                    self.nodes.set_from(n_ix, cur_ix);
                    self.insert(n_ix, path_cost);
                } else {
                    // Hold the reduction back until the increase of cur has settled.
                    self.insert(cur_ix, cur_h);
                }
            } else {
                let reverse_cost = add_cost(n_h, grid.arc_cost(nbr, &cur));
                if n_from != cur_ix && cur_h > reverse_cost && n_tag == Tag::Closed && n_h > k_old {
                    // The neighbour could lower cur, have it propagate again.
                    self.insert(n_ix, n_h);
                }
            }
        }
        self.k_min()
    }

    /// Puts a cell on the OPEN list with path cost `h_new`, or moves it within the list.
    fn insert(&mut self, ix: usize, h_new: i32) {
        let tag = self.nodes.tag(ix);
        let p = match tag {
            Tag::New => h_new,
            Tag::Open => self.nodes.p(ix).min(self.nodes.h(ix)),
            Tag::Closed => self.nodes.h(ix),
        };
        self.nodes.set_p(ix, p);
        self.nodes.set_h(ix, h_new);
        self.nodes.set_k(ix, p.min(h_new));
        if tag == Tag::Open {
            let slot = self.nodes.heap_ix(ix);
            self.open.update(&mut self.nodes, slot);
        } else {
            self.nodes.set_tag(ix, Tag::Open);
            self.open.insert(&mut self.nodes, ix);
        }
    }

    /// Smallest key on the OPEN list.
    pub fn k_min(&self) -> Option<i32> {
        self.open.peek().map(|ix| self.nodes.k(ix))
    }

    fn is_start(&self, ix: usize) -> bool {
        self.endpoints.is_some_and(|e| e.start == ix)
    }

    /// The start is closed and nothing on the OPEN list could still lower its cost.
    fn start_settled(&self, start: usize) -> bool {
        self.nodes.tag(start) == Tag::Closed
            && self.k_min().map_or(true, |k| k >= self.nodes.h(start))
    }

    /// Calls [process_state](Self::process_state) until the start is settled or the OPEN list
    /// runs dry.
    fn run(&mut self, grid: &PathingGrid) -> Result<bool, PlanError> {
        let start = self.endpoints.ok_or(PlanError::NotInitialized)?.start;
        self.expansions = 0;
        while !self.start_settled(start) && !self.open.is_empty() {
            if let Some(limit) = self.expansion_limit {
                if self.expansions >= limit {
                    debug!("D* paused after {} expansions", self.expansions);
                    return Err(PlanError::BudgetExhausted { limit });
                }
            }
            self.expansions += 1;
            self.process_state(grid);
        }
        Ok(self.nodes.tag(start) == Tag::Closed && self.nodes.h(start) < INFINITE_COST)
    }

    /// Records that `pos` changed between free and blocked. The change is taken into account by
    /// the next [replan](Self::replan).
    pub fn cell_changed(&mut self, grid: &PathingGrid, pos: Point) {
        if grid.point_in_bounds(pos) {
            self.pending.insert(grid.cell_ix(pos));
        }
    }

    /// Blocks or frees a cell and records the change. Returns whether the cell changed.
    pub fn update_cell(&mut self, grid: &mut PathingGrid, pos: Point, blocked: bool) -> bool {
        let changed = grid.set_obstacle(pos, blocked);
        if changed {
            self.pending.insert(grid.cell_ix(pos));
        }
        changed
    }

    /// Repairs the solution after cells changed. Every arc whose cost changed with a cell lies
    /// in the 3x3 block around it, so the visited cells of that block are put back on the OPEN
    /// list with their current cost; propagation then raises or lowers whatever depends on
    /// them. Returns whether a path from the start exists.
    pub fn replan(&mut self, grid: &PathingGrid) -> Result<bool, PlanError> {
        if self.endpoints.is_none() {
            return Err(PlanError::NotInitialized);
        }
        let pending = std::mem::take(&mut self.pending);
        let mut seeded = 0;
        for ix in pending.iter().copied() {
            let pos = grid.cell_point(ix);
            for cell in std::iter::once(pos).chain(grid.neighborhood_points(&pos)) {
                let cell_ix = grid.cell_ix(cell);
                if self.nodes.tag(cell_ix) != Tag::New {
                    self.insert(cell_ix, self.nodes.h(cell_ix));
                    seeded += 1;
                }
            }
        }
        debug!(
            "{} changed cells put {} states back on the OPEN list",
            pending.len(),
            seeded
        );
        let found = self.run(grid)?;
        info!(
            "D* replan: {} after {} expansions",
            if found { "path found" } else { "no path" },
            self.expansions
        );
        Ok(found)
    }

    /// Moves the start, for instance to the next cell of the path once it has been traversed,
    /// and repairs the solution for any recorded cell changes.
    pub fn move_start(&mut self, grid: &PathingGrid, start: Point) -> Result<bool, PlanError> {
        let endpoints = self.endpoints.ok_or(PlanError::NotInitialized)?;
        validate_endpoint(grid, start)?;
        // The old start was never expanded, let it propagate like any other cell.
        if self.nodes.tag(endpoints.start) == Tag::Closed {
            self.insert(endpoints.start, self.nodes.h(endpoints.start));
        }
        self.endpoints = Some(Endpoints {
            start: grid.cell_ix(start),
            ..endpoints
        });
        self.replan(grid)
    }

    /// The current path from the start to the goal, empty if there is none.
    pub fn path(&self, grid: &PathingGrid) -> Vec<Point> {
        let Some(endpoints) = self.endpoints else {
            return Vec::new();
        };
        if !self.start_settled(endpoints.start) || self.nodes.h(endpoints.start) >= INFINITE_COST
        {
            return Vec::new();
        }
        let mut path = Vec::new();
        let mut ix = endpoints.start;
        // A path visits every cell at most once.
        for _ in 0..self.nodes.len() {
            path.push(grid.cell_point(ix));
            if ix == endpoints.goal {
                return path;
            }
            ix = self.nodes.from(ix);
            if ix == NO_NODE {
                break;
            }
        }
        warn!("Back-pointers from the start do not lead to the goal");
        Vec::new()
    }

    /// Cost of the current path, [None] if there is none.
    pub fn path_cost(&self) -> Option<i32> {
        let endpoints = self.endpoints?;
        let h = self.nodes.h(endpoints.start);
        (self.start_settled(endpoints.start) && h < INFINITE_COST).then_some(h)
    }

    /// Index of an in-bounds cell the planner has state for.
    fn cell_of(&self, grid: &PathingGrid, pos: Point) -> Option<usize> {
        grid.point_in_bounds(pos)
            .then(|| grid.cell_ix(pos))
            .filter(|&ix| ix < self.nodes.len())
    }

    /// Out-of-bounds cells are reported as [Tag::New].
    pub fn tag(&self, grid: &PathingGrid, pos: Point) -> Tag {
        self.cell_of(grid, pos)
            .map_or(Tag::New, |ix| self.nodes.tag(ix))
    }

    /// The path cost estimate of a visited cell, [None] for unvisited, cut-off or out-of-bounds
    /// cells.
    pub fn cost_to_goal(&self, grid: &PathingGrid, pos: Point) -> Option<i32> {
        let ix = self.cell_of(grid, pos)?;
        let h = self.nodes.h(ix);
        (self.nodes.tag(ix) != Tag::New && h < INFINITE_COST).then_some(h)
    }

    /// The back-pointer of a cell, [NOWHERE] for the goal, unvisited and out-of-bounds cells.
    pub fn predecessor(&self, grid: &PathingGrid, pos: Point) -> Point {
        match self.cell_of(grid, pos).map(|ix| self.nodes.from(ix)) {
            None | Some(NO_NODE) => NOWHERE,
            Some(ix) => grid.cell_point(ix),
        }
    }

    /// Number of [process_state](Self::process_state) calls made by the last planning request.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    pub fn storage(&self) -> &S {
        &self.nodes
    }
}

impl<S: NodeStorage> GridPlanner for DStarPlanner<S> {
    fn find_path(
        &mut self,
        grid: &PathingGrid,
        start: Point,
        goal: Point,
    ) -> Result<Vec<Point>, PlanError> {
        if self.initialize(grid, start, goal)? {
            Ok(self.path(grid))
        } else {
            Ok(Vec::new())
        }
    }
}
