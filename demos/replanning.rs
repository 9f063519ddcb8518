use grid_replan::{DStarPlanner, PathingGrid, PlanError};
use grid_util::{Point, ValueGrid};

fn show(grid: &PathingGrid, path: &[Point]) {
    for y in (0..grid.height() as i32).rev() {
        let row: String = (0..grid.width() as i32)
            .map(|x| {
                let p = Point::new(x, y);
                if grid.get_point(p) {
                    '#'
                } else if path.contains(&p) {
                    'o'
                } else {
                    '.'
                }
            })
            .collect();
        println!("{row}");
    }
    println!();
}

/// A wall with a single gap separates start and goal. Closing the gap cuts the goal off,
/// opening a new gap lets the planner find its way again without starting over.
fn main() -> Result<(), PlanError> {
    let mut grid = PathingGrid::new(12, 8, false);
    for y in 0..7 {
        grid.set(6, y, true);
    }
    let start = Point::new(0, 0);
    let goal = Point::new(11, 0);
    let mut dstar: DStarPlanner = DStarPlanner::new(&grid);

    dstar.initialize(&grid, start, goal)?;
    println!("Initial path, {} expansions:", dstar.expansions());
    show(&grid, &dstar.path(&grid));

    dstar.update_cell(&mut grid, Point::new(6, 7), true);
    let found = dstar.replan(&grid)?;
    println!("Gap closed, path found: {found}, {} expansions", dstar.expansions());
    show(&grid, &dstar.path(&grid));

    dstar.update_cell(&mut grid, Point::new(6, 2), false);
    let found = dstar.replan(&grid)?;
    println!(
        "New gap, path found: {found}, cost {:?}, {} expansions",
        dstar.path_cost(),
        dstar.expansions()
    );
    show(&grid, &dstar.path(&grid));
    Ok(())
}
