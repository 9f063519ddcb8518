use grid_replan::{AstarPlanner, DStarPlanner, GridPlanner, PathingGrid};
use grid_util::{Point, ValueGrid};

// In this example a path is found on a grid with shape
// #####
// #S  #
// # # #
// #  E#
// #####
// S marks the start
// E marks the end
fn main() {
    let mut pathing_grid = PathingGrid::new(5, 5, true);
    for x in 1..4 {
        for y in 1..4 {
            pathing_grid.set(x, y, false);
        }
    }
    pathing_grid.set(2, 2, true);
    pathing_grid.generate_components();
    println!("{pathing_grid}");
    let start = Point::new(1, 3);
    let end = Point::new(3, 1);

    let mut astar = AstarPlanner::new();
    match astar.find_path(&pathing_grid, start, end) {
        Ok(path) if !path.is_empty() => {
            println!("A* found a path of cost {}:", astar.get_path_cost_float(&path));
            for p in path {
                println!("{:?}", p);
            }
        }
        Ok(_) => println!("A* found no path"),
        Err(e) => println!("A* failed: {e}"),
    }

    let mut dstar: DStarPlanner = DStarPlanner::new(&pathing_grid);
    match dstar.find_path(&pathing_grid, start, end) {
        Ok(path) => println!("D* agrees: {:?}", path),
        Err(e) => println!("D* failed: {e}"),
    }
}
