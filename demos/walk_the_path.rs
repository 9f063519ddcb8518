use grid_replan::{FieldDStarPlanner, DStarPlanner, PathingGrid, PlanError};
use grid_util::{Point, ValueGrid};

/// A robot walks towards the goal on a map it only partially knows. Hidden obstacles are
/// discovered when the robot is next to them, after which the remaining path is repaired.
fn main() -> Result<(), PlanError> {
    let mut world = PathingGrid::new(10, 10, false);
    for x in 2..9 {
        world.set(x, 5, true);
    }
    let mut known = PathingGrid::new(10, 10, false);
    let goal = Point::new(5, 9);
    let mut position = Point::new(5, 0);

    let mut dstar: FieldDStarPlanner = DStarPlanner::new(&known);
    if !dstar.initialize(&known, position, goal)? {
        println!("No path to the goal");
        return Ok(());
    }
    while position != goal {
        for p in known.neighborhood_points(&position) {
            if world.get_point(p) && dstar.update_cell(&mut known, p, true) {
                println!("Discovered obstacle at {:?}", p);
            }
        }
        if !dstar.replan(&known)? {
            println!("Goal is unreachable from {:?}", position);
            return Ok(());
        }
        position = dstar.path(&known)[1];
        dstar.move_start(&known, position)?;
        println!("Moved to {:?}, remaining cost {:?}", position, dstar.path_cost());
    }
    println!("Reached the goal");
    Ok(())
}
