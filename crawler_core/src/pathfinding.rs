//! Next-step pathfinders over a [`GridMap`].
//!
//! Both searches return only the first cell to move to. Agents call them again
//! every frame, so the full path is never needed.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet, VecDeque},
};

use tracing::trace;

use crate::{Cell, map::GridMap};

/// Neighbour enumeration order. Changing it changes tie-breaking.
const DIRECTIONS: [(i32, i32); 4] = [
    (1, 0),  // Right
    (-1, 0), // Left
    (0, 1),  // Down
    (0, -1), // Up
];

fn neighbours(cell: Cell) -> impl Iterator<Item = Cell> {
    DIRECTIONS.iter().map(move |&(dx, dy)| cell.offset(dx, dy))
}

/// Follows parent links back from `target` and returns the cell right after `start`.
fn first_step(came_from: &HashMap<Cell, Cell>, start: Cell, target: Cell) -> Option<Cell> {
    let mut node = target;
    loop {
        let parent = *came_from.get(&node)?;
        if parent == start {
            return Some(node);
        }
        node = parent;
    }
}

/// Breadth-first search for the first step from `start` toward `goal`.
///
/// Cells at depth `max_depth` are not expanded, so a goal further than that from
/// `start` yields `None`. Also `None` when `start == goal`.
pub fn next_step_bfs(map: &GridMap, start: Cell, goal: Cell, max_depth: u32) -> Option<Cell> {
    if start == goal {
        return None;
    }

    let mut frontier = VecDeque::from([(start, 0u32)]);
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut visited: HashSet<Cell> = HashSet::from([start]);

    while let Some((current, depth)) = frontier.pop_front() {
        if current == goal {
            return first_step(&came_from, start, goal);
        }
        if depth >= max_depth {
            continue;
        }
        for next in neighbours(current) {
            if visited.contains(&next) || map.is_cell_blocked(next) {
                continue;
            }
            visited.insert(next);
            came_from.insert(next, current);
            frontier.push_back((next, depth + 1));
        }
    }

    None
}

/// Open-set entry. `order` is a monotonically increasing insertion counter so
/// entries with equal `f` pop in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    f: u32,
    order: u64,
    cell: Cell,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on both keys for min-heap behaviour
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Budgeted A* returning the first step from `start` toward `goal`.
///
/// At most `max_expansions` nodes are expanded. When the goal is not reached,
/// either because the budget ran out or because it is walled off, the step leads
/// toward the expanded node closest to the goal (lowest heuristic, then lowest
/// cost, then earliest). If that node is `start`, there is no useful step and
/// the result is `None`.
pub fn next_step_astar(
    map: &GridMap,
    start: Cell,
    goal: Cell,
    max_expansions: u32,
) -> Option<Cell> {
    if start == goal || map.is_cell_blocked(start) || map.is_cell_blocked(goal) {
        return None;
    }

    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut cost_so_far: HashMap<Cell, u32> = HashMap::from([(start, 0)]);
    let mut closed: HashSet<Cell> = HashSet::new();
    let mut counter: u64 = 0;

    open.push(Frontier {
        f: start.manhattan(goal),
        order: counter,
        cell: start,
    });

    let mut best = (start.manhattan(goal), 0u32, start);
    let mut expansions = 0;

    while expansions < max_expansions {
        let Some(Frontier { cell: current, .. }) = open.pop() else {
            break;
        };
        if !closed.insert(current) {
            // stale entry
            continue;
        }
        expansions += 1;

        let cost = cost_so_far.get(&current).copied().unwrap_or(0);
        let h = current.manhattan(goal);
        if (h, cost) < (best.0, best.1) {
            best = (h, cost, current);
        }

        for next in neighbours(current) {
            if map.is_cell_blocked(next) {
                continue;
            }
            let new_cost = cost + 1;
            if new_cost < cost_so_far.get(&next).copied().unwrap_or(u32::MAX) {
                cost_so_far.insert(next, new_cost);
                came_from.insert(next, current);
                if next == goal {
                    return first_step(&came_from, start, goal);
                }
                counter += 1;
                open.push(Frontier {
                    f: new_cost + next.manhattan(goal),
                    order: counter,
                    cell: next,
                });
            }
        }
    }

    let (_, _, fallback) = best;
    trace!(
        ?start,
        ?goal,
        ?fallback,
        expansions,
        "A* did not reach goal, falling back to closest node"
    );
    if fallback == start {
        None
    } else {
        first_step(&came_from, start, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn open_grid(width: usize, height: usize) -> GridMap {
        let row = ".".repeat(width);
        let rows: Vec<&str> = (0..height).map(|_| row.as_str()).collect();
        GridMap::from_rows(&rows, 32)
    }

    #[test]
    fn bfs_same_cell_has_no_step() {
        let map = open_grid(5, 5);
        assert_eq!(next_step_bfs(&map, Cell::new(2, 2), Cell::new(2, 2), 10), None);
    }

    #[rstest]
    #[case(4, None)]
    #[case(5, Some(Cell::new(1, 0)))]
    #[case(9, Some(Cell::new(1, 0)))]
    fn bfs_respects_depth_bound(#[case] max_depth: u32, #[case] expected: Option<Cell>) {
        let map = open_grid(20, 20);
        assert_eq!(
            next_step_bfs(&map, Cell::new(0, 0), Cell::new(5, 0), max_depth),
            expected
        );
    }

    #[test]
    fn bfs_prefers_positive_x_on_ties() {
        let map = open_grid(5, 5);
        // (1,1) and (2,2) are joined by two equally short routes
        assert_eq!(
            next_step_bfs(&map, Cell::new(1, 1), Cell::new(2, 2), 4),
            Some(Cell::new(2, 1))
        );
        assert_eq!(
            next_step_bfs(&map, Cell::new(2, 2), Cell::new(1, 1), 4),
            Some(Cell::new(1, 2))
        );
    }

    #[test]
    fn bfs_routes_around_walls() {
        let map = GridMap::from_rows(&["#####", "#.#.#", "#...#", "#####"], 32);
        assert_eq!(
            next_step_bfs(&map, Cell::new(1, 1), Cell::new(3, 1), 4),
            Some(Cell::new(1, 2))
        );
        assert_eq!(next_step_bfs(&map, Cell::new(1, 1), Cell::new(3, 1), 3), None);
    }

    #[test]
    fn astar_steps_follow_a_shortest_path() {
        let map = open_grid(10, 10);
        let goal = Cell::new(5, 5);
        let mut cell = Cell::new(0, 0);
        let mut steps = 0;
        while cell != goal {
            let next = next_step_astar(&map, cell, goal, 512).expect("open grid has a path");
            assert_eq!(cell.manhattan(next), 1);
            assert_eq!(next.manhattan(goal) + 1, cell.manhattan(goal));
            cell = next;
            steps += 1;
            assert!(steps <= 10, "walked past the Manhattan distance");
        }
        assert_eq!(steps, Cell::new(0, 0).manhattan(goal));
    }

    #[test]
    fn astar_rejects_blocked_endpoints() {
        let map = GridMap::from_rows(&["....", ".#..", "...."], 32);
        assert_eq!(next_step_astar(&map, Cell::new(1, 1), Cell::new(3, 2), 64), None);
        assert_eq!(next_step_astar(&map, Cell::new(0, 0), Cell::new(1, 1), 64), None);
        assert_eq!(next_step_astar(&map, Cell::new(0, 0), Cell::new(9, 9), 64), None);
        assert_eq!(next_step_astar(&map, Cell::new(0, 0), Cell::new(0, 0), 64), None);
    }

    #[test]
    fn astar_detours_around_a_wall() {
        let map = GridMap::from_rows(&["#######", "#..#..#", "#..#..#", "#.....#", "#######"], 32);
        let mut cell = Cell::new(1, 1);
        let goal = Cell::new(5, 1);
        let mut steps = 0;
        while cell != goal {
            cell = next_step_astar(&map, cell, goal, 512).expect("route exists");
            assert!(!map.is_cell_blocked(cell));
            steps += 1;
            assert!(steps <= 8);
        }
        assert_eq!(steps, 8);
    }

    #[test]
    fn astar_walled_off_goal_heads_for_closest_reachable_cell() {
        let map = GridMap::from_rows(&["#########", "#....#..#", "#....#..#", "#########"], 32);
        let goal = Cell::new(7, 1);
        assert_eq!(
            next_step_astar(&map, Cell::new(1, 1), goal, 512),
            Some(Cell::new(2, 1))
        );
        // already at the closest reachable cell
        assert_eq!(next_step_astar(&map, Cell::new(4, 1), goal, 512), None);
    }

    #[test]
    fn astar_exhausted_budget_makes_progress() {
        let map = open_grid(30, 1);
        assert_eq!(
            next_step_astar(&map, Cell::new(0, 0), Cell::new(25, 0), 3),
            Some(Cell::new(1, 0))
        );
        assert_eq!(next_step_astar(&map, Cell::new(0, 0), Cell::new(25, 0), 0), None);
    }
}
