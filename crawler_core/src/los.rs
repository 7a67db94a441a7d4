//! Grid line of sight.

use crate::map::GridMap;

/// Walks a Bresenham line from `(x0, y0)` to `(x1, y1)` in grid coordinates and
/// reports whether every cell after the start is free.
///
/// The start cell is never tested, so an agent standing in a wall tile can still
/// see out of it. The end cell is tested like any other.
pub fn has_los(map: &GridMap, x0: i32, y0: i32, x1: i32, y1: i32) -> bool {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let (mut x, mut y) = (x0, y0);
    loop {
        if (x, y) != (x0, y0) && map.is_blocked(x, y) {
            return false;
        }
        if x == x1 && y == y1 {
            return true;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORRIDOR: [&str; 5] = [
        "#########",
        "#.......#",
        "#...#...#",
        "#.......#",
        "#########",
    ];

    #[test]
    fn same_cell_is_visible() {
        let map = GridMap::from_rows(&CORRIDOR, 32);
        assert!(has_los(&map, 2, 2, 2, 2));
        // even from inside a wall
        assert!(has_los(&map, 4, 2, 4, 2));
    }

    #[test]
    fn wall_on_the_line_blocks() {
        let blocked = GridMap::from_rows(&CORRIDOR, 32);
        assert!(!has_los(&blocked, 1, 2, 7, 2));
        assert!(!has_los(&blocked, 7, 2, 1, 2));

        let open = GridMap::from_rows(&["#########", "#.......#", "#.......#", "#.......#", "#########"], 32);
        assert!(has_los(&open, 1, 2, 7, 2));
    }

    #[test]
    fn repeated_queries_agree() {
        let map = GridMap::from_rows(&CORRIDOR, 32);
        let first = has_los(&map, 1, 1, 7, 3);
        for _ in 0..10 {
            assert_eq!(has_los(&map, 1, 1, 7, 3), first);
        }
    }

    #[test]
    fn end_cell_is_tested() {
        let map = GridMap::from_rows(&CORRIDOR, 32);
        assert!(!has_los(&map, 3, 2, 4, 2));
        assert!(!has_los(&map, 1, 1, 1, -1));
    }
}
