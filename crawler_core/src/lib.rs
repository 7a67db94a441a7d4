use serde::{Deserialize, Serialize};

pub mod config;
pub mod draw;
pub mod enemy;
pub mod los;
pub mod map;
pub mod movement;
pub mod pathfinding;
pub mod player;
pub mod room;
pub mod world;

/// Milliseconds on the host's frame clock.
pub type Millis = u64;

/// A grid coordinate.
///
/// Signed so that neighbours of border cells can be expressed; anything outside
/// the map is treated as blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Cell { x, y }
    }

    /// Manhattan distance between two cells.
    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> Cell {
        Cell::new(self.x + dx, self.y + dy)
    }
}

/// An integer axis-aligned rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Rect { x, y, w, h }
    }

    /// Builds a rectangle of the given size centred on `(cx, cy)`.
    pub const fn centered(cx: i32, cy: i32, w: i32, h: i32) -> Self {
        Rect::new(cx - w / 2, cy - h / 2, w, h)
    }

    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.w
    }

    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub const fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn set_center(&mut self, cx: i32, cy: i32) {
        self.x = cx - self.w / 2;
        self.y = cy - self.h / 2;
    }

    /// Returns true if the two rectangles share a positive area.
    /// Rectangles that merely touch along an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    pub fn intersects_any<'a>(&self, others: impl IntoIterator<Item = &'a Rect>) -> bool {
        others.into_iter().any(|other| self.intersects(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(!a.intersects(&Rect::new(10, 0, 10, 10)));
        assert!(!a.intersects(&Rect::new(0, 10, 10, 10)));
        assert!(a.intersects(&Rect::new(9, 9, 10, 10)));
    }

    #[test]
    fn set_center_keeps_size() {
        let mut r = Rect::new(0, 0, 24, 24);
        r.set_center(100, 50);
        assert_eq!(r, Rect::new(88, 38, 24, 24));
        assert_eq!(r.center(), (100, 50));
    }
}
