//! Sub-pixel movement with axis-separated collision.

use glam::Vec2;

use crate::{Rect, config::SeparationConfig};

/// Largest distance covered in one collision sub-step. Keeps fast movers from
/// tunnelling through thin obstacles.
pub const MAX_SUB_STEP: f32 = 4.0;

/// A target counts as reached inside this distance.
pub const ARRIVE_DISTANCE: f32 = 24.0;

/// Below this distance a target is treated as the current position.
const EPSILON: f32 = 1e-6;

/// A float position with an integer collider kept centred on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    position: Vec2,
    collider: Rect,
}

impl Body {
    /// Creates a body centred on `position` with a collider of the given size.
    pub fn new(position: Vec2, width: i32, height: i32) -> Self {
        let mut body = Body {
            position,
            collider: Rect::new(0, 0, width, height),
        };
        body.sync_collider();
        body
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn collider(&self) -> Rect {
        self.collider
    }

    /// Centre rounded to whole world units.
    pub fn rounded_center(&self) -> (i32, i32) {
        (self.position.x.round() as i32, self.position.y.round() as i32)
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.sync_collider();
    }

    fn sync_collider(&mut self) {
        let (cx, cy) = self.rounded_center();
        self.collider.set_center(cx, cy);
    }

    pub fn collides(&self, obstacles: &[Rect]) -> bool {
        self.collider.intersects_any(obstacles)
    }

    /// Moves by `delta`, sliding along obstacles.
    ///
    /// The displacement is cut into sub-steps of at most [`MAX_SUB_STEP`]. In each
    /// sub-step the X part is applied and undone on overlap, then the Y part.
    pub fn slide(&mut self, delta: Vec2, obstacles: &[Rect]) {
        let distance = delta.length();
        if distance <= EPSILON {
            return;
        }
        let steps = (distance / MAX_SUB_STEP).ceil().max(1.0) as u32;
        let step = delta / steps as f32;

        for _ in 0..steps {
            if step.x != 0.0 {
                let previous = self.position.x;
                self.position.x += step.x;
                self.sync_collider();
                if self.collides(obstacles) {
                    self.position.x = previous;
                    self.sync_collider();
                }
            }
            if step.y != 0.0 {
                let previous = self.position.y;
                self.position.y += step.y;
                self.sync_collider();
                if self.collides(obstacles) {
                    self.position.y = previous;
                    self.sync_collider();
                }
            }
        }
    }

    /// Steers toward `target` at `speed` world units per second for `dt_ms`.
    ///
    /// Returns true once the body is within [`ARRIVE_DISTANCE`] of the target.
    pub fn move_towards(&mut self, target: Vec2, obstacles: &[Rect], dt_ms: u32, speed: f32) -> bool {
        let offset = target - self.position;
        let distance = offset.length();
        if distance > EPSILON {
            let direction = offset / distance;
            let dt = dt_ms as f32 / 1000.0;
            self.slide(direction * speed * dt, obstacles);
        }
        self.position.distance_squared(target) <= ARRIVE_DISTANCE * ARRIVE_DISTANCE
    }

    /// Pushes the body away from nearby neighbours.
    ///
    /// Each neighbour inside the radius contributes its offset weighted by the
    /// inverse squared distance (floored at 1). Neighbours at exactly the same
    /// position, the body itself included, are ignored. The nudge bypasses
    /// collision.
    pub fn apply_separation(&mut self, neighbours: &[Vec2], config: &SeparationConfig) {
        let radius2 = config.radius * config.radius;
        let push = neighbours
            .iter()
            .map(|other| self.position - *other)
            .filter(|delta| {
                let d2 = delta.length_squared();
                d2 > 0.0 && d2 < radius2
            })
            .fold(Vec2::ZERO, |acc, delta| {
                acc + delta / delta.length_squared().max(1.0)
            });

        if push != Vec2::ZERO {
            self.set_position(self.position + push * config.strength);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collider_tracks_rounded_position() {
        let mut body = Body::new(Vec2::new(50.4, 50.6), 24, 24);
        assert_eq!(body.collider(), Rect::new(38, 39, 24, 24));
        body.set_position(Vec2::new(10.0, 20.0));
        assert_eq!(body.collider().center(), (10, 20));
    }

    #[test]
    fn target_at_current_position_is_reached_without_moving() {
        let mut body = Body::new(Vec2::new(100.0, 100.0), 24, 24);
        let before = body.clone();
        assert!(body.move_towards(Vec2::new(100.0, 100.0), &[], 16, 200.0));
        assert_eq!(body, before);
    }

    #[test]
    fn moves_speed_times_dt() {
        let mut body = Body::new(Vec2::new(0.0, 0.0), 10, 10);
        let reached = body.move_towards(Vec2::new(1000.0, 0.0), &[], 500, 100.0);
        assert!(!reached);
        assert!((body.position().x - 50.0).abs() < 1e-3);
        assert_eq!(body.position().y, 0.0);
    }

    #[test]
    fn arrival_uses_close_enough_distance() {
        let mut body = Body::new(Vec2::new(0.0, 0.0), 10, 10);
        assert!(body.move_towards(Vec2::new(30.0, 0.0), &[], 100, 100.0));
        let mut far = Body::new(Vec2::new(0.0, 0.0), 10, 10);
        assert!(!far.move_towards(Vec2::new(60.0, 0.0), &[], 100, 100.0));
    }

    #[test]
    fn slides_along_wall_when_moving_into_corner() {
        // L-shaped corner: a wall on the right and a wall above
        let obstacles = [Rect::new(60, 0, 20, 100), Rect::new(0, 0, 80, 20)];
        let mut body = Body::new(Vec2::new(47.0, 60.0), 24, 24);
        let before = body.position();
        body.move_towards(Vec2::new(100.0, 0.0), &obstacles, 100, 100.0);
        let after = body.position();
        assert!(!body.collides(&obstacles));
        assert_eq!(after.x, before.x);
        assert!(after.y < before.y, "expected to slide up, got {after:?}");
    }

    #[test]
    fn thin_wall_is_not_tunnelled() {
        let wall = [Rect::new(40, -50, 2, 100)];
        let mut body = Body::new(Vec2::new(20.0, 0.0), 10, 10);
        body.move_towards(Vec2::new(200.0, 0.0), &wall, 1000, 1000.0);
        assert!(body.position().x < 40.0);
    }

    #[test]
    fn separation_pushes_apart_and_skips_self() {
        let config = SeparationConfig::default();
        let mut body = Body::new(Vec2::new(100.0, 100.0), 24, 24);
        body.apply_separation(&[Vec2::new(100.0, 100.0), Vec2::new(90.0, 100.0)], &config);
        let pos = body.position();
        assert!(pos.x > 100.0);
        assert_eq!(pos.y, 100.0);

        let mut lonely = Body::new(Vec2::new(0.0, 0.0), 24, 24);
        lonely.apply_separation(&[Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0)], &config);
        assert_eq!(lonely.position(), Vec2::ZERO);
    }

    #[test]
    fn separation_weights_by_inverse_square_distance() {
        let config = SeparationConfig {
            strength: 0.4,
            radius: 40.0,
        };
        let mut body = Body::new(Vec2::ZERO, 24, 24);
        // delta (-10, 0) over 100 and (0, -20) over 400, scaled by strength
        body.apply_separation(
            &[Vec2::new(10.0, 0.0), Vec2::new(0.0, 20.0), Vec2::new(100.0, 0.0)],
            &config,
        );
        let pos = body.position();
        assert!((pos.x - -0.04).abs() < 1e-6, "x was {}", pos.x);
        assert!((pos.y - -0.02).abs() < 1e-6, "y was {}", pos.y);

        // very close neighbours are capped at a divisor of one
        let mut near = Body::new(Vec2::ZERO, 24, 24);
        near.apply_separation(&[Vec2::new(0.5, 0.0)], &config);
        assert!((near.position().x - -0.2).abs() < 1e-6);
    }
}
