use serde::{Deserialize, Serialize};

use crate::{Millis, Rect, config::PlayerConfig, enemy::Enemy};

/// Direction of a player swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub collider: Rect,
    pub health: i32,
    pub alive: bool,
    config: PlayerConfig,
    /// The player cannot swing again before this time.
    attack_until: Millis,
    /// Last swing, kept for drawing until `attack_until`.
    last_swing: Option<Rect>,
}

impl Player {
    pub fn new(center: (i32, i32), config: PlayerConfig) -> Self {
        Player {
            collider: Rect::centered(center.0, center.1, config.width, config.height),
            health: config.max_health,
            alive: true,
            config,
            attack_until: 0,
            last_swing: None,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        self.collider.center()
    }

    pub fn teleport(&mut self, center: (i32, i32)) {
        self.collider.set_center(center.0, center.1);
    }

    /// Moves by `(dx, dy)` steps, one axis at a time, undoing an axis that ends in an obstacle.
    pub fn step(&mut self, dx: i32, dy: i32, obstacles: &[Rect]) {
        if !self.alive {
            return;
        }
        let distance = self.config.step;
        if dx != 0 {
            let previous = self.collider.x;
            self.collider.x += dx * distance;
            if self.collider.intersects_any(obstacles) {
                self.collider.x = previous;
            }
        }
        if dy != 0 {
            let previous = self.collider.y;
            self.collider.y += dy * distance;
            if self.collider.intersects_any(obstacles) {
                self.collider.y = previous;
            }
        }
    }

    /// The collider-sized box one body length toward `facing`.
    pub fn swing_rect(&self, facing: Facing) -> Rect {
        let Rect { x, y, w, h } = self.collider;
        match facing {
            Facing::Up => Rect::new(x, y - h, w, h),
            Facing::Down => Rect::new(x, y + h, w, h),
            Facing::Left => Rect::new(x - w, y, w, h),
            Facing::Right => Rect::new(x + w, y, w, h),
        }
    }

    /// Swings toward `facing` and damages every enemy the swing overlaps.
    ///
    /// Ignored while the previous swing is cooling down. Returns how many enemies were hit.
    pub fn attack(&mut self, facing: Facing, enemies: &mut [Enemy], now: Millis) -> usize {
        if !self.alive || now < self.attack_until {
            return 0;
        }
        let swing = self.swing_rect(facing);
        self.attack_until = now + self.config.attack_cooldown_ms;
        self.last_swing = Some(swing);

        let mut landed = 0;
        for enemy in enemies
            .iter_mut()
            .filter(|enemy| enemy.collider().intersects(&swing))
        {
            if enemy.take_hit(self.config.damage, now) {
                landed += 1;
            }
        }
        landed
    }

    /// The current swing while it is still on cooldown.
    pub fn swing(&self, now: Millis) -> Option<Rect> {
        self.last_swing.filter(|_| now < self.attack_until)
    }

    pub fn take_damage(&mut self, damage: i32) {
        self.health -= damage;
        if self.health <= 0 {
            self.alive = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnemyConfig;
    use glam::Vec2;
    use pretty_assertions::assert_eq;

    #[test]
    fn step_slides_along_walls() {
        let mut player = Player::new((50, 50), PlayerConfig::default());
        let wall = [Rect::new(63, 0, 10, 200)];
        player.step(1, 1, &wall);
        // x blocked by the wall, y free
        assert_eq!(player.center(), (50, 58));
    }

    #[test]
    fn attack_hits_enemies_in_front_once_per_cooldown() {
        let config = PlayerConfig::default();
        let cooldown = config.attack_cooldown_ms;
        let mut player = Player::new((100, 100), config);
        let mut enemies = vec![
            Enemy::new(Vec2::new(124.0, 100.0), EnemyConfig::default(), 1, 0),
            Enemy::new(Vec2::new(76.0, 100.0), EnemyConfig::default(), 2, 0),
        ];

        assert_eq!(player.attack(Facing::Right, &mut enemies, 10), 1);
        assert_eq!(enemies[0].health, 2);
        assert!(enemies[0].hit);
        assert_eq!(enemies[1].health, 3);
        assert_eq!(player.swing(10), Some(player.swing_rect(Facing::Right)));

        assert_eq!(player.attack(Facing::Left, &mut enemies, 20), 0);
        assert_eq!(enemies[1].health, 3);

        assert_eq!(player.attack(Facing::Left, &mut enemies, 10 + cooldown), 1);
        assert_eq!(enemies[1].health, 2);
        assert_eq!(player.swing(20 + cooldown), Some(player.swing_rect(Facing::Left)));
        assert_eq!(player.swing(10 + 2 * cooldown), None);
    }

    #[test]
    fn dies_at_zero_health() {
        let mut player = Player::new((0, 0), PlayerConfig::default());
        player.take_damage(4);
        assert!(player.alive);
        player.take_damage(1);
        assert!(!player.alive);
    }
}
