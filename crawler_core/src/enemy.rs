use glam::Vec2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Cell, Millis, Rect,
    config::{EnemyConfig, SeparationConfig},
    draw::{Camera, Canvas, HITBOX_COLOR, Rgb},
    los::has_los,
    map::GridMap,
    movement::{ARRIVE_DISTANCE, Body},
    pathfinding::{next_step_astar, next_step_bfs},
};

/// Behaviour state of an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyState {
    /// Standing around, occasionally wandering a few tiles.
    Idle,
    /// Player in sight, steering straight at them.
    Chase,
    /// Player lost, heading for where they were last seen.
    Search,
    /// Swung at the player this frame.
    Attack,
    /// Took a hit; otherwise behaves like `Idle`.
    Hurt,
    Dead,
}

impl EnemyState {
    pub fn color(self) -> Rgb {
        match self {
            EnemyState::Idle => Rgb(0, 180, 0),
            EnemyState::Chase => Rgb(80, 220, 80),
            EnemyState::Search => Rgb(200, 200, 0),
            EnemyState::Attack => Rgb(255, 120, 0),
            EnemyState::Hurt => Rgb(255, 0, 0),
            EnemyState::Dead => Rgb(100, 100, 100),
        }
    }
}

/// A melee swing started this frame. The caller decides what it hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attack {
    pub hitbox: Rect,
    pub damage: i32,
}

/// A single enemy.
///
/// `health` and `hit` are the combat surface: whoever deals damage lowers
/// `health` and raises `hit`, and the next [`Enemy::update`] consumes it.
#[derive(Debug, Clone)]
pub struct Enemy {
    body: Body,
    config: EnemyConfig,
    rng: StdRng,
    state: EnemyState,
    pub health: i32,
    pub alive: bool,
    /// Set by combat when this enemy was damaged.
    pub hit: bool,
    /// True during the frame in which a hit was consumed.
    pub hit_this_frame: bool,
    last_seen_position: Option<Vec2>,
    search_started_at: Option<Millis>,
    attack_cooldown_until: Millis,
    invulnerable_until: Option<Millis>,
    next_wander_at: Millis,
    wander_goal: Option<Cell>,
    /// Last swing and the time until which it is shown.
    attack_hitbox: Option<(Rect, Millis)>,
}

impl Enemy {
    /// Spawns an enemy centred on `position`.
    ///
    /// `seed` drives the wander timing and goal choice, so two enemies built with
    /// the same seed behave identically.
    pub fn new(position: Vec2, config: EnemyConfig, seed: u64, now: Millis) -> Self {
        let mut enemy = Enemy {
            body: Body::new(position, config.width, config.height),
            health: config.max_health,
            config,
            rng: StdRng::seed_from_u64(seed),
            state: EnemyState::Idle,
            alive: true,
            hit: false,
            hit_this_frame: false,
            last_seen_position: None,
            search_started_at: None,
            attack_cooldown_until: 0,
            invulnerable_until: None,
            next_wander_at: now,
            wander_goal: None,
            attack_hitbox: None,
        };
        enemy.schedule_wander(now);
        enemy
    }

    #[inline]
    pub fn state(&self) -> EnemyState {
        self.state
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.body.position()
    }

    #[inline]
    pub fn collider(&self) -> Rect {
        self.body.collider()
    }

    pub fn config(&self) -> &EnemyConfig {
        &self.config
    }

    pub fn last_seen_position(&self) -> Option<Vec2> {
        self.last_seen_position
    }

    pub fn wander_goal(&self) -> Option<Cell> {
        self.wander_goal
    }

    pub fn is_invulnerable(&self, now: Millis) -> bool {
        self.invulnerable_until.is_some_and(|until| now <= until)
    }

    /// The most recent attack hitbox, while it is still meant to be shown.
    pub fn attack_hitbox(&self, now: Millis) -> Option<Rect> {
        self.attack_hitbox
            .and_then(|(rect, until)| (now <= until).then_some(rect))
    }

    /// Deals damage unless the enemy is dead or invulnerable.
    ///
    /// Returns whether the hit landed.
    pub fn take_hit(&mut self, damage: i32, now: Millis) -> bool {
        if !self.alive || self.is_invulnerable(now) {
            return false;
        }
        self.health -= damage;
        self.hit = true;
        true
    }

    /// Advances the enemy by one frame.
    ///
    /// Senses the player, runs the state machine and moves. Returns the attack
    /// started this frame, if any; damage is meant to be applied exactly once,
    /// from this value.
    pub fn update(
        &mut self,
        player: &Rect,
        obstacles: &[Rect],
        map: &GridMap,
        now: Millis,
        dt_ms: u32,
    ) -> Option<Attack> {
        if self.state == EnemyState::Dead {
            return None;
        }
        if self.health <= 0 {
            self.die();
            return None;
        }

        self.hit_this_frame = false;
        if self.hit {
            self.hit = false;
            self.hit_this_frame = true;
            self.invulnerable_until = Some(now + self.config.hurt_ms);
            self.transition(EnemyState::Hurt);
        } else if self.invulnerable_until.is_some_and(|until| now > until) {
            self.invulnerable_until = None;
            if self.state == EnemyState::Hurt {
                // a search cut short by the hit is abandoned
                self.last_seen_position = None;
                self.search_started_at = None;
                self.transition(EnemyState::Idle);
            }
        }

        let (px, py) = player.center();
        let player_center = Vec2::new(px as f32, py as f32);
        let (ex, ey) = self.body.rounded_center();
        let distance2 = player_center.distance_squared(Vec2::new(ex as f32, ey as f32));

        let sees_player = self.senses(map, distance2, map.cell_at_point(px, py));
        if sees_player {
            self.last_seen_position = Some(player_center);
            self.search_started_at = None;
        }

        match self.state {
            EnemyState::Idle | EnemyState::Hurt => {
                if sees_player {
                    self.transition(EnemyState::Chase);
                } else {
                    self.wander(map, obstacles, now, dt_ms);
                }
            }
            EnemyState::Chase => {
                self.wander_goal = None;
                if sees_player {
                    self.body
                        .move_towards(player_center, obstacles, dt_ms, self.config.speed);

                    let range = self.config.attack_range;
                    if now >= self.attack_cooldown_until && distance2 <= range * range {
                        return Some(self.start_attack(player_center, now));
                    }
                } else if self.last_seen_position.is_some() {
                    self.transition(EnemyState::Search);
                    self.search_started_at = Some(now);
                } else {
                    self.transition(EnemyState::Idle);
                }
            }
            EnemyState::Search => {
                if sees_player {
                    self.transition(EnemyState::Chase);
                } else if let Some(target) = self.last_seen_position {
                    self.search(target, map, obstacles, now, dt_ms);
                } else {
                    self.transition(EnemyState::Idle);
                }
            }
            EnemyState::Attack => {
                if sees_player {
                    self.transition(EnemyState::Chase);
                } else {
                    self.transition(EnemyState::Idle);
                }
            }
            EnemyState::Dead => {}
        }

        None
    }

    /// Nudges this enemy away from the given neighbour positions.
    pub fn apply_separation(&mut self, neighbours: &[Vec2], config: &SeparationConfig) {
        if self.alive {
            self.body.apply_separation(neighbours, config);
        }
    }

    /// Draws the collider in the state colour, plus the attack hitbox while live.
    pub fn draw(&self, canvas: &mut impl Canvas, camera: &impl Camera, now: Millis) {
        canvas.fill_rect(camera.apply(self.collider()), self.state.color());
        if let Some(hitbox) = self.attack_hitbox(now) {
            canvas.blend_rect(camera.apply(hitbox), HITBOX_COLOR);
        }
    }

    fn transition(&mut self, next: EnemyState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, position = ?self.body.position(), "enemy state change");
            self.state = next;
        }
    }

    fn die(&mut self) {
        self.transition(EnemyState::Dead);
        self.alive = false;
        self.wander_goal = None;
        self.attack_hitbox = None;
    }

    /// Player within the detection radius and on an unobstructed grid line.
    fn senses(&self, map: &GridMap, distance2: f32, player_cell: Cell) -> bool {
        let radius = self.config.detection_radius;
        if distance2 > radius * radius {
            return false;
        }
        let own = map.cell_at(self.body.position());
        has_los(map, own.x, own.y, player_cell.x, player_cell.y)
    }

    fn start_attack(&mut self, target: Vec2, now: Millis) -> Attack {
        self.transition(EnemyState::Attack);
        self.attack_cooldown_until = now + self.config.attack_cooldown_ms;
        let hitbox = self.swing_towards(target);
        self.attack_hitbox = Some((hitbox, now + self.config.attack_hitbox_ms));
        Attack {
            hitbox,
            damage: self.config.attack_damage,
        }
    }

    /// A collider-sized box next to the enemy on the side facing `target`.
    fn swing_towards(&self, target: Vec2) -> Rect {
        let rect = self.body.collider();
        let (cx, cy) = rect.center();
        let dx = target.x - cx as f32;
        let dy = target.y - cy as f32;

        if dx.abs() >= dy.abs() {
            let x = if dx >= 0.0 { rect.x + rect.w } else { rect.x - rect.w };
            Rect::new(x, rect.y, rect.w, rect.h)
        } else {
            let y = if dy >= 0.0 { rect.y + rect.h } else { rect.y - rect.h };
            Rect::new(rect.x, y, rect.w, rect.h)
        }
    }

    fn search(&mut self, target: Vec2, map: &GridMap, obstacles: &[Rect], now: Millis, dt_ms: u32) {
        let speed = self.config.speed;
        let start = map.cell_at(self.body.position());
        let goal = map.cell_at(target);

        match next_step_astar(map, start, goal, self.config.astar_max_expansions) {
            Some(step) => {
                self.body
                    .move_towards(map.center_of(step), obstacles, dt_ms, speed);
            }
            None => {
                trace!(?start, ?goal, "no path step, steering straight at last seen position");
                self.body.move_towards(target, obstacles, dt_ms, speed);
            }
        }

        let arrived =
            self.body.position().distance_squared(target) <= ARRIVE_DISTANCE * ARRIVE_DISTANCE;
        let timed_out = self
            .search_started_at
            .is_some_and(|started| now.saturating_sub(started) > self.config.lose_sight_ms);

        if arrived || timed_out {
            debug!(arrived, timed_out, "giving up search");
            self.transition(EnemyState::Idle);
            self.last_seen_position = None;
            self.search_started_at = None;
        }
    }

    /// Short, infrequent moves between nearby free tiles.
    fn wander(&mut self, map: &GridMap, obstacles: &[Rect], now: Millis, dt_ms: u32) {
        let here = map.cell_at(self.body.position());

        if let Some(goal) = self.wander_goal {
            let speed = self.config.speed;
            let done = if here == goal {
                self.body
                    .move_towards(map.center_of(goal), obstacles, dt_ms, speed)
            } else {
                match next_step_bfs(map, here, goal, self.config.wander_max_depth) {
                    Some(step) => {
                        self.body
                            .move_towards(map.center_of(step), obstacles, dt_ms, speed);
                        false
                    }
                    None => {
                        trace!(?here, ?goal, "wander goal unreachable");
                        true
                    }
                }
            };
            if done {
                self.wander_goal = None;
                self.schedule_wander(now);
            }
        } else if now >= self.next_wander_at {
            match self.pick_wander_goal(map, here) {
                Some(goal) if goal != here => self.wander_goal = Some(goal),
                _ => self.schedule_wander(now),
            }
        }
    }

    /// Tries a bounded number of random cells around `center` and returns the first free one.
    fn pick_wander_goal(&mut self, map: &GridMap, center: Cell) -> Option<Cell> {
        let radius = self.config.wander_radius;
        for _ in 0..self.config.wander_attempts {
            let candidate = center.offset(
                self.rng.random_range(-radius..=radius),
                self.rng.random_range(-radius..=radius),
            );
            if !map.is_cell_blocked(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn schedule_wander(&mut self, now: Millis) {
        let (low, high) = self.config.wander_interval_ms;
        let wait = if low < high {
            self.rng.random_range(low..=high)
        } else {
            low
        };
        self.next_wander_at = now + wait;
    }
}
