use glam::Vec2;
use tracing::{debug, info};

use crate::{
    Millis, Rect,
    config::{ConfigError, GameConfig},
    draw::{Camera, Canvas, HITBOX_COLOR, Rgb},
    enemy::Enemy,
    map::{GridMap, TileKind},
    player::{Facing, Player},
    room::{Room, Spawn},
};

const FLOOR_COLOR: Rgb = Rgb(25, 25, 25);
const WALL_COLOR: Rgb = Rgb(80, 80, 80);
const DOOR_CLOSED_COLOR: Rgb = Rgb(150, 50, 50);
const DOOR_OPEN_COLOR: Rgb = Rgb(50, 150, 50);
const PLAYER_COLOR: Rgb = Rgb(255, 255, 255);
const PLAYER_ATTACK_COLOR: Rgb = Rgb(255, 0, 0);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("A world needs at least one room")]
    NoRooms,
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// A door tile. Closed doors block movement; all doors open once the room is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Door {
    pub rect: Rect,
    pub open: bool,
}

/// Something that happened during a frame, for hosts that react to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    EnemyHurt { at: (i32, i32) },
    EnemyKilled { at: (i32, i32) },
    PlayerHit { damage: i32, health: i32 },
    PlayerDied,
    RoomCleared { room: usize },
    RoomEntered { room: usize },
}

/// Owns everything in play: the current room's map and obstacles, the enemies and the player.
pub struct World {
    config: GameConfig,
    rooms: Vec<Room>,
    current: usize,
    map: GridMap,
    /// Wall rectangles of the current room, doors excluded.
    walls: Vec<Rect>,
    /// Walls plus closed doors; read-only during enemy updates.
    obstacles: Vec<Rect>,
    doors: Vec<Door>,
    enemies: Vec<Enemy>,
    player: Player,
    cleared: bool,
    spawned: u64,
}

impl World {
    /// Creates a world and loads the first room.
    pub fn new(rooms: Vec<Room>, config: GameConfig) -> Result<World, WorldError> {
        config.validate()?;
        let Some(first) = rooms.first() else {
            return Err(WorldError::NoRooms);
        };
        let map = first.grid_map(config.tile_size);
        let player = Player::new((0, 0), config.player.clone());

        let mut world = World {
            config,
            rooms,
            current: 0,
            map,
            walls: Vec::new(),
            obstacles: Vec::new(),
            doors: Vec::new(),
            enemies: Vec::new(),
            player,
            cleared: false,
            spawned: 0,
        };
        world.load_room(0, 0);
        Ok(world)
    }

    pub fn map(&self) -> &GridMap {
        &self.map
    }

    pub fn obstacles(&self) -> &[Rect] {
        &self.obstacles
    }

    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    /// Mutable access for combat collaborators.
    pub fn enemies_mut(&mut self) -> &mut [Enemy] {
        &mut self.enemies
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn room_index(&self) -> usize {
        self.current
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Steps the player by `(dx, dy)` movement units against the current obstacles.
    pub fn move_player(&mut self, dx: i32, dy: i32) {
        self.player.step(dx, dy, &self.obstacles);
    }

    /// Player swing; returns how many enemies it hit.
    pub fn player_attack(&mut self, facing: Facing, now: Millis) -> usize {
        self.player.attack(facing, &mut self.enemies, now)
    }

    /// Runs one frame.
    pub fn update(&mut self, now: Millis, dt_ms: u32) -> Vec<WorldEvent> {
        let mut events = Vec::new();
        if !self.player.alive {
            return events;
        }

        let player_rect = self.player.collider;
        for enemy in &mut self.enemies {
            let attack = enemy.update(&player_rect, &self.obstacles, &self.map, now, dt_ms);
            if enemy.hit_this_frame {
                events.push(WorldEvent::EnemyHurt {
                    at: enemy.collider().center(),
                });
            }
            if let Some(attack) = attack {
                if attack.hitbox.intersects(&self.player.collider) {
                    self.player.take_damage(attack.damage);
                    events.push(WorldEvent::PlayerHit {
                        damage: attack.damage,
                        health: self.player.health,
                    });
                }
            }
        }

        // Cross-enemy effects wait until every enemy has moved.
        let positions: Vec<Vec2> = self
            .enemies
            .iter()
            .filter(|enemy| enemy.alive)
            .map(Enemy::position)
            .collect();
        for enemy in &mut self.enemies {
            enemy.apply_separation(&positions, &self.config.separation);
        }

        self.enemies.retain(|enemy| {
            if !enemy.alive {
                events.push(WorldEvent::EnemyKilled {
                    at: enemy.collider().center(),
                });
            }
            enemy.alive
        });

        if !self.player.alive {
            info!(room = self.current, "player died");
            events.push(WorldEvent::PlayerDied);
            return events;
        }

        if self.enemies.is_empty() && !self.cleared {
            info!(room = self.current, "room cleared");
            self.cleared = true;
            for door in &mut self.doors {
                door.open = true;
            }
            self.rebuild_obstacles();
            events.push(WorldEvent::RoomCleared { room: self.current });
        }

        if self.cleared
            && self
                .doors
                .iter()
                .any(|door| door.open && door.rect.intersects(&self.player.collider))
        {
            let next = (self.current + 1) % self.rooms.len();
            self.load_room(next, now);
            events.push(WorldEvent::RoomEntered { room: next });
        }

        events
    }

    /// Draws tiles, doors, enemies and the player.
    pub fn draw(&self, canvas: &mut impl Canvas, camera: &impl Camera, now: Millis) {
        for gy in 0..self.map.rows() as i32 {
            for gx in 0..self.map.cols() as i32 {
                let color = match self.map.tile(gx, gy) {
                    Some(TileKind::Floor) => FLOOR_COLOR,
                    _ => WALL_COLOR,
                };
                canvas.fill_rect(camera.apply(self.map.tile_rect(gx, gy)), color);
            }
        }

        for door in &self.doors {
            let color = if door.open {
                DOOR_OPEN_COLOR
            } else {
                DOOR_CLOSED_COLOR
            };
            canvas.fill_rect(camera.apply(door.rect), color);
        }

        for enemy in &self.enemies {
            enemy.draw(canvas, camera, now);
        }

        let swing = self.player.swing(now);
        let color = if swing.is_some() {
            PLAYER_ATTACK_COLOR
        } else {
            PLAYER_COLOR
        };
        canvas.fill_rect(camera.apply(self.player.collider), color);
        if let Some(swing) = swing {
            canvas.blend_rect(camera.apply(swing), HITBOX_COLOR);
        }
    }

    fn load_room(&mut self, index: usize, now: Millis) {
        let room = &self.rooms[index];
        let map = room.grid_map(self.config.tile_size);

        self.doors = room
            .spawns_of(Spawn::Door)
            .map(|cell| Door {
                rect: map.tile_rect(cell.x, cell.y),
                open: false,
            })
            .collect();
        let door_rects: Vec<Rect> = self.doors.iter().map(|door| door.rect).collect();
        self.walls = map
            .wall_rects()
            .into_iter()
            .filter(|rect| !door_rects.contains(rect))
            .collect();

        let mut enemies = Vec::new();
        for cell in room.spawns_of(Spawn::Enemy) {
            let seed = self.config.seed.wrapping_add(self.spawned);
            self.spawned += 1;
            enemies.push(Enemy::new(
                map.center_of(cell),
                self.config.enemy.clone(),
                seed,
                now,
            ));
        }
        self.enemies = enemies;

        let start = map.center_of(room.player_start());
        self.player.teleport((start.x as i32, start.y as i32));

        self.map = map;
        self.current = index;
        self.cleared = false;
        self.rebuild_obstacles();

        info!(
            room = index,
            enemies = self.enemies.len(),
            doors = self.doors.len(),
            "entered room"
        );
    }

    fn rebuild_obstacles(&mut self) {
        self.obstacles.clear();
        self.obstacles.extend_from_slice(&self.walls);
        self.obstacles
            .extend(self.doors.iter().filter(|door| !door.open).map(|door| door.rect));
        debug!(obstacles = self.obstacles.len(), "rebuilt obstacles");
    }
}
