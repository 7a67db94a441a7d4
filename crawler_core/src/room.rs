//! Text room layouts.
//!
//! `#` wall, `.` floor, `E` enemy spawn, `D` door, `@` player start.

use crate::{
    Cell,
    map::{Grid, GridMap, TileKind},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room layout is empty")]
    Empty,
    #[error("Unknown room character '{ch}' at ({x}, {y})")]
    UnknownCharacter { ch: char, x: usize, y: usize },
    #[error("Multiple player starts ('@') in room")]
    MultipleStarts,
    #[error("Room has no floor tile to start on")]
    NoFloor,
}

/// What a room places on a tile when it is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spawn {
    Enemy,
    Door,
}

/// A parsed room: terrain plus spawn markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    terrain: Grid<TileKind>,
    spawns: Vec<(Cell, Spawn)>,
    player_start: Cell,
}

impl Room {
    /// Parses a room from its text rows. Rows shorter than the widest one are padded with floor.
    pub fn parse(layout: &str) -> Result<Room, RoomError> {
        let lines: Vec<&str> = layout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(RoomError::Empty);
        }

        let width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let mut kinds = vec![TileKind::Floor; width * lines.len()];
        let mut spawns = Vec::new();
        let mut player_start: Option<Cell> = None;

        for (y, line) in lines.iter().enumerate() {
            for (x, ch) in line.chars().enumerate() {
                let cell = Cell::new(x as i32, y as i32);
                let kind = match ch {
                    '#' => TileKind::Wall,
                    '.' => TileKind::Floor,
                    'E' => {
                        spawns.push((cell, Spawn::Enemy));
                        TileKind::Floor
                    }
                    'D' => {
                        spawns.push((cell, Spawn::Door));
                        TileKind::Floor
                    }
                    '@' => {
                        if player_start.is_some() {
                            return Err(RoomError::MultipleStarts);
                        }
                        player_start = Some(cell);
                        TileKind::Floor
                    }
                    ch => return Err(RoomError::UnknownCharacter { ch, x, y }),
                };
                kinds[y * width + x] = kind;
            }
        }

        let terrain = Grid::from_generator(width, lines.len(), |x, y| kinds[y * width + x]);
        let player_start = match player_start {
            Some(cell) => cell,
            None => terrain
                .enumerate()
                .find(|(cell, kind)| {
                    **kind == TileKind::Floor && !spawns.iter().any(|(spawn, _)| spawn == cell)
                })
                .map(|(cell, _)| cell)
                .ok_or(RoomError::NoFloor)?,
        };

        Ok(Room {
            terrain,
            spawns,
            player_start,
        })
    }

    pub fn spawns(&self) -> &[(Cell, Spawn)] {
        &self.spawns
    }

    pub fn spawns_of(&self, kind: Spawn) -> impl Iterator<Item = Cell> + '_ {
        self.spawns
            .iter()
            .filter(move |(_, spawn)| *spawn == kind)
            .map(|(cell, _)| *cell)
    }

    pub fn player_start(&self) -> Cell {
        self.player_start
    }

    /// Builds the pathing map for this room.
    ///
    /// Door tiles are walls for pathing: enemies never leave a room, and a closed
    /// door must not attract wander goals.
    pub fn grid_map(&self, tile_size: i32) -> GridMap {
        let tiles = Grid::from_generator(self.terrain.width(), self.terrain.height(), |x, y| {
            let cell = Cell::new(x as i32, y as i32);
            if self.spawns.contains(&(cell, Spawn::Door)) {
                TileKind::Wall
            } else {
                self.terrain[cell]
            }
        });
        GridMap::new(tiles, tile_size)
    }
}

/// Splits a text file into rooms on blank lines and parses each one.
pub fn parse_rooms(text: &str) -> Result<Vec<Room>, RoomError> {
    let mut rooms = Vec::new();
    let mut block = String::new();
    for line in text.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                rooms.push(Room::parse(&block)?);
                block.clear();
            }
        } else {
            block.push_str(line);
            block.push('\n');
        }
    }
    if rooms.is_empty() {
        return Err(RoomError::Empty);
    }
    Ok(rooms)
}

const DEMO_ROOMS: &str = "\
###################D##############
#....E...........................#
#..###......###..................#
#..#...@....#....................#
#..###..E...###..................#
D................................D
#................................#
#...........######...............#
#................E...............#
#................................#
#................................#
#################D################

########################
#D...............E.....#
#..######..............#
#..#....#..............#
#..#....#....@.........#
#..######.....E........#
########################

########################
#@...E...............D.#
#..###......###........#
#..#........#..........#
#..###......###...E....#
#......................#
########################
";

/// The built-in room sequence.
pub fn demo_rooms() -> Vec<Room> {
    parse_rooms(DEMO_ROOMS).expect("built-in rooms are valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_terrain_and_spawns() {
        let room = Room::parse("#####\n#@.E#\n#D###").expect("valid room");
        let map = room.grid_map(32);
        assert_eq!(map.cols(), 5);
        assert_eq!(map.rows(), 3);
        assert_eq!(room.player_start(), Cell::new(1, 1));
        assert_eq!(
            room.spawns(),
            &[(Cell::new(3, 1), Spawn::Enemy), (Cell::new(1, 2), Spawn::Door)]
        );
        assert!(!map.is_blocked(3, 1));
        assert!(map.is_blocked(1, 2), "doors are walls for pathing");
    }

    #[test]
    fn ragged_rows_are_padded_with_floor() {
        let room = Room::parse("####\n#.\n####").expect("valid room");
        let map = room.grid_map(32);
        assert_eq!(map.cols(), 4);
        assert!(!map.is_blocked(3, 1));
    }

    #[test]
    fn start_defaults_to_first_free_floor() {
        let room = Room::parse("###\n#E.\n###").expect("valid room");
        assert_eq!(room.player_start(), Cell::new(2, 1));
    }

    #[test]
    fn rejects_bad_layouts() {
        assert_eq!(Room::parse("\n\n"), Err(RoomError::Empty));
        assert_eq!(
            Room::parse("##\n#x"),
            Err(RoomError::UnknownCharacter { ch: 'x', x: 1, y: 1 })
        );
        assert_eq!(Room::parse("@@"), Err(RoomError::MultipleStarts));
        assert_eq!(Room::parse("##\n##"), Err(RoomError::NoFloor));
    }

    #[test]
    fn splits_rooms_on_blank_lines() {
        let rooms = parse_rooms("###\n#.#\n###\n\n\n####\n#..#\n####\n").expect("valid rooms");
        assert_eq!(rooms.len(), 2);
        assert_eq!(parse_rooms("  \n"), Err(RoomError::Empty));
    }

    #[test]
    fn demo_rooms_parse() {
        let rooms = demo_rooms();
        assert_eq!(rooms.len(), 3);
        for room in &rooms {
            assert!(room.spawns_of(Spawn::Enemy).count() > 0);
            assert!(room.spawns_of(Spawn::Door).count() > 0);
        }
    }
}
