use anyhow::{Context, Result};
use clap::Parser;
use crawler_core::{
    Millis, Rect as WorldRect,
    config::GameConfig,
    draw::{Camera, Canvas, Rgb, Rgba},
    player::Facing,
    room::{Room, demo_rooms, parse_rooms},
    world::{World, WorldEvent},
};
use ratatui::{
    crossterm::{
        self,
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::VecDeque,
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Messages kept in the event panel.
const EVENT_HISTORY: usize = 6;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Room file; rooms are separated by blank lines. Uses the built-in rooms when omitted.
    #[arg(short, long, value_name = "ROOM_FILE")]
    rooms: Option<PathBuf>,

    /// JSON file overriding any of the game constants
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Seed for enemy wandering; overrides the config file
    #[arg(short, long)]
    seed: Option<u64>,

    /// Milliseconds between simulation frames
    #[arg(short, long, default_value_t = 33)]
    tick_ms: u64,

    /// Where log output goes; the terminal is taken by the game
    #[arg(long, value_name = "LOG_FILE", default_value = "crawler.log")]
    log_file: PathBuf,
}

struct App {
    /// The simulation.
    world: World,
    /// Rooms and config, kept to restart after a death.
    rooms: Vec<Room>,
    config: GameConfig,
    /// Origin of the frame clock.
    start: Instant,
    /// Recent world events, newest last.
    events: VecDeque<String>,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(rooms: Vec<Room>, config: GameConfig) -> Result<Self> {
        let world = World::new(rooms.clone(), config.clone())?;
        Ok(App {
            world,
            rooms,
            config,
            start: Instant::now(),
            events: VecDeque::with_capacity(EVENT_HISTORY),
            should_quit: false,
        })
    }

    fn now(&self) -> Millis {
        self.start.elapsed().as_millis() as Millis
    }

    /// Runs one simulation frame.
    fn tick(&mut self, dt_ms: u32) {
        let now = self.now();
        for event in self.world.update(now, dt_ms) {
            self.push_event(describe(&event));
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('w') => self.world.move_player(0, -1),
            KeyCode::Char('s') => self.world.move_player(0, 1),
            KeyCode::Char('a') => self.world.move_player(-1, 0),
            KeyCode::Char('d') => self.world.move_player(1, 0),
            KeyCode::Up => self.attack(Facing::Up),
            KeyCode::Down => self.attack(Facing::Down),
            KeyCode::Left => self.attack(Facing::Left),
            KeyCode::Right => self.attack(Facing::Right),
            KeyCode::Char('r') if !self.world.player().alive => self.restart(),
            _ => {}
        }
    }

    fn attack(&mut self, facing: Facing) {
        let now = self.now();
        let hits = self.world.player_attack(facing, now);
        if hits > 0 {
            self.push_event(format!("Hit {hits} enemy(s)"));
        }
    }

    fn restart(&mut self) {
        match World::new(self.rooms.clone(), self.config.clone()) {
            Ok(world) => {
                info!("restarting");
                self.world = world;
                self.events.clear();
            }
            Err(err) => self.push_event(format!("Restart failed: {err}")),
        }
    }

    fn push_event(&mut self, message: String) {
        if self.events.len() == EVENT_HISTORY {
            self.events.pop_front();
        }
        self.events.push_back(message);
    }
}

fn describe(event: &WorldEvent) -> String {
    match event {
        WorldEvent::EnemyHurt { at } => format!("Enemy hurt at ({}, {})", at.0, at.1),
        WorldEvent::EnemyKilled { at } => format!("Enemy killed at ({}, {})", at.0, at.1),
        WorldEvent::PlayerHit { damage, health } => {
            format!("You take {damage} damage, {health} health left")
        }
        WorldEvent::PlayerDied => "You died. Press 'r' to restart.".to_string(),
        WorldEvent::RoomCleared { room } => format!("Room {} cleared, doors open", room + 1),
        WorldEvent::RoomEntered { room } => format!("Entered room {}", room + 1),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let rooms = match &args.rooms {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read room file {}", path.display()))?;
            parse_rooms(&text)
                .with_context(|| format!("Invalid room file {}", path.display()))?
        }
        None => demo_rooms(),
    };
    info!(rooms = rooms.len(), seed = config.seed, "starting");

    let mut app = App::new(rooms, config)?;

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms.max(1)));

    // Restore the terminal before reporting any error from the loop
    restore_terminal(&mut terminal)?;
    result
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to install logger: {err}"))
}

fn load_config(path: &Path) -> Result<GameConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_rate {
            app.tick(u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX));
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Maps world rectangles to terminal cells, one cell per tile.
struct TileCamera {
    tile_size: i32,
}

impl Camera for TileCamera {
    fn apply(&self, rect: WorldRect) -> WorldRect {
        let t = self.tile_size;
        if rect.w < t && rect.h < t {
            // bodies smaller than a tile take the cell under their centre
            let (cx, cy) = rect.center();
            return WorldRect::new(cx.div_euclid(t), cy.div_euclid(t), 1, 1);
        }
        let x0 = rect.x.div_euclid(t);
        let y0 = rect.y.div_euclid(t);
        let x1 = (rect.right() - 1).div_euclid(t);
        let y1 = (rect.bottom() - 1).div_euclid(t);
        WorldRect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
    }
}

/// Colour buffer the world draws into, one entry per terminal cell.
struct CellCanvas {
    width: i32,
    height: i32,
    cells: Vec<Rgb>,
}

impl CellCanvas {
    fn new(width: usize, height: usize) -> Self {
        CellCanvas {
            width: width as i32,
            height: height as i32,
            cells: vec![Rgb(0, 0, 0); width * height],
        }
    }

    fn cells_in(&self, rect: WorldRect) -> impl Iterator<Item = usize> + '_ {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.right().min(self.width);
        let y1 = rect.bottom().min(self.height);
        (y0..y1).flat_map(move |y| (x0..x1).map(move |x| (y * self.width + x) as usize))
    }

    fn lines(&self) -> Vec<Line<'static>> {
        self.cells
            .chunks(self.width.max(1) as usize)
            .map(|row| {
                Line::from(
                    row.iter()
                        .map(|Rgb(r, g, b)| {
                            Span::styled("  ", Style::default().bg(Color::Rgb(*r, *g, *b)))
                        })
                        .collect::<Vec<_>>(),
                )
            })
            .collect()
    }
}

impl Canvas for CellCanvas {
    fn fill_rect(&mut self, rect: WorldRect, color: Rgb) {
        let indices: Vec<usize> = self.cells_in(rect).collect();
        for index in indices {
            self.cells[index] = color;
        }
    }

    fn blend_rect(&mut self, rect: WorldRect, Rgba(r, g, b, a): Rgba) {
        let mix = |under: u8, over: u8| {
            ((under as u16 * (255 - a as u16) + over as u16 * a as u16) / 255) as u8
        };
        let indices: Vec<usize> = self.cells_in(rect).collect();
        for index in indices {
            let Rgb(ur, ug, ub) = self.cells[index];
            self.cells[index] = Rgb(mix(ur, r), mix(ug, g), mix(ub, b));
        }
    }
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),                           // Area for the map
            Constraint::Length(EVENT_HISTORY as u16 + 2), // Area for events
            Constraint::Length(2),                        // Area for status/help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], app);
    render_events(frame, main_layout[1], app);

    let player = app.world.player();
    let status = format!(
        "Health: {}  Room: {}/{}  Enemies: {}  |  WASD move, arrows attack, 'q' quits",
        player.health,
        app.world.room_index() + 1,
        app.world.room_count(),
        app.world.enemies().len(),
    );
    let help_text = Paragraph::new(status)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn render_events(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .events
        .iter()
        .map(|message| ListItem::new(message.as_str()))
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Events"));
    frame.render_widget(list, area);
}

/// Renders the current room onto the frame.
fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let map = app.world.map();
    let mut canvas = CellCanvas::new(map.cols(), map.rows());
    let camera = TileCamera {
        tile_size: map.tile_size(),
    };
    app.world.draw(&mut canvas, &camera, app.now());

    let title = format!("Room {}", app.world.room_index() + 1);
    let map_paragraph = Paragraph::new(canvas.lines())
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_maps_tiles_and_bodies_to_cells() {
        let camera = TileCamera { tile_size: 32 };
        assert_eq!(camera.apply(WorldRect::new(64, 32, 32, 32)), WorldRect::new(2, 1, 1, 1));
        // a 24px body straddling two tiles lands on its centre's tile
        assert_eq!(camera.apply(WorldRect::new(50, 36, 24, 24)), WorldRect::new(1, 1, 1, 1));
        assert_eq!(camera.apply(WorldRect::new(0, 0, 64, 32)), WorldRect::new(0, 0, 2, 1));
    }

    #[test]
    fn canvas_clips_and_blends() {
        let mut canvas = CellCanvas::new(2, 2);
        canvas.fill_rect(WorldRect::new(-1, -1, 2, 2), Rgb(200, 0, 0));
        assert_eq!(canvas.cells[0], Rgb(200, 0, 0));
        assert_eq!(canvas.cells[1], Rgb(0, 0, 0));

        canvas.blend_rect(WorldRect::new(0, 0, 1, 1), Rgba(0, 0, 255, 255));
        assert_eq!(canvas.cells[0], Rgb(0, 0, 255));
        canvas.blend_rect(WorldRect::new(1, 0, 1, 1), Rgba(0, 0, 0, 0));
        assert_eq!(canvas.cells[1], Rgb(0, 0, 0));
    }
}
