//! App: terminal init, main loop, tick, key and mouse handling.

use crate::Args;
use crate::input::{Action, key_to_action};
use crate::sim::{RandDice, Simulation, StepReport};
use crate::theme::Theme;
use crate::ui::{self, View};
use anyhow::{Result, ensure};
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};

/// Delay before a held key starts repeating.
const REPEAT_DELAY_MS: u64 = 170;
/// Time between repeats while holding. 50 ms ≈ 20 moves/sec.
const REPEAT_INTERVAL_MS: u64 = 50;

pub struct App {
    args: Args,
    theme: Theme,
    sim: Simulation,
    paused: bool,
    last_tick: Instant,
    tick_interval: Duration,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    /// Drop column for keyboard spawns.
    cursor: usize,
    /// Held mouse button and the column under the pointer.
    pointer: Option<(MouseButton, usize)>,
    /// Board rect from the last frame, for mapping mouse columns.
    board: Rect,
    report: StepReport,
}

fn build_sim(args: &Args, width: usize, height: usize) -> Result<Simulation> {
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Ok(Simulation::new(args.sim_config(width, height), RandDice(rng))?)
}

/// Grid column under a terminal position, if the position is on the board.
fn column_at(board: Rect, col: u16, row: u16) -> Option<usize> {
    let inside = col >= board.x
        && col < board.x + board.width
        && row >= board.y
        && row < board.y + board.height;
    inside.then(|| usize::from(col - board.x))
}

impl App {
    pub fn new(args: Args, theme: Theme) -> Result<Self> {
        ensure!(
            usize::from(args.colors) <= theme.sand.len(),
            "{} colours requested but the palette has only {}",
            args.colors,
            theme.sand.len()
        );
        ensure!(
            args.tick_rate.is_finite() && args.tick_rate > 0.0,
            "tick rate must be positive, got {}",
            args.tick_rate
        );
        let sim = build_sim(&args, args.width, args.height)?;
        let tick_interval = Duration::from_secs_f64(1.0 / args.tick_rate);
        Ok(Self {
            cursor: args.width / 2,
            args,
            theme,
            sim,
            paused: false,
            last_tick: Instant::now(),
            tick_interval,
            repeat_state: None,
            last_repeat_fire: None,
            pointer: None,
            board: Rect::default(),
            report: StepReport::default(),
        })
    }

    /// Canvas x of the centre of column `cx`.
    fn pixel_x(&self, cx: usize) -> f32 {
        (cx as f32 + 0.5) * self.sim.config().cell_size
    }

    fn reset(&mut self) {
        self.sim.reset();
        self.paused = false;
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.pointer = None;
        self.report = StepReport::default();
        log::info!("simulation reset");
    }

    fn apply_action(&mut self, action: Action, now: Instant) {
        let width = self.sim.grid().dims().0;
        match action {
            Action::MoveLeft => {
                self.cursor = self.cursor.saturating_sub(1);
                self.sim.move_left();
            }
            Action::MoveRight => {
                self.cursor = (self.cursor + 1).min(width.saturating_sub(1));
                self.sim.move_right();
            }
            Action::DropPiece => {
                let x = self.pixel_x(self.cursor);
                self.sim.spawn_piece(x, now);
            }
            Action::DropGrain => {
                let x = self.pixel_x(self.cursor);
                self.sim.spawn_grain(x);
            }
            Action::Reset => self.reset(),
            Action::Pause | Action::Quit | Action::None => {}
        }
    }

    fn tick_repeat(&mut self, now: Instant) {
        let Some((action, first)) = self.repeat_state else {
            return;
        };
        if now.saturating_duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next =
            self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action, now);
            self.last_repeat_fire = Some(now);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
                PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode, size,
            },
        };

        // Fit the grid to the terminal; respect --width/--height when they fit.
        let (term_cols, term_rows) = size()?;
        let (fit_w, fit_h) = ui::max_grid_for_terminal(term_cols, term_rows);
        let width = self.args.width.min(fit_w);
        let height = self.args.height.min(fit_h);
        if (width, height) != self.sim.grid().dims() {
            log::info!(
                "grid clamped to {width}x{height} (requested {}x{})",
                self.args.width,
                self.args.height
            );
            self.sim = build_sim(&self.args, width, height)?;
            self.cursor = width / 2;
        }

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        // Key release events let held keys stop repeating; not every terminal has them.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        let stats = self.sim.stats();
        log::info!(
            "exit after {} ticks: {} spawned, {} cleared in {} bridges",
            stats.ticks,
            stats.spawned,
            stats.cleared,
            stats.bridges
        );
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_millis(16);
        loop {
            let frame_start = Instant::now();
            let view = View {
                sim: &self.sim,
                theme: &self.theme,
                paused: self.paused,
                cursor: self.cursor,
                report: self.report,
                auto_drop: self.args.auto_drop,
            };
            let mut board = self.board;
            terminal.draw(|f| board = ui::draw(f, &view))?;
            self.board = board;

            let timeout = frame_duration.saturating_sub(frame_start.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if self.handle_event(event::read()?) {
                        return Ok(());
                    }
                }
            }

            if self.paused {
                continue;
            }
            let now = Instant::now();
            self.tick_repeat(now);
            if now.saturating_duration_since(self.last_tick) >= self.tick_interval {
                self.last_tick = now;
                self.pour(now);
                self.report = self.sim.advance(now);
            }
        }
    }

    /// Spawns driven by held mouse buttons and auto-drop. Runs once per tick.
    fn pour(&mut self, now: Instant) {
        if let Some((button, cx)) = self.pointer {
            let x = self.pixel_x(cx);
            match button {
                MouseButton::Left => {
                    self.sim.spawn_piece(x, now);
                }
                MouseButton::Right => {
                    self.sim.spawn_grain(x);
                }
                MouseButton::Middle => {}
            }
        }
        if self.args.auto_drop && !self.sim.has_control() {
            let cx = self.sim.random_column();
            let x = self.pixel_x(cx);
            self.sim.spawn_piece(x, now);
        }
    }

    /// Returns true when the app should exit.
    fn handle_event(&mut self, ev: Event) -> bool {
        match ev {
            Event::Key(key) => {
                let action = key_to_action(key);
                // Only the first press counts; the app does its own repeat.
                if key.kind != KeyEventKind::Press {
                    if key.kind == KeyEventKind::Release
                        && self.repeat_state.map(|(a, _)| a) == Some(action)
                    {
                        self.repeat_state = None;
                        self.last_repeat_fire = None;
                    }
                    return false;
                }
                if self.repeat_state.map(|(a, _)| a) == Some(action) {
                    return false;
                }
                match action {
                    Action::Quit => return true,
                    Action::Pause => {
                        self.paused = !self.paused;
                        self.repeat_state = None;
                    }
                    _ if self.paused => {}
                    _ => {
                        let now = Instant::now();
                        self.apply_action(action, now);
                        if action.repeats() {
                            self.repeat_state = Some((action, now));
                            self.last_repeat_fire = None;
                        }
                    }
                }
            }
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
        false
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let column = column_at(self.board, mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(button) | MouseEventKind::Drag(button) => {
                if let Some(cx) = column {
                    self.cursor = cx;
                    self.pointer = Some((button, cx));
                }
            }
            MouseEventKind::Up(_) => self.pointer = None,
            MouseEventKind::Moved => {
                if let Some(cx) = column {
                    self.cursor = cx;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn app(extra: &[&str]) -> App {
        let mut argv = vec!["sandbridge", "--width", "20", "--height", "16", "--seed", "7"];
        argv.extend_from_slice(extra);
        App::new(Args::parse_from(argv), Theme::default()).unwrap()
    }

    #[test]
    fn test_column_at_board_only() {
        let board = Rect {
            x: 5,
            y: 2,
            width: 10,
            height: 4,
        };
        assert_eq!(column_at(board, 5, 2), Some(0));
        assert_eq!(column_at(board, 14, 5), Some(9));
        assert_eq!(column_at(board, 15, 3), None);
        assert_eq!(column_at(board, 7, 1), None);
    }

    #[test]
    fn test_rejects_too_many_colours() {
        let args = Args::parse_from(["sandbridge", "--palette", "desert", "--colors", "6"]);
        assert!(App::new(args, Theme::load(None, crate::Palette::Desert).unwrap()).is_err());
    }

    #[test]
    fn test_rejects_bad_tick_rate() {
        let args = Args::parse_from(["sandbridge", "--tick-rate", "0"]);
        assert!(App::new(args, Theme::default()).is_err());
    }

    #[test]
    fn test_cursor_clamped_and_drops_at_cursor() {
        let mut a = app(&[]);
        let now = Instant::now();
        for _ in 0..30 {
            a.apply_action(Action::MoveRight, now);
        }
        assert_eq!(a.cursor, 19);
        for _ in 0..30 {
            a.apply_action(Action::MoveLeft, now);
        }
        assert_eq!(a.cursor, 0);
        a.apply_action(Action::DropGrain, now);
        let g: Vec<_> = a.sim.grains().collect();
        assert_eq!(g.len(), 1);
        assert_eq!(a.sim.grid().cell_at(g[0].x, g[0].y).map(|c| c.cx), Some(0));
    }

    #[test]
    fn test_pause_blocks_actions() {
        let mut a = app(&[]);
        let key = |c| Event::Key(crossterm::event::KeyEvent::new(
            crossterm::event::KeyCode::Char(c),
            crossterm::event::KeyModifiers::NONE,
        ));
        assert!(!a.handle_event(key('p')));
        assert!(a.paused);
        a.handle_event(key('g'));
        assert_eq!(a.sim.grains().count(), 0);
        a.handle_event(key('p'));
        a.handle_event(key('g'));
        assert_eq!(a.sim.grains().count(), 1);
        assert!(a.handle_event(key('q')));
    }

    #[test]
    fn test_right_button_pours_grains() {
        let mut a = app(&[]);
        a.board = Rect {
            x: 1,
            y: 1,
            width: 20,
            height: 8,
        };
        a.handle_mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Right),
            column: 4,
            row: 3,
            modifiers: crossterm::event::KeyModifiers::NONE,
        });
        assert_eq!(a.pointer, Some((MouseButton::Right, 3)));
        let now = Instant::now();
        a.pour(now);
        a.sim.advance(now);
        a.pour(now);
        assert_eq!(a.sim.grains().count(), 2);
        a.handle_mouse(MouseEvent {
            kind: MouseEventKind::Up(MouseButton::Right),
            column: 4,
            row: 3,
            modifiers: crossterm::event::KeyModifiers::NONE,
        });
        assert_eq!(a.pointer, None);
    }

    #[test]
    fn test_seeded_auto_drop_repeats() {
        let cells = |a: &App| {
            let mut v: Vec<_> = a
                .sim
                .grains()
                .filter_map(|g| a.sim.grid().cell_at(g.x, g.y))
                .collect();
            v.sort();
            v
        };
        let mut a = app(&["--auto-drop", "--piece-size", "3"]);
        let mut b = app(&["--auto-drop", "--piece-size", "3"]);
        let now = Instant::now();
        a.pour(now);
        b.pour(now);
        assert!(!cells(&a).is_empty());
        assert_eq!(cells(&a), cells(&b));
        let colour = |a: &App| a.sim.grains().next().map(|g| g.color);
        assert_eq!(colour(&a), colour(&b));
    }

    #[test]
    fn test_auto_drop_spawns_piece() {
        let mut a = app(&["--auto-drop", "--piece-size", "3"]);
        a.pour(Instant::now());
        // Edge columns clip the block.
        let n = a.sim.grains().count();
        assert!(n > 0 && n <= 9, "{n} grains");
        assert!(a.sim.has_control());
    }
}
