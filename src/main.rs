//! sandbridge: falling-sand simulator in the terminal. Grains pile up and slide;
//! a single colour reaching from the left wall to the right wall is cleared.

mod app;
mod input;
mod sim;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use sim::SimConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let mut app = App::new(args, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal owns stdout/stderr, so logs only go to a file when one is requested.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

/// Falling-sand bridge puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "sandbridge",
    version,
    about = "Falling-sand simulator in the terminal. Drop blocks of coloured sand; a colour touching both walls is cleared.",
    long_about = "sandbridge simulates grains that fall, pile up and slide off steep slopes.\n\n\
        Drop square blocks of one colour and steer them while they fall. When grains of one \
        colour form a connected path (diagonals count) from the left wall to the right wall, \
        the path flashes and is removed.\n\n\
        CONTROLS:\n  Left/Right, h/l  Steer piece (or move the drop cursor)\n  Space/Enter/j   Drop a piece at the cursor\n  g                Drop a single grain\n  P Pause   R Reset   Q / Esc Quit\n\n\
        MOUSE:\n  Hold left button   Drop pieces at the pointer\n  Hold right button  Pour single grains"
)]
pub struct Args {
    /// Grid width in cells (clamped to what fits the terminal).
    #[arg(long, default_value = "60", value_name = "CELLS")]
    pub width: usize,

    /// Grid height in cells; two cells per terminal row (clamped to the terminal).
    #[arg(long, default_value = "80", value_name = "CELLS")]
    pub height: usize,

    /// Side length of one cell in canvas pixels.
    #[arg(long, default_value = "8.0", value_name = "PX")]
    pub cell_size: f32,

    /// Number of grain colours (at most the palette length).
    #[arg(short, long, default_value = "4", value_name = "N")]
    pub colors: u8,

    /// Probability that a grain on a steep slope slides each tick.
    #[arg(long, default_value = "0.95", value_name = "P")]
    pub slide_chance: f64,

    /// Empty drop beside a grain (in cells) before it slides toward it.
    #[arg(long, default_value = "2", value_name = "CELLS")]
    pub height_threshold: usize,

    /// Side of a dropped block, in cells.
    #[arg(long, default_value = "6", value_name = "CELLS")]
    pub piece_size: usize,

    /// Cells a piece moves per step input.
    #[arg(long, default_value = "1", value_name = "CELLS")]
    pub piece_step: usize,

    /// Flash time before a bridge is cleared.
    #[arg(long, default_value = "150", value_name = "MS")]
    pub flash_delay_ms: u64,

    /// Minimum time between two dropped pieces.
    #[arg(long, default_value = "500", value_name = "MS")]
    pub spawn_delay_ms: u64,

    /// Chance of a sideways drift while a grain is in free fall.
    #[arg(long, default_value = "0.02", value_name = "P")]
    pub jitter: f64,

    /// Dropped blocks are not steerable.
    #[arg(long)]
    pub no_piece_control: bool,

    /// Never clear wall-to-wall bridges (plain sandbox).
    #[arg(long)]
    pub no_bridge_clear: bool,

    /// Drop a new piece at a random column whenever the last one is out of control.
    #[arg(long)]
    pub auto_drop: bool,

    /// Simulation ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Seed for the simulation's random tie-breaks.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, colorblind or desert.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Write logs to this file (filter with RUST_LOG, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Engine configuration for a grid of `width x height` cells.
    pub fn sim_config(&self, width: usize, height: usize) -> SimConfig {
        SimConfig {
            cell_size: self.cell_size,
            width,
            height,
            colors: self.colors,
            slide_chance: self.slide_chance,
            height_threshold: self.height_threshold,
            piece_size: self.piece_size,
            piece_step: self.piece_step,
            flash_delay: Duration::from_millis(self.flash_delay_ms),
            spawn_delay: Duration::from_millis(self.spawn_delay_ms),
            jitter_chance: self.jitter,
            piece_control: !self.no_piece_control,
            bridge_clear: !self.no_bridge_clear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,

    #[value(alias = "sand")]
    Desert,
}
