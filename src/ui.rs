//! Layout and drawing: playfield, sidebar (colours, counters, keys), pause overlay.

use crate::sim::{Simulation, StepReport};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

pub const SIDEBAR_WIDTH: u16 = 24;

/// Everything the renderer reads for one frame.
pub struct View<'a> {
    pub sim: &'a Simulation,
    pub theme: &'a Theme,
    pub paused: bool,
    /// Column where keyboard drops land.
    pub cursor: usize,
    pub report: StepReport,
    pub auto_drop: bool,
}

/// Playfield size in terminal cells (border included) for a grid of `w x h` cells.
/// Half-blocks (▀) put two grid rows in one terminal row.
fn playfield_term_size(w: usize, h: usize) -> (u16, u16) {
    (w as u16 + 2, h.div_ceil(2) as u16 + 2)
}

/// Largest grid (cells) whose playfield and sidebar fit in the terminal.
pub fn max_grid_for_terminal(term_cols: u16, term_rows: u16) -> (usize, usize) {
    let w = term_cols.saturating_sub(2).saturating_sub(SIDEBAR_WIDTH);
    let h = term_rows.saturating_sub(2);
    (w as usize, h as usize * 2)
}

/// Draw the frame. Returns the board rect (inside the border) so mouse columns can be
/// mapped back to grid cells.
pub fn draw(frame: &mut Frame, view: &View) -> Rect {
    let area = frame.area();
    let (w, h) = view.sim.grid().dims();
    let (pw, ph) = playfield_term_size(w, h);
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);

    let board = draw_playfield(frame, view, inner[0]);
    draw_sidebar(frame, view, inner[1]);
    if view.paused {
        draw_pause_overlay(frame, view.theme, area);
    }
    board
}

/// Slight per-cell brightness variation so a flat pile still reads as grains.
fn grain_shade(color: Color, cx: usize, cy: usize) -> Color {
    let Color::Rgb(r, g, b) = color else {
        return color;
    };
    let step = ((cx * 7 + cy * 13) % 5) as f32;
    let factor = 0.92 + step * 0.03;
    let scale = |c: u8| (f32::from(c) * factor).min(255.0) as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

fn draw_playfield(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let theme = view.theme;
    let title = if view.sim.removal_pending() {
        " sandbridge  BRIDGE! "
    } else {
        " sandbridge "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let grid = view.sim.grid();
    let (w, h) = grid.dims();
    let mut colors: Vec<Option<Color>> = vec![None; w * h];
    for g in view.sim.grains() {
        let Some(cell) = grid.cell_at(g.x, g.y) else {
            continue;
        };
        let color = if g.flagged {
            theme.flash
        } else {
            grain_shade(theme.sand_color(g.color), cell.cx, cell.cy)
        };
        colors[cell.cy * w + cell.cx] = Some(color);
    }

    let board = Rect {
        x: inner.x,
        y: inner.y,
        width: (w as u16).min(inner.width),
        height: (h.div_ceil(2) as u16).min(inner.height),
    };
    let at = |cx: usize, cy: usize| {
        if cy < h {
            colors[cy * w + cx].unwrap_or(theme.bg)
        } else {
            theme.bg
        }
    };

    let buf = frame.buffer_mut();
    for y in (0..h).step_by(2) {
        for x in 0..w {
            let rx = board.x + x as u16;
            let ry = board.y + (y / 2) as u16;
            if rx < board.x + board.width && ry < board.y + board.height {
                buf[(rx, ry)]
                    .set_symbol("▀")
                    .set_style(Style::default().fg(at(x, y)).bg(at(x, y + 1)));
            }
        }
    }

    // Drop cursor on the top border.
    if view.cursor < w && area.y < board.y {
        let rx = board.x + view.cursor as u16;
        if rx < board.x + board.width {
            buf[(rx, area.y)]
                .set_symbol("▼")
                .set_style(Style::default().fg(theme.title).bg(theme.bg));
        }
    }
    board
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let dim_style = Style::default().fg(theme.inactive_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Colours (border + title + strip)
            Constraint::Length(1), // gap
            Constraint::Length(9), // Stats
            Constraint::Length(1), // gap
            Constraint::Min(0),    // Keys
        ])
        .split(area);

    // --- Colours ---
    let colours_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let colours_inner = colours_block.inner(chunks[0]);
    colours_block.render(chunks[0], frame.buffer_mut());
    let colours_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(colours_inner);
    Paragraph::new(Line::from(Span::styled("Colours", title_style)))
        .render(colours_layout[0], frame.buffer_mut());
    draw_colour_strip(frame, view, colours_layout[1]);

    // --- Stats ---
    let stats = view.sim.stats();
    let piece = piece_status(view.sim);
    let pile = if view.report.moved { "moving" } else { "still" };
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats_lines = vec![
        stat("Grains:  ", view.sim.grid().len().to_string()),
        stat("Dropped: ", stats.spawned.to_string()),
        stat("Cleared: ", stats.cleared.to_string()),
        stat("Bridges: ", stats.bridges.to_string()),
        stat("Ticks:   ", stats.ticks.to_string()),
        stat("Piece:   ", piece),
        stat("Pile:    ", pile.to_string()),
    ];
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    Paragraph::new(ratatui::text::Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Keys ---
    let mut keys = vec![
        Line::from(Span::styled("←/→  steer / aim", dim_style)),
        Line::from(Span::styled("Spc  drop piece", dim_style)),
        Line::from(Span::styled("g    drop grain", dim_style)),
        Line::from(Span::styled("p r q pause reset quit", dim_style)),
    ];
    if view.auto_drop {
        keys.push(Line::from(Span::styled("auto-drop on", fg_style)));
    }
    Paragraph::new(keys).render(chunks[4], frame.buffer_mut());
}

/// Control state of the active piece with its surviving grain count.
fn piece_status(sim: &Simulation) -> String {
    if !sim.config().piece_control {
        return "off".to_string();
    }
    let Some(piece) = sim.active_piece() else {
        return "none".to_string();
    };
    let state = if sim.has_control() {
        "steering"
    } else if sim.is_landed() {
        "landed"
    } else {
        "settling"
    };
    format!("{state} ({})", piece.members().len())
}

fn draw_colour_strip(frame: &mut Frame, view: &View, area: Rect) {
    let n = usize::from(view.sim.config().colors);
    for i in 0..n {
        let x = area.x + (i as u16) * 3;
        if x + 2 > area.x + area.width {
            break;
        }
        let c = view.theme.sand_color(i as u8);
        let r = Rect {
            x,
            y: area.y,
            width: 2,
            height: 1,
        };
        Paragraph::new("██")
            .style(Style::default().fg(c).bg(c))
            .render(r, frame.buffer_mut());
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: resume    Q: quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}
