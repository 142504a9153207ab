//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Grain palette and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Grain colours, indexed by the engine's colour index.
    pub sand: Vec<Color>,
    /// Substitute colour for grains waiting to be cleared.
    pub flash: Color,
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (counters, help).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

/// Const RGB so palette tables need no fallible parsing.
const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const ONEDARK_SAND: [Color; 6] = [
    rgb(0x98C379), // green
    rgb(0xE5C07B), // yellow
    rgb(0xE06C75), // red
    rgb(0x61AFEF), // blue
    rgb(0xC678DD), // magenta
    rgb(0x56B6C2), // cyan
];

const HIGH_CONTRAST_SAND: [Color; 6] = [
    rgb(0x00FF00),
    rgb(0xFFFF00),
    rgb(0xFF0000),
    rgb(0x0088FF),
    rgb(0xFF00FF),
    rgb(0x00FFFF),
];

// Avoids red/green pairs.
const COLORBLIND_SAND: [Color; 6] = [
    rgb(0x0077BB),
    rgb(0xEE7733),
    rgb(0x009988),
    rgb(0xCC3311),
    rgb(0xEE3377),
    rgb(0xBBBB00),
];

/// Classic sand tones; close enough that bridges are hard to read, which is the point.
const DESERT_SAND: [Color; 5] = [
    rgb(0xC2B280),
    rgb(0xBDAE7C),
    rgb(0xC7B785),
    rgb(0xC9BA88),
    rgb(0xBBAB79),
];

impl Theme {
    /// One Dark defaults, hex values from onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            sand: ONEDARK_SAND.to_vec(),
            flash: rgb(0xFFFFFF),
            bg: rgb(0x31353F),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    /// `palette` then selects the grain colour variant.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override grain colours for high-contrast, colorblind or desert palettes.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => self.sand = HIGH_CONTRAST_SAND.to_vec(),
            crate::Palette::Colorblind => self.sand = COLORBLIND_SAND.to_vec(),
            crate::Palette::Desert => self.sand = DESERT_SAND.to_vec(),
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let d = Self::onedark_default();
        // Keys match onedark.theme; fallbacks are the same file's hex values.
        Self {
            sand: vec![
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(d.sand[0]),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(d.sand[1]),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(d.sand[2]),
                get("cpu_box").unwrap_or(d.sand[3]),
                get("net_box").unwrap_or(d.sand[4]),
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(d.sand[5]),
            ],
            flash: get("selected_fg").unwrap_or(d.flash),
            bg: get("meter_bg").unwrap_or(d.bg),
            div_line: get("div_line").unwrap_or(d.div_line),
            main_fg: get("main_fg").unwrap_or(d.main_fg),
            title: get("title").unwrap_or(d.title),
            inactive_fg: get("inactive_fg").unwrap_or(d.inactive_fg),
        }
    }

    /// Grain colour for an engine colour index; wraps if the palette is shorter.
    #[inline]
    pub fn sand_color(&self, index: u8) -> Color {
        self.sand[(index as usize) % self.sand.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(eq) = rest.find('=') {
            let value = rest[eq + 1..]
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            if !value.is_empty() {
                map.insert(key.to_string(), value);
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let bad = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>, scale: u8| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map(|v| v * scale)
            .ok_or_else(bad)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2, 1)?, channel(2..4, 1)?, channel(4..6, 1)?),
        3 => (channel(0..1, 17)?, channel(1..2, 17)?, channel(2..3, 17)?),
        _ => return Err(bad()),
    };
    Ok(Color::Rgb(r, g, b))
}
