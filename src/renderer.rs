//! # Dashboard Rendering
//!
//! Renders one dashboard frame as plain text for the terminal: map header,
//! metric tiles, toggle pills, the sound badge and a shortcut hint. Rendering is
//! split from printing so frames can be checked in tests.

use crate::config::WakeWindow;
use crate::dashboard::Metric;
use crate::prefs::{PrefKey, Preferences};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use std::fmt::Write as _;
use std::io::{self, Write};

/// Width of the tile rule
const TILE_WIDTH: usize = 44;

/// Everything shown in one frame.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    /// Map header line, or why the map is off
    pub header: String,
    /// Static map image link with the token redacted, when the map is attached
    pub map_link: Option<String>,
    pub metrics: &'a [Metric],
    pub prefs: Preferences,
    pub audio_unlocked: bool,
    pub window: WakeWindow,
    pub ping_interval_minutes: u32,
    /// False while the dashboard is hidden
    pub visible: bool,
}

/// Render a frame to a string.
pub fn render_frame(frame: &Frame<'_>) -> String {
    let mut out = String::new();
    if !frame.visible {
        out.push_str("⏸  Dashboard hidden, ticking paused. Press H to show.\n");
        return out;
    }

    let _ = writeln!(out, "📍 {}", frame.header);
    if let Some(link) = &frame.map_link {
        let _ = writeln!(out, "   {}", link);
    }
    out.push('\n');

    let visible: Vec<&Metric> = frame.metrics.iter().filter(|m| m.visible).collect();
    if visible.is_empty() {
        out.push_str("No metrics selected. Toggle metrics with the keys below.\n\n");
    }
    for metric in visible {
        render_tile(&mut out, metric);
    }

    out.push_str(&render_pills(&frame.prefs));
    out.push('\n');

    out.push_str(&render_hint(frame.window, frame.ping_interval_minutes));
    if !frame.audio_unlocked {
        out.push_str("🔔 Press any key to enable sound\n");
    }
    out
}

fn render_tile(out: &mut String, metric: &Metric) {
    let label = metric.label.to_uppercase();
    let rule = TILE_WIDTH.saturating_sub(label.chars().count() + 3);
    let _ = writeln!(out, "┌ {} {}", label, "─".repeat(rule));
    let _ = writeln!(out, "│ {}", metric.value);
    if !metric.sub.is_empty() {
        let _ = writeln!(out, "│ {}", metric.sub);
    }
    out.push('\n');
}

/// Toggle pills, e.g. `[1] Day % ●  [2] Age ○ ...`.
pub fn render_pills(prefs: &Preferences) -> String {
    PrefKey::ALL
        .iter()
        .map(|&key| {
            let mark = if prefs.get(key) { '●' } else { '○' };
            format!("[{}] {} {}", key.hotkey(), key.label(), mark)
        })
        .collect::<Vec<_>>()
        .join("  ")
}

fn render_hint(window: WakeWindow, ping_interval_minutes: u32) -> String {
    format!(
        "Shortcuts: 1 to 4 toggle metrics · P {}-minute ping ({:02}:00–{:02}:00) · H hide · Q quit\n\
         Clock updates every second; other metrics refresh ~10 fps and auto-throttle on low battery.\n",
        ping_interval_minutes, window.start_hour, window.end_hour
    )
}

/// Redraw the terminal with `frame`.
///
/// The terminal is in raw mode, so every line ends in an explicit `\r\n`.
pub fn draw_ascii<W: Write>(frame: &Frame<'_>, out: &mut W) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    out.write_all(render_frame(frame).replace('\n', "\r\n").as_bytes())?;
    out.flush()
}
