//! # Dashboard Metrics
//!
//! Assembles the five metric tiles from one timestamp and the current
//! preferences, and maps key presses to dashboard actions.

use crate::config::WakeWindow;
use crate::prefs::{PrefKey, Preferences};
use crate::sun_events::SunEventResolver;
use crate::time::{self, fmt_local_hm, hms};
use crate::SunEventKind;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Which tile a metric is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKey {
    Day,
    Age,
    Clock,
    Year,
    Sun,
}

/// One rendered tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub key: MetricKey,
    pub label: &'static str,
    pub value: String,
    pub sub: String,
    pub visible: bool,
}

/// Everything needed to compute the tiles.
pub struct Dashboard<Tz: TimeZone> {
    window: WakeWindow,
    birth: Option<DateTime<Tz>>,
    sun: SunEventResolver<Tz>,
}

impl<Tz: TimeZone> Dashboard<Tz>
where
    Tz::Offset: Display,
{
    pub fn new(window: WakeWindow, birth: Option<DateTime<Tz>>, sun: SunEventResolver<Tz>) -> Self {
        Dashboard { window, birth, sun }
    }

    pub fn window(&self) -> WakeWindow {
        self.window
    }

    pub fn sun(&self) -> &SunEventResolver<Tz> {
        &self.sun
    }

    /// All tiles in display order; visibility follows `prefs`, sun is always shown.
    pub fn metrics(&self, now: &DateTime<Tz>, prefs: &Preferences) -> Vec<Metric> {
        vec![
            self.day_metric(now, prefs.day),
            self.age_metric(now, prefs.age),
            clock_metric(now, prefs.clock),
            year_metric(now, prefs.year),
            self.sun_metric(now),
        ]
    }

    fn day_metric(&self, now: &DateTime<Tz>, visible: bool) -> Metric {
        let progress = time::day_progress(now, self.window);
        let durations = time::day_durations(now, self.window);
        Metric {
            key: MetricKey::Day,
            label: "Day Progress",
            value: format!("{:.1}%", progress * 100.0),
            sub: format!(
                "{} elapsed • {} remaining",
                durations.elapsed, durations.remaining
            ),
            visible,
        }
    }

    fn age_metric(&self, now: &DateTime<Tz>, visible: bool) -> Metric {
        let (value, sub) = match &self.birth {
            Some(birth) => {
                let age = time::age(now, birth);
                (age.value(), age.summary())
            }
            None => ("--".to_string(), "Set schedule.birth to enable".to_string()),
        };
        Metric {
            key: MetricKey::Age,
            label: "Age",
            value,
            sub,
            visible,
        }
    }

    fn sun_metric(&self, now: &DateTime<Tz>) -> Metric {
        let (value, sub) = match self.sun.resolve(now) {
            Some(event) => {
                let diff = (event.when.clone() - now.clone()).num_milliseconds().max(0);
                let alt_label = match event.alt_kind {
                    SunEventKind::Sunrise => "Next Sunrise",
                    SunEventKind::Sunset => "Next Sunset",
                };
                (
                    format!("{} in {}", event.kind, hms(diff)),
                    format!(
                        "{} at {} • {} {}",
                        event.kind,
                        fmt_local_hm(&event.when),
                        alt_label,
                        fmt_local_hm(&event.alt_when)
                    ),
                )
            }
            None => (
                "No sun data".to_string(),
                "Provide sun events to enable this metric.".to_string(),
            ),
        };
        Metric {
            key: MetricKey::Sun,
            label: "Next Sun Event",
            value,
            sub,
            visible: true,
        }
    }
}

fn clock_metric<Tz: TimeZone>(now: &DateTime<Tz>, visible: bool) -> Metric
where
    Tz::Offset: Display,
{
    let (value, zone) = time::clock(now);
    Metric {
        key: MetricKey::Clock,
        label: "Local Time",
        value,
        sub: zone,
        visible,
    }
}

fn year_metric<Tz: TimeZone>(now: &DateTime<Tz>, visible: bool) -> Metric {
    Metric {
        key: MetricKey::Year,
        label: "Year Progress",
        value: format!("{:.4}%", time::year_progress(now) * 100.0),
        sub: format!("{} days left", time::days_left_in_year(now)),
        visible,
    }
}

/// A key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: char,
    /// True when focus is inside a text field; shortcuts are ignored then
    pub text_input_focused: bool,
}

impl KeyEvent {
    pub fn new(key: char) -> Self {
        KeyEvent {
            key,
            text_input_focused: false,
        }
    }
}

/// What a key press asks the dashboard to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Toggle(PrefKey),
    /// Hide or show the dashboard (pauses ticking while hidden)
    ToggleVisibility,
    Quit,
}

/// Map a key press to an action.
pub fn dispatch_key(event: KeyEvent) -> Option<KeyAction> {
    if event.text_input_focused {
        return None;
    }
    if let Some(key) = PrefKey::from_hotkey(event.key) {
        return Some(KeyAction::Toggle(key));
    }
    match event.key.to_ascii_lowercase() {
        'h' => Some(KeyAction::ToggleVisibility),
        'q' => Some(KeyAction::Quit),
        _ => None,
    }
}
