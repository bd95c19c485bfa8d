//! # Live Tracker Core Library
//!
//! This library provides the building blocks for the live tracker dashboard: a
//! full-screen terminal view centered on one fixed location, showing a handful of
//! auto-refreshing time metrics and sounding an optional quarter-hour chime during
//! the daily wake window.
//!
//! ## Design Philosophy
//!
//! ### Pure cores, thin edges
//! - **Formatters and resolver are pure**: every metric is a function of
//!   `(now, configuration)`, so tests pin a timestamp instead of waiting on a clock
//! - **Time and visibility are injected**: the [`ticker::Ticker`] never reads the
//!   wall clock itself; the frame loop hands it the current instant
//! - **Capabilities are optional**: battery status, audio and the map surface all
//!   degrade to an inert state instead of failing the dashboard
//!
//! ### Data Flow
//! 1. **Tick**: the frame loop feeds instants to the clock and fast tickers
//! 2. **Recompute**: a fired tick re-reads `now`, formatters and the sun resolver
//!    rebuild the metric values
//! 3. **Render**: the ASCII renderer redraws the frame on stdout
//!
//! Preferences are read once at start and written back after every toggle,
//! independent of ticking.
//!
//! ## Core Types
//!
//! - [`SunEventRecord`]: one calendar day of sunrise/sunset data as stored on disk
//! - [`SunEventKind`]: sunrise or sunset
//! - [`NextSunEvent`]: the next solar event and its counterpart, both in the future

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod battery;
pub mod chime;
pub mod config;
pub mod dashboard;
pub mod map;
pub mod prefs;
pub mod renderer;
pub mod sun_events;
pub mod ticker;
pub mod time;

/// One calendar day's solar data, exactly as it appears in the static table.
///
/// Timestamps are kept as ISO-8601 strings; [`sun_events::PreparedSunTable`]
/// parses them once at startup.
///
/// # Example
/// ```
/// use live_tracker_lib::SunEventRecord;
///
/// let record: SunEventRecord = serde_json::from_str(r#"{
///     "date": "2025-03-01",
///     "sunrise_local": "2025-03-01T06:33:00-07:00",
///     "sunset_local": "2025-03-01T17:53:00-07:00",
///     "sunrise_utc": "2025-03-01T13:33:00Z",
///     "sunset_utc": "2025-03-02T00:53:00Z",
///     "day_length_seconds": 40800
/// }"#).unwrap();
///
/// assert_eq!(record.day_length_seconds, 40800);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SunEventRecord {
    /// Calendar date the record describes (`YYYY-MM-DD`)
    pub date: String,
    /// Local sunrise timestamp
    pub sunrise_local: String,
    /// Local sunset timestamp
    pub sunset_local: String,
    /// Sunrise timestamp in UTC
    pub sunrise_utc: String,
    /// Sunset timestamp in UTC
    pub sunset_utc: String,
    /// Length of daylight in seconds
    pub day_length_seconds: u32,
}

/// Kind of solar event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SunEventKind {
    Sunrise,
    Sunset,
}

impl SunEventKind {
    /// The other kind of event.
    pub fn opposite(self) -> Self {
        match self {
            SunEventKind::Sunrise => SunEventKind::Sunset,
            SunEventKind::Sunset => SunEventKind::Sunrise,
        }
    }
}

impl fmt::Display for SunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SunEventKind::Sunrise => f.write_str("Sunrise"),
            SunEventKind::Sunset => f.write_str("Sunset"),
        }
    }
}

/// The next solar event after a query instant, plus the event that follows it.
///
/// Always satisfies `alt_when > when > query`. Recomputed on every query and
/// never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NextSunEvent<Tz: TimeZone> {
    /// Kind of the next event
    pub kind: SunEventKind,
    /// When the next event happens
    pub when: DateTime<Tz>,
    /// Kind of the event after it
    pub alt_kind: SunEventKind,
    /// When the event after it happens
    pub alt_when: DateTime<Tz>,
}
