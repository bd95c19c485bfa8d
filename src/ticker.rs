//! # Adaptive Ticker
//!
//! A scheduling primitive that turns a stream of frame callbacks into periodic
//! fires. The dashboard runs two of them: a 1-second clock tick and a fast
//! display-refresh tick (~100 ms, throttled to ~400 ms on a low battery).
//!
//! ## State Machine
//! ```text
//!            hidden
//!   Running ────────▶ Paused
//!      ▲                │
//!      └────────────────┘
//!     visible (reference reset to now)
//! ```
//! - **Running**: every frame checks whether `interval` has elapsed since the
//!   last fire; if so it fires and records the frame time
//! - **Paused**: frames are ignored, whatever wall time passes
//! - **Resume** resets the reference to the resume instant, so no backlog of
//!   missed ticks fires at once
//!
//! The ticker never reads a clock. Frame and visibility instants are handed in
//! by the caller, which keeps tests free of real timers.
//!
//! ## Interval Policies
//! [`FixedInterval`] always answers the same cadence. [`BatteryAdaptiveInterval`]
//! answers the throttled cadence while the battery is discharging at or below
//! the threshold, and the default cadence otherwise or when no battery status is
//! available.

use crate::battery::{BatteryMonitor, BatteryStatus};
use std::time::{Duration, Instant};
use tracing::debug;

/// Wrap bound of the tick counter (largest integer a double holds exactly)
pub const TICK_WRAP: u64 = (1 << 53) - 1;

/// Ticker run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    Running,
    Paused,
}

/// Visibility of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Monotonic re-render trigger; carries no meaning beyond "changed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounter(u64);

impl TickCounter {
    pub fn value(self) -> u64 {
        self.0
    }

    /// Advance by one, wrapping at [`TICK_WRAP`].
    pub fn advance(&mut self) {
        self.0 = (self.0 + 1) % TICK_WRAP;
    }
}

/// Source of the current fire interval.
pub trait IntervalPolicy {
    fn interval(&self) -> Duration;

    /// Called after every fire.
    fn reevaluate(&mut self) {}
}

/// Constant interval.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval(pub Duration);

impl IntervalPolicy for FixedInterval {
    fn interval(&self) -> Duration {
        self.0
    }
}

/// Interval that throttles on a discharging, low battery.
pub struct BatteryAdaptiveInterval {
    default: Duration,
    throttled: Duration,
    threshold: f32,
    battery: Option<BatteryStatus>,
    monitor: Option<Box<dyn BatteryMonitor + Send>>,
    current: Duration,
}

impl BatteryAdaptiveInterval {
    /// Policy with no battery capability; always answers `default`.
    pub fn new(default: Duration, throttled: Duration, threshold: f32) -> Self {
        BatteryAdaptiveInterval {
            default,
            throttled,
            threshold,
            battery: None,
            monitor: None,
            current: default,
        }
    }

    /// Attach a battery monitor. A failing first read leaves the policy
    /// behaving as if no battery existed.
    pub fn with_monitor(mut self, mut monitor: Box<dyn BatteryMonitor + Send>) -> Self {
        match monitor.status() {
            Ok(status) => {
                self.monitor = Some(monitor);
                self.on_battery_change(status);
            }
            Err(e) => debug!("Battery status unavailable: {}", e),
        }
        self
    }

    /// Current battery snapshot, if any.
    pub fn battery(&self) -> Option<BatteryStatus> {
        self.battery
    }

    /// Record a level/charging change and recompute the interval.
    pub fn on_battery_change(&mut self, status: BatteryStatus) {
        self.battery = Some(status);
        self.update_interval();
    }

    /// Re-read the attached monitor, if any; read errors keep the last snapshot.
    pub fn poll_monitor(&mut self) {
        let Some(monitor) = self.monitor.as_mut() else {
            return;
        };
        match monitor.status() {
            Ok(status) if Some(status) != self.battery => self.on_battery_change(status),
            Ok(_) => {}
            Err(e) => debug!("Battery read failed: {}", e),
        }
    }

    fn update_interval(&mut self) {
        self.current = match self.battery {
            Some(b) if !b.charging && b.level <= self.threshold => self.throttled,
            _ => self.default,
        };
    }
}

impl IntervalPolicy for BatteryAdaptiveInterval {
    fn interval(&self) -> Duration {
        self.current
    }

    fn reevaluate(&mut self) {
        self.update_interval();
    }
}

/// Frame-driven periodic ticker.
///
/// # Example
/// ```
/// use std::time::{Duration, Instant};
/// use live_tracker_lib::ticker::{FixedInterval, Ticker};
///
/// let start = Instant::now();
/// let mut ticker = Ticker::new(FixedInterval(Duration::from_millis(100)), start);
///
/// assert!(!ticker.on_frame(start + Duration::from_millis(50)));
/// assert!(ticker.on_frame(start + Duration::from_millis(100)));
/// assert_eq!(ticker.count().value(), 1);
/// ```
pub struct Ticker<P: IntervalPolicy> {
    state: TickerState,
    last_fire: Instant,
    policy: P,
    count: TickCounter,
}

impl<P: IntervalPolicy> Ticker<P> {
    /// New running ticker whose first interval starts at `now`.
    pub fn new(policy: P, now: Instant) -> Self {
        Ticker {
            state: TickerState::Running,
            last_fire: now,
            policy,
            count: TickCounter::default(),
        }
    }

    pub fn state(&self) -> TickerState {
        self.state
    }

    pub fn count(&self) -> TickCounter {
        self.count
    }

    pub fn interval(&self) -> Duration {
        self.policy.interval()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Handle one frame; returns true when the ticker fired.
    pub fn on_frame(&mut self, now: Instant) -> bool {
        if self.state == TickerState::Paused {
            return false;
        }
        if now.saturating_duration_since(self.last_fire) < self.policy.interval() {
            return false;
        }
        self.last_fire = now;
        self.count.advance();
        self.policy.reevaluate();
        true
    }

    /// Apply a visibility change observed at `now`.
    pub fn on_visibility(&mut self, visibility: Visibility, now: Instant) {
        match visibility {
            Visibility::Hidden => self.pause(),
            Visibility::Visible => self.resume(now),
        }
    }

    pub fn pause(&mut self) {
        if self.state == TickerState::Running {
            debug!("Ticker paused after {} fires", self.count.value());
        }
        self.state = TickerState::Paused;
    }

    /// Resume and restart the interval at `now`.
    pub fn resume(&mut self, now: Instant) {
        self.state = TickerState::Running;
        self.last_fire = now;
    }
}
