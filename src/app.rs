//! # Dashboard Session
//!
//! Owns every piece of per-session state (tickers, preferences, audio, chime,
//! map) and reacts to the inputs of the run loop through [`App::dispatch`]:
//! frames, key presses, resizes, battery polls and interrupts. All state is
//! touched from the single loop task only.
//!
//! Every path that ends the session goes through [`App::teardown`], including a
//! failed redraw.

use chrono::DateTime;
use chrono_tz::Tz;
use live_tracker_lib::battery::SysfsBattery;
use live_tracker_lib::chime::{AudioGate, AudioOutput, ChimeController, ChimeOutcome};
use live_tracker_lib::config::Config;
use live_tracker_lib::dashboard::{dispatch_key, Dashboard, KeyAction, KeyEvent};
use live_tracker_lib::map::{ContainerSize, HeaderMap, HeaderView, MapConfig, MapHost, MapState};
use live_tracker_lib::prefs::{FileStorage, PrefKey, PrefStore, Preferences};
use live_tracker_lib::renderer::{draw_ascii, render_frame, Frame};
use live_tracker_lib::sun_events::SunEventResolver;
use live_tracker_lib::ticker::{BatteryAdaptiveInterval, FixedInterval, Ticker, Visibility};
use live_tracker_lib::time::resolve_local;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Current terminal size, 80x24 when there is no terminal.
pub fn terminal_size() -> ContainerSize {
    match crossterm::terminal::size() {
        Ok((width, height)) => ContainerSize { width, height },
        Err(e) => {
            debug!("Terminal size unavailable ({}), assuming 80x24", e);
            ContainerSize {
                width: 80,
                height: 24,
            }
        }
    }
}

/// One input to the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Animation frame
    Frame,
    /// Time to re-read the battery
    BatteryPoll,
    /// Character key press
    Key(KeyEvent),
    /// Any other key press; only unlocks audio
    Gesture,
    Resize(ContainerSize),
    /// Ctrl-C
    Interrupt,
}

/// Whether the run loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The session is torn down
    Exit,
}

/// One running dashboard.
pub struct App<O: AudioOutput> {
    dashboard: Dashboard<Tz>,
    prefs: PrefStore<FileStorage>,
    audio: AudioGate<O>,
    chime: ChimeController,
    clock: Ticker<FixedInterval>,
    fast: Ticker<BatteryAdaptiveInterval>,
    map: MapHost<HeaderMap>,
    container: ContainerSize,
    visibility: Visibility,
    now: DateTime<Tz>,
    torn_down: bool,
}

impl<O: AudioOutput> App<O> {
    /// Build the session: read prefs, load the sun table, probe the battery.
    pub fn new(config: &Config, output: O, started: Instant, now: DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let window = config.wake_window();

        let mut prefs = PrefStore::new(
            FileStorage::new(&config.paths.prefs),
            Preferences::with_ping_default(config.schedule.ping_default_on),
        );
        let loaded = prefs.load();

        let sun = SunEventResolver::load_from_path(&config.paths.sun_events, tz)
            .unwrap_or_else(|e| {
                warn!("No sun data ({}); sun metric disabled", e);
                SunEventResolver::new(&[], tz)
            });
        let birth = config.birth().map(|naive| resolve_local(&tz, naive));

        let mut fast_policy = BatteryAdaptiveInterval::new(
            Duration::from_millis(config.ticker.fast_interval_ms),
            Duration::from_millis(config.ticker.throttled_interval_ms),
            config.ticker.battery_threshold,
        );
        match SysfsBattery::discover() {
            Ok(battery) => {
                debug!("Using battery at {}", battery.path().display());
                fast_policy = fast_policy.with_monitor(Box::new(battery));
            }
            Err(e) => debug!("Battery status unavailable: {}", e),
        }

        let container = terminal_size();
        let mut map = MapHost::new(HeaderMap::new(), MapConfig::from_location(&config.location));
        map.start(container, started);

        info!(
            "Dashboard started for {} ({} sun records)",
            config.location.name,
            sun.table().len()
        );

        App {
            dashboard: Dashboard::new(window, birth, sun),
            prefs,
            audio: AudioGate::new(output, loaded.ping),
            chime: ChimeController::new(window, config.schedule.ping_interval_minutes),
            clock: Ticker::new(FixedInterval(config.clock_interval()), started),
            fast: Ticker::new(fast_policy, started),
            map,
            container,
            visibility: Visibility::Visible,
            now,
            torn_down: false,
        }
    }

    pub fn prefs(&self) -> Preferences {
        self.prefs.prefs()
    }

    pub fn now(&self) -> &DateTime<Tz> {
        &self.now
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn fast_ticks(&self) -> u64 {
        self.fast.count().value()
    }

    pub fn audio(&self) -> &AudioGate<O> {
        &self.audio
    }

    pub fn map_state(&self) -> &MapState<HeaderView> {
        self.map.state()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Apply one input and redraw into `out` when something changed.
    ///
    /// Returns [`Flow::Exit`] on quit, interrupt or a failed redraw; the session
    /// is already torn down then.
    pub fn dispatch<W: Write>(
        &mut self,
        input: Input,
        at: Instant,
        wall: impl FnOnce() -> DateTime<Tz>,
        out: &mut W,
    ) -> Flow {
        let redraw = match input {
            Input::Frame => self.on_frame(at, wall),
            Input::BatteryPoll => {
                self.poll_battery();
                false
            }
            Input::Key(event) => {
                if self.on_key(event, at) == Some(KeyAction::Quit) {
                    return self.exit();
                }
                true
            }
            Input::Gesture => {
                self.audio.try_unlock();
                true
            }
            Input::Resize(size) => {
                self.on_resize(size);
                true
            }
            Input::Interrupt => {
                info!("Interrupted");
                return self.exit();
            }
        };
        if redraw {
            if let Err(e) = self.draw(out) {
                error!("Redraw failed: {}", e);
                return self.exit();
            }
        }
        Flow::Continue
    }

    fn exit(&mut self) -> Flow {
        self.teardown();
        Flow::Exit
    }

    /// Handle one frame; returns true when the screen should be redrawn.
    ///
    /// `wall` is only read when the clock ticker fires.
    pub fn on_frame(&mut self, at: Instant, wall: impl FnOnce() -> DateTime<Tz>) -> bool {
        self.map.poll(self.container, at);
        let mut redraw = false;
        if self.clock.on_frame(at) {
            self.now = wall();
            self.check_chime();
            redraw = true;
        }
        if self.fast.on_frame(at) {
            redraw = true;
        }
        redraw
    }

    fn check_chime(&mut self) {
        let prefs = self.prefs.prefs();
        let visible = self.visibility.is_visible();
        match self
            .chime
            .on_tick(&self.now, &prefs, visible, &mut self.audio)
        {
            ChimeOutcome::Played => info!("Chimed at {}", self.now.format("%H:%M")),
            ChimeOutcome::UnlockRequested => debug!("Chime slot reached with audio locked"),
            ChimeOutcome::Failed => debug!("Chime slot reached but nothing played"),
            ChimeOutcome::Skipped => {}
        }
    }

    /// Handle a key press; every press also counts as an unlock gesture.
    pub fn on_key(&mut self, event: KeyEvent, at: Instant) -> Option<KeyAction> {
        self.audio.try_unlock();
        let action = dispatch_key(event)?;
        match action {
            KeyAction::Toggle(key) => {
                let prefs = self.prefs.toggle(key);
                if key == PrefKey::Ping {
                    self.audio.set_enabled(prefs.ping);
                }
            }
            KeyAction::ToggleVisibility => {
                let next = match self.visibility {
                    Visibility::Visible => Visibility::Hidden,
                    Visibility::Hidden => Visibility::Visible,
                };
                self.set_visibility(next, at);
            }
            KeyAction::Quit => {}
        }
        Some(action)
    }

    pub fn set_visibility(&mut self, visibility: Visibility, at: Instant) {
        self.visibility = visibility;
        self.clock.on_visibility(visibility, at);
        self.fast.on_visibility(visibility, at);
    }

    /// Re-read the battery; stands in for level/charging change events.
    pub fn poll_battery(&mut self) {
        self.fast.policy_mut().poll_monitor();
    }

    /// Track terminal size changes.
    pub fn on_resize(&mut self, size: ContainerSize) {
        if size != self.container {
            self.container = size;
            self.map.on_resize(size);
        }
    }

    fn with_frame<R>(&self, f: impl FnOnce(&Frame<'_>) -> R) -> R {
        let prefs = self.prefs.prefs();
        let metrics = self.dashboard.metrics(&self.now, &prefs);
        let (header, map_link) = match self.map.state() {
            MapState::Attached { handle, .. } => (handle.title.clone(), Some(handle.display_url())),
            MapState::Disabled(e) => (format!("{} (map off: {})", self.map.config().name, e), None),
            _ => (format!("{} (map loading)", self.map.config().name), None),
        };
        f(&Frame {
            header,
            map_link,
            metrics: &metrics,
            prefs,
            audio_unlocked: self.audio.is_unlocked(),
            window: self.dashboard.window(),
            ping_interval_minutes: self.chime.interval_minutes(),
            visible: self.visibility.is_visible(),
        })
    }

    /// Text of the current frame.
    pub fn render(&self) -> String {
        self.with_frame(render_frame)
    }

    /// Redraw the terminal through `out`.
    pub fn draw<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.with_frame(|frame| draw_ascii(frame, out))
    }

    /// Stop ticking and detach the map. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.clock.pause();
        self.fast.pause();
        self.map.teardown();
        info!("Dashboard stopped");
    }
}

impl<O: AudioOutput> Drop for App<O> {
    fn drop(&mut self) {
        self.teardown();
    }
}
