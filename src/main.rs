//! # Live Tracker Application Entry Point
//!
//! This binary runs the dashboard in the terminal: a single-threaded frame loop
//! drives the tickers, key presses and resizes arrive from crossterm in raw
//! mode, and the screen is redrawn whenever something changed. `--once` renders
//! a single frame and exits, for checking configuration without an interactive
//! terminal.

// Test modules
#[cfg(test)]
mod tests;

mod app;

use app::{terminal_size, App, Flow, Input};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use live_tracker_lib::chime::TerminalBell;
use live_tracker_lib::config::Config;
use live_tracker_lib::dashboard::KeyEvent;
use live_tracker_lib::map::ContainerSize;
use std::env;
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// How often the battery is re-read
const BATTERY_POLL: Duration = Duration::from_secs(30);

/// How long the input thread waits for an event before checking for shutdown
const INPUT_POLL: Duration = Duration::from_millis(250);

/// Raw mode on an alternate screen; restored on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), cursor::Show, LeaveAlternateScreen) {
            warn!("Failed to leave alternate screen: {}", e);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Translate a terminal event into a loop input.
fn translate(event: Event) -> Option<Input> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(match key.code {
            // raw mode swallows SIGINT
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Input::Interrupt,
            KeyCode::Char(c) => Input::Key(KeyEvent::new(c)),
            _ => Input::Gesture,
        }),
        Event::Resize(width, height) => Some(Input::Resize(ContainerSize { width, height })),
        _ => None,
    }
}

/// Forward terminal events until the loop goes away or input fails.
fn read_terminal_events(tx: mpsc::Sender<Input>) {
    loop {
        match event::poll(INPUT_POLL) {
            Ok(true) => {}
            Ok(false) if tx.is_closed() => return,
            Ok(false) => continue,
            Err(e) => {
                warn!("Terminal input failed: {}", e);
                return;
            }
        }
        let input = match event::read() {
            Ok(event) => translate(event),
            Err(e) => {
                warn!("Terminal input failed: {}", e);
                return;
            }
        };
        if let Some(input) = input {
            if tx.blocking_send(input).is_err() {
                return;
            }
        }
    }
}

async fn run(config: Config, once: bool) -> anyhow::Result<()> {
    let tz = config.timezone();
    let now = || Utc::now().with_timezone(&tz);
    let mut app = App::new(&config, TerminalBell::new(io::stdout()), Instant::now(), now());

    if once {
        print!("{}", app.render());
        return Ok(());
    }

    let _terminal = TerminalGuard::enter()?;
    let mut out = io::stdout();

    let (input_tx, mut input_rx) = mpsc::channel::<Input>(32);
    std::thread::spawn(move || read_terminal_events(input_tx));
    let mut input_open = true;

    let mut frames = tokio::time::interval(config.frame_interval());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut battery = tokio::time::interval(BATTERY_POLL);

    let mut flow = app.dispatch(Input::Resize(terminal_size()), Instant::now(), now, &mut out);
    while flow == Flow::Continue {
        let input = tokio::select! {
            _ = frames.tick() => Input::Frame,
            _ = battery.tick() => Input::BatteryPoll,
            input = input_rx.recv(), if input_open => match input {
                Some(input) => input,
                None => {
                    warn!("Terminal input closed; keyboard shortcuts disabled");
                    input_open = false;
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => Input::Interrupt,
        };
        flow = app.dispatch(input, Instant::now(), now, &mut out);
    }

    Ok(())
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never tear the dashboard on stdout
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let once = env::args().any(|arg| arg == "--once");
    let config = Config::load();

    // The dashboard is single-threaded and cooperative
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(config, once)).inspect_err(|e| error!("Dashboard failed: {:#}", e))
}
