//! # Quarter-Hour Chime
//!
//! Sounds a short tone on every quarter hour inside the wake window.
//!
//! ## Audio Gate
//! Audio output starts suspended and must be unlocked by a user gesture (any key
//! press). Unlock failures are logged as warnings and retried on the next
//! gesture; until then the chime is silently disabled.
//!
//! ## Deduplication
//! Each candidate instant maps to a [`SlotKey`] of (year, month, day, hour,
//! minute). The controller remembers the last slot it acted on and never acts on
//! the same slot twice, however often the clock ticker fires inside it. This does
//! not protect against the system clock jumping backwards.

use crate::config::WakeWindow;
use crate::prefs::Preferences;
use crate::time::within_wake_window;
use chrono::{DateTime, Datelike, TimeZone, Timelike};
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the audio output.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio output: {0}")]
    Output(#[from] io::Error),

    #[error("audio unavailable: {0}")]
    Unavailable(String),
}

/// Output run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Suspended,
    Running,
}

/// A one-shot tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
}

/// The quarter-hour ping: 880 Hz for 220 ms.
pub const PING_TONE: Tone = Tone {
    frequency_hz: 880.0,
    duration: Duration::from_millis(220),
};

/// Something that can play a tone once it is running.
pub trait AudioOutput {
    fn state(&self) -> AudioState;

    /// Try to move to [`AudioState::Running`].
    fn resume(&mut self) -> Result<AudioState, AudioError>;

    fn play(&mut self, tone: Tone) -> Result<(), AudioError>;
}

/// Terminal bell as an audio output.
///
/// The bell cannot express pitch or length; the tone is logged at debug level
/// and rendered as a single BEL byte.
pub struct TerminalBell<W: Write> {
    out: W,
    state: AudioState,
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        TerminalBell {
            out,
            state: AudioState::Suspended,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> AudioOutput for TerminalBell<W> {
    fn state(&self) -> AudioState {
        self.state
    }

    fn resume(&mut self) -> Result<AudioState, AudioError> {
        self.out.flush()?;
        self.state = AudioState::Running;
        Ok(self.state)
    }

    fn play(&mut self, tone: Tone) -> Result<(), AudioError> {
        debug!(
            "Bell for {:.0} Hz / {:?} tone",
            tone.frequency_hz, tone.duration
        );
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Gesture-unlocked, preference-gated audio.
pub struct AudioGate<O: AudioOutput> {
    output: O,
    enabled: bool,
    unlocked: bool,
}

impl<O: AudioOutput> AudioGate<O> {
    pub fn new(output: O, enabled: bool) -> Self {
        AudioGate {
            output,
            enabled,
            unlocked: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Resume the output; returns whether it is now running.
    pub fn unlock(&mut self) -> bool {
        let state = if self.output.state() == AudioState::Suspended {
            match self.output.resume() {
                Ok(state) => state,
                Err(e) => {
                    warn!("Audio resume failed: {}", e);
                    return false;
                }
            }
        } else {
            self.output.state()
        };
        self.unlocked = state == AudioState::Running;
        self.unlocked
    }

    /// Fire-and-forget unlock, as done on every user gesture.
    pub fn try_unlock(&mut self) {
        if !self.unlocked {
            self.unlock();
        }
    }

    /// Play the ping if enabled and running; returns whether it sounded.
    pub fn play_ping(&mut self) -> bool {
        if !self.enabled || self.output.state() != AudioState::Running {
            return false;
        }
        match self.output.play(PING_TONE) {
            Ok(()) => true,
            Err(e) => {
                warn!("Ping failed: {}", e);
                false
            }
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

/// Chime deduplication key: one per minute of the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl SlotKey {
    pub fn of<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        SlotKey {
            year: now.year(),
            month: now.month(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

/// What a chime check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChimeOutcome {
    /// Not a chime slot, chime disabled, or slot already handled
    Skipped,
    /// Tone played
    Played,
    /// Audio was still locked; an unlock was attempted instead
    UnlockRequested,
    /// Audio unlocked but the output did not play; the slot is still consumed
    Failed,
}

/// Decides when to chime; one per session.
#[derive(Debug, Clone)]
pub struct ChimeController {
    window: WakeWindow,
    interval_minutes: u32,
    last_slot: Option<SlotKey>,
}

impl ChimeController {
    pub fn new(window: WakeWindow, interval_minutes: u32) -> Self {
        ChimeController {
            window,
            interval_minutes: interval_minutes.max(1),
            last_slot: None,
        }
    }

    pub fn last_slot(&self) -> Option<SlotKey> {
        self.last_slot
    }

    /// Minutes between chimes, at least one.
    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Check one clock tick and chime if it opens a new quarter-hour slot.
    pub fn on_tick<Tz: TimeZone, O: AudioOutput>(
        &mut self,
        now: &DateTime<Tz>,
        prefs: &Preferences,
        visible: bool,
        audio: &mut AudioGate<O>,
    ) -> ChimeOutcome {
        if !prefs.ping || !audio.enabled() || !visible {
            return ChimeOutcome::Skipped;
        }
        if !within_wake_window(now, self.window) {
            return ChimeOutcome::Skipped;
        }
        if now.second() != 0 || now.minute() % self.interval_minutes != 0 {
            return ChimeOutcome::Skipped;
        }

        let slot = SlotKey::of(now);
        if self.last_slot == Some(slot) {
            return ChimeOutcome::Skipped;
        }
        self.last_slot = Some(slot);
        debug!("Chime slot {}", slot);

        if audio.is_unlocked() {
            if audio.play_ping() {
                ChimeOutcome::Played
            } else {
                ChimeOutcome::Failed
            }
        } else {
            audio.try_unlock();
            ChimeOutcome::UnlockRequested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    /// Output that counts plays and can refuse to resume or play.
    struct CountingOutput {
        state: AudioState,
        plays: usize,
        refuse_resume: bool,
        refuse_play: bool,
    }

    impl CountingOutput {
        fn new() -> Self {
            CountingOutput {
                state: AudioState::Suspended,
                plays: 0,
                refuse_resume: false,
                refuse_play: false,
            }
        }
    }

    impl AudioOutput for CountingOutput {
        fn state(&self) -> AudioState {
            self.state
        }

        fn resume(&mut self) -> Result<AudioState, AudioError> {
            if self.refuse_resume {
                return Err(AudioError::Unavailable("no device".into()));
            }
            self.state = AudioState::Running;
            Ok(self.state)
        }

        fn play(&mut self, _tone: Tone) -> Result<(), AudioError> {
            if self.refuse_play {
                return Err(AudioError::Output(io::ErrorKind::BrokenPipe.into()));
            }
            self.plays += 1;
            Ok(())
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, h, m, s)
            .unwrap()
    }

    fn unlocked_gate() -> AudioGate<CountingOutput> {
        let mut gate = AudioGate::new(CountingOutput::new(), true);
        assert!(gate.unlock());
        gate
    }

    fn controller() -> ChimeController {
        ChimeController::new(WakeWindow::default(), 15)
    }

    #[test]
    fn test_plays_on_quarter_hour() {
        let mut gate = unlocked_gate();
        let mut chime = controller();
        let prefs = Preferences::default();
        assert_eq!(
            chime.on_tick(&at(9, 15, 0), &prefs, true, &mut gate),
            ChimeOutcome::Played
        );
        assert_eq!(gate.output().plays, 1);
        assert_eq!(chime.last_slot().unwrap().to_string(), "2025-6-1-9-15");
    }

    #[test]
    fn test_same_slot_plays_at_most_once() {
        let mut gate = unlocked_gate();
        let mut chime = controller();
        let prefs = Preferences::default();
        let now = at(10, 30, 0);
        chime.on_tick(&now, &prefs, true, &mut gate);
        assert_eq!(
            chime.on_tick(&now, &prefs, true, &mut gate),
            ChimeOutcome::Skipped
        );
        assert_eq!(gate.output().plays, 1);

        // next quarter fires again
        chime.on_tick(&at(10, 45, 0), &prefs, true, &mut gate);
        assert_eq!(gate.output().plays, 2);
    }

    #[test]
    fn test_skips_off_slot_and_outside_window() {
        let mut gate = unlocked_gate();
        let mut chime = controller();
        let prefs = Preferences::default();
        for now in [at(9, 15, 1), at(9, 16, 0), at(6, 45, 0), at(22, 0, 0)] {
            assert_eq!(
                chime.on_tick(&now, &prefs, true, &mut gate),
                ChimeOutcome::Skipped
            );
        }
        assert_eq!(
            chime.on_tick(&at(7, 0, 0), &prefs, true, &mut gate),
            ChimeOutcome::Played
        );
    }

    #[test]
    fn test_skips_when_disabled_or_hidden() {
        let mut gate = unlocked_gate();
        let mut chime = controller();
        let off = Preferences::default().with(crate::prefs::PrefKey::Ping, false);
        assert_eq!(
            chime.on_tick(&at(9, 0, 0), &off, true, &mut gate),
            ChimeOutcome::Skipped
        );
        assert_eq!(
            chime.on_tick(&at(9, 0, 0), &Preferences::default(), false, &mut gate),
            ChimeOutcome::Skipped
        );
        gate.set_enabled(false);
        assert_eq!(
            chime.on_tick(&at(9, 0, 0), &Preferences::default(), true, &mut gate),
            ChimeOutcome::Skipped
        );
        assert_eq!(gate.output().plays, 0);
    }

    #[test]
    fn test_locked_audio_requests_unlock_and_consumes_slot() {
        let mut gate = AudioGate::new(CountingOutput::new(), true);
        let mut chime = controller();
        let prefs = Preferences::default();
        assert_eq!(
            chime.on_tick(&at(12, 0, 0), &prefs, true, &mut gate),
            ChimeOutcome::UnlockRequested
        );
        assert!(gate.is_unlocked());
        assert_eq!(gate.output().plays, 0);
        assert_eq!(
            chime.on_tick(&at(12, 0, 0), &prefs, true, &mut gate),
            ChimeOutcome::Skipped
        );
    }

    #[test]
    fn test_failed_unlock_stays_locked() {
        let mut output = CountingOutput::new();
        output.refuse_resume = true;
        let mut gate = AudioGate::new(output, true);
        assert!(!gate.unlock());
        assert!(!gate.play_ping());
        assert!(!gate.is_unlocked());
        assert_eq!(gate.output().plays, 0);
    }

    #[test]
    fn test_failed_play_is_not_reported_as_played() {
        let mut output = CountingOutput::new();
        output.refuse_play = true;
        let mut gate = AudioGate::new(output, true);
        assert!(gate.unlock());
        let mut chime = controller();
        let prefs = Preferences::default();
        assert_eq!(
            chime.on_tick(&at(9, 15, 0), &prefs, true, &mut gate),
            ChimeOutcome::Failed
        );
        assert_eq!(gate.output().plays, 0);
        // slot consumed all the same
        assert_eq!(
            chime.on_tick(&at(9, 15, 0), &prefs, true, &mut gate),
            ChimeOutcome::Skipped
        );
    }

    #[test]
    fn test_interval_is_at_least_one_minute() {
        assert_eq!(ChimeController::new(WakeWindow::default(), 0).interval_minutes(), 1);
        assert_eq!(controller().interval_minutes(), 15);
    }

    #[test]
    fn test_terminal_bell_writes_bel() {
        let mut bell = TerminalBell::new(Vec::new());
        assert_eq!(bell.state(), AudioState::Suspended);
        bell.resume().unwrap();
        bell.play(PING_TONE).unwrap();
        assert_eq!(bell.into_inner(), b"\x07");
    }
}
