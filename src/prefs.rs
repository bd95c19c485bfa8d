//! # Preference Store
//!
//! Persists the user's metric toggles and chime preference as a small JSON object
//! (`{"day": true, "age": false, ...}`), one file standing in for a browser
//! storage key.
//!
//! ## Read/Merge Policy
//! - Missing, empty or unparsable storage → all defaults
//! - Otherwise each known key holding a boolean overrides its default; unknown
//!   keys and non-boolean values are ignored
//! - Read and write failures are logged and swallowed, never returned
//!
//! ## Hydration Guard
//! Nothing is written until [`PrefStore::load`] has run once, so a toggle that
//! races the first read can never clobber the stored value with defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the preference storage backend.
#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("prefs IO: {0}")]
    Io(#[from] io::Error),

    #[error("prefs JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single named preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
    Day,
    Age,
    Clock,
    Year,
    Ping,
}

impl PrefKey {
    /// Every key in display order.
    pub const ALL: [PrefKey; 5] = [
        PrefKey::Day,
        PrefKey::Age,
        PrefKey::Clock,
        PrefKey::Year,
        PrefKey::Ping,
    ];

    /// JSON field name.
    pub fn name(self) -> &'static str {
        match self {
            PrefKey::Day => "day",
            PrefKey::Age => "age",
            PrefKey::Clock => "clock",
            PrefKey::Year => "year",
            PrefKey::Ping => "ping",
        }
    }

    /// Toggle pill label.
    pub fn label(self) -> &'static str {
        match self {
            PrefKey::Day => "Day %",
            PrefKey::Age => "Age",
            PrefKey::Clock => "Clock",
            PrefKey::Year => "Year %",
            PrefKey::Ping => "Ping",
        }
    }

    /// Keyboard shortcut shown on the pill.
    pub fn hotkey(self) -> char {
        match self {
            PrefKey::Day => '1',
            PrefKey::Age => '2',
            PrefKey::Clock => '3',
            PrefKey::Year => '4',
            PrefKey::Ping => 'P',
        }
    }

    /// Key bound to a typed character, case-insensitive.
    pub fn from_hotkey(key: char) -> Option<Self> {
        PrefKey::ALL
            .into_iter()
            .find(|k| k.hotkey().eq_ignore_ascii_case(&key))
    }
}

/// The full preference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub day: bool,
    pub age: bool,
    pub clock: bool,
    pub year: bool,
    pub ping: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            day: true,
            age: true,
            clock: true,
            year: true,
            ping: true,
        }
    }
}

impl Preferences {
    /// Defaults with the given initial chime state.
    pub fn with_ping_default(ping: bool) -> Self {
        Preferences {
            ping,
            ..Preferences::default()
        }
    }

    pub fn get(&self, key: PrefKey) -> bool {
        match key {
            PrefKey::Day => self.day,
            PrefKey::Age => self.age,
            PrefKey::Clock => self.clock,
            PrefKey::Year => self.year,
            PrefKey::Ping => self.ping,
        }
    }

    /// Copy with one key overwritten.
    pub fn with(mut self, key: PrefKey, value: bool) -> Self {
        let slot = match key {
            PrefKey::Day => &mut self.day,
            PrefKey::Age => &mut self.age,
            PrefKey::Clock => &mut self.clock,
            PrefKey::Year => &mut self.year,
            PrefKey::Ping => &mut self.ping,
        };
        *slot = value;
        self
    }

    /// Shallow-merge a raw stored value over `self`.
    ///
    /// # Example
    /// ```
    /// use live_tracker_lib::prefs::Preferences;
    ///
    /// let merged = Preferences::default().merge_json(r#"{"day": false, "extra": 1}"#).unwrap();
    /// assert!(!merged.day);
    /// assert!(merged.ping);
    /// ```
    pub fn merge_json(self, raw: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let Some(object) = value.as_object() else {
            return Ok(self);
        };
        Ok(PrefKey::ALL.into_iter().fold(self, |prefs, key| {
            match object.get(key.name()).and_then(serde_json::Value::as_bool) {
                Some(value) => prefs.with(key, value),
                None => prefs,
            }
        }))
    }
}

/// Raw persisted preference value.
pub trait PrefStorage {
    /// Stored value, `None` when nothing has been stored yet.
    fn read(&self) -> Result<Option<String>, PrefsError>;
    fn write(&mut self, raw: &str) -> Result<(), PrefsError>;
}

/// Preferences kept in a JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileStorage {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PrefStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, PrefsError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, raw: &str) -> Result<(), PrefsError> {
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// Preference state plus its storage.
pub struct PrefStore<S: PrefStorage> {
    storage: S,
    defaults: Preferences,
    prefs: Preferences,
    hydrated: bool,
}

impl<S: PrefStorage> PrefStore<S> {
    /// Store holding `defaults` until [`load`](Self::load) runs.
    pub fn new(storage: S, defaults: Preferences) -> Self {
        PrefStore {
            storage,
            defaults,
            prefs: defaults,
            hydrated: false,
        }
    }

    /// Read storage, merge over defaults and mark the store hydrated.
    pub fn load(&mut self) -> Preferences {
        self.prefs = self.read_merged();
        self.hydrated = true;
        self.prefs
    }

    fn read_merged(&self) -> Preferences {
        let raw = match self.storage.read() {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => return self.defaults,
            Err(e) => {
                warn!("Failed to read prefs: {}", e);
                return self.defaults;
            }
        };
        self.defaults.merge_json(&raw).unwrap_or_else(|e| {
            warn!("Failed to parse stored prefs: {}", e);
            self.defaults
        })
    }

    pub fn prefs(&self) -> Preferences {
        self.prefs
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Persist the current preferences; skipped before the first load.
    pub fn save(&mut self) {
        if !self.hydrated {
            debug!("Skipping prefs save before first load");
            return;
        }
        let result = serde_json::to_string(&self.prefs)
            .map_err(PrefsError::from)
            .and_then(|raw| self.storage.write(&raw));
        if let Err(e) = result {
            warn!("Failed to persist prefs: {}", e);
        }
    }

    /// Overwrite one key and persist.
    pub fn set_pref(&mut self, key: PrefKey, value: bool) -> Preferences {
        self.prefs = self.prefs.with(key, value);
        self.save();
        self.prefs
    }

    /// Flip one key and persist.
    pub fn toggle(&mut self, key: PrefKey) -> Preferences {
        let value = !self.prefs.get(key);
        self.set_pref(key, value)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
