//! # Battery Status
//!
//! Optional battery capability used by the fast ticker to slow down on a
//! discharging, half-empty battery. On Linux the status is read from the kernel
//! power-supply class (`/sys/class/power_supply/<name>/{type,status,capacity}`);
//! anywhere else, or on machines without a battery, discovery fails and the
//! ticker runs at its default cadence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default sysfs power-supply directory
pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Errors from battery discovery and reads.
#[derive(Error, Debug)]
pub enum BatteryError {
    /// No battery device present
    #[error("no battery found")]
    Unavailable,

    /// Reading a sysfs attribute failed
    #[error("battery IO: {0}")]
    Io(#[from] io::Error),

    /// A sysfs attribute held an unexpected value
    #[error("unexpected battery value {0:?}")]
    Parse(String),
}

/// Snapshot of the battery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    /// True when on external power
    pub charging: bool,
    /// Charge level, 0.0 – 1.0
    pub level: f32,
}

/// Source of battery snapshots.
pub trait BatteryMonitor {
    fn status(&mut self) -> Result<BatteryStatus, BatteryError>;
}

/// Battery read from the Linux power-supply class.
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    dir: PathBuf,
}

impl SysfsBattery {
    /// Find the first battery under [`POWER_SUPPLY_ROOT`].
    pub fn discover() -> Result<Self, BatteryError> {
        Self::discover_in(POWER_SUPPLY_ROOT)
    }

    /// Find the first supply under `root` whose `type` is `Battery`.
    pub fn discover_in<P: AsRef<Path>>(root: P) -> Result<Self, BatteryError> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(root.as_ref())
            .map_err(|_| BatteryError::Unavailable)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        dirs.sort();
        dirs.into_iter()
            .find(|dir| {
                fs::read_to_string(dir.join("type"))
                    .map(|t| t.trim() == "Battery")
                    .unwrap_or(false)
            })
            .map(|dir| SysfsBattery { dir })
            .ok_or(BatteryError::Unavailable)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn read_attr(&self, name: &str) -> Result<String, BatteryError> {
        Ok(fs::read_to_string(self.dir.join(name))?.trim().to_string())
    }
}

impl BatteryMonitor for SysfsBattery {
    fn status(&mut self) -> Result<BatteryStatus, BatteryError> {
        let capacity = self.read_attr("capacity")?;
        let percent: u8 = capacity
            .parse()
            .map_err(|_| BatteryError::Parse(capacity.clone()))?;
        // "Charging", "Full" and "Not charging" all mean external power
        let charging = self.read_attr("status")? != "Discharging";
        Ok(BatteryStatus {
            charging,
            level: f32::from(percent.min(100)) / 100.0,
        })
    }
}
