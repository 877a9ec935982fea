use crate::registers::MAX_VOLUME;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path, time::Duration};

pub mod region;
pub use region::Region;
#[cfg(test)] use proptest::prelude::*;

fn div_nearest(dividend: u64, divisor: u64) -> u64 {
    (dividend + (divisor >> 1)) / divisor
}

#[cfg(test)]
proptest! {
    #[test]
    fn div_even(n: u8) {
        let v = u64::from(n);
        assert_eq!(v, div_nearest(v*2, 2));
    }

    #[test]
    fn div_odd(n: u8) {
        let v = u64::from(n);
        assert_eq!(v+1, div_nearest((v+1)*2, 2));
    }
}

/// Datasheet minimums, AN230 section 2
pub const MIN_OSCILLATOR_SETTLE_MS: u64 = 500;
pub const MIN_POWERUP_SETTLE_MS: u64 = 110;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bus {
    pub device: String,
    pub address: u16,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            device: "/dev/i2c-1".into(),
            address: crate::ADDRESS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reset {
    pub chip: String,
    pub line: u32,
}

impl Default for Reset {
    fn default() -> Self {
        Self {
            chip: "/dev/gpiochip0".into(),
            line: 14,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Audio {
    pub volume: u8,
    pub mono: bool,
    pub mute: bool,
    pub softmute: bool,
}

impl Default for Audio {
    fn default() -> Self {
        Self {
            volume: 8,
            mono: false,
            mute: false,
            softmute: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Station {
    /// MHz
    pub frequency: f64,
}

impl Default for Station {
    fn default() -> Self {
        Self { frequency: 101.7 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seek {
    /// SEEKTH, minimum RSSI for a valid station
    pub threshold: u8,
    /// Wrap at the band edge instead of stopping there
    pub wrap: bool,
}

impl Default for Seek {
    fn default() -> Self {
        Self {
            threshold: 25,
            wrap: true,
        }
    }
}

/// Delays and bounds, all in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub reset_settle: u64,
    pub oscillator_settle: u64,
    pub powerup_settle: u64,
    pub tune_timeout: u64,
    pub poll_interval: u64,
    pub seek_timeout: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reset_settle: 10,
            oscillator_settle: MIN_OSCILLATOR_SETTLE_MS,
            powerup_settle: MIN_POWERUP_SETTLE_MS,
            tune_timeout: 200,
            poll_interval: 5,
            seek_timeout: 10_000,
        }
    }
}

impl Timing {
    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle)
    }

    pub fn oscillator_settle(&self) -> Duration {
        Duration::from_millis(self.oscillator_settle)
    }

    pub fn powerup_settle(&self) -> Duration {
        Duration::from_millis(self.powerup_settle)
    }

    pub fn tune_timeout(&self) -> Duration {
        Duration::from_millis(self.tune_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ui {
    /// Status refresh period, ms
    pub refresh: u64,
    /// Step to the next channel every `sweep` ms, 0 to stay put
    pub sweep: u64,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            refresh: 400,
            sweep: 250,
        }
    }
}

impl Ui {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh)
    }

    /// `None` when sweeping is off
    pub fn sweep(&self) -> Option<Duration> {
        (self.sweep != 0).then(|| Duration::from_millis(self.sweep))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bus: Bus,
    pub reset: Reset,
    pub region: Region,
    pub audio: Audio,
    pub station: Station,
    pub seek: Seek,
    pub timing: Timing,
    pub ui: Ui,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Config = toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if t.oscillator_settle < MIN_OSCILLATOR_SETTLE_MS {
            return Err(Error::Config(format!(
                "oscillator_settle {} ms is below the {} ms crystal startup",
                t.oscillator_settle, MIN_OSCILLATOR_SETTLE_MS
            )));
        }
        if t.powerup_settle < MIN_POWERUP_SETTLE_MS {
            return Err(Error::Config(format!(
                "powerup_settle {} ms is below the {} ms power up time",
                t.powerup_settle, MIN_POWERUP_SETTLE_MS
            )));
        }
        if t.poll_interval == 0 || t.tune_timeout == 0 || t.seek_timeout == 0 {
            return Err(Error::Config("poll interval and timeouts must be non-zero".into()));
        }
        if self.audio.volume > MAX_VOLUME {
            return Err(Error::Config(format!(
                "volume {} out of range 0-{}",
                self.audio.volume, MAX_VOLUME
            )));
        }
        let mhz = self.station.frequency;
        let (min, max) = (self.region.min_khz(), self.region.max_khz());
        if !(f64::from(min) / 1000.0..=f64::from(max) / 1000.0).contains(&mhz) {
            return Err(Error::Config(format!(
                "{mhz} MHz is outside the {:?} band",
                self.region.band
            )));
        }
        if self.ui.refresh == 0 {
            return Err(Error::Config("ui refresh must be non-zero".into()));
        }
        Ok(())
    }
}
