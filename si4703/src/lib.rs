use log::{debug, error, info, warn};
use std::{
    fmt, io,
    time::{Duration, Instant},
};
use thiserror::Error;

use config::{Audio, Config, Region, Seek, Timing};
use registers::*;

pub mod config;
pub mod linux;
#[cfg(test)]
mod mock;
pub mod registers;
pub mod tui;

/// 7 bit I2C address, fixed in silicon
pub const ADDRESS: u16 = 0x10;

/// Steps of `power_up`, reported when one of them fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    OscillatorRead,
    OscillatorEnable,
    PowerRead,
    PowerEnable,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stage::OscillatorRead => "read before oscillator enable",
            Stage::OscillatorEnable => "oscillator enable",
            Stage::PowerRead => "read before power up",
            Stage::PowerEnable => "power up",
        })
    }
}

/// Operations that end by waiting for STC
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Tune,
    Seek,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Operation::Tune => "TUNE",
            Operation::Seek => "SEEK",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I2C transfer failed")]
    Io(#[from] io::Error),
    #[error("Reset line failed")]
    Gpio(#[source] io::Error),
    #[error("Short read: {received} of {expected} bytes")]
    ShortRead { received: usize, expected: usize },
    #[error("Power up failed during {stage}")]
    Init {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
    #[error("STC timeout during {op} after {elapsed:?}")]
    Timeout { op: Operation, elapsed: Duration },
    #[error("Invalid config setting: {0}")]
    Config(String),
}

impl Error {
    /// Transfer failures, as opposed to protocol or setup failures
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ShortRead { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

fn init_stage(stage: Stage) -> impl FnOnce(Error) -> Error {
    move |source| Error::Init {
        stage,
        source: Box::new(source),
    }
}

/// Byte transport to the chip. There is no register pointer: a write always
/// lands at POWERCFG and a read always starts at STATUSRSSI.
pub trait Transport {
    fn write(&mut self, data: &[u8]) -> io::Result<()>;
    /// Returns how many bytes actually arrived.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// The active low RST pin
pub trait ResetLine {
    fn set_level(&mut self, high: bool) -> io::Result<()>;
}

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekDirection {
    Up,
    Down,
}

/// Outcome of a completed tune.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tuned {
    pub channel: u16,
    /// SF/BL was set: the tune finished but nothing strong is there
    pub no_station: bool,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub rssi: u8,
    pub stereo: bool,
    pub stc: bool,
    pub sfbl: bool,
    /// READCHAN, the channel the chip reports being on
    pub channel: u16,
}

impl From<&RegisterBank> for Status {
    fn from(regs: &RegisterBank) -> Self {
        Self {
            rssi: regs.rssi(),
            stereo: regs.stereo(),
            stc: regs.stc(),
            sfbl: regs.sfbl(),
            channel: regs.read_channel(),
        }
    }
}

/// SI4702/SI4703 driven directly through its register file.
///
/// Every operation is a read-modify-write of the shadow `RegisterBank`: read
/// all sixteen registers, change fields, write POWERCFG..=TEST1 back.
pub struct Si4703<T, R, C> {
    bus: T,
    reset: R,
    clock: C,
    regs: RegisterBank,
    region: Region,
    timing: Timing,
    seek: Seek,
}

impl<T: Transport, R: ResetLine, C: Clock> Si4703<T, R, C> {
    pub fn new(bus: T, reset: R, clock: C) -> Self {
        Self {
            bus,
            reset,
            clock,
            regs: RegisterBank::default(),
            region: Region::default(),
            timing: Timing::default(),
            seek: Seek::default(),
        }
    }

    pub fn from_config(bus: T, reset: R, clock: C, config: &Config) -> Self {
        Self::new(bus, reset, clock)
            .with_region(config.region)
            .with_timing(config.timing)
            .with_seek(config.seek)
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_seek(mut self, seek: Seek) -> Self {
        self.seek = seek;
        self
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.regs
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn release(self) -> (T, R, C) {
        (self.bus, self.reset, self.clock)
    }

    /// Pulses RST low. Must come before any register access.
    pub fn reset(&mut self) -> Result<()> {
        let settle = self.timing.reset_settle();
        self.reset.set_level(false).map_err(Error::Gpio)?;
        self.clock.sleep(settle);
        self.reset.set_level(true).map_err(Error::Gpio)?;
        self.clock.sleep(settle);
        debug!("reset pulse done");
        Ok(())
    }

    /// Reads the whole register file into the shadow. On failure the shadow
    /// keeps its previous contents.
    pub fn read_all(&mut self) -> Result<&RegisterBank> {
        let mut burst = [0; BURST_LEN];
        let received = self.bus.read(&mut burst)?;
        if received < BURST_LEN {
            return Err(Error::ShortRead {
                received,
                expected: BURST_LEN,
            });
        }
        self.regs = RegisterBank::from_burst(&burst);
        Ok(&self.regs)
    }

    /// Sends POWERCFG..=TEST1 in one transfer.
    pub fn write_window(&mut self) -> Result<()> {
        debug!("write {:04X?}", &self.regs.words()[WINDOW]);
        self.bus.write(&self.regs.window())?;
        Ok(())
    }

    /// Crystal on, then the receiver. Any failure aborts the whole sequence
    /// and names the stage; rerun from `reset` to retry.
    pub fn power_up(&mut self, audio: &Audio) -> Result<()> {
        self.read_all().map_err(init_stage(Stage::OscillatorRead))?;
        info!(
            "device {:04X} chip {:04X}",
            self.regs[DEVICEID], self.regs[CHIPID]
        );

        self.regs[TEST1] = OSCILLATOR_ENABLE;
        self.write_window()
            .map_err(init_stage(Stage::OscillatorEnable))?;
        self.clock.sleep(self.timing.oscillator_settle());

        self.read_all().map_err(init_stage(Stage::PowerRead))?;
        let mut power = PowerCfg::ENABLE;
        power.set(PowerCfg::DMUTE, !audio.mute);
        power.set(PowerCfg::DSMUTE, !audio.softmute);
        power.set(PowerCfg::MONO, audio.mono);
        self.regs.set_power_cfg(power);
        self.regs.set_deemphasis(self.region.deemphasis);
        self.regs.set_band(self.region.band);
        self.regs.set_spacing(self.region.spacing);
        self.regs.set_seek_threshold(self.seek.threshold);
        self.regs.set_volume(0);
        self.write_window().map_err(init_stage(Stage::PowerEnable))?;
        self.clock.sleep(self.timing.powerup_settle());

        info!("powered up, {:?}", self.region);
        Ok(())
    }

    /// ENABLE and DISABLE together start the chip's power down sequence.
    pub fn power_down(&mut self) -> Result<()> {
        self.read_all()?;
        let power = self.regs.power_cfg() | PowerCfg::ENABLE | PowerCfg::DISABLE;
        self.regs.set_power_cfg(power);
        self.write_window()?;
        info!("powered down");
        Ok(())
    }

    /// Drives RST low and leaves it there until the next `reset`.
    pub fn hold_reset(&mut self) -> Result<()> {
        self.reset.set_level(false).map_err(Error::Gpio)?;
        Ok(())
    }

    /// Polls STATUSRSSI until STC is set. A failed read ends the wait at once.
    fn wait_for_stc(&mut self, op: Operation, timeout: Duration) -> Result<Duration> {
        let start = self.clock.now();
        let mut polls = 0;
        loop {
            polls += 1;
            let stc = self.read_all()?.stc();
            let elapsed = self.clock.now().duration_since(start);
            if stc {
                debug!("{op} complete after {polls} polls, {elapsed:?}");
                return Ok(elapsed);
            }
            if elapsed >= timeout {
                error!("STC timeout during {op} after {polls} polls");
                return Err(Error::Timeout { op, elapsed });
            }
            self.clock.sleep(self.timing.poll_interval());
        }
    }

    /// Tunes to `channel`, clamped to the region's band.
    ///
    /// On `Error::Timeout` TUNE stays set in the shadow and on the chip; the
    /// caller decides whether to retry or reset.
    pub fn tune_to(&mut self, channel: u16) -> Result<Tuned> {
        let channel = channel.min(self.region.max_channel());
        self.read_all()?;
        self.regs.set_channel(channel);
        self.regs.set_tune(true);
        self.write_window()?;

        let elapsed = self.wait_for_stc(Operation::Tune, self.timing.tune_timeout())?;
        let sfbl = self.regs.sfbl();

        self.regs.set_tune(false);
        self.write_window()?;
        // Refresh the shadow: the chip drops STC once TUNE is cleared
        let after = self.read_all()?.sfbl();
        let no_station = sfbl || after;
        let mhz = self.region.channel_to_frequency(channel);
        if no_station {
            warn!("out-of-band or station not found at {mhz:.1} MHz");
        } else {
            info!("tuned {mhz:.1} MHz");
        }
        Ok(Tuned {
            channel,
            no_station,
            elapsed,
        })
    }

    /// Quantizes `mhz` to the band plan and tunes there.
    pub fn tune_frequency(&mut self, mhz: f64) -> Result<Tuned> {
        let channel = self.region.frequency_to_channel(mhz);
        self.tune_to(channel)
    }

    /// Seeks to the next station above SEEKTH. `None` when the seek failed
    /// or hit the band limit.
    pub fn seek(&mut self, direction: SeekDirection) -> Result<Option<u16>> {
        self.read_all()?;
        let mut power = self.regs.power_cfg();
        power.set(PowerCfg::SEEKUP, direction == SeekDirection::Up);
        power.set(PowerCfg::SKMODE, !self.seek.wrap);
        power.insert(PowerCfg::SEEK);
        self.regs.set_power_cfg(power);
        self.write_window()?;

        self.wait_for_stc(Operation::Seek, self.timing.seek_timeout())?;
        let failed = self.regs.sfbl();
        let channel = self.regs.read_channel();

        self.regs.set_power_cfg(self.regs.power_cfg() - PowerCfg::SEEK);
        self.write_window()?;
        if failed {
            warn!("seek {direction:?}: out-of-band or station not found");
            return Ok(None);
        }
        info!(
            "seek {direction:?}: found {:.1} MHz",
            self.region.channel_to_frequency(channel)
        );
        Ok(Some(channel))
    }

    /// Volume 0-15, clamped. Only the low nibble of SYSCONFIG2 changes.
    pub fn set_volume(&mut self, level: u8) -> Result<u8> {
        let level = level.min(MAX_VOLUME);
        self.read_all()?;
        self.regs.set_volume(level);
        self.write_window()?;
        debug!("volume {level}");
        Ok(level)
    }

    fn update_power(&mut self, flag: PowerCfg, on: bool) -> Result<()> {
        self.read_all()?;
        let mut power = self.regs.power_cfg();
        power.set(flag, on);
        self.regs.set_power_cfg(power);
        self.write_window()
    }

    pub fn set_mute(&mut self, mute: bool) -> Result<()> {
        self.update_power(PowerCfg::DMUTE, !mute)
    }

    pub fn set_mono(&mut self, mono: bool) -> Result<()> {
        self.update_power(PowerCfg::MONO, mono)
    }

    pub fn set_softmute(&mut self, softmute: bool) -> Result<()> {
        self.update_power(PowerCfg::DSMUTE, !softmute)
    }

    /// RSSI in dBµV. A failed read also gives 0, use `try_read_rssi` to tell
    /// the two apart.
    pub fn read_rssi(&mut self) -> u8 {
        self.try_read_rssi().unwrap_or_else(|e| {
            warn!("RSSI read failed: {e}");
            0
        })
    }

    pub fn try_read_rssi(&mut self) -> Result<u8> {
        Ok(self.read_all()?.rssi())
    }

    pub fn status(&mut self) -> Result<Status> {
        Ok(Status::from(self.read_all()?))
    }

    /// Frequency of the last channel read back from the chip, MHz.
    pub fn frequency(&self) -> f64 {
        self.region.channel_to_frequency(self.regs.read_channel())
    }
}
