// Hardware backends for a Linux host: i2c-dev, GPIO character device, std clock
use crate::{config::Config, Clock, Error, ResetLine, Result, Si4703, Transport};
use gpiocdev::{line::Value, Request};
use i2cdev::{core::I2CDevice, linux::LinuxI2CDevice};
use log::debug;
use std::{
    io,
    path::Path,
    thread,
    time::{Duration, Instant},
};

pub struct I2c(LinuxI2CDevice);

impl I2c {
    pub fn open<P: AsRef<Path>>(path: P, address: u16) -> io::Result<Self> {
        let dev = LinuxI2CDevice::new(path, address).map_err(io::Error::other)?;
        Ok(Self(dev))
    }
}

impl Transport for I2c {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.0.write(data).map_err(io::Error::other)
    }

    // i2c-dev reports a short transfer as an error, a successful read is
    // always complete
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }
}

pub struct ResetPin {
    request: Request,
    line: u32,
}

impl ResetPin {
    /// Claims the line as an output, initially high so the chip is not held
    /// in reset until asked.
    pub fn open<P: AsRef<Path>>(chip: P, line: u32) -> io::Result<Self> {
        let request = Request::builder()
            .on_chip(chip.as_ref())
            .with_consumer("si4703-reset")
            .with_line(line)
            .as_output(Value::Active)
            .request()
            .map_err(io::Error::other)?;
        Ok(Self { request, line })
    }
}

impl ResetLine for ResetPin {
    fn set_level(&mut self, high: bool) -> io::Result<()> {
        let value = if high { Value::Active } else { Value::Inactive };
        self.request
            .set_value(self.line, value)
            .map_err(io::Error::other)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub type Radio = Si4703<I2c, ResetPin, SystemClock>;

/// Opens the bus and reset line named in `config`. The chip is untouched.
pub fn open(config: &Config) -> Result<Radio> {
    debug!(
        "opening {} @ {:#04x}, reset {}:{}",
        config.bus.device, config.bus.address, config.reset.chip, config.reset.line
    );
    let bus = I2c::open(&config.bus.device, config.bus.address)?;
    let reset = ResetPin::open(&config.reset.chip, config.reset.line).map_err(Error::Gpio)?;
    Ok(Si4703::from_config(bus, reset, SystemClock, config))
}
