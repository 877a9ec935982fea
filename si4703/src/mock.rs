// Simulated chip for driver tests
use crate::registers::*;
use crate::{Clock, ResetLine, Si4703, Transport};
use std::{
    cell::RefCell,
    io,
    rc::Rc,
    time::{Duration, Instant},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Pending {
    #[default]
    Idle,
    Tune(usize),
    Seek(usize),
    Done,
}

pub struct Sim {
    pub regs: [u16; REGISTER_COUNT],
    /// Every window written, as words
    pub writes: Vec<[u16; 6]>,
    /// Successful reads
    pub reads: usize,
    /// Reads made while a tune or seek was running
    pub polls: usize,
    /// Polls that see STC clear before it sets. `None` never completes.
    pub stc_latency: Option<usize>,
    pub sfbl: bool,
    pub seek_result: Option<u16>,
    /// Every read delivers only this many bytes
    pub short_read: Option<usize>,
    /// Writes fail once this many have gone out
    pub fail_writes_after: Option<usize>,
    pub fail_reset: bool,
    /// Reads fail once this many have succeeded
    pub fail_reads_after: Option<usize>,
    pub reset_levels: Vec<bool>,
    pub elapsed: Duration,
    pub sleeps: Vec<Duration>,
    pending: Pending,
}

pub type Handle = Rc<RefCell<Sim>>;
pub type Radio = Si4703<Bus, Reset, SimClock>;

impl Default for Sim {
    fn default() -> Self {
        let mut regs = [0; REGISTER_COUNT];
        regs[DEVICEID] = 0x1242;
        regs[CHIPID] = 0x1253;
        Self {
            regs,
            writes: Vec::new(),
            reads: 0,
            polls: 0,
            stc_latency: Some(0),
            sfbl: false,
            seek_result: None,
            short_read: None,
            fail_writes_after: None,
            fail_reset: false,
            fail_reads_after: None,
            reset_levels: Vec::new(),
            elapsed: Duration::ZERO,
            sleeps: Vec::new(),
            pending: Pending::Idle,
        }
    }
}

impl Sim {
    pub fn shared() -> Handle {
        Rc::new(RefCell::new(Sim::default()))
    }

    fn status(&mut self, flag: StatusRssi, on: bool) {
        let mut status = StatusRssi::from_bits_retain(self.regs[STATUSRSSI]);
        status.set(flag, on);
        self.regs[STATUSRSSI] = status.bits();
    }

    fn on_write(&mut self) {
        let tune = self.regs[CHANNEL] & TUNE != 0;
        let seek = PowerCfg::from_bits_retain(self.regs[POWERCFG]).contains(PowerCfg::SEEK);
        match (tune, seek) {
            (false, false) => {
                self.pending = Pending::Idle;
                self.status(StatusRssi::STC, false);
                self.status(StatusRssi::SFBL, false);
            }
            _ if self.pending == Pending::Idle => {
                self.pending = if seek { Pending::Seek(0) } else { Pending::Tune(0) };
                self.status(StatusRssi::STC, false);
                self.status(StatusRssi::SFBL, false);
            }
            _ => (),
        }
    }

    fn on_read(&mut self) {
        let (polled, seek) = match self.pending {
            Pending::Tune(n) => (n + 1, false),
            Pending::Seek(n) => (n + 1, true),
            Pending::Idle | Pending::Done => return,
        };
        self.polls += 1;
        self.pending = if seek { Pending::Seek(polled) } else { Pending::Tune(polled) };
        if !self.stc_latency.is_some_and(|latency| polled > latency) {
            return;
        }
        self.pending = Pending::Done;
        let channel = match seek {
            true => self.seek_result.unwrap_or(self.regs[READCHAN] & CHANNEL_MASK),
            false => self.regs[CHANNEL] & CHANNEL_MASK,
        };
        self.regs[READCHAN] = (self.regs[READCHAN] & !CHANNEL_MASK) | channel;
        let failed = self.sfbl || (seek && self.seek_result.is_none());
        self.status(StatusRssi::STC, true);
        self.status(StatusRssi::SFBL, failed);
    }
}

pub struct Bus(pub Handle);

impl Transport for Bus {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut sim = self.0.borrow_mut();
        let written = sim.writes.len();
        if sim.fail_writes_after.is_some_and(|n| written >= n) {
            return Err(io::Error::other("NACK"));
        }
        assert_eq!(data.len(), WINDOW_LEN);
        let mut words = [0; 6];
        for (w, bytes) in words.iter_mut().zip(data.chunks_exact(2)) {
            *w = u16::from_be_bytes([bytes[0], bytes[1]]);
        }
        sim.regs[WINDOW].copy_from_slice(&words);
        sim.writes.push(words);
        sim.on_write();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut sim = self.0.borrow_mut();
        let reads = sim.reads;
        if sim.fail_reads_after.is_some_and(|n| reads >= n) {
            return Err(io::Error::other("NACK"));
        }
        if let Some(n) = sim.short_read {
            return Ok(n.min(buf.len()));
        }
        sim.reads += 1;
        sim.on_read();
        let burst = RegisterBank::from(sim.regs).to_burst();
        let len = buf.len().min(BURST_LEN);
        buf[..len].copy_from_slice(&burst[..len]);
        Ok(len)
    }
}

pub struct Reset(pub Handle);

impl ResetLine for Reset {
    fn set_level(&mut self, high: bool) -> io::Result<()> {
        let mut sim = self.0.borrow_mut();
        if sim.fail_reset {
            return Err(io::Error::other("line busy"));
        }
        sim.reset_levels.push(high);
        Ok(())
    }
}

/// Time only moves when the driver sleeps.
pub struct SimClock {
    sim: Handle,
    origin: Instant,
}

impl SimClock {
    pub fn new(sim: Handle) -> Self {
        Self {
            sim,
            origin: Instant::now(),
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.origin + self.sim.borrow().elapsed
    }

    fn sleep(&mut self, duration: Duration) {
        let mut sim = self.sim.borrow_mut();
        sim.elapsed += duration;
        sim.sleeps.push(duration);
    }
}

pub fn radio() -> (Radio, Handle) {
    let sim = Sim::shared();
    let radio = Si4703::new(Bus(sim.clone()), Reset(sim.clone()), SimClock::new(sim.clone()));
    (radio, sim)
}
