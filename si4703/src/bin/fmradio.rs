use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use mio::{unix::SourceFd, Events, Interest, Poll, Token};
use mio_signals::{Signal, Signals};
use si4703::{
    config::Config,
    linux::{self, Radio},
    tui::{Console, Display, Screen, StatusLine, Tui},
    Error,
};
use std::{os::fd::AsRawFd, path::PathBuf, time::Duration};
use timerfd::{SetTimeFlags, TimerFd, TimerState};

#[derive(Parser, Debug)]
/// Tune an SI4703 and show signal status until Ctrl-C
struct Args {
    /// TOML settings, defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Station in MHz
    #[arg(short, long)]
    frequency: Option<f64>,
    /// 0-15
    #[arg(short, long)]
    volume: Option<u8>,
    /// Step one channel every N ms, 0 to stay on the station
    #[arg(short, long)]
    sweep: Option<u64>,
    /// Full screen display instead of status lines
    #[arg(short, long)]
    tui: bool,
}

const SIGINT: Token = Token(0);
const REFRESH: Token = Token(1);
const SWEEP: Token = Token(2);

fn periodic(period: Duration) -> Result<TimerFd> {
    let mut tfd = TimerFd::new()?;
    tfd.set_state(
        TimerState::Periodic {
            current: period,
            interval: period,
        },
        SetTimeFlags::Default,
    );
    Ok(tfd)
}

fn setup(radio: &mut Radio, config: &Config) -> si4703::Result<()> {
    radio.reset()?;
    radio.power_up(&config.audio)?;
    radio.set_volume(config.audio.volume)?;
    match radio.tune_frequency(config.station.frequency) {
        Err(Error::Timeout { .. }) => {
            warn!("first tune timed out, retrying");
            radio.tune_frequency(config.station.frequency)?;
        }
        r => {
            r?;
        }
    }
    Ok(())
}

fn refresh(radio: &mut Radio, display: &mut dyn Display) -> Result<()> {
    match radio.status() {
        Ok(status) => {
            let volume = radio.registers().volume();
            let line = StatusLine::new(radio.region(), &status, volume);
            display.render(&Screen::Status(line))?;
        }
        Err(e) => warn!("status read failed: {e}"),
    }
    Ok(())
}

fn sweep(radio: &mut Radio) {
    let max = radio.region().max_channel();
    let next = match radio.registers().read_channel() {
        c if c >= max => 0,
        c => c + 1,
    };
    if let Err(e) = radio.tune_to(next) {
        error!("sweep to channel {next}: {e}");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(f) = args.frequency {
        config.station.frequency = f;
    }
    if let Some(v) = args.volume {
        config.audio.volume = v;
    }
    if let Some(s) = args.sweep {
        config.ui.sweep = s;
    }
    config.validate()?;

    let mut display: Box<dyn Display> = match args.tui {
        true => Box::new(Tui::new()?),
        false => Box::new(Console),
    };
    display.render(&Screen::Starting)?;

    let mut poll = Poll::new()?;
    let registry = poll.registry();
    let mut events = Events::with_capacity(16);

    let mut signals = Signals::new(Signal::Interrupt.into())?;
    registry.register(&mut signals, SIGINT, Interest::READABLE)?;

    let mut radio = linux::open(&config)?;
    if let Err(e) = setup(&mut radio, &config) {
        error!("{e}");
        display.render(&Screen::Fatal(e.to_string()))?;
        // No periodic work until restart
        'halt: loop {
            poll.poll(&mut events, None)?;
            for event in events.iter() {
                if event.token() == SIGINT {
                    break 'halt;
                }
            }
        }
        radio.hold_reset()?;
        return Err(e.into());
    }

    let refresh_timer = periodic(config.ui.refresh())?;
    registry.register(
        &mut SourceFd(&refresh_timer.as_raw_fd()),
        REFRESH,
        Interest::READABLE,
    )?;
    let sweep_timer = match config.ui.sweep() {
        None => None,
        Some(period) => {
            let tfd = periodic(period)?;
            registry.register(&mut SourceFd(&tfd.as_raw_fd()), SWEEP, Interest::READABLE)?;
            Some(tfd)
        }
    };

    info!("running, Ctrl-C to stop");
    refresh(&mut radio, display.as_mut())?;
    'outer: loop {
        poll.poll(&mut events, None)?;
        for event in events.iter() {
            match event.token() {
                REFRESH => {
                    refresh_timer.read();
                    refresh(&mut radio, display.as_mut())?;
                }
                SWEEP => {
                    if let Some(tfd) = &sweep_timer {
                        tfd.read();
                    }
                    sweep(&mut radio);
                    refresh(&mut radio, display.as_mut())?;
                }
                SIGINT => break 'outer,
                _ => unreachable!(),
            }
        }
    }

    drop(display);
    radio.power_down()?;
    radio.hold_reset()?;
    Ok(())
}
