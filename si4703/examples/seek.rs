use anyhow::Result;
use clap::Parser;
use si4703::{config::Config, linux, SeekDirection};

#[derive(Parser)]
/// Lists every station above the seek threshold, one full sweep up the band
struct Args {
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    // Stop at the top of the band instead of going round forever
    config.seek.wrap = false;

    let mut radio = linux::open(&config)?;
    radio.reset()?;
    radio.power_up(&config.audio)?;
    radio.tune_to(0)?;

    while let Some(channel) = radio.seek(SeekDirection::Up)? {
        let rssi = radio.try_read_rssi()?;
        println!(
            "{:05.2} MHz  RSSI {:3} dB",
            radio.region().channel_to_frequency(channel),
            rssi
        );
    }
    radio.power_down()?;
    Ok(())
}
