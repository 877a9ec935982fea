use anyhow::Result;
use clap::Parser;
use si4703::{config::Config, linux};

#[derive(Parser)]
/// Powers up, tunes once and prints what the chip sees
struct Args {
    /// MHz
    frequency: f64,
    #[arg(short, long, default_value_t = 8)]
    volume: u8,
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut radio = linux::open(&config)?;
    radio.reset()?;
    radio.power_up(&config.audio)?;
    radio.set_volume(args.volume)?;

    let tuned = radio.tune_frequency(args.frequency)?;
    let status = radio.status()?;
    println!(
        "{:.1} MHz: RSSI {} dB, {}, tuned in {:?}",
        radio.frequency(),
        status.rssi,
        if status.stereo { "stereo" } else { "mono" },
        tuned.elapsed,
    );
    if tuned.no_station {
        println!("Warning: no strong station at {:.1} MHz", args.frequency);
    }
    Ok(())
}
