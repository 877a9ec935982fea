use anyhow::Result;
use clap::Parser;
use si4703::config::Config;

#[derive(Parser)]
///Validates a toml receiver config and prints the resulting band plan
struct Args {
    file: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.file)?;

    println!("{:#?}", config);
    let region = &config.region;
    println!(
        "{:.1}-{:.1} MHz, {} kHz steps, {} channels",
        region.channel_to_frequency(0),
        region.channel_to_frequency(region.max_channel()),
        region.step_khz(),
        u32::from(region.max_channel()) + 1,
    );
    Ok(())
}
