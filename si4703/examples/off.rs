use anyhow::Result;
use si4703::{config::Config, linux};

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::default();
    let mut radio = linux::open(&config)?;
    radio.hold_reset()?;
    Ok(())
}
