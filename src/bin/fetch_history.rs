use anyhow::{Context, Result};

use rivals_stats::config::{Settings, arg_value};
use rivals_stats::logging;
use rivals_stats::mrapi::MrApiClient;
use rivals_stats::pipeline;

fn main() -> Result<()> {
    logging::init();
    let mut settings = Settings::load();
    settings.apply_args();

    let player_id = arg_value("player").context("usage: fetch_history --player <player_uid>")?;
    let client = MrApiClient::from_settings(&settings)?;
    let raw = pipeline::collect_raw(&settings, &client, &player_id)?;

    println!("Fetch complete");
    println!("Matches: {}", raw.matches.len());
    println!("Raw matches: {}", raw.match_path.display());
    println!("Raw history: {}", raw.history_path.display());
    if raw.malformed > 0 {
        println!("Malformed matches: {}", raw.malformed);
    }
    Ok(())
}
