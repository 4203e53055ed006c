use anyhow::{Context, Result};
use tracing::info;

use rivals_stats::config::{Settings, arg_value};
use rivals_stats::hero_meta::HeroCatalog;
use rivals_stats::logging;
use rivals_stats::mrapi::MrApiClient;
use rivals_stats::pipeline;

fn main() -> Result<()> {
    logging::init();
    let mut settings = Settings::load();
    settings.apply_args();

    let player_id = arg_value("player").context("usage: rivals_stats --player <player_uid>")?;
    let client = MrApiClient::from_settings(&settings)?;

    // Fail before any request if the hero table is missing.
    let catalog = HeroCatalog::load_csv(&settings.hero_info).with_context(|| {
        format!(
            "hero metadata {} must exist alongside the run",
            settings.hero_info.display()
        )
    })?;

    let raw = pipeline::collect_raw(&settings, &client, &player_id)?;
    let identifier = rivals_stats::data_files::identifier_from_raw_file(&raw.match_path)
        .unwrap_or_else(|| player_id.clone());
    let summary = pipeline::clean_matches(&settings, &raw.matches, &catalog, &identifier)?;

    println!("Run complete");
    println!("Raw matches: {}", raw.match_path.display());
    println!("Raw history: {}", raw.history_path.display());
    if raw.malformed > 0 {
        println!("Malformed matches dropped: {}", raw.malformed);
    }
    if summary.rejected > 0 {
        println!("Matches with repeated players dropped: {}", summary.rejected);
    }
    println!(
        "Individual stats: {} rows -> {}",
        summary.individual_rows,
        summary.paths.individual.display()
    );
    println!(
        "Player stats: {} rows -> {}",
        summary.player_rows,
        summary.paths.players.display()
    );
    println!(
        "Team stats: {} rows -> {}",
        summary.team_rows,
        summary.paths.teams.display()
    );
    info!("done");
    Ok(())
}
