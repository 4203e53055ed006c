use std::path::PathBuf;

use anyhow::Result;

use rivals_stats::config::{Settings, arg_value};
use rivals_stats::logging;
use rivals_stats::pipeline;

fn main() -> Result<()> {
    logging::init();
    let mut settings = Settings::load();
    settings.apply_args();

    let input = arg_value("input").map(PathBuf::from);
    let summary = pipeline::clean_file(&settings, input.as_deref())?;

    println!("Clean complete");
    println!("Input: {}", summary.input.display());
    if summary.malformed > 0 {
        println!("Malformed matches dropped: {}", summary.malformed);
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
    Ok(())
}
