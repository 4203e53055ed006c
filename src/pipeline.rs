//! End-to-end runs: collect raw data for a player, clean a raw match file,
//! and repair headers of older cleaned files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Settings;
use crate::data_files::{
    self, CleanedPaths, INDIVIDUAL_PATTERN, PLAYER_PATTERN, RAW_MATCH_PATTERN, TEAM_PATTERN,
};
use crate::hero_meta::HeroCatalog;
use crate::match_history::{fetch_all_match_history, fetch_matches};
use crate::mrapi::{MrApiClient, RequestParams, Transport};
use crate::records::{MatchRecord, matches_from_table};
use crate::reshape::{Reshaped, reshape, write_rows_to_path};
use crate::table::{KeepPolicy, Table};

const JOIN_SUFFIXES: &[&str] = &["_x", "_y"];

#[derive(Debug, Clone)]
pub struct RawCollection {
    pub match_path: PathBuf,
    pub history_path: PathBuf,
    pub matches: Vec<MatchRecord>,
    pub malformed: usize,
}

pub fn history_params(settings: &Settings) -> RequestParams {
    let mut params = RequestParams::new();
    if let Some(season) = settings.season {
        params = params.season(season);
    }
    if let Some(gamemode) = settings.gamemode {
        params = params.gamemode(gamemode);
    }
    params
}

/// Fetches the player's whole history and every match in it, and writes the
/// raw match and history tables.
pub fn collect_raw<T: Transport>(
    settings: &Settings,
    client: &MrApiClient<T>,
    player_id: &str,
) -> Result<RawCollection> {
    let params = history_params(settings);
    let history = fetch_all_match_history(client, player_id, &params)?;
    let fetched = fetch_matches(client, &history.match_uids)?;

    let date = data_files::today();
    let match_path = data_files::raw_match_path(&settings.data_dir, settings.season, player_id, &date);
    let history_path =
        data_files::raw_history_path(&settings.data_dir, settings.season, player_id, &date);

    Table::from_json_documents(&fetched.documents)
        .write_csv(&match_path)
        .context("write raw match table")?;
    Table::from_json_documents(&history.entries)
        .write_csv(&history_path)
        .context("write raw history table")?;
    info!(
        matches = %match_path.display(),
        history = %history_path.display(),
        "saved raw tables"
    );

    Ok(RawCollection {
        match_path,
        history_path,
        malformed: fetched.parsed.malformed.len(),
        matches: fetched.parsed.matches,
    })
}

#[derive(Debug, Clone)]
pub struct CleanSummary {
    pub input: PathBuf,
    pub paths: CleanedPaths,
    pub malformed: usize,
    /// Matches parsed fine but dropped for listing a player twice.
    pub rejected: usize,
    pub individual_rows: usize,
    pub player_rows: usize,
    pub team_rows: usize,
}

/// Cleans `input`, or the newest `match_data*.csv` in the data directory.
pub fn clean_file(settings: &Settings, input: Option<&Path>) -> Result<CleanSummary> {
    let input = match input {
        Some(path) => path.to_path_buf(),
        None => data_files::latest_matching(&settings.data_dir, RAW_MATCH_PATTERN)?,
    };
    info!(input = %input.display(), "loading raw match table");

    let table = Table::read_csv(&input)?;
    let parsed = matches_from_table(&table, &input)?;
    for err in &parsed.malformed {
        warn!(%err, "dropping malformed match");
    }

    let catalog = HeroCatalog::load_csv(&settings.hero_info).with_context(|| {
        format!(
            "hero metadata {} must exist alongside the run",
            settings.hero_info.display()
        )
    })?;

    let identifier = data_files::identifier_from_raw_file(&input).unwrap_or_else(|| {
        input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string()
    });
    let mut summary = clean_matches(settings, &parsed.matches, &catalog, &identifier)?;
    summary.input = input;
    summary.malformed = parsed.malformed.len();
    Ok(summary)
}

/// Reshapes already-parsed matches and writes the three cleaned tables.
pub fn clean_matches(
    settings: &Settings,
    matches: &[MatchRecord],
    catalog: &HeroCatalog,
    identifier: &str,
) -> Result<CleanSummary> {
    let reshaped = reshape(matches, catalog);
    reshaped.report.log();
    for err in &reshaped.rejected {
        warn!(%err, "dropping match");
    }

    let paths = data_files::cleaned_paths(&settings.data_dir, identifier);
    write_cleaned(&reshaped, &paths)?;

    Ok(CleanSummary {
        input: PathBuf::new(),
        paths,
        malformed: 0,
        rejected: reshaped.rejected.len(),
        individual_rows: reshaped.individual.len(),
        player_rows: reshaped.players.len(),
        team_rows: reshaped.teams.len(),
    })
}

pub fn write_cleaned(reshaped: &Reshaped, paths: &CleanedPaths) -> Result<()> {
    write_rows_to_path(&paths.individual, &reshaped.individual_rows())?;
    write_rows_to_path(&paths.players, &reshaped.player_rows())?;
    write_rows_to_path(&paths.teams, &reshaped.teams)?;
    info!(
        individual = %paths.individual.display(),
        players = %paths.players.display(),
        teams = %paths.teams.display(),
        "saved cleaned tables"
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRepair {
    pub path: PathBuf,
    pub columns_before: usize,
    pub columns_after: usize,
}

/// Rewrites the newest cleaned file of each kind with `_x`/`_y` suffixes
/// stripped and duplicate columns dropped: first copy wins for individual
/// stats, last copy for player and team stats.
pub fn fix_file_headers(data_dir: &Path) -> Result<Vec<HeaderRepair>> {
    let targets = [
        (
            data_files::latest_matching(data_dir, INDIVIDUAL_PATTERN)?,
            KeepPolicy::First,
        ),
        (
            data_files::latest_matching_excluding(
                data_dir,
                PLAYER_PATTERN,
                &[INDIVIDUAL_PATTERN, TEAM_PATTERN],
            )?,
            KeepPolicy::Last,
        ),
        (
            data_files::latest_matching(data_dir, TEAM_PATTERN)?,
            KeepPolicy::Last,
        ),
    ];

    let mut repairs = Vec::with_capacity(targets.len());
    for (path, keep) in targets {
        let table = Table::read_csv(&path)?;
        let fixed = table.normalize_headers(JOIN_SUFFIXES, keep);
        fixed.write_csv(&path)?;
        info!(
            path = %path.display(),
            before = table.headers().len(),
            after = fixed.headers().len(),
            "rewrote headers"
        );
        repairs.push(HeaderRepair {
            path,
            columns_before: table.headers().len(),
            columns_after: fixed.headers().len(),
        });
    }
    Ok(repairs)
}
