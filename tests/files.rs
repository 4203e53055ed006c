use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tempfile::TempDir;

use rivals_stats::config::Settings;
use rivals_stats::data_files::{self, RAW_MATCH_PATTERN};
use rivals_stats::error::DataFileError;
use rivals_stats::pipeline::{clean_file, fix_file_headers};
use rivals_stats::table::Table;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn settings_for(dir: &Path) -> Settings {
    Settings {
        api_key: None,
        base_url: "https://example.test/api/".to_string(),
        data_dir: dir.to_path_buf(),
        hero_info: fixture_path("hero_info.csv"),
        season: None,
        gamemode: None,
    }
}

fn write_raw_fixture(path: &Path) {
    let raw = fs::read_to_string(fixture_path("matches.json")).expect("fixture file should be readable");
    let docs: Vec<Value> = serde_json::from_str(&raw).expect("fixture should parse");
    Table::from_json_documents(&docs)
        .write_csv(path)
        .expect("raw table should be writable");
}

fn set_mtime(path: &Path, secs_ago: u64) {
    let file = File::options().write(true).open(path).expect("open for mtime");
    file.set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
        .expect("set mtime");
}

#[test]
fn cleans_latest_raw_file_into_three_tables() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let old = dir.join("match_data_1_999_2024-01-01.csv");
    let new = dir.join("match_data_2_12345_2025-03-01.csv");
    write_raw_fixture(&old);
    write_raw_fixture(&new);
    set_mtime(&old, 3600);
    set_mtime(&new, 60);

    let summary = clean_file(&settings_for(dir), None).unwrap();
    assert_eq!(summary.input, new);
    assert_eq!(summary.malformed, 1);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.individual_rows, 12);
    assert_eq!(summary.player_rows, 10);
    assert_eq!(summary.team_rows, 2);

    assert_eq!(
        summary.paths.individual,
        dir.join("cleaned_match_data_individual_stats_2_12345_2025-03-01.csv")
    );
    assert_eq!(
        summary.paths.players,
        dir.join("cleaned_match_data_2_12345_2025-03-01.csv")
    );

    let teams = Table::read_csv(&summary.paths.teams).unwrap();
    assert_eq!(teams.len(), 2);
    assert_eq!(
        teams.column("primary_attack_type").unwrap(),
        vec!["hitscan", "melee"]
    );

    let players = Table::read_csv(&summary.paths.players).unwrap();
    let hero_ids = players.column("hero_id").unwrap();
    assert_eq!(hero_ids.len(), 10);
    assert!(players.headers().iter().all(|h| !h.ends_with("_x") && !h.ends_with("_y")));
}

#[test]
fn explicit_input_wins_over_discovery() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let chosen = dir.join("match_data_chosen.csv");
    write_raw_fixture(&chosen);
    write_raw_fixture(&dir.join("match_data_newer.csv"));
    set_mtime(&chosen, 3600);

    let summary = clean_file(&settings_for(dir), Some(&chosen)).unwrap();
    assert_eq!(summary.input, chosen);
    assert!(summary.paths.teams.ends_with("cleaned_match_data_team_stats_chosen.csv"));
}

#[test]
fn missing_raw_file_is_a_typed_error() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("cleaned_match_data_x.csv"), "a,b\n1,2\n").unwrap();

    let err = clean_file(&settings_for(dir), None).unwrap_err();
    let typed = err.downcast_ref::<DataFileError>().expect("typed file error");
    assert!(matches!(typed, DataFileError::Missing { pattern, .. } if pattern == RAW_MATCH_PATTERN));
}

#[test]
fn raw_file_with_no_parseable_rows_fails_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let input = dir.join("match_data_legacy.csv");
    fs::write(
        &input,
        "match_details.match_uid,match_details.match_players\n\
         m-1,\"[{'player_uid': 1, 'is_win': True}]\"\n\
         m-2,\"[{'player_uid': 2, 'is_win': False}]\"\n",
    )
    .unwrap();

    let err = clean_file(&settings_for(dir), None).unwrap_err();
    let typed = err.downcast_ref::<DataFileError>().expect("typed file error");
    assert!(matches!(typed, DataFileError::NoUsableRows { rows: 2, .. }));
    assert!(!dir.join("cleaned_match_data_team_stats_legacy.csv").exists());
}

#[test]
fn latest_matching_skips_excluded_patterns() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let plain = dir.join("cleaned_match_data_a.csv");
    let team = dir.join("cleaned_match_data_team_stats_a.csv");
    fs::write(&plain, "x\n").unwrap();
    fs::write(&team, "x\n").unwrap();
    set_mtime(&plain, 600);

    let found = data_files::latest_matching_excluding(
        dir,
        data_files::PLAYER_PATTERN,
        &[data_files::TEAM_PATTERN, data_files::INDIVIDUAL_PATTERN],
    )
    .unwrap();
    assert_eq!(found, plain);
}

#[test]
fn legacy_headers_are_repaired_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(
        dir.join("cleaned_match_data_individual_stats_a.csv"),
        "hero_id_x,kills_x,hero_id_y,kills_y,role\n1011,3,1011,9,VANGUARD\n",
    )
    .unwrap();
    fs::write(
        dir.join("cleaned_match_data_a.csv"),
        "hero_id_x,kills_x,hero_id_y,kills_y,role\n1011,3,1011,9,VANGUARD\n",
    )
    .unwrap();
    fs::write(
        dir.join("cleaned_match_data_team_stats_a.csv"),
        "match_uid,is_win,total_kills\nm,1,20\n",
    )
    .unwrap();

    let repairs = fix_file_headers(dir).unwrap();
    assert_eq!(repairs.len(), 3);

    let individual = Table::read_csv(&dir.join("cleaned_match_data_individual_stats_a.csv")).unwrap();
    assert_eq!(individual.headers(), &["hero_id", "kills", "role"]);
    assert_eq!(individual.rows()[0], vec!["1011", "3", "VANGUARD"]);

    let players = Table::read_csv(&dir.join("cleaned_match_data_a.csv")).unwrap();
    assert_eq!(players.headers(), &["hero_id", "kills", "role"]);
    assert_eq!(players.rows()[0], vec!["1011", "9", "VANGUARD"]);

    let teams = Table::read_csv(&dir.join("cleaned_match_data_team_stats_a.csv")).unwrap();
    assert_eq!(teams.headers(), &["match_uid", "is_win", "total_kills"]);
}
