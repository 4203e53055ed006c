//! File naming and discovery inside the data directory.
//!
//! Discovery is "newest matching file wins": two runs writing into the same
//! directory at once can pick up each other's output.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::Local;

use crate::error::DataFileError;

pub const RAW_MATCH_PATTERN: &str = "match_data*.csv";
pub const INDIVIDUAL_PATTERN: &str = "cleaned_match_data_individual_stats*.csv";
pub const TEAM_PATTERN: &str = "cleaned_match_data_team_stats*.csv";
pub const PLAYER_PATTERN: &str = "cleaned_match_data*.csv";

const RAW_MATCH_STEM: &str = "match_data";

/// A single-`*` glob such as `match_data*.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    prefix: String,
    suffix: String,
}

impl FilePattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.split_once('*') {
            Some((prefix, suffix)) => Self {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            None => Self {
                prefix: pattern.to_string(),
                suffix: String::new(),
            },
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() >= self.prefix.len() + self.suffix.len()
            && file_name.starts_with(&self.prefix)
            && file_name.ends_with(&self.suffix)
    }
}

/// Newest file in `dir` matching `pattern`, skipping names that match any of
/// `exclude`.
pub fn latest_matching_excluding(dir: &Path, pattern: &str, exclude: &[&str]) -> Result<PathBuf> {
    let wanted = FilePattern::parse(pattern);
    let excluded = exclude.iter().map(|p| FilePattern::parse(p)).collect::<Vec<_>>();
    let missing = || DataFileError::Missing {
        dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
    };

    if !dir.is_dir() {
        return Err(missing().into());
    }

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !wanted.matches(name) || excluded.iter().any(|p| p.matches(name)) {
            continue;
        }
        let mtime = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let newer = match &best {
            Some((best_time, best_path)) => {
                mtime > *best_time || (mtime == *best_time && path > *best_path)
            }
            None => true,
        };
        if newer {
            best = Some((mtime, path));
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| missing().into())
}

pub fn latest_matching(dir: &Path, pattern: &str) -> Result<PathBuf> {
    latest_matching_excluding(dir, pattern, &[])
}

/// The part of a raw match file name after `match_data_` and before the
/// extension, e.g. `2_12345_2025-03-01`.
pub fn identifier_from_raw_file(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (_, rest) = name.split_once(RAW_MATCH_STEM)?;
    let rest = rest.trim_start_matches('_');
    let id = rest.split('.').next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn season_label(season: Option<u32>) -> String {
    season.map_or_else(|| "current".to_string(), |s| s.to_string())
}

pub fn raw_match_path(dir: &Path, season: Option<u32>, uid: &str, date: &str) -> PathBuf {
    dir.join(format!("match_data_{}_{uid}_{date}.csv", season_label(season)))
}

pub fn raw_history_path(dir: &Path, season: Option<u32>, uid: &str, date: &str) -> PathBuf {
    dir.join(format!("match_history_{}_{uid}_{date}.csv", season_label(season)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedPaths {
    pub individual: PathBuf,
    pub players: PathBuf,
    pub teams: PathBuf,
}

pub fn cleaned_paths(dir: &Path, identifier: &str) -> CleanedPaths {
    CleanedPaths {
        individual: dir.join(format!("cleaned_match_data_individual_stats_{identifier}.csv")),
        players: dir.join(format!("cleaned_match_data_{identifier}.csv")),
        teams: dir.join(format!("cleaned_match_data_team_stats_{identifier}.csv")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_prefix_and_suffix() {
        let p = FilePattern::parse("match_data*.csv");
        assert!(p.matches("match_data_2_123_2025-01-01.csv"));
        assert!(p.matches("match_data.csv"));
        assert!(!p.matches("cleaned_match_data_x.csv"));
        assert!(!p.matches("match_data_2.json"));
    }

    #[test]
    fn identifier_is_carried_forward() {
        let path = Path::new("data/match_data_2_123_2025-01-01.csv");
        assert_eq!(
            identifier_from_raw_file(path).as_deref(),
            Some("2_123_2025-01-01")
        );
        assert_eq!(identifier_from_raw_file(Path::new("data/match_data.csv")), None);
    }

    #[test]
    fn output_names_embed_identifier() {
        let paths = cleaned_paths(Path::new("data"), "2_123_2025-01-01");
        assert_eq!(
            paths.players,
            Path::new("data/cleaned_match_data_2_123_2025-01-01.csv")
        );
        assert_eq!(
            raw_match_path(Path::new("data"), None, "123", "2025-01-01"),
            Path::new("data/match_data_current_123_2025-01-01.csv")
        );
    }
}
