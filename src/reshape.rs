//! Turns nested match records into the three flat output tables.
//!
//! The match -> player -> hero-session nesting is flattened in one pass into
//! [`SessionRow`], which keeps the player-level and session-level versions of
//! the overlapping stats under distinct field names. Everything after that
//! is filtering, joining against hero metadata and grouping.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::MalformedRecord;
use crate::hero_meta::{AttackType, HeroCatalog, Role};
use crate::records::MatchRecord;
use crate::team_stats::{TeamAggregate, aggregate_teams};

/// One hero session with its player and match context.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub match_uid: String,
    pub player_uid: i64,
    pub name: String,
    pub cur_hero_id: Option<i64>,
    pub is_win: bool,
    pub player_kills: Option<i64>,
    pub player_deaths: Option<i64>,
    pub player_assists: Option<i64>,
    pub hero_damage: Option<f64>,
    pub hero_healed: Option<f64>,
    pub damage_taken: Option<f64>,
    pub hero_id: Option<i64>,
    pub play_time_raw: Option<f64>,
    /// `play_time_raw` rounded half-to-even.
    pub play_time: Option<i64>,
    pub hit_rate: Option<f64>,
    pub kills: Option<i64>,
    pub deaths: Option<i64>,
    pub assists: Option<i64>,
}

/// A session row that matched a known hero.
#[derive(Debug, Clone, PartialEq)]
pub struct HeroStatRow {
    pub session: SessionRow,
    pub hero_id: i64,
    pub attack_type: AttackType,
    pub role: Role,
}

impl HeroStatRow {
    pub fn is_primary(&self) -> bool {
        self.session.cur_hero_id == Some(self.hero_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReshapeReport {
    pub matches_in: usize,
    pub duplicate_matches: usize,
    pub duplicate_players: usize,
    pub players: usize,
    pub players_without_heroes: usize,
    pub sessions: usize,
    pub unknown_hero_rows: usize,
    pub missing_play_time_rows: usize,
    pub zero_play_time_rows: usize,
    pub duplicate_primary_rows: usize,
    pub rejected_matches: usize,
    pub matches_without_primary_rows: usize,
    pub oversized_matches: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Flattened {
    pub rows: Vec<SessionRow>,
    /// Matches that list the same player more than once.
    pub rejected: Vec<MalformedRecord>,
    pub report: ReshapeReport,
}

/// Primary-hero rows plus the matches where some player has more than one.
#[derive(Debug, Clone, Default)]
pub struct PrimaryRows {
    pub rows: Vec<HeroStatRow>,
    pub repeated: Vec<MalformedRecord>,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Reshaped {
    /// Every valid hero session.
    pub individual: Vec<HeroStatRow>,
    /// One row per player per match: the session on the hero they ended on.
    pub players: Vec<HeroStatRow>,
    pub teams: Vec<TeamAggregate>,
    /// Matches dropped because a player appears in them more than once.
    pub rejected: Vec<MalformedRecord>,
    pub report: ReshapeReport,
}

pub fn round_play_time(raw: f64) -> Option<i64> {
    let rounded = raw.round_ties_even();
    rounded.is_finite().then_some(rounded as i64)
}

/// Explodes matches into players and players into hero sessions. A repeated
/// match keeps its first occurrence; a match listing the same player twice
/// is rejected whole.
pub fn flatten_matches(matches: &[MatchRecord]) -> Flattened {
    let mut report = ReshapeReport {
        matches_in: matches.len(),
        ..ReshapeReport::default()
    };
    let mut seen_matches = HashSet::new();
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for record in matches {
        if !seen_matches.insert(record.match_uid.as_str()) {
            report.duplicate_matches += 1;
            continue;
        }
        let mut seen_players = HashSet::new();
        let repeated = record
            .match_players
            .iter()
            .filter(|player| !seen_players.insert(player.player_uid))
            .map(|player| player.player_uid)
            .collect::<BTreeSet<_>>();
        if !repeated.is_empty() {
            report.duplicate_players += record.match_players.len() - seen_players.len();
            rejected.push(MalformedRecord::new(
                record.match_uid.as_str(),
                format!("player_uid listed more than once: {repeated:?}"),
            ));
            continue;
        }
        for player in &record.match_players {
            report.players += 1;
            if player.player_heroes.is_empty() {
                report.players_without_heroes += 1;
                continue;
            }
            for session in &player.player_heroes {
                report.sessions += 1;
                rows.push(SessionRow {
                    match_uid: record.match_uid.clone(),
                    player_uid: player.player_uid,
                    name: player.nick_name.clone(),
                    cur_hero_id: player.cur_hero_id,
                    is_win: player.is_win,
                    player_kills: player.kills,
                    player_deaths: player.deaths,
                    player_assists: player.assists,
                    hero_damage: player.total_hero_damage,
                    hero_healed: player.total_hero_heal,
                    damage_taken: player.total_damage_taken,
                    hero_id: session.hero_id,
                    play_time_raw: session.play_time,
                    play_time: session.play_time.and_then(round_play_time),
                    hit_rate: session.session_hit_rate,
                    kills: session.kills,
                    deaths: session.deaths,
                    assists: session.assists,
                });
            }
        }
    }

    report.rejected_matches = rejected.len();
    Flattened {
        rows,
        rejected,
        report,
    }
}

/// Inner join on hero id. Returns the joined rows and how many were dropped.
pub fn join_hero_meta(rows: &[SessionRow], catalog: &HeroCatalog) -> (Vec<HeroStatRow>, usize) {
    let mut dropped = 0usize;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(hero) = row.hero_id.and_then(|id| catalog.get(id)) else {
            dropped += 1;
            continue;
        };
        out.push(HeroStatRow {
            session: row.clone(),
            hero_id: hero.id,
            attack_type: hero.attack_type,
            role: hero.role,
        });
    }
    (out, dropped)
}

/// Drops rows with no usable play time, then leavers (zero play time).
/// Returns (kept, missing, zero).
pub fn drop_invalid_play_time(rows: Vec<HeroStatRow>) -> (Vec<HeroStatRow>, usize, usize) {
    let mut missing = 0usize;
    let mut zero = 0usize;
    let kept = rows
        .into_iter()
        .filter(|row| match row.session.play_time {
            None => {
                missing += 1;
                false
            }
            Some(0) => {
                zero += 1;
                false
            }
            Some(_) => true,
        })
        .collect();
    (kept, missing, zero)
}

/// Keeps rows whose hero is the player's end-of-match hero. A player with
/// more than one such row would break the one-row-per-player key, so every
/// row of that match is withheld and the match reported.
pub fn primary_hero_rows(rows: &[HeroStatRow]) -> PrimaryRows {
    let mut seen = HashSet::new();
    let mut repeated = BTreeSet::new();
    let mut duplicate_rows = 0usize;
    for row in rows.iter().filter(|row| row.is_primary()) {
        if !seen.insert((row.session.match_uid.as_str(), row.session.player_uid)) {
            duplicate_rows += 1;
            repeated.insert(row.session.match_uid.as_str());
        }
    }

    let kept = rows
        .iter()
        .filter(|row| row.is_primary() && !repeated.contains(row.session.match_uid.as_str()))
        .cloned()
        .collect();
    let repeated = repeated
        .into_iter()
        .map(|uid| MalformedRecord::new(uid, "player has more than one primary-hero session"))
        .collect();
    PrimaryRows {
        rows: kept,
        repeated,
        duplicate_rows,
    }
}

pub fn reshape(matches: &[MatchRecord], catalog: &HeroCatalog) -> Reshaped {
    let Flattened {
        rows,
        mut rejected,
        mut report,
    } = flatten_matches(matches);

    let (joined, unknown) = join_hero_meta(&rows, catalog);
    report.unknown_hero_rows = unknown;

    let (individual, missing, zero) = drop_invalid_play_time(joined);
    report.missing_play_time_rows = missing;
    report.zero_play_time_rows = zero;

    let primary = primary_hero_rows(&individual);
    let players = primary.rows;
    report.duplicate_primary_rows = primary.duplicate_rows;
    let repeated_primary = primary
        .repeated
        .iter()
        .map(|err| err.match_uid.clone())
        .collect::<BTreeSet<_>>();
    rejected.extend(primary.repeated);
    report.rejected_matches = rejected.len();

    let teams = aggregate_teams(&players);
    let oversized = teams
        .iter()
        .filter(|team| team.is_oversized())
        .map(|team| team.match_uid.clone())
        .collect::<BTreeSet<_>>();
    report.oversized_matches = oversized.len();

    let teams = teams
        .into_iter()
        .filter(|team| !oversized.contains(&team.match_uid))
        .collect::<Vec<_>>();
    let valid = teams
        .iter()
        .map(|team| team.match_uid.as_str())
        .collect::<HashSet<_>>();

    let individual_matches = individual
        .iter()
        .map(|row| row.session.match_uid.as_str())
        .collect::<HashSet<_>>();
    report.matches_without_primary_rows = individual_matches
        .iter()
        .filter(|uid| {
            !valid.contains(*uid)
                && !oversized.contains(**uid)
                && !repeated_primary.contains(**uid)
        })
        .count();

    let individual = keep_matches(individual, &valid);
    let players = keep_matches(players, &valid);

    Reshaped {
        individual,
        players,
        teams,
        rejected,
        report,
    }
}

fn keep_matches(rows: Vec<HeroStatRow>, valid: &HashSet<&str>) -> Vec<HeroStatRow> {
    rows.into_iter()
        .filter(|row| valid.contains(row.session.match_uid.as_str()))
        .collect()
}

impl ReshapeReport {
    pub fn log(&self) {
        info!(
            matches = self.matches_in,
            players = self.players,
            sessions = self.sessions,
            "flattened match records"
        );
        if self.duplicate_matches > 0 {
            warn!(matches = self.duplicate_matches, "dropped repeated match records");
        }
        if self.rejected_matches > 0 {
            warn!(
                matches = self.rejected_matches,
                repeated_players = self.duplicate_players,
                repeated_primary_rows = self.duplicate_primary_rows,
                "rejected matches with repeated players"
            );
        }
        if self.players_without_heroes > 0 {
            info!(
                players = self.players_without_heroes,
                "players with no hero sessions contributed no rows"
            );
        }
        info!(
            unknown_hero = self.unknown_hero_rows,
            missing_play_time = self.missing_play_time_rows,
            zero_play_time = self.zero_play_time_rows,
            "dropped session rows"
        );
        if self.oversized_matches > 0 || self.matches_without_primary_rows > 0 {
            warn!(
                oversized = self.oversized_matches,
                without_primary_rows = self.matches_without_primary_rows,
                "discarded matches"
            );
        }
    }
}

/// Output row for the individual and player tables. Which copy of the
/// overlapping columns (`kills`, `deaths`, `assists`) it carries depends on
/// the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatRow<'a> {
    pub match_uid: &'a str,
    pub player_uid: i64,
    pub name: &'a str,
    pub is_win: u8,
    pub hero_id: i64,
    pub role: &'static str,
    pub attack_type: &'static str,
    pub play_time: Option<i64>,
    pub hit_rate: Option<f64>,
    pub kills: Option<i64>,
    pub deaths: Option<i64>,
    pub assists: Option<i64>,
    pub hero_damage: Option<f64>,
    pub hero_healed: Option<f64>,
    pub damage_taken: Option<f64>,
}

impl<'a> StatRow<'a> {
    /// Combat counts from the hero session.
    pub fn session_level(row: &'a HeroStatRow) -> Self {
        let s = &row.session;
        Self::base(row, s.kills, s.deaths, s.assists)
    }

    /// Combat counts from the player's match totals.
    pub fn player_level(row: &'a HeroStatRow) -> Self {
        let s = &row.session;
        Self::base(row, s.player_kills, s.player_deaths, s.player_assists)
    }

    fn base(
        row: &'a HeroStatRow,
        kills: Option<i64>,
        deaths: Option<i64>,
        assists: Option<i64>,
    ) -> Self {
        let s = &row.session;
        Self {
            match_uid: &s.match_uid,
            player_uid: s.player_uid,
            name: &s.name,
            is_win: u8::from(s.is_win),
            hero_id: row.hero_id,
            role: row.role.as_str(),
            attack_type: row.attack_type.as_str(),
            play_time: s.play_time,
            hit_rate: s.hit_rate,
            kills,
            deaths,
            assists,
            hero_damage: s.hero_damage,
            hero_healed: s.hero_healed,
            damage_taken: s.damage_taken,
        }
    }
}

impl Reshaped {
    pub fn individual_rows(&self) -> Vec<StatRow<'_>> {
        self.individual.iter().map(StatRow::session_level).collect()
    }

    pub fn player_rows(&self) -> Vec<StatRow<'_>> {
        self.players.iter().map(StatRow::player_level).collect()
    }
}

pub fn write_rows<S: Serialize>(writer: impl Write, rows: &[S]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for row in rows {
        out.serialize(row).context("write csv row")?;
    }
    out.flush().context("flush csv")?;
    Ok(())
}

pub fn write_rows_to_path<S: Serialize>(path: &Path, rows: &[S]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let file = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_rows(file, rows).with_context(|| format!("write {}", path.display()))
}

pub fn rows_to_csv_string<S: Serialize>(rows: &[S]) -> Result<String> {
    let mut buf = Vec::new();
    write_rows(&mut buf, rows)?;
    String::from_utf8(buf).context("csv output is not utf-8")
}
