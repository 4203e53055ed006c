use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::error::{DataFileError, MalformedRecord};
use crate::table::Table;

const PLAYERS_COLUMNS: &[&str] = &["match_details.match_players", "match_players"];
const MATCH_UID_COLUMNS: &[&str] = &["match_details.match_uid", "match_uid"];

#[derive(Debug, Clone, PartialEq)]
pub struct HeroSession {
    pub hero_id: Option<i64>,
    /// Seconds, as reported (may be fractional).
    pub play_time: Option<f64>,
    pub session_hit_rate: Option<f64>,
    pub kills: Option<i64>,
    pub deaths: Option<i64>,
    pub assists: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player_uid: i64,
    pub nick_name: String,
    pub cur_hero_id: Option<i64>,
    pub is_win: bool,
    pub kills: Option<i64>,
    pub deaths: Option<i64>,
    pub assists: Option<i64>,
    pub total_hero_damage: Option<f64>,
    pub total_hero_heal: Option<f64>,
    pub total_damage_taken: Option<f64>,
    pub player_heroes: Vec<HeroSession>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub match_uid: String,
    pub match_players: Vec<PlayerRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedMatches {
    pub matches: Vec<MatchRecord>,
    pub malformed: Vec<MalformedRecord>,
}

impl ParsedMatches {
    fn push(&mut self, parsed: Result<MatchRecord, MalformedRecord>) {
        match parsed {
            Ok(record) => self.matches.push(record),
            Err(err) => self.malformed.push(err),
        }
    }
}

/// Parses match documents as returned by the `match` endpoint. A document
/// that cannot be parsed is reported, not fatal.
pub fn parse_match_documents(docs: &[Value]) -> ParsedMatches {
    let mut out = ParsedMatches::default();
    for doc in docs {
        out.push(parse_match_document(doc));
    }
    out
}

pub fn parse_match_document(doc: &Value) -> Result<MatchRecord, MalformedRecord> {
    let details = doc.get("match_details").unwrap_or(doc);
    let match_uid = details
        .get("match_uid")
        .and_then(as_identifier)
        .ok_or_else(|| MalformedRecord::new("<unknown>", "missing match_uid"))?;
    let players = details
        .get("match_players")
        .ok_or_else(|| MalformedRecord::new(&match_uid, "missing match_players"))?;
    parse_match(match_uid, players)
}

/// Rebuilds match records from a raw match CSV (one row per match, player
/// list stored as JSON text). A table where no row parses is an error.
pub fn matches_from_table(table: &Table, source: &Path) -> Result<ParsedMatches> {
    let players_idx = find_column(table, PLAYERS_COLUMNS, source)?;
    let uid_idx = find_column(table, MATCH_UID_COLUMNS, source)?;

    let mut out = ParsedMatches::default();
    for row in table.rows() {
        let match_uid = row[uid_idx].trim().to_string();
        if match_uid.is_empty() {
            out.malformed
                .push(MalformedRecord::new("<unknown>", "empty match_uid cell"));
            continue;
        }
        let players = match serde_json::from_str::<Value>(&row[players_idx]) {
            Ok(value) => value,
            Err(err) => {
                out.malformed.push(MalformedRecord::new(
                    &match_uid,
                    format!("match_players is not valid json: {err}"),
                ));
                continue;
            }
        };
        out.push(parse_match(match_uid, &players));
    }
    if out.matches.is_empty()
        && let Some(first) = out.malformed.first()
    {
        return Err(DataFileError::NoUsableRows {
            path: source.to_path_buf(),
            rows: out.malformed.len(),
            first: first.clone(),
        }
        .into());
    }
    Ok(out)
}

fn find_column(table: &Table, names: &[&str], source: &Path) -> Result<usize> {
    names
        .iter()
        .find_map(|name| table.column_index(name))
        .ok_or_else(|| {
            DataFileError::MissingColumn {
                path: source.to_path_buf(),
                column: names[0].to_string(),
            }
            .into()
        })
}

fn parse_match(match_uid: String, players: &Value) -> Result<MatchRecord, MalformedRecord> {
    let Some(items) = players.as_array() else {
        return Err(MalformedRecord::new(&match_uid, "match_players is not a list"));
    };
    let mut match_players = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let player = parse_player(item)
            .map_err(|reason| MalformedRecord::new(&match_uid, format!("player #{idx}: {reason}")))?;
        match_players.push(player);
    }
    Ok(MatchRecord {
        match_uid,
        match_players,
    })
}

fn parse_player(value: &Value) -> Result<PlayerRecord, String> {
    if !value.is_object() {
        return Err("player entry is not an object".to_string());
    }
    let player_uid = int_field(value, "player_uid")?.ok_or("missing player_uid")?;
    let is_win = bool_field(value, "is_win")?.ok_or("missing is_win")?;

    let player_heroes = match value.get("player_heroes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(parse_session)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err("player_heroes is not a list".to_string()),
    };

    Ok(PlayerRecord {
        player_uid,
        nick_name: value
            .get("nick_name")
            .and_then(as_identifier)
            .unwrap_or_default(),
        cur_hero_id: int_field(value, "cur_hero_id")?,
        is_win,
        kills: int_field(value, "kills")?,
        deaths: int_field(value, "deaths")?,
        assists: int_field(value, "assists")?,
        total_hero_damage: float_field(value, "total_hero_damage")?,
        total_hero_heal: float_field(value, "total_hero_heal")?,
        total_damage_taken: float_field(value, "total_damage_taken")?,
        player_heroes,
    })
}

fn parse_session(value: &Value) -> Result<HeroSession, String> {
    if !value.is_object() {
        return Err("hero session is not an object".to_string());
    }
    Ok(HeroSession {
        hero_id: int_field(value, "hero_id")?,
        play_time: play_time_field(value)?,
        session_hit_rate: float_field(value, "session_hit_rate")?,
        kills: int_field(value, "kills")?,
        deaths: int_field(value, "deaths")?,
        assists: int_field(value, "assists")?,
    })
}

// Play time shows up either as a bare number or as `{raw, minutes, seconds}`.
fn play_time_field(value: &Value) -> Result<Option<f64>, String> {
    for key in ["play_time", "playtime"] {
        match value.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::Object(inner)) => {
                return coerce_float(inner.get("raw"), key);
            }
            other => return coerce_float(other, key),
        }
    }
    Ok(None)
}

fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(value: &Value, key: &str) -> Result<Option<i64>, String> {
    coerce_int(value.get(key), key)
}

fn float_field(value: &Value, key: &str) -> Result<Option<f64>, String> {
    coerce_float(value.get(key), key)
}

fn coerce_int(value: Option<&Value>, key: &str) -> Result<Option<i64>, String> {
    let Some(raw) = coerce_float_or_int(value, key)? else {
        return Ok(None);
    };
    match raw {
        Number::Int(v) => Ok(Some(v)),
        Number::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(Some(v as i64)),
        Number::Float(v) => Err(format!("{key} is not a whole number ({v})")),
    }
}

fn coerce_float(value: Option<&Value>, key: &str) -> Result<Option<f64>, String> {
    Ok(coerce_float_or_int(value, key)?.map(|n| match n {
        Number::Int(v) => v as f64,
        Number::Float(v) => v,
    }))
}

enum Number {
    Int(i64),
    Float(f64),
}

fn coerce_float_or_int(value: Option<&Value>, key: &str) -> Result<Option<Number>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                Ok(Some(Number::Int(v)))
            } else if let Some(v) = n.as_f64() {
                Ok(Some(Number::Float(v)))
            } else {
                Err(format!("{key} is out of range"))
            }
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            if let Ok(v) = trimmed.parse::<i64>() {
                return Ok(Some(Number::Int(v)));
            }
            trimmed
                .parse::<f64>()
                .map(|v| Some(Number::Float(v)))
                .map_err(|_| format!("{key} is not numeric ({trimmed})"))
        }
        Some(other) => Err(format!("{key} has unexpected type ({other})")),
    }
}

fn bool_field(value: &Value, key: &str) -> Result<Option<bool>, String> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 0.0 => Ok(Some(false)),
            Some(v) if v == 1.0 => Ok(Some(true)),
            _ => Err(format!("{key} is not 0/1 ({n})")),
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(Some(true)),
            "0" | "false" => Ok(Some(false)),
            other => Err(format!("{key} is not a boolean ({other})")),
        },
        Some(other) => Err(format!("{key} has unexpected type ({other})")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_nested_play_time_and_string_ids() {
        let doc = json!({
            "match_details": {
                "match_uid": "m-1",
                "match_players": [{
                    "player_uid": "1001",
                    "nick_name": "alpha",
                    "cur_hero_id": 1011,
                    "is_win": 1,
                    "kills": 10.0,
                    "player_heroes": [
                        {"hero_id": 1011, "play_time": {"raw": 612.6, "minutes": 10, "seconds": 12}}
                    ]
                }]
            }
        });
        let record = parse_match_document(&doc).expect("valid match");
        let player = &record.match_players[0];
        assert_eq!(player.player_uid, 1001);
        assert!(player.is_win);
        assert_eq!(player.kills, Some(10));
        assert_eq!(player.deaths, None);
        assert_eq!(player.player_heroes[0].play_time, Some(612.6));
    }

    #[test]
    fn fractional_kills_fail_the_match() {
        let doc = json!({
            "match_uid": "m-2",
            "match_players": [{"player_uid": 1, "is_win": false, "kills": 2.5}]
        });
        let err = parse_match_document(&doc).unwrap_err();
        assert_eq!(err.match_uid, "m-2");
        assert!(err.reason.contains("kills"));
    }

    #[test]
    fn missing_player_heroes_is_an_empty_list() {
        let doc = json!({
            "match_uid": "m-3",
            "match_players": [{"player_uid": 1, "is_win": true}]
        });
        let record = parse_match_document(&doc).unwrap();
        assert!(record.match_players[0].player_heroes.is_empty());
    }

    #[test]
    fn missing_players_is_reported() {
        let parsed = parse_match_documents(&[json!({"match_details": {"match_uid": "m-4"}})]);
        assert!(parsed.matches.is_empty());
        assert_eq!(parsed.malformed.len(), 1);
        assert_eq!(parsed.malformed[0].match_uid, "m-4");
    }

    fn raw_table(players_cells: &[&str]) -> Table {
        Table::new(
            vec![
                "match_details.match_uid".to_string(),
                "match_details.match_players".to_string(),
            ],
            players_cells
                .iter()
                .enumerate()
                .map(|(idx, cell)| vec![format!("m-{idx}"), cell.to_string()])
                .collect(),
        )
    }

    #[test]
    fn table_with_python_literal_players_is_rejected() {
        let table = raw_table(&[
            "[{'player_uid': 1, 'is_win': True}]",
            "[{'player_uid': 2, 'is_win': False}]",
        ]);
        let err = matches_from_table(&table, Path::new("match_data_old.csv")).unwrap_err();
        match err.downcast_ref::<DataFileError>() {
            Some(DataFileError::NoUsableRows { rows, first, .. }) => {
                assert_eq!(*rows, 2);
                assert_eq!(first.match_uid, "m-0");
                assert!(first.reason.contains("not valid json"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn table_with_some_good_rows_keeps_going() {
        let table = raw_table(&[
            "[{'player_uid': 1, 'is_win': True}]",
            r#"[{"player_uid": 2, "is_win": false}]"#,
        ]);
        let parsed = matches_from_table(&table, Path::new("match_data_mixed.csv")).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert_eq!(parsed.matches[0].match_uid, "m-1");
        assert_eq!(parsed.malformed.len(), 1);
    }
}
