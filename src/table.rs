//! A loosely-typed string table for the raw API dumps and for repairing
//! previously written CSV files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Which copy survives when two columns end up with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepPolicy {
    First,
    Last,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Flattens each JSON document into one row. Nested objects become
    /// dot-joined column names; arrays are kept as JSON text. Columns appear
    /// in first-seen order across all documents.
    pub fn from_json_documents(docs: &[Value]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut flat_rows = Vec::with_capacity(docs.len());

        for doc in docs {
            let mut cells = Vec::new();
            match doc {
                Value::Object(map) => flatten_object(map, "", &mut cells),
                other => cells.push(("value".to_string(), cell_text(other))),
            }
            for (key, _) in &cells {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), headers.len());
                    headers.push(key.clone());
                }
            }
            flat_rows.push(cells);
        }

        let rows = flat_rows
            .into_iter()
            .map(|cells| {
                let mut row = vec![String::new(); headers.len()];
                for (key, value) in cells {
                    if let Some(idx) = positions.get(&key) {
                        row[*idx] = value;
                    }
                }
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("open csv {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("read csv header {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("read csv row {}", path.display()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::new(headers, rows))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("create csv {}", path.display()))?;
        writer
            .write_record(&self.headers)
            .context("write csv header")?;
        for row in &self.rows {
            writer.write_record(row).context("write csv row")?;
        }
        writer.flush().context("flush csv")?;
        Ok(())
    }

    /// Strips any of `suffixes` from the end of each header, then drops
    /// columns whose name repeats, keeping the copy chosen by `keep`.
    pub fn normalize_headers(&self, suffixes: &[&str], keep: KeepPolicy) -> Self {
        let stripped = self
            .headers
            .iter()
            .map(|h| strip_suffix(h, suffixes))
            .collect::<Vec<_>>();

        let mut chosen: HashMap<&str, usize> = HashMap::new();
        for (idx, name) in stripped.iter().enumerate() {
            match keep {
                KeepPolicy::First => {
                    chosen.entry(name.as_str()).or_insert(idx);
                }
                KeepPolicy::Last => {
                    chosen.insert(name.as_str(), idx);
                }
            }
        }

        let kept = (0..stripped.len())
            .filter(|idx| chosen.get(stripped[*idx].as_str()) == Some(idx))
            .collect::<Vec<_>>();

        let headers = kept.iter().map(|idx| stripped[*idx].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| kept.iter().map(|idx| row[*idx].clone()).collect())
            .collect();
        Self { headers, rows }
    }
}

fn strip_suffix(header: &str, suffixes: &[&str]) -> String {
    for suffix in suffixes {
        if let Some(stem) = header.strip_suffix(suffix)
            && !stem.is_empty()
        {
            return stem.to_string();
        }
    }
    header.to_string()
}

fn flatten_object(map: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_object(inner, &name, out),
            other => out.push((name, cell_text(other))),
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flattens_nested_objects_and_keeps_arrays_as_json() {
        let docs = vec![
            json!({"match_details": {"match_uid": "m1", "match_players": [{"player_uid": 1}]}}),
            json!({"match_details": {"match_uid": "m2", "map": "Tokyo"}}),
        ];
        let table = Table::from_json_documents(&docs);
        assert_eq!(
            table.headers(),
            &[
                "match_details.match_uid",
                "match_details.match_players",
                "match_details.map"
            ]
        );
        assert_eq!(table.rows()[0][1], r#"[{"player_uid":1}]"#);
        assert_eq!(table.rows()[1][1], "");
        assert_eq!(table.rows()[1][2], "Tokyo");
    }

    #[test]
    fn normalize_headers_respects_keep_policy() {
        let table = Table::new(
            vec![
                "hero_id_x".into(),
                "kills_x".into(),
                "hero_id_y".into(),
                "kills_y".into(),
                "role".into(),
            ],
            vec![vec![
                "1".into(),
                "3".into(),
                "1".into(),
                "9".into(),
                "DUELIST".into(),
            ]],
        );

        let first = table.normalize_headers(&["_x", "_y"], KeepPolicy::First);
        assert_eq!(first.headers(), &["hero_id", "kills", "role"]);
        assert_eq!(first.rows()[0], vec!["1", "3", "DUELIST"]);

        let last = table.normalize_headers(&["_x", "_y"], KeepPolicy::Last);
        assert_eq!(last.headers(), &["hero_id", "kills", "role"]);
        assert_eq!(last.rows()[0], vec!["1", "9", "DUELIST"]);
    }

    #[test]
    fn only_trailing_suffixes_are_stripped() {
        let table = Table::new(vec!["max_xp".into(), "x_y".into()], vec![]);
        let out = table.normalize_headers(&["_x", "_y"], KeepPolicy::First);
        assert_eq!(out.headers(), &["max_xp", "x"]);
    }
}
