use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

const ATTACK_TYPE_SUFFIX: &str = " Heroes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Vanguard,
    Strategist,
    Duelist,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Vanguard => "VANGUARD",
            Role::Strategist => "STRATEGIST",
            Role::Duelist => "DUELIST",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "VANGUARD" => Some(Role::Vanguard),
            "STRATEGIST" => Some(Role::Strategist),
            "DUELIST" => Some(Role::Duelist),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant order is the tie-break order for a team's primary attack type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackType {
    Melee,
    Projectile,
    Hitscan,
}

impl AttackType {
    pub const TIE_BREAK_ORDER: [AttackType; 3] =
        [AttackType::Melee, AttackType::Projectile, AttackType::Hitscan];

    pub fn as_str(self) -> &'static str {
        match self {
            AttackType::Melee => "Melee",
            AttackType::Projectile => "Projectile",
            AttackType::Hitscan => "Hitscan",
        }
    }

    /// Lower-case label used in the team table (`primary_attack_type`).
    pub fn label(self) -> &'static str {
        match self {
            AttackType::Melee => "melee",
            AttackType::Projectile => "projectile",
            AttackType::Hitscan => "hitscan",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_attack_type(raw).to_ascii_lowercase().as_str() {
            "melee" => Some(AttackType::Melee),
            "projectile" => Some(AttackType::Projectile),
            "hitscan" => Some(AttackType::Hitscan),
            _ => None,
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "Melee Heroes" -> "Melee".
pub fn normalize_attack_type(raw: &str) -> String {
    raw.replace(ATTACK_TYPE_SUFFIX, "").trim().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeroMeta {
    pub id: i64,
    pub name: String,
    pub attack_type: AttackType,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct HeroMetaRow {
    id: String,
    name: String,
    attack_type: String,
    role: String,
}

impl HeroMetaRow {
    fn into_meta(self) -> Result<HeroMeta, String> {
        let id = parse_hero_id(&self.id).ok_or_else(|| format!("bad hero id `{}`", self.id))?;
        let attack_type = AttackType::parse(&self.attack_type)
            .ok_or_else(|| format!("hero {id}: unknown attack type `{}`", self.attack_type))?;
        let role =
            Role::parse(&self.role).ok_or_else(|| format!("hero {id}: unknown role `{}`", self.role))?;
        Ok(HeroMeta {
            id,
            name: self.name.trim().to_string(),
            attack_type,
            role,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeroCatalog {
    by_id: HashMap<i64, HeroMeta>,
}

impl HeroCatalog {
    pub fn from_heroes(heroes: impl IntoIterator<Item = HeroMeta>) -> Self {
        let mut by_id = HashMap::new();
        for hero in heroes {
            by_id.entry(hero.id).or_insert(hero);
        }
        Self { by_id }
    }

    pub fn get(&self, id: i64) -> Option<&HeroMeta> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Heroes sorted by id.
    pub fn heroes(&self) -> Vec<&HeroMeta> {
        let mut out = self.by_id.values().collect::<Vec<_>>();
        out.sort_by_key(|hero| hero.id);
        out
    }

    /// Loads `id,name,attack_type,role` from CSV. Extra columns are ignored;
    /// rows with an unknown role or attack type are skipped with a warning.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("open hero metadata {}", path.display()))?;
        let mut heroes = Vec::new();
        for row in reader.deserialize::<HeroMetaRow>() {
            let row = row.with_context(|| format!("read hero metadata {}", path.display()))?;
            match row.into_meta() {
                Ok(hero) => heroes.push(hero),
                Err(reason) => warn!(%reason, "skipping hero metadata row"),
            }
        }
        let catalog = Self::from_heroes(heroes);
        info!(heroes = catalog.len(), path = %path.display(), "loaded hero metadata");
        Ok(catalog)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("create hero metadata {}", path.display()))?;
        for hero in self.heroes() {
            writer
                .serialize(HeroMetaRow {
                    id: hero.id.to_string(),
                    name: hero.name.clone(),
                    attack_type: format!("{}{ATTACK_TYPE_SUFFIX}", hero.attack_type),
                    role: hero.role.to_string(),
                })
                .context("write hero metadata row")?;
        }
        writer.flush().context("flush hero metadata")?;
        Ok(())
    }
}

/// Parses the `heroes` endpoint payload (a list, or an object holding a
/// `heroes` list).
pub fn parse_heroes_json(root: &Value) -> HeroCatalog {
    let items = root
        .as_array()
        .or_else(|| root.get("heroes").and_then(Value::as_array));
    let Some(items) = items else {
        warn!("heroes payload has no hero list");
        return HeroCatalog::default();
    };

    let mut heroes = Vec::new();
    for item in items {
        let row = HeroMetaRow {
            id: pick_text(item, "id").unwrap_or_default(),
            name: pick_text(item, "name").unwrap_or_default(),
            attack_type: pick_text(item, "attack_type").unwrap_or_default(),
            role: pick_text(item, "role").unwrap_or_default(),
        };
        match row.into_meta() {
            Ok(hero) => heroes.push(hero),
            Err(reason) => warn!(%reason, "skipping hero from api"),
        }
    }
    HeroCatalog::from_heroes(heroes)
}

fn pick_text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_hero_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0)
            .map(|v| v as i64)
    })
}
