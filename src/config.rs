use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://marvelrivalsapi.com/api/";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_HERO_INFO: &str = "hero_info.csv";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub hero_info: PathBuf,
    pub season: Option<u32>,
    pub gamemode: Option<u8>,
}

impl Settings {
    /// Reads `.env.local` / `.env` (if present) and then the process
    /// environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self {
            api_key: env::var("MRAPI_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: env::var("MRAPI_BASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            data_dir: env_path("MRAPI_DATA_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            hero_info: env_path("MRAPI_HERO_INFO")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HERO_INFO)),
            season: env::var("MRAPI_SEASON")
                .ok()
                .and_then(|val| parse_season(&val, "MRAPI_SEASON")),
            gamemode: env::var("MRAPI_GAMEMODE")
                .ok()
                .and_then(|val| parse_gamemode(&val, "MRAPI_GAMEMODE")),
        }
    }

    /// `--data-dir`, `--hero-info`, `--season` and `--gamemode` override the
    /// environment.
    pub fn apply_args(&mut self) {
        if let Some(dir) = arg_value("data-dir") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = arg_value("hero-info") {
            self.hero_info = PathBuf::from(path);
        }
        if let Some(season) = arg_value("season").and_then(|s| parse_season(&s, "--season")) {
            self.season = Some(season);
        }
        if let Some(mode) = arg_value("gamemode").and_then(|s| parse_gamemode(&s, "--gamemode")) {
            self.gamemode = Some(mode);
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("MRAPI_KEY is not set (export it or put it in .env)"))
    }
}

/// Season number; anything else is ignored with a warning.
pub fn parse_season(raw: &str, source: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(season) => Some(season),
        Err(err) => {
            warn!(source, value = trimmed, %err, "ignoring season; history will not be filtered");
            None
        }
    }
}

/// Game mode 0, 1 or 2; anything else is ignored with a warning.
pub fn parse_gamemode(raw: &str, source: &str) -> Option<u8> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u8>() {
        Ok(mode) if mode <= 2 => Some(mode),
        _ => {
            warn!(source, value = trimmed, "ignoring gamemode (expected 0, 1 or 2)");
            None
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

/// Value of `--name value` or `--name=value` from the process arguments.
pub fn arg_value(name: &str) -> Option<String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    find_arg_value(&args, name)
}

pub fn find_arg_value(args: &[String], name: &str) -> Option<String> {
    let flag = format!("--{name}");
    let prefix = format!("--{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
        {
            let trimmed = next.trim();
            if !trimmed.is_empty() && !trimmed.starts_with("--") {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}
