use std::path::PathBuf;

use anyhow::{Result, anyhow};

use rivals_stats::config::{Settings, arg_value};
use rivals_stats::hero_meta::parse_heroes_json;
use rivals_stats::logging;
use rivals_stats::mrapi::{ApiVersion, Endpoint, MrApiClient, RequestParams};

fn main() -> Result<()> {
    logging::init();
    let mut settings = Settings::load();
    settings.apply_args();

    let version = match arg_value("api-version") {
        Some(raw) => raw.parse::<ApiVersion>()?,
        None => ApiVersion::V1,
    };
    let out = arg_value("out")
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.hero_info.clone());

    let client = MrApiClient::from_settings(&settings)?;
    let body = client.fetch(version, Endpoint::Heroes, None, &RequestParams::new())?;
    let catalog = parse_heroes_json(&body);
    if catalog.is_empty() {
        return Err(anyhow!("heroes endpoint returned no usable heroes"));
    }
    catalog.write_csv(&out)?;

    println!("Heroes: {}", catalog.len());
    println!("Written: {}", out.display());
    Ok(())
}
