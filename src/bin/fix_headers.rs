use anyhow::Result;

use rivals_stats::config::Settings;
use rivals_stats::logging;
use rivals_stats::pipeline;

fn main() -> Result<()> {
    logging::init();
    let mut settings = Settings::load();
    settings.apply_args();

    let repairs = pipeline::fix_file_headers(&settings.data_dir)?;
    for repair in repairs {
        println!(
            "{}: {} -> {} columns",
            repair.path.display(),
            repair.columns_before,
            repair.columns_after
        );
    }
    Ok(())
}
