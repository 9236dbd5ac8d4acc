use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::calibration::{CalibrationConfig, TEMPERATURE_MAX, TEMPERATURE_MIN};
use crate::rating_book::RatingEntry;

/// Replaces `path` wholesale: write a sibling temp file, then rename over the target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

pub fn save_calibration(path: &Path, config: &CalibrationConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("serialize calibration config")?;
    write_atomic(path, &json)
}

pub fn load_calibration(path: &Path) -> Result<CalibrationConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read calibration config {}", path.display()))?;
    let config: CalibrationConfig =
        serde_json::from_str(&raw).context("invalid calibration config json")?;
    if !config.temperature.is_finite()
        || !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&config.temperature)
    {
        return Err(anyhow!(
            "calibration temperature {} outside [{TEMPERATURE_MIN}, {TEMPERATURE_MAX}]",
            config.temperature
        ));
    }
    Ok(config)
}

pub fn save_ratings(path: &Path, entries: &[RatingEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).context("serialize ratings snapshot")?;
    write_atomic(path, &json)
}

pub fn load_ratings(path: &Path) -> Result<Vec<RatingEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read ratings snapshot {}", path.display()))?;
    let entries: Vec<RatingEntry> =
        serde_json::from_str(&raw).context("invalid ratings snapshot json")?;
    if let Some(bad) = entries.iter().find(|e| !e.rating.value.is_finite()) {
        return Err(anyhow!("team {} has a non-finite rating", bad.team_id));
    }
    Ok(entries)
}
