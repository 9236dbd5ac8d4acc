use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceConfig;
use crate::elo::EloConfig;
use crate::error::InputValidationError;
use crate::priors::PriorWeights;
use crate::win_prob::DrawModel;

const APP_DIR: &str = "football_ratings";
const DB_FILE: &str = "matches.sqlite";
const CALIBRATION_FILE: &str = "calibration.json";
const RATINGS_FILE: &str = "ratings.json";
const CONFIG_FILE: &str = "model_config.json";

/// Every tunable constant of the rating and probability models.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub elo: EloConfig,
    pub draw: DrawModel,
    pub priors: PriorWeights,
    pub confidence: ConfidenceConfig,
}

impl ModelConfig {
    /// Reads a JSON config the caller asked for; the file must exist. Sections and fields
    /// left out of the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read model config {}", path.display()))?;
        Self::parse(&raw, path)
    }

    /// Like [`ModelConfig::load`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let Ok(raw) = fs::read_to_string(path) else {
            return Ok(Self::default());
        };
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self> {
        let cfg: ModelConfig = serde_json::from_str(raw)
            .with_context(|| format!("invalid model config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Explicit config file, else the app-dir config if present, else defaults. Environment
    /// overrides go on top.
    pub fn from_env_and_file(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::load(path)?,
            None => match default_config_path() {
                Some(path) => Self::load_or_default(&path)?,
                None => Self::default(),
            },
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(k) = env_f64("ELO_K_LEAGUE") {
            self.elo.k_league = k.clamp(1.0, 100.0);
        }
        if let Some(k) = env_f64("ELO_K_CUP") {
            self.elo.k_cup = k.clamp(1.0, 100.0);
        }
        if let Some(k) = env_f64("ELO_K_INTERNATIONAL") {
            self.elo.k_international = k.clamp(1.0, 100.0);
        }
        if let Some(base) = env_f64("ELO_DRAW_BASE") {
            self.draw.base = base.clamp(0.05, 0.50);
        }
        if let Some(step) = env_f64("ELO_TIER_DECREMENT") {
            self.priors.tier_decrement = step.clamp(0.0, 300.0);
        }
        if let Some(games) = env::var("ELO_CONFIDENCE_GAMES")
            .ok()
            .and_then(|val| val.trim().parse::<u32>().ok())
        {
            self.confidence.saturation_games = games.clamp(1, 200);
        }
    }

    pub fn validate(&self) -> Result<(), InputValidationError> {
        for (context, value) in [
            ("elo.k_league", self.elo.k_league),
            ("elo.k_cup", self.elo.k_cup),
            ("elo.k_international", self.elo.k_international),
            ("elo.goal_multiplier_max", self.elo.goal_multiplier_max),
            ("draw.decay", self.draw.decay),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(context, value));
            }
        }
        if !(self.draw.min > 0.0 && self.draw.min <= self.draw.max && self.draw.max < 1.0) {
            return Err(invalid("draw.min..draw.max", self.draw.max));
        }
        if !self.draw.base.is_finite() || self.draw.base <= 0.0 {
            return Err(invalid("draw.base", self.draw.base));
        }
        let p = &self.priors;
        for (context, value) in [
            ("priors.baseline", p.baseline),
            ("priors.tier_decrement", p.tier_decrement),
            ("priors.club_weight", p.club_weight),
            ("priors.association_weight", p.association_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(context, value));
            }
        }
        if !(p.min_rating.is_finite() && p.max_rating.is_finite() && p.min_rating < p.max_rating)
        {
            return Err(invalid("priors.min_rating..priors.max_rating", p.max_rating));
        }
        if self.confidence.saturation_games == 0 {
            return Err(invalid("confidence.saturation_games", 0.0));
        }
        Ok(())
    }
}

fn invalid(context: &str, value: f64) -> InputValidationError {
    InputValidationError::InvalidCoefficient {
        context: context.to_string(),
        value,
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

pub fn app_data_dir() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("RATINGS_DB_PATH") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

pub fn default_calibration_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CALIBRATION_FILE))
}

pub fn default_ratings_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(RATINGS_FILE))
}

pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CONFIG_FILE))
}
