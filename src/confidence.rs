use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Games after which a rating is fully trusted. Roughly one league season.
    pub saturation_games: u32,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            saturation_games: 30,
        }
    }
}

/// Trust in a rating built from `games` matches, in [0, 1].
pub fn confidence(games: u32, cfg: &ConfidenceConfig) -> f64 {
    let saturation = cfg.saturation_games.max(1) as f64;
    (games as f64 / saturation).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_then_saturates() {
        let cfg = ConfidenceConfig::default();
        assert_eq!(confidence(0, &cfg), 0.0);
        assert!((confidence(15, &cfg) - 0.5).abs() < 1e-12);
        assert_eq!(confidence(30, &cfg), 1.0);
        assert_eq!(confidence(10_000, &cfg), 1.0);

        let mut prev = 0.0;
        for games in 0..100 {
            let c = confidence(games, &cfg);
            assert!(c >= prev && c <= 1.0);
            prev = c;
        }
    }
}
