use serde::{Deserialize, Serialize};

use crate::calibration::Prob3;
use crate::elo::expected_score;

/// Draw probability as a function of the rating gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawModel {
    pub base: f64,
    /// Rating-gap scale of the exponential decay.
    pub decay: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for DrawModel {
    fn default() -> Self {
        Self {
            base: 0.28,
            decay: 600.0,
            min: 0.12,
            max: 0.35,
        }
    }
}

impl DrawModel {
    pub fn draw_prob(&self, gap: f64) -> f64 {
        let raw = self.base * (-gap.abs() / self.decay.max(1e-9)).exp();
        clamp(raw, self.min, self.max)
    }
}

pub fn estimate_outcome_probabilities(home_elo: f64, away_elo: f64, draw: &DrawModel) -> Prob3 {
    // Kept off the boundary so neither side is ever exactly impossible.
    let expected_home = clamp(expected_score(home_elo, away_elo), 1e-12, 1.0 - 1e-12);
    let p_draw = draw.draw_prob(home_elo - away_elo);
    Prob3 {
        home: (1.0 - p_draw) * expected_home,
        draw: p_draw,
        away: (1.0 - p_draw) * (1.0 - expected_home),
    }
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_teams_draw_most() {
        let draw = DrawModel::default();
        let even = estimate_outcome_probabilities(1500.0, 1500.0, &draw);
        let lopsided = estimate_outcome_probabilities(1900.0, 1400.0, &draw);
        assert!((even.draw - 0.28).abs() < 1e-12);
        assert!((even.home - even.away).abs() < 1e-12);
        assert!(lopsided.draw < even.draw);
        assert!(lopsided.draw >= draw.min);
    }

    #[test]
    fn huge_gap_keeps_components_open() {
        let p = estimate_outcome_probabilities(2400.0, 800.0, &DrawModel::default());
        assert!(p.home > 0.0 && p.home < 1.0);
        assert!(p.away > 0.0 && p.away < 1.0);
        assert!((p.home + p.draw + p.away - 1.0).abs() < 1e-9);
    }
}
