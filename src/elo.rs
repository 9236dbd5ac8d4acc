use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::division::DivisionTier;
use crate::match_type::MatchType;

pub type TeamId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    pub k_league: f64,
    pub k_cup: f64,
    pub k_international: f64,
    /// Upper bound on the goal-margin multiplier.
    pub goal_multiplier_max: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_league: 20.0,
            k_cup: 28.0,
            k_international: 32.0,
            goal_multiplier_max: 2.0,
        }
    }
}

impl EloConfig {
    pub fn k_for(&self, match_type: MatchType) -> f64 {
        match match_type {
            MatchType::League => self.k_league,
            MatchType::Cup => self.k_cup,
            MatchType::International => self.k_international,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub value: f64,
    pub games_played: u32,
    pub as_of: NaiveDate,
}

/// A finished match with both scores known, already classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchObservation {
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub match_type: MatchType,
    pub division: DivisionTier,
    /// Home goals minus away goals.
    pub goal_diff: i32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub home_elo: f64,
    pub away_elo: f64,
    pub match_type: MatchType,
    pub goal_diff: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdatedRatings {
    pub home_elo: f64,
    pub away_elo: f64,
    pub delta: f64,
}

pub fn update_rating(params: RatingUpdate, cfg: &EloConfig) -> UpdatedRatings {
    let expected_home = expected_score(params.home_elo, params.away_elo);
    let actual_home = if params.goal_diff > 0 {
        1.0
    } else if params.goal_diff < 0 {
        0.0
    } else {
        0.5
    };

    let k = cfg.k_for(params.match_type);
    let multiplier = goal_multiplier(params.goal_diff.unsigned_abs(), cfg.goal_multiplier_max);
    let delta = k * multiplier * (actual_home - expected_home);

    UpdatedRatings {
        home_elo: params.home_elo + delta,
        away_elo: params.away_elo - delta,
        delta,
    }
}

/// Logistic Elo expectation for the side rated `r_a` against `r_b`.
pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((r_b - r_a) / 400.0))
}

/// 1.0 up to a one-goal margin, 1.5 for two, (11 + n) / 8 beyond, capped at `max`.
pub fn goal_multiplier(margin: u32, max: f64) -> f64 {
    let raw = match margin {
        0 | 1 => 1.0,
        2 => 1.5,
        n => (11.0 + n as f64) / 8.0,
    };
    raw.min(max.max(1.0))
}
