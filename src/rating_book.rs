use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calibration::Prob3;
use crate::confidence::confidence;
use crate::elo::{MatchObservation, Rating, RatingUpdate, TeamId, update_rating};
use crate::priors::PriorResolver;
use crate::settings::ModelConfig;
use crate::win_prob::estimate_outcome_probabilities;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    pub team_id: TeamId,
    #[serde(flatten)]
    pub rating: Rating,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchUpdate {
    pub home_before: f64,
    pub away_before: f64,
    pub home_after: f64,
    pub away_after: f64,
    /// Pre-match probabilities from the ratings before this match.
    pub prematch: Prob3,
}

/// Run-scoped team ratings, folded over matches in chronological order.
///
/// Elo is path dependent: the caller owns the ordering. Independent leagues or seasons can
/// each own a book and run in parallel.
#[derive(Debug, Clone)]
pub struct RatingBook {
    config: ModelConfig,
    ratings: HashMap<TeamId, Rating>,
}

impl RatingBook {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            ratings: HashMap::new(),
        }
    }

    /// Resumes a run from a persisted snapshot.
    pub fn from_snapshot(
        config: ModelConfig,
        entries: impl IntoIterator<Item = RatingEntry>,
    ) -> Self {
        let ratings = entries
            .into_iter()
            .filter(|e| e.rating.value.is_finite())
            .map(|e| (e.team_id, e.rating))
            .collect();
        Self { config, ratings }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn get(&self, team_id: TeamId) -> Option<&Rating> {
        self.ratings.get(&team_id)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Trust in a team's current rating; unseen teams score zero.
    pub fn confidence(&self, team_id: TeamId) -> f64 {
        let games = self.ratings.get(&team_id).map_or(0, |r| r.games_played);
        confidence(games, &self.config.confidence)
    }

    pub fn predict(&self, home: TeamId, away: TeamId) -> Option<Prob3> {
        let home = self.ratings.get(&home)?;
        let away = self.ratings.get(&away)?;
        Some(estimate_outcome_probabilities(
            home.value,
            away.value,
            &self.config.draw,
        ))
    }

    pub fn apply(&mut self, obs: &MatchObservation, priors: &PriorResolver) -> MatchUpdate {
        let home = self.current_or_prior(obs.home_team_id, obs, priors);
        let away = self.current_or_prior(obs.away_team_id, obs, priors);

        for (team_id, rating) in [(obs.home_team_id, &home), (obs.away_team_id, &away)] {
            if rating.games_played > 0 && obs.date < rating.as_of {
                warn!(
                    team_id,
                    match_date = %obs.date,
                    as_of = %rating.as_of,
                    "match is older than the team's current rating; input is out of order"
                );
            }
        }

        let prematch = estimate_outcome_probabilities(home.value, away.value, &self.config.draw);
        let updated = update_rating(
            RatingUpdate {
                home_elo: home.value,
                away_elo: away.value,
                match_type: obs.match_type,
                goal_diff: obs.goal_diff,
            },
            &self.config.elo,
        );

        self.ratings.insert(
            obs.home_team_id,
            Rating {
                value: updated.home_elo,
                games_played: home.games_played.saturating_add(1),
                as_of: obs.date,
            },
        );
        self.ratings.insert(
            obs.away_team_id,
            Rating {
                value: updated.away_elo,
                games_played: away.games_played.saturating_add(1),
                as_of: obs.date,
            },
        );

        MatchUpdate {
            home_before: home.value,
            away_before: away.value,
            home_after: updated.home_elo,
            away_after: updated.away_elo,
            prematch,
        }
    }

    /// Folds `observations` in the order given.
    pub fn apply_all(
        &mut self,
        observations: &[MatchObservation],
        priors: &PriorResolver,
    ) -> usize {
        for obs in observations {
            self.apply(obs, priors);
        }
        info!(
            matches = observations.len(),
            teams = self.ratings.len(),
            "rating fold complete"
        );
        observations.len()
    }

    /// True when a side of `obs` already holds a rating dated on or after the match, i.e. a
    /// resumed snapshot has counted it.
    pub fn has_seen(&self, obs: &MatchObservation) -> bool {
        [obs.home_team_id, obs.away_team_id]
            .iter()
            .filter_map(|team_id| self.ratings.get(team_id))
            .any(|rating| rating.games_played > 0 && obs.date <= rating.as_of)
    }

    /// Folds only the matches the book has not seen yet; the rest are skipped. Use after
    /// [`RatingBook::from_snapshot`] when the source replays history.
    pub fn apply_since_snapshot(
        &mut self,
        observations: &[MatchObservation],
        priors: &PriorResolver,
    ) -> usize {
        let mut applied = 0usize;
        for obs in observations {
            if self.has_seen(obs) {
                continue;
            }
            self.apply(obs, priors);
            applied += 1;
        }
        info!(
            matches = applied,
            skipped = observations.len() - applied,
            teams = self.ratings.len(),
            "resumed rating fold complete"
        );
        applied
    }

    /// Current ratings, strongest first, team id breaking ties.
    pub fn snapshot(&self) -> Vec<RatingEntry> {
        let mut out = self
            .ratings
            .iter()
            .map(|(team_id, rating)| RatingEntry {
                team_id: *team_id,
                rating: *rating,
            })
            .collect::<Vec<_>>();
        out.sort_by(|a, b| {
            b.rating
                .value
                .total_cmp(&a.rating.value)
                .then(a.team_id.cmp(&b.team_id))
        });
        out
    }

    fn current_or_prior(
        &self,
        team_id: TeamId,
        obs: &MatchObservation,
        priors: &PriorResolver,
    ) -> Rating {
        if let Some(rating) = self.ratings.get(&team_id) {
            return *rating;
        }
        Rating {
            value: priors.starting_rating(team_id, obs.match_type, obs.division),
            games_played: 0,
            as_of: obs.date,
        }
    }
}
