use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::division::{DivisionTier, division_offset};
use crate::elo::TeamId;
use crate::error::InputValidationError;
use crate::match_type::MatchType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorWeights {
    pub baseline: f64,
    /// Rating points subtracted per tier below the top flight.
    pub tier_decrement: f64,
    /// Rating points per club-coefficient point above `club_pivot`.
    pub club_weight: f64,
    pub club_pivot: f64,
    pub association_weight: f64,
    pub association_pivot: f64,
    pub min_rating: f64,
    pub max_rating: f64,
}

impl Default for PriorWeights {
    fn default() -> Self {
        Self {
            baseline: 1500.0,
            tier_decrement: 75.0,
            club_weight: 4.0,
            club_pivot: 20.0,
            association_weight: 3.0,
            association_pivot: 30.0,
            min_rating: 800.0,
            max_rating: 2400.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StartingRatingParams {
    pub association_coefficient: Option<f64>,
    pub club_coefficient: Option<f64>,
    pub division_offset: f64,
}

/// Starting rating for a team the run has not seen yet.
///
/// With no coefficient data this is `baseline + division_offset`. A club coefficient
/// replaces the division offset (it is the finer signal); an association coefficient adds on
/// top of either. Both adjustments are linear around a pivot, so the prior never decreases
/// as a coefficient grows. The result is clamped to `[min_rating, max_rating]`; an inverted
/// band is read the other way round rather than rejected.
pub fn resolve_starting_rating(params: StartingRatingParams, weights: &PriorWeights) -> f64 {
    let club = params.club_coefficient.filter(|c| c.is_finite());
    let association = params.association_coefficient.filter(|c| c.is_finite());

    let mut rating = weights.baseline;
    match club {
        Some(c) => rating += weights.club_weight * (c - weights.club_pivot),
        None => rating += params.division_offset,
    }
    if let Some(a) = association {
        rating += weights.association_weight * (a - weights.association_pivot);
    }
    let (lo, hi) = if weights.min_rating <= weights.max_rating {
        (weights.min_rating, weights.max_rating)
    } else {
        (weights.max_rating, weights.min_rating)
    };
    rating.max(lo).min(hi)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClubPrior {
    pub name: String,
    pub coefficient: Option<f64>,
    pub country_code: Option<String>,
}

/// Read-only lookup form of a season's priors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriorsSnapshot {
    pub as_of_season: i32,
    pub association_coefficient: HashMap<String, Option<f64>>,
    pub club_coefficient: HashMap<String, ClubPrior>,
    pub team_to_club: HashMap<TeamId, String>,
}

impl PriorsSnapshot {
    pub fn club_for(&self, team_id: TeamId) -> Option<&ClubPrior> {
        self.team_to_club
            .get(&team_id)
            .and_then(|key| self.club_coefficient.get(key))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotWire {
    as_of_season: Option<i32>,
    associations: Option<Vec<AssociationWire>>,
    clubs: Option<Vec<ClubWire>>,
    club_team_map: Option<Vec<ClubTeamWire>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociationWire {
    country_code: Option<String>,
    #[serde(default, rename = "coefficient5y")]
    coefficient_5y: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClubWire {
    uefa_club_key: Option<String>,
    name: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    coefficient: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClubTeamWire {
    uefa_club_key: Option<String>,
    external_team_id: Option<TeamId>,
    #[serde(default)]
    confidence: Option<f64>,
}

pub fn load_snapshot(path: &Path) -> Result<PriorsSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read priors snapshot {}", path.display()))?;
    parse_snapshot_json(&raw)
}

pub fn parse_snapshot_json(raw: &str) -> Result<PriorsSnapshot> {
    let wire: SnapshotWire = serde_json::from_str(raw).context("invalid priors snapshot json")?;
    let snapshot = build_snapshot(wire)?;
    Ok(snapshot)
}

fn build_snapshot(wire: SnapshotWire) -> Result<PriorsSnapshot, InputValidationError> {
    let as_of_season = wire.as_of_season.ok_or_else(|| missing("snapshot", "asOfSeason"))?;
    let associations = wire
        .associations
        .ok_or_else(|| missing("snapshot", "associations"))?;
    let clubs = wire.clubs.ok_or_else(|| missing("snapshot", "clubs"))?;
    let club_team_map = wire
        .club_team_map
        .ok_or_else(|| missing("snapshot", "clubTeamMap"))?;

    let mut association_coefficient = HashMap::new();
    for (idx, item) in associations.into_iter().enumerate() {
        let context = format!("associations[{idx}]");
        let code = non_empty(item.country_code, &context, "countryCode")?.to_uppercase();
        let coefficient = checked_coefficient(item.coefficient_5y, &context)?;
        if association_coefficient.insert(code.clone(), coefficient).is_some() {
            return Err(InputValidationError::DuplicateKey { context, key: code });
        }
    }

    let mut club_coefficient = HashMap::new();
    for (idx, item) in clubs.into_iter().enumerate() {
        let context = format!("clubs[{idx}]");
        let key = non_empty(item.uefa_club_key, &context, "uefaClubKey")?;
        let prior = ClubPrior {
            name: non_empty(item.name, &context, "name")?,
            coefficient: checked_coefficient(item.coefficient, &context)?,
            country_code: item
                .country_code
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty()),
        };
        if club_coefficient.insert(key.clone(), prior).is_some() {
            return Err(InputValidationError::DuplicateKey { context, key });
        }
    }

    // Several mappings may name the same team; the most confident one wins, first on ties.
    let mut best: HashMap<TeamId, (f64, String)> = HashMap::new();
    for (idx, item) in club_team_map.into_iter().enumerate() {
        let context = format!("clubTeamMap[{idx}]");
        let key = non_empty(item.uefa_club_key, &context, "uefaClubKey")?;
        let team_id = item
            .external_team_id
            .ok_or_else(|| missing(&context, "externalTeamId"))?;
        if !club_coefficient.contains_key(&key) {
            return Err(InputValidationError::UnknownClub {
                club_key: key,
                team_id,
            });
        }
        let confidence = item.confidence.filter(|c| c.is_finite()).unwrap_or(0.0);
        match best.entry(team_id) {
            Entry::Occupied(mut slot) => {
                if confidence > slot.get().0 {
                    slot.insert((confidence, key));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert((confidence, key));
            }
        }
    }
    let team_to_club = best
        .into_iter()
        .map(|(team_id, (_, key))| (team_id, key))
        .collect();

    Ok(PriorsSnapshot {
        as_of_season,
        association_coefficient,
        club_coefficient,
        team_to_club,
    })
}

fn missing(context: &str, field: &'static str) -> InputValidationError {
    InputValidationError::MissingField {
        context: context.to_string(),
        field,
    }
}

fn non_empty(
    value: Option<String>,
    context: &str,
    field: &'static str,
) -> Result<String, InputValidationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(context, field))
}

fn checked_coefficient(
    value: Option<f64>,
    context: &str,
) -> Result<Option<f64>, InputValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(InputValidationError::InvalidCoefficient {
            context: context.to_string(),
            value: v,
        }),
        other => Ok(other),
    }
}

/// Resolves starting ratings for unseen teams from an optional priors snapshot.
#[derive(Debug, Clone, Default)]
pub struct PriorResolver {
    snapshot: Option<PriorsSnapshot>,
    weights: PriorWeights,
}

impl PriorResolver {
    pub fn new(snapshot: Option<PriorsSnapshot>, weights: PriorWeights) -> Self {
        Self { snapshot, weights }
    }

    pub fn baseline_only(weights: PriorWeights) -> Self {
        Self::new(None, weights)
    }

    pub fn weights(&self) -> &PriorWeights {
        &self.weights
    }

    pub fn snapshot(&self) -> Option<&PriorsSnapshot> {
        self.snapshot.as_ref()
    }

    /// `(association, club)` coefficients known for `team_id`.
    pub fn coefficients_for(&self, team_id: TeamId) -> (Option<f64>, Option<f64>) {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return (None, None);
        };
        let Some(club) = snapshot.club_for(team_id) else {
            return (None, None);
        };
        let association = club
            .country_code
            .as_ref()
            .and_then(|code| snapshot.association_coefficient.get(code))
            .copied()
            .flatten();
        (association, club.coefficient)
    }

    pub fn starting_rating(
        &self,
        team_id: TeamId,
        match_type: MatchType,
        division: DivisionTier,
    ) -> f64 {
        // Cup and continental fixtures mix tiers, so the domestic tier says nothing there.
        let offset = match match_type {
            MatchType::League => division_offset(division, self.weights.tier_decrement),
            MatchType::Cup | MatchType::International => 0.0,
        };
        let (association_coefficient, club_coefficient) = self.coefficients_for(team_id);
        resolve_starting_rating(
            StartingRatingParams {
                association_coefficient,
                club_coefficient,
                division_offset: offset,
            },
            &self.weights,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_is_baseline_plus_offset() {
        let w = PriorWeights::default();
        let params = StartingRatingParams {
            division_offset: -150.0,
            ..Default::default()
        };
        assert_eq!(resolve_starting_rating(params, &w), 1350.0);
        assert_eq!(
            resolve_starting_rating(StartingRatingParams::default(), &w),
            1500.0
        );
    }

    #[test]
    fn monotone_in_each_coefficient() {
        let w = PriorWeights::default();
        let mut prev = f64::NEG_INFINITY;
        for club in [0.0, 5.0, 20.0, 60.0, 140.0, 400.0] {
            let r = resolve_starting_rating(
                StartingRatingParams {
                    association_coefficient: Some(50.0),
                    club_coefficient: Some(club),
                    division_offset: 0.0,
                },
                &w,
            );
            assert!(r >= prev);
            prev = r;
        }
        let mut prev = f64::NEG_INFINITY;
        for assoc in [0.0, 10.0, 30.0, 90.0, 1000.0] {
            let r = resolve_starting_rating(
                StartingRatingParams {
                    association_coefficient: Some(assoc),
                    club_coefficient: None,
                    division_offset: -75.0,
                },
                &w,
            );
            assert!(r >= prev);
            prev = r;
        }
    }

    #[test]
    fn output_stays_in_band() {
        let w = PriorWeights::default();
        let high = resolve_starting_rating(
            StartingRatingParams {
                association_coefficient: Some(10_000.0),
                club_coefficient: Some(10_000.0),
                division_offset: 0.0,
            },
            &w,
        );
        let low = resolve_starting_rating(
            StartingRatingParams {
                association_coefficient: Some(0.0),
                club_coefficient: None,
                division_offset: -2000.0,
            },
            &w,
        );
        assert_eq!(high, 2400.0);
        assert_eq!(low, 800.0);
    }

    #[test]
    fn inverted_band_does_not_panic() {
        let w = PriorWeights {
            min_rating: 2400.0,
            max_rating: 800.0,
            ..PriorWeights::default()
        };
        let high = resolve_starting_rating(
            StartingRatingParams {
                club_coefficient: Some(10_000.0),
                ..Default::default()
            },
            &w,
        );
        assert_eq!(high, 2400.0);
        assert_eq!(resolve_starting_rating(StartingRatingParams::default(), &w), 1500.0);
    }

    #[test]
    fn snapshot_requires_arrays() {
        let err = parse_snapshot_json(r#"{"asOfSeason": 2024, "associations": [], "clubs": []}"#)
            .unwrap_err();
        let validation = err
            .downcast_ref::<InputValidationError>()
            .expect("validation error");
        assert!(matches!(
            validation,
            InputValidationError::MissingField {
                field: "clubTeamMap",
                ..
            }
        ));
    }

    #[test]
    fn most_confident_mapping_wins() {
        let raw = r#"{
            "asOfSeason": 2024,
            "associations": [{"countryCode": "eng", "coefficient5y": 90.0}],
            "clubs": [
                {"uefaClubKey": "a", "name": "A", "countryCode": "ENG", "coefficient": 100.0},
                {"uefaClubKey": "b", "name": "B", "countryCode": "ENG", "coefficient": 10.0}
            ],
            "clubTeamMap": [
                {"uefaClubKey": "b", "externalTeamId": 7, "confidence": 0.4},
                {"uefaClubKey": "a", "externalTeamId": 7, "confidence": 0.9},
                {"uefaClubKey": "b", "externalTeamId": 7, "confidence": 0.9}
            ]
        }"#;
        let snapshot = parse_snapshot_json(raw).expect("valid snapshot");
        assert_eq!(snapshot.team_to_club.get(&7).map(String::as_str), Some("a"));
        assert_eq!(snapshot.association_coefficient.get("ENG"), Some(&Some(90.0)));
    }
}
