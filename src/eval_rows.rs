use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::calibration::{EvalRow, Outcome, validate_eval_row};
use crate::error::InputValidationError;

/// One exported backtest row as it appears on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRecord {
    #[serde(alias = "probHomeWin")]
    pub prob_home: f64,
    pub prob_draw: f64,
    #[serde(alias = "probAwayWin")]
    pub prob_away: f64,
    pub actual: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<i32>,
}

impl EvalRecord {
    pub fn from_row(row: &EvalRow, season: Option<i32>) -> Self {
        Self {
            prob_home: row.prob_home,
            prob_draw: row.prob_draw,
            prob_away: row.prob_away,
            actual: outcome_label(row.actual).to_string(),
            season,
        }
    }
}

pub fn parse_outcome_label(raw: &str) -> Option<Outcome> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "HOME" | "H" => Some(Outcome::Home),
        "DRAW" | "D" => Some(Outcome::Draw),
        "AWAY" | "A" => Some(Outcome::Away),
        _ => None,
    }
}

pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Home => "HOME",
        Outcome::Draw => "DRAW",
        Outcome::Away => "AWAY",
    }
}

/// Keeps records whose season lies in `[from, to]`. Records without a season are kept only
/// when no bound is set.
pub fn filter_seasons(
    records: Vec<EvalRecord>,
    from: Option<i32>,
    to: Option<i32>,
) -> Vec<EvalRecord> {
    if from.is_none() && to.is_none() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| {
            r.season
                .is_some_and(|s| from.is_none_or(|lo| s >= lo) && to.is_none_or(|hi| s <= hi))
        })
        .collect()
}

/// Converts and validates every record before returning any of them. Rows are checked in
/// order, label first, so the error names the first bad row.
pub fn into_eval_rows(records: &[EvalRecord]) -> Result<Vec<EvalRow>, InputValidationError> {
    if records.is_empty() {
        return Err(InputValidationError::EmptyDataset);
    }
    let mut rows = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let Some(actual) = parse_outcome_label(&record.actual) else {
            return Err(InputValidationError::UnknownOutcome {
                row: idx,
                label: record.actual.clone(),
            });
        };
        let row = EvalRow {
            prob_home: record.prob_home,
            prob_draw: record.prob_draw,
            prob_away: record.prob_away,
            actual,
        };
        validate_eval_row(idx, &row)?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn parse_eval_records_json(raw: &str) -> Result<Vec<EvalRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("invalid eval rows json")
}

pub fn parse_eval_rows_json(raw: &str) -> Result<Vec<EvalRow>> {
    let records = parse_eval_records_json(raw)?;
    Ok(into_eval_rows(&records)?)
}

pub fn load_eval_records(path: &Path) -> Result<Vec<EvalRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read eval rows {}", path.display()))?;
    parse_eval_records_json(&raw)
}

pub fn save_eval_records(path: &Path, records: &[EvalRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("serialize eval rows")?;
    crate::artifact::write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_case_insensitive_with_short_forms() {
        assert_eq!(parse_outcome_label("home"), Some(Outcome::Home));
        assert_eq!(parse_outcome_label(" D "), Some(Outcome::Draw));
        assert_eq!(parse_outcome_label("AWAY"), Some(Outcome::Away));
        assert_eq!(parse_outcome_label("X"), None);
    }

    #[test]
    fn unknown_label_reports_row() {
        let raw = r#"[
            {"probHome": 0.5, "probDraw": 0.3, "probAway": 0.2, "actual": "HOME"},
            {"probHome": 0.5, "probDraw": 0.3, "probAway": 0.2, "actual": "WIN"}
        ]"#;
        let err = parse_eval_rows_json(raw).unwrap_err();
        let validation = err
            .downcast_ref::<InputValidationError>()
            .expect("validation error");
        assert_eq!(
            validation,
            &InputValidationError::UnknownOutcome {
                row: 1,
                label: "WIN".to_string()
            }
        );
    }

    #[test]
    fn first_bad_row_is_reported() {
        let raw = r#"[
            {"probHome": 1.5, "probDraw": 0.3, "probAway": 0.2, "actual": "HOME"},
            {"probHome": 0.5, "probDraw": 0.3, "probAway": 0.2, "actual": "AWAY"},
            {"probHome": 0.5, "probDraw": 0.3, "probAway": 0.2, "actual": "DRAW"},
            {"probHome": 0.5, "probDraw": 0.3, "probAway": 0.2, "actual": "WIN"}
        ]"#;
        let err = parse_eval_rows_json(raw).unwrap_err();
        let validation = err
            .downcast_ref::<InputValidationError>()
            .expect("validation error");
        assert_eq!(
            validation,
            &InputValidationError::ProbabilityOutOfRange {
                row: 0,
                field: "probHome",
                value: 1.5
            }
        );
        assert_eq!(
            into_eval_rows(&[]).unwrap_err(),
            InputValidationError::EmptyDataset
        );
    }

    #[test]
    fn accepts_win_aliases() {
        let raw = r#"[{"probHomeWin": 0.4, "probDraw": 0.3, "probAwayWin": 0.3, "actual": "a"}]"#;
        let rows = parse_eval_rows_json(raw).expect("aliases parse");
        assert_eq!(rows[0].prob_home, 0.4);
        assert_eq!(rows[0].actual, Outcome::Away);
    }

    #[test]
    fn season_filter_is_inclusive() {
        let rec = |season| EvalRecord {
            prob_home: 0.4,
            prob_draw: 0.3,
            prob_away: 0.3,
            actual: "HOME".to_string(),
            season,
        };
        let records = vec![rec(Some(2021)), rec(Some(2022)), rec(Some(2023)), rec(None)];
        assert_eq!(filter_seasons(records.clone(), None, None).len(), 4);
        assert_eq!(filter_seasons(records.clone(), Some(2022), None).len(), 2);
        assert_eq!(filter_seasons(records, Some(2022), Some(2022)).len(), 1);
    }
}
