use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::InputValidationError;

pub const TEMPERATURE_MIN: f64 = 0.50;
pub const TEMPERATURE_MAX: f64 = 2.50;
const TEMPERATURE_STEPS: u32 = 40;

const LOGIT_FLOOR: f64 = 1e-12;
const LOSS_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

pub const OUTCOMES: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    /// Most likely outcome; ties go to home, then draw.
    pub fn favourite(&self) -> Outcome {
        OUTCOMES
            .into_iter()
            .fold(Outcome::Home, |best, o| if self.get(o) > self.get(best) { o } else { best })
    }
}

/// One historical prediction and what actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRow {
    pub prob_home: f64,
    pub prob_draw: f64,
    pub prob_away: f64,
    pub actual: Outcome,
}

impl EvalRow {
    pub fn probs(&self) -> Prob3 {
        Prob3 {
            home: self.prob_home,
            draw: self.prob_draw,
            away: self.prob_away,
        }
    }
}

/// Fitted calibration artifact. Each fit replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    pub temperature: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureFit {
    pub temperature: f64,
    pub log_loss: f64,
    /// Mean log-loss at T = 1, i.e. the uncalibrated input.
    pub baseline_log_loss: f64,
    pub samples: usize,
    /// `(temperature, mean log-loss)` for every grid candidate, in grid order.
    pub curve: Vec<(f64, f64)>,
}

impl TemperatureFit {
    pub fn into_config(
        self,
        source: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> CalibrationConfig {
        CalibrationConfig {
            temperature: self.temperature,
            updated_at,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

pub fn classify_outcome(home_goals: i32, away_goals: i32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

/// 0.50, 0.55, ..., 2.50. Built from integer steps so 1.0 is hit exactly.
pub fn temperature_grid() -> Vec<f64> {
    (0..=TEMPERATURE_STEPS)
        .map(|step| (50 + 5 * step) as f64 / 100.0)
        .collect()
}

pub fn validate_eval_rows(rows: &[EvalRow]) -> Result<(), InputValidationError> {
    if rows.is_empty() {
        return Err(InputValidationError::EmptyDataset);
    }
    for (idx, row) in rows.iter().enumerate() {
        validate_eval_row(idx, row)?;
    }
    Ok(())
}

/// Every probability of row `idx` must be finite and within [0, 1].
pub fn validate_eval_row(idx: usize, row: &EvalRow) -> Result<(), InputValidationError> {
    for (field, value) in [
        ("probHome", row.prob_home),
        ("probDraw", row.prob_draw),
        ("probAway", row.prob_away),
    ] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(InputValidationError::ProbabilityOutOfRange {
                row: idx,
                field,
                value,
            });
        }
    }
    Ok(())
}

/// Grid-searches the temperature that minimizes mean multiclass log-loss.
///
/// Rows are validated up front; a single bad row rejects the whole batch. Candidates are
/// scored in parallel, then reduced in grid order so the smallest temperature wins ties.
pub fn fit_temperature(rows: &[EvalRow]) -> Result<TemperatureFit, InputValidationError> {
    validate_eval_rows(rows)?;

    let grid = temperature_grid();
    let curve: Vec<(f64, f64)> = grid
        .par_iter()
        .map(|&t| {
            let loss = mean_log_loss(rows, t);
            debug!(temperature = t, log_loss = loss, "scored temperature candidate");
            (t, loss)
        })
        .collect();

    let (temperature, log_loss) = select_best(&curve);
    let baseline_log_loss = curve
        .iter()
        .find(|(t, _)| *t == 1.0)
        .map(|(_, loss)| *loss)
        .unwrap_or_else(|| mean_log_loss(rows, 1.0));

    info!(
        samples = rows.len(),
        temperature, log_loss, baseline_log_loss, "fitted calibration temperature"
    );

    Ok(TemperatureFit {
        temperature,
        log_loss,
        baseline_log_loss,
        samples: rows.len(),
        curve,
    })
}

/// First strict minimum in grid order; equal losses keep the earlier (smaller) temperature.
fn select_best(curve: &[(f64, f64)]) -> (f64, f64) {
    curve
        .iter()
        .copied()
        .fold((1.0, f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 { candidate } else { best }
        })
}

pub fn fit_calibration(
    rows: &[EvalRow],
    source: impl Into<String>,
) -> Result<CalibrationConfig, InputValidationError> {
    Ok(fit_temperature(rows)?.into_config(source, Utc::now()))
}

/// Rescales a probability triple by `temperature`, the same transform the fitter scores.
pub fn apply_temperature(prob: Prob3, temperature: f64) -> Prob3 {
    scale_by_temperature(prob, temperature.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX))
}

pub fn mean_log_loss(rows: &[EvalRow], temperature: f64) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let total: f64 = rows
        .iter()
        .map(|row| {
            let scaled = scale_by_temperature(row.probs(), temperature);
            -scaled.get(row.actual).clamp(LOSS_FLOOR, 1.0).ln()
        })
        .sum();
    total / rows.len() as f64
}

fn scale_by_temperature(prob: Prob3, temperature: f64) -> Prob3 {
    let eh = (prob.home.clamp(LOGIT_FLOOR, 1.0).ln() / temperature).exp();
    let ed = (prob.draw.clamp(LOGIT_FLOOR, 1.0).ln() / temperature).exp();
    let ea = (prob.away.clamp(LOGIT_FLOOR, 1.0).ln() / temperature).exp();
    let sum = eh + ed + ea;
    if !sum.is_finite() || sum <= 0.0 {
        return prob;
    }
    Prob3 {
        home: eh / sum,
        draw: ed / sum,
        away: ea / sum,
    }
}

/// Mean multiclass Brier score, log-loss and favourite-hit rate. Mismatched or empty inputs
/// score as zero samples.
pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    let n = predictions.len();
    if n == 0 || n != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        };
    }

    let (brier, log_loss, hits) = predictions.iter().zip(outcomes).fold(
        (0.0_f64, 0.0_f64, 0usize),
        |(brier, log_loss, hits), (p, &actual)| {
            let squared: f64 = OUTCOMES
                .iter()
                .map(|&o| {
                    let y = if o == actual { 1.0 } else { 0.0 };
                    (p.get(o) - y).powi(2)
                })
                .sum();
            (
                brier + squared,
                log_loss - p.get(actual).clamp(LOGIT_FLOOR, 1.0).ln(),
                hits + usize::from(p.favourite() == actual),
            )
        },
    );

    let n_f = n as f64;
    Metrics {
        samples: n,
        brier: brier / n_f,
        log_loss: log_loss / n_f,
        accuracy: hits as f64 / n_f,
    }
}

pub fn evaluate_rows(rows: &[EvalRow], temperature: Option<f64>) -> Metrics {
    let predictions = rows
        .iter()
        .map(|r| match temperature {
            Some(t) => apply_temperature(r.probs(), t),
            None => r.probs(),
        })
        .collect::<Vec<_>>();
    let outcomes = rows.iter().map(|r| r.actual).collect::<Vec<_>>();
    evaluate_probs(&predictions, &outcomes)
}

/// Reliability table for one outcome: predictions bucketed by the probability given to
/// `class`, with the observed hit rate per bucket.
pub fn calibration_bins(
    predictions: &[Prob3],
    outcomes: &[Outcome],
    class: Outcome,
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let width = 1.0 / bins as f64;
    let mut table = (0..bins)
        .map(|i| CalibrationBin {
            bucket_start: i as f64 * width,
            bucket_end: (i + 1) as f64 * width,
            count: 0,
            avg_pred: 0.0,
            actual_rate: 0.0,
        })
        .collect::<Vec<_>>();

    // Sums first, turned into means below.
    for (p, outcome) in predictions.iter().zip(outcomes) {
        let prob = p.get(class).clamp(0.0, 1.0);
        let bin = &mut table[((prob * bins as f64) as usize).min(bins - 1)];
        bin.count += 1;
        bin.avg_pred += prob;
        if *outcome == class {
            bin.actual_rate += 1.0;
        }
    }
    for bin in table.iter_mut().filter(|b| b.count > 0) {
        bin.avg_pred /= bin.count as f64;
        bin.actual_rate /= bin.count as f64;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(home: f64, draw: f64, away: f64, actual: Outcome) -> EvalRow {
        EvalRow {
            prob_home: home,
            prob_draw: draw,
            prob_away: away,
            actual,
        }
    }

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let preds = vec![
            Prob3 {
                home: 1.0,
                draw: 0.0,
                away: 0.0,
            },
            Prob3 {
                home: 0.0,
                draw: 1.0,
                away: 0.0,
            },
            Prob3 {
                home: 0.0,
                draw: 0.0,
                away: 1.0,
            },
        ];
        let outcomes = vec![Outcome::Home, Outcome::Draw, Outcome::Away];
        let m = evaluate_probs(&preds, &outcomes);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn reliability_bins_average_per_bucket() {
        let p = |home: f64| Prob3 {
            home,
            draw: (1.0 - home) / 2.0,
            away: (1.0 - home) / 2.0,
        };
        let preds = vec![p(0.15), p(0.25), p(0.70), p(0.74), p(1.0)];
        let outcomes = vec![
            Outcome::Away,
            Outcome::Home,
            Outcome::Home,
            Outcome::Draw,
            Outcome::Home,
        ];
        let bins = calibration_bins(&preds, &outcomes, Outcome::Home, 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 1, 2, 1]);
        assert!((bins[2].avg_pred - 0.72).abs() < 1e-12);
        assert!((bins[2].actual_rate - 0.5).abs() < 1e-12);
        assert_eq!(bins[3].bucket_end, 1.0);
        assert_eq!(bins[3].actual_rate, 1.0);

        let m = evaluate_probs(&preds, &outcomes);
        // Only the two home favourites that won count as hits.
        assert!((m.accuracy - 0.4).abs() < 1e-12);
    }

    #[test]
    fn grid_has_41_candidates_including_one() {
        let grid = temperature_grid();
        assert_eq!(grid.len(), 41);
        assert_eq!(grid.first().copied(), Some(0.5));
        assert_eq!(grid.last().copied(), Some(2.5));
        assert!(grid.contains(&1.0));
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn temperature_keeps_distribution_normalized_and_favourite() {
        let p = Prob3 {
            home: 0.44,
            draw: 0.27,
            away: 0.29,
        };
        for t in [0.5, 0.8, 1.0, 1.7, 2.5] {
            let q = apply_temperature(p, t);
            assert!((q.sum() - 1.0).abs() < 1e-9);
            assert_eq!(q.favourite(), Outcome::Home);
        }
        let sharp = apply_temperature(p, 0.5);
        let flat = apply_temperature(p, 2.5);
        assert!(sharp.home > p.home);
        assert!(flat.home < p.home);
    }

    #[test]
    fn unit_temperature_is_identity_on_normalized_input() {
        let p = Prob3 {
            home: 0.5,
            draw: 0.3,
            away: 0.2,
        };
        let q = apply_temperature(p, 1.0);
        assert!((q.home - p.home).abs() < 1e-12);
        assert!((q.draw - p.draw).abs() < 1e-12);
        assert!((q.away - p.away).abs() < 1e-12);
    }

    #[test]
    fn ties_resolve_to_smallest_temperature() {
        let curve = vec![(0.5, 0.9), (0.55, 0.7), (0.6, 0.7), (0.65, 0.8)];
        assert_eq!(select_best(&curve), (0.55, 0.7));
        let flat = vec![(0.5, 1.1), (0.55, 1.1), (0.6, 1.1)];
        assert_eq!(select_best(&flat), (0.5, 1.1));
    }

    #[test]
    fn confidently_wrong_row_stays_finite() {
        let rows = vec![row(1.0, 0.0, 0.0, Outcome::Away)];
        let fit = fit_temperature(&rows).expect("valid rows");
        assert!(fit.log_loss.is_finite());
        assert!(fit.curve.iter().all(|(_, loss)| loss.is_finite()));
        assert!(fit.log_loss <= -(1e-6_f64).ln() + 1e-9);
    }

    #[test]
    fn rejects_out_of_range_and_empty() {
        assert_eq!(
            fit_temperature(&[]).unwrap_err(),
            InputValidationError::EmptyDataset
        );
        let err = fit_temperature(&[
            row(0.5, 0.25, 0.25, Outcome::Home),
            row(0.2, f64::NAN, 0.4, Outcome::Draw),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            InputValidationError::ProbabilityOutOfRange {
                row: 1,
                field: "probDraw",
                ..
            }
        ));
    }
}
