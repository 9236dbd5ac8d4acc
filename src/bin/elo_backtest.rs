use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;

use football_ratings::artifact;
use football_ratings::calibration::{self, EvalRow, Outcome};
use football_ratings::eval_rows::{self, EvalRecord};
use football_ratings::match_store;
use football_ratings::priors::{self, PriorResolver};
use football_ratings::rating_book::RatingBook;
use football_ratings::settings::{self, ModelConfig};

const DEFAULT_MIN_VAL_GAIN: f64 = 0.0005;
const MIN_MATCHES: usize = 8;
const RELIABILITY_BINS: usize = 10;

fn main() -> Result<()> {
    football_ratings::init_runtime("info");

    let db_path = parse_path_arg("--db")
        .or_else(settings::default_db_path)
        .context("unable to resolve sqlite path")?;
    let season = parse_string_arg("--season");
    let config = ModelConfig::from_env_and_file(parse_path_arg("--config").as_deref())?;
    let snapshot = match parse_path_arg("--priors") {
        Some(path) => Some(priors::load_snapshot(&path)?),
        None => None,
    };
    let resolver = PriorResolver::new(snapshot, config.priors);

    let apply = has_flag("--apply");
    let force_apply = has_flag("--force-apply");
    let min_val_gain = parse_f64_arg("--min-val-gain")
        .unwrap_or(DEFAULT_MIN_VAL_GAIN)
        .clamp(0.0, 0.05);

    let conn = match_store::open_db(&db_path)?;
    let stored = match_store::load_finished_matches(&conn, season.as_deref())?;

    // Walk forward: predict from the ratings as they stood before kickoff, then fold the match in.
    let mut book = RatingBook::new(config);
    let mut rows: Vec<EvalRow> = Vec::with_capacity(stored.len());
    let mut seasons: Vec<Option<i32>> = Vec::with_capacity(stored.len());
    for m in &stored {
        let Some(obs) = m.to_observation() else {
            continue;
        };
        let update = book.apply(&obs, &resolver);
        rows.push(EvalRow {
            prob_home: update.prematch.home,
            prob_draw: update.prematch.draw,
            prob_away: update.prematch.away,
            actual: outcome_from_goal_diff(obs.goal_diff),
        });
        seasons.push(parse_leading_year(&m.season));
    }

    if rows.len() < MIN_MATCHES {
        return Err(anyhow!(
            "only {} usable matches in {} (need at least {MIN_MATCHES})",
            rows.len(),
            db_path.display()
        ));
    }

    let split_idx = train_split_index(rows.len());
    let fit = calibration::fit_temperature(&rows[..split_idx])?;

    let raw = calibration::evaluate_rows(&rows, None);
    let cal = calibration::evaluate_rows(&rows, Some(fit.temperature));
    let val_raw = calibration::evaluate_rows(&rows[split_idx..], None);
    let val_cal = calibration::evaluate_rows(&rows[split_idx..], Some(fit.temperature));
    let val_gain = val_raw.log_loss - val_cal.log_loss;

    println!("Elo walk-forward backtest");
    println!("DB: {}", db_path.display());
    if let Some(season) = &season {
        println!("Season: {season}");
    }
    println!(
        "Matches: {} | teams rated: {} | train/val split: {}/{}",
        rows.len(),
        book.len(),
        split_idx,
        rows.len() - split_idx
    );
    println!();
    println!(
        "Raw:        brier {:.4} | logloss {:.4} | acc {:.3}",
        raw.brier, raw.log_loss, raw.accuracy
    );
    println!(
        "Calibrated: brier {:.4} | logloss {:.4} | acc {:.3}",
        cal.brier, cal.log_loss, cal.accuracy
    );
    println!(
        "Fitted T = {:.2} | train logloss {:.4} (T=1: {:.4})",
        fit.temperature, fit.log_loss, fit.baseline_log_loss
    );
    println!(
        "Held-out logloss: raw {:.4} -> cal {:.4} (gain {:+.5})",
        val_raw.log_loss, val_cal.log_loss, val_gain
    );

    let predictions = rows.iter().map(EvalRow::probs).collect::<Vec<_>>();
    let outcomes = rows.iter().map(|r| r.actual).collect::<Vec<_>>();
    println!();
    println!("Reliability (home win, raw):");
    for bin in calibration::calibration_bins(&predictions, &outcomes, Outcome::Home, RELIABILITY_BINS)
    {
        if bin.count == 0 {
            continue;
        }
        println!(
            "  [{:.1}, {:.1})  n={:<5} pred {:.3}  actual {:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }

    if let Some(path) = parse_path_arg("--export") {
        let records = rows
            .iter()
            .zip(&seasons)
            .map(|(row, season)| EvalRecord::from_row(row, *season))
            .collect::<Vec<_>>();
        eval_rows::save_eval_records(&path, &records)?;
        println!();
        println!("Exported {} eval rows: {}", records.len(), path.display());
    }

    if apply || force_apply {
        let passes = val_gain >= min_val_gain;
        if !passes && !force_apply {
            println!();
            println!(
                "Calibration not applied: held-out gain {val_gain:+.5} below {min_val_gain:.5}"
            );
            return Ok(());
        }
        let out = parse_path_arg("--calibration-out")
            .or_else(settings::default_calibration_path)
            .context("unable to resolve calibration path")?;
        let cal_config = fit.into_config("elo_backtest", Utc::now());
        artifact::save_calibration(&out, &cal_config)?;
        println!();
        println!(
            "Applied calibration T = {:.2}: {}",
            cal_config.temperature,
            out.display()
        );
    }

    Ok(())
}

fn outcome_from_goal_diff(goal_diff: i32) -> Outcome {
    calibration::classify_outcome(goal_diff, 0)
}

fn train_split_index(n: usize) -> usize {
    if n <= 2 {
        return 1;
    }
    let idx = ((n as f64) * 0.70).round() as usize;
    idx.clamp(1, n - 1)
}

fn parse_leading_year(raw: &str) -> Option<i32> {
    let digits = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    if digits.len() != 4 {
        return None;
    }
    digits.parse::<i32>().ok()
}

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_string_arg(name).map(PathBuf::from)
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_string_arg(name)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
