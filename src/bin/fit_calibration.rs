use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;

use football_ratings::artifact;
use football_ratings::calibration;
use football_ratings::eval_rows;
use football_ratings::settings;

const EXPECTED_SHAPE: &str =
    r#"[{"probHome": 0.45, "probDraw": 0.27, "probAway": 0.28, "actual": "HOME|DRAW|AWAY"}, ...]"#;

fn main() -> Result<()> {
    football_ratings::init_runtime("info");

    let input = parse_path_arg("--input")
        .or_else(first_positional)
        .ok_or_else(|| anyhow!("usage: fit_calibration --input <eval_rows.json> [--out <path>]"))?;
    let out = parse_path_arg("--out")
        .or_else(settings::default_calibration_path)
        .context("unable to resolve calibration path")?;
    let source = parse_string_arg("--source").unwrap_or_else(|| {
        input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "eval_rows".to_string())
    });
    let from_season = parse_i32_arg("--from-season");
    let to_season = parse_i32_arg("--to-season");

    let records = eval_rows::load_eval_records(&input)?;
    let total = records.len();
    let records = eval_rows::filter_seasons(records, from_season, to_season);
    let rows = match eval_rows::into_eval_rows(&records) {
        Ok(rows) => rows,
        Err(err) => {
            eprintln!("Rejected {}: {err}", input.display());
            eprintln!("Expected shape: {EXPECTED_SHAPE}");
            return Err(err).context("eval rows failed validation; nothing was fitted");
        }
    };

    let fit = calibration::fit_temperature(&rows)?;

    println!("Temperature calibration");
    println!("Input: {} ({} rows, {} after season filter)", input.display(), total, rows.len());
    println!(
        "Best T = {:.2} | logloss {:.5} | T=1 logloss {:.5} | gain {:+.5}",
        fit.temperature,
        fit.log_loss,
        fit.baseline_log_loss,
        fit.baseline_log_loss - fit.log_loss
    );
    if has_flag("--curve") {
        println!();
        for (t, loss) in &fit.curve {
            println!("  T={t:.2}  logloss {loss:.5}");
        }
    }

    if has_flag("--dry-run") {
        return Ok(());
    }
    let config = fit.into_config(source, Utc::now());
    artifact::save_calibration(&out, &config)?;
    println!();
    println!("Wrote calibration artifact: {}", out.display());
    Ok(())
}

fn first_positional() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = !arg.contains('=') && takes_value(arg);
            continue;
        }
        return Some(PathBuf::from(arg));
    }
    None
}

fn takes_value(flag: &str) -> bool {
    matches!(
        flag,
        "--input" | "--out" | "--source" | "--from-season" | "--to-season"
    )
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

fn parse_i32_arg(name: &str) -> Option<i32> {
    parse_string_arg(name).and_then(|raw| raw.parse::<i32>().ok())
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
