use std::path::PathBuf;

use anyhow::{Context, Result};

use football_ratings::artifact;
use football_ratings::match_store;
use football_ratings::priors::{self, PriorResolver};
use football_ratings::rating_book::RatingBook;
use football_ratings::settings::{self, ModelConfig};

const DEFAULT_TOP: usize = 25;

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

    let mut book = match parse_path_arg("--resume") {
        Some(path) => RatingBook::from_snapshot(config, artifact::load_ratings(&path)?),
        None => RatingBook::new(config),
    };
    let resumed_teams = book.len();

    let conn = match_store::open_db(&db_path)?;
    let observations = match_store::load_observations(&conn, season.as_deref())?;
    // A resumed snapshot already holds the matches up to its `as_of` dates.
    let applied = if resumed_teams > 0 {
        book.apply_since_snapshot(&observations, &resolver)
    } else {
        book.apply_all(&observations, &resolver)
    };

    let top = parse_usize_arg("--top").unwrap_or(DEFAULT_TOP).max(1);
    println!("Elo ratings");
    println!("DB: {}", db_path.display());
    if let Some(season) = &season {
        println!("Season: {season}");
    }
    if let Some(snapshot) = resolver.snapshot() {
        println!(
            "Priors: season {} ({} clubs mapped)",
            snapshot.as_of_season,
            snapshot.team_to_club.len()
        );
    }
    println!(
        "Matches applied: {applied} | teams: {} (resumed {resumed_teams})",
        book.len()
    );
    println!();
    println!(
        "{:>4}  {:>8}  {:>8}  {:>5}  {:>5}  {:<10}  {}",
        "#", "team", "elo", "gp", "conf", "as of", "club"
    );
    for (idx, entry) in book.snapshot().iter().take(top).enumerate() {
        let club = resolver
            .snapshot()
            .and_then(|s| s.club_for(entry.team_id))
            .map_or("", |c| c.name.as_str());
        println!(
            "{:>4}  {:>8}  {:>8.1}  {:>5}  {:>5.2}  {:<10}  {}",
            idx + 1,
            entry.team_id,
            entry.rating.value,
            entry.rating.games_played,
            book.confidence(entry.team_id),
            entry.rating.as_of.to_string(),
            club
        );
    }

    let out = parse_path_arg("--out").or_else(|| {
        if has_flag("--write") {
            settings::default_ratings_path()
        } else {
            None
        }
    });
    if let Some(out) = out {
        artifact::save_ratings(&out, &book.snapshot())?;
        println!();
        println!("Wrote ratings snapshot: {}", out.display());
    }

    Ok(())
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

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_string_arg(name).and_then(|raw| raw.parse::<usize>().ok())
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
