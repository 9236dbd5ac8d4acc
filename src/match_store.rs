use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};

use crate::division::infer_division_level;
use crate::elo::{MatchObservation, TeamId};
use crate::match_type::classify_match_type;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMatch {
    pub match_id: u64,
    pub season: String,
    pub competition: String,
    pub utc_time: String,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub finished: bool,
    pub cancelled: bool,
    pub awarded: bool,
    pub status_reason_key: Option<String>,
}

impl StoredMatch {
    pub fn is_complete(&self) -> bool {
        self.finished
            && !self.cancelled
            && !self.awarded
            && self.home_goals.is_some()
            && self.away_goals.is_some()
    }

    pub fn is_penalty_decided(&self) -> bool {
        self.status_reason_key
            .as_deref()
            .is_some_and(|s| s.to_ascii_lowercase().contains("pen"))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.utc_time.get(..10)?.parse::<NaiveDate>().ok()
    }

    /// Classified observation, or `None` for anything not safe to rate.
    ///
    /// A shoot-out does not change the score line, so those matches are rated as the draw
    /// they were after extra time.
    pub fn to_observation(&self) -> Option<MatchObservation> {
        if !self.is_complete() {
            return None;
        }
        let (Some(home_goals), Some(away_goals)) = (self.home_goals, self.away_goals) else {
            return None;
        };
        Some(MatchObservation {
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            match_type: classify_match_type(&self.competition),
            division: infer_division_level(&self.competition),
            goal_diff: home_goals - away_goals,
            date: self.date()?,
        })
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            season TEXT NOT NULL,
            competition TEXT NOT NULL,
            utc_time TEXT NOT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            finished INTEGER NOT NULL,
            cancelled INTEGER NOT NULL,
            awarded INTEGER NOT NULL,
            status_reason_key TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season);
        CREATE INDEX IF NOT EXISTS idx_matches_utc_time ON matches(utc_time);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_match(conn: &Connection, m: &StoredMatch) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO matches (
            match_id, season, competition, utc_time, home_team_id, away_team_id,
            home_goals, away_goals, finished, cancelled, awarded, status_reason_key, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(match_id) DO UPDATE SET
            season = excluded.season,
            competition = excluded.competition,
            utc_time = excluded.utc_time,
            home_team_id = excluded.home_team_id,
            away_team_id = excluded.away_team_id,
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            finished = excluded.finished,
            cancelled = excluded.cancelled,
            awarded = excluded.awarded,
            status_reason_key = excluded.status_reason_key,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id as i64,
            m.season,
            m.competition,
            m.utc_time,
            m.home_team_id,
            m.away_team_id,
            m.home_goals,
            m.away_goals,
            m.finished as i64,
            m.cancelled as i64,
            m.awarded as i64,
            m.status_reason_key,
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {}", m.match_id))?;
    Ok(())
}

/// Finished matches in chronological order, optionally limited to one season.
pub fn load_finished_matches(conn: &Connection, season: Option<&str>) -> Result<Vec<StoredMatch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, season, competition, utc_time, home_team_id, away_team_id,
                home_goals, away_goals, finished, cancelled, awarded, status_reason_key
            FROM matches
            WHERE finished = 1
              AND cancelled = 0
              AND awarded = 0
              AND home_goals IS NOT NULL
              AND away_goals IS NOT NULL
              AND (?1 IS NULL OR season = ?1)
            ORDER BY utc_time ASC, match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map(params![season], |row| {
            Ok(StoredMatch {
                match_id: row.get::<_, i64>(0)? as u64,
                season: row.get(1)?,
                competition: row.get(2)?,
                utc_time: row.get(3)?,
                home_team_id: row.get::<_, u32>(4)?,
                away_team_id: row.get::<_, u32>(5)?,
                home_goals: row.get(6)?,
                away_goals: row.get(7)?,
                finished: row.get::<_, i64>(8)? != 0,
                cancelled: row.get::<_, i64>(9)? != 0,
                awarded: row.get::<_, i64>(10)? != 0,
                status_reason_key: row.get(11)?,
            })
        })
        .context("query matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

pub fn load_observations(conn: &Connection, season: Option<&str>) -> Result<Vec<MatchObservation>> {
    Ok(load_finished_matches(conn, season)?
        .iter()
        .filter_map(StoredMatch::to_observation)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_type::MatchType;

    fn stored(id: u64, time: &str, competition: &str, goals: Option<(i32, i32)>) -> StoredMatch {
        StoredMatch {
            match_id: id,
            season: "2024/2025".to_string(),
            competition: competition.to_string(),
            utc_time: time.to_string(),
            home_team_id: 10,
            away_team_id: 20,
            home_goals: goals.map(|g| g.0),
            away_goals: goals.map(|g| g.1),
            finished: goals.is_some(),
            cancelled: false,
            awarded: false,
            status_reason_key: None,
        }
    }

    #[test]
    fn observations_come_back_in_time_order_and_classified() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        init_schema(&conn).expect("schema");
        upsert_match(&conn, &stored(3, "2024-09-01T15:00:00Z", "FA Cup", Some((1, 1)))).unwrap();
        upsert_match(&conn, &stored(1, "2024-08-17T14:00:00Z", "Premier League", Some((2, 0))))
            .unwrap();
        upsert_match(&conn, &stored(2, "2024-08-24T14:00:00Z", "Premier League", None)).unwrap();

        let obs = load_observations(&conn, None).expect("load");
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].goal_diff, 2);
        assert_eq!(obs[0].match_type, MatchType::League);
        assert_eq!(obs[1].match_type, MatchType::Cup);
        assert_eq!(obs[1].goal_diff, 0);
        assert!(obs[0].date < obs[1].date);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        init_schema(&conn).expect("schema");
        upsert_match(&conn, &stored(1, "2024-08-17T14:00:00Z", "Ligue 1", None)).unwrap();
        upsert_match(&conn, &stored(1, "2024-08-17T14:00:00Z", "Ligue 1", Some((0, 3)))).unwrap();
        let rows = load_finished_matches(&conn, Some("2024/2025")).expect("load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_observation().map(|o| o.goal_diff), Some(-3));
        assert!(load_finished_matches(&conn, Some("2023/2024")).unwrap().is_empty());
    }

    #[test]
    fn shootout_is_rated_as_the_draw_it_was() {
        let mut m = stored(4, "2024-05-25T14:00:00Z", "Coppa Italia", Some((1, 1)));
        m.status_reason_key = Some("AfterPen".to_string());
        assert!(m.is_penalty_decided());
        let obs = m.to_observation().expect("complete match");
        assert_eq!(obs.goal_diff, 0);
        assert_eq!(obs.match_type, MatchType::Cup);
    }

    #[test]
    fn unparseable_kickoff_is_skipped() {
        let m = stored(9, "soon", "Serie A", Some((1, 0)));
        assert!(m.to_observation().is_none());
    }
}
