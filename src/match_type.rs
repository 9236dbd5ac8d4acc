use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    League,
    Cup,
    International,
}

/// Continental and confederation club competitions. Checked before the cup table, so a
/// name like "Copa Libertadores" resolves here and never reaches the "copa" cup keyword.
pub const INTERNATIONAL_KEYWORDS: &[&str] = &[
    "champions league",
    "europa league",
    "conference league",
    "uefa super cup",
    "libertadores",
    "sudamericana",
    "recopa",
    "club world cup",
    "concacaf champions",
    "afc champions",
    "caf champions",
    "confederation cup",
    "leagues cup",
];

/// Domestic knockout cups across languages.
pub const CUP_KEYWORDS: &[&str] = &[
    "cup", "copa", "taça", "taca", "coupe", "coppa", "pokal", "beker", "shield", "trophy",
];

pub fn classify_match_type(name: &str) -> MatchType {
    let lower = name.trim().to_lowercase();
    if INTERNATIONAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        MatchType::International
    } else if CUP_KEYWORDS.iter().any(|k| lower.contains(k)) {
        MatchType::Cup
    } else {
        MatchType::League
    }
}
