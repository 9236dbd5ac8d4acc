use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivisionTier {
    Top,
    Second,
    Third,
    Fourth,
    /// Fifth tier and below.
    Lower,
    Unknown,
}

impl DivisionTier {
    /// Steps below the top flight. `Unknown` is treated like the baseline.
    pub fn steps_below_top(self) -> u8 {
        match self {
            DivisionTier::Top | DivisionTier::Unknown => 0,
            DivisionTier::Second => 1,
            DivisionTier::Third => 2,
            DivisionTier::Fourth => 3,
            DivisionTier::Lower => 4,
        }
    }
}

/// Lower-tier names that carry no numeric marker, or whose numeric-looking words would be
/// misread ("League One" is the English third tier). Checked first.
pub const LOWER_TIER_PHRASES: &[(&str, DivisionTier)] = &[
    ("league two", DivisionTier::Fourth),
    ("league one", DivisionTier::Third),
    ("national league", DivisionTier::Lower),
    ("championship", DivisionTier::Second),
    ("segunda", DivisionTier::Second),
    ("zweite", DivisionTier::Second),
    ("eerste divisie", DivisionTier::Second),
    ("keuken kampioen", DivisionTier::Second),
    ("primera federación", DivisionTier::Third),
    ("primera federacion", DivisionTier::Third),
    ("tercera", DivisionTier::Third),
    ("terceira", DivisionTier::Third),
    ("regionalliga", DivisionTier::Fourth),
    ("oberliga", DivisionTier::Lower),
];

/// Standalone tier markers: "2. Bundesliga", "Ligue 2", "Serie B", "Division II".
pub const TIER_TOKENS: &[(&str, DivisionTier)] = &[
    ("1", DivisionTier::Top),
    ("i", DivisionTier::Top),
    ("2", DivisionTier::Second),
    ("ii", DivisionTier::Second),
    ("b", DivisionTier::Second),
    ("3", DivisionTier::Third),
    ("iii", DivisionTier::Third),
    ("c", DivisionTier::Third),
    ("4", DivisionTier::Fourth),
    ("iv", DivisionTier::Fourth),
    ("d", DivisionTier::Fourth),
    ("5", DivisionTier::Lower),
    ("6", DivisionTier::Lower),
    ("7", DivisionTier::Lower),
];

/// Top-flight names with no tier marker. Checked last so "Premier League 2" stays second tier.
pub const TOP_TIER_PHRASES: &[&str] = &[
    "premier league",
    "premiership",
    "bundesliga",
    "laliga",
    "la liga",
    "primera división",
    "primera division",
    "serie a",
    "ligue 1",
    "eredivisie",
    "primeira liga",
    "liga portugal",
    "super lig",
    "süper lig",
    "superliga",
    "pro league",
    "jupiler",
    "ekstraklasa",
    "allsvenskan",
    "eliteserien",
    "brasileirão",
    "brasileirao",
    "liga mx",
    "major league soccer",
];

pub fn infer_division_level(name: &str) -> DivisionTier {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return DivisionTier::Unknown;
    }

    if let Some((_, tier)) = LOWER_TIER_PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
    {
        return *tier;
    }

    let tokens = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>();
    // Markers usually trail the name ("Serie B", "Ligue 2"), so the last one wins.
    for token in tokens.iter().rev() {
        if let Some((_, tier)) = TIER_TOKENS.iter().find(|(marker, _)| marker == token) {
            return *tier;
        }
    }

    if TOP_TIER_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return DivisionTier::Top;
    }

    DivisionTier::Unknown
}

/// Signed prior offset relative to the baseline rating.
pub fn division_offset(tier: DivisionTier, tier_decrement: f64) -> f64 {
    -(tier.steps_below_top() as f64) * tier_decrement
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_roman_markers() {
        assert_eq!(infer_division_level("2. Bundesliga"), DivisionTier::Second);
        assert_eq!(infer_division_level("Ligue 2"), DivisionTier::Second);
        assert_eq!(infer_division_level("Serie B"), DivisionTier::Second);
        assert_eq!(infer_division_level("Division II"), DivisionTier::Second);
        assert_eq!(infer_division_level("3. Liga"), DivisionTier::Third);
        assert_eq!(infer_division_level("Serie C"), DivisionTier::Third);
        assert_eq!(infer_division_level("Ligue 1"), DivisionTier::Top);
    }

    #[test]
    fn named_lower_tiers() {
        assert_eq!(infer_division_level("Championship"), DivisionTier::Second);
        assert_eq!(infer_division_level("Segunda División"), DivisionTier::Second);
        assert_eq!(infer_division_level("League One"), DivisionTier::Third);
        assert_eq!(infer_division_level("League Two"), DivisionTier::Fourth);
        assert_eq!(infer_division_level("Regionalliga West"), DivisionTier::Fourth);
    }

    #[test]
    fn marker_beats_top_flight_name() {
        assert_eq!(infer_division_level("Premier League 2"), DivisionTier::Second);
        assert_eq!(infer_division_level("Premier League"), DivisionTier::Top);
        assert_eq!(infer_division_level("Serie A"), DivisionTier::Top);
    }

    #[test]
    fn unknown_names() {
        assert_eq!(infer_division_level(""), DivisionTier::Unknown);
        assert_eq!(infer_division_level("Friendlies"), DivisionTier::Unknown);
    }

    #[test]
    fn offsets_step_down_per_tier() {
        assert_eq!(division_offset(DivisionTier::Top, 75.0), 0.0);
        assert_eq!(division_offset(DivisionTier::Unknown, 75.0), 0.0);
        assert_eq!(division_offset(DivisionTier::Second, 75.0), -75.0);
        assert_eq!(division_offset(DivisionTier::Lower, 75.0), -300.0);
    }
}
