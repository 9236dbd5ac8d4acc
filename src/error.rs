use thiserror::Error;

/// Rejected input. Raised before any computation starts, never after a partial pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputValidationError {
    #[error("dataset is empty: expected at least one row")]
    EmptyDataset,

    #[error("row {row}: {field} = {value} is not a finite probability in [0, 1]")]
    ProbabilityOutOfRange {
        row: usize,
        field: &'static str,
        value: f64,
    },

    #[error("row {row}: unrecognized outcome label {label:?} (expected HOME, DRAW or AWAY)")]
    UnknownOutcome { row: usize, label: String },

    #[error("{context}: missing required field `{field}`")]
    MissingField { context: String, field: &'static str },

    #[error("{context}: invalid value {value}")]
    InvalidCoefficient { context: String, value: f64 },

    #[error("club map entry for team {team_id} references unknown club {club_key:?}")]
    UnknownClub { club_key: String, team_id: u32 },

    #[error("{context}: duplicate key {key:?}")]
    DuplicateKey { context: String, key: String },
}
