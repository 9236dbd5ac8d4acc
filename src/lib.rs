pub mod artifact;
pub mod calibration;
pub mod confidence;
pub mod division;
pub mod elo;
pub mod error;
pub mod eval_rows;
pub mod match_store;
pub mod match_type;
pub mod priors;
pub mod rating_book;
pub mod settings;
pub mod win_prob;

pub use calibration::{CalibrationConfig, EvalRow, Outcome, Prob3, fit_calibration};
pub use division::{DivisionTier, infer_division_level};
pub use elo::{MatchObservation, Rating, TeamId, update_rating};
pub use error::InputValidationError;
pub use match_type::{MatchType, classify_match_type};
pub use priors::resolve_starting_rating;
pub use rating_book::RatingBook;
pub use settings::ModelConfig;
pub use win_prob::estimate_outcome_probabilities;

/// Loads `.env.local` then `.env` and installs the log subscriber. `RUST_LOG` wins over
/// `default_filter`.
pub fn init_runtime(default_filter: &str) {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
