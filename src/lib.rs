extern crate core;
extern crate serde_json;

use crate::models::participants::EnrollmentError;
use crate::models::teams::TeamError;
use crate::ranking::RankingError;
use crate::rewards::RewardError;
use crate::stats::StatsError;
use thiserror::Error;

pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod ranking;
pub mod rewards;
pub mod schema;
pub mod scoring;
pub mod stats;
pub mod utils;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("[De]serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Unknown tournament {0}")]
    UnknownTournament(i32),

    #[error("Unknown team {0}")]
    UnknownTeam(i32),

    #[error("Illegal state transition: {0}")]
    StateError(String),

    #[error("Ranking error: {0}")]
    RankingError(#[from] RankingError),

    #[error("Team registry error: {0}")]
    TeamError(#[from] TeamError),

    #[error("Enrollment error: {0}")]
    EnrollmentError(#[from] EnrollmentError),

    #[error("Reward error: {0}")]
    RewardError(#[from] RewardError),

    #[error("Stats error: {0}")]
    StatsError(#[from] StatsError),
}
