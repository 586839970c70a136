//! Read-only derived statistics. Nothing here is a source of truth and
//! nothing here mutates state, so a snapshot is safe to take at any time,
//! including mid-tournament (flagged provisional).

use crate::models::match_results::MatchResult;
use crate::models::participants::TournamentEntry;
use crate::models::ranking_entries::RankingEntry;
use crate::models::reward_grants::RewardGrant;
use crate::models::tournaments::Tournament;
use diesel::SqliteConnection;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("[De]serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TournamentStatsSnapshot {
    pub tournament_id: i32,
    pub enrolled_count: usize,
    /// participants with at least one accepted result
    pub participant_count: usize,
    /// participant_count / enrolled_count, 0.0 when nobody is enrolled
    pub completion_rate: f64,
    pub average_normalized_score: f64,
    pub xp_distributed: i64,
    pub credits_distributed: i64,
    /// true until the tournament closes
    pub provisional: bool,
}

pub fn snapshot(
    tournament: &Tournament,
    conn: &mut SqliteConnection,
) -> Result<TournamentStatsSnapshot, StatsError> {
    let enrolled_count = TournamentEntry::for_tournament(tournament.id, conn)?.len();
    let participant_count = RankingEntry::standings(tournament.id, conn)?.len();
    let completion_rate = if enrolled_count == 0 {
        0.0
    } else {
        participant_count as f64 / enrolled_count as f64
    };

    let results = MatchResult::active_for_tournament(tournament.id, conn)?;
    let average_normalized_score = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.normalized_score).sum::<f64>() / results.len() as f64
    };

    let grants = RewardGrant::for_tournament(tournament.id, conn)?;
    let xp_distributed = grants.iter().map(|g| g.xp_awarded).sum();
    let credits_distributed = grants.iter().map(|g| g.credits_awarded).sum();

    Ok(TournamentStatsSnapshot {
        tournament_id: tournament.id,
        enrolled_count,
        participant_count,
        completion_rate,
        average_normalized_score,
        xp_distributed,
        credits_distributed,
        provisional: !tournament.is_closed()?,
    })
}
