use crate::ranking::TieBreak;
use crate::schema::ranking_entries;
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::Serialize;

use crate::models::participants::ParticipantId;

/// One standings row per (tournament, participant). The rank is computed by a
/// full-table recompute from accepted results; it is never authoritative on
/// its own.
#[derive(Queryable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = ranking_entries)]
pub struct RankingEntry {
    pub id: i32,
    pub tournament_id: i32,
    participant: String,
    pub aggregate_score: f64,
    pub rank: i32,
    tie_break: String,
    pub rounds_used: i32,
    pub eliminated_in_round: Option<i32>,
}

impl RankingEntry {
    pub fn participant(&self) -> Result<ParticipantId, serde_json::Error> {
        ParticipantId::from_column(&self.participant)
    }

    pub fn tie_break(&self) -> Result<TieBreak, serde_json::Error> {
        serde_json::from_str(&self.tie_break)
    }

    /// current standings, best rank first
    pub fn standings(
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        ranking_entries::table
            .filter(ranking_entries::tournament_id.eq(tournament_id))
            .order((
                ranking_entries::rank.asc(),
                ranking_entries::participant.asc(),
            ))
            .load(conn)
    }
}

#[derive(Insertable)]
#[diesel(table_name = ranking_entries)]
pub struct NewRankingEntry {
    tournament_id: i32,
    participant: String,
    aggregate_score: f64,
    rank: i32,
    tie_break: String,
    rounds_used: i32,
    eliminated_in_round: Option<i32>,
}

impl NewRankingEntry {
    pub fn new(
        tournament_id: i32,
        participant: &ParticipantId,
        aggregate_score: f64,
        rank: i32,
        tie_break: &TieBreak,
        rounds_used: i32,
        eliminated_in_round: Option<i32>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tournament_id,
            participant: participant.to_column()?,
            aggregate_score,
            rank,
            tie_break: serde_json::to_string(tie_break)?,
            rounds_used,
            eliminated_in_round,
        })
    }
}

/// swaps the whole standings table for a tournament in one transaction
pub fn replace_for_tournament(
    tournament_id: i32,
    entries: &Vec<NewRankingEntry>,
    conn: &mut SqliteConnection,
) -> Result<(), diesel::result::Error> {
    conn.transaction(|c| {
        diesel::delete(
            ranking_entries::table.filter(ranking_entries::tournament_id.eq(tournament_id)),
        )
        .execute(c)?;
        diesel::insert_into(ranking_entries::table)
            .values(entries)
            .execute(c)?;
        Ok(())
    })
}
