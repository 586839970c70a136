use crate::models::epoch_timestamp;
use crate::models::participants::ParticipantId;
use crate::models::tournaments::Tournament;
use crate::schema::match_results;
use crate::scoring::RawMetric;
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::Serialize;

/// One accepted outcome. Rows are immutable once accepted; a correction for
/// the same (tournament, round, participant) key supersedes the prior row
/// rather than mutating it, so history stays auditable.
#[derive(Queryable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = match_results)]
pub struct MatchResult {
    pub id: i32,
    pub tournament_id: i32,
    pub round_index: i32,
    participant: String,
    raw_metric: String,
    pub normalized_score: f64,
    pub submitted_at: i64,
    superseded: i32,
}

impl MatchResult {
    pub fn participant(&self) -> Result<ParticipantId, serde_json::Error> {
        ParticipantId::from_column(&self.participant)
    }

    pub fn raw_metric(&self) -> Result<RawMetric, serde_json::Error> {
        serde_json::from_str(&self.raw_metric)
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded == 1
    }

    /// all non-superseded results for a tournament, in round order
    pub fn active_for_tournament(
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        match_results::table
            .filter(match_results::tournament_id.eq(tournament_id))
            .filter(match_results::superseded.eq(0))
            .order(match_results::round_index.asc())
            .load(conn)
    }
}

#[derive(Insertable)]
#[diesel(table_name = match_results)]
pub struct NewMatchResult {
    tournament_id: i32,
    round_index: i32,
    participant: String,
    raw_metric: String,
    normalized_score: f64,
    submitted_at: i64,
    superseded: i32,
}

impl NewMatchResult {
    pub fn new(
        tournament: &Tournament,
        round_index: i32,
        participant: &ParticipantId,
        raw_metric: &RawMetric,
        normalized_score: f64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tournament_id: tournament.id,
            round_index,
            participant: participant.to_column()?,
            raw_metric: serde_json::to_string(raw_metric)?,
            normalized_score,
            submitted_at: epoch_timestamp(),
            superseded: 0,
        })
    }

    /// marks any live result for the same (tournament, round, participant) key
    /// as superseded and inserts this one, in a single transaction
    pub fn supersede_and_save(
        self,
        conn: &mut SqliteConnection,
    ) -> Result<MatchResult, diesel::result::Error> {
        conn.transaction(|c| {
            diesel::update(
                match_results::table
                    .filter(match_results::tournament_id.eq(self.tournament_id))
                    .filter(match_results::round_index.eq(self.round_index))
                    .filter(match_results::participant.eq(&self.participant))
                    .filter(match_results::superseded.eq(0)),
            )
            .set(match_results::superseded.eq(1))
            .execute(c)?;
            diesel::insert_into(match_results::table)
                .values(&self)
                .get_result(c)
        })
    }
}
