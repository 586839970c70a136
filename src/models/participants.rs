use crate::models::tournaments::Tournament;
use crate::save_fn;
use crate::schema::tournament_entries;
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable participant identity for the lifetime of a tournament entry. A
/// participant never changes type mid-tournament; team ids refer to
/// tournament-scoped rosters, not global ones.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum ParticipantId {
    User(i32),
    Team(i32),
}

impl ParticipantId {
    /// deterministic string key, used for last-resort ordering and as part of
    /// ledger grant ids
    pub fn key(&self) -> String {
        match self {
            ParticipantId::User(id) => format!("user:{id}"),
            ParticipantId::Team(id) => format!("team:{id}"),
        }
    }

    pub fn to_column(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_column(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("[De]serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Participant {0} is already enrolled in this tournament")]
    AlreadyEnrolled(String),
}

#[derive(Queryable, Identifiable, Debug)]
#[diesel(table_name = tournament_entries)]
pub struct TournamentEntry {
    pub id: i32,
    pub tournament_id: i32,
    participant: String,
}

impl TournamentEntry {
    pub fn participant(&self) -> Result<ParticipantId, serde_json::Error> {
        ParticipantId::from_column(&self.participant)
    }

    pub fn for_tournament(
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        tournament_entries::table
            .filter(tournament_entries::tournament_id.eq(tournament_id))
            .load(conn)
    }

    pub fn is_enrolled(
        tournament_id: i32,
        participant: &ParticipantId,
        conn: &mut SqliteConnection,
    ) -> Result<bool, EnrollmentError> {
        let raw = participant.to_column()?;
        let found: i64 = tournament_entries::table
            .filter(tournament_entries::tournament_id.eq(tournament_id))
            .filter(tournament_entries::participant.eq(raw))
            .count()
            .get_result(conn)?;
        Ok(found > 0)
    }
}

/// Ingestion point for the external enrollment feed.
pub fn enroll(
    tournament: &Tournament,
    participant: &ParticipantId,
    conn: &mut SqliteConnection,
) -> Result<TournamentEntry, EnrollmentError> {
    if TournamentEntry::is_enrolled(tournament.id, participant, conn)? {
        return Err(EnrollmentError::AlreadyEnrolled(participant.key()));
    }
    let entry = NewTournamentEntry::new(tournament, participant)?.save(conn)?;
    Ok(entry)
}

#[derive(Insertable)]
#[diesel(table_name = tournament_entries)]
pub struct NewTournamentEntry {
    tournament_id: i32,
    participant: String,
}

impl NewTournamentEntry {
    pub fn new(
        tournament: &Tournament,
        participant: &ParticipantId,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tournament_id: tournament.id,
            participant: participant.to_column()?,
        })
    }

    save_fn!(tournament_entries::table, TournamentEntry);
}
