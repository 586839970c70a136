use crate::models::participants::ParticipantId;
use crate::models::tournaments::Tournament;
use crate::save_fn;
use crate::schema::round_groupings;
use diesel::prelude::*;
use diesel::SqliteConnection;

/// A round grouping as supplied by the external scheduling collaborator:
/// which participants face each other in one match of one round. A round may
/// carry several groupings and a participant may appear in more than one of
/// them (each grouping awards league points independently).
#[derive(Queryable, Identifiable, Debug)]
#[diesel(table_name = round_groupings)]
pub struct RoundGrouping {
    pub id: i32,
    pub tournament_id: i32,
    pub round_index: i32,
    participants: String,
}

impl RoundGrouping {
    pub fn participants(&self) -> Result<Vec<ParticipantId>, serde_json::Error> {
        serde_json::from_str(&self.participants)
    }

    pub fn for_tournament(
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        round_groupings::table
            .filter(round_groupings::tournament_id.eq(tournament_id))
            .order(round_groupings::round_index.asc())
            .load(conn)
    }
}

#[derive(Insertable)]
#[diesel(table_name = round_groupings)]
pub struct NewRoundGrouping {
    tournament_id: i32,
    round_index: i32,
    participants: String,
}

impl NewRoundGrouping {
    pub fn new(
        tournament: &Tournament,
        round_index: i32,
        participants: &[ParticipantId],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tournament_id: tournament.id,
            round_index,
            participants: serde_json::to_string(participants)?,
        })
    }

    save_fn!(round_groupings::table, RoundGrouping);
}
