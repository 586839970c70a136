use crate::models::epoch_timestamp;
use crate::models::participants::ParticipantId;
use crate::save_fn;
use crate::schema::reward_grants;
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::Serialize;

/// A one-time reward credit. At most one row exists per
/// (tournament, participant); that uniqueness is the idempotency key that
/// makes close-and-distribute safely retryable.
#[derive(Queryable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = reward_grants)]
pub struct RewardGrant {
    pub id: i32,
    pub tournament_id: i32,
    participant: String,
    pub rank_at_grant: i32,
    pub xp_awarded: i64,
    pub credits_awarded: i64,
    pub granted_at: i64,
}

impl RewardGrant {
    pub fn participant(&self) -> Result<ParticipantId, serde_json::Error> {
        ParticipantId::from_column(&self.participant)
    }

    pub fn for_tournament(
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        reward_grants::table
            .filter(reward_grants::tournament_id.eq(tournament_id))
            .load(conn)
    }

    /// `participant_column` is the serialized participant key, as stored
    pub fn exists(
        tournament_id: i32,
        participant_column: &str,
        conn: &mut SqliteConnection,
    ) -> Result<bool, diesel::result::Error> {
        let found: i64 = reward_grants::table
            .filter(reward_grants::tournament_id.eq(tournament_id))
            .filter(reward_grants::participant.eq(participant_column))
            .count()
            .get_result(conn)?;
        Ok(found > 0)
    }
}

#[derive(Insertable)]
#[diesel(table_name = reward_grants)]
pub struct NewRewardGrant {
    tournament_id: i32,
    participant: String,
    rank_at_grant: i32,
    xp_awarded: i64,
    credits_awarded: i64,
    granted_at: i64,
}

impl NewRewardGrant {
    pub fn new(
        tournament_id: i32,
        participant: &ParticipantId,
        rank_at_grant: i32,
        xp_awarded: i64,
        credits_awarded: i64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tournament_id,
            participant: participant.to_column()?,
            rank_at_grant,
            xp_awarded,
            credits_awarded,
            granted_at: epoch_timestamp(),
        })
    }

    save_fn!(reward_grants::table, RewardGrant);
}
