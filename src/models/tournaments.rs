use crate::models::epoch_timestamp;
use crate::ranking::AggregatePolicy;
use crate::rewards::{RewardCurve, TeamRewardPolicy};
use crate::schema::tournaments;
use crate::scoring::{ScoringParams, ScoringType};
use crate::{save_fn, update_fn, EngineError};
use diesel::prelude::*;
use diesel::SqliteConnection;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum TournamentFormat {
    League,
    Knockout,
    RoundRobin,
    Custom,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum ParticipantMode {
    Individual,
    Team,
    Mixed,
}

/// one-way: Open -> InProgress -> Closed. Reopening a closed tournament is an
/// administrative action outside this engine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum TournamentPhase {
    Open,
    InProgress,
    Closed,
}

#[derive(Queryable, Identifiable, AsChangeset, Debug)]
#[diesel(table_name = tournaments)]
pub struct Tournament {
    pub id: i32,
    pub name: String,
    format: String,
    participant_mode: String,
    scoring_type: String,
    pub round_count: i32,
    is_multi_day: i32,
    phase: String,
    scoring_params: String,
    aggregate_policy: Option<String>,
    reward_curve: String,
    team_reward_policy: Option<String>,
    pub max_roster_size: Option<i32>,
    pub created_at: i64,
}

impl Tournament {
    pub fn get_by_id(
        id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Option<Self>, diesel::result::Error> {
        tournaments::table.find(id).first(conn).optional()
    }

    pub fn format(&self) -> Result<TournamentFormat, serde_json::Error> {
        serde_json::from_str(&self.format)
    }

    pub fn participant_mode(&self) -> Result<ParticipantMode, serde_json::Error> {
        serde_json::from_str(&self.participant_mode)
    }

    pub fn scoring_type(&self) -> Result<ScoringType, serde_json::Error> {
        serde_json::from_str(&self.scoring_type)
    }

    pub fn scoring_params(&self) -> Result<ScoringParams, serde_json::Error> {
        serde_json::from_str(&self.scoring_params)
    }

    pub fn aggregate_policy(&self) -> Result<Option<AggregatePolicy>, serde_json::Error> {
        match self.aggregate_policy.as_ref() {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        }
    }

    pub fn reward_curve(&self) -> Result<RewardCurve, serde_json::Error> {
        serde_json::from_str(&self.reward_curve)
    }

    pub fn team_reward_policy(&self) -> Result<Option<TeamRewardPolicy>, serde_json::Error> {
        match self.team_reward_policy.as_ref() {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        }
    }

    pub fn is_multi_day(&self) -> bool {
        self.is_multi_day == 1
    }

    pub fn phase(&self) -> Result<TournamentPhase, serde_json::Error> {
        serde_json::from_str(&self.phase)
    }

    pub fn is_closed(&self) -> Result<bool, serde_json::Error> {
        Ok(self.phase()? == TournamentPhase::Closed)
    }

    fn set_phase(&mut self, phase: TournamentPhase) -> Result<(), serde_json::Error> {
        self.phase = serde_json::to_string(&phase)?;
        Ok(())
    }

    /// moves an Open tournament to InProgress; returns whether anything changed
    pub fn mark_in_progress(&mut self) -> Result<bool, EngineError> {
        match self.phase()? {
            TournamentPhase::Open => {
                self.set_phase(TournamentPhase::InProgress)?;
                Ok(true)
            }
            TournamentPhase::InProgress => Ok(false),
            TournamentPhase::Closed => Err(EngineError::StateError(format!(
                "Tournament {} is closed and cannot accept results",
                self.id
            ))),
        }
    }

    /// moves the tournament to Closed; returns false if it already was
    /// (closing is idempotent)
    pub fn close(&mut self) -> Result<bool, EngineError> {
        match self.phase()? {
            TournamentPhase::Closed => Ok(false),
            TournamentPhase::Open | TournamentPhase::InProgress => {
                self.set_phase(TournamentPhase::Closed)?;
                Ok(true)
            }
        }
    }

    update_fn! {}
}

#[derive(Insertable)]
#[diesel(table_name = tournaments)]
pub struct NewTournament {
    name: String,
    format: String,
    participant_mode: String,
    scoring_type: String,
    round_count: i32,
    is_multi_day: i32,
    phase: String,
    scoring_params: String,
    aggregate_policy: Option<String>,
    reward_curve: String,
    team_reward_policy: Option<String>,
    max_roster_size: Option<i32>,
    created_at: i64,
}

impl NewTournament {
    pub fn new<S: Into<String>>(
        name: S,
        format: TournamentFormat,
        participant_mode: ParticipantMode,
        scoring_type: ScoringType,
        round_count: i32,
        reward_curve: &RewardCurve,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: name.into(),
            format: serde_json::to_string(&format)?,
            participant_mode: serde_json::to_string(&participant_mode)?,
            scoring_type: serde_json::to_string(&scoring_type)?,
            round_count,
            is_multi_day: 0,
            phase: serde_json::to_string(&TournamentPhase::Open)?,
            scoring_params: serde_json::to_string(&ScoringParams::default())?,
            aggregate_policy: None,
            reward_curve: serde_json::to_string(reward_curve)?,
            team_reward_policy: None,
            max_roster_size: None,
            created_at: epoch_timestamp(),
        })
    }

    pub fn multi_day(mut self) -> Self {
        self.is_multi_day = 1;
        self
    }

    pub fn with_scoring_params(
        mut self,
        params: &ScoringParams,
    ) -> Result<Self, serde_json::Error> {
        self.scoring_params = serde_json::to_string(params)?;
        Ok(self)
    }

    pub fn with_aggregate_policy(
        mut self,
        policy: AggregatePolicy,
    ) -> Result<Self, serde_json::Error> {
        self.aggregate_policy = Some(serde_json::to_string(&policy)?);
        Ok(self)
    }

    pub fn with_team_reward_policy(
        mut self,
        policy: TeamRewardPolicy,
    ) -> Result<Self, serde_json::Error> {
        self.team_reward_policy = Some(serde_json::to_string(&policy)?);
        Ok(self)
    }

    pub fn with_max_roster_size(mut self, max: i32) -> Self {
        self.max_roster_size = Some(max);
        self
    }

    save_fn!(tournaments::table, Tournament);
}
