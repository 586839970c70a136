//! The request/response surface the surrounding system calls into, plus the
//! per-tournament serialization points that keep recomputes from racing each
//! other.

use crate::models::match_results::NewMatchResult;
use crate::models::participants::{self, ParticipantId, TournamentEntry};
use crate::models::ranking_entries::RankingEntry;
use crate::models::round_groupings::{NewRoundGrouping, RoundGrouping};
use crate::models::teams::{self, Team, TeamMember};
use crate::models::tournaments::{ParticipantMode, Tournament};
use crate::ranking::{self, RankingError};
use crate::rewards::{self, DistributionReport, RewardLedger};
use crate::scoring::{self, RawMetric};
use crate::stats::{self, TournamentStatsSnapshot};
use crate::EngineError;
use dashmap::DashMap;
use diesel::SqliteConnection;
use log::info;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Engine facade. All writes to one tournament's standings are serialized
/// through a per-tournament mutex; different tournaments proceed in parallel.
/// Team registry writes are serialized per team the same way.
#[derive(Default)]
pub struct TournamentEngine {
    tournament_locks: DashMap<i32, Arc<Mutex<()>>>,
    team_locks: DashMap<i32, Arc<Mutex<()>>>,
}

fn acquire(lock: &Arc<Mutex<()>>) -> MutexGuard<'_, ()> {
    // a panicked holder can't have left partial state behind: every multi-row
    // write goes through a transaction
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TournamentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn tournament_lock(&self, tournament_id: i32) -> Arc<Mutex<()>> {
        self.tournament_locks
            .entry(tournament_id)
            .or_default()
            .clone()
    }

    fn team_lock(&self, team_id: i32) -> Arc<Mutex<()>> {
        self.team_locks.entry(team_id).or_default().clone()
    }

    fn get_tournament(
        &self,
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Tournament, EngineError> {
        Tournament::get_by_id(tournament_id, conn)?
            .ok_or(EngineError::UnknownTournament(tournament_id))
    }

    /// Accepts or rejects one raw result. On acceptance the tournament's
    /// standings are fully recomputed and returned. A re-submission for the
    /// same (round, participant) key supersedes the earlier result.
    pub fn submit_result(
        &self,
        tournament_id: i32,
        round_index: i32,
        participant: &ParticipantId,
        metric: &RawMetric,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<RankingEntry>, EngineError> {
        let lock = self.tournament_lock(tournament_id);
        let _guard = acquire(&lock);

        let mut tournament = self.get_tournament(tournament_id, conn)?;
        if tournament.is_closed()? {
            return Err(RankingError::TournamentClosed(tournament_id).into());
        }
        if round_index < 1 || round_index > tournament.round_count {
            return Err(RankingError::RoundOutOfRange {
                got: round_index,
                max: tournament.round_count,
            }
            .into());
        }
        if !TournamentEntry::is_enrolled(tournament_id, participant, conn)? {
            return Err(RankingError::NotEnrolled(participant.key()).into());
        }
        let normalized = scoring::normalize(
            tournament.scoring_type()?,
            metric,
            &tournament.scoring_params()?,
        )
        .map_err(RankingError::from)?;

        NewMatchResult::new(&tournament, round_index, participant, metric, normalized)?
            .supersede_and_save(conn)?;
        if tournament.mark_in_progress()? {
            tournament.update(conn)?;
        }
        Ok(ranking::recompute_standings(&tournament, conn)?)
    }

    pub fn get_standings(
        &self,
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<RankingEntry>, EngineError> {
        self.get_tournament(tournament_id, conn)?;
        RankingEntry::standings(tournament_id, conn).map_err(From::from)
    }

    /// Closes the tournament and distributes rewards. Idempotent: calling it
    /// again re-runs distribution, which skips every participant that already
    /// has a grant and retries only missing ones. Taking the tournament lock
    /// first quiesces any in-flight recompute before ranks are snapshotted.
    pub fn close_tournament(
        &self,
        tournament_id: i32,
        ledger: &dyn RewardLedger,
        conn: &mut SqliteConnection,
    ) -> Result<DistributionReport, EngineError> {
        let lock = self.tournament_lock(tournament_id);
        let _guard = acquire(&lock);

        let mut tournament = self.get_tournament(tournament_id, conn)?;
        if tournament.close()? {
            tournament.update(conn)?;
            ranking::recompute_standings(&tournament, conn)?;
            info!("tournament {tournament_id} closed");
        }
        Ok(rewards::distribute_rewards(&tournament, ledger, conn)?)
    }

    pub fn get_stats(
        &self,
        tournament_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<TournamentStatsSnapshot, EngineError> {
        let tournament = self.get_tournament(tournament_id, conn)?;
        stats::snapshot(&tournament, conn).map_err(EngineError::from)
    }

    /// Ingestion point for the enrollment feed. Participants must fit the
    /// tournament's declared participant mode.
    pub fn enroll(
        &self,
        tournament_id: i32,
        participant: &ParticipantId,
        conn: &mut SqliteConnection,
    ) -> Result<TournamentEntry, EngineError> {
        let lock = self.tournament_lock(tournament_id);
        let _guard = acquire(&lock);

        let tournament = self.get_tournament(tournament_id, conn)?;
        if tournament.is_closed()? {
            return Err(EngineError::StateError(format!(
                "Tournament {tournament_id} is closed to enrollment"
            )));
        }
        let mode_ok = match tournament.participant_mode()? {
            ParticipantMode::Individual => matches!(participant, ParticipantId::User(_)),
            ParticipantMode::Team => matches!(participant, ParticipantId::Team(_)),
            ParticipantMode::Mixed => true,
        };
        if !mode_ok {
            return Err(EngineError::StateError(format!(
                "Participant {} does not fit the tournament's participant mode",
                participant.key()
            )));
        }
        Ok(participants::enroll(&tournament, participant, conn)?)
    }

    /// Ingestion point for the round-grouping feed (league/round-robin win
    /// determination and head-to-head lookups).
    pub fn record_grouping(
        &self,
        tournament_id: i32,
        round_index: i32,
        grouped: &[ParticipantId],
        conn: &mut SqliteConnection,
    ) -> Result<RoundGrouping, EngineError> {
        let lock = self.tournament_lock(tournament_id);
        let _guard = acquire(&lock);

        let tournament = self.get_tournament(tournament_id, conn)?;
        if round_index < 1 || round_index > tournament.round_count {
            return Err(RankingError::RoundOutOfRange {
                got: round_index,
                max: tournament.round_count,
            }
            .into());
        }
        for participant in grouped {
            if !TournamentEntry::is_enrolled(tournament_id, participant, conn)? {
                return Err(RankingError::NotEnrolled(participant.key()).into());
            }
        }
        Ok(NewRoundGrouping::new(&tournament, round_index, grouped)?.save(conn)?)
    }

    pub fn create_team<S: Into<String>>(
        &self,
        tournament_id: i32,
        captain_user_id: i32,
        name: S,
        conn: &mut SqliteConnection,
    ) -> Result<Team, EngineError> {
        // cross-team duplicate checks span the tournament, so creation
        // serializes on the tournament
        let lock = self.tournament_lock(tournament_id);
        let _guard = acquire(&lock);

        let tournament = self.get_tournament(tournament_id, conn)?;
        Ok(teams::create_team(&tournament, captain_user_id, name, conn)?)
    }

    pub fn add_member(
        &self,
        team_id: i32,
        user_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<TeamMember, EngineError> {
        let lock = self.team_lock(team_id);
        let _guard = acquire(&lock);

        let team = self.get_team(team_id, conn)?;
        let tournament = self.get_tournament(team.tournament_id, conn)?;
        Ok(team.add_member(&tournament, user_id, conn)?)
    }

    pub fn remove_member(
        &self,
        team_id: i32,
        user_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<(), EngineError> {
        let lock = self.team_lock(team_id);
        let _guard = acquire(&lock);

        let team = self.get_team(team_id, conn)?;
        Ok(team.remove_member(user_id, conn)?)
    }

    pub fn transfer_captaincy(
        &self,
        team_id: i32,
        new_captain_user_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<(), EngineError> {
        let lock = self.team_lock(team_id);
        let _guard = acquire(&lock);

        let team = self.get_team(team_id, conn)?;
        Ok(team.transfer_captaincy(new_captain_user_id, conn)?)
    }

    pub fn delete_team(
        &self,
        team_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<(), EngineError> {
        let lock = self.team_lock(team_id);
        let _guard = acquire(&lock);

        let team = self.get_team(team_id, conn)?;
        team.delete(conn)?;
        self.team_locks.remove(&team_id);
        Ok(())
    }

    fn get_team(
        &self,
        team_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Team, EngineError> {
        Team::get_by_id(team_id, conn)?.ok_or(EngineError::UnknownTeam(team_id))
    }
}
