//! Reward distribution for closed tournaments. Grants are deduplicated on
//! (tournament, participant), so running distribution again after a partial
//! failure picks up exactly the still-missing grants.

use crate::models::participants::ParticipantId;
use crate::models::ranking_entries::RankingEntry;
use crate::models::reward_grants::{NewRewardGrant, RewardGrant};
use crate::models::teams::{Team, TeamError, TeamRole};
use crate::models::tournaments::Tournament;
use diesel::SqliteConnection;
use enum_iterator::Sequence;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// inclusive rank band mapping final standing to a reward
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RewardBand {
    pub min_rank: i32,
    pub max_rank: i32,
    pub xp: i64,
    pub credits: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardCurve {
    pub bands: Vec<RewardBand>,
}

impl RewardCurve {
    pub fn new(bands: Vec<RewardBand>) -> Self {
        Self { bands }
    }

    /// (xp, credits) for a final rank; ranks outside every band earn nothing
    pub fn reward_for(&self, rank: i32) -> Option<(i64, i64)> {
        self.bands
            .iter()
            .find(|b| b.min_rank <= rank && rank <= b.max_rank)
            .map(|b| (b.xp, b.credits))
    }
}

/// how a TEAM participant's reward reaches the roster; declared per
/// tournament, never assumed
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum TeamRewardPolicy {
    SplitEven,
    CaptainOnly,
    PerMemberFull,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger rejected grant {grant_id}: {reason}")]
    Rejected { grant_id: String, reason: String },
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// The external reward ledger collaborator. `grant_id` is stable per
/// (tournament, participant, user) so the ledger can dedup on its side too.
#[cfg_attr(test, mockall::automock)]
pub trait RewardLedger {
    fn grant(&self, grant_id: &str, user_id: i32, xp: i64, credits: i64)
        -> Result<(), LedgerError>;
}

#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("[De]serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Team error: {0}")]
    TeamError(#[from] TeamError),
    #[error("Rewards can only be distributed for a closed tournament ({0})")]
    TournamentNotClosed(i32),
    #[error("Tournament {0} has team standings but declares no team reward policy")]
    MissingTeamRewardPolicy(i32),
    #[error("Ranking entry references unknown team {0}")]
    UnknownTeam(i32),
}

/// outcome of one distribution pass; `failed` participants have no grant row
/// and will be retried by the next pass
#[derive(Debug, Default)]
pub struct DistributionReport {
    pub granted: Vec<ParticipantId>,
    pub skipped: Vec<ParticipantId>,
    pub failed: Vec<(ParticipantId, LedgerError)>,
}

/// Maps each final rank to its reward and pushes it to the ledger, at most
/// once per participant per tournament. A ledger failure for one participant
/// never aborts the rest of the batch.
pub fn distribute_rewards(
    tournament: &Tournament,
    ledger: &dyn RewardLedger,
    conn: &mut SqliteConnection,
) -> Result<DistributionReport, RewardError> {
    if !tournament.is_closed()? {
        return Err(RewardError::TournamentNotClosed(tournament.id));
    }
    let curve = tournament.reward_curve()?;
    let mut report = DistributionReport::default();

    for entry in RankingEntry::standings(tournament.id, conn)? {
        let participant = entry.participant()?;
        if RewardGrant::exists(tournament.id, &participant.to_column()?, conn)? {
            report.skipped.push(participant);
            continue;
        }
        let (xp, credits) = match curve.reward_for(entry.rank) {
            Some(amounts) => amounts,
            None => continue,
        };
        let payouts = resolve_payouts(tournament, &participant, xp, credits, conn)?;

        let mut failure = None;
        for payout in &payouts {
            let grant_id = format!(
                "t{}-{}-u{}",
                tournament.id,
                participant.key(),
                payout.user_id
            );
            if let Err(e) = ledger.grant(&grant_id, payout.user_id, payout.xp, payout.credits) {
                warn!(
                    "ledger grant {grant_id} failed during distribution for tournament {}: {e}",
                    tournament.id
                );
                failure = Some(e);
                break;
            }
        }
        match failure {
            Some(e) => report.failed.push((participant, e)),
            None => {
                NewRewardGrant::new(tournament.id, &participant, entry.rank, xp, credits)?
                    .save(conn)?;
                report.granted.push(participant);
            }
        }
    }
    debug!(
        "distribution for tournament {}: {} granted, {} skipped, {} failed",
        tournament.id,
        report.granted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

struct Payout {
    user_id: i32,
    xp: i64,
    credits: i64,
}

/// turns one participant's reward into per-user ledger amounts
fn resolve_payouts(
    tournament: &Tournament,
    participant: &ParticipantId,
    xp: i64,
    credits: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payout>, RewardError> {
    match participant {
        ParticipantId::User(user_id) => Ok(vec![Payout {
            user_id: *user_id,
            xp,
            credits,
        }]),
        ParticipantId::Team(team_id) => {
            let policy = tournament
                .team_reward_policy()?
                .ok_or(RewardError::MissingTeamRewardPolicy(tournament.id))?;
            let team = Team::get_by_id(*team_id, conn)?
                .ok_or(RewardError::UnknownTeam(*team_id))?;
            match policy {
                TeamRewardPolicy::CaptainOnly => {
                    let captain = team.captain(conn)?;
                    Ok(vec![Payout {
                        user_id: captain.user_id,
                        xp,
                        credits,
                    }])
                }
                TeamRewardPolicy::PerMemberFull => Ok(team
                    .members(conn)?
                    .iter()
                    .map(|m| Payout {
                        user_id: m.user_id,
                        xp,
                        credits,
                    })
                    .collect()),
                TeamRewardPolicy::SplitEven => {
                    let members = team.members(conn)?;
                    let captain_id = members
                        .iter()
                        .find(|m| matches!(m.role(), Ok(TeamRole::Captain)))
                        .map(|m| m.user_id)
                        .ok_or(TeamError::MissingCaptain(team.id))?;
                    let n = members.len() as i64;
                    // shares round down; the captain takes the remainder
                    let (xp_share, xp_rem) = (xp / n, xp % n);
                    let (credits_share, credits_rem) = (credits / n, credits % n);
                    Ok(members
                        .iter()
                        .map(|m| {
                            let extra = if m.user_id == captain_id { 1 } else { 0 };
                            Payout {
                                user_id: m.user_id,
                                xp: xp_share + xp_rem * extra,
                                credits: credits_share + credits_rem * extra,
                            }
                        })
                        .collect())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ranking_entries::{self, NewRankingEntry};
    use crate::models::tournaments::{NewTournament, ParticipantMode, TournamentFormat};
    use crate::ranking::{AggregatePolicy, TieBreak};
    use crate::scoring::ScoringType;
    use diesel::{Connection, SqliteConnection};

    fn curve() -> RewardCurve {
        RewardCurve::new(vec![
            RewardBand {
                min_rank: 1,
                max_rank: 1,
                xp: 100,
                credits: 50,
            },
            RewardBand {
                min_rank: 2,
                max_rank: 3,
                xp: 40,
                credits: 20,
            },
        ])
    }

    #[test]
    fn test_reward_for_band_lookup() {
        let c = curve();
        assert_eq!(Some((100, 50)), c.reward_for(1));
        assert_eq!(Some((40, 20)), c.reward_for(2));
        assert_eq!(Some((40, 20)), c.reward_for(3));
        assert_eq!(None, c.reward_for(4));
    }

    #[test]
    fn test_curve_round_trips_through_json() {
        let c = curve();
        let raw = serde_json::to_string(&c).unwrap();
        assert_eq!(c, serde_json::from_str(&raw).unwrap());
    }

    #[test]
    fn test_distribution_calls_ledger_once_per_user() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        crate::db::run_migrations(&mut conn).unwrap();
        let mut tournament = NewTournament::new(
            "unit_rewards",
            TournamentFormat::Custom,
            ParticipantMode::Individual,
            ScoringType::Score,
            1,
            &curve(),
        )
        .unwrap()
        .with_aggregate_policy(AggregatePolicy::Sum)
        .unwrap()
        .save(&mut conn)
        .unwrap();
        assert!(tournament.close().unwrap());
        tournament.update(&mut conn).unwrap();

        let winner = ParticipantId::User(7);
        let tie_break = TieBreak {
            rounds_used: 1,
            deciding_round: None,
            participant_key: winner.key(),
        };
        let entry =
            NewRankingEntry::new(tournament.id, &winner, 9.0, 1, &tie_break, 1, None).unwrap();
        ranking_entries::replace_for_tournament(tournament.id, &vec![entry], &mut conn).unwrap();

        let mut ledger = MockRewardLedger::new();
        ledger
            .expect_grant()
            .withf(|grant_id, user_id, xp, credits| {
                grant_id.ends_with("-u7") && *user_id == 7 && *xp == 100 && *credits == 50
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let report = distribute_rewards(&tournament, &ledger, &mut conn).unwrap();
        assert_eq!(vec![winner], report.granted);

        // a second pass skips the existing grant without touching the ledger
        let strict = MockRewardLedger::new();
        let report = distribute_rewards(&tournament, &strict, &mut conn).unwrap();
        assert_eq!(vec![winner], report.skipped);
    }
}
