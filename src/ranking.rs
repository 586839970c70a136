//! Standings computation. Every accepted result triggers a full recompute of
//! the affected tournament's table; a single new result can flip tie-break
//! outcomes for unrelated pairs in league play, and tables are small enough
//! that correctness beats incremental cleverness here.

use crate::models::match_results::MatchResult;
use crate::models::participants::ParticipantId;
use crate::models::ranking_entries::{self, NewRankingEntry, RankingEntry};
use crate::models::round_groupings::RoundGrouping;
use crate::models::tournaments::{Tournament, TournamentFormat};
use diesel::SqliteConnection;
use enum_iterator::Sequence;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const POINTS_WIN: i64 = 3;
pub const POINTS_DRAW: i64 = 1;
pub const POINTS_LOSS: i64 = 0;

/// aggregation rule for CUSTOM-format tournaments, declared per tournament
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum AggregatePolicy {
    Sum,
    Max,
    LastRound,
}

/// the secondary criteria recorded alongside each standings row; the
/// participant key orders deterministically but never splits a shared rank
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TieBreak {
    pub rounds_used: i32,
    pub deciding_round: Option<i32>,
    pub participant_key: String,
}

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("[De]serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Tournament {0} is closed")]
    TournamentClosed(i32),
    #[error("Round index {got} is out of range 1..={max}")]
    RoundOutOfRange { got: i32, max: i32 },
    #[error("Participant {0} is not enrolled in this tournament")]
    NotEnrolled(String),
    #[error("Invalid metric: {0}")]
    Validation(#[from] crate::scoring::ScoreValidationError),
    #[error("CUSTOM tournament {0} declares no aggregate policy")]
    MissingAggregatePolicy(i32),
}

#[derive(Debug, Clone)]
struct RoundScore {
    normalized: f64,
    deciding_round: Option<i32>,
}

/// participant -> round -> normalized score, active results only
type Scores = BTreeMap<ParticipantId, BTreeMap<i32, RoundScore>>;

/// (round_index, members) pairs as fed by the external scheduler
type Groupings = Vec<(i32, Vec<ParticipantId>)>;

#[derive(Debug, Clone)]
struct Standing {
    participant: ParticipantId,
    aggregate: f64,
    rounds_used: i32,
    eliminated_in_round: Option<i32>,
    deciding_round: Option<i32>,
}

/// Recomputes the whole standings table for one tournament from its active
/// results and swaps it in atomically. Returns the fresh standings, best rank
/// first.
pub fn recompute_standings(
    tournament: &Tournament,
    conn: &mut SqliteConnection,
) -> Result<Vec<RankingEntry>, RankingError> {
    let scores = load_scores(tournament.id, conn)?;
    let groupings = load_groupings(tournament.id, conn)?;

    let groups = match tournament.format()? {
        TournamentFormat::League | TournamentFormat::RoundRobin => {
            group_by_tie_breaks(league_standings(&scores, &groupings), &scores, &groupings)
        }
        TournamentFormat::Knockout => knockout_groups(&scores),
        TournamentFormat::Custom => {
            let policy = tournament
                .aggregate_policy()?
                .ok_or(RankingError::MissingAggregatePolicy(tournament.id))?;
            group_by_tie_breaks(custom_standings(&scores, policy), &scores, &groupings)
        }
    };

    let mut entries = vec![];
    for (standing, rank) in number_groups(groups) {
        let tie_break = TieBreak {
            rounds_used: standing.rounds_used,
            deciding_round: standing.deciding_round,
            participant_key: standing.participant.key(),
        };
        entries.push(NewRankingEntry::new(
            tournament.id,
            &standing.participant,
            standing.aggregate,
            rank,
            &tie_break,
            standing.rounds_used,
            standing.eliminated_in_round,
        )?);
    }
    ranking_entries::replace_for_tournament(tournament.id, &entries, conn)?;
    debug!(
        "recomputed standings for tournament {}: {} entries",
        tournament.id,
        entries.len()
    );
    RankingEntry::standings(tournament.id, conn).map_err(From::from)
}

fn load_scores(tournament_id: i32, conn: &mut SqliteConnection) -> Result<Scores, RankingError> {
    let mut scores: Scores = BTreeMap::new();
    for result in MatchResult::active_for_tournament(tournament_id, conn)? {
        let participant = result.participant()?;
        let deciding_round = result.raw_metric()?.deciding_round().map(|r| r as i32);
        scores.entry(participant).or_default().insert(
            result.round_index,
            RoundScore {
                normalized: result.normalized_score,
                deciding_round,
            },
        );
    }
    Ok(scores)
}

fn load_groupings(
    tournament_id: i32,
    conn: &mut SqliteConnection,
) -> Result<Groupings, RankingError> {
    let mut groupings = vec![];
    for grouping in RoundGrouping::for_tournament(tournament_id, conn)? {
        groupings.push((grouping.round_index, grouping.participants()?));
    }
    Ok(groupings)
}

/// League points per the fixed table: within a grouping, members with a
/// result that round are compared; highest normalized score wins, members
/// sharing the top score draw, and a sole submitter takes a walkover win.
fn league_standings(scores: &Scores, groupings: &Groupings) -> Vec<Standing> {
    let mut points: BTreeMap<ParticipantId, i64> = scores.keys().map(|p| (*p, 0)).collect();
    for (round, members) in groupings {
        let played: Vec<(ParticipantId, f64)> = members
            .iter()
            .filter_map(|m| {
                scores
                    .get(m)
                    .and_then(|rounds| rounds.get(round))
                    .map(|s| (*m, s.normalized))
            })
            .collect();
        match played.len() {
            0 => continue,
            1 => {
                // walkover
                *points.entry(played[0].0).or_insert(0) += POINTS_WIN;
            }
            _ => {
                let top = played.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
                let winners: Vec<ParticipantId> = played
                    .iter()
                    .filter(|(_, s)| *s == top)
                    .map(|(p, _)| *p)
                    .collect();
                if winners.len() > 1 {
                    for w in winners {
                        *points.entry(w).or_insert(POINTS_LOSS) += POINTS_DRAW;
                    }
                } else {
                    *points.entry(winners[0]).or_insert(POINTS_LOSS) += POINTS_WIN;
                }
            }
        }
    }
    points
        .into_iter()
        .map(|(participant, pts)| Standing {
            participant,
            aggregate: pts as f64,
            rounds_used: rounds_used(scores, &participant),
            eliminated_in_round: None,
            deciding_round: None,
        })
        .collect()
}

fn custom_standings(scores: &Scores, policy: AggregatePolicy) -> Vec<Standing> {
    scores
        .iter()
        .map(|(participant, rounds)| {
            let aggregate = match policy {
                AggregatePolicy::Sum => rounds.values().map(|r| r.normalized).sum(),
                AggregatePolicy::Max => rounds
                    .values()
                    .map(|r| r.normalized)
                    .fold(f64::NEG_INFINITY, f64::max),
                // BTreeMap iterates in round order, so last is the latest round
                AggregatePolicy::LastRound => rounds
                    .values()
                    .last()
                    .map(|r| r.normalized)
                    .unwrap_or(0.0),
            };
            Standing {
                participant: *participant,
                aggregate,
                rounds_used: rounds.len() as i32,
                eliminated_in_round: None,
                deciding_round: None,
            }
        })
        .collect()
}

fn rounds_used(scores: &Scores, participant: &ParticipantId) -> i32 {
    scores.get(participant).map(|r| r.len() as i32).unwrap_or(0)
}

/// Single-elimination bookkeeping: per round, the active participants with a
/// result are ordered by normalized score and the top half survives.
/// Everyone eliminated in the same round shares the terminal rank
/// `survivors + 1`; actives without a result in a round are left alone (the
/// round may simply still be in progress).
fn knockout_groups(scores: &Scores) -> Vec<Vec<Standing>> {
    let mut active: BTreeSet<ParticipantId> = scores.keys().copied().collect();
    let mut survived: BTreeMap<ParticipantId, i32> = scores.keys().map(|p| (*p, 0)).collect();
    let max_round = scores
        .values()
        .flat_map(|rounds| rounds.keys().copied())
        .max()
        .unwrap_or(0);

    // (round, ordered eliminated standings), in elimination order
    let mut eliminations: Vec<(i32, Vec<Standing>)> = vec![];

    for round in 1..=max_round {
        let mut contenders: Vec<(ParticipantId, f64, Option<i32>)> = active
            .iter()
            .filter_map(|p| {
                scores
                    .get(p)
                    .and_then(|rounds| rounds.get(&round))
                    .map(|s| (*p, s.normalized, s.deciding_round))
            })
            .collect();
        if contenders.len() < 2 {
            for (p, _, _) in &contenders {
                *survived.entry(*p).or_insert(0) += 1;
            }
            continue;
        }
        contenders.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| cmp_deciding_round(a.2, b.2))
                .then_with(|| a.0.key().cmp(&b.0.key()))
        });
        let survivor_count = (contenders.len() + 1) / 2;
        for (p, _, _) in &contenders[..survivor_count] {
            *survived.entry(*p).or_insert(0) += 1;
        }
        let eliminated: Vec<Standing> = contenders[survivor_count..]
            .iter()
            .map(|(p, _, deciding)| Standing {
                participant: *p,
                aggregate: survived.get(p).copied().unwrap_or(0) as f64,
                rounds_used: rounds_used(scores, p),
                eliminated_in_round: Some(round),
                deciding_round: *deciding,
            })
            .collect();
        for s in &eliminated {
            active.remove(&s.participant);
        }
        eliminations.push((round, eliminated));
    }

    // survivors first (sharing the top rank), then eliminated groups from the
    // latest round backwards
    let mut groups = vec![];
    if !active.is_empty() {
        groups.push(
            active
                .iter()
                .map(|p| Standing {
                    participant: *p,
                    aggregate: survived.get(p).copied().unwrap_or(0) as f64,
                    rounds_used: rounds_used(scores, p),
                    eliminated_in_round: None,
                    deciding_round: None,
                })
                .collect(),
        );
    }
    for (_, eliminated) in eliminations.into_iter().rev() {
        if !eliminated.is_empty() {
            groups.push(eliminated);
        }
    }
    groups
}

/// earlier deciding round ranks higher; an undeclared one sorts last
fn cmp_deciding_round(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Head-to-head between two participants: net wins across every completed
/// two-participant grouping containing exactly the pair. `Less` means `a`
/// ranks first.
fn head_to_head(
    a: &ParticipantId,
    b: &ParticipantId,
    scores: &Scores,
    groupings: &Groupings,
) -> Option<Ordering> {
    let mut a_wins = 0;
    let mut b_wins = 0;
    for (round, members) in groupings {
        if members.len() != 2 || !members.contains(a) || !members.contains(b) {
            continue;
        }
        let sa = scores.get(a).and_then(|rounds| rounds.get(round));
        let sb = scores.get(b).and_then(|rounds| rounds.get(round));
        if let (Some(sa), Some(sb)) = (sa, sb) {
            match sa.normalized.total_cmp(&sb.normalized) {
                Ordering::Greater => a_wins += 1,
                Ordering::Less => b_wins += 1,
                Ordering::Equal => {}
            }
        }
    }
    match a_wins.cmp(&b_wins) {
        Ordering::Equal => None,
        Ordering::Greater => Some(Ordering::Less),
        Ordering::Less => Some(Ordering::Greater),
    }
}

/// Orders standings by aggregate score descending and splits them into
/// rank-sharing groups. Ties on aggregate are broken, in order, by
/// head-to-head (only when exactly two are tied), then fewer rounds used;
/// whatever still ties shares a rank, ordered by participant key.
fn group_by_tie_breaks(
    mut rows: Vec<Standing>,
    scores: &Scores,
    groupings: &Groupings,
) -> Vec<Vec<Standing>> {
    rows.sort_by(|a, b| {
        b.aggregate
            .total_cmp(&a.aggregate)
            .then_with(|| a.rounds_used.cmp(&b.rounds_used))
            .then_with(|| a.participant.key().cmp(&b.participant.key()))
    });

    let mut groups: Vec<Vec<Standing>> = vec![];
    // NaN can't happen: normalization rejects non-finite values
    for (_, tied) in &rows.into_iter().group_by(|s| s.aggregate) {
        split_tied_group(tied.collect(), scores, groupings, &mut groups);
    }
    groups
}

/// splits one equal-aggregate set into rank-sharing subgroups
fn split_tied_group(
    tied: Vec<Standing>,
    scores: &Scores,
    groupings: &Groupings,
    out: &mut Vec<Vec<Standing>>,
) {
    if tied.is_empty() {
        return;
    }
    if tied.len() == 1 {
        out.push(tied);
        return;
    }
    if tied.len() == 2 {
        if let Some(ord) = head_to_head(
            &tied[0].participant,
            &tied[1].participant,
            scores,
            groupings,
        ) {
            let (first, second) = (tied[0].clone(), tied[1].clone());
            match ord {
                Ordering::Less => {
                    out.push(vec![first]);
                    out.push(vec![second]);
                }
                _ => {
                    out.push(vec![second]);
                    out.push(vec![first]);
                }
            }
            return;
        }
    }
    // fewer rounds to reach the same score ranks first; rows are already
    // sorted by rounds_used
    let mut current: Vec<Standing> = vec![];
    for row in tied {
        if current
            .last()
            .map_or(true, |p| p.rounds_used == row.rounds_used)
        {
            current.push(row);
        } else {
            out.push(std::mem::take(&mut current));
            current.push(row);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// competition ranking: tied entries share a rank, the next distinct rank
/// skips by the tie count (1, 2, 2, 4)
fn number_groups(groups: Vec<Vec<Standing>>) -> Vec<(Standing, i32)> {
    let mut out = vec![];
    let mut position = 0i32;
    for group in groups {
        let rank = position + 1;
        for standing in group {
            out.push((standing, rank));
            position += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(user: i32, aggregate: f64, rounds_used: i32) -> Standing {
        Standing {
            participant: ParticipantId::User(user),
            aggregate,
            rounds_used,
            eliminated_in_round: None,
            deciding_round: None,
        }
    }

    fn ranks(groups: Vec<Vec<Standing>>) -> Vec<(ParticipantId, i32)> {
        number_groups(groups)
            .into_iter()
            .map(|(s, r)| (s.participant, r))
            .collect()
    }

    #[test]
    fn test_competition_numbering_skips_after_ties() {
        let groups = vec![
            vec![standing(1, 9.0, 1)],
            vec![standing(2, 7.0, 2), standing(3, 7.0, 2)],
            vec![standing(4, 4.0, 2)],
        ];
        assert_eq!(
            vec![
                (ParticipantId::User(1), 1),
                (ParticipantId::User(2), 2),
                (ParticipantId::User(3), 2),
                (ParticipantId::User(4), 4),
            ],
            ranks(groups)
        );
    }

    #[test]
    fn test_fewer_rounds_breaks_ties() {
        let rows = vec![standing(1, 6.0, 3), standing(2, 6.0, 2)];
        let groups = group_by_tie_breaks(rows, &BTreeMap::new(), &vec![]);
        assert_eq!(
            vec![(ParticipantId::User(2), 1), (ParticipantId::User(1), 2)],
            ranks(groups)
        );
    }

    #[test]
    fn test_unbreakable_tie_shares_rank() {
        let rows = vec![standing(2, 6.0, 2), standing(1, 6.0, 2)];
        let groups = group_by_tie_breaks(rows, &BTreeMap::new(), &vec![]);
        assert_eq!(
            vec![(ParticipantId::User(1), 1), (ParticipantId::User(2), 1)],
            ranks(groups)
        );
    }

    #[test]
    fn test_head_to_head_splits_a_two_way_tie() {
        let a = ParticipantId::User(1);
        let b = ParticipantId::User(2);
        let mut scores: Scores = BTreeMap::new();
        scores.entry(a).or_default().insert(
            1,
            RoundScore {
                normalized: 3.0,
                deciding_round: None,
            },
        );
        scores.entry(b).or_default().insert(
            1,
            RoundScore {
                normalized: 5.0,
                deciding_round: None,
            },
        );
        let groupings = vec![(1, vec![a, b])];
        // equal aggregates and rounds, but b beat a directly
        let rows = vec![standing(1, 6.0, 2), standing(2, 6.0, 2)];
        let groups = group_by_tie_breaks(rows, &scores, &groupings);
        assert_eq!(vec![(b, 1), (a, 2)], ranks(groups));
    }

    #[test]
    fn test_knockout_halving_and_shared_terminal_ranks() {
        // four entrants, round 1 eliminates the two slowest, round 2 the
        // runner-up
        let mut scores: Scores = BTreeMap::new();
        let entrants = [1, 2, 3, 4];
        let round_1 = [40.0, 30.0, 20.0, 10.0];
        for (user, normalized) in entrants.iter().zip(round_1) {
            scores.entry(ParticipantId::User(*user)).or_default().insert(
                1,
                RoundScore {
                    normalized,
                    deciding_round: None,
                },
            );
        }
        for (user, normalized) in [(1, 25.0), (2, 35.0)] {
            scores.entry(ParticipantId::User(user)).or_default().insert(
                2,
                RoundScore {
                    normalized,
                    deciding_round: None,
                },
            );
        }
        let groups = knockout_groups(&scores);
        assert_eq!(
            vec![
                (ParticipantId::User(2), 1),
                (ParticipantId::User(1), 2),
                (ParticipantId::User(3), 3),
                (ParticipantId::User(4), 3),
            ],
            ranks(groups)
        );
    }
}
