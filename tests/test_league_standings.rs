mod common;

use common::{demo_curve, start_db};
use tourney_engine::engine::TournamentEngine;
use tourney_engine::models::participants::ParticipantId;
use tourney_engine::models::ranking_entries::RankingEntry;
use tourney_engine::models::tournaments::{
    NewTournament, ParticipantMode, Tournament, TournamentFormat,
};
use tourney_engine::ranking::RankingError;
use tourney_engine::scoring::{RawMetric, ScoringType};
use tourney_engine::EngineError;

fn league_fixture(
    db: &mut diesel::SqliteConnection,
) -> Result<(TournamentEngine, Tournament, Vec<ParticipantId>), anyhow::Error> {
    let tournament = NewTournament::new(
        "test_league",
        TournamentFormat::League,
        ParticipantMode::Individual,
        ScoringType::Score,
        2,
        &demo_curve(),
    )?
    .save(db)?;
    let engine = TournamentEngine::new();
    let players: Vec<ParticipantId> = (1..=3).map(ParticipantId::User).collect();
    for p in &players {
        engine.enroll(tournament.id, p, db)?;
    }
    Ok((engine, tournament, players))
}

fn ranks_by_key(standings: &[RankingEntry]) -> Vec<(String, i32, f64)> {
    standings
        .iter()
        .map(|e| {
            (
                e.participant().unwrap().key(),
                e.rank,
                e.aggregate_score,
            )
        })
        .collect()
}

/// round 1: A beats B, C sits out; round 2: A draws C, B beats C
/// expected: A=4 (3+1), B=3 (0+3), C=1 (0+1) -> ranks 1, 2, 3
#[test]
fn test_league_points_worked_example() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;
    let (a, b, c) = (players[0], players[1], players[2]);

    engine.record_grouping(tournament.id, 1, &[a, b], &mut db)?;
    engine.record_grouping(tournament.id, 2, &[a, c], &mut db)?;
    engine.record_grouping(tournament.id, 2, &[b, c], &mut db)?;

    engine.submit_result(tournament.id, 1, &a, &RawMetric::Score(10.0), &mut db)?;
    engine.submit_result(tournament.id, 1, &b, &RawMetric::Score(5.0), &mut db)?;
    engine.submit_result(tournament.id, 2, &a, &RawMetric::Score(7.0), &mut db)?;
    engine.submit_result(tournament.id, 2, &c, &RawMetric::Score(7.0), &mut db)?;
    let standings =
        engine.submit_result(tournament.id, 2, &b, &RawMetric::Score(9.0), &mut db)?;

    assert_eq!(
        vec![
            ("user:1".to_string(), 1, 4.0),
            ("user:2".to_string(), 2, 3.0),
            ("user:3".to_string(), 3, 1.0),
        ],
        ranks_by_key(&standings)
    );
    Ok(())
}

#[test]
fn test_duplicate_submission_is_idempotent() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;
    let (a, b) = (players[0], players[1]);
    engine.record_grouping(tournament.id, 1, &[a, b], &mut db)?;

    engine.submit_result(tournament.id, 1, &a, &RawMetric::Score(10.0), &mut db)?;
    let first = engine.submit_result(tournament.id, 1, &b, &RawMetric::Score(5.0), &mut db)?;
    // byte-identical re-submission goes through the supersede path but
    // produces the same standings
    let second = engine.submit_result(tournament.id, 1, &b, &RawMetric::Score(5.0), &mut db)?;

    assert_eq!(ranks_by_key(&first), ranks_by_key(&second));
    Ok(())
}

#[test]
fn test_correction_supersedes_and_flips_standings() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;
    let (a, b) = (players[0], players[1]);
    engine.record_grouping(tournament.id, 1, &[a, b], &mut db)?;

    engine.submit_result(tournament.id, 1, &a, &RawMetric::Score(10.0), &mut db)?;
    engine.submit_result(tournament.id, 1, &b, &RawMetric::Score(5.0), &mut db)?;
    // correction: B actually scored 12
    let standings =
        engine.submit_result(tournament.id, 1, &b, &RawMetric::Score(12.0), &mut db)?;

    assert_eq!(
        vec![("user:2".to_string(), 1, 3.0), ("user:1".to_string(), 2, 0.0)],
        ranks_by_key(&standings)
    );
    Ok(())
}

#[test]
fn test_fewer_rounds_tie_break() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;
    let (a, b, c) = (players[0], players[1], players[2]);

    engine.record_grouping(tournament.id, 1, &[a, b], &mut db)?;
    engine.record_grouping(tournament.id, 2, &[a, c], &mut db)?;
    engine.record_grouping(tournament.id, 2, &[b, c], &mut db)?;

    // B overtakes A in round 1 after a correction; A ends on 1 point from
    // two rounds while C ends on 1 point from a single round
    engine.submit_result(tournament.id, 1, &a, &RawMetric::Score(10.0), &mut db)?;
    engine.submit_result(tournament.id, 1, &b, &RawMetric::Score(12.0), &mut db)?;
    engine.submit_result(tournament.id, 2, &a, &RawMetric::Score(7.0), &mut db)?;
    engine.submit_result(tournament.id, 2, &c, &RawMetric::Score(7.0), &mut db)?;
    let standings =
        engine.submit_result(tournament.id, 2, &b, &RawMetric::Score(9.0), &mut db)?;

    // B=6, A=1 (rounds_used 2), C=1 (rounds_used 1): C edges A on fewer rounds
    assert_eq!(
        vec![
            ("user:2".to_string(), 1, 6.0),
            ("user:3".to_string(), 2, 1.0),
            ("user:1".to_string(), 3, 1.0),
        ],
        ranks_by_key(&standings)
    );
    Ok(())
}

/// a grouping where exactly one member has a result is a walkover win
#[test]
fn test_sole_submitter_takes_walkover_win() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;
    let (a, b) = (players[0], players[1]);
    engine.record_grouping(tournament.id, 1, &[a, b], &mut db)?;

    // b never shows up
    let standings =
        engine.submit_result(tournament.id, 1, &a, &RawMetric::Score(4.0), &mut db)?;

    assert_eq!(
        vec![("user:1".to_string(), 1, 3.0)],
        ranks_by_key(&standings)
    );
    Ok(())
}

#[test]
fn test_closed_tournament_rejects_results() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;
    let a = players[0];
    engine.submit_result(tournament.id, 1, &a, &RawMetric::Score(1.0), &mut db)?;

    let ledger = common::RecordingLedger::default();
    engine.close_tournament(tournament.id, &ledger, &mut db)?;

    let err = engine
        .submit_result(tournament.id, 2, &a, &RawMetric::Score(2.0), &mut db)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RankingError(RankingError::TournamentClosed(_))
    ));
    Ok(())
}

#[test]
fn test_unenrolled_participant_rejected() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, _) = league_fixture(&mut db)?;
    let stranger = ParticipantId::User(99);

    let err = engine
        .submit_result(tournament.id, 1, &stranger, &RawMetric::Score(3.0), &mut db)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RankingError(RankingError::NotEnrolled(_))
    ));
    Ok(())
}

#[test]
fn test_wrong_metric_type_rejected() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;

    let err = engine
        .submit_result(
            tournament.id,
            1,
            &players[0],
            &RawMetric::Time { seconds: 90 },
            &mut db,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RankingError(RankingError::Validation(_))
    ));
    Ok(())
}

#[test]
fn test_round_out_of_range_rejected() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;

    let err = engine
        .submit_result(tournament.id, 3, &players[0], &RawMetric::Score(1.0), &mut db)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RankingError(RankingError::RoundOutOfRange { got: 3, max: 2 })
    ));
    Ok(())
}

#[test]
fn test_empty_tournament_has_empty_standings() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, _) = league_fixture(&mut db)?;
    assert!(engine.get_standings(tournament.id, &mut db)?.is_empty());
    Ok(())
}

#[test]
fn test_enrollment_closes_with_the_tournament() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, _) = league_fixture(&mut db)?;
    let ledger = common::RecordingLedger::default();
    engine.close_tournament(tournament.id, &ledger, &mut db)?;

    let err = engine
        .enroll(tournament.id, &ParticipantId::User(9), &mut db)
        .unwrap_err();
    assert!(matches!(err, EngineError::StateError(_)));
    Ok(())
}

#[test]
fn test_enroll_rejects_participant_mode_mismatch() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    // the fixture declares INDIVIDUAL; a team id does not fit
    let (engine, tournament, _) = league_fixture(&mut db)?;

    let err = engine
        .enroll(tournament.id, &ParticipantId::Team(1), &mut db)
        .unwrap_err();
    assert!(matches!(err, EngineError::StateError(_)));
    Ok(())
}

#[test]
fn test_grouping_requires_every_member_enrolled() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;

    let err = engine
        .record_grouping(
            tournament.id,
            1,
            &[players[0], ParticipantId::User(99)],
            &mut db,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RankingError(RankingError::NotEnrolled(_))
    ));
    Ok(())
}

#[test]
fn test_grouping_round_out_of_range_rejected() -> Result<(), anyhow::Error> {
    let mut db = start_db()?;
    let (engine, tournament, players) = league_fixture(&mut db)?;

    let err = engine
        .record_grouping(tournament.id, 5, &[players[0], players[1]], &mut db)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RankingError(RankingError::RoundOutOfRange { got: 5, max: 2 })
    ));
    Ok(())
}
