use tourney_engine::db::{raw_diesel_cxn_from_env, run_migrations};
use tourney_engine::engine::TournamentEngine;
use tourney_engine::models::participants::ParticipantId;
use tourney_engine::models::tournaments::{
    NewTournament, ParticipantMode, TournamentFormat,
};
use tourney_engine::rewards::{RewardBand, RewardCurve};
use tourney_engine::scoring::{RawMetric, ScoringType};

extern crate dotenv;

fn main() {
    dotenv::dotenv().unwrap();
    let mut db = raw_diesel_cxn_from_env().unwrap();
    run_migrations(&mut db).unwrap();

    let curve = RewardCurve::new(vec![
        RewardBand {
            min_rank: 1,
            max_rank: 1,
            xp: 500,
            credits: 100,
        },
        RewardBand {
            min_rank: 2,
            max_rank: 3,
            xp: 200,
            credits: 40,
        },
    ]);
    let tournament = NewTournament::new(
        "Demo Spring League",
        TournamentFormat::League,
        ParticipantMode::Individual,
        ScoringType::Score,
        3,
        &curve,
    )
    .unwrap()
    .save(&mut db)
    .unwrap();
    println!("tournament: {:?}", tournament);

    let engine = TournamentEngine::new();
    let players: Vec<ParticipantId> = (1..=6).map(ParticipantId::User).collect();
    for p in &players {
        let entry = engine.enroll(tournament.id, p, &mut db).unwrap();
        println!("enrolled {:?}", entry);
    }
    for pair in players.chunks(2) {
        engine
            .record_grouping(tournament.id, 1, pair, &mut db)
            .unwrap();
    }
    for (i, p) in players.iter().enumerate() {
        engine
            .submit_result(
                tournament.id,
                1,
                p,
                &RawMetric::Score(10.0 + i as f64),
                &mut db,
            )
            .unwrap();
    }

    let standings = engine.get_standings(tournament.id, &mut db).unwrap();
    for entry in standings {
        println!(
            "#{} {} ({} pts)",
            entry.rank,
            entry.participant().unwrap().key(),
            entry.aggregate_score
        );
    }
}
