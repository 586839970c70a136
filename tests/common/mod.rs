use diesel::{Connection, SqliteConnection};
use std::sync::Mutex;
use tourney_engine::db::run_migrations;
use tourney_engine::rewards::{LedgerError, RewardBand, RewardCurve, RewardLedger};

pub fn start_db() -> Result<SqliteConnection, anyhow::Error> {
    let mut db = SqliteConnection::establish(":memory:")?;
    run_migrations(&mut db).map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(db)
}

pub fn demo_curve() -> RewardCurve {
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

/// test ledger that records grants and can be told to fail for chosen users
#[derive(Default)]
pub struct RecordingLedger {
    pub calls: Mutex<Vec<(String, i32, i64, i64)>>,
    pub fail_users: Mutex<Vec<i32>>,
}

impl RecordingLedger {
    pub fn grants(&self) -> Vec<(String, i32, i64, i64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_for(&self, user_id: i32) {
        self.fail_users.lock().unwrap().push(user_id);
    }

    pub fn clear_failures(&self) {
        self.fail_users.lock().unwrap().clear();
    }
}

impl RewardLedger for RecordingLedger {
    fn grant(
        &self,
        grant_id: &str,
        user_id: i32,
        xp: i64,
        credits: i64,
    ) -> Result<(), LedgerError> {
        if self.fail_users.lock().unwrap().contains(&user_id) {
            return Err(LedgerError::Unavailable(format!(
                "injected failure for user {user_id}"
            )));
        }
        self.calls
            .lock()
            .unwrap()
            .push((grant_id.to_string(), user_id, xp, credits));
        Ok(())
    }
}
