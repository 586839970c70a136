pub mod match_results;
pub mod participants;
pub mod ranking_entries;
pub mod reward_grants;
pub mod round_groupings;
pub mod teams;
pub mod tournaments;

pub fn epoch_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// creates a function named `save()` that takes a &mut SqliteConnection
#[macro_export]
macro_rules! save_fn {
    ($table:expr, $output:ty) => {
        pub fn save(&self, cxn: &mut diesel::SqliteConnection) -> diesel::QueryResult<$output> {
            use diesel::RunQueryDsl;
            diesel::insert_into($table).values(self).get_result(cxn)
        }
    };
}

#[macro_export]
macro_rules! update_fn {
    () => {
        pub fn update(&self, conn: &mut diesel::SqliteConnection) -> diesel::QueryResult<usize> {
            diesel::update(self).set(self).execute(conn)
        }
    };
}
