use crate::utils::env_var;
use once_cell::sync::Lazy;

const DATABASE_URL_VAR: &str = "DATABASE_URL";

pub static CONFIG: Lazy<Config> = Lazy::new(Config::new_from_env);

pub struct Config {
    pub database_url: String,
}

impl Config {
    /// explodes if any env vars are missing
    fn new_from_env() -> Self {
        Self {
            database_url: env_var(DATABASE_URL_VAR),
        }
    }
}
