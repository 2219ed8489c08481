use crate::error::{AppError, Result};

/// Trailing window size for the rolling mean behind every summary row.
pub const MEAN_WINDOW: usize = 5;

/// Sane cap on refine levels accepted from submissions. Key derivation itself
/// has no upper bound; this only rejects obvious typos at the door.
pub const MAX_REFINE: u32 = 20;

/// Maximum attachment slots a single item can carry.
pub const MAX_ATTACHMENTS: usize = 4;

/// Deviation thresholds (last price vs trailing mean), inclusive at the
/// boundary. Asymmetric: the sell bar sits higher than the buy bar.
pub mod recommendation_thresholds {
    /// deviation <= BUY_MAX → Buy
    pub const BUY_MAX: f64 = -0.05;
    /// deviation >= SELL_MIN → Sell
    pub const SELL_MIN: f64 = 0.10;
}

/// Neutral band (in percent) for the per-item trend verdict.
pub const TREND_NEUTRAL_BAND_PCT: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub api_port: u16,
    pub log_level: String,
    /// Usernames allowed to overwrite prices directly and review change
    /// requests (ADMIN_USERS, comma-separated).
    pub admin_users: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "monitor.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| {
                    AppError::Config("API_PORT must be a valid port number".to_string())
                })?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            admin_users: std::env::var("ADMIN_USERS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.admin_users.iter().any(|a| a == user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_is_exact_match() {
        let cfg = Config {
            db_path: "test.db".to_string(),
            api_port: 3000,
            log_level: "info".to_string(),
            admin_users: vec!["ayla".to_string(), "rook".to_string()],
        };
        assert!(cfg.is_admin("ayla"));
        assert!(!cfg.is_admin("Ayla"));
        assert!(!cfg.is_admin("someone"));
    }
}
