//! Processor Configuration
//!
//! `EngineConfig` holds the reward-program constants; `ServiceConfig` wraps it
//! with the process-level settings of the binary. Both are loaded once at
//! startup (TOML file, then environment overrides) and never mutated.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::clock::MILLIS_PER_MINUTE;
use crate::error::EngineError;
use crate::models::{Amount, NANO_PER_UNIT};

/// Basis-point denominator for fee math.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Reward-program constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deployed processor contract (balance watched for auto-buy)
    pub contract_address: String,
    /// Jetton master of the reward token (window-lottery entries, payouts)
    pub reward_token: String,
    /// Jetton master of the liquidity token (stakes)
    pub liquidity_token: String,
    /// DEX router that receives auto-buy purchases
    pub auto_buy_target: String,

    /// Base reward step; the instant-lottery table is expressed in multiples of it
    pub reward_unit: Amount,
    /// Native transfer that qualifies for the instant lottery
    pub instant_lottery_price: Amount,
    /// Reward-token transfer that buys one window-lottery entry
    pub lottery_entry_stake: Amount,
    /// Liquidity-token transfer recorded as a stake
    pub liquidity_stake_amount: Amount,
    /// Balance at or above which auto-buy fires
    pub auto_buy_threshold: Amount,
    /// Fixed purchase size
    pub auto_buy_amount: Amount,
    /// Share of each lottery pot retained as protocol fee (basis points)
    pub fee_retention_bps: u32,

    /// Length of one interval unit
    #[serde(with = "duration_serde")]
    pub interval_unit: Duration,
    /// Lottery window length, in interval units
    pub window_intervals: u32,
    /// Liquidity hold, in interval units
    pub liquidity_hold_intervals: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contract_address: "EQDdDkojazcx_uPxj6_M4TIad-TB3vvTxRwUz4s_4W9H0AmP".into(),
            reward_token: "EQArReyjdldNhNl-81YrIJ2_bhuZrJSjXNBn5bzt4O46Zc29".into(),
            liquidity_token: "EQAx8hzs2ZJHE4Cf1y7zFOqVFei92SpbCJQGZjoTYXAxHE0t".into(),
            auto_buy_target: "EQDa4VOnTYlLvDJ0gZjNYm5PXfSmmtL6Vs6A_CZEtXCNICq_".into(),
            reward_unit: NANO_PER_UNIT / 10,              // 0.1
            instant_lottery_price: NANO_PER_UNIT / 10,    // 0.1
            lottery_entry_stake: 10 * NANO_PER_UNIT,      // 10
            liquidity_stake_amount: NANO_PER_UNIT,        // 1
            auto_buy_threshold: 2 * NANO_PER_UNIT,        // 2
            auto_buy_amount: 3 * NANO_PER_UNIT / 2,       // 1.5
            fee_retention_bps: 1_000,                     // 10%
            interval_unit: Duration::from_millis(MILLIS_PER_MINUTE as u64),
            window_intervals: 24,
            liquidity_hold_intervals: 3,
        }
    }
}

impl EngineConfig {
    pub fn window_duration(&self) -> Duration {
        self.interval_unit * self.window_intervals
    }

    pub fn liquidity_hold(&self) -> Duration {
        self.interval_unit * self.liquidity_hold_intervals
    }

    pub fn window_millis(&self) -> i64 {
        self.window_duration().as_millis() as i64
    }

    pub fn liquidity_hold_millis(&self) -> i64 {
        self.liquidity_hold().as_millis() as i64
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let addresses = [
            ("contract_address", &self.contract_address),
            ("reward_token", &self.reward_token),
            ("liquidity_token", &self.liquidity_token),
            ("auto_buy_target", &self.auto_buy_target),
        ];
        for (field, value) in addresses {
            if value.trim().is_empty() {
                return Err(EngineError::InvalidConfig(format!("{} is empty", field)));
            }
        }
        if self.window_millis() <= 0 {
            return Err(EngineError::InvalidConfig(
                "lottery window must be positive".into(),
            ));
        }
        if self.liquidity_hold_millis() <= 0 {
            return Err(EngineError::InvalidConfig(
                "liquidity hold must be positive".into(),
            ));
        }
        if u64::from(self.fee_retention_bps) >= BPS_DENOMINATOR {
            return Err(EngineError::InvalidConfig(format!(
                "fee_retention_bps {} leaves nothing to distribute",
                self.fee_retention_bps
            )));
        }
        Ok(())
    }
}

/// Process-level settings for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen_addr: String,
    /// Indexer sidecar used for transaction / balance lookups
    pub chain_api_url: Option<String>,
    /// Transfer-execution service; commands are only logged when unset
    pub executor_url: Option<String>,
    #[serde(with = "duration_serde")]
    pub release_poll: Duration,
    /// Settling delay before reading the contract balance
    #[serde(with = "duration_serde")]
    pub balance_check_delay: Duration,
    #[serde(with = "duration_serde")]
    pub http_timeout: Duration,
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            chain_api_url: None,
            executor_url: None,
            release_poll: Duration::from_secs(10),
            balance_check_delay: Duration::from_secs(30),
            http_timeout: Duration::from_secs(10),
            engine: EngineConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.engine.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        dotenv::dotenv().ok();

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(url) = std::env::var("CHAIN_API_URL") {
            self.chain_api_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Ok(url) = std::env::var("EXECUTOR_URL") {
            self.executor_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(ms) = env_parse::<u64>("RELEASE_POLL_MS") {
            self.release_poll = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("BALANCE_CHECK_DELAY_MS") {
            self.balance_check_delay = Duration::from_millis(ms);
        }
        if let Ok(addr) = std::env::var("CONTRACT_ADDRESS") {
            self.engine.contract_address = addr;
        }
        if let Some(ms) = env_parse::<u64>("INTERVAL_UNIT_MS") {
            self.engine.interval_unit = Duration::from_millis(ms);
        }
        if let Some(amount) = env_parse::<Amount>("AUTO_BUY_THRESHOLD") {
            self.engine.auto_buy_threshold = amount;
        }
        if let Some(amount) = env_parse::<Amount>("AUTO_BUY_AMOUNT") {
            self.engine.auto_buy_amount = amount;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

// Durations are stored as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.window_duration(), Duration::from_secs(24 * 60));
        assert_eq!(cfg.liquidity_hold(), Duration::from_secs(3 * 60));
        assert_eq!(cfg.lottery_entry_stake, 10_000_000_000);
        assert_eq!(cfg.auto_buy_threshold, 2_000_000_000);
        assert_eq!(cfg.auto_buy_amount, 1_500_000_000);
        assert_eq!(cfg.fee_retention_bps, 1_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cfg = EngineConfig {
            window_intervals: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));

        let cfg = EngineConfig {
            fee_retention_bps: 10_000,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig {
            reward_token: " ".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
listen_addr = "127.0.0.1:4000"
release_poll = 2500

[engine]
interval_unit = 1000
window_intervals = 5
fee_retention_bps = 500
"#
        )
        .unwrap();

        let cfg = ServiceConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.release_poll, Duration::from_millis(2_500));
        assert_eq!(cfg.engine.window_duration(), Duration::from_secs(5));
        assert_eq!(cfg.engine.fee_retention_bps, 500);
        // untouched fields keep their defaults
        assert_eq!(cfg.engine.liquidity_hold_intervals, 3);
    }

    #[test]
    fn test_load_rejects_invalid_engine_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nliquidity_hold_intervals = 0").unwrap();
        assert!(ServiceConfig::load(Some(file.path())).is_err());
    }
}
