//! Application configuration management.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger approval configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Bank reconciliation and matching configuration.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// How many distinct approvals an entry needs before it posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Two distinct authorized approvers, neither the creator.
    #[default]
    Dual,
    /// One authorized non-creator approver (small-entity mode).
    Single,
}

/// Ledger configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    /// Approval mode used to build the authorization policy.
    #[serde(default)]
    pub approval_mode: ApprovalMode,
}

/// Bank reconciliation and auto-matching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Days either side of a bank transaction searched for candidate entries.
    #[serde(default = "default_date_window_days")]
    pub date_window_days: i64,
    /// Maximum amount difference for a candidate entry.
    #[serde(default = "default_cent")]
    pub amount_tolerance: Decimal,
    /// Minimum description similarity for picking among several candidates.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: Decimal,
    /// Lead of the best candidate's similarity over the runner-up that must be exceeded.
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: Decimal,
    /// Confidence below which a match is only suggested.
    #[serde(default = "default_auto_match_floor")]
    pub auto_match_floor: Decimal,
    /// Confidence assigned when exactly one candidate exists.
    #[serde(default = "default_single_candidate_confidence")]
    pub single_candidate_confidence: Decimal,
    /// Maximum GL vs adjusted bank difference for a reconciled report.
    #[serde(default = "default_cent")]
    pub reconciled_tolerance: Decimal,
}

fn default_date_window_days() -> i64 {
    3
}

fn default_cent() -> Decimal {
    Decimal::new(1, 2)
}

fn default_similarity_threshold() -> Decimal {
    Decimal::new(5, 1)
}

fn default_ambiguity_margin() -> Decimal {
    Decimal::new(1, 1)
}

fn default_auto_match_floor() -> Decimal {
    Decimal::new(85, 2)
}

fn default_single_candidate_confidence() -> Decimal {
    Decimal::new(95, 2)
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            date_window_days: default_date_window_days(),
            amount_tolerance: default_cent(),
            similarity_threshold: default_similarity_threshold(),
            ambiguity_margin: default_ambiguity_margin(),
            auto_match_floor: default_auto_match_floor(),
            single_candidate_confidence: default_single_candidate_confidence(),
            reconciled_tolerance: default_cent(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
