//! Protocol configuration.
//!
//! A [`ProtocolConfig`] is built once (usually from a TOML file) and passed
//! by reference into every component that needs package ids, targets or
//! settlement parameters. Core logic never reads configuration from the
//! environment.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Address, ObjectId, Result, TurnstileError, constants};

/// Call targets for escrow and transfer-policy primitives, relative to the
/// framework package (`module::function`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTargets {
    pub create_escrow: String,
    pub place: String,
    pub purchase: String,
    pub confirm: String,
}

impl Default for EscrowTargets {
    fn default() -> Self {
        Self {
            create_escrow: constants::FRAMEWORK_CREATE_ESCROW.to_string(),
            place: constants::FRAMEWORK_PLACE.to_string(),
            purchase: constants::FRAMEWORK_PURCHASE.to_string(),
            confirm: constants::FRAMEWORK_CONFIRM.to_string(),
        }
    }
}

/// Struct names identifying semantic object types in execution reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTagPatterns {
    pub event: String,
    pub class: String,
    pub ticket: String,
    pub escrow: String,
    pub escrow_cap: String,
}

impl Default for TypeTagPatterns {
    fn default() -> Self {
        Self {
            event: constants::STRUCT_EVENT.to_string(),
            class: constants::STRUCT_CLASS.to_string(),
            ticket: constants::STRUCT_TICKET.to_string(),
            escrow: constants::STRUCT_ESCROW.to_string(),
            escrow_cap: constants::STRUCT_ESCROW_CAP.to_string(),
        }
    }
}

/// Royalty split enforced by the transfer policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltyConfig {
    pub recipient: Address,
    /// Share of the sale price, in basis points (1/100 of a percent).
    pub basis_points: u16,
}

impl RoyaltyConfig {
    /// Royalty owed on `price`, rounded down.
    #[must_use]
    pub fn royalty_for(&self, price: u64) -> u64 {
        let owed = u128::from(price) * u128::from(self.basis_points)
            / u128::from(constants::BASIS_POINTS_DENOMINATOR);
        // basis_points <= 10_000 after validation, so owed <= price.
        u64::try_from(owed).unwrap_or(price)
    }
}

/// Bounded polling policy for external waits (e.g. funding to arrive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub interval_ms: u64,
    pub max_attempts: u32,
    /// Multiplier applied per attempt. `1` gives a fixed interval.
    pub backoff_multiplier: u32,
    pub max_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            max_attempts: constants::DEFAULT_POLL_MAX_ATTEMPTS,
            backoff_multiplier: 1,
            max_interval_ms: constants::DEFAULT_POLL_MAX_INTERVAL_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-indexed) failed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = u64::from(self.backoff_multiplier.max(1))
            .saturating_pow(attempt.saturating_sub(1));
        let delay = self.interval_ms.saturating_mul(factor).min(self.max_interval_ms);
        Duration::from_millis(delay)
    }
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

/// Everything the composer, coordinator, planner and reconciler need to know
/// about the deployed ticketing package and the ledger it runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Package hosting the ticketing module.
    pub package_id: ObjectId,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default = "default_framework_package")]
    pub framework_package: String,
    #[serde(default = "default_coin_type")]
    pub coin_type: String,
    #[serde(default)]
    pub targets: EscrowTargets,
    #[serde(default)]
    pub type_tags: TypeTagPatterns,
    #[serde(default = "default_gas_budget")]
    pub gas_budget: u64,
    #[serde(default = "default_fee_allowance")]
    pub fee_allowance: u64,
    #[serde(default)]
    pub royalty: Option<RoyaltyConfig>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_module() -> String {
    constants::DEFAULT_MODULE.to_string()
}

fn default_framework_package() -> String {
    constants::DEFAULT_FRAMEWORK_PACKAGE.to_string()
}

fn default_coin_type() -> String {
    constants::DEFAULT_COIN_TYPE.to_string()
}

fn default_gas_budget() -> u64 {
    constants::DEFAULT_GAS_BUDGET
}

fn default_fee_allowance() -> u64 {
    constants::DEFAULT_FEE_ALLOWANCE
}

impl ProtocolConfig {
    /// Config for `package_id` with every other field at its default.
    #[must_use]
    pub fn new(package_id: ObjectId) -> Self {
        Self {
            package_id,
            module: default_module(),
            framework_package: default_framework_package(),
            coin_type: default_coin_type(),
            targets: EscrowTargets::default(),
            type_tags: TypeTagPatterns::default(),
            gas_budget: default_gas_budget(),
            fee_allowance: default_fee_allowance(),
            royalty: None,
            retry: RetryPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[must_use]
    pub fn with_royalty(mut self, recipient: Address, basis_points: u16) -> Self {
        self.royalty = Some(RoyaltyConfig {
            recipient,
            basis_points,
        });
        self
    }

    /// Load and validate configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TurnstileError::Serialization(e.to_string()))
    }

    /// # Errors
    /// Returns [`TurnstileError::Configuration`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(TurnstileError::Configuration(msg.to_string()));
        if self.package_id.is_empty() {
            return bad("package_id must not be empty");
        }
        if self.module.trim().is_empty() || self.framework_package.trim().is_empty() {
            return bad("module and framework_package must not be empty");
        }
        if self.coin_type.trim().is_empty() {
            return bad("coin_type must not be empty");
        }
        if self.gas_budget == 0 {
            return bad("gas_budget must be > 0");
        }
        if let Some(royalty) = &self.royalty {
            if u64::from(royalty.basis_points) > constants::BASIS_POINTS_DENOMINATOR {
                return bad("royalty.basis_points must be <= 10000");
            }
            if royalty.recipient.is_empty() {
                return bad("royalty.recipient must not be empty");
            }
        }
        if self.retry.max_attempts == 0 {
            return bad("retry.max_attempts must be > 0");
        }
        Ok(())
    }

    /// Fully qualified target of a ticketing-module function.
    #[must_use]
    pub fn ticketing_target(&self, function: &str) -> String {
        format!("{}::{}::{function}", self.package_id, self.module)
    }

    /// Fully qualified target of a framework function (`module::function`).
    #[must_use]
    pub fn framework_target(&self, path: &str) -> String {
        format!("{}::{path}", self.framework_package)
    }

    /// Full type tag of the ticket struct, used as a type argument.
    #[must_use]
    pub fn ticket_type(&self) -> String {
        format!(
            "{}::{}::{}",
            self.package_id, self.module, self.type_tags.ticket
        )
    }
}
