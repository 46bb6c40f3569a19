//! Configuration management for fundsim services.
//!
//! All services share a unified configuration file at `~/.fundsim/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (FUNDSIM_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `FUNDSIM_LOG_LEVEL` → observability.log_level
//! - `FUNDSIM_LOG_FORMAT` → observability.log_format
//! - `FUNDSIM_PORT` → backtest.port
//! - `FUNDSIM_DATA_DIR` → backtest.data_dir

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".fundsim"),
            |dirs| dirs.home_dir().join(".fundsim"),
        )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Backtest service configuration
    #[serde(default)]
    pub backtest: Option<BacktestConfig>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("FUNDSIM_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("FUNDSIM_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(port) = std::env::var("FUNDSIM_PORT") {
            if let Ok(p) = port.parse() {
                self.backtest_mut().port = p;
            }
        }
        if let Ok(dir) = std::env::var("FUNDSIM_DATA_DIR") {
            self.backtest_mut().data_dir = Some(dir);
        }
    }

    /// Backtest section, materialising defaults when absent.
    pub fn backtest_mut(&mut self) -> &mut BacktestConfig {
        self.backtest.get_or_insert_with(BacktestConfig::default)
    }

    /// Backtest service port.
    pub fn backtest_port(&self) -> u16 {
        self.backtest
            .as_ref()
            .map_or_else(default_backtest_port, |b| b.port)
    }

    /// Backtest service host.
    pub fn backtest_host(&self) -> String {
        self.backtest
            .as_ref()
            .map_or_else(default_host, |b| b.host.clone())
    }

    /// Directory holding `<fund_code>.json` NAV files.
    pub fn nav_data_dir(&self) -> PathBuf {
        self.backtest
            .as_ref()
            .and_then(|b| b.data_dir.as_deref())
            .map_or_else(|| config_dir().join("navs"), PathBuf::from)
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to set to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Backtest Configuration
// ============================================================================

/// Backtest service configuration.
///
/// Strategy parameters are optional; the engine falls back to its own
/// defaults for anything left unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// HTTP port
    #[serde(default = "default_backtest_port")]
    pub port: u16,

    /// HTTP host
    #[serde(default = "default_host")]
    pub host: String,

    /// Directory with NAV history files (defaults to `~/.fundsim/navs`)
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Annual risk-free rate used by Sharpe/Sortino (0.03 = 3%)
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// Trading days per year used for annualization
    #[serde(default = "default_trading_days")]
    pub trading_days: u32,

    /// Wall-clock budget for one HTTP request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Dual moving average short window
    #[serde(default)]
    pub dual_ma_short: Option<usize>,

    /// Dual moving average long window
    #[serde(default)]
    pub dual_ma_long: Option<usize>,

    /// Mean reversion moving-average window
    #[serde(default)]
    pub mean_reversion_window: Option<usize>,

    /// Mean reversion deviation threshold (fraction, 0.05 = 5%)
    #[serde(default)]
    pub mean_reversion_threshold: Option<f64>,

    /// Target value growth per period (currency units)
    #[serde(default)]
    pub target_growth_per_period: Option<f64>,

    /// Grid size (fraction of the reference price)
    #[serde(default)]
    pub grid_size: Option<f64>,

    /// Stop-loss threshold for the rule-based strategy (percent)
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,

    /// Loss warning threshold for the rule-based strategy (percent)
    #[serde(default)]
    pub loss_warning_pct: Option<f64>,

    /// Normalisation scales for the composite score
    #[serde(default)]
    pub score_scale: Option<ScoreScaleConfig>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            port: default_backtest_port(),
            host: default_host(),
            data_dir: None,
            risk_free_rate: default_risk_free_rate(),
            trading_days: default_trading_days(),
            request_timeout_secs: default_request_timeout_secs(),
            dual_ma_short: None,
            dual_ma_long: None,
            mean_reversion_window: None,
            mean_reversion_threshold: None,
            target_growth_per_period: None,
            grid_size: None,
            stop_loss_pct: None,
            loss_warning_pct: None,
            score_scale: None,
        }
    }
}

/// Composite score normalisation scales.
///
/// Each metric is divided by its scale before the weighted blend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreScaleConfig {
    #[serde(default)]
    pub annualized_return: Option<f64>,
    #[serde(default)]
    pub sharpe: Option<f64>,
    #[serde(default)]
    pub max_drawdown: Option<f64>,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub win_rate: Option<f64>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_backtest_port() -> u16 {
    4436
}
fn default_risk_free_rate() -> f64 {
    0.03
}
fn default_trading_days() -> u32 {
    252
}
fn default_request_timeout_secs() -> u64 {
    30
}
