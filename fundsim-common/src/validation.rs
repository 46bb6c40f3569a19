//! Configuration validation.
//!
//! Checks that configured values are present and within valid ranges
//! before any service starts.

use thiserror::Error;

use crate::config::{BacktestConfig, Config, ObservabilityConfig, ScoreScaleConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "pretty"];

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Some(backtest) = &self.backtest {
            if let Err(e) = backtest.validate() {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load, apply environment overrides and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of {:?}", LOG_LEVELS),
            });
        }

        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of {:?}", LOG_FORMATS),
            });
        }

        Ok(())
    }
}

impl Validate for BacktestConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, reason: &str| {
            errors.push(ValidationError::InvalidValue {
                field: format!("backtest.{field}"),
                reason: reason.into(),
            });
        };

        if self.port == 0 {
            invalid("port", "must be between 1 and 65535");
        }
        if self.host.trim().is_empty() {
            invalid("host", "must not be empty");
        }
        if self.trading_days == 0 {
            invalid("trading_days", "must be greater than 0");
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            invalid("risk_free_rate", "must be in [0, 1)");
        }
        if self.request_timeout_secs == 0 {
            invalid("request_timeout_secs", "must be greater than 0");
        }

        if matches!(self.dual_ma_short, Some(0)) {
            invalid("dual_ma_short", "must be greater than 0");
        }
        // Unset windows fall back to the engine defaults of 5 and 20.
        let short = self.dual_ma_short.unwrap_or(5);
        let long = self.dual_ma_long.unwrap_or(20);
        if short >= long {
            invalid("dual_ma_short", "must be smaller than dual_ma_long");
        }
        if matches!(self.mean_reversion_window, Some(0)) {
            invalid("mean_reversion_window", "must be greater than 0");
        }
        if let Some(threshold) = self.mean_reversion_threshold {
            if threshold <= 0.0 {
                invalid("mean_reversion_threshold", "must be positive");
            }
        }
        if let Some(growth) = self.target_growth_per_period {
            if growth < 0.0 {
                invalid("target_growth_per_period", "must not be negative");
            }
        }
        if let Some(grid) = self.grid_size {
            if grid <= 0.0 || grid >= 1.0 {
                invalid("grid_size", "must be in (0, 1)");
            }
        }

        let stop_loss = self.stop_loss_pct.unwrap_or(12.0);
        let warning = self.loss_warning_pct.unwrap_or(8.0);
        if stop_loss <= 0.0 || stop_loss > 100.0 {
            invalid("stop_loss_pct", "must be in (0, 100]");
        }
        if warning <= 0.0 || warning >= stop_loss {
            invalid("loss_warning_pct", "must be positive and below stop_loss_pct");
        }

        if let Some(scale) = &self.score_scale {
            if let Err(e) = scale.validate() {
                errors.push(e);
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

impl Validate for ScoreScaleConfig {
    fn validate(&self) -> ValidationResult<()> {
        let scales = [
            ("annualized_return", self.annualized_return),
            ("sharpe", self.sharpe),
            ("max_drawdown", self.max_drawdown),
            ("volatility", self.volatility),
            ("win_rate", self.win_rate),
        ];

        for (name, value) in scales {
            if let Some(v) = value {
                if v <= 0.0 || !v.is_finite() {
                    return Err(ValidationError::InvalidValue {
                        field: format!("backtest.score_scale.{name}"),
                        reason: "must be a positive number".into(),
                    });
                }
            }
        }

        Ok(())
    }
}
