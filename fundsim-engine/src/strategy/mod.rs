//! Strategy signal generators.
//!
//! Every strategy is a pure mapping from `(history, index, portfolio state)`
//! to a [`Signal`]. The set of strategies is closed: [`Strategy`] is an enum
//! over the five generator types and dispatch is an exhaustive `match`, so
//! each [`StrategyId`] resolves to exactly one implementation.
//!
//! Anything a strategy must remember between periods (the grid reference
//! price) lives in a per-run [`StrategyContext`] owned by the simulator.

mod dual_ma;
mod grid;
mod mean_reversion;
mod rule_based;
mod signal;
mod target_value;

pub use dual_ma::DualMovingAverage;
pub use grid::GridTrading;
pub use mean_reversion::MeanReversion;
pub use rule_based::{EnhancedRuleBased, MarketRegime};
pub use signal::{Action, Signal};
pub use target_value::TargetValue;

use fundsim_common::config::Config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BacktestError;
use crate::nav::NavSeries;
use crate::portfolio::PortfolioState;

// ============================================================================
// Strategy Identity
// ============================================================================

/// Wire identifier of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    DualMa,
    MeanReversion,
    TargetValue,
    Grid,
    EnhancedRuleBased,
}

impl StrategyId {
    pub const ALL: [StrategyId; 5] = [
        Self::DualMa,
        Self::MeanReversion,
        Self::TargetValue,
        Self::Grid,
        Self::EnhancedRuleBased,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DualMa => "dual_ma",
            Self::MeanReversion => "mean_reversion",
            Self::TargetValue => "target_value",
            Self::Grid => "grid",
            Self::EnhancedRuleBased => "enhanced_rule_based",
        }
    }

    /// Display name used in reports.
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::DualMa => "双均线策略",
            Self::MeanReversion => "均值回归策略",
            Self::TargetValue => "目标价值策略",
            Self::Grid => "网格交易策略",
            Self::EnhancedRuleBased => "增强规则策略",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| BacktestError::UnknownStrategy(s.to_string()))
    }
}

// ============================================================================
// Generator Contract
// ============================================================================

/// Per-run strategy memory, passed explicitly into every `generate` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyContext {
    /// NAV of the most recent executed buy or sell
    pub last_trade_nav: Option<f64>,
}

impl StrategyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an executed (non-hold) trade.
    pub fn record_trade(&mut self, nav: f64) {
        self.last_trade_nav = Some(nav);
    }
}

/// A signal generator.
///
/// Implementors provide [`evaluate`](SignalGenerator::evaluate); callers use
/// [`generate`](SignalGenerator::generate), which guards against short
/// histories and out-of-range indices by returning `hold`.
pub trait SignalGenerator {
    /// Strategy identifier
    fn id(&self) -> StrategyId;

    /// Number of points that must precede `index` before a decision is made.
    fn min_lookback(&self) -> usize;

    /// Decide for `index`. Only called once `index >= min_lookback()`.
    fn evaluate(
        &self,
        history: &NavSeries,
        index: usize,
        state: &PortfolioState,
        ctx: &StrategyContext,
        base_invest: f64,
    ) -> Signal;

    /// Decide for `index`, never failing on short history.
    fn generate(
        &self,
        history: &NavSeries,
        index: usize,
        state: &PortfolioState,
        ctx: &StrategyContext,
        base_invest: f64,
    ) -> Signal {
        if index >= history.len() {
            return Signal::hold("out_of_range", "索引超出历史数据范围");
        }
        let needed = self.min_lookback();
        if index < needed {
            return Signal::insufficient_history(needed, index);
        }
        self.evaluate(history, index, state, ctx, base_invest)
    }
}

/// Simple moving average of the `window` NAVs ending at `end` (inclusive).
pub(crate) fn simple_moving_average(history: &NavSeries, end: usize, window: usize) -> Option<f64> {
    if window == 0 || end + 1 < window || end >= history.len() {
        return None;
    }
    let slice = &history.points()[end + 1 - window..=end];
    Some(slice.iter().map(|p| p.nav).sum::<f64>() / window as f64)
}

// ============================================================================
// Closed Strategy Set
// ============================================================================

/// Parameters for every strategy, usually built from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyParams {
    pub dual_ma: DualMovingAverage,
    pub mean_reversion: MeanReversion,
    pub target_value: TargetValue,
    pub grid: GridTrading,
    pub enhanced: EnhancedRuleBased,
}

impl StrategyParams {
    /// Create from config, falling back to defaults for unset values.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let Some(b) = config.backtest.as_ref() else {
            return defaults;
        };

        Self {
            dual_ma: DualMovingAverage::new(
                b.dual_ma_short.unwrap_or(defaults.dual_ma.short_window),
                b.dual_ma_long.unwrap_or(defaults.dual_ma.long_window),
            ),
            mean_reversion: MeanReversion::new(
                b.mean_reversion_window.unwrap_or(defaults.mean_reversion.window),
                b.mean_reversion_threshold.unwrap_or(defaults.mean_reversion.threshold),
            ),
            target_value: TargetValue::new(
                b.target_growth_per_period
                    .unwrap_or(defaults.target_value.target_growth_per_period),
            ),
            grid: GridTrading::new(b.grid_size.unwrap_or(defaults.grid.grid_size)),
            enhanced: EnhancedRuleBased {
                stop_loss_pct: b.stop_loss_pct.unwrap_or(defaults.enhanced.stop_loss_pct),
                warning_pct: b.loss_warning_pct.unwrap_or(defaults.enhanced.warning_pct),
            },
        }
    }
}

/// One of the supported strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    DualMovingAverage(DualMovingAverage),
    MeanReversion(MeanReversion),
    TargetValue(TargetValue),
    Grid(GridTrading),
    EnhancedRuleBased(EnhancedRuleBased),
}

impl Strategy {
    /// Resolve an id to its generator using the given parameters.
    pub fn from_id(id: StrategyId, params: &StrategyParams) -> Self {
        match id {
            StrategyId::DualMa => Self::DualMovingAverage(params.dual_ma.clone()),
            StrategyId::MeanReversion => Self::MeanReversion(params.mean_reversion.clone()),
            StrategyId::TargetValue => Self::TargetValue(params.target_value.clone()),
            StrategyId::Grid => Self::Grid(params.grid.clone()),
            StrategyId::EnhancedRuleBased => Self::EnhancedRuleBased(params.enhanced.clone()),
        }
    }

    fn inner(&self) -> &dyn SignalGenerator {
        match self {
            Self::DualMovingAverage(s) => s,
            Self::MeanReversion(s) => s,
            Self::TargetValue(s) => s,
            Self::Grid(s) => s,
            Self::EnhancedRuleBased(s) => s,
        }
    }
}

impl SignalGenerator for Strategy {
    fn id(&self) -> StrategyId {
        self.inner().id()
    }

    fn min_lookback(&self) -> usize {
        self.inner().min_lookback()
    }

    fn evaluate(
        &self,
        history: &NavSeries,
        index: usize,
        state: &PortfolioState,
        ctx: &StrategyContext,
        base_invest: f64,
    ) -> Signal {
        self.inner().evaluate(history, index, state, ctx, base_invest)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::series;
    use super::*;

    #[test]
    fn test_strategy_id_parse() {
        for id in StrategyId::ALL {
            assert_eq!(id.as_str().parse::<StrategyId>().unwrap(), id);
        }
        assert!(matches!(
            "momentum".parse::<StrategyId>(),
            Err(BacktestError::UnknownStrategy(s)) if s == "momentum"
        ));
    }

    #[test]
    fn test_every_id_resolves_to_its_own_generator() {
        let params = StrategyParams::default();
        for id in StrategyId::ALL {
            assert_eq!(Strategy::from_id(id, &params).id(), id);
        }
    }

    #[test]
    fn test_strategy_id_serde_matches_wire_ids() {
        let json = serde_json::to_string(&StrategyId::EnhancedRuleBased).unwrap();
        assert_eq!(json, r#""enhanced_rule_based""#);
        let id: StrategyId = serde_json::from_str(r#""dual_ma""#).unwrap();
        assert_eq!(id, StrategyId::DualMa);
    }

    #[test]
    fn test_params_from_config() {
        let mut config = Config::default();
        assert_eq!(StrategyParams::from_config(&config), StrategyParams::default());

        let b = config.backtest_mut();
        b.grid_size = Some(0.05);
        b.stop_loss_pct = Some(15.0);
        let params = StrategyParams::from_config(&config);
        assert_eq!(params.grid.grid_size, 0.05);
        assert_eq!(params.enhanced.stop_loss_pct, 15.0);
        assert_eq!(params.enhanced.warning_pct, 8.0);
    }

    #[test]
    fn test_generate_guards_short_history_and_range() {
        let strategy = Strategy::from_id(StrategyId::DualMa, &StrategyParams::default());
        let history = series(&[1.0; 10]);
        let state = PortfolioState::new(1000.0);
        let ctx = StrategyContext::new();

        let signal = strategy.generate(&history, 3, &state, &ctx, 100.0);
        assert!(signal.is_hold());
        assert_eq!(signal.label, "insufficient_history");

        let signal = strategy.generate(&history, 50, &state, &ctx, 100.0);
        assert!(signal.is_hold());
    }

    #[test]
    fn test_simple_moving_average() {
        let history = series(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(simple_moving_average(&history, 3, 2), Some(3.5));
        assert_eq!(simple_moving_average(&history, 3, 4), Some(2.5));
        assert_eq!(simple_moving_average(&history, 1, 3), None);
        assert_eq!(simple_moving_average(&history, 3, 0), None);
    }
}
