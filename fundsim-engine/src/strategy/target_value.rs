//! Target value (value averaging).
//!
//! Trades every period: tops the position up to a growing value path, or
//! trims it back down when it runs ahead.

use super::{Signal, SignalGenerator, StrategyContext, StrategyId};
use crate::nav::NavSeries;
use crate::portfolio::PortfolioState;

/// Shortfalls/excesses smaller than this (currency units) are treated as on target.
const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetValue {
    /// Growth of the value target per period, in currency units
    pub target_growth_per_period: f64,
}

impl Default for TargetValue {
    fn default() -> Self {
        Self {
            target_growth_per_period: 50.0,
        }
    }
}

impl TargetValue {
    pub fn new(target_growth_per_period: f64) -> Self {
        Self {
            target_growth_per_period: target_growth_per_period.max(0.0),
        }
    }

    /// Value the holdings should have at `index`.
    pub fn target(&self, state: &PortfolioState, index: usize) -> f64 {
        state.cumulative_invested + self.target_growth_per_period * (index as f64 + 1.0)
    }
}

impl SignalGenerator for TargetValue {
    fn id(&self) -> StrategyId {
        StrategyId::TargetValue
    }

    fn min_lookback(&self) -> usize {
        0
    }

    fn evaluate(
        &self,
        history: &NavSeries,
        index: usize,
        state: &PortfolioState,
        _ctx: &StrategyContext,
        base_invest: f64,
    ) -> Signal {
        let nav = history.points()[index].nav;
        let target = self.target(state, index);
        let current_value = state.holding_value(nav);

        if current_value + TOLERANCE < target {
            let shortfall = target - current_value;
            if base_invest <= 0.0 {
                return Signal::hold("on_target", "基础定投金额为零，无法补足目标价值");
            }
            Signal::buy(
                shortfall / base_invest,
                "below_target",
                format!("当前市值 {:.2} 低于目标 {:.2}，补足 {:.2}", current_value, target, shortfall),
            )
        } else if current_value > target + TOLERANCE {
            let excess = current_value - target;
            Signal::sell(
                excess / current_value,
                "above_target",
                format!("当前市值 {:.2} 高于目标 {:.2}，卖出 {:.2}", current_value, target, excess),
            )
        } else {
            Signal::hold("on_target", format!("当前市值 {:.2} 符合目标", current_value))
        }
    }
}
