//! Dual moving average crossover.
//!
//! Trend-following on entries only: a death cross keeps accumulating at a
//! reduced rate instead of selling.

use super::{simple_moving_average, Signal, SignalGenerator, StrategyContext, StrategyId};
use crate::nav::NavSeries;
use crate::portfolio::PortfolioState;

/// Multiplier applied on a golden cross.
pub const GOLDEN_CROSS_MULTIPLIER: f64 = 1.5;
/// Multiplier applied on a death cross.
pub const DEATH_CROSS_MULTIPLIER: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct DualMovingAverage {
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for DualMovingAverage {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
        }
    }
}

impl DualMovingAverage {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short_window: short_window.max(1),
            long_window: long_window.max(1),
        }
    }

    /// Whether the short average is above the long one at `index`.
    ///
    /// `None` until both averages have a full window.
    fn short_above(&self, history: &NavSeries, index: usize) -> Option<(bool, f64, f64)> {
        let short = simple_moving_average(history, index, self.short_window)?;
        let long = simple_moving_average(history, index, self.long_window)?;
        Some((short > long, short, long))
    }
}

impl SignalGenerator for DualMovingAverage {
    fn id(&self) -> StrategyId {
        StrategyId::DualMa
    }

    fn min_lookback(&self) -> usize {
        self.short_window.max(self.long_window) - 1
    }

    fn evaluate(
        &self,
        history: &NavSeries,
        index: usize,
        _state: &PortfolioState,
        _ctx: &StrategyContext,
        _base_invest: f64,
    ) -> Signal {
        let Some((above, short, long)) = self.short_above(history, index) else {
            return Signal::insufficient_history(self.min_lookback(), index);
        };

        // Before the first full window the short average counts as "not above".
        let was_above = index
            .checked_sub(1)
            .and_then(|prev| self.short_above(history, prev))
            .map_or(false, |(above, _, _)| above);

        match (was_above, above) {
            (false, true) => Signal::buy(
                GOLDEN_CROSS_MULTIPLIER,
                "golden_cross",
                format!("金叉: MA{} {:.4} 上穿 MA{} {:.4}", self.short_window, short, self.long_window, long),
            ),
            (true, false) => Signal::buy(
                DEATH_CROSS_MULTIPLIER,
                "death_cross",
                format!("死叉: MA{} {:.4} 下穿 MA{} {:.4}，减量定投", self.short_window, short, self.long_window, long),
            ),
            _ => Signal::hold(
                "no_cross",
                format!("均线未交叉: MA{} {:.4} / MA{} {:.4}", self.short_window, short, self.long_window, long),
            ),
        }
    }
}
