//! Mean reversion around a simple moving average.

use super::{simple_moving_average, Signal, SignalGenerator, StrategyContext, StrategyId};
use crate::nav::NavSeries;
use crate::portfolio::PortfolioState;

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversion {
    /// Moving-average window (points)
    pub window: usize,
    /// Deviation threshold as a fraction (0.05 = 5%)
    pub threshold: f64,
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self {
            window: 20,
            threshold: 0.05,
        }
    }
}

impl MeanReversion {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window: window.max(1),
            threshold: threshold.abs(),
        }
    }
}

impl SignalGenerator for MeanReversion {
    fn id(&self) -> StrategyId {
        StrategyId::MeanReversion
    }

    fn min_lookback(&self) -> usize {
        self.window - 1
    }

    fn evaluate(
        &self,
        history: &NavSeries,
        index: usize,
        _state: &PortfolioState,
        _ctx: &StrategyContext,
        _base_invest: f64,
    ) -> Signal {
        let Some(ma) = simple_moving_average(history, index, self.window) else {
            return Signal::insufficient_history(self.min_lookback(), index);
        };
        let nav = history.points()[index].nav;
        let deviation = (nav - ma) / ma;
        let t = self.threshold;
        let pct = deviation * 100.0;

        if deviation <= -2.0 * t {
            Signal::buy(2.0, "deep_discount", format!("净值低于均线 {:.2}%，加倍买入", -pct))
        } else if deviation <= -t {
            Signal::buy(1.5, "discount", format!("净值低于均线 {:.2}%，加量买入", -pct))
        } else if deviation >= 2.0 * t {
            Signal::sell(0.5, "overextended", format!("净值高于均线 {:.2}%，卖出一半", pct))
        } else if deviation >= t {
            Signal::buy(0.5, "premium", format!("净值高于均线 {:.2}%，减量买入", pct))
        } else {
            Signal::hold("near_mean", format!("净值偏离均线 {:.2}%，维持不动", pct))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::series;
    use crate::strategy::Action;

    fn last_signal(navs: &[f64]) -> Signal {
        let strategy = MeanReversion::new(5, 0.05);
        let history = series(navs);
        strategy.generate(
            &history,
            history.len() - 1,
            &PortfolioState::new(1000.0),
            &StrategyContext::new(),
            100.0,
        )
    }

    #[test]
    fn test_bands() {
        // ma over the last five points; the last value sets the deviation
        let deep = last_signal(&[1.0, 1.0, 1.0, 1.0, 0.8]); // ma 0.96, dev -16.7%
        assert_eq!((deep.action, deep.multiplier), (Action::Buy, 2.0));

        let mild = last_signal(&[1.0, 1.0, 1.0, 1.0, 0.93]); // ma 0.986, dev -5.7%
        assert_eq!((mild.action, mild.multiplier), (Action::Buy, 1.5));

        let high = last_signal(&[1.0, 1.0, 1.0, 1.0, 1.6]); // ma 1.12, dev +42.9%
        assert_eq!((high.action, high.sell_fraction), (Action::Sell, 0.5));

        let premium = last_signal(&[1.0, 1.0, 1.0, 1.0, 1.08]); // ma 1.016, dev +6.3%
        assert_eq!((premium.action, premium.multiplier), (Action::Buy, 0.5));

        let flat = last_signal(&[1.0, 1.0, 1.0, 1.0, 1.01]);
        assert!(flat.is_hold());
    }

    #[test]
    fn test_short_history_holds() {
        let signal = last_signal(&[1.0, 0.5, 0.4]);
        assert!(signal.is_hold());
        assert_eq!(signal.label, "insufficient_history");
    }
}
