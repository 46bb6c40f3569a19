//! Grid trading around the last trade price.

use super::{Signal, SignalGenerator, StrategyContext, StrategyId};
use crate::nav::NavSeries;
use crate::portfolio::PortfolioState;

#[derive(Debug, Clone, PartialEq)]
pub struct GridTrading {
    /// Grid spacing as a fraction of the reference price (0.03 = 3%)
    pub grid_size: f64,
}

impl Default for GridTrading {
    fn default() -> Self {
        Self { grid_size: 0.03 }
    }
}

impl GridTrading {
    pub fn new(grid_size: f64) -> Self {
        Self {
            grid_size: grid_size.abs(),
        }
    }

    /// NAV of the last executed trade, or the first NAV before any trade.
    pub fn reference_price(history: &NavSeries, ctx: &StrategyContext) -> Option<f64> {
        ctx.last_trade_nav.or_else(|| history.first().map(|p| p.nav))
    }
}

impl SignalGenerator for GridTrading {
    fn id(&self) -> StrategyId {
        StrategyId::Grid
    }

    fn min_lookback(&self) -> usize {
        0
    }

    fn evaluate(
        &self,
        history: &NavSeries,
        index: usize,
        state: &PortfolioState,
        ctx: &StrategyContext,
        base_invest: f64,
    ) -> Signal {
        let nav = history.points()[index].nav;
        let Some(reference) = Self::reference_price(history, ctx) else {
            return Signal::hold("no_reference", "缺少参考价格");
        };
        let lower = reference * (1.0 - self.grid_size);
        let upper = reference * (1.0 + self.grid_size);

        if nav <= lower {
            Signal::buy(
                1.0,
                "grid_buy",
                format!("净值 {:.4} 跌破网格下沿 {:.4}（参考价 {:.4}）", nav, lower, reference),
            )
        } else if nav >= upper {
            let holding_value = state.holding_value(nav);
            if holding_value <= 0.0 {
                return Signal::hold("grid_no_position", "触及网格上沿但无持仓");
            }
            // One grid unit is the amount a single grid buy deploys.
            let fraction = (base_invest / holding_value).min(1.0);
            Signal::sell(
                fraction,
                "grid_sell",
                format!("净值 {:.4} 突破网格上沿 {:.4}（参考价 {:.4}）", nav, upper, reference),
            )
        } else {
            Signal::hold(
                "within_grid",
                format!("净值 {:.4} 位于网格 [{:.4}, {:.4}] 内", nav, lower, upper),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::series;
    use crate::strategy::Action;

    #[test]
    fn test_flat_series_holds() {
        let strategy = GridTrading::default();
        let history = series(&[1.0, 1.0, 1.0, 1.0]);
        let state = PortfolioState::new(1000.0);
        let ctx = StrategyContext::new();

        for i in 0..history.len() {
            assert!(strategy.generate(&history, i, &state, &ctx, 100.0).is_hold());
        }
    }

    #[test]
    fn test_buy_below_grid_from_first_nav() {
        let strategy = GridTrading::new(0.03);
        let history = series(&[1.0, 0.96]);
        let signal = strategy.generate(
            &history,
            1,
            &PortfolioState::new(0.0),
            &StrategyContext::new(),
            100.0,
        );
        assert_eq!((signal.action, signal.multiplier), (Action::Buy, 1.0));
    }

    #[test]
    fn test_sell_one_grid_unit_above_last_trade() {
        let strategy = GridTrading::new(0.03);
        let history = series(&[1.0, 0.9, 0.95]);
        let mut state = PortfolioState::new(0.0);
        state.buy(400.0, 0.9);
        let mut ctx = StrategyContext::new();
        ctx.record_trade(0.9);

        // 0.95 >= 0.9 * 1.03; holdings worth 444.44, one unit = 100
        let signal = strategy.generate(&history, 2, &state, &ctx, 100.0);
        assert_eq!(signal.action, Action::Sell);
        assert!((signal.sell_fraction - 100.0 / (400.0 / 0.9 * 0.95)).abs() < 1e-9);
    }

    #[test]
    fn test_above_grid_without_position_holds() {
        let strategy = GridTrading::new(0.03);
        let history = series(&[1.0, 1.1]);
        let signal = strategy.generate(
            &history,
            1,
            &PortfolioState::new(1000.0),
            &StrategyContext::new(),
            100.0,
        );
        assert!(signal.is_hold());
        assert_eq!(signal.label, "grid_no_position");
    }
}
