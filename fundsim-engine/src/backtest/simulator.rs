//! Portfolio simulator.
//!
//! A strictly sequential fold over one NAV series: every period the state is
//! marked to market, the strategy is asked for a signal, the signal is
//! applied, and one [`Trade`] plus one [`EquityPoint`] are recorded.
//!
//! ```text
//! ACTIVE ──normal signal──▶ ACTIVE
//! ACTIVE ──stop-loss exit─▶ LIQUIDATED ──▶ LIQUIDATED (forced hold)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::nav::NavSeries;
use crate::portfolio::PortfolioState;
use crate::strategy::{Action, Signal, SignalGenerator, StrategyContext};

/// One decision applied to the portfolio. Hold periods are recorded too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub action: Action,
    /// Capital deployed (buy) or proceeds received (sell); 0 for hold
    pub amount: f64,
    /// NAV the decision was executed at
    pub price: f64,
    /// Cash right after this trade
    pub balance_after: f64,
    /// Shares held right after this trade
    pub holdings_after: f64,
    /// Realized profit for sells, unrealized profit of the position otherwise
    pub profit_since_entry: f64,
    pub signal_label: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Trade {
    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }

    /// Value of the portfolio right after this trade.
    pub fn total_value_after(&self) -> f64 {
        self.balance_after + self.holdings_after * self.price
    }
}

/// Portfolio value at the close of one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// `cash + holding_shares * nav`
    pub total_value: f64,
    /// External capital deployed this period
    pub contribution: f64,
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Active,
    /// Stop-loss fired; every remaining period is a forced hold
    Liquidated,
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Final portfolio snapshot
    pub state: PortfolioState,
    pub run_state: RunState,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Number of NAV points simulated; 0 means "no data", not "no loss"
    pub data_points: usize,
    /// Initial amount plus all contributions
    pub total_invested: f64,
    pub initial_amount: f64,
}

impl SimulationResult {
    fn empty() -> Self {
        Self {
            state: PortfolioState::new(0.0),
            run_state: RunState::Active,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            data_points: 0,
            total_invested: 0.0,
            initial_amount: 0.0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data_points > 0
    }

    /// Trades that actually moved money.
    pub fn executed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_hold())
    }

    pub fn final_value(&self) -> f64 {
        self.equity_curve.last().map_or(0.0, |p| p.total_value)
    }
}

/// Outcome of applying one signal.
struct Applied {
    action: Action,
    amount: f64,
    profit: f64,
    contribution: f64,
}

/// Runs a strategy over a NAV history.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioSimulator {
    pub initial_amount: f64,
    pub base_invest: f64,
}

impl PortfolioSimulator {
    pub fn new(initial_amount: f64, base_invest: f64) -> Self {
        Self {
            initial_amount: initial_amount.max(0.0),
            base_invest: base_invest.max(0.0),
        }
    }

    /// Simulate `generator` over `history`.
    ///
    /// An empty history yields an all-zero result with `data_points == 0`.
    pub fn run<G>(&self, history: &NavSeries, generator: &G) -> SimulationResult
    where
        G: SignalGenerator + ?Sized,
    {
        if history.is_empty() {
            debug!(fund = %history.fund_code, "Empty NAV history, nothing to simulate");
            return SimulationResult::empty();
        }

        let mut state = PortfolioState::new(self.initial_amount);
        let mut ctx = StrategyContext::new();
        let mut run_state = RunState::Active;
        let mut trades = Vec::with_capacity(history.len());
        let mut equity_curve = Vec::with_capacity(history.len());
        let mut warned = false;

        debug!(
            fund = %history.fund_code,
            strategy = %generator.id(),
            points = history.len(),
            "Starting simulation"
        );

        for (index, point) in history.points().iter().enumerate() {
            let nav = point.nav;
            state.mark_to_market(nav);

            let signal = match run_state {
                RunState::Active => {
                    generator.generate(history, index, &state, &ctx, self.base_invest)
                }
                RunState::Liquidated => Signal::hold("liquidated", "已止损清仓，不再建仓"),
            };

            match (&signal.warning, warned) {
                (Some(w), false) => {
                    warn!(fund = %history.fund_code, date = %point.date, "{}", w);
                    warned = true;
                }
                (None, true) => warned = false,
                _ => {}
            }

            let loss_pct = state.consecutive_loss_pct;
            let applied = self.apply(&mut state, &signal, nav);
            if applied.action != Action::Hold {
                ctx.record_trade(nav);
            }
            if signal.liquidate && applied.action == Action::Sell && !state.has_position() {
                warn!(
                    fund = %history.fund_code,
                    date = %point.date,
                    loss_pct,
                    "Stop-loss triggered, position liquidated"
                );
                run_state = RunState::Liquidated;
            }
            state.refresh_peak_equity(nav);

            trades.push(Trade {
                date: point.date,
                action: applied.action,
                amount: applied.amount,
                price: nav,
                balance_after: state.cash,
                holdings_after: state.holding_shares,
                profit_since_entry: applied.profit,
                signal_label: signal.label,
                reason: signal.reason,
                warning: signal.warning,
            });
            equity_curve.push(EquityPoint {
                date: point.date,
                total_value: state.total_value(nav),
                contribution: applied.contribution,
            });
        }

        let total_invested = self.initial_amount + state.cumulative_invested;
        debug!(
            fund = %history.fund_code,
            strategy = %generator.id(),
            executed = trades.iter().filter(|t| !t.is_hold()).count(),
            ?run_state,
            "Simulation finished"
        );

        SimulationResult {
            state,
            run_state,
            trades,
            equity_curve,
            data_points: history.len(),
            total_invested,
            initial_amount: self.initial_amount,
        }
    }

    /// Apply one signal at `nav`. Zero-sized buys and sells degrade to hold.
    fn apply(&self, state: &mut PortfolioState, signal: &Signal, nav: f64) -> Applied {
        match signal.action {
            Action::Buy => {
                let amount = self.base_invest * signal.multiplier;
                if state.buy(amount, nav) > 0.0 {
                    return Applied {
                        action: Action::Buy,
                        amount,
                        profit: state.unrealized_profit(nav),
                        contribution: amount,
                    };
                }
            }
            Action::Sell => {
                let fill = state.sell(signal.sell_fraction, nav);
                if fill.shares > 0.0 {
                    return Applied {
                        action: Action::Sell,
                        amount: fill.proceeds,
                        profit: fill.realized_profit,
                        contribution: 0.0,
                    };
                }
            }
            Action::Hold => {}
        }

        Applied {
            action: Action::Hold,
            amount: 0.0,
            profit: state.unrealized_profit(nav),
            contribution: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::series;
    use crate::strategy::{EnhancedRuleBased, GridTrading, Strategy, StrategyId, StrategyParams};

    #[test]
    fn test_empty_history_is_all_zero() {
        let strategy = Strategy::from_id(StrategyId::Grid, &StrategyParams::default());
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&NavSeries::empty("X"), &strategy);

        assert_eq!(result.data_points, 0);
        assert!(result.trades.is_empty());
        assert_eq!(result.final_value(), 0.0);
        assert_eq!(result.total_invested, 0.0);
    }

    #[test]
    fn test_flat_grid_only_holds() {
        let history = series(&[1.0, 1.0, 1.0, 1.0]);
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &GridTrading::default());

        assert_eq!(result.trades.len(), 4);
        assert!(result.trades.iter().all(Trade::is_hold));
        assert!(result.equity_curve.iter().all(|p| p.total_value == 1000.0));
    }

    #[test]
    fn test_buy_is_funded_externally() {
        let history = series(&[1.0, 0.9]);
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &GridTrading::new(0.05));

        let buy = &result.trades[1];
        assert_eq!(buy.action, Action::Buy);
        assert_eq!(buy.amount, 100.0);
        assert_eq!(buy.balance_after, 1000.0);
        assert!((buy.holdings_after - 100.0 / 0.9).abs() < 1e-9);
        assert_eq!(result.equity_curve[1].contribution, 100.0);
        assert!((result.total_invested - 1100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_without_holdings_recorded_as_hold() {
        // Above the grid from the start, nothing to sell
        let history = series(&[1.0, 1.1]);
        let strategy = Strategy::from_id(StrategyId::Grid, &StrategyParams::default());
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &strategy);
        assert!(result.trades.iter().all(Trade::is_hold));
    }

    #[test]
    fn test_stop_loss_liquidates_and_stays_flat() {
        // Buys on the first declines, then keeps falling past 12% from the peak
        let navs = [1.0, 0.99, 0.97, 0.95, 0.93, 0.90, 0.88, 0.86, 0.84, 0.9, 0.95];
        let history = series(&navs);
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &EnhancedRuleBased::default());

        assert_eq!(result.run_state, RunState::Liquidated);
        let exit = result
            .trades
            .iter()
            .position(|t| t.signal_label == "stop_loss")
            .expect("stop-loss expected");
        // 0.84 is 13.4% below the 0.97 entry peak
        assert_eq!(exit, 8);
        assert_eq!(result.trades[exit].action, Action::Sell);
        assert_eq!(result.trades[exit].holdings_after, 0.0);
        assert!(result.trades[exit + 1..].iter().all(Trade::is_hold));
        assert_eq!(result.state.holding_shares, 0.0);
    }

    #[test]
    fn test_trade_snapshots_match_equity_curve() {
        let navs: Vec<f64> = (0..40).map(|i| 1.0 + ((i as f64) * 0.7).sin() * 0.1).collect();
        let history = series(&navs);
        for id in StrategyId::ALL {
            let strategy = Strategy::from_id(id, &StrategyParams::default());
            let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &strategy);
            assert_eq!(result.trades.len(), history.len());
            for (trade, point) in result.trades.iter().zip(&result.equity_curve) {
                assert_eq!(trade.total_value_after(), point.total_value);
                assert!(trade.balance_after >= 0.0);
                assert!(trade.holdings_after >= 0.0);
            }
        }
    }
}
