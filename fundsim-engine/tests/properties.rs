//! Property tests for simulator and metrics invariants.

use chrono::{Duration, NaiveDate};
use fundsim_engine::backtest::{MetricsEngine, PortfolioSimulator};
use fundsim_engine::nav::NavSeries;
use fundsim_engine::strategy::{StrategyId, StrategyParams};
use proptest::prelude::*;

fn history(navs: &[f64]) -> NavSeries {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let navs = navs
        .iter()
        .enumerate()
        .map(|(i, nav)| (start + Duration::days(i as i64), *nav))
        .collect();
    NavSeries::from_navs("PROP", navs).unwrap()
}

fn nav_paths() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.05f64..0.05, 0..120).prop_map(|moves| {
        let mut nav = 1.0;
        moves
            .into_iter()
            .map(|m| {
                nav = (nav * (1.0 + m)).max(0.05);
                nav
            })
            .collect()
    })
}

fn strategy_ids() -> impl Strategy<Value = StrategyId> {
    prop::sample::select(StrategyId::ALL.to_vec())
}

proptest! {
    #[test]
    fn balances_never_go_negative(navs in nav_paths(), id in strategy_ids()) {
        let history = history(&navs);
        let strategy = fundsim_engine::strategy::Strategy::from_id(id, &StrategyParams::default());
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &strategy);

        prop_assert_eq!(result.trades.len(), history.len());
        prop_assert_eq!(result.equity_curve.len(), history.len());
        for trade in &result.trades {
            prop_assert!(trade.balance_after >= 0.0);
            prop_assert!(trade.holdings_after >= 0.0);
        }
        prop_assert!(result.state.cash >= 0.0);
        prop_assert!(result.state.holding_shares >= 0.0);
    }

    #[test]
    fn equity_curve_tracks_trade_snapshots(navs in nav_paths(), id in strategy_ids()) {
        let history = history(&navs);
        let strategy = fundsim_engine::strategy::Strategy::from_id(id, &StrategyParams::default());
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &strategy);

        for (trade, point) in result.trades.iter().zip(&result.equity_curve) {
            prop_assert_eq!(trade.date, point.date);
            prop_assert!((trade.total_value_after() - point.total_value).abs() < 1e-9);
        }
        if let Some(last) = result.equity_curve.last() {
            prop_assert!((result.final_value() - last.total_value).abs() < 1e-9);
        }
    }

    #[test]
    fn metrics_are_finite_and_bounded(navs in nav_paths(), id in strategy_ids()) {
        let history = history(&navs);
        let strategy = fundsim_engine::strategy::Strategy::from_id(id, &StrategyParams::default());
        let result = PortfolioSimulator::new(1000.0, 100.0).run(&history, &strategy);
        let report = MetricsEngine::default().compute(&result.equity_curve, &result.trades, &history);

        for value in [
            report.total_return,
            report.annualized_return,
            report.volatility,
            report.sharpe_all,
            report.sharpe_1y,
            report.sharpe_ytd,
            report.sortino_ratio,
            report.calmar_ratio,
            report.var_95,
            report.composite_score,
        ] {
            prop_assert!(value.is_finite());
        }
        prop_assert!(report.max_drawdown <= 0.0);
        prop_assert!(report.max_drawdown >= -100.0);
        prop_assert!(report.volatility >= 0.0);
        prop_assert!((0.0..=1.0).contains(&report.win_rate));
    }
}
