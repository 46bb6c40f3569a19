//! Performance metrics over an equity curve and trade log.
//!
//! Period returns are flow-adjusted so that capital deployed by buys does not
//! show up as performance:
//!
//! ```text
//! r_i = (V_i - F_i) / V_{i-1} - 1
//! ```
//!
//! where `V` is the portfolio value and `F` the contribution of period `i`.
//! Risk figures (volatility, drawdown, Sharpe family, VaR) run on these
//! time-weighted returns. Short windows and degenerate math never fail: the
//! affected metric falls back to a wider window or to 0 and a note is added
//! to [`MetricsReport::warnings`].
//!
//! Units: returns, drawdown, volatility and VaR are percentages; ratios and
//! `win_rate` are plain fractions.

use chrono::{Datelike, Duration, NaiveDate};
use fundsim_common::config::Config;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::simulator::{EquityPoint, Trade};
use crate::nav::NavSeries;
use crate::strategy::Action;

/// Minimum points for a full-history Sharpe without a short-window note.
pub const MIN_POINTS_ALL: usize = 30;
/// Minimum points inside the trailing-year window.
pub const MIN_POINTS_1Y: usize = 30;
/// Minimum points since January 1st.
pub const MIN_POINTS_YTD: usize = 10;
/// Calendar days in the trailing-year window.
pub const ONE_YEAR_DAYS: i64 = 365;

/// Volatilities below this are treated as zero.
const ZERO_VOL: f64 = 1e-12;

// Composite weights
const W_RETURN: f64 = 0.30;
const W_SHARPE: f64 = 0.25;
const W_DRAWDOWN: f64 = 0.20;
const W_VOLATILITY: f64 = 0.15;
const W_WIN_RATE: f64 = 0.10;

/// Normalisation scales for the composite score terms.
///
/// Each term is divided by its scale before weighting, so a scale is the
/// value that counts as "one unit" for that metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreScale {
    /// Percent
    pub annualized_return: f64,
    pub sharpe: f64,
    /// Percent
    pub max_drawdown: f64,
    /// Percent
    pub volatility: f64,
    /// Fraction
    pub win_rate: f64,
}

impl Default for ScoreScale {
    fn default() -> Self {
        Self {
            annualized_return: 10.0,
            sharpe: 1.0,
            max_drawdown: 10.0,
            volatility: 10.0,
            win_rate: 1.0,
        }
    }
}

impl ScoreScale {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let Some(s) = config.backtest.as_ref().and_then(|b| b.score_scale.as_ref()) else {
            return defaults;
        };

        Self {
            annualized_return: s.annualized_return.unwrap_or(defaults.annualized_return),
            sharpe: s.sharpe.unwrap_or(defaults.sharpe),
            max_drawdown: s.max_drawdown.unwrap_or(defaults.max_drawdown),
            volatility: s.volatility.unwrap_or(defaults.volatility),
            win_rate: s.win_rate.unwrap_or(defaults.win_rate),
        }
    }
}

/// Risk/return statistics of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Percent, against initial amount plus contributions
    pub total_return: f64,
    /// Percent
    pub annualized_return: f64,
    /// Percent, zero or negative
    pub max_drawdown: f64,
    /// Annualized, percent
    pub volatility: f64,
    pub sharpe_ytd: f64,
    pub sharpe_1y: f64,
    pub sharpe_all: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// 5th percentile of period returns, percent
    pub var_95: f64,
    /// Fraction of sells with positive profit
    pub win_rate: f64,
    pub profit_loss_ratio: f64,
    pub composite_score: f64,
    pub data_points: usize,
    pub final_value: f64,
    pub total_invested: f64,
    /// Fund buy-and-hold return over the same series, percent
    pub benchmark_return: f64,
    /// `total_return - benchmark_return`
    pub excess_return: f64,
    /// Metrics that fell back or were computed on short windows
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl MetricsReport {
    /// Report for a run without any data.
    pub fn empty() -> Self {
        Self {
            total_return: 0.0,
            annualized_return: 0.0,
            max_drawdown: 0.0,
            volatility: 0.0,
            sharpe_ytd: 0.0,
            sharpe_1y: 0.0,
            sharpe_all: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            var_95: 0.0,
            win_rate: 0.0,
            profit_loss_ratio: 0.0,
            composite_score: 0.0,
            data_points: 0,
            final_value: 0.0,
            total_invested: 0.0,
            benchmark_return: 0.0,
            excess_return: 0.0,
            warnings: vec!["无可用净值数据，所有指标记为 0".to_string()],
        }
    }
}

/// Flow-adjusted return attributed to the period ending on `date`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PeriodReturn {
    date: NaiveDate,
    value: f64,
}

/// Computes [`MetricsReport`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsEngine {
    /// Annual, fraction (0.03 = 3%)
    pub risk_free_rate: f64,
    pub trading_days: u32,
    pub scale: ScoreScale,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.03,
            trading_days: 252,
            scale: ScoreScale::default(),
        }
    }
}

impl MetricsEngine {
    pub fn new(risk_free_rate: f64, trading_days: u32) -> Self {
        Self {
            risk_free_rate,
            trading_days: trading_days.max(1),
            scale: ScoreScale::default(),
        }
    }

    pub fn with_scale(mut self, scale: ScoreScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let (risk_free_rate, trading_days) = config
            .backtest
            .as_ref()
            .map_or((defaults.risk_free_rate, defaults.trading_days), |b| {
                (b.risk_free_rate, b.trading_days)
            });
        Self::new(risk_free_rate, trading_days).with_scale(ScoreScale::from_config(config))
    }

    fn periods_per_year(&self) -> f64 {
        f64::from(self.trading_days.max(1))
    }

    /// Compute every metric for one run.
    pub fn compute(&self, curve: &[EquityPoint], trades: &[Trade], nav_series: &NavSeries) -> MetricsReport {
        let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
            return MetricsReport::empty();
        };
        let mut warnings = Vec::new();

        // Money-weighted view on committed capital
        let initial_amount = first.total_value - first.contribution;
        let total_invested = initial_amount + curve.iter().map(|p| p.contribution).sum::<f64>();
        let final_value = last.total_value;
        let total_return = if total_invested > 0.0 {
            (final_value - total_invested) / total_invested
        } else {
            0.0
        };
        let observed_periods = curve.len() - 1;
        let annualized_return = annualize(1.0 + total_return, observed_periods, self.periods_per_year());

        // Time-weighted risk
        let returns = period_returns(curve);
        let values: Vec<f64> = returns.iter().map(|r| r.value).collect();
        if values.len() < 2 {
            warnings.push("收益观测少于 2 个，波动率与夏普类指标记为 0".to_string());
        }
        let volatility = self.annualized_volatility(&values);
        let max_drawdown = max_drawdown(&values);
        let var_95 = percentile(&values, 5.0);

        let sharpe_all = self.sharpe(&returns);
        if curve.len() < MIN_POINTS_ALL {
            warnings.push(format!(
                "全部数据仅 {} 个点（少于 {}），sharpe_all 基于短窗口计算",
                curve.len(),
                MIN_POINTS_ALL
            ));
        }

        let year_cutoff = last.date - Duration::days(ONE_YEAR_DAYS);
        let sharpe_1y = self.window_sharpe(
            curve,
            &returns,
            |d| d > year_cutoff,
            MIN_POINTS_1Y,
            "sharpe_1y",
            "近一年",
            &mut warnings,
        );
        let year_start = NaiveDate::from_ymd_opt(last.date.year(), 1, 1).unwrap_or(first.date);
        let sharpe_ytd = self.window_sharpe(
            curve,
            &returns,
            |d| d >= year_start,
            MIN_POINTS_YTD,
            "sharpe_ytd",
            "年初至今",
            &mut warnings,
        );

        let sortino_ratio = self.sortino(&values);
        let calmar_ratio = if max_drawdown.abs() > 0.0 {
            finite(annualized_return * 100.0 / max_drawdown.abs())
        } else {
            0.0
        };

        let (win_rate, profit_loss_ratio) = win_loss(trades);

        let benchmark_return = nav_series.buy_and_hold_return();
        let total_return_pct = total_return * 100.0;
        let annualized_return_pct = annualized_return * 100.0;

        let composite_score = self.composite(
            annualized_return_pct,
            sharpe_all,
            max_drawdown,
            volatility,
            win_rate,
        );

        MetricsReport {
            total_return: total_return_pct,
            annualized_return: annualized_return_pct,
            max_drawdown,
            volatility,
            sharpe_ytd,
            sharpe_1y,
            sharpe_all,
            sortino_ratio,
            calmar_ratio,
            var_95,
            win_rate,
            profit_loss_ratio,
            composite_score,
            data_points: curve.len(),
            final_value,
            total_invested,
            benchmark_return,
            excess_return: total_return_pct - benchmark_return,
            warnings,
        }
    }

    /// Sharpe over the points selected by `in_window`, falling back to the
    /// full history when the window holds fewer than `min_points` points.
    #[allow(clippy::too_many_arguments)]
    fn window_sharpe(
        &self,
        curve: &[EquityPoint],
        returns: &[PeriodReturn],
        in_window: impl Fn(NaiveDate) -> bool,
        min_points: usize,
        name: &str,
        label: &str,
        warnings: &mut Vec<String>,
    ) -> f64 {
        let points = curve.iter().filter(|p| in_window(p.date)).count();
        if points < min_points {
            warnings.push(format!(
                "{}数据 {} 个点（少于 {}），{} 回退为全区间计算",
                label, points, min_points, name
            ));
            return self.sharpe(returns);
        }

        let slice: Vec<PeriodReturn> = returns.iter().copied().filter(|r| in_window(r.date)).collect();
        self.sharpe(&slice)
    }

    /// `(annualized_return - risk_free_rate) / volatility` over one slice.
    fn sharpe(&self, returns: &[PeriodReturn]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let values: Vec<f64> = returns.iter().map(|r| r.value).collect();
        let vol = sample_std(&values) * self.periods_per_year().sqrt();
        if vol < ZERO_VOL {
            return 0.0;
        }
        let growth = values.iter().fold(1.0, |acc, r| acc * (1.0 + r));
        let annualized = annualize(growth, values.len(), self.periods_per_year());
        finite((annualized - self.risk_free_rate) / vol)
    }

    /// Sharpe with downside deviation in the denominator.
    fn sortino(&self, values: &[f64]) -> f64 {
        let downside: Vec<f64> = values.iter().copied().filter(|r| *r < 0.0).collect();
        if values.len() < 2 || downside.len() < 2 {
            return 0.0;
        }
        let downside_dev = sample_std(&downside) * self.periods_per_year().sqrt();
        if downside_dev < ZERO_VOL {
            return 0.0;
        }
        let growth = values.iter().fold(1.0, |acc, r| acc * (1.0 + r));
        let annualized = annualize(growth, values.len(), self.periods_per_year());
        finite((annualized - self.risk_free_rate) / downside_dev)
    }

    /// Annualized standard deviation in percent; 0 below two observations.
    fn annualized_volatility(&self, values: &[f64]) -> f64 {
        let vol = sample_std(values) * self.periods_per_year().sqrt();
        if vol < ZERO_VOL {
            0.0
        } else {
            vol * 100.0
        }
    }

    /// Weighted blend of the scaled terms. Drawdown and volatility count
    /// against the score by magnitude.
    pub fn composite(
        &self,
        annualized_return: f64,
        sharpe_all: f64,
        max_drawdown: f64,
        volatility: f64,
        win_rate: f64,
    ) -> f64 {
        let s = &self.scale;
        finite(
            W_RETURN * scaled(annualized_return, s.annualized_return)
                + W_SHARPE * scaled(sharpe_all, s.sharpe)
                + W_DRAWDOWN * scaled(-max_drawdown.abs(), s.max_drawdown)
                + W_VOLATILITY * scaled(-volatility.abs(), s.volatility)
                + W_WIN_RATE * scaled(win_rate, s.win_rate),
        )
    }
}

fn period_returns(curve: &[EquityPoint]) -> Vec<PeriodReturn> {
    curve
        .windows(2)
        .filter_map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            // No capital at risk yet
            (prev.total_value > 0.0).then(|| PeriodReturn {
                date: cur.date,
                value: (cur.total_value - cur.contribution) / prev.total_value - 1.0,
            })
        })
        .collect()
}

/// `growth^(periods_per_year / periods) - 1`, 0 without periods.
fn annualize(growth: f64, periods: usize, periods_per_year: f64) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    if growth <= 0.0 {
        return -1.0;
    }
    finite(growth.powf(periods_per_year / periods as f64) - 1.0)
}

/// Sample (n-1) standard deviation; 0 below two observations.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    finite(values.iter().std_dev())
}

/// Running-peak drawdown on the unit-value index, in percent (<= 0).
fn max_drawdown(returns: &[f64]) -> f64 {
    let mut unit = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        unit *= 1.0 + r;
        peak = peak.max(unit);
        if peak > 0.0 {
            worst = worst.min((unit - peak) / peak);
        }
    }
    worst * 100.0
}

/// Historical percentile with linear interpolation, in percent.
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = (idx.ceil() as usize).min(sorted.len() - 1);
    let frac = idx - lo as f64;
    (sorted[lo] * (1.0 - frac) + sorted[hi] * frac) * 100.0
}

/// `(win_rate, profit_loss_ratio)` over executed sells.
fn win_loss(trades: &[Trade]) -> (f64, f64) {
    let profits: Vec<f64> = trades
        .iter()
        .filter(|t| t.action == Action::Sell)
        .map(|t| t.profit_since_entry)
        .collect();
    if profits.is_empty() {
        return (0.0, 0.0);
    }

    let wins: Vec<f64> = profits.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = profits.iter().copied().filter(|p| *p < 0.0).collect();
    let win_rate = wins.len() as f64 / profits.len() as f64;

    let ratio = if losses.is_empty() || wins.is_empty() {
        0.0
    } else {
        finite(wins.iter().mean() / losses.iter().mean().abs())
    };
    (win_rate, ratio)
}

fn scaled(value: f64, scale: f64) -> f64 {
    if scale > 0.0 {
        value / scale
    } else {
        value
    }
}

/// Replace NaN/inf with 0.
fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64)
    }

    /// Curve without contributions following the given period returns.
    fn curve_from_returns(start: f64, returns: &[f64]) -> Vec<EquityPoint> {
        let mut value = start;
        let mut curve = vec![EquityPoint {
            date: day(0),
            total_value: value,
            contribution: 0.0,
        }];
        for (i, r) in returns.iter().enumerate() {
            value *= 1.0 + r;
            curve.push(EquityPoint {
                date: day(i + 1),
                total_value: value,
                contribution: 0.0,
            });
        }
        curve
    }

    fn sell(profit: f64) -> Trade {
        Trade {
            date: day(0),
            action: Action::Sell,
            amount: 100.0,
            price: 1.0,
            balance_after: 100.0,
            holdings_after: 0.0,
            profit_since_entry: profit,
            signal_label: "test".into(),
            reason: String::new(),
            warning: None,
        }
    }

    #[test]
    fn test_alternating_series_closed_form_sharpe() {
        let returns: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 0.01 } else { -0.005 }).collect();
        let curve = curve_from_returns(1000.0, &returns);
        let engine = MetricsEngine::default();
        let report = engine.compute(&curve, &[], &NavSeries::empty("X"));

        // mean 0.0025, deviations +-0.0075
        let sd = 0.0075 * (40.0_f64 / 39.0).sqrt();
        let vol = sd * 252.0_f64.sqrt();
        let growth = (1.01_f64 * 0.995).powi(20);
        let annualized = growth.powf(252.0 / 40.0) - 1.0;
        let expected = (annualized - 0.03) / vol;

        assert!((report.sharpe_all - expected).abs() < 1e-6);
        assert!((report.volatility - vol * 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_series_is_degenerate_not_error() {
        let curve = curve_from_returns(1000.0, &[0.0; 50]);
        let report = MetricsEngine::default().compute(&curve, &[], &NavSeries::empty("X"));

        assert_eq!(report.volatility, 0.0);
        assert_eq!(report.sharpe_all, 0.0);
        assert_eq!(report.sharpe_1y, 0.0);
        assert_eq!(report.sharpe_ytd, 0.0);
        assert_eq!(report.sortino_ratio, 0.0);
        assert_eq!(report.max_drawdown, 0.0);
        assert_eq!(report.calmar_ratio, 0.0);
        assert_eq!(report.total_return, 0.0);
    }

    #[test]
    fn test_short_history_1y_falls_back_to_all() {
        let returns: Vec<f64> = (0..19).map(|i| if i % 3 == 0 { 0.02 } else { -0.004 }).collect();
        let curve = curve_from_returns(1000.0, &returns);
        let report = MetricsEngine::default().compute(&curve, &[], &NavSeries::empty("X"));

        assert_eq!(report.data_points, 20);
        assert!(report.sharpe_all != 0.0);
        assert_eq!(report.sharpe_1y, report.sharpe_all);
        assert!(report.warnings.iter().any(|w| w.contains("sharpe_1y")));
    }

    #[test]
    fn test_few_points_this_year_ytd_falls_back_to_all() {
        // 2024-11-01 ..= 2025-01-05: only five points fall in the last date's year
        let start = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        let mut value = 1000.0;
        let curve: Vec<EquityPoint> = start
            .iter_days()
            .take_while(|d| *d <= end)
            .enumerate()
            .map(|(i, date)| {
                if i > 0 {
                    value *= if i % 3 == 0 { 1.02 } else { 0.996 };
                }
                EquityPoint {
                    date,
                    total_value: value,
                    contribution: 0.0,
                }
            })
            .collect();
        let report = MetricsEngine::default().compute(&curve, &[], &NavSeries::empty("X"));

        assert_eq!(report.data_points, 66);
        assert!(report.sharpe_all != 0.0);
        assert_eq!(report.sharpe_ytd, report.sharpe_all);
        assert!(report.warnings.iter().any(|w| w.contains("sharpe_ytd")));
    }

    #[test]
    fn test_windows_are_computed_from_their_own_slices() {
        // Calm first half, volatile second half, ending in early 2025
        let mut returns: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 0.001 } else { 0.0005 }).collect();
        returns.extend((0..200).map(|i| if i % 2 == 0 { 0.03 } else { -0.025 }));
        let curve = curve_from_returns(1000.0, &returns);
        let report = MetricsEngine::default().compute(&curve, &[], &NavSeries::empty("X"));

        // 401 points over more than a year: the trailing year excludes part of the calm half
        assert!(report.sharpe_1y != report.sharpe_all);
        // Last point is in 2025, so YTD only covers the volatile tail
        assert!(report.sharpe_ytd != report.sharpe_1y);
    }

    #[test]
    fn test_max_drawdown_running_peak() {
        let curve = curve_from_returns(100.0, &[0.1, -0.2, 0.05, -0.1, 0.5]);
        let report = MetricsEngine::default().compute(&curve, &[], &NavSeries::empty("X"));
        // peak 110, trough 110 * 0.8 * 1.05 * 0.9 = 83.16
        assert!((report.max_drawdown - (83.16 - 110.0) / 110.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_contributions_are_not_returns() {
        // Value grows only by deployed capital
        let curve: Vec<EquityPoint> = (0..10)
            .map(|i| EquityPoint {
                date: day(i),
                total_value: 1000.0 + 100.0 * i as f64,
                contribution: if i == 0 { 0.0 } else { 100.0 },
            })
            .collect();
        let report = MetricsEngine::default().compute(&curve, &[], &NavSeries::empty("X"));
        assert!(report.total_return.abs() < 1e-9);
        assert_eq!(report.volatility, 0.0);
        assert_eq!(report.total_invested, 1900.0);
    }

    #[test]
    fn test_var_95_interpolates() {
        let values: Vec<f64> = (1..=21).map(|i| i as f64 / 100.0).collect();
        // idx = 0.05 * 20 = 1.0 -> second smallest
        assert!((percentile(&values, 5.0) - 2.0).abs() < 1e-9);
        assert!((percentile(&[0.01, 0.03], 50.0) - 2.0).abs() < 1e-9);
        assert_eq!(percentile(&[], 5.0), 0.0);
    }

    #[test]
    fn test_win_rate_and_profit_loss_ratio() {
        let trades = vec![sell(30.0), sell(10.0), sell(-10.0), sell(-30.0)];
        let (win_rate, ratio) = win_loss(&trades);
        assert_eq!(win_rate, 0.5);
        assert!((ratio - 1.0).abs() < 1e-12);

        let (win_rate, ratio) = win_loss(&[sell(5.0)]);
        assert_eq!(win_rate, 1.0);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_composite_penalises_drawdown() {
        let engine = MetricsEngine::default();
        let calm = engine.composite(10.0, 1.0, -5.0, 10.0, 0.5);
        let rough = engine.composite(10.0, 1.0, -25.0, 10.0, 0.5);
        assert!(calm > rough);
        // 0.3 * 1 + 0.25 * 1 - 0.2 * 0.5 - 0.15 * 1 + 0.1 * 0.5
        assert!((calm - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_empty_curve() {
        let report = MetricsEngine::default().compute(&[], &[], &NavSeries::empty("X"));
        assert_eq!(report.data_points, 0);
        assert_eq!(report.composite_score, 0.0);
    }

    #[test]
    fn test_idempotent() {
        let returns: Vec<f64> = (0..60).map(|i| ((i as f64) * 0.9).sin() / 100.0).collect();
        let curve = curve_from_returns(1000.0, &returns);
        let engine = MetricsEngine::default();
        let a = serde_json::to_string(&engine.compute(&curve, &[], &NavSeries::empty("X"))).unwrap();
        let b = serde_json::to_string(&engine.compute(&curve, &[], &NavSeries::empty("X"))).unwrap();
        assert_eq!(a, b);
    }
}
