//! Backtest report generation.

use serde::{Deserialize, Serialize};

use super::evaluation::TradeEvaluation;
use super::metrics::MetricsReport;
use super::simulator::{RunState, SimulationResult, Trade};
use crate::strategy::{Action, StrategyId};

/// Number of executed trades listed in the text report.
const RECENT_TRADES: usize = 10;

/// Backtest report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Report title
    pub title: String,
    pub fund_code: String,
    pub strategy_id: StrategyId,
    /// Simulated period
    pub period: String,
    /// Summary statistics
    pub summary: ReportSummary,
    /// Risk metrics
    pub risk_metrics: RiskMetrics,
    /// Trade statistics
    pub trade_stats: TradeStats,
    /// Text report (formatted)
    pub text_report: String,
}

/// Report summary section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_invested: f64,
    pub final_value: f64,
    pub net_profit: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub benchmark_return_pct: f64,
    pub executed_trades: usize,
    pub liquidated: bool,
}

/// Risk metrics section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub max_drawdown_pct: f64,
    pub volatility_pct: f64,
    pub sharpe_all: f64,
    pub sharpe_1y: f64,
    pub sharpe_ytd: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub var_95_pct: f64,
    pub composite_score: f64,
}

/// Trade statistics section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeStats {
    pub buys: usize,
    pub sells: usize,
    pub hit_rate: f64,
    pub profit_factor: f64,
    pub avg_profit_per_trade: f64,
    pub expectancy: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl BacktestReport {
    /// Generate a report from one simulated run
    pub fn generate(
        fund_code: &str,
        strategy_id: StrategyId,
        result: &SimulationResult,
        metrics: &MetricsReport,
        evaluation: &TradeEvaluation,
    ) -> Self {
        let period = match (result.equity_curve.first(), result.equity_curve.last()) {
            (Some(first), Some(last)) => format!("{} 至 {}", first.date, last.date),
            _ => "无数据".to_string(),
        };

        let count = |action: Action| result.trades.iter().filter(|t| t.action == action).count();

        let summary = ReportSummary {
            total_invested: metrics.total_invested,
            final_value: metrics.final_value,
            net_profit: metrics.final_value - metrics.total_invested,
            total_return_pct: metrics.total_return,
            annualized_return_pct: metrics.annualized_return,
            benchmark_return_pct: metrics.benchmark_return,
            executed_trades: result.executed_trades().count(),
            liquidated: result.run_state == RunState::Liquidated,
        };

        let risk_metrics = RiskMetrics {
            max_drawdown_pct: metrics.max_drawdown,
            volatility_pct: metrics.volatility,
            sharpe_all: metrics.sharpe_all,
            sharpe_1y: metrics.sharpe_1y,
            sharpe_ytd: metrics.sharpe_ytd,
            sortino_ratio: metrics.sortino_ratio,
            calmar_ratio: metrics.calmar_ratio,
            var_95_pct: metrics.var_95,
            composite_score: metrics.composite_score,
        };

        let trade_stats = TradeStats {
            buys: count(Action::Buy),
            sells: count(Action::Sell),
            hit_rate: evaluation.hit_rate,
            profit_factor: evaluation.profit_factor,
            avg_profit_per_trade: evaluation.avg_profit_per_trade,
            expectancy: evaluation.expectancy,
            max_consecutive_wins: evaluation.max_consecutive_wins,
            max_consecutive_losses: evaluation.max_consecutive_losses,
        };

        let title = format!("{} {} 回测报告", fund_code, strategy_id.display_name());
        let text_report = Self::format_text_report(
            &title,
            &period,
            &summary,
            &risk_metrics,
            &trade_stats,
            &metrics.warnings,
            &result.trades,
        );

        Self {
            title,
            fund_code: fund_code.to_string(),
            strategy_id,
            period,
            summary,
            risk_metrics,
            trade_stats,
            text_report,
        }
    }

    /// Format as text report
    fn format_text_report(
        title: &str,
        period: &str,
        summary: &ReportSummary,
        risk: &RiskMetrics,
        stats: &TradeStats,
        warnings: &[String],
        trades: &[Trade],
    ) -> String {
        let mut report = String::new();

        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str(&format!("                {}\n", title));
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        report.push_str(&format!("📅 回测区间: {}\n\n", period));

        report.push_str("📊 收益概要\n");
        report.push_str("───────────────────────────────────────────────────────────────\n");
        report.push_str(&format!("  累计投入:       ¥{:>12.2}\n", summary.total_invested));
        report.push_str(&format!("  期末市值:       ¥{:>12.2}\n", summary.final_value));
        report.push_str(&format!("  净收益:         ¥{:>12.2}\n", summary.net_profit));
        report.push_str(&format!("  总收益率:       {:>12.2}%\n", summary.total_return_pct));
        report.push_str(&format!("  年化收益率:     {:>12.2}%\n", summary.annualized_return_pct));
        report.push_str(&format!("  基金涨跌幅:     {:>12.2}%\n", summary.benchmark_return_pct));
        report.push_str(&format!("  成交次数:       {:>12}\n", summary.executed_trades));
        if summary.liquidated {
            report.push_str("  状态:           已止损清仓\n");
        }
        report.push('\n');

        report.push_str("⚠️ 风险指标\n");
        report.push_str("───────────────────────────────────────────────────────────────\n");
        report.push_str(&format!("  最大回撤:       {:>12.2}%\n", risk.max_drawdown_pct));
        report.push_str(&format!("  年化波动率:     {:>12.2}%\n", risk.volatility_pct));
        report.push_str(&format!("  夏普(全部):     {:>12.2}\n", risk.sharpe_all));
        report.push_str(&format!("  夏普(近一年):   {:>12.2}\n", risk.sharpe_1y));
        report.push_str(&format!("  夏普(今年):     {:>12.2}\n", risk.sharpe_ytd));
        report.push_str(&format!("  索提诺比率:     {:>12.2}\n", risk.sortino_ratio));
        report.push_str(&format!("  卡玛比率:       {:>12.2}\n", risk.calmar_ratio));
        report.push_str(&format!("  VaR(95%):       {:>12.2}%\n", risk.var_95_pct));
        report.push_str(&format!("  综合评分:       {:>12.2}\n\n", risk.composite_score));

        report.push_str("📈 交易统计\n");
        report.push_str("───────────────────────────────────────────────────────────────\n");
        report.push_str(&format!("  买入/卖出:      {:>5} / {:<5}\n", stats.buys, stats.sells));
        report.push_str(&format!("  胜率:           {:>12.2}%\n", stats.hit_rate * 100.0));
        report.push_str(&format!("  盈利因子:       {:>12.2}\n", stats.profit_factor));
        report.push_str(&format!("  平均每笔收益:   ¥{:>12.2}\n", stats.avg_profit_per_trade));
        report.push_str(&format!("  期望值:         ¥{:>12.2}\n", stats.expectancy));
        report.push_str(&format!(
            "  最长连胜/连亏:  {:>5} / {:<5}\n\n",
            stats.max_consecutive_wins, stats.max_consecutive_losses
        ));

        if !warnings.is_empty() {
            report.push_str("ℹ️ 说明\n");
            report.push_str("───────────────────────────────────────────────────────────────\n");
            for warning in warnings {
                report.push_str(&format!("  - {}\n", warning));
            }
            report.push('\n');
        }

        let recent: Vec<&Trade> = trades.iter().rev().filter(|t| !t.is_hold()).take(RECENT_TRADES).collect();
        if !recent.is_empty() {
            report.push_str("📝 最近交易\n");
            report.push_str("───────────────────────────────────────────────────────────────\n");

            for trade in recent {
                let icon = match trade.action {
                    Action::Buy => "🟢",
                    _ if trade.profit_since_entry >= 0.0 => "✅",
                    _ => "❌",
                };
                report.push_str(&format!(
                    "  {} {} {} ¥{:.2} @ {:.4} | {} | 盈亏: ¥{:.2}\n",
                    icon,
                    trade.date,
                    trade.action,
                    trade.amount,
                    trade.price,
                    trade.signal_label,
                    trade.profit_since_entry
                ));
            }
        }

        report.push_str("\n═══════════════════════════════════════════════════════════════\n");

        report
    }

    /// Compact form for chat notifications
    pub fn to_chat_message(&self) -> String {
        format!(
            "📊 *{}*\n\n\
            *回测区间:* {}\n\n\
            *收益概要*\n\
            净收益: ¥{:.2}\n\
            总收益率: {:.2}%\n\
            年化收益率: {:.2}%\n\
            成交次数: {}\n\n\
            *风险指标*\n\
            最大回撤: {:.2}%\n\
            夏普比率: {:.2}\n\
            综合评分: {:.2}",
            self.title,
            self.period,
            self.summary.net_profit,
            self.summary.total_return_pct,
            self.summary.annualized_return_pct,
            self.summary.executed_trades,
            self.risk_metrics.max_drawdown_pct,
            self.risk_metrics.sharpe_all,
            self.risk_metrics.composite_score
        )
    }
}
