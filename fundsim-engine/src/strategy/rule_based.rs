//! Enhanced rule-based strategy.
//!
//! Classifies the last two daily returns into one of nine market regimes,
//! each mapped to a fixed action. A stop-loss on the NAV decline since the
//! position's peak overrides the regime and liquidates everything.
//!
//! # Regime table
//!
//! `t` is today's return and `p` the previous day's return, both in percent.
//! Rules are evaluated top to bottom; the first match wins.
//!
//! | # | Regime             | Condition                   | Action   |
//! |---|--------------------|-----------------------------|----------|
//! | 1 | strong_breakout    | t ≥ 1.0 and p > 0           | sell 0.2 |
//! | 2 | continuation       | t > 0, p > 0, t ≥ p         | buy ×0.5 |
//! | 3 | slowdown           | t > 0, p > 0                | hold     |
//! | 4 | reversal_up        | t > 0, p ≤ 0                | buy ×1.0 |
//! | 5 | reversal_down      | t ≤ 0, p > 0                | hold     |
//! | 6 | stabilizing_bottom | t > -0.3                    | buy ×1.2 |
//! | 7 | first_sharp_drop   | t ≤ -1.5 and p > -0.3       | buy ×2.0 |
//! | 8 | continued_decline  | t ≤ p                       | buy ×1.0 |
//! | 9 | decline_slowing    | otherwise                   | buy ×1.5 |

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Action, Signal, SignalGenerator, StrategyContext, StrategyId};
use crate::nav::NavSeries;
use crate::portfolio::PortfolioState;

/// Daily move (percent) counted as a strong rise.
pub const STRONG_MOVE_PCT: f64 = 1.0;
/// Daily move (percent) counted as a sharp drop.
pub const SHARP_DROP_PCT: f64 = -1.5;
/// Band (percent) below zero still counted as flat.
pub const FLAT_BAND_PCT: f64 = 0.3;

/// Default full-liquidation threshold (percent loss from peak).
pub const DEFAULT_STOP_LOSS_PCT: f64 = 12.0;
/// Default warning threshold (percent loss from peak).
pub const DEFAULT_WARNING_PCT: f64 = 8.0;

/// Market state derived from two consecutive daily returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    StrongBreakout,
    Continuation,
    Slowdown,
    ReversalUp,
    ReversalDown,
    StabilizingBottom,
    FirstSharpDrop,
    ContinuedDecline,
    DeclineSlowing,
}

impl MarketRegime {
    /// Classify `(today, prev)` returns in percent.
    pub fn classify(today: f64, prev: f64) -> Self {
        let (t, p) = (today, prev);
        if t >= STRONG_MOVE_PCT && p > 0.0 {
            Self::StrongBreakout
        } else if t > 0.0 && p > 0.0 && t >= p {
            Self::Continuation
        } else if t > 0.0 && p > 0.0 {
            Self::Slowdown
        } else if t > 0.0 {
            Self::ReversalUp
        } else if p > 0.0 {
            Self::ReversalDown
        } else if t > -FLAT_BAND_PCT {
            Self::StabilizingBottom
        } else if t <= SHARP_DROP_PCT && p > -FLAT_BAND_PCT {
            Self::FirstSharpDrop
        } else if t <= p {
            Self::ContinuedDecline
        } else {
            Self::DeclineSlowing
        }
    }

    /// Fixed action for this regime: `(action, multiplier or sell fraction)`.
    pub const fn action(&self) -> (Action, f64) {
        match self {
            Self::StrongBreakout => (Action::Sell, 0.2),
            Self::Continuation => (Action::Buy, 0.5),
            Self::Slowdown => (Action::Hold, 0.0),
            Self::ReversalUp => (Action::Buy, 1.0),
            Self::ReversalDown => (Action::Hold, 0.0),
            Self::StabilizingBottom => (Action::Buy, 1.2),
            Self::FirstSharpDrop => (Action::Buy, 2.0),
            Self::ContinuedDecline => (Action::Buy, 1.0),
            Self::DeclineSlowing => (Action::Buy, 1.5),
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::StrongBreakout => "strong_breakout",
            Self::Continuation => "continuation",
            Self::Slowdown => "slowdown",
            Self::ReversalUp => "reversal_up",
            Self::ReversalDown => "reversal_down",
            Self::StabilizingBottom => "stabilizing_bottom",
            Self::FirstSharpDrop => "first_sharp_drop",
            Self::ContinuedDecline => "continued_decline",
            Self::DeclineSlowing => "decline_slowing",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrongBreakout => write!(f, "强势突破"),
            Self::Continuation => write!(f, "上涨延续"),
            Self::Slowdown => write!(f, "涨势放缓"),
            Self::ReversalUp => write!(f, "止跌反弹"),
            Self::ReversalDown => write!(f, "冲高回落"),
            Self::StabilizingBottom => write!(f, "底部企稳"),
            Self::FirstSharpDrop => write!(f, "首次大跌"),
            Self::ContinuedDecline => write!(f, "持续下跌"),
            Self::DeclineSlowing => write!(f, "跌势趋缓"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedRuleBased {
    /// Loss from peak (percent) that triggers full liquidation
    pub stop_loss_pct: f64,
    /// Loss from peak (percent) that attaches a warning
    pub warning_pct: f64,
}

impl Default for EnhancedRuleBased {
    fn default() -> Self {
        Self {
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            warning_pct: DEFAULT_WARNING_PCT,
        }
    }
}

impl EnhancedRuleBased {
    fn regime_signal(regime: MarketRegime, today: f64, prev: f64) -> Signal {
        let reason = format!("{}: 今日 {:+.2}%，前日 {:+.2}%", regime, today, prev);
        match regime.action() {
            (Action::Buy, multiplier) => Signal::buy(multiplier, regime.label(), reason),
            (Action::Sell, fraction) => Signal::sell(fraction, regime.label(), reason),
            (Action::Hold, _) => Signal::hold(regime.label(), reason),
        }
    }
}

impl SignalGenerator for EnhancedRuleBased {
    fn id(&self) -> StrategyId {
        StrategyId::EnhancedRuleBased
    }

    fn min_lookback(&self) -> usize {
        // The first point carries no return, so two prior points are needed.
        2
    }

    fn evaluate(
        &self,
        history: &NavSeries,
        index: usize,
        state: &PortfolioState,
        _ctx: &StrategyContext,
        _base_invest: f64,
    ) -> Signal {
        let loss = state.consecutive_loss_pct;
        if state.has_position() && loss >= self.stop_loss_pct {
            return Signal::sell(
                1.0,
                "stop_loss",
                format!("自高点累计回撤 {:.2}% 触发 {:.0}% 止损，全部清仓", loss, self.stop_loss_pct),
            )
            .liquidating();
        }

        let points = history.points();
        let today = points[index].daily_return;
        let prev = points[index - 1].daily_return;
        let signal = Self::regime_signal(MarketRegime::classify(today, prev), today, prev);

        if state.has_position() && loss >= self.warning_pct {
            signal.with_warning(format!(
                "自高点累计回撤 {:.2}%，已超过 {:.0}% 预警线",
                loss, self.warning_pct
            ))
        } else {
            signal
        }
    }
}
