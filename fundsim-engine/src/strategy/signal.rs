//! Per-period trading decision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do this period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Hold => write!(f, "hold"),
        }
    }
}

/// Signal produced once per simulated period.
///
/// `multiplier` scales the caller's `base_invest` on buys; `sell_fraction` is
/// the share of current holdings liquidated on sells. The field that does not
/// apply to the action is always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    pub multiplier: f64,
    pub sell_fraction: f64,
    /// Short machine-friendly label (e.g. "golden_cross")
    pub label: String,
    /// Human-readable explanation
    pub reason: String,
    /// Risk warning attached without changing the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Full exit that ends the run's ability to re-enter
    #[serde(default)]
    pub liquidate: bool,
}

impl Signal {
    pub fn hold(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Hold,
            multiplier: 0.0,
            sell_fraction: 0.0,
            label: label.into(),
            reason: reason.into(),
            warning: None,
            liquidate: false,
        }
    }

    /// Buy `multiplier * base_invest`. Negative multipliers are floored at 0.
    pub fn buy(multiplier: f64, label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Buy,
            multiplier: multiplier.max(0.0),
            ..Self::hold(label, reason)
        }
    }

    /// Sell `fraction` of holdings, clamped to [0, 1].
    pub fn sell(fraction: f64, label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Sell,
            sell_fraction: fraction.clamp(0.0, 1.0),
            ..Self::hold(label, reason)
        }
    }

    /// Hold emitted when the strategy lacks enough history.
    pub fn insufficient_history(needed: usize, index: usize) -> Self {
        Self::hold(
            "insufficient_history",
            format!("需要至少 {} 个历史数据点，当前仅 {} 个", needed, index),
        )
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn liquidating(mut self) -> Self {
        self.liquidate = true;
        self
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_zero_unused_fields() {
        let buy = Signal::buy(1.5, "golden_cross", "short above long");
        assert_eq!(buy.action, Action::Buy);
        assert_eq!(buy.sell_fraction, 0.0);
        assert!(!buy.liquidate);

        let sell = Signal::sell(0.5, "overbought", "deviation high");
        assert_eq!(sell.multiplier, 0.0);
        assert_eq!(sell.sell_fraction, 0.5);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(Signal::buy(-2.0, "x", "y").multiplier, 0.0);
        assert_eq!(Signal::sell(1.7, "x", "y").sell_fraction, 1.0);
        assert_eq!(Signal::sell(-0.1, "x", "y").sell_fraction, 0.0);
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_string(&Signal::hold("flat", "no cross")).unwrap();
        assert!(json.contains(r#""action":"hold""#));
        assert!(!json.contains("warning"));
    }
}
