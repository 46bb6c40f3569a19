//! Trade-level evaluation of realised sells.

use serde::{Deserialize, Serialize};

use super::simulator::Trade;
use crate::strategy::Action;

/// Quality of the closed (sold) part of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeEvaluation {
    /// Winning sells / all sells
    pub hit_rate: f64,
    /// Gross profit / gross loss, 0 without losses
    pub profit_factor: f64,
    pub max_consecutive_losses: usize,
    pub max_consecutive_wins: usize,
    /// Mean realised profit per sell
    pub avg_profit_per_trade: f64,
    /// Expected profit per sell: `hit_rate * avg_win - (1 - hit_rate) * avg_loss`
    pub expectancy: f64,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

impl TradeEvaluation {
    /// Evaluate the sells in a trade log. Buys and holds are ignored.
    pub fn from_trades(trades: &[Trade]) -> Self {
        let profits: Vec<f64> = trades
            .iter()
            .filter(|t| t.action == Action::Sell)
            .map(|t| t.profit_since_entry)
            .collect();

        if profits.is_empty() {
            return Self::default();
        }

        let wins: Vec<f64> = profits.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = profits.iter().copied().filter(|p| *p < 0.0).map(f64::abs).collect();

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum();
        let hit_rate = wins.len() as f64 / profits.len() as f64;

        let avg_win = if wins.is_empty() { 0.0 } else { gross_profit / wins.len() as f64 };
        let avg_loss = if losses.is_empty() { 0.0 } else { gross_loss / losses.len() as f64 };

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            0.0
        };

        let (max_consecutive_wins, max_consecutive_losses) = streaks(&profits);

        Self {
            hit_rate,
            profit_factor,
            max_consecutive_losses,
            max_consecutive_wins,
            avg_profit_per_trade: profits.iter().sum::<f64>() / profits.len() as f64,
            expectancy: hit_rate * avg_win - (1.0 - hit_rate) * avg_loss,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
        }
    }
}

/// Longest winning and losing runs. A break-even sell ends both.
fn streaks(profits: &[f64]) -> (usize, usize) {
    let (mut wins, mut losses) = (0usize, 0usize);
    let (mut max_wins, mut max_losses) = (0usize, 0usize);

    for p in profits {
        if *p > 0.0 {
            wins += 1;
            losses = 0;
        } else if *p < 0.0 {
            losses += 1;
            wins = 0;
        } else {
            wins = 0;
            losses = 0;
        }
        max_wins = max_wins.max(wins);
        max_losses = max_losses.max(losses);
    }

    (max_wins, max_losses)
}
