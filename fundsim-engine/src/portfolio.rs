//! Cash and holdings state of one simulation run.
//!
//! Buys are funded by external capital deployed period by period (the
//! periodic investment model), so a buy never touches `cash`. Sells convert
//! shares back into `cash`. Neither `cash` nor `holding_shares` can go
//! negative.

use serde::{Deserialize, Serialize};

/// Mutable state owned by exactly one simulator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Uninvested cash (initial amount plus sell proceeds)
    pub cash: f64,
    /// Fund shares held
    pub holding_shares: f64,
    /// Total external capital deployed by buys
    pub cumulative_invested: f64,
    /// Highest total value observed so far
    pub peak_equity: f64,
    /// NAV decline since the highest NAV seen while holding, in percent
    pub consecutive_loss_pct: f64,
    /// Cost of the shares currently held
    pub cost_basis: f64,
    /// Highest NAV seen since the current position was opened (0 when flat)
    pub peak_nav: f64,
}

/// Outcome of liquidating part of the holdings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SellFill {
    pub shares: f64,
    pub proceeds: f64,
    pub realized_profit: f64,
}

impl PortfolioState {
    pub fn new(initial_amount: f64) -> Self {
        let cash = initial_amount.max(0.0);
        Self {
            cash,
            holding_shares: 0.0,
            cumulative_invested: 0.0,
            peak_equity: cash,
            consecutive_loss_pct: 0.0,
            cost_basis: 0.0,
            peak_nav: 0.0,
        }
    }

    /// Market value of the holdings at `nav`.
    pub fn holding_value(&self, nav: f64) -> f64 {
        self.holding_shares * nav
    }

    /// `cash + holding_shares * nav`
    pub fn total_value(&self, nav: f64) -> f64 {
        self.cash + self.holding_shares * nav
    }

    /// Unrealized profit of the open position at `nav`.
    pub fn unrealized_profit(&self, nav: f64) -> f64 {
        self.holding_value(nav) - self.cost_basis
    }

    pub fn has_position(&self) -> bool {
        self.holding_shares > 0.0
    }

    /// Revalue at the period's NAV before any decision is taken.
    pub(crate) fn mark_to_market(&mut self, nav: f64) {
        if self.has_position() {
            self.peak_nav = self.peak_nav.max(nav);
            self.consecutive_loss_pct = if self.peak_nav > 0.0 {
                ((self.peak_nav - nav) / self.peak_nav * 100.0).max(0.0)
            } else {
                0.0
            };
        } else {
            self.peak_nav = 0.0;
            self.consecutive_loss_pct = 0.0;
        }
        self.refresh_peak_equity(nav);
    }

    pub(crate) fn refresh_peak_equity(&mut self, nav: f64) {
        self.peak_equity = self.peak_equity.max(self.total_value(nav));
    }

    /// Convert `amount` of external capital into shares at `nav`.
    ///
    /// Returns the shares bought.
    pub(crate) fn buy(&mut self, amount: f64, nav: f64) -> f64 {
        if amount <= 0.0 || nav <= 0.0 {
            return 0.0;
        }
        if !self.has_position() {
            self.peak_nav = nav;
            self.consecutive_loss_pct = 0.0;
        }

        let shares = amount / nav;
        self.holding_shares += shares;
        self.cost_basis += amount;
        self.cumulative_invested += amount;
        shares
    }

    /// Sell `fraction` of the holdings at `nav`, capped to what is held.
    pub(crate) fn sell(&mut self, fraction: f64, nav: f64) -> SellFill {
        let fraction = fraction.clamp(0.0, 1.0);
        if !self.has_position() || fraction == 0.0 {
            return SellFill {
                shares: 0.0,
                proceeds: 0.0,
                realized_profit: 0.0,
            };
        }

        let full_exit = fraction >= 1.0;
        let shares = if full_exit {
            self.holding_shares
        } else {
            self.holding_shares * fraction
        };
        let released_cost = if full_exit {
            self.cost_basis
        } else {
            self.cost_basis * fraction
        };
        let proceeds = shares * nav;

        self.cash += proceeds;
        if full_exit {
            self.holding_shares = 0.0;
            self.cost_basis = 0.0;
            self.peak_nav = 0.0;
            self.consecutive_loss_pct = 0.0;
        } else {
            self.holding_shares = (self.holding_shares - shares).max(0.0);
            self.cost_basis = (self.cost_basis - released_cost).max(0.0);
        }

        SellFill {
            shares,
            proceeds,
            realized_profit: proceeds - released_cost,
        }
    }
}
