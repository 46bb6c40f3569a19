//! Fund NAV history.
//!
//! A [`NavSeries`] is the only input the backtesting core consumes. It is
//! produced by a [`NavSource`] before any simulation starts and is shared
//! read-only by every run over the same fund.

mod source;

pub use source::{JsonFileNavSource, MemoryNavSource, NavRecord, NavSource, NavSourceError};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One NAV observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    /// Valuation date
    pub date: NaiveDate,
    /// Net asset value per share (always > 0)
    pub nav: f64,
    /// Change versus the previous point, in percent (1.23 = +1.23%)
    pub daily_return: f64,
}

/// Errors raised while building a series from raw observations.
#[derive(Debug, Clone, PartialEq)]
pub enum NavSeriesError {
    /// NAV is zero, negative, NaN or infinite
    InvalidNav { date: NaiveDate, nav: f64 },
    /// Precomputed points are not strictly ascending by date
    Unordered { date: NaiveDate },
}

impl fmt::Display for NavSeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNav { date, nav } => write!(f, "Invalid NAV {} on {}", nav, date),
            Self::Unordered { date } => write!(f, "NAV points out of order at {}", date),
        }
    }
}

impl std::error::Error for NavSeriesError {}

/// Date-ordered, de-duplicated NAV history of one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSeries {
    /// Fund code, e.g. "110011"
    pub fund_code: String,
    points: Vec<NavPoint>,
}

impl NavSeries {
    /// Empty series (no data available).
    pub fn empty(fund_code: impl Into<String>) -> Self {
        Self {
            fund_code: fund_code.into(),
            points: Vec::new(),
        }
    }

    /// Build a series from raw `(date, nav)` observations.
    ///
    /// Observations are sorted ascending, duplicates on the same date keep the
    /// last value, and daily returns are derived (the first point gets 0).
    pub fn from_navs(
        fund_code: impl Into<String>,
        mut navs: Vec<(NaiveDate, f64)>,
    ) -> Result<Self, NavSeriesError> {
        if let Some(&(date, nav)) = navs.iter().find(|(_, nav)| !nav.is_finite() || *nav <= 0.0) {
            return Err(NavSeriesError::InvalidNav { date, nav });
        }

        // Stable sort keeps input order within a date, so the last one wins below.
        navs.sort_by_key(|(date, _)| *date);
        let mut deduped: Vec<(NaiveDate, f64)> = Vec::with_capacity(navs.len());
        for (date, nav) in navs {
            match deduped.last_mut() {
                Some(last) if last.0 == date => last.1 = nav,
                _ => deduped.push((date, nav)),
            }
        }

        let mut points = Vec::with_capacity(deduped.len());
        let mut prev: Option<f64> = None;
        for (date, nav) in deduped {
            let daily_return = prev.map_or(0.0, |p| (nav - p) / p * 100.0);
            points.push(NavPoint {
                date,
                nav,
                daily_return,
            });
            prev = Some(nav);
        }

        Ok(Self {
            fund_code: fund_code.into(),
            points,
        })
    }

    /// Build a series from points whose `daily_return` is already computed.
    pub fn from_points(
        fund_code: impl Into<String>,
        points: Vec<NavPoint>,
    ) -> Result<Self, NavSeriesError> {
        for (i, p) in points.iter().enumerate() {
            if !p.nav.is_finite() || p.nav <= 0.0 {
                return Err(NavSeriesError::InvalidNav {
                    date: p.date,
                    nav: p.nav,
                });
            }
            if i > 0 && points[i - 1].date >= p.date {
                return Err(NavSeriesError::Unordered { date: p.date });
            }
        }

        Ok(Self {
            fund_code: fund_code.into(),
            points,
        })
    }

    /// All points, ascending by date.
    pub fn points(&self) -> &[NavPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&NavPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&NavPoint> {
        self.points.last()
    }

    /// Trailing window covering `days` calendar days up to the last point.
    ///
    /// Weekends and holidays simply have no points, so the window may hold
    /// fewer than `days` observations.
    pub fn last_days(&self, days: u32) -> NavSeries {
        let Some(last) = self.points.last() else {
            return self.clone();
        };
        let cutoff = last.date - Duration::days(i64::from(days));
        let start = self.points.partition_point(|p| p.date <= cutoff);

        NavSeries {
            fund_code: self.fund_code.clone(),
            points: self.points[start..].to_vec(),
        }
    }

    /// Buy-and-hold return of the fund over the series, in percent.
    pub fn buy_and_hold_return(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (last.nav - first.nav) / first.nav * 100.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_from_navs_derives_percent_returns() {
        let series = NavSeries::from_navs("000001", vec![(d(1), 1.0), (d(4), 1.05), (d(5), 1.008)])
            .unwrap();

        let returns: Vec<f64> = series.points().iter().map(|p| p.daily_return).collect();
        assert_eq!(returns[0], 0.0);
        assert!((returns[1] - 5.0).abs() < 1e-9);
        assert!((returns[2] - (-4.0)).abs() < 1e-9);
    }

    #[test]
    fn test_from_navs_sorts_and_dedupes() {
        let series = NavSeries::from_navs(
            "000001",
            vec![(d(5), 1.2), (d(1), 1.0), (d(5), 1.1), (d(4), 1.05)],
        )
        .unwrap();

        let dates: Vec<NaiveDate> = series.points().iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(1), d(4), d(5)]);
        // Last observation for a duplicated date wins
        assert!((series.last().unwrap().nav - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_from_navs_rejects_non_positive() {
        let err = NavSeries::from_navs("000001", vec![(d(1), 1.0), (d(2), 0.0)]).unwrap_err();
        assert_eq!(err, NavSeriesError::InvalidNav { date: d(2), nav: 0.0 });

        assert!(NavSeries::from_navs("000001", vec![(d(1), f64::NAN)]).is_err());
    }

    #[test]
    fn test_from_points_requires_order() {
        let points = vec![
            NavPoint { date: d(2), nav: 1.0, daily_return: 0.0 },
            NavPoint { date: d(1), nav: 1.0, daily_return: 0.0 },
        ];
        assert_eq!(
            NavSeries::from_points("000001", points).unwrap_err(),
            NavSeriesError::Unordered { date: d(1) }
        );
    }

    #[test]
    fn test_last_days_uses_calendar_window() {
        let navs = (1..=20).map(|day| (d(day), 1.0 + day as f64 * 0.01)).collect();
        let series = NavSeries::from_navs("000001", navs).unwrap();

        let window = series.last_days(7);
        assert_eq!(window.first().unwrap().date, d(14));
        assert_eq!(window.last().unwrap().date, d(20));
        assert_eq!(window.len(), 7);

        assert!(NavSeries::empty("x").last_days(30).is_empty());
    }

    #[test]
    fn test_buy_and_hold_return() {
        let series = NavSeries::from_navs("000001", vec![(d(1), 2.0), (d(2), 2.5)]).unwrap();
        assert!((series.buy_and_hold_return() - 25.0).abs() < 1e-9);
        assert_eq!(NavSeries::empty("x").buy_and_hold_return(), 0.0);
    }
}
