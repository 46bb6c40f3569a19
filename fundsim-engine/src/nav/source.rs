//! NAV source abstraction.
//!
//! Defines the `NavSource` trait implemented by whatever supplies NAV
//! history to the engine. Retrieval always completes before a simulation
//! starts, so the core itself never blocks on I/O.

use async_trait::async_trait;
use chrono::NaiveDate;
use fundsim_common::error::{Error as CommonError, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::{NavSeries, NavSeriesError};

// ============================================================================
// Source Error
// ============================================================================

/// Errors specific to NAV sources.
#[derive(Debug, Clone)]
pub enum NavSourceError {
    /// No history exists for the fund code
    NotFound(String),
    /// History exists but could not be parsed or failed validation
    Malformed(String),
    /// Underlying storage failure
    Io(String),
}

impl fmt::Display for NavSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(code) => write!(f, "No NAV history for fund {}", code),
            Self::Malformed(msg) => write!(f, "Malformed NAV history: {}", msg),
            Self::Io(msg) => write!(f, "NAV source I/O error: {}", msg),
        }
    }
}

impl std::error::Error for NavSourceError {}

impl NavSourceError {
    /// Missing data degrades to an empty run instead of failing the request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<NavSeriesError> for NavSourceError {
    fn from(e: NavSeriesError) -> Self {
        Self::Malformed(e.to_string())
    }
}

// ============================================================================
// Source Trait
// ============================================================================

/// Supplier of NAV history.
#[async_trait]
pub trait NavSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch the full NAV history for a fund.
    async fn fetch(&self, fund_code: &str) -> Result<NavSeries, NavSourceError>;
}

/// Raw NAV record as stored on disk or received from upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavRecord {
    pub date: NaiveDate,
    pub nav: f64,
}

// ============================================================================
// In-memory Source
// ============================================================================

/// Source backed by series held in memory.
#[derive(Debug, Default)]
pub struct MemoryNavSource {
    // Guards are never held across an await, and inserts happen from sync builders.
    series: RwLock<HashMap<String, NavSeries>>,
}

impl MemoryNavSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the series for its fund code.
    pub fn insert(&self, series: NavSeries) {
        if let Ok(mut map) = self.series.write() {
            map.insert(series.fund_code.clone(), series);
        }
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_series(self, series: NavSeries) -> Self {
        self.insert(series);
        self
    }
}

#[async_trait]
impl NavSource for MemoryNavSource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, fund_code: &str) -> Result<NavSeries, NavSourceError> {
        let map = self
            .series
            .read()
            .map_err(|_| NavSourceError::Io("memory source lock poisoned".into()))?;

        map.get(fund_code)
            .cloned()
            .ok_or_else(|| NavSourceError::NotFound(fund_code.to_string()))
    }
}

// ============================================================================
// JSON File Source
// ============================================================================

/// Source reading `<dir>/<fund_code>.json`, each an array of [`NavRecord`].
#[derive(Debug, Clone)]
pub struct JsonFileNavSource {
    dir: PathBuf,
}

impl JsonFileNavSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, fund_code: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fund_code))
    }

    async fn read_records(path: &Path) -> fundsim_common::Result<Vec<NavRecord>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(format!("reading {}", path.display()))?;
        serde_json::from_str(&content).context(format!("parsing {}", path.display()))
    }
}

#[async_trait]
impl NavSource for JsonFileNavSource {
    fn name(&self) -> &'static str {
        "json_file"
    }

    async fn fetch(&self, fund_code: &str) -> Result<NavSeries, NavSourceError> {
        // Fund codes become file names; refuse anything that could escape the directory.
        if fund_code.is_empty()
            || !fund_code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
            || fund_code.starts_with('.')
        {
            return Err(NavSourceError::NotFound(fund_code.to_string()));
        }

        let path = self.path_for(fund_code);
        let records = Self::read_records(&path).await.map_err(|e| {
            if e.is_missing_file() {
                NavSourceError::NotFound(fund_code.to_string())
            } else if matches!(e.root(), CommonError::Json(_)) {
                NavSourceError::Malformed(e.to_string())
            } else {
                NavSourceError::Io(e.to_string())
            }
        })?;

        tracing::debug!(
            fund_code,
            records = records.len(),
            path = %path.display(),
            "Loaded NAV history"
        );

        let navs = records.into_iter().map(|r| (r.date, r.nav)).collect();
        Ok(NavSeries::from_navs(fund_code, navs)?)
    }
}
