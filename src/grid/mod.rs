//! Grid classification types, the upstream data source and the resolver that
//! puts the data cache in front of it.

mod client;
mod resolver;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::location::Location;

pub use client::{DataSourceConfig, HttpGridSource};
pub use resolver::{resolve_classification, DataOrigin, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridLevel {
    Low,
    Moderate,
    High,
}

impl GridLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridLevel::Low => "low",
            GridLevel::Moderate => "moderate",
            GridLevel::High => "high",
        }
    }
}

impl fmt::Display for GridLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(GridLevel::Low),
            "moderate" => Ok(GridLevel::Moderate),
            "high" => Ok(GridLevel::High),
            other => Err(format!("unknown grid level '{}'", other)),
        }
    }
}

/// A successful answer from the data source. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridClassification {
    pub region: String,
    pub level: GridLevel,
    /// Set when the source reports the flag itself; otherwise derived from `level`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_aware: Option<bool>,
}

impl GridClassification {
    pub fn new(region: impl Into<String>, level: GridLevel) -> Self {
        Self {
            region: region.into(),
            level,
            grid_aware: None,
        }
    }

    pub fn is_grid_aware(&self) -> bool {
        self.grid_aware.unwrap_or(self.level != GridLevel::Low)
    }
}

/// What the data source reports: a classification or an error status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GridReport {
    Success(GridClassification),
    Error {
        #[serde(default)]
        message: String,
    },
}

impl GridReport {
    pub fn error(message: impl Into<String>) -> Self {
        GridReport::Error {
            message: message.into(),
        }
    }
}

/// The upstream classification service.
///
/// Failures come back as `GridReport::Error`, never as a panic or `Err`.
#[async_trait(?Send)]
pub trait GridSource {
    fn name(&self) -> &str;

    async fn classify(&self, location: &Location) -> GridReport;
}
