//! Service configuration.
//!
//! Stored as TOML. `ServiceConfig::default()` carries the built-in
//! constants, so an empty file is a valid configuration.

use crate::domain::SnapshotPeriod;
use crate::error::{RefDataError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Industry classification scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndustryKind {
    /// Shenwan.
    Sw,
    /// China Securities Index.
    Zz,
}

impl fmt::Display for IndustryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndustryKind::Sw => write!(f, "SW"),
            IndustryKind::Zz => write!(f, "ZZ"),
        }
    }
}

impl FromStr for IndustryKind {
    type Err = RefDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SW" => Ok(IndustryKind::Sw),
            "ZZ" => Ok(IndustryKind::Zz),
            other => Err(RefDataError::InvalidArgument(format!(
                "industry kind must be SW or ZZ, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Index codes rewritten before querying weights (`000300.SH` → `399300.SZ`).
    pub index_aliases: BTreeMap<String, String>,
    /// Spacing of weight snapshots for daily weight panels.
    pub snapshot_period: SnapshotPeriod,
    /// `industry_src` filter value per classification scheme (`SW`, `ZZ`).
    pub industry_sources: BTreeMap<String, String>,
    /// Default `inst_type` list for instrument-info queries.
    pub default_inst_types: String,
    /// `report_type` filter applied to statement queries.
    pub report_type: String,
    /// Panel cache directory; no caching when absent.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let mut index_aliases = BTreeMap::new();
        index_aliases.insert("000300.SH".to_string(), "399300.SZ".to_string());

        let mut industry_sources = BTreeMap::new();
        industry_sources.insert(IndustryKind::Sw.to_string(), "申万研究所".to_string());
        industry_sources.insert(IndustryKind::Zz.to_string(), "中证指数有限公司".to_string());

        Self {
            index_aliases,
            snapshot_period: SnapshotPeriod::Month,
            industry_sources,
            default_inst_types: "1,2,3,4,5,101,102,103,104".to_string(),
            report_type: "408001000".to_string(),
            cache_dir: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RefDataError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RefDataError::Config(format!("parse config TOML: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RefDataError::Config(format!("serialize config: {e}")))
    }

    /// Apply the alias table to each comma-separated index code.
    pub fn resolve_index(&self, index: &str) -> String {
        index
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|code| {
                self.index_aliases
                    .get(code)
                    .map(String::as_str)
                    .unwrap_or(code)
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn industry_source(&self, kind: IndustryKind) -> Result<&str> {
        self.industry_sources
            .get(&kind.to_string())
            .map(String::as_str)
            .ok_or_else(|| RefDataError::Config(format!("no industry source configured for {kind}")))
    }
}

/// Offline record store settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSourceConfig {
    /// Directory holding one `{view}.csv` per view.
    pub data_dir: PathBuf,
    /// Calendar CSV; a weekday calendar is used when absent.
    pub calendar: Option<PathBuf>,
}

/// Top-level file layout: `[service]` and `[source]` tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefDataConfig {
    pub service: ServiceConfig,
    pub source: CsvSourceConfig,
}

impl RefDataConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RefDataError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RefDataError::Config(format!("parse config TOML: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RefDataError::Config(format!("serialize config: {e}")))
    }
}
