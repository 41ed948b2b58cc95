//! Record fetcher trait and fetch status.
//!
//! The RawRecordFetcher trait abstracts over record sources (the remote query
//! service, the CSV store, in-memory fakes) so the panel engine can be driven
//! deterministically in tests. Transport, sessions and retries live behind
//! the trait; the service above it never retries.

use super::query::Query;
use crate::domain::Record;
use crate::error::{RefDataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status pair returned with every fetch: `("0", "")` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatus {
    pub code: String,
    pub message: String,
}

impl FetchStatus {
    pub fn ok() -> Self {
        Self {
            code: "0".into(),
            message: String::new(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Parse the textual `code,message` form (`"0,"` on success).
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(',') {
            Some((code, message)) => Self::error(code.trim(), message),
            None => Self::error(raw.trim(), ""),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == "0"
    }

    /// Turn a non-success status into an upstream error, verbatim.
    pub fn check(&self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(RefDataError::UpstreamQuery {
                code: self.code.clone(),
                message: self.message.clone(),
            })
        }
    }
}

impl Default for FetchStatus {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.code, self.message)
    }
}

/// Rows plus status from one fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub rows: Vec<Record>,
    pub status: FetchStatus,
}

impl FetchResponse {
    pub fn ok(rows: Vec<Record>) -> Self {
        Self {
            rows,
            status: FetchStatus::ok(),
        }
    }

    pub fn failed(status: FetchStatus) -> Self {
        Self {
            rows: Vec::new(),
            status,
        }
    }

    /// Rows if the status is success, the upstream error otherwise.
    pub fn into_rows(self) -> Result<(Vec<Record>, FetchStatus)> {
        self.status.check()?;
        Ok((self.rows, self.status))
    }
}

/// Trait for raw record sources.
///
/// Implementations execute one filtered query and report failures through
/// the returned status rather than panicking.
pub trait RawRecordFetcher: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Execute `query` and return its rows in source order.
    fn fetch(&self, query: &Query) -> FetchResponse;
}

impl<F: RawRecordFetcher + ?Sized> RawRecordFetcher for &F {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, query: &Query) -> FetchResponse {
        (**self).fetch(query)
    }
}

impl<F: RawRecordFetcher + ?Sized> RawRecordFetcher for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, query: &Query) -> FetchResponse {
        (**self).fetch(query)
    }
}
