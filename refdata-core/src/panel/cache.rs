//! Write-once Parquet cache of produced panels.
//!
//! Layout: `{cache_dir}/{operation}/{key}.parquet` with a
//! `{key}.meta.json` sidecar, where `key` is the BLAKE3 hash of the canonical
//! JSON of the operation name and every query parameter.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Entries are never rewritten once present
//! - Quarantine for unreadable files (`{key}.parquet.quarantined`)

use super::dense::{DensePanel, PanelValue};
use crate::data::FetchStatus;
use crate::error::{RefDataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Full identity of a panel query.
///
/// Parameters live in a `BTreeMap` so the serialized form, and therefore the
/// hash, does not depend on insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelKey {
    pub operation: String,
    pub params: BTreeMap<String, String>,
}

impl PanelKey {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// Hex BLAKE3 digest of the canonical JSON form.
    pub fn hash(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| RefDataError::CacheError(format!("key serialization: {e}")))?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}

/// Metadata sidecar for a cached panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelMeta {
    pub key: PanelKey,
    pub key_hash: String,
    pub n_dates: usize,
    pub n_entities: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub data_hash: String,
    /// Upstream status of the fetch the panel was built from.
    #[serde(default)]
    pub status: FetchStatus,
    pub cached_at: chrono::NaiveDateTime,
}

pub struct PanelCache {
    cache_dir: PathBuf,
}

impl PanelCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, key: &PanelKey, hash: &str) -> PathBuf {
        self.cache_dir
            .join(&key.operation)
            .join(format!("{hash}.parquet"))
    }

    fn meta_path(&self, key: &PanelKey, hash: &str) -> PathBuf {
        self.cache_dir
            .join(&key.operation)
            .join(format!("{hash}.meta.json"))
    }

    /// Store a panel and the status it was built with under `key`. An
    /// existing entry is left untouched.
    pub fn write<T: PanelValue>(
        &self,
        key: &PanelKey,
        panel: &DensePanel<T>,
        status: &FetchStatus,
    ) -> Result<()> {
        let hash = key.hash()?;
        let path = self.entry_path(key, &hash);
        if path.exists() {
            debug!(operation = %key.operation, key = %hash, "cache entry already present");
            return Ok(());
        }
        let dir = self.cache_dir.join(&key.operation);
        fs::create_dir_all(&dir)
            .map_err(|e| RefDataError::CacheError(format!("failed to create dir: {e}")))?;

        let df = panel.to_dataframe()?;
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            RefDataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let mut rendered = Vec::new();
        panel.write_csv(&mut rendered)?;
        let meta = PanelMeta {
            key: key.clone(),
            key_hash: hash.clone(),
            n_dates: panel.n_dates(),
            n_entities: panel.n_entities(),
            first_date: panel.dates().first().map(|d| d.to_string()),
            last_date: panel.dates().last().map(|d| d.to_string()),
            data_hash: blake3::hash(&rendered).to_hex().to_string(),
            status: status.clone(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| RefDataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(key, &hash), meta_json)
            .map_err(|e| RefDataError::CacheError(format!("meta write: {e}")))?;
        Ok(())
    }

    /// Load the panel cached under `key`, if any.
    ///
    /// An unreadable entry is quarantined and reported as a miss.
    pub fn load<T: PanelValue>(&self, key: &PanelKey) -> Result<Option<DensePanel<T>>> {
        let hash = key.hash()?;
        let path = self.entry_path(key, &hash);
        if !path.exists() {
            return Ok(None);
        }
        match read_parquet(&path).and_then(|df| DensePanel::<T>::from_dataframe(&df)) {
            Ok(panel) => {
                debug!(operation = %key.operation, key = %hash, "cache hit");
                Ok(Some(panel))
            }
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, &quarantine);
                let _ = fs::remove_file(self.meta_path(key, &hash));
                Ok(None)
            }
        }
    }

    pub fn get_meta(&self, key: &PanelKey) -> Option<PanelMeta> {
        let hash = key.hash().ok()?;
        let content = fs::read_to_string(self.meta_path(key, &hash)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Metadata of every cached panel, grouped by operation directory.
    pub fn status(&self) -> Result<Vec<PanelMeta>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let read_dir = |dir: &Path| {
            fs::read_dir(dir).map_err(|e| RefDataError::CacheError(format!("read dir: {e}")))
        };
        let mut metas = Vec::new();
        for op_entry in read_dir(self.cache_dir.as_path())? {
            let op_dir = op_entry
                .map_err(|e| RefDataError::CacheError(format!("dir entry: {e}")))?
                .path();
            if !op_dir.is_dir() {
                continue;
            }
            for entry in read_dir(op_dir.as_path())? {
                let path = entry
                    .map_err(|e| RefDataError::CacheError(format!("dir entry: {e}")))?
                    .path();
                let is_meta = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"));
                if !is_meta {
                    continue;
                }
                let parsed = fs::read_to_string(&path)
                    .ok()
                    .and_then(|c| serde_json::from_str::<PanelMeta>(&c).ok());
                match parsed {
                    Some(meta) => metas.push(meta),
                    None => warn!(path = %path.display(), "unreadable cache metadata"),
                }
            }
        }
        metas.sort_by(|a, b| {
            (&a.key.operation, a.cached_at).cmp(&(&b.key.operation, b.cached_at))
        });
        Ok(metas)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn write_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .map_err(|e| RefDataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| RefDataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file =
        fs::File::open(path).map_err(|e| RefDataError::ParquetError(format!("open: {e}")))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| RefDataError::ParquetError(format!("read: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityId, TradingDate};

    fn td(v: i64) -> TradingDate {
        TradingDate::from_int(v).unwrap()
    }

    fn sample() -> DensePanel<f64> {
        DensePanel::from_columns(
            vec![td(20200102), td(20200103)],
            vec![EntityId::from("600030.SH"), EntityId::from("600519.SH")],
            vec![vec![Some(0.5), Some(0.6)], vec![None, Some(0.4)]],
        )
        .unwrap()
    }

    fn key() -> PanelKey {
        PanelKey::new("index_weights_daily")
            .param("index", "399300.SZ")
            .param("start", 20200102)
            .param("end", 20200103)
    }

    #[test]
    fn key_hash_ignores_param_order() {
        let a = PanelKey::new("op").param("x", 1).param("y", 2);
        let b = PanelKey::new("op").param("y", 2).param("x", 1);
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
        let c = PanelKey::new("op").param("x", 1).param("y", 3);
        assert_ne!(a.hash().unwrap(), c.hash().unwrap());
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        assert!(cache.load::<f64>(&key()).unwrap().is_none());

        cache.write(&key(), &sample(), &FetchStatus::ok()).unwrap();
        let loaded = cache.load::<f64>(&key()).unwrap().unwrap();
        assert_eq!(loaded, sample());

        let meta = cache.get_meta(&key()).unwrap();
        assert_eq!(meta.n_dates, 2);
        assert_eq!(meta.n_entities, 2);
        assert_eq!(meta.first_date.as_deref(), Some("20200102"));
        assert_eq!(meta.status, FetchStatus::ok());
    }

    #[test]
    fn meta_keeps_build_status() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        let status = FetchStatus::error("0", "served by replica");
        cache.write(&key(), &sample(), &status).unwrap();
        assert_eq!(cache.get_meta(&key()).unwrap().status, status);
    }

    #[test]
    fn entries_are_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        cache.write(&key(), &sample(), &FetchStatus::ok()).unwrap();
        let other = sample().map(|v| v * 2.0);
        cache.write(&key(), &other, &FetchStatus::ok()).unwrap();
        assert_eq!(cache.load::<f64>(&key()).unwrap().unwrap(), sample());
    }

    #[test]
    fn corrupt_entry_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        cache.write(&key(), &sample(), &FetchStatus::ok()).unwrap();
        let hash = key().hash().unwrap();
        let path = dir
            .path()
            .join("index_weights_daily")
            .join(format!("{hash}.parquet"));
        fs::write(&path, b"not parquet").unwrap();

        assert!(cache.load::<f64>(&key()).unwrap().is_none());
        assert!(!path.exists());
        assert!(path.with_extension("parquet.quarantined").exists());
    }

    #[test]
    fn status_lists_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        assert!(cache.status().unwrap().is_empty());
        cache.write(&key(), &sample(), &FetchStatus::ok()).unwrap();
        cache
            .write(
                &PanelKey::new("adj_factor_daily").param("symbols", "A"),
                &sample(),
                &FetchStatus::ok(),
            )
            .unwrap();
        let status = cache.status().unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].key.operation, "adj_factor_daily");
    }
}
