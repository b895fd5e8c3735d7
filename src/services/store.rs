//! File persistence for the series cache and the results table.
//!
//! Files are replaced with write-to-temp-then-rename so readers never see a
//! partially written file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::types::{CacheEntry, ResultRow, ScoreReport};

/// Ticker → cache entry, ordered for stable output.
pub type CacheMap = BTreeMap<String, CacheEntry>;

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn temp_path(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    sibling_path(path, ".prev")
}

/// Write `bytes` next to `path` and return the temp file location.
fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf, PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(path, e))?;
    }
    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp).map_err(|e| PipelineError::persistence(&tmp, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PipelineError::persistence(&tmp, e)
        })?;
    Ok(tmp)
}

fn commit(tmp: &Path, path: &Path) -> Result<(), PipelineError> {
    fs::rename(tmp, path).map_err(|e| {
        let _ = fs::remove_file(tmp);
        PipelineError::persistence(path, e)
    })
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let tmp = write_temp(path, bytes)?;
    commit(&tmp, path)
}

/// Render reports as the results table.
pub fn results_csv(reports: &[ScoreReport]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if reports.is_empty() {
        writer.write_record([
            "ticker",
            "short_interest",
            "days_to_cover",
            "volume_spike",
            "price_change",
            "rsi",
            "score",
        ])?;
    }
    for report in reports {
        writer.serialize(ResultRow::from(report))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Reads and rewrites the cache and results files.
pub struct ResultStore {
    cache_file: PathBuf,
    results_file: PathBuf,
}

impl ResultStore {
    pub fn new(cache_file: impl Into<PathBuf>, results_file: impl Into<PathBuf>) -> Self {
        Self {
            cache_file: cache_file.into(),
            results_file: results_file.into(),
        }
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn results_file(&self) -> &Path {
        &self.results_file
    }

    /// Replace both files with this run's data.
    ///
    /// Both temp files are written before either is renamed into place, so a
    /// serialization or write error leaves the previous files untouched. The
    /// results table is committed first and rolled back from a `.prev` copy
    /// if the cache rename then fails, so the two files never disagree.
    pub fn persist(&self, cache: &CacheMap, reports: &[ScoreReport]) -> Result<(), PipelineError> {
        let cache_json = serde_json::to_vec_pretty(cache)
            .map_err(|e| PipelineError::persistence(&self.cache_file, e))?;
        let results = results_csv(reports)
            .map_err(|e| PipelineError::persistence(&self.results_file, e))?;

        let cache_tmp = write_temp(&self.cache_file, &cache_json)?;
        let results_tmp = match write_temp(&self.results_file, &results) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&cache_tmp);
                return Err(e);
            }
        };

        let backup = backup_path(&self.results_file);
        let had_results = self.results_file.exists();
        if had_results {
            if let Err(e) = fs::copy(&self.results_file, &backup) {
                let _ = fs::remove_file(&cache_tmp);
                let _ = fs::remove_file(&results_tmp);
                return Err(PipelineError::persistence(&backup, e));
            }
        }

        if let Err(e) = commit(&results_tmp, &self.results_file) {
            let _ = fs::remove_file(&cache_tmp);
            let _ = fs::remove_file(&backup);
            return Err(e);
        }
        if let Err(e) = commit(&cache_tmp, &self.cache_file) {
            let restored = if had_results {
                fs::rename(&backup, &self.results_file)
            } else {
                fs::remove_file(&self.results_file)
            };
            if let Err(restore_err) = restored {
                warn!(
                    "Failed to roll back {}: {}",
                    self.results_file.display(),
                    restore_err
                );
            }
            return Err(e);
        }
        if had_results {
            let _ = fs::remove_file(&backup);
        }

        debug!(
            "Persisted {} cache entries and {} result rows",
            cache.len(),
            reports.len()
        );
        Ok(())
    }

    /// Current results table. A missing file is an empty table.
    pub fn load_results(&self) -> Result<Vec<ResultRow>, PipelineError> {
        if !self.results_file.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.results_file)
            .map_err(|e| PipelineError::persistence(&self.results_file, e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<ResultRow>, _>>()
            .map_err(|e| PipelineError::persistence(&self.results_file, e))
    }

    /// Whole cache. A missing file is an empty cache.
    pub fn load_cache(&self) -> Result<CacheMap, PipelineError> {
        let content = match fs::read_to_string(&self.cache_file) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheMap::new()),
            Err(e) => return Err(PipelineError::persistence(&self.cache_file, e)),
        };
        serde_json::from_str(&content).map_err(|e| {
            warn!("Failed to parse cache file: {}", e);
            PipelineError::persistence(&self.cache_file, e)
        })
    }

    /// One ticker's cache entry, if present.
    pub fn cache_entry(&self, ticker: &str) -> Result<Option<CacheEntry>, PipelineError> {
        let mut cache = self.load_cache()?;
        let key = ticker.to_uppercase();
        Ok(cache.remove(&key))
    }
}
