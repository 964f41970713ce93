//! # JSON Log Projection
//!
//! Serves pre-projected OCEL logs stored as JSON files in the data
//! directory:
//!
//! ```json
//! {"object_types": {"order": [
//!     {"object_id": "o1", "events": [
//!         {"id": 1, "activity": "place order", "timestamp": 1700000000000}
//!     ]}
//! ]}}
//! ```
//!
//! File names are resolved strictly inside the data directory. Parsed logs
//! are kept in memory until the file changes on disk.

use flowsieve_core::{FlowError, LogProjection, ObjectType, ProjectedCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Why a log file name could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("'{0}' is outside the data directory")]
    Traversal(String),

    #[error("log file '{0}' not found")]
    Missing(String),
}

impl From<PathError> for FlowError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Traversal(_) => FlowError::InvalidInput(err.to_string()),
            PathError::Missing(_) => FlowError::NotFound(err.to_string()),
        }
    }
}

/// On-disk layout of a projected log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    pub object_types: BTreeMap<ObjectType, Vec<ProjectedCase>>,
}

impl LogFile {
    /// Read and parse a log file; events of every case are put in time order.
    pub fn read(path: &Path) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FlowError::IoError(format!("{}: {}", path.display(), e)))?;
        let mut log: Self = serde_json::from_str(&text).map_err(|e| {
            FlowError::DeserializationError(format!("{}: {}", path.display(), e))
        })?;
        for cases in log.object_types.values_mut() {
            for case in cases {
                case.events.sort_by_key(|event| event.timestamp);
            }
        }
        Ok(log)
    }
}

type CachedLog = (Option<SystemTime>, Arc<LogFile>);

/// `LogProjection` over the JSON logs of a data directory.
#[derive(Debug)]
pub struct JsonLogProjection {
    data_dir: PathBuf,
    parsed: Mutex<BTreeMap<PathBuf, CachedLog>>,
}

impl JsonLogProjection {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            parsed: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Reject names that could leave the data directory.
    pub fn check_name(ocel: &str) -> Result<(), PathError> {
        let path = Path::new(ocel);
        let plain = !ocel.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if plain {
            Ok(())
        } else {
            Err(PathError::Traversal(ocel.to_string()))
        }
    }

    /// Absolute path of the log `ocel`.
    pub fn resolve(&self, ocel: &str) -> Result<PathBuf, PathError> {
        Self::check_name(ocel)?;

        let candidate = self.data_dir.join(ocel);
        if !candidate.is_file() {
            return Err(PathError::Missing(ocel.to_string()));
        }

        // Symlinks may still point elsewhere.
        let root = self
            .data_dir
            .canonicalize()
            .map_err(|_| PathError::Missing(ocel.to_string()))?;
        let resolved = candidate
            .canonicalize()
            .map_err(|_| PathError::Missing(ocel.to_string()))?;
        if !resolved.starts_with(&root) {
            return Err(PathError::Traversal(ocel.to_string()));
        }
        Ok(resolved)
    }

    fn load(&self, ocel: &str) -> Result<Arc<LogFile>, FlowError> {
        let path = self.resolve(ocel)?;
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();

        let mut parsed = self.parsed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((stamp, log)) = parsed.get(&path) {
            if modified.is_some() && *stamp == modified {
                return Ok(Arc::clone(log));
            }
        }

        debug!(path = %path.display(), "parsing log file");
        let log = Arc::new(LogFile::read(&path)?);
        parsed.insert(path, (modified, Arc::clone(&log)));
        Ok(log)
    }
}

impl LogProjection for JsonLogProjection {
    fn object_types(&self, ocel: &str) -> Result<Vec<ObjectType>, FlowError> {
        Ok(self.load(ocel)?.object_types.keys().cloned().collect())
    }

    fn project_cases(
        &self,
        ocel: &str,
        object_type: &str,
    ) -> Result<Vec<ProjectedCase>, FlowError> {
        self.load(ocel)?
            .object_types
            .get(object_type)
            .cloned()
            .ok_or_else(|| {
                FlowError::NotFound(format!("object type '{}' in log '{}'", object_type, ocel))
            })
    }
}
