//! Immutable, shared dataset backing a stream.
//!
//! The dataset is loaded once before the server accepts connections and is
//! then shared read-only by every session. Cloning a [`Dataset`] only bumps a
//! reference count.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::de::DeserializeOwned;
use tracing::info;

/// The bundled countries resource.
pub const EMBEDDED_COUNTRIES: &str = include_str!("../data/countries.json");

/// Error types for dataset loading.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {}: {}", .0.display(), .1)]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse dataset {0}: {1}")]
    Parse(DatasetSource, serde_json::Error),

    #[error("Dataset must contain at least one record")]
    Empty,
}

/// Where a dataset is loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatasetSource {
    /// The resource compiled into the binary
    #[default]
    Embedded,
    /// A JSON array on disk
    File(PathBuf),
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::Embedded => write!(f, "<embedded countries.json>"),
            DatasetSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<Option<PathBuf>> for DatasetSource {
    fn from(path: Option<PathBuf>) -> Self {
        path.map(DatasetSource::File).unwrap_or_default()
    }
}

/// An ordered, non-empty, read-only sequence of records.
pub struct Dataset<R> {
    records: Arc<[R]>,
}

impl<R> Clone for Dataset<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Dataset<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("len", &self.records.len())
            .finish()
    }
}

impl<R> Dataset<R> {
    /// Build a dataset from records. An empty dataset is rejected.
    pub fn from_records(records: Vec<R>) -> Result<Self, DatasetError> {
        if records.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(Self {
            records: records.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    /// The record served for a tick: `records[tick mod len]`.
    pub fn cyclic(&self, tick: u64) -> &R {
        // len >= 1 is guaranteed at construction
        let index = tick % self.records.len() as u64;
        &self.records[index as usize]
    }

    /// The full dataset, in order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }
}

impl<R: DeserializeOwned> Dataset<R> {
    /// Parse a JSON array of records.
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        Self::from_json_slice(json.as_bytes())
    }

    /// Parse a JSON array of records from raw bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DatasetError> {
        Self::parse(bytes, &DatasetSource::Embedded)
    }

    fn parse(bytes: &[u8], source: &DatasetSource) -> Result<Self, DatasetError> {
        let records: Vec<R> = serde_json::from_slice(bytes)
            .map_err(|e| DatasetError::Parse(source.clone(), e))?;
        Self::from_records(records)
    }

    /// Load the dataset from its source.
    pub fn load(source: &DatasetSource) -> Result<Self, DatasetError> {
        let dataset = match source {
            DatasetSource::Embedded => {
                Self::parse(EMBEDDED_COUNTRIES.as_bytes(), source)?
            }
            DatasetSource::File(path) => Self::load_file(path)?,
        };
        info!(source = %source, records = dataset.len(), "Loaded dataset");
        Ok(dataset)
    }

    fn load_file(path: &Path) -> Result<Self, DatasetError> {
        let bytes =
            std::fs::read(path).map_err(|e| DatasetError::Read(path.to_path_buf(), e))?;
        Self::parse(&bytes, &DatasetSource::File(path.to_path_buf()))
    }
}

impl<'a, R> IntoIterator for &'a Dataset<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
