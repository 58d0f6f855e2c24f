//! Durable storage for winning genomes, keyed by location name.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::schema::GenomeData;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed genome file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid location name: {0:?}")]
    InvalidLocation(String),
}

/// Where a population reads and writes its genomes.
///
/// There is no locking: when two populations store the same location, the
/// last write wins.
pub trait GenomeStore {
    /// Genomes stored for a location, empty if none were.
    fn load(&self, location: &str) -> Result<Vec<GenomeData>, StoreError>;

    /// Replace the genomes stored for a location.
    fn store(&mut self, location: &str, genomes: &[GenomeData]) -> Result<(), StoreError>;
}

/// In-memory store that counts writes.
#[derive(Debug, Default)]
pub struct MemoryGenomeStore {
    locations: HashMap<String, Vec<GenomeData>>,
    writes: usize,
}

impl MemoryGenomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a location with genomes.
    pub fn with_location(mut self, location: &str, genomes: Vec<GenomeData>) -> Self {
        self.locations.insert(location.to_string(), genomes);
        self
    }

    /// Number of calls to [`GenomeStore::store`].
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn get(&self, location: &str) -> Option<&[GenomeData]> {
        self.locations.get(location).map(Vec::as_slice)
    }
}

impl GenomeStore for MemoryGenomeStore {
    fn load(&self, location: &str) -> Result<Vec<GenomeData>, StoreError> {
        Ok(self.locations.get(location).cloned().unwrap_or_default())
    }

    fn store(&mut self, location: &str, genomes: &[GenomeData]) -> Result<(), StoreError> {
        self.locations.insert(location.to_string(), genomes.to_vec());
        self.writes += 1;
        Ok(())
    }
}

/// One JSON file per location in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryGenomeStore {
    dir: PathBuf,
}

impl DirectoryGenomeStore {
    /// Create a store, creating its directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, location: &str) -> Result<PathBuf, StoreError> {
        let valid = !location.is_empty()
            && location
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !location.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidLocation(location.to_string()));
        }
        Ok(self.dir.join(format!("{location}.json")))
    }
}

impl GenomeStore for DirectoryGenomeStore {
    fn load(&self, location: &str) -> Result<Vec<GenomeData>, StoreError> {
        let path = self.path(location)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    fn store(&mut self, location: &str, genomes: &[GenomeData]) -> Result<(), StoreError> {
        let path = self.path(location)?;
        let json = serde_json::to_string_pretty(genomes)?;
        fs::write(&path, json)?;
        debug!("stored {} genomes in {}", genomes.len(), path.display());
        Ok(())
    }
}
