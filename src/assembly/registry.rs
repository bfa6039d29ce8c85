//! A lazily populated cache of [`AssemblyContext`]s.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::debug;

use crate::assembly::AssemblyContext;
use crate::assembly::Result;

/// Loads each assembly at most once and hands out shared, read-only
/// references to it.
#[derive(Debug)]
pub struct Registry {
    /// The directory holding `{assembly}.chrom.sizes` and `{assembly}.fa`.
    genome_dir: PathBuf,
    /// The directory holding `{assembly}.gap.txt`, if gaps are needed.
    gap_dir: Option<PathBuf>,
    /// The assemblies loaded so far.
    cache: Mutex<HashMap<String, Arc<AssemblyContext>>>,
}

impl Registry {
    /// Creates a new, empty [`Registry`].
    pub fn new(genome_dir: impl Into<PathBuf>, gap_dir: Option<PathBuf>) -> Self {
        Self {
            genome_dir: genome_dir.into(),
            gap_dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Gets the genome directory.
    pub fn genome_dir(&self) -> &Path {
        &self.genome_dir
    }

    /// Gets an assembly, loading it on first use.
    pub fn get(&self, id: &str) -> Result<Arc<AssemblyContext>> {
        // Entries are inserted whole, so a poisoned map is still consistent.
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(assembly) = cache.get(id) {
            return Ok(Arc::clone(assembly));
        }

        debug!("assembly: loading {id}");
        let assembly = Arc::new(AssemblyContext::load(
            id,
            &self.genome_dir,
            self.gap_dir.as_deref(),
        )?);

        cache.insert(id.to_owned(), Arc::clone(&assembly));
        Ok(assembly)
    }
}
