//! Resumable, all-or-nothing output files.
//!
//! Outputs are never written in place. Each one is written inside a
//! temporary directory next to its destination and renamed into place only
//! once complete, so an output that exists is always whole. A step that
//! writes several outputs additionally drops a hidden completion marker once
//! all of them are in place; [`Checkpoint::is_complete()`] requires both.

use std::fs::File;
use std::io::BufWriter;
use std::io::{self};
use std::path::Path;
use std::path::PathBuf;

use tempdir::TempDir;

use crate::bed;
use crate::IntervalSet;

/// The suffix of completion markers.
const MARKER_SUFFIX: &str = "done";

/// Writes a file by handing a temporary path to `write` and renaming the
/// result onto `destination` once `write` succeeds.
///
/// If `write` fails, nothing is left at `destination` (a previous file there
/// is untouched) and the temporary file is removed.
pub fn commit<F, E>(destination: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&Path) -> Result<(), E>,
    E: From<io::Error>,
{
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let file_name = destination
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no name"))?;

    let staging = TempDir::new_in(parent, ".staging")?;
    let staged = staging.path().join(file_name);

    write(&staged)?;
    std::fs::rename(&staged, destination)?;

    staging.close()?;
    Ok(())
}

/// Atomically writes intervals to a BED file.
pub fn write_intervals(destination: &Path, intervals: &IntervalSet) -> io::Result<()> {
    commit(destination, |staged| {
        bed::write(BufWriter::new(File::create(staged)?), intervals)
    })
}

/// The completion state of one step for one dataset.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    /// The outputs the step produces.
    outputs: Vec<PathBuf>,
    /// The marker written once every output is in place.
    marker: PathBuf,
}

impl Checkpoint {
    /// Creates a [`Checkpoint`] for the step `step` producing `outputs`.
    ///
    /// The marker is named after the first output and the step, e.g.
    /// `.ctcf.hg38.bed.sample.done` next to `ctcf.hg38.bed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    ///
    /// use peakset::checkpoint::Checkpoint;
    ///
    /// let checkpoint = Checkpoint::new("sample", vec![PathBuf::from("out/ctcf.hg38.random.bed")]);
    /// assert_eq!(
    ///     checkpoint.marker(),
    ///     PathBuf::from("out/.ctcf.hg38.random.bed.sample.done")
    /// );
    /// ```
    pub fn new(step: &str, outputs: Vec<PathBuf>) -> Self {
        let marker = match outputs.first() {
            Some(first) => {
                let name = first
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                first.with_file_name(format!(".{name}.{step}.{MARKER_SUFFIX}"))
            }
            None => PathBuf::from(format!(".{step}.{MARKER_SUFFIX}")),
        };

        Self { outputs, marker }
    }

    /// Gets the outputs.
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Gets the path of the completion marker.
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Whether any output of the step exists.
    pub fn is_started(&self) -> bool {
        self.outputs.iter().any(|output| output.exists())
    }

    /// Whether the step has finished: every output exists and so does the
    /// marker.
    pub fn is_complete(&self) -> bool {
        self.marker.exists() && self.outputs.iter().all(|output| output.exists())
    }

    /// Records the step as finished.
    pub fn complete(&self) -> io::Result<()> {
        commit(&self.marker, |staged| File::create(staged).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interval;

    #[test]
    fn test_commit_leaves_nothing_on_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("checkpoint")?;
        let destination = dir.path().join("out.bed");

        let result = commit(&destination, |staged| {
            std::fs::write(staged, "partial")?;
            Err(io::Error::other("tool failed"))
        });

        assert!(result.is_err());
        assert!(!destination.exists());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

        Ok(())
    }

    #[test]
    fn test_write_intervals() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("checkpoint")?;
        let destination = dir.path().join("out.bed");

        let set = IntervalSet::from(vec![Interval::try_new("chr1", 110, 120)?]);
        write_intervals(&destination, &set)?;

        assert_eq!(std::fs::read_to_string(&destination)?, "chr1\t110\t120\n");
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);

        Ok(())
    }

    #[test]
    fn test_checkpoint_requires_marker_and_outputs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("checkpoint")?;
        let first = dir.path().join("a.random.bed");
        let second = dir.path().join("a.random_2x.bed");

        let checkpoint = Checkpoint::new("sample", vec![first.clone(), second.clone()]);
        assert!(!checkpoint.is_started());
        assert!(!checkpoint.is_complete());

        std::fs::write(&first, "")?;
        assert!(checkpoint.is_started());
        assert!(!checkpoint.is_complete());

        std::fs::write(&second, "")?;
        assert!(!checkpoint.is_complete());

        checkpoint.complete()?;
        assert!(checkpoint.is_complete());
        assert_eq!(
            checkpoint.marker(),
            dir.path().join(".a.random.bed.sample.done")
        );

        std::fs::remove_file(&second)?;
        assert!(!checkpoint.is_complete());

        Ok(())
    }
}
