//! Dataset identities and the file naming conventions built upon them.
//!
//! A dataset is one group of peak calls (e.g., `ctcf`) on one assembly (e.g.,
//! `hg38`). Its stem is `{name}.{assembly}`, and every file derived from it
//! lives in a directory named after the group:
//!
//! ```text
//! {root}/{name}/{name}.{assembly}.bed             normalized positives
//! {root}/{name}/{name}.{assembly}.random.bed      1x negatives
//! {root}/{name}/{name}.{assembly}.random_2x.bed   2x negatives
//! ```
//!
//! Each `.bed` file may have a `.fa` sibling holding its sequences.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

/// The extension of interval files.
pub const BED_EXTENSION: &str = "bed";

/// The extension of sequence files.
pub const FASTA_EXTENSION: &str = "fa";

/// The infix marking negative sample files.
const RANDOM_INFIX: &str = "random";

/// Matches `{name}.{assembly}`, splitting on the last dot.
static STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.+)\.(?P<assembly>[^.]+)$").unwrap());

/// A group of peak calls on one assembly.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Dataset {
    /// The group name.
    name: String,
    /// The assembly identifier.
    assembly: String,
}

impl Dataset {
    /// Creates a new [`Dataset`].
    pub fn new(name: impl Into<String>, assembly: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assembly: assembly.into(),
        }
    }

    /// Parses a dataset from its stem, `{name}.{assembly}`.
    ///
    /// [`None`] is returned if the stem holds no dot.
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::dataset::Dataset;
    ///
    /// let dataset = Dataset::try_from_stem("ctcf.liver.hg38").unwrap();
    /// assert_eq!(dataset.name(), "ctcf.liver");
    /// assert_eq!(dataset.assembly(), "hg38");
    ///
    /// assert!(Dataset::try_from_stem("ctcf").is_none());
    /// ```
    pub fn try_from_stem(stem: &str) -> Option<Self> {
        let groups = STEM.captures(stem)?;

        Some(Self::new(
            groups.name("name")?.as_str(),
            groups.name("assembly")?.as_str(),
        ))
    }

    /// Parses a dataset from the file name of its normalized positives,
    /// `{name}.{assembly}.bed`.
    ///
    /// Negative sample files and anything that is not a `.bed` file yield
    /// [`None`].
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::dataset::Dataset;
    ///
    /// let dataset = Dataset::try_from_positives_file_name("ctcf.hg38.bed").unwrap();
    /// assert_eq!(dataset.stem(), "ctcf.hg38");
    ///
    /// assert!(Dataset::try_from_positives_file_name("ctcf.hg38.random.bed").is_none());
    /// assert!(Dataset::try_from_positives_file_name("ctcf.hg38.fa").is_none());
    /// ```
    pub fn try_from_positives_file_name(file_name: &str) -> Option<Self> {
        if file_name.starts_with('.') {
            return None;
        }

        let stem = file_name.strip_suffix(&format!(".{BED_EXTENSION}"))?;
        let dataset = Self::try_from_stem(stem)?;

        match dataset.assembly.starts_with(RANDOM_INFIX) {
            true => None,
            false => Some(dataset),
        }
    }

    /// Gets the group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the assembly identifier.
    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    /// Gets the stem, `{name}.{assembly}`.
    pub fn stem(&self) -> String {
        format!("{}.{}", self.name, self.assembly)
    }

    /// The directory of the group beneath `root`.
    pub fn group_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }

    /// The normalized positives file within the group directory.
    pub fn positives(&self, group_dir: &Path) -> PathBuf {
        group_dir.join(format!("{}.{BED_EXTENSION}", self.stem()))
    }

    /// The 1x negatives file within the group directory.
    pub fn random(&self, group_dir: &Path) -> PathBuf {
        group_dir.join(format!("{}.{RANDOM_INFIX}.{BED_EXTENSION}", self.stem()))
    }

    /// The 2x negatives file within the group directory.
    pub fn random_2x(&self, group_dir: &Path) -> PathBuf {
        group_dir.join(format!("{}.{RANDOM_INFIX}_2x.{BED_EXTENSION}", self.stem()))
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.assembly)
    }
}

/// The `.fa` sibling of a `.bed` file.
pub fn fasta_sibling(bed: &Path) -> PathBuf {
    bed.with_extension(FASTA_EXTENSION)
}

/// Lists the subdirectories of `dir`, sorted by name.
pub fn sorted_subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut subdirs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        }
    }

    subdirs.sort();
    Ok(subdirs)
}

/// Lists the files of `dir`, sorted by name, skipping hidden files.
pub fn sorted_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');

        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Collects the assemblies a group has files for.
///
/// Every file in `group_dir` named `{name}.{assembly}.…` contributes its
/// assembly. The result is sorted.
pub fn discover_assemblies(group_dir: &Path, name: &str) -> io::Result<BTreeSet<String>> {
    let prefix = format!("{name}.");
    let mut assemblies = BTreeSet::new();

    for path in sorted_files(group_dir)? {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        if let Some(assembly) = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.split('.').next())
            .filter(|assembly| !assembly.is_empty())
        {
            assemblies.insert(assembly.to_owned());
        }
    }

    Ok(assemblies)
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_paths() {
        let dataset = Dataset::new("ctcf", "mm10");
        let dir = dataset.group_dir(Path::new("/data/out"));

        assert_eq!(dir, PathBuf::from("/data/out/ctcf"));
        assert_eq!(
            dataset.positives(&dir),
            PathBuf::from("/data/out/ctcf/ctcf.mm10.bed")
        );
        assert_eq!(
            dataset.random(&dir),
            PathBuf::from("/data/out/ctcf/ctcf.mm10.random.bed")
        );
        assert_eq!(
            dataset.random_2x(&dir),
            PathBuf::from("/data/out/ctcf/ctcf.mm10.random_2x.bed")
        );
        assert_eq!(
            fasta_sibling(&dataset.random_2x(&dir)),
            PathBuf::from("/data/out/ctcf/ctcf.mm10.random_2x.fa")
        );
    }

    #[test]
    fn test_positives_file_names() {
        assert!(Dataset::try_from_positives_file_name("ctcf.mm10.random_2x.bed").is_none());
        assert!(Dataset::try_from_positives_file_name(".ctcf.mm10.bed.normalize.done").is_none());
        assert!(Dataset::try_from_positives_file_name("ctcf.bed").is_none());
        assert_eq!(
            Dataset::try_from_positives_file_name("ctcf.mm10.bed"),
            Some(Dataset::new("ctcf", "mm10"))
        );
    }

    #[test]
    fn test_discover_assemblies() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("dataset")?;

        for name in [
            "ctcf.mm10.fa",
            "ctcf.mm10.random.fa",
            "ctcf.hg38.fa",
            "ctcf.ce11.random_2x.fa",
            ".ctcf.rn6.bed.normalize.done",
            "other.dm6.fa",
        ] {
            std::fs::write(dir.path().join(name), "")?;
        }

        let assemblies = discover_assemblies(dir.path(), "ctcf")?;
        assert_eq!(
            assemblies.into_iter().collect::<Vec<_>>(),
            vec!["ce11", "hg38", "mm10"]
        );

        Ok(())
    }
}
