//! Genome assembly reference data: chromosome sizes and gap regions.
//!
//! Assembly files are located by naming convention:
//!
//! - `{genome_dir}/{assembly}.chrom.sizes`: one `contig<TAB>length` per line.
//! - `{genome_dir}/{assembly}.fa`: the assembly sequence, only needed for
//!   sequence extraction.
//! - `{gap_dir}/{assembly}.gap.txt`: gap regions as three-column intervals.
//!   The UCSC gap table layout, which prefixes each record with a numeric
//!   `bin` column, is accepted as well.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::{self};
use std::num::ParseIntError;
use std::path::Path;
use std::path::PathBuf;

use crate::interval;
use crate::interval::Contig;
use crate::interval::Position;
use crate::interval::FIELD_DELIMITER;
use crate::Interval;
use crate::IntervalSet;

pub mod registry;

pub use registry::Registry;

/// An error related to loading an assembly.
#[derive(Debug)]
pub enum Error {
    /// An I/O error while reading the named file.
    Io(PathBuf, io::Error),
    /// A chromosome size line did not have two fields.
    InvalidSizeLine(PathBuf, String),
    /// A chromosome size could not be parsed.
    InvalidSize(PathBuf, ParseIntError),
    /// A gap record could not be parsed.
    InvalidGap(PathBuf, interval::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(path, err) => write!(f, "i/o error reading {}: {err}", path.display()),
            Error::InvalidSizeLine(path, line) => write!(
                f,
                "invalid chromosome size line in {}: expected two fields, found `{line}`",
                path.display()
            ),
            Error::InvalidSize(path, err) => {
                write!(f, "invalid chromosome size in {}: {err}", path.display())
            }
            Error::InvalidGap(path, err) => {
                write!(f, "invalid gap record in {}: {err}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The path of the chromosome size table for an assembly.
pub fn sizes_path(genome_dir: &Path, assembly: &str) -> PathBuf {
    genome_dir.join(format!("{assembly}.chrom.sizes"))
}

/// The path of the sequence for an assembly.
pub fn fasta_path(genome_dir: &Path, assembly: &str) -> PathBuf {
    genome_dir.join(format!("{assembly}.fa"))
}

/// The path of the gap table for an assembly.
pub fn gaps_path(gap_dir: &Path, assembly: &str) -> PathBuf {
    gap_dir.join(format!("{assembly}.gap.txt"))
}

/// Chromosome lengths keyed by contig, in contig order.
pub type ChromSizes = BTreeMap<Contig, Position>;

/// Immutable reference data for one genome assembly.
#[derive(Debug)]
pub struct AssemblyContext {
    /// The assembly identifier (e.g., `hg38`).
    id: String,
    /// The path of the chromosome size table.
    sizes_path: PathBuf,
    /// The path of the assembly sequence.
    fasta_path: PathBuf,
    /// The chromosome sizes.
    chrom_sizes: ChromSizes,
    /// The gap regions.
    gaps: IntervalSet,
}

impl AssemblyContext {
    /// Loads an assembly from the conventional file locations.
    ///
    /// Without a `gap_dir`, the assembly has no gap regions.
    pub fn load(id: &str, genome_dir: &Path, gap_dir: Option<&Path>) -> Result<Self> {
        let sizes_path = sizes_path(genome_dir, id);
        let chrom_sizes = read_chrom_sizes(&sizes_path)?;

        let gaps = match gap_dir {
            Some(dir) => read_gaps(&gaps_path(dir, id))?,
            None => IntervalSet::new(),
        };

        Ok(Self {
            id: id.to_owned(),
            fasta_path: fasta_path(genome_dir, id),
            sizes_path,
            chrom_sizes,
            gaps,
        })
    }

    /// Creates an assembly from data already in memory.
    ///
    /// The paths are still recorded so that external tools can be pointed at
    /// them.
    pub fn from_parts(
        id: impl Into<String>,
        genome_dir: &Path,
        chrom_sizes: ChromSizes,
        gaps: IntervalSet,
    ) -> Self {
        let id = id.into();

        Self {
            sizes_path: sizes_path(genome_dir, &id),
            fasta_path: fasta_path(genome_dir, &id),
            id,
            chrom_sizes,
            gaps,
        }
    }

    /// Gets the assembly identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the path of the chromosome size table.
    pub fn sizes_path(&self) -> &Path {
        &self.sizes_path
    }

    /// Gets the path of the assembly sequence.
    pub fn fasta_path(&self) -> &Path {
        &self.fasta_path
    }

    /// Gets the chromosome sizes.
    pub fn chrom_sizes(&self) -> &ChromSizes {
        &self.chrom_sizes
    }

    /// Gets the gap regions.
    pub fn gaps(&self) -> &IntervalSet {
        &self.gaps
    }
}

/// Reads a chromosome size table.
pub fn read_chrom_sizes(path: &Path) -> Result<ChromSizes> {
    let file = File::open(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
    parse_chrom_sizes(BufReader::new(file), path)
}

/// Parses a chromosome size table. `path` is only used for error reporting.
fn parse_chrom_sizes<R: BufRead>(reader: R, path: &Path) -> Result<ChromSizes> {
    let mut sizes = ChromSizes::new();

    for result in reader.lines() {
        let line = result.map_err(|e| Error::Io(path.to_path_buf(), e))?;

        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(FIELD_DELIMITER);
        let (contig, size) = match (fields.next(), fields.next()) {
            (Some(contig), Some(size)) if !contig.is_empty() => (contig, size),
            _ => return Err(Error::InvalidSizeLine(path.to_path_buf(), line)),
        };

        let size = size
            .trim()
            .parse()
            .map_err(|e| Error::InvalidSize(path.to_path_buf(), e))?;

        sizes.insert(contig.to_owned(), size);
    }

    Ok(sizes)
}

/// Reads a gap table.
pub fn read_gaps(path: &Path) -> Result<IntervalSet> {
    let file = File::open(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
    parse_gaps(BufReader::new(file), path)
}

/// Parses a gap table. `path` is only used for error reporting.
fn parse_gaps<R: BufRead>(reader: R, path: &Path) -> Result<IntervalSet> {
    let mut gaps = IntervalSet::new();

    for result in reader.lines() {
        let line = result.map_err(|e| Error::Io(path.to_path_buf(), e))?;

        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let record = strip_bin_column(&line);
        let gap = record
            .parse::<Interval>()
            .map_err(|e| Error::InvalidGap(path.to_path_buf(), e))?;

        gaps.push(gap);
    }

    Ok(gaps)
}

/// Strips the leading `bin` column of a UCSC gap table record.
///
/// A record is taken to be in the UCSC layout when its first field is
/// numeric, its second is not, and at least three fields follow the first.
fn strip_bin_column(line: &str) -> &str {
    let is_numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    match line.split_once(FIELD_DELIMITER) {
        Some((first, rest))
            if is_numeric(first)
                && !rest.split(FIELD_DELIMITER).next().is_some_and(is_numeric)
                && rest.split(FIELD_DELIMITER).count() >= 3 =>
        {
            rest
        }
        _ => line,
    }
}
