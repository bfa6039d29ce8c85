//! The boundary to the genomic-interval toolkit.
//!
//! Every interval operation the pipeline needs from an external toolkit is a
//! method on [`Toolkit`]. Two implementations are provided:
//!
//! - [`Bedtools`] pipes intervals through the `bedtools` executable, one
//!   process per operation.
//! - [`Native`] performs the same operations in-process. It needs no external
//!   binary, which makes it the implementation used throughout the tests.

use std::io;
use std::path::Path;

use crate::assembly::AssemblyContext;
use crate::bed;
use crate::interval::Contig;
use crate::interval::Position;
use crate::Interval;
use crate::IntervalSet;

pub mod bedtools;
pub mod native;

pub use bedtools::Bedtools;
pub use native::Native;

/// The seed used for every shuffle so that negatives are reproducible.
pub const DEFAULT_SEED: u64 = 42;

/// The number of placement attempts per interval before a shuffle fails.
pub const DEFAULT_MAX_TRIES: u64 = 1_000_000;

/// An error related to a toolkit operation.
#[derive(Debug)]
pub enum Error {
    /// The external command could not be started.
    Spawn(String, io::Error),

    /// The external command exited unsuccessfully.
    Failed {
        /// The command line that was run.
        command: String,
        /// The exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Everything the process wrote to stderr.
        stderr: String,
    },

    /// The external command produced output that is not valid BED.
    InvalidOutput(String, bed::Error),

    /// An I/O error.
    Io(io::Error),

    /// An input BED file could not be read.
    Bed(bed::Error),

    /// An interval sits on a contig missing from the chromosome sizes.
    UnknownContig(Contig),

    /// An interval could not be placed within the retry budget.
    PlacementExhausted(Interval, u64),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Spawn(command, err) => write!(f, "could not run `{command}`: {err}"),
            Error::Failed {
                command,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "`{command}` failed with exit code {code}")?,
                    None => write!(f, "`{command}` was terminated by a signal")?,
                }

                match stderr.trim() {
                    "" => Ok(()),
                    stderr => write!(f, ": {stderr}"),
                }
            }
            Error::InvalidOutput(command, err) => {
                write!(f, "`{command}` produced invalid output: {err}")
            }
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Bed(err) => write!(f, "bed error: {err}"),
            Error::UnknownContig(contig) => {
                write!(f, "contig `{contig}` is not in the chromosome sizes")
            }
            Error::PlacementExhausted(interval, tries) => write!(
                f,
                "could not place an interval of length {} (from {}:{}-{}) after {tries} tries",
                interval.len(),
                interval.contig(),
                interval.start(),
                interval.end()
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Options controlling random placement of intervals.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShuffleOptions {
    /// The seed of the random number generator.
    pub seed: u64,
    /// The number of placement attempts per interval.
    pub max_tries: u64,
    /// Whether placed intervals must not overlap one another.
    pub no_overlap: bool,
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_tries: DEFAULT_MAX_TRIES,
            no_overlap: true,
        }
    }
}

/// The interval operations delegated to a genomic-interval toolkit.
pub trait Toolkit {
    /// Collapses overlapping and abutting intervals into maximal runs.
    ///
    /// The input must already be sorted.
    fn merge(&self, intervals: &IntervalSet) -> Result<IntervalSet>;

    /// Extends each interval by `margin` on both sides, clamped to the bounds
    /// of its contig.
    fn slop(
        &self,
        intervals: &IntervalSet,
        assembly: &AssemblyContext,
        margin: Position,
    ) -> Result<IntervalSet>;

    /// Moves each interval to a random location of the assembly that does not
    /// overlap `exclusion`, keeping its length.
    fn shuffle(
        &self,
        intervals: &IntervalSet,
        exclusion: &IntervalSet,
        assembly: &AssemblyContext,
        options: &ShuffleOptions,
    ) -> Result<IntervalSet>;

    /// Counts the intervals of `a` that overlap at least one interval of `b`.
    fn intersect_count(&self, a: &IntervalSet, b: &IntervalSet) -> Result<usize>;

    /// Writes the sequence of every interval in the BED file `intervals` to
    /// the FASTA file `output`.
    fn getfasta(&self, intervals: &Path, assembly: &AssemblyContext, output: &Path)
        -> Result<()>;
}

impl<T: Toolkit + ?Sized> Toolkit for &T {
    fn merge(&self, intervals: &IntervalSet) -> Result<IntervalSet> {
        (**self).merge(intervals)
    }

    fn slop(
        &self,
        intervals: &IntervalSet,
        assembly: &AssemblyContext,
        margin: Position,
    ) -> Result<IntervalSet> {
        (**self).slop(intervals, assembly, margin)
    }

    fn shuffle(
        &self,
        intervals: &IntervalSet,
        exclusion: &IntervalSet,
        assembly: &AssemblyContext,
        options: &ShuffleOptions,
    ) -> Result<IntervalSet> {
        (**self).shuffle(intervals, exclusion, assembly, options)
    }

    fn intersect_count(&self, a: &IntervalSet, b: &IntervalSet) -> Result<usize> {
        (**self).intersect_count(a, b)
    }

    fn getfasta(
        &self,
        intervals: &Path,
        assembly: &AssemblyContext,
        output: &Path,
    ) -> Result<()> {
        (**self).getfasta(intervals, assembly, output)
    }
}
