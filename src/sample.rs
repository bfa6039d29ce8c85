//! Generating negative (random) interval sets for normalized positives.
//!
//! Negatives are the positives shuffled to random locations of the same
//! assembly, avoiding the positives themselves and the assembly gaps. Two
//! sets are produced per dataset: one with as many intervals as there are
//! positives and one with twice as many.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;
use tracing::warn;

use crate::assembly;
use crate::assembly::AssemblyContext;
use crate::assembly::Registry;
use crate::bed;
use crate::checkpoint;
use crate::checkpoint::Checkpoint;
use crate::dataset;
use crate::dataset::Dataset;
use crate::toolkit;
use crate::toolkit::ShuffleOptions;
use crate::toolkit::Toolkit;
use crate::validate;
use crate::IntervalSet;

/// The name of the step in completion markers.
const STEP: &str = "sample";

/// An error related to sampling.
#[derive(Debug)]
pub enum Error {
    /// The positives file does not exist.
    MissingInput(PathBuf),
    /// The positives file is not named `{name}.{assembly}.bed`.
    InvalidFileName(PathBuf),
    /// An I/O error.
    Io(io::Error),
    /// The positives could not be read.
    Bed(PathBuf, bed::Error),
    /// The assembly could not be loaded.
    Assembly(assembly::Error),
    /// A toolkit operation failed.
    Toolkit(toolkit::Error),
    /// The toolkit placed fewer intervals than it was given.
    Shortfall {
        /// The multiplicity of the set.
        multiplicity: Multiplicity,
        /// The number of intervals given to the toolkit.
        expected: usize,
        /// The number of intervals placed.
        actual: usize,
    },
    /// A generated set failed validation.
    Validate(validate::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingInput(path) => {
                write!(f, "positives file `{}` does not exist", path.display())
            }
            Error::InvalidFileName(path) => write!(
                f,
                "positives file `{}` is not named `{{name}}.{{assembly}}.bed`",
                path.display()
            ),
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Bed(path, err) => write!(f, "could not read `{}`: {err}", path.display()),
            Error::Assembly(err) => write!(f, "assembly error: {err}"),
            Error::Toolkit(err) => write!(f, "toolkit error: {err}"),
            Error::Shortfall {
                multiplicity,
                expected,
                actual,
            } => write!(
                f,
                "only {actual} of {expected} intervals could be placed for the {multiplicity} set"
            ),
            Error::Validate(err) => write!(f, "validation error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<assembly::Error> for Error {
    fn from(value: assembly::Error) -> Self {
        Error::Assembly(value)
    }
}

impl From<toolkit::Error> for Error {
    fn from(value: toolkit::Error) -> Self {
        Error::Toolkit(value)
    }
}

impl From<validate::Error> for Error {
    fn from(value: validate::Error) -> Self {
        Error::Validate(value)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// How many negatives to draw per positive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Multiplicity {
    /// One negative per positive.
    One,
    /// Two negatives per positive.
    Two,
}

impl Multiplicity {
    /// Every multiplicity, in the order the sets are generated.
    pub const ALL: [Multiplicity; 2] = [Multiplicity::One, Multiplicity::Two];

    /// The number of negatives per positive.
    pub fn factor(&self) -> usize {
        match self {
            Multiplicity::One => 1,
            Multiplicity::Two => 2,
        }
    }

    /// The intervals handed to the toolkit for placement.
    ///
    /// For [`Multiplicity::Two`], the whole set is repeated once so that
    /// every positive is placed twice.
    pub fn expand(&self, positives: &IntervalSet) -> IntervalSet {
        match self {
            Multiplicity::One => positives.clone(),
            Multiplicity::Two => positives.doubled(),
        }
    }

    /// The file the set is written to within the group directory.
    pub fn output(&self, dataset: &Dataset, group_dir: &Path) -> PathBuf {
        match self {
            Multiplicity::One => dataset.random(group_dir),
            Multiplicity::Two => dataset.random_2x(group_dir),
        }
    }
}

impl std::fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

/// Options for sampling.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// How intervals are placed.
    pub shuffle: ShuffleOptions,
    /// Whether to extract the sequences of the negatives.
    pub fasta: bool,
    /// Whether to recompute datasets that are already complete.
    pub force: bool,
}

/// The result of sampling one dataset on disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The negatives were already complete and were left alone.
    Skipped,
    /// The negatives were written.
    Written {
        /// The number of positives.
        positives: usize,
    },
}

/// Draws negatives with a [`Toolkit`].
#[derive(Debug)]
pub struct Sampler<T: Toolkit> {
    /// The toolkit that places intervals.
    toolkit: T,
    /// The options.
    config: Config,
}

impl<T: Toolkit> Sampler<T> {
    /// Creates a new [`Sampler`].
    pub fn new(toolkit: T, config: Config) -> Self {
        Self { toolkit, config }
    }

    /// Gets the options.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Draws one set of negatives for `positives`.
    ///
    /// The positives and the gaps of the assembly are excluded. Every
    /// negative keeps the length of the positive it was placed from.
    pub fn sample(
        &self,
        positives: &IntervalSet,
        assembly: &AssemblyContext,
        multiplicity: Multiplicity,
    ) -> Result<IntervalSet> {
        let mut exclusion = positives.clone();
        exclusion.extend_from(assembly.gaps());

        let input = multiplicity.expand(positives);
        let negatives = self
            .toolkit
            .shuffle(&input, &exclusion, assembly, &self.config.shuffle)?;

        if negatives.len() != input.len() {
            return Err(Error::Shortfall {
                multiplicity,
                expected: input.len(),
                actual: negatives.len(),
            });
        }

        Ok(negatives)
    }

    /// Validates and writes both negative sets next to a positives file.
    ///
    /// Nothing is written unless both sets satisfy every invariant.
    ///
    /// A dataset whose negatives are already complete is skipped unless
    /// [`Config::force`] is set.
    pub fn run(&self, positives_path: &Path, assembly: &AssemblyContext) -> Result<Outcome> {
        let dataset = positives_path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(Dataset::try_from_positives_file_name)
            .ok_or_else(|| Error::InvalidFileName(positives_path.to_path_buf()))?;

        let group_dir = match positives_path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::new(),
        };

        let mut outputs = Multiplicity::ALL
            .iter()
            .map(|multiplicity| multiplicity.output(&dataset, &group_dir))
            .collect::<Vec<_>>();

        if self.config.fasta {
            let siblings = outputs
                .iter()
                .map(|output| dataset::fasta_sibling(output))
                .collect::<Vec<_>>();
            outputs.extend(siblings);
        }

        let checkpoint = Checkpoint::new(STEP, outputs);
        if !self.config.force && checkpoint.is_complete() {
            warn!("already exists, so skipping: {}", positives_path.display());
            return Ok(Outcome::Skipped);
        }

        if !positives_path.exists() {
            return Err(Error::MissingInput(positives_path.to_path_buf()));
        }

        let positives = bed::read_path(positives_path)
            .map_err(|e| Error::Bed(positives_path.to_path_buf(), e))?;

        info!(
            "generating random samples for {}",
            positives_path.display()
        );

        if positives.is_empty() {
            warn!("no data for: {}", positives_path.display());
        }

        // Both sets are checked before either one is written.
        let mut drawn = Vec::with_capacity(Multiplicity::ALL.len());

        for multiplicity in Multiplicity::ALL {
            let output = multiplicity.output(&dataset, &group_dir);
            let negatives = self.sample(&positives, assembly, multiplicity)?;

            if !positives.is_empty() {
                validate::check(
                    (positives_path, &positives),
                    (&output, &negatives),
                    &self.toolkit,
                )?;
            }

            drawn.push((output, negatives));
        }

        for (output, negatives) in &drawn {
            checkpoint::write_intervals(output, negatives)?;
        }

        if self.config.fasta {
            for multiplicity in Multiplicity::ALL {
                let output = multiplicity.output(&dataset, &group_dir);
                checkpoint::commit(&dataset::fasta_sibling(&output), |staged| {
                    self.toolkit.getfasta(&output, assembly, staged)
                })?;
            }
        }

        checkpoint.complete()?;

        Ok(Outcome::Written {
            positives: positives.len(),
        })
    }

    /// Draws negatives for every positives file beneath `root`.
    ///
    /// Group directories are visited in sorted order, and so are the files
    /// within them. Sequence files, negative sets and anything not named
    /// like a positives file are passed over.
    pub fn run_all(&self, root: &Path, registry: &Registry) -> Result<Vec<(Dataset, Outcome)>> {
        let mut outcomes = Vec::new();

        for group_dir in dataset::sorted_subdirs(root)? {
            for path in dataset::sorted_files(&group_dir)? {
                let Some(dataset) = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(Dataset::try_from_positives_file_name)
                else {
                    continue;
                };

                let assembly = registry.get(dataset.assembly())?;
                let outcome = self.run(&path, &assembly)?;

                outcomes.push((dataset, outcome));
            }
        }

        Ok(outcomes)
    }
}
