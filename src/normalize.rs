//! Turning raw peak calls into fixed-width positive intervals.
//!
//! For every dataset, all raw files are concatenated, sorted, and merged so
//! that overlapping or abutting peaks collapse into one interval. The merged
//! intervals are clamped to their contigs and then windowed down to a uniform
//! length around their centers. Intervals that are not strictly wider than the
//! window are dropped (see [`Interval::window()`](crate::Interval::window)).

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
use crate::interval::Position;
use crate::toolkit;
use crate::toolkit::Toolkit;
use crate::validate;
use crate::IntervalSet;

/// The name of the step in completion markers.
const STEP: &str = "normalize";

/// The default uniform length of positive intervals.
pub const DEFAULT_LENGTH: Position = 1_000;

/// An error related to normalization.
#[derive(Debug)]
pub enum Error {
    /// A raw directory is not named `{name}.{assembly}`.
    InvalidGroup(PathBuf),
    /// A dataset has no raw files.
    MissingInput(String),
    /// An I/O error.
    Io(io::Error),
    /// A raw file could not be read.
    Bed(bed::Error),
    /// The assembly could not be loaded.
    Assembly(assembly::Error),
    /// A toolkit operation failed.
    Toolkit(toolkit::Error),
    /// The positives about to be written failed validation.
    Validate(validate::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidGroup(path) => write!(
                f,
                "raw directory `{}` is not named `{{name}}.{{assembly}}`",
                path.display()
            ),
            Error::MissingInput(dataset) => write!(f, "no raw files for dataset `{dataset}`"),
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Bed(err) => write!(f, "bed error: {err}"),
            Error::Assembly(err) => write!(f, "assembly error: {err}"),
            Error::Toolkit(err) => write!(f, "toolkit error: {err}"),
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

impl From<bed::Error> for Error {
    fn from(value: bed::Error) -> Self {
        Error::Bed(value)
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

/// Options for normalization.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The uniform length of every positive interval.
    pub length: Position,
    /// Whether to extract the sequences of the positives.
    pub fasta: bool,
    /// Whether to recompute datasets that are already complete.
    pub force: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            fasta: false,
            force: false,
        }
    }
}

/// How much a dataset shrank while being normalized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Report {
    /// The number of merged intervals.
    input: usize,
    /// The number of retained windows.
    output: usize,
}

impl Report {
    /// Gets the number of merged intervals.
    pub fn input(&self) -> usize {
        self.input
    }

    /// Gets the number of retained windows.
    pub fn output(&self) -> usize {
        self.output
    }

    /// The share of merged intervals that were dropped, as a percentage.
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::normalize::Report;
    ///
    /// assert_eq!(Report::new(8, 6).percent_dropped(), 25.0);
    /// assert_eq!(Report::new(0, 0).percent_dropped(), 0.0);
    /// ```
    pub fn percent_dropped(&self) -> f64 {
        if self.input == 0 {
            return 0.0;
        }

        (self.input - self.output) as f64 / self.input as f64 * 100.0
    }

    /// Creates a new [`Report`].
    pub fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }
}

/// Renders a count with comma thousands separators.
fn grouped(count: usize) -> String {
    let digits = count.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(digit);
    }

    result
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{:>7} -> #{:>7} (-{:.2}%)",
            grouped(self.input),
            grouped(self.output),
            self.percent_dropped()
        )
    }
}

/// The positives of one dataset.
#[derive(Clone, Debug)]
pub struct NormalizedDataset {
    /// The assembly the positives sit upon.
    assembly: String,
    /// The windowed positives, in canonical order.
    positives: IntervalSet,
    /// The length of every positive.
    uniform_length: Position,
    /// The shrinkage from merged intervals to positives.
    report: Report,
}

impl NormalizedDataset {
    /// Gets the assembly identifier.
    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    /// Gets the positives.
    pub fn positives(&self) -> &IntervalSet {
        &self.positives
    }

    /// Gets the length of every positive.
    pub fn uniform_length(&self) -> Position {
        self.uniform_length
    }

    /// Gets the shrinkage report.
    pub fn report(&self) -> Report {
        self.report
    }
}

/// The result of normalizing one dataset on disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The dataset was already complete and was left alone.
    Skipped,
    /// The dataset was written.
    Written(Report),
}

/// Fails unless every positive of `normalized` has its uniform length.
fn check_positives(destination: &Path, normalized: &NormalizedDataset) -> Result<()> {
    let positives = normalized.positives();

    let uniform = validate::check_uniform_length(positives)
        && positives
            .iter()
            .all(|interval| interval.len() == normalized.uniform_length);

    if !uniform {
        return Err(Error::Validate(validate::Error::Violation(
            destination.to_path_buf(),
            validate::Invariant::UniformLength,
        )));
    }

    Ok(())
}

/// Windows every interval to `length`, dropping those that cannot be.
pub fn window_all(intervals: &IntervalSet, length: Position) -> IntervalSet {
    intervals
        .iter()
        .filter_map(|interval| interval.window(length))
        .collect()
}

/// Normalizes raw peak calls with a [`Toolkit`].
#[derive(Debug)]
pub struct Normalizer<T: Toolkit> {
    /// The toolkit that merges and clamps.
    toolkit: T,
    /// The options.
    config: Config,
}

impl<T: Toolkit> Normalizer<T> {
    /// Creates a new [`Normalizer`].
    pub fn new(toolkit: T, config: Config) -> Self {
        Self { toolkit, config }
    }

    /// Gets the options.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Normalizes raw intervals in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use std::path::Path;
    ///
    /// use peakset::assembly::AssemblyContext;
    /// use peakset::normalize::Config;
    /// use peakset::normalize::Normalizer;
    /// use peakset::toolkit::Native;
    /// use peakset::Interval;
    /// use peakset::IntervalSet;
    ///
    /// let sizes = BTreeMap::from([(String::from("chr1"), 1_000)]);
    /// let assembly = AssemblyContext::from_parts("hg38", Path::new("."), sizes, IntervalSet::new());
    ///
    /// let config = Config {
    ///     length: 10,
    ///     ..Default::default()
    /// };
    /// let normalizer = Normalizer::new(Native, config);
    ///
    /// let raw = IntervalSet::from(vec![Interval::try_new("chr1", 100, 130)?]);
    /// let normalized = normalizer.normalize(raw, &assembly)?;
    ///
    /// assert_eq!(
    ///     normalized.positives().iter().collect::<Vec<_>>(),
    ///     vec![&Interval::try_new("chr1", 110, 120)?]
    /// );
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn normalize(
        &self,
        mut raw: IntervalSet,
        assembly: &AssemblyContext,
    ) -> Result<NormalizedDataset> {
        raw.sort();

        let merged = self.toolkit.merge(&raw)?;
        let clamped = self.toolkit.slop(&merged, assembly, 0)?;
        let positives = window_all(&clamped, self.config.length);

        Ok(NormalizedDataset {
            assembly: assembly.id().to_owned(),
            report: Report::new(clamped.len(), positives.len()),
            uniform_length: self.config.length,
            positives,
        })
    }

    /// Normalizes the raw files of one dataset into its positives file
    /// beneath `out_root`.
    ///
    /// A dataset that is already complete is skipped unless
    /// [`Config::force`] is set.
    pub fn run(
        &self,
        dataset: &Dataset,
        raw_files: &[PathBuf],
        assembly: &AssemblyContext,
        out_root: &Path,
    ) -> Result<Outcome> {
        let group_dir = dataset.group_dir(out_root);
        let destination = dataset.positives(&group_dir);

        let mut outputs = vec![destination.clone()];
        if self.config.fasta {
            outputs.push(dataset::fasta_sibling(&destination));
        }

        let checkpoint = Checkpoint::new(STEP, outputs);
        if !self.config.force && checkpoint.is_complete() {
            warn!("already exists, so skipping: {}", destination.display());
            return Ok(Outcome::Skipped);
        }

        if raw_files.is_empty() {
            return Err(Error::MissingInput(dataset.stem()));
        }

        std::fs::create_dir_all(&group_dir)?;

        let raw = bed::read_paths(raw_files.iter().map(PathBuf::as_path))?;
        let normalized = self.normalize(raw, assembly)?;
        check_positives(&destination, &normalized)?;

        checkpoint::write_intervals(&destination, normalized.positives())?;

        if self.config.fasta {
            checkpoint::commit(&dataset::fasta_sibling(&destination), |staged| {
                self.toolkit.getfasta(&destination, assembly, staged)
            })?;
        }

        checkpoint.complete()?;

        let stem = dataset.stem();
        let report = normalized.report();
        info!("normalized {stem:<36} {report}");

        Ok(Outcome::Written(report))
    }

    /// Normalizes every raw directory of `raw_root`, in sorted order.
    ///
    /// Each directory is named `{name}.{assembly}` and holds the raw files of
    /// one dataset. The first failure aborts the batch; datasets completed
    /// before it stay complete.
    pub fn run_all(
        &self,
        raw_root: &Path,
        out_root: &Path,
        registry: &Registry,
    ) -> Result<Vec<(Dataset, Outcome)>> {
        let mut outcomes = Vec::new();

        for raw_dir in dataset::sorted_subdirs(raw_root)? {
            let dataset = raw_dir
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(Dataset::try_from_stem)
                .ok_or_else(|| Error::InvalidGroup(raw_dir.clone()))?;

            let raw_files = dataset::sorted_files(&raw_dir)?;

            let assembly = registry.get(dataset.assembly())?;
            let outcome = self.run(&dataset, &raw_files, &assembly, out_root)?;

            outcomes.push((dataset, outcome));
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempdir::TempDir;

    use super::*;
    use crate::toolkit::Native;
    use crate::Interval;

    fn assembly(dir: &Path) -> AssemblyContext {
        let sizes = BTreeMap::from([
            (String::from("chr1"), 10_000),
            (String::from("chr2"), 500),
        ]);
        AssemblyContext::from_parts("hg38", dir, sizes, IntervalSet::new())
    }

    fn config(length: Position) -> Config {
        Config {
            length,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_merges_and_windows() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let dir = TempDir::new("normalize")?;
        let normalizer = Normalizer::new(Native, config(10));

        let raw = IntervalSet::from(vec![
            Interval::try_new("chr1", 120, 135)?,
            Interval::try_new("chr1", 100, 120)?,
            Interval::try_new("chr1", 200, 210)?,
            Interval::try_new("chr2", 480, 600)?,
        ]);

        let normalized = normalizer.normalize(raw, &assembly(dir.path()))?;

        // `chr1 100 135` windows to 112-122, `chr1 200 210` is exactly as wide
        // as the window and `chr2` is clamped to 480-500 first.
        assert_eq!(
            normalized.positives().iter().cloned().collect::<Vec<_>>(),
            vec![
                Interval::try_new("chr1", 112, 122)?,
                Interval::try_new("chr2", 485, 495)?,
            ]
        );
        assert!(normalized
            .positives()
            .iter()
            .all(|interval| interval.len() == 10));
        assert_eq!(normalized.report(), Report::new(3, 2));
        assert_eq!(normalized.uniform_length(), 10);
        assert_eq!(normalized.assembly(), "hg38");

        Ok(())
    }

    #[test]
    fn test_report_display() {
        assert_eq!(
            Report::new(1_000, 750).to_string(),
            "#  1,000 -> #    750 (-25.00%)"
        );
        assert_eq!(
            Report::new(1_234_567, 12).to_string(),
            "#1,234,567 -> #     12 (-100.00%)"
        );
    }

    #[test]
    fn test_check_positives() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let destination = Path::new("ctcf.hg38.bed");
        let mut normalized = NormalizedDataset {
            assembly: String::from("hg38"),
            positives: IntervalSet::from(vec![
                Interval::try_new("chr1", 0, 100)?,
                Interval::try_new("chr1", 500, 600)?,
            ]),
            uniform_length: 100,
            report: Report::new(2, 2),
        };
        check_positives(destination, &normalized)?;

        normalized.uniform_length = 50;
        let err = check_positives(destination, &normalized).unwrap_err();
        assert!(matches!(
            err,
            Error::Validate(validate::Error::Violation(_, validate::Invariant::UniformLength))
        ));

        normalized.positives = IntervalSet::from(vec![
            Interval::try_new("chr1", 0, 50)?,
            Interval::try_new("chr1", 500, 600)?,
        ]);
        assert!(check_positives(destination, &normalized).is_err());

        Ok(())
    }

    #[test]
    fn test_run_writes_then_skips() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("normalize")?;
        let raw_dir = dir.path().join("raw").join("ctcf.hg38");
        std::fs::create_dir_all(&raw_dir)?;
        std::fs::write(raw_dir.join("a.bed"), "chr1\t100\t130\tpeak\t10\n")?;
        std::fs::write(raw_dir.join("b.bed"), "chr1\t1000\t1040\tpeak\t7\n")?;

        let out = dir.path().join("out");
        let assembly = assembly(dir.path());
        let dataset = Dataset::new("ctcf", "hg38");
        let raw_files = dataset::sorted_files(&raw_dir)?;

        let normalizer = Normalizer::new(Native, config(10));
        let outcome = normalizer.run(&dataset, &raw_files, &assembly, &out)?;
        assert_eq!(outcome, Outcome::Written(Report::new(2, 2)));

        let destination = out.join("ctcf").join("ctcf.hg38.bed");
        let first = std::fs::read_to_string(&destination)?;
        assert_eq!(first, "chr1\t110\t120\nchr1\t1015\t1025\n");

        let outcome = normalizer.run(&dataset, &raw_files, &assembly, &out)?;
        assert_eq!(outcome, Outcome::Skipped);

        let forced = Normalizer::new(
            Native,
            Config {
                force: true,
                ..config(10)
            },
        );
        forced.run(&dataset, &raw_files, &assembly, &out)?;
        assert_eq!(std::fs::read_to_string(&destination)?, first);

        Ok(())
    }

    #[test]
    fn test_run_without_raw_files() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("normalize")?;
        let normalizer = Normalizer::new(Native, config(10));

        let err = normalizer
            .run(
                &Dataset::new("ctcf", "hg38"),
                &[],
                &assembly(dir.path()),
                dir.path(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));

        Ok(())
    }

    #[test]
    fn test_run_all() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("normalize")?;
        let genome = dir.path().join("genome");
        std::fs::create_dir_all(&genome)?;
        std::fs::write(genome.join("hg38.chrom.sizes"), "chr1\t10000\n")?;
        std::fs::write(genome.join("mm10.chrom.sizes"), "chr1\t10000\n")?;

        let raw = dir.path().join("raw");
        for (group, contents) in [
            ("ctcf.mm10", "chr1\t100\t130\n"),
            ("ctcf.hg38", "chr1\t200\t240\n"),
        ] {
            std::fs::create_dir_all(raw.join(group))?;
            std::fs::write(raw.join(group).join("peaks.bed"), contents)?;
        }

        let out = dir.path().join("out");
        let registry = Registry::new(&genome, None);
        let outcomes = Normalizer::new(Native, config(10)).run_all(&raw, &out, &registry)?;

        let datasets = outcomes
            .iter()
            .map(|(dataset, _)| dataset.stem())
            .collect::<Vec<_>>();
        assert_eq!(datasets, vec!["ctcf.hg38", "ctcf.mm10"]);

        assert_eq!(
            std::fs::read_to_string(out.join("ctcf").join("ctcf.hg38.bed"))?,
            "chr1\t215\t225\n"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("ctcf").join("ctcf.mm10.bed"))?,
            "chr1\t110\t120\n"
        );

        Ok(())
    }
}
