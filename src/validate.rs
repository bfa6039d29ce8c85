//! Checks that a randomized set is fit to serve as negatives for its
//! positives.
//!
//! Two properties are checked:
//!
//! - every interval of a file has the same length, and
//! - no randomized interval shares a position with a positive one.
//!
//! Overlap is checked in-process and then confirmed with the toolkit's
//! intersect operation.

use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use crate::bed;
use crate::toolkit;
use crate::toolkit::Toolkit;
use crate::IntervalSet;

/// A property a pair of files must satisfy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Invariant {
    /// Every interval of the file has the same length.
    UniformLength,
    /// No interval of the file overlaps the original.
    NoOverlap,
}

impl std::fmt::Display for Invariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invariant::UniformLength => write!(f, "all regions have the same length"),
            Invariant::NoOverlap => write!(f, "no region overlaps the original"),
        }
    }
}

/// An error related to validation.
#[derive(Debug)]
pub enum Error {
    /// A file could not be read.
    Bed(PathBuf, bed::Error),
    /// The toolkit's intersect operation failed.
    Toolkit(toolkit::Error),
    /// A file violates an invariant.
    Violation(PathBuf, Invariant),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Bed(path, err) => write!(f, "could not read `{}`: {err}", path.display()),
            Error::Toolkit(err) => write!(f, "toolkit error: {err}"),
            Error::Violation(path, invariant) => write!(
                f,
                "invariant violated in `{}`: {invariant}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<toolkit::Error> for Error {
    fn from(value: toolkit::Error) -> Self {
        Error::Toolkit(value)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The result of a successful validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The original file is absent or empty, so there was nothing to check.
    NoData,
    /// Every invariant holds.
    Passed,
}

/// Whether every interval shares exactly one length.
///
/// An empty set has no length at all and fails the check.
///
/// # Examples
///
/// ```
/// use peakset::validate::check_uniform_length;
/// use peakset::Interval;
/// use peakset::IntervalSet;
///
/// let set = IntervalSet::from(vec![
///     Interval::try_new("chr1", 0, 10)?,
///     Interval::try_new("chr2", 50, 60)?,
/// ]);
/// assert!(check_uniform_length(&set));
///
/// let set = IntervalSet::from(vec![
///     Interval::try_new("chr1", 0, 10)?,
///     Interval::try_new("chr2", 50, 61)?,
/// ]);
/// assert!(!check_uniform_length(&set));
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn check_uniform_length(intervals: &IntervalSet) -> bool {
    intervals.uniform_length().is_some()
}

/// Whether no interval of `a` shares a position with an interval of `b` on
/// the same contig.
pub fn check_no_overlap(a: &IntervalSet, b: &IntervalSet) -> bool {
    let index = b.index();
    !a.iter().any(|interval| index.overlaps_interval(interval))
}

/// Checks a randomized set against its original in memory.
///
/// The paths only name the sets in errors.
pub fn check<T: Toolkit + ?Sized>(
    original: (&Path, &IntervalSet),
    randomized: (&Path, &IntervalSet),
    toolkit: &T,
) -> Result<()> {
    let (original_path, original) = original;
    let (randomized_path, randomized) = randomized;

    if !check_uniform_length(original) {
        return Err(Error::Violation(
            original_path.to_path_buf(),
            Invariant::UniformLength,
        ));
    }

    if !check_uniform_length(randomized) {
        return Err(Error::Violation(
            randomized_path.to_path_buf(),
            Invariant::UniformLength,
        ));
    }

    if !check_no_overlap(original, randomized) || toolkit.intersect_count(original, randomized)? > 0
    {
        return Err(Error::Violation(
            randomized_path.to_path_buf(),
            Invariant::NoOverlap,
        ));
    }

    Ok(())
}

/// Checks a randomized file against its original file.
///
/// If the original file does not exist (or holds no records), "no data" is
/// reported and the check succeeds. A missing randomized file is an error.
pub fn validate<T: Toolkit + ?Sized>(
    original: &Path,
    randomized: &Path,
    toolkit: &T,
) -> Result<Outcome> {
    if !original.exists() {
        warn!("no data for: {}", original.display());
        return Ok(Outcome::NoData);
    }

    let positives = bed::read_path(original).map_err(|e| Error::Bed(original.into(), e))?;

    if positives.is_empty() {
        warn!("no data for: {}", original.display());
        return Ok(Outcome::NoData);
    }

    let negatives = bed::read_path(randomized).map_err(|e| Error::Bed(randomized.into(), e))?;

    check((original, &positives), (randomized, &negatives), toolkit)?;
    debug!(
        "validated {} against {}",
        randomized.display(),
        original.display()
    );

    Ok(Outcome::Passed)
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::toolkit::Native;
    use crate::Interval;

    fn set(intervals: &[(&str, u64, u64)]) -> IntervalSet {
        intervals
            .iter()
            .map(|(contig, start, end)| Interval::try_new(*contig, *start, *end))
            .collect::<std::result::Result<IntervalSet, _>>()
            .unwrap()
    }

    #[test]
    fn test_check_no_overlap() {
        let positives = set(&[("chr1", 100, 110), ("chr2", 0, 10)]);

        assert!(check_no_overlap(&positives, &set(&[("chr1", 110, 120)])));
        assert!(check_no_overlap(&positives, &set(&[("chr3", 100, 110)])));
        assert!(!check_no_overlap(&positives, &set(&[("chr1", 109, 119)])));
        assert!(check_no_overlap(&positives, &IntervalSet::new()));
    }

    #[test]
    fn test_empty_set_has_no_uniform_length() {
        assert!(!check_uniform_length(&IntervalSet::new()));
    }

    #[test]
    fn test_validate_without_original() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("validate")?;
        let original = dir.path().join("missing.bed");
        let randomized = dir.path().join("missing.random.bed");

        assert_eq!(validate(&original, &randomized, &Native)?, Outcome::NoData);

        std::fs::write(&original, "")?;
        assert_eq!(validate(&original, &randomized, &Native)?, Outcome::NoData);

        Ok(())
    }

    #[test]
    fn test_validate_files() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("validate")?;
        let original = dir.path().join("a.bed");
        let randomized = dir.path().join("a.random.bed");

        std::fs::write(&original, "chr1\t100\t110\nchr1\t200\t210\n")?;

        std::fs::write(&randomized, "chr1\t110\t120\nchr2\t0\t10\n")?;
        assert_eq!(validate(&original, &randomized, &Native)?, Outcome::Passed);

        std::fs::write(&randomized, "chr1\t205\t215\nchr2\t0\t10\n")?;
        let err = validate(&original, &randomized, &Native).unwrap_err();
        assert!(matches!(err, Error::Violation(ref path, Invariant::NoOverlap) if path == &randomized));

        std::fs::write(&randomized, "chr1\t300\t310\nchr2\t0\t11\n")?;
        let err = validate(&original, &randomized, &Native).unwrap_err();
        assert!(
            matches!(err, Error::Violation(ref path, Invariant::UniformLength) if path == &randomized)
        );
        assert!(err.to_string().ends_with("all regions have the same length"));

        std::fs::write(&original, "chr1\t100\t110\nchr1\t200\t220\n")?;
        let err = validate(&original, &randomized, &Native).unwrap_err();
        assert!(
            matches!(err, Error::Violation(ref path, Invariant::UniformLength) if path == &original)
        );

        Ok(())
    }

    #[test]
    fn test_validate_without_randomized() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("validate")?;
        let original = dir.path().join("a.bed");
        std::fs::write(&original, "chr1\t100\t110\n")?;

        let err = validate(&original, &dir.path().join("a.random.bed"), &Native).unwrap_err();
        assert!(matches!(err, Error::Bed(_, _)));

        Ok(())
    }
}
