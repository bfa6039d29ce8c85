//! A 0-based, half-open genomic interval as found in a BED record.
//!
//! ```text
//! ================ seq0 ===============
//!
//! | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 |
//! -------------------------------------
//! |   |   | X | X | X | X |   |   |   |  <= seq0  2  6
//! ```
//!
//! The interval above covers positions 2 up until (but not including) 6, so
//! its length is 4. Two intervals overlap only when they share at least one
//! such position: `seq0 2 6` and `seq0 6 8` abut but do not overlap.

use std::num::ParseIntError;
use std::str::FromStr;

pub mod set;

pub use set::IntervalSet;

/// The delimiter between fields of a BED record.
pub const FIELD_DELIMITER: char = '\t';

/// A contiguous molecule (chromosome, scaffold, ...) an interval sits upon.
pub type Contig = String;

/// A 0-based position upon a contig.
pub type Position = u64;

/// An error related to an interval.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// The start position equals the end position.
    ZeroSizedInterval,
    /// The start position is greater than the end position.
    StartGreaterThanEnd(Position, Position),
    /// A record did not have the three mandatory fields.
    MissingField(&'static str),
    /// The start position could not be parsed.
    InvalidStart(ParseIntError),
    /// The end position could not be parsed.
    InvalidEnd(ParseIntError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ZeroSizedInterval => write!(
                f,
                "start position equals end position, which is a zero-sized interval"
            ),
            Error::StartGreaterThanEnd(start, end) => write!(
                f,
                "start position ({start}) cannot be greater than the end position ({end})"
            ),
            Error::MissingField(field) => write!(f, "missing {field} field"),
            Error::InvalidStart(err) => write!(f, "invalid start position: {err}"),
            Error::InvalidEnd(err) => write!(f, "invalid end position: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// A half-open interval upon a contig.
///
/// Intervals order by contig, then start, then end, which is the canonical
/// order of a sorted BED file.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Interval {
    /// The contig.
    contig: Contig,
    /// The start position (inclusive).
    start: Position,
    /// The end position (exclusive).
    end: Position,
}

impl Interval {
    /// Attempts to create a new [`Interval`].
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::interval::Error;
    /// use peakset::Interval;
    ///
    /// let interval = Interval::try_new("chr1", 100, 130)?;
    /// assert_eq!(interval.len(), 30);
    ///
    /// assert_eq!(
    ///     Interval::try_new("chr1", 100, 100),
    ///     Err(Error::ZeroSizedInterval)
    /// );
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(
        contig: impl Into<Contig>,
        start: Position,
        end: Position,
    ) -> Result<Interval, Error> {
        if start == end {
            return Err(Error::ZeroSizedInterval);
        }

        if start > end {
            return Err(Error::StartGreaterThanEnd(start, end));
        }

        Ok(Interval {
            contig: contig.into(),
            start,
            end,
        })
    }

    /// Gets the contig.
    pub fn contig(&self) -> &Contig {
        &self.contig
    }

    /// Gets the start position.
    pub fn start(&self) -> Position {
        self.start
    }

    /// Gets the end position.
    pub fn end(&self) -> Position {
        self.end
    }

    /// Gets the number of positions covered by the interval.
    ///
    /// An interval is never empty, so there is no `is_empty()`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Position {
        self.end - self.start
    }

    /// Indicates whether two intervals share at least one position.
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::Interval;
    ///
    /// let a = Interval::try_new("chr1", 2, 6)?;
    ///
    /// assert!(a.overlaps(&Interval::try_new("chr1", 5, 8)?));
    /// assert!(!a.overlaps(&Interval::try_new("chr1", 6, 8)?));
    /// assert!(!a.overlaps(&Interval::try_new("chr2", 2, 6)?));
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.contig == other.contig && self.start < other.end && other.start < self.end
    }

    /// Returns an interval of the same length starting at `start` on
    /// `contig`.
    pub fn relocated(&self, contig: impl Into<Contig>, start: Position) -> Interval {
        Interval {
            contig: contig.into(),
            start,
            end: start + self.len(),
        }
    }

    /// Consumes self and returns the parts of the interval.
    pub fn into_parts(self) -> (Contig, Position, Position) {
        (self.contig, self.start, self.end)
    }

    /// Resizes the interval to exactly `length` positions centered on its
    /// midpoint.
    ///
    /// The excess width is split in two: the start moves inwards by the floor
    /// of half the excess and the end moves inwards by the ceiling, so the two
    /// trimmed amounts may differ by one. If the interval is not strictly
    /// wider than `length`, [`None`] is returned and the interval cannot be
    /// windowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::Interval;
    ///
    /// let interval = Interval::try_new("chr1", 100, 130)?;
    /// let window = interval.window(10).unwrap();
    /// assert_eq!((window.start(), window.end()), (110, 120));
    ///
    /// // The start absorbs the floor and the end absorbs the ceiling.
    /// let interval = Interval::try_new("chr1", 100, 131)?;
    /// let window = interval.window(10).unwrap();
    /// assert_eq!((window.start(), window.end()), (110, 120));
    ///
    /// // Intervals that are exactly as wide as the window are dropped.
    /// let interval = Interval::try_new("chr1", 100, 110)?;
    /// assert_eq!(interval.window(10), None);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn window(&self, length: Position) -> Option<Interval> {
        let excess = self.len().checked_sub(length)?;

        if excess == 0 || length == 0 {
            return None;
        }

        let trim_start = excess / 2;
        let trim_end = excess - trim_start;

        Some(Interval {
            contig: self.contig.clone(),
            start: self.start + trim_start,
            end: self.end - trim_end,
        })
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            self.contig, self.start, self.end
        )
    }
}

impl FromStr for Interval {
    type Err = Error;

    /// Parses the first three fields of a BED record. Any further fields are
    /// ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split(FIELD_DELIMITER);

        let contig = fields
            .next()
            .filter(|field| !field.is_empty())
            .ok_or(Error::MissingField("contig"))?;

        let start = fields
            .next()
            .ok_or(Error::MissingField("start"))?
            .trim()
            .parse()
            .map_err(Error::InvalidStart)?;

        let end = fields
            .next()
            .ok_or(Error::MissingField("end"))?
            .trim()
            .parse()
            .map_err(Error::InvalidEnd)?;

        Interval::try_new(contig, start, end)
    }
}
