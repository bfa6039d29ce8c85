//! An ordered collection of intervals.

use std::collections::HashMap;

use rust_lapper as lapper;

use crate::interval::Contig;
use crate::interval::Interval;
use crate::interval::Position;

/// The inner value of an overlap lookup.
type Iv = lapper::Interval<Position, ()>;

/// An ordered sequence of [`Interval`]s.
///
/// Order is insertion order until [`IntervalSet::sort()`] is called, after
/// which it is the canonical `(contig, start, end)` order. Duplicates are
/// permitted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IntervalSet(Vec<Interval>);

impl IntervalSet {
    /// Creates an empty [`IntervalSet`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interval.
    pub fn push(&mut self, interval: Interval) {
        self.0.push(interval)
    }

    /// Appends every interval of `other`, preserving order.
    pub fn extend_from(&mut self, other: &IntervalSet) {
        self.0.extend(other.0.iter().cloned())
    }

    /// The number of intervals.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no intervals.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the intervals in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.0.iter()
    }

    /// Sorts the intervals into canonical `(contig, start, end)` order.
    pub fn sort(&mut self) {
        self.0.sort()
    }

    /// Returns a set holding every interval of this one twice, in order.
    pub fn doubled(&self) -> IntervalSet {
        let mut inner = Vec::with_capacity(self.0.len() * 2);
        inner.extend(self.0.iter().cloned());
        inner.extend(self.0.iter().cloned());
        IntervalSet(inner)
    }

    /// Collapses overlapping and abutting intervals into maximal runs.
    ///
    /// The result is sorted and contains no two intervals that overlap or
    /// touch.
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::Interval;
    /// use peakset::IntervalSet;
    ///
    /// let set = [("chr1", 5, 10), ("chr1", 0, 6), ("chr1", 10, 12), ("chr1", 20, 30)]
    ///     .into_iter()
    ///     .map(|(contig, start, end)| Interval::try_new(contig, start, end))
    ///     .collect::<Result<IntervalSet, _>>()?;
    ///
    /// let merged = set.merged();
    /// assert_eq!(merged.len(), 2);
    /// assert_eq!(merged.iter().next().unwrap().to_string(), "chr1\t0\t12");
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn merged(&self) -> IntervalSet {
        let mut sorted = self.clone();
        sorted.sort();

        let mut result: Vec<Interval> = Vec::with_capacity(sorted.len());

        for interval in sorted.0 {
            match result.last_mut() {
                Some(run) if run.contig == interval.contig && interval.start <= run.end => {
                    run.end = run.end.max(interval.end);
                }
                _ => result.push(interval),
            }
        }

        IntervalSet(result)
    }

    /// Returns the single length shared by every interval, if there is one.
    ///
    /// [`None`] is returned for an empty set or when two intervals differ in
    /// length.
    pub fn uniform_length(&self) -> Option<Position> {
        let mut lengths = self.0.iter().map(Interval::len);
        let first = lengths.next()?;

        match lengths.all(|length| length == first) {
            true => Some(first),
            false => None,
        }
    }

    /// Builds an overlap lookup over the intervals of this set.
    pub fn index(&self) -> OverlapIndex {
        let mut hm = HashMap::<Contig, Vec<Iv>>::default();

        for interval in &self.0 {
            hm.entry(interval.contig.clone())
                .or_default()
                .push(lapper::Interval {
                    start: interval.start,
                    stop: interval.end,
                    val: (),
                });
        }

        let inner = hm
            .into_iter()
            .map(|(contig, intervals)| (contig, lapper::Lapper::new(intervals)))
            .collect();

        OverlapIndex { inner }
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for IntervalSet {
    type Item = Interval;
    type IntoIter = std::vec::IntoIter<Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a IntervalSet {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Interval>> for IntervalSet {
    fn from(value: Vec<Interval>) -> Self {
        Self(value)
    }
}

/// A lookup table answering whether a region overlaps any interval of a set.
#[derive(Debug)]
pub struct OverlapIndex {
    /// One lapper per contig.
    inner: HashMap<Contig, lapper::Lapper<Position, ()>>,
}

impl OverlapIndex {
    /// Whether `[start, end)` on `contig` shares a position with any indexed
    /// interval.
    pub fn overlaps(&self, contig: &str, start: Position, end: Position) -> bool {
        match self.inner.get(contig) {
            Some(lapper) => lapper.find(start, end).next().is_some(),
            None => false,
        }
    }

    /// Whether `interval` shares a position with any indexed interval.
    pub fn overlaps_interval(&self, interval: &Interval) -> bool {
        self.overlaps(interval.contig(), interval.start(), interval.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(intervals: &[(&str, Position, Position)]) -> IntervalSet {
        intervals
            .iter()
            .map(|(contig, start, end)| Interval::try_new(*contig, *start, *end).unwrap())
            .collect()
    }

    #[test]
    fn test_merge_overlapping_and_abutting() {
        let merged = set(&[
            ("chr2", 0, 10),
            ("chr1", 50, 60),
            ("chr1", 0, 10),
            ("chr1", 10, 20),
            ("chr1", 5, 8),
            ("chr1", 21, 30),
        ])
        .merged();

        assert_eq!(
            merged,
            set(&[("chr1", 0, 20), ("chr1", 21, 30), ("chr1", 50, 60), ("chr2", 0, 10)])
        );
    }

    #[test]
    fn test_merge_removes_duplicates() {
        let merged = set(&[("chr1", 0, 10), ("chr1", 0, 10)]).merged();
        assert_eq!(merged, set(&[("chr1", 0, 10)]));
    }

    #[test]
    fn test_uniform_length() {
        assert_eq!(set(&[]).uniform_length(), None);
        assert_eq!(set(&[("chr1", 0, 10), ("chr2", 5, 15)]).uniform_length(), Some(10));
        assert_eq!(set(&[("chr1", 0, 10), ("chr2", 5, 16)]).uniform_length(), None);
    }

    #[test]
    fn test_doubled_keeps_order() {
        let original = set(&[("chr1", 0, 10), ("chr2", 5, 15)]);
        assert_eq!(
            original.doubled(),
            set(&[("chr1", 0, 10), ("chr2", 5, 15), ("chr1", 0, 10), ("chr2", 5, 15)])
        );
    }

    #[test]
    fn test_index_is_half_open() {
        let index = set(&[("chr1", 10, 20)]).index();

        assert!(index.overlaps("chr1", 19, 25));
        assert!(index.overlaps("chr1", 0, 11));
        assert!(!index.overlaps("chr1", 20, 25));
        assert!(!index.overlaps("chr1", 0, 10));
        assert!(!index.overlaps("chr2", 10, 20));
    }
}
