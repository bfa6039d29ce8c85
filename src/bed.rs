//! Reading and writing tab-delimited interval (BED) files.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::io::{self};
use std::iter;
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::interval;
use crate::Interval;
use crate::IntervalSet;

/// The new line character.
const NEW_LINE: char = '\n';

/// The carriage return character.
const CARRIAGE_RETURN: char = '\r';

/// Prefixes of lines that carry no record.
const HEADER_PREFIXES: &[&str] = &["#", "track", "browser"];

/// An error related to a [`Reader`].
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),

    /// A record could not be parsed. Holds the 1-based line number and the
    /// line itself.
    Record(interval::Error, usize, String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Record(err, number, line) => {
                write!(f, "invalid record on line {number}: {err}\n\nline: {line}")
            }
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

/// A BED file reader.
///
/// Only the first three fields of each record are read. Blank lines and
/// `#`, `track` and `browser` header lines are skipped.
#[derive(Debug)]
pub struct Reader<T>
where
    T: BufRead,
{
    /// The inner reader.
    inner: T,
    /// The number of lines read so far.
    line_number: usize,
}

impl<T> Reader<T>
where
    T: BufRead,
{
    /// Creates a BED reader.
    ///
    /// # Examples
    ///
    /// ```
    /// let data = b"track name=peaks\nchr1\t10\t20\tpeak_1\n\nchr2\t0\t5\n";
    /// let mut reader = peakset::bed::Reader::new(&data[..]);
    ///
    /// let intervals = reader.records().collect::<Result<Vec<_>, _>>()?;
    /// assert_eq!(intervals.len(), 2);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            line_number: 0,
        }
    }

    /// Consumes self and returns the inner reader.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Attempts to read the next record, skipping lines that carry none.
    pub fn read_record(&mut self, buffer: &mut String) -> Result<Option<Interval>> {
        loop {
            if read_line(&mut self.inner, buffer)? == 0 {
                return Ok(None);
            }

            self.line_number += 1;

            if is_skippable(buffer) {
                continue;
            }

            return buffer
                .parse::<Interval>()
                .map(Some)
                .map_err(|e| Error::Record(e, self.line_number, buffer.clone()));
        }
    }

    /// Returns an iterator over the records in the underlying reader.
    pub fn records(&mut self) -> impl Iterator<Item = Result<Interval>> + '_ {
        let mut buffer = String::new();

        iter::from_fn(move || self.read_record(&mut buffer).transpose())
    }
}

impl<T> From<T> for Reader<T>
where
    T: BufRead,
{
    fn from(inner: T) -> Self {
        Self::new(inner)
    }
}

/// Opens a BED file for reading, decompressing it if the name ends in `.gz`.
pub fn open(path: &Path) -> io::Result<Reader<Box<dyn BufRead>>> {
    let file = File::open(path)?;

    let inner: Box<dyn BufRead> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        _ => Box::new(BufReader::new(file)),
    };

    Ok(Reader::new(inner))
}

/// Reads every record of a BED file into an [`IntervalSet`], in file order.
pub fn read_path(path: &Path) -> Result<IntervalSet> {
    let mut reader = open(path)?;
    let set = reader.records().collect::<Result<IntervalSet>>()?;
    Ok(set)
}

/// Reads every record from a series of BED files, one after the other.
pub fn read_paths<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<IntervalSet> {
    let mut set = IntervalSet::new();

    for path in paths {
        let mut reader = open(path)?;
        for result in reader.records() {
            set.push(result?);
        }
    }

    Ok(set)
}

/// Writes intervals as three-column BED records.
pub fn write<W>(mut writer: W, intervals: &IntervalSet) -> io::Result<()>
where
    W: Write,
{
    for interval in intervals {
        writeln!(writer, "{interval}")?;
    }

    writer.flush()
}

/// Whether a line carries no record.
fn is_skippable(line: &str) -> bool {
    line.trim().is_empty() || HEADER_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

/// Reads a line from a buffered reader, stripping the line ending.
fn read_line<T>(reader: &mut T, buffer: &mut String) -> io::Result<usize>
where
    T: BufRead,
{
    buffer.clear();

    match reader.read_line(buffer) {
        Ok(0) => Ok(0),
        Ok(n) => {
            if buffer.ends_with(NEW_LINE) {
                buffer.pop();

                if buffer.ends_with(CARRIAGE_RETURN) {
                    buffer.pop();
                }
            }

            Ok(n)
        }
        Err(e) => Err(e),
    }
}
