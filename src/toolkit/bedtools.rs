//! Running the toolkit operations through the `bedtools` executable.

use std::ffi::OsStr;
use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::thread;

use tempdir::TempDir;
use tracing::debug;

use crate::assembly::AssemblyContext;
use crate::bed;
use crate::interval::Position;
use crate::toolkit::Error;
use crate::toolkit::Result;
use crate::toolkit::ShuffleOptions;
use crate::toolkit::Toolkit;
use crate::IntervalSet;

/// The name of the reserved file argument that makes `bedtools` read stdin.
const STDIN: &str = "stdin";

/// A handle to a `bedtools` executable.
///
/// Every operation is a separate process. Intervals are piped through stdin
/// and results are parsed from stdout; any non-zero exit is reported as
/// [`Error::Failed`] along with the captured stderr.
#[derive(Clone, Debug)]
pub struct Bedtools {
    /// The path to (or name of) the executable.
    binary: PathBuf,
}

impl Bedtools {
    /// Creates a new [`Bedtools`] handle.
    ///
    /// # Examples
    ///
    /// ```
    /// let bedtools = peakset::toolkit::Bedtools::new("/usr/local/bin/bedtools");
    /// assert_eq!(bedtools.binary().to_str(), Some("/usr/local/bin/bedtools"));
    /// ```
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Gets the path to the executable.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Ensures the executable can be run.
    pub fn ensure_installed(&self) -> Result<()> {
        self.run(&["--version"], None).map(|_| ())
    }

    /// Renders a command line for logs and error messages.
    fn command_line<S: AsRef<OsStr>>(&self, args: &[S]) -> String {
        let mut line = self.binary.display().to_string();

        for arg in args {
            line.push(' ');
            line.push_str(&arg.as_ref().to_string_lossy());
        }

        line
    }

    /// Runs `bedtools` with `args`, feeding `input` through stdin, and returns
    /// the raw stdout.
    fn run<S: AsRef<OsStr>>(&self, args: &[S], input: Option<&IntervalSet>) -> Result<Vec<u8>> {
        let command = self.command_line(args);
        debug!("bedtools: running `{command}`");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(match input {
                Some(_) => Stdio::piped(),
                None => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Spawn(command.clone(), e))?;

        // The input is fed from another thread so that a full stdout pipe can
        // never stall the write.
        let feeder = match (input, child.stdin.take()) {
            (Some(input), Some(stdin)) => {
                let mut buffer = Vec::new();
                bed::write(&mut buffer, input)?;

                Some(thread::spawn(move || {
                    let mut stdin = stdin;
                    std::io::Write::write_all(&mut stdin, &buffer)
                }))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Spawn(command.clone(), e))?;

        let fed = feeder.map(|handle| handle.join());

        if !output.status.success() {
            return Err(Error::Failed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        match fed {
            Some(Ok(Err(err))) => return Err(Error::Io(err)),
            Some(Err(_)) => {
                return Err(Error::Io(std::io::Error::other(format!(
                    "writing stdin of `{command}` panicked"
                ))))
            }
            _ => {}
        }

        Ok(output.stdout)
    }

    /// Runs `bedtools` and parses its stdout as BED records.
    fn run_intervals<S: AsRef<OsStr>>(
        &self,
        args: &[S],
        input: Option<&IntervalSet>,
    ) -> Result<IntervalSet> {
        let stdout = self.run(args, input)?;

        let mut reader = bed::Reader::new(&stdout[..]);
        let intervals = reader
            .records()
            .collect::<bed::Result<IntervalSet>>()
            .map_err(|e| Error::InvalidOutput(self.command_line(args), e))?;

        Ok(intervals)
    }
}

impl Default for Bedtools {
    fn default() -> Self {
        Self::new("bedtools")
    }
}

/// Writes intervals to a BED file inside `dir` so they can be passed to
/// `bedtools` by name.
fn write_temporary(dir: &TempDir, name: &str, intervals: &IntervalSet) -> Result<PathBuf> {
    let path = dir.path().join(name);
    bed::write(BufWriter::new(File::create(&path)?), intervals)?;
    Ok(path)
}

impl Toolkit for Bedtools {
    fn merge(&self, intervals: &IntervalSet) -> Result<IntervalSet> {
        self.run_intervals(&["merge", "-i", STDIN], Some(intervals))
    }

    fn slop(
        &self,
        intervals: &IntervalSet,
        assembly: &AssemblyContext,
        margin: Position,
    ) -> Result<IntervalSet> {
        let args: [OsString; 7] = [
            "slop".into(),
            "-i".into(),
            STDIN.into(),
            "-g".into(),
            assembly.sizes_path().into(),
            "-b".into(),
            margin.to_string().into(),
        ];

        self.run_intervals(&args, Some(intervals))
    }

    fn shuffle(
        &self,
        intervals: &IntervalSet,
        exclusion: &IntervalSet,
        assembly: &AssemblyContext,
        options: &ShuffleOptions,
    ) -> Result<IntervalSet> {
        let dir = TempDir::new("peakset-shuffle")?;
        let exclusion = write_temporary(&dir, "excl.bed", exclusion)?;

        let mut args: Vec<OsString> = vec![
            "shuffle".into(),
            "-i".into(),
            STDIN.into(),
            "-excl".into(),
            exclusion.into(),
            "-g".into(),
            assembly.sizes_path().into(),
            "-seed".into(),
            options.seed.to_string().into(),
            "-maxTries".into(),
            options.max_tries.to_string().into(),
        ];

        if options.no_overlap {
            args.push("-noOverlapping".into());
        }

        self.run_intervals(&args, Some(intervals))
    }

    fn intersect_count(&self, a: &IntervalSet, b: &IntervalSet) -> Result<usize> {
        let dir = TempDir::new("peakset-intersect")?;
        let b = write_temporary(&dir, "b.bed", b)?;

        let args: [OsString; 6] = [
            "intersect".into(),
            "-a".into(),
            STDIN.into(),
            "-b".into(),
            b.into(),
            "-u".into(),
        ];

        let stdout = self.run(&args, Some(a))?;
        Ok(stdout.split(|byte| *byte == b'\n').filter(|line| !line.is_empty()).count())
    }

    fn getfasta(
        &self,
        intervals: &Path,
        assembly: &AssemblyContext,
        output: &Path,
    ) -> Result<()> {
        let args: [&OsStr; 5] = [
            "getfasta".as_ref(),
            "-fi".as_ref(),
            assembly.fasta_path().as_os_str(),
            "-bed".as_ref(),
            intervals.as_os_str(),
        ];

        let stdout = self.run(&args, None)?;
        std::fs::write(output, stdout)?;
        Ok(())
    }
}
