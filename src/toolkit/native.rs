//! An in-process implementation of the [`Toolkit`] operations.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write as _;
use std::path::Path;

use noodles::fasta;
use rand::distributions::Distribution;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tracing::warn;

use crate::assembly::AssemblyContext;
use crate::bed;
use crate::interval::Contig;
use crate::interval::Position;
use crate::toolkit::Error;
use crate::toolkit::Result;
use crate::toolkit::ShuffleOptions;
use crate::toolkit::Toolkit;
use crate::Interval;
use crate::IntervalSet;

/// Performs every toolkit operation without leaving the process.
///
/// Placement draws a contig weighted by its length and then a uniform start
/// position upon it, retrying until the candidate clears the exclusion set
/// (and, when requested, every interval placed before it). The generator is
/// seeded from [`ShuffleOptions::seed`], so the same input always lands in the
/// same place.
#[derive(Clone, Copy, Debug, Default)]
pub struct Native;

impl Toolkit for Native {
    fn merge(&self, intervals: &IntervalSet) -> Result<IntervalSet> {
        Ok(intervals.merged())
    }

    fn slop(
        &self,
        intervals: &IntervalSet,
        assembly: &AssemblyContext,
        margin: Position,
    ) -> Result<IntervalSet> {
        let mut result = IntervalSet::new();

        for interval in intervals {
            let size = *assembly
                .chrom_sizes()
                .get(interval.contig())
                .ok_or_else(|| Error::UnknownContig(interval.contig().clone()))?;

            let start = interval.start().saturating_sub(margin).min(size);
            let end = interval.end().saturating_add(margin).min(size);

            // Intervals lying wholly past the contig end collapse to nothing.
            if let Ok(clamped) = Interval::try_new(interval.contig().clone(), start, end) {
                result.push(clamped);
            }
        }

        Ok(result)
    }

    fn shuffle(
        &self,
        intervals: &IntervalSet,
        exclusion: &IntervalSet,
        assembly: &AssemblyContext,
        options: &ShuffleOptions,
    ) -> Result<IntervalSet> {
        let contigs = assembly
            .chrom_sizes()
            .iter()
            .map(|(contig, size)| (contig, *size))
            .collect::<Vec<_>>();

        // An assembly without any sequence has nowhere to place intervals.
        let weights = WeightedIndex::new(contigs.iter().map(|(_, size)| *size)).ok();

        let excluded = exclusion.index();
        let mut placed = HashMap::<&Contig, BTreeMap<Position, Position>>::new();
        let mut rng = StdRng::seed_from_u64(options.seed);

        let mut result = IntervalSet::new();

        for interval in intervals {
            let length = interval.len();
            let mut placement = None;

            if let Some(weights) = &weights {
                for _ in 0..options.max_tries {
                    let (contig, size) = contigs[weights.sample(&mut rng)];

                    if size < length {
                        continue;
                    }

                    let start = rng.gen_range(0..=size - length);
                    let end = start + length;

                    if excluded.overlaps(contig, start, end) {
                        continue;
                    }

                    if options.no_overlap
                        && placed
                            .get(contig)
                            .is_some_and(|others| collides(others, start, end))
                    {
                        continue;
                    }

                    placement = Some((contig, start));
                    break;
                }
            }

            let (contig, start) = placement
                .ok_or_else(|| Error::PlacementExhausted(interval.clone(), options.max_tries))?;

            if options.no_overlap {
                placed.entry(contig).or_default().insert(start, start + length);
            }

            result.push(interval.relocated(contig.clone(), start));
        }

        Ok(result)
    }

    fn intersect_count(&self, a: &IntervalSet, b: &IntervalSet) -> Result<usize> {
        let index = b.index();
        Ok(a.iter()
            .filter(|interval| index.overlaps_interval(interval))
            .count())
    }

    fn getfasta(
        &self,
        intervals: &Path,
        assembly: &AssemblyContext,
        output: &Path,
    ) -> Result<()> {
        let regions = bed::read_path(intervals).map_err(Error::Bed)?;
        let needed = regions
            .iter()
            .map(|interval| interval.contig().as_str())
            .collect::<HashSet<_>>();

        let mut sequences = HashMap::new();
        for result in fasta::reader::Builder
            .build_from_path(assembly.fasta_path())?
            .records()
        {
            let record = result?;
            let name = String::from_utf8_lossy(record.name()).to_string();

            if needed.contains(name.as_str()) {
                sequences.insert(name, record.sequence().clone());
            }
        }

        let mut writer = BufWriter::new(File::create(output)?);

        for interval in &regions {
            let sequence: &[u8] = match sequences.get(interval.contig().as_str()) {
                Some(sequence) => sequence.as_ref(),
                None => {
                    warn!(
                        "getfasta: contig `{}` is not in {}; skipping",
                        interval.contig(),
                        assembly.fasta_path().display()
                    );
                    continue;
                }
            };

            let (start, end) = (interval.start() as usize, interval.end() as usize);
            let Some(bases) = sequence.get(start..end) else {
                warn!(
                    "getfasta: {}:{}-{} runs past the end of its contig; skipping",
                    interval.contig(),
                    start,
                    end
                );
                continue;
            };

            writeln!(writer, ">{}:{}-{}", interval.contig(), start, end)?;
            writer.write_all(bases)?;
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Whether `[start, end)` overlaps any of the non-overlapping intervals in
/// `placed` (keyed by start, valued by end).
fn collides(placed: &BTreeMap<Position, Position>, start: Position, end: Position) -> bool {
    placed
        .range(..end)
        .next_back()
        .is_some_and(|(_, placed_end)| *placed_end > start)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempdir::TempDir;

    use super::*;
    use crate::assembly::ChromSizes;

    fn set(intervals: &[(&str, Position, Position)]) -> IntervalSet {
        intervals
            .iter()
            .map(|(contig, start, end)| Interval::try_new(*contig, *start, *end).unwrap())
            .collect()
    }

    fn assembly(sizes: &[(&str, Position)], gaps: IntervalSet) -> AssemblyContext {
        let sizes = sizes
            .iter()
            .map(|(contig, size)| (contig.to_string(), *size))
            .collect::<ChromSizes>();
        AssemblyContext::from_parts("test", &PathBuf::from("/nonexistent"), sizes, gaps)
    }

    #[test]
    fn test_collides() {
        let mut placed = BTreeMap::new();
        placed.insert(10, 20);
        placed.insert(30, 40);

        assert!(collides(&placed, 15, 25));
        assert!(collides(&placed, 0, 11));
        assert!(collides(&placed, 35, 36));
        assert!(!collides(&placed, 20, 30));
        assert!(!collides(&placed, 0, 10));
        assert!(!collides(&placed, 40, 50));
    }

    #[test]
    fn test_slop_clamps_to_contig() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let assembly = assembly(&[("chr1", 100)], IntervalSet::new());
        let intervals = set(&[("chr1", 5, 10), ("chr1", 90, 98), ("chr1", 120, 130)]);

        let slopped = Native.slop(&intervals, &assembly, 10)?;
        assert_eq!(slopped, set(&[("chr1", 0, 20), ("chr1", 80, 100)]));

        let clamped = Native.slop(&intervals, &assembly, 0)?;
        assert_eq!(clamped, set(&[("chr1", 5, 10), ("chr1", 90, 98)]));

        let err = Native
            .slop(&set(&[("chr9", 0, 1)]), &assembly, 0)
            .unwrap_err();
        assert_eq!(err.to_string(), "contig `chr9` is not in the chromosome sizes");

        Ok(())
    }

    #[test]
    fn test_shuffle_respects_exclusion() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let positives = set(&[("chr1", 100, 110), ("chr1", 500, 510), ("chr2", 0, 10)]);
        let gaps = set(&[("chr1", 0, 50), ("chr2", 0, 200)]);
        let assembly = assembly(&[("chr1", 1_000), ("chr2", 400)], gaps.clone());

        let mut exclusion = positives.clone();
        exclusion.extend_from(&gaps);

        let doubled = positives.doubled();
        let shuffled =
            Native.shuffle(&doubled, &exclusion, &assembly, &ShuffleOptions::default())?;

        assert_eq!(shuffled.len(), 6);
        assert_eq!(shuffled.uniform_length(), Some(10));
        assert_eq!(Native.intersect_count(&shuffled, &exclusion)?, 0);
        for (i, a) in shuffled.iter().enumerate() {
            for b in shuffled.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{a} overlaps {b}");
            }
        }

        for interval in &shuffled {
            let size = assembly.chrom_sizes()[interval.contig()];
            assert!(interval.end() <= size);
        }

        Ok(())
    }

    #[test]
    fn test_shuffle_is_deterministic() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let positives = set(&[("chr1", 100, 110), ("chr1", 500, 510)]);
        let assembly = assembly(&[("chr1", 10_000)], IntervalSet::new());
        let options = ShuffleOptions::default();

        let first = Native.shuffle(&positives, &positives, &assembly, &options)?;
        let second = Native.shuffle(&positives, &positives, &assembly, &options)?;
        assert_eq!(first, second);

        let reseeded = ShuffleOptions {
            seed: 7,
            ..ShuffleOptions::default()
        };
        let third = Native.shuffle(&positives, &positives, &assembly, &reseeded)?;
        assert_eq!(third.len(), 2);

        Ok(())
    }

    #[test]
    fn test_shuffle_fails_when_genome_is_excluded() {
        let positives = set(&[("chr1", 10, 20)]);
        let gaps = set(&[("chr1", 0, 100)]);
        let assembly = assembly(&[("chr1", 100)], gaps.clone());

        let options = ShuffleOptions {
            max_tries: 1_000,
            ..ShuffleOptions::default()
        };

        let err = Native
            .shuffle(&positives, &gaps, &assembly, &options)
            .unwrap_err();
        assert!(matches!(err, Error::PlacementExhausted(_, 1_000)));
        assert_eq!(
            err.to_string(),
            "could not place an interval of length 10 (from chr1:10-20) after 1000 tries"
        );
    }

    #[test]
    fn test_shuffle_fails_without_room_for_every_interval() {
        // Two intervals of length 60 cannot both fit on a contig of length 100.
        let positives = set(&[("chr1", 0, 60), ("chr1", 0, 60)]);
        let assembly = assembly(&[("chr1", 100)], IntervalSet::new());
        let options = ShuffleOptions {
            max_tries: 500,
            ..ShuffleOptions::default()
        };

        let result = Native.shuffle(&positives, &IntervalSet::new(), &assembly, &options);
        assert!(matches!(result, Err(Error::PlacementExhausted(_, 500))));
    }

    #[test]
    fn test_shuffle_without_sequence() {
        let positives = set(&[("chr1", 0, 10)]);
        let assembly = assembly(&[], IntervalSet::new());

        let result = Native.shuffle(
            &positives,
            &IntervalSet::new(),
            &assembly,
            &ShuffleOptions::default(),
        );
        assert!(matches!(result, Err(Error::PlacementExhausted(_, _))));
    }

    #[test]
    fn test_intersect_count() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let a = set(&[("chr1", 0, 10), ("chr1", 10, 20), ("chr2", 5, 15), ("chr1", 0, 10)]);
        let b = set(&[("chr1", 9, 10), ("chr3", 0, 100)]);

        // Duplicates in `a` are counted once each, like `bedtools intersect -u`.
        assert_eq!(Native.intersect_count(&a, &b)?, 2);
        assert_eq!(Native.intersect_count(&b, &IntervalSet::new())?, 0);

        Ok(())
    }

    #[test]
    fn test_getfasta() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("getfasta")?;
        std::fs::write(
            dir.path().join("test.fa"),
            ">chr1 description\nACGTACGTAC\nGTACGT\n>chr2\nTTTT\n",
        )?;

        let bed = dir.path().join("regions.bed");
        std::fs::write(&bed, "chr1\t8\t12\nchr3\t0\t2\nchr2\t2\t10\nchr2\t0\t2\n")?;

        let sizes = ChromSizes::from([(String::from("chr1"), 16), (String::from("chr2"), 4)]);
        let assembly = AssemblyContext::from_parts("test", dir.path(), sizes, IntervalSet::new());

        let output = dir.path().join("regions.fa");
        Native.getfasta(&bed, &assembly, &output)?;

        assert_eq!(
            std::fs::read_to_string(output)?,
            ">chr1:8-12\nACGT\n>chr2:0-2\nTT\n"
        );

        Ok(())
    }
}
