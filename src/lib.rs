//! `peakset` is a crate for preparing fixed-width positive and negative
//! genomic interval datasets from raw peak calls.
//!
//! Preparation runs in three steps, each skipping datasets it has already
//! completed:
//!
//! - [`normalize`] merges the raw peak calls of each dataset and windows the
//!   merged peaks down to a uniform length around their centers.
//! - [`sample`] shuffles the positives to random locations of their assembly,
//!   avoiding the positives themselves and the assembly gaps, once at 1x and
//!   once at 2x.
//! - [`validate`] checks that every set has a single interval length and that
//!   no negative overlaps a positive.
//!
//! Finally, [`manifest`] enumerates training jobs for every ordered pair of
//! assemblies a dataset group covers.
//!
//! Interval arithmetic that a genomic-interval toolkit would normally provide
//! (merging, clamping, shuffling, intersecting, and extracting sequences) is
//! behind the [`toolkit::Toolkit`] trait. [`toolkit::Bedtools`] runs the
//! `bedtools` executable, while [`toolkit::Native`] does the same work
//! in-process.
//!
//! Below is an example of normalizing a handful of peaks and drawing negatives
//! for them in memory.
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! use peakset::assembly::AssemblyContext;
//! use peakset::normalize::Normalizer;
//! use peakset::sample::Multiplicity;
//! use peakset::sample::Sampler;
//! use peakset::toolkit::Native;
//! use peakset::validate;
//! use peakset::IntervalSet;
//!
//! let sizes = BTreeMap::from([(String::from("chr1"), 100_000)]);
//! let assembly = AssemblyContext::from_parts("hg38", Path::new("."), sizes, IntervalSet::new());
//!
//! let data = b"chr1\t1000\t1300\nchr1\t1200\t1500\n";
//! let mut reader = peakset::bed::Reader::new(&data[..]);
//! let raw = reader.records().collect::<Result<IntervalSet, _>>()?;
//!
//! let config = peakset::normalize::Config {
//!     length: 100,
//!     ..Default::default()
//! };
//! let normalized = Normalizer::new(Native, config).normalize(raw, &assembly)?;
//! let positives = normalized.positives();
//! assert_eq!(positives.len(), 1);
//!
//! let sampler = Sampler::new(Native, Default::default());
//! let negatives = sampler.sample(positives, &assembly, Multiplicity::Two)?;
//!
//! assert_eq!(negatives.len(), 2);
//! assert!(validate::check_uniform_length(&negatives));
//! assert!(validate::check_no_overlap(positives, &negatives));
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod assembly;
pub mod bed;
pub mod checkpoint;
pub mod dataset;
pub mod interval;
pub mod manifest;
pub mod normalize;
pub mod sample;
pub mod toolkit;
pub mod validate;

pub use interval::Interval;
pub use interval::IntervalSet;
