//! A binary that prepares fixed-width positive and negative interval datasets
//! from raw peak calls.
//!
//! ```shell
//! cargo run --release --bin=peakset --features=binaries -- normalize -i raw -o out -g genome
//! cargo run --release --bin=peakset --features=binaries -- sample -i out -g genome --dir-gap gaps
//! cargo run --release --bin=peakset --features=binaries -- manifest -i fasta -m models -p params.csv -o runs
//! ```
//!
//! The steps are meant to be run in that order:
//!
//! * `normalize` merges the raw files of every `{name}.{assembly}` directory
//!   and windows the merged peaks to a uniform length.
//! * `sample` draws 1x and 2x negative sets for every normalized file and
//!   validates them against their positives.
//! * `manifest` writes one training command line per model and ordered pair
//!   of assemblies.
//!
//! `validate` re-runs the negative-set checks on any pair of files.

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap_verbosity_flag::InfoLevel;
use clap_verbosity_flag::Verbosity;
use peakset::assembly::Registry;
use peakset::manifest;
use peakset::manifest::ModelTable;
use peakset::normalize;
use peakset::normalize::Normalizer;
use peakset::sample;
use peakset::sample::Sampler;
use peakset::toolkit::Bedtools;
use peakset::toolkit::Native;
use peakset::toolkit::Toolkit;
use peakset::validate;
use tracing::info;
use tracing_log::AsTrace as _;
use tracing_subscriber::EnvFilter;

////////////////////////////////////////////////////////////////////////////////////////
// Toolkit selection
////////////////////////////////////////////////////////////////////////////////////////

/// Arguments selecting the interval toolkit.
#[derive(clap::Args)]
struct ToolkitArgs {
    /// Path to the `bedtools` binary.
    #[arg(short = 'p', long, default_value = "bedtools")]
    bedtools_path: PathBuf,

    /// Perform every interval operation in-process instead of with `bedtools`.
    #[arg(long, default_value_t = false)]
    native: bool,
}

impl ToolkitArgs {
    /// Builds the selected toolkit, making sure it can run.
    fn build(&self) -> Result<Box<dyn Toolkit>> {
        if self.native {
            info!("toolkit: using the in-process implementation");
            return Ok(Box::new(Native));
        }

        let bedtools = Bedtools::new(&self.bedtools_path);

        info!("toolkit: ensuring `{}` is installed", bedtools.binary().display());
        bedtools
            .ensure_installed()
            .context("ensuring `bedtools` is installed")?;

        Ok(Box::new(bedtools))
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Subcommands
////////////////////////////////////////////////////////////////////////////////////////

/// Merges and windows raw peak calls.
#[derive(clap::Args)]
struct NormalizeArgs {
    /// Input directory with one `{name}.{assembly}` directory of raw files per
    /// dataset.
    #[arg(short = 'i', long, value_name = "PATH")]
    dir_input: PathBuf,

    /// Output directory for normalized data.
    #[arg(short = 'o', long, value_name = "PATH")]
    dir_output: PathBuf,

    /// Directory with the `{assembly}.chrom.sizes` and `{assembly}.fa` files.
    #[arg(short = 'g', long, value_name = "PATH")]
    dir_genome: PathBuf,

    /// Uniform window length.
    #[arg(short, long, default_value_t = normalize::DEFAULT_LENGTH)]
    length: u64,

    /// Also extract the sequences into a `.fa` file.
    #[arg(short = 'f', long, default_value_t = false)]
    get_fasta: bool,

    /// Recompute datasets that are already complete.
    #[arg(long, default_value_t = false)]
    force: bool,

    /// The interval toolkit.
    #[command(flatten)]
    toolkit: ToolkitArgs,
}

/// Draws negative sets for normalized data.
#[derive(clap::Args)]
struct SampleArgs {
    /// Input directory with normalized data.
    #[arg(short = 'i', long, value_name = "PATH")]
    dir_input: PathBuf,

    /// Directory with the `{assembly}.chrom.sizes` and `{assembly}.fa` files.
    #[arg(short = 'g', long, value_name = "PATH")]
    dir_genome: PathBuf,

    /// Directory with the `{assembly}.gap.txt` files.
    #[arg(long, value_name = "PATH")]
    dir_gap: PathBuf,

    /// Also extract the sequences into `.fa` files.
    #[arg(short = 'f', long, default_value_t = false)]
    get_fasta: bool,

    /// Recompute datasets that are already complete.
    #[arg(long, default_value_t = false)]
    force: bool,

    /// The interval toolkit.
    #[command(flatten)]
    toolkit: ToolkitArgs,
}

/// Checks a randomized file against its original.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Path to an original file.
    #[arg(short = 'a', long, value_name = "PATH")]
    original_file: PathBuf,

    /// Path to a randomized file.
    #[arg(short = 'b', long, value_name = "PATH")]
    randomized_file: PathBuf,

    /// The interval toolkit.
    #[command(flatten)]
    toolkit: ToolkitArgs,
}

/// Writes a training manifest for every dataset group.
#[derive(clap::Args)]
struct ManifestArgs {
    /// Input directory with one directory of sequence files per group.
    #[arg(short = 'i', long, value_name = "PATH")]
    input_dir: PathBuf,

    /// Directory with the model scripts.
    #[arg(short = 'm', long, value_name = "PATH")]
    models_dir: PathBuf,

    /// Path to a `.csv` table with model parameters.
    #[arg(short = 'p', long, value_name = "PATH")]
    model_params: PathBuf,

    /// Output directory for the manifests.
    #[arg(short = 'o', long, value_name = "PATH")]
    output_dir: PathBuf,
}

/// A step of dataset preparation.
#[derive(Subcommand)]
enum Command {
    /// Merges and windows raw peak calls.
    Normalize(NormalizeArgs),

    /// Draws negative sets for normalized data.
    Sample(SampleArgs),

    /// Checks a randomized file against its original.
    Validate(ValidateArgs),

    /// Writes a training manifest for every dataset group.
    Manifest(ManifestArgs),
}

fn normalize(args: &NormalizeArgs) -> Result<()> {
    let toolkit = args.toolkit.build()?;
    let registry = Registry::new(&args.dir_genome, None);

    let config = normalize::Config {
        length: args.length,
        fasta: args.get_fasta,
        force: args.force,
    };

    let outcomes = Normalizer::new(toolkit.as_ref(), config)
        .run_all(&args.dir_input, &args.dir_output, &registry)
        .with_context(|| format!("normalizing `{}`", args.dir_input.display()))?;

    let skipped = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == normalize::Outcome::Skipped)
        .count();
    info!("normalized {} datasets ({skipped} skipped)", outcomes.len());

    Ok(())
}

fn sample(args: &SampleArgs) -> Result<()> {
    let toolkit = args.toolkit.build()?;
    let registry = Registry::new(&args.dir_genome, Some(args.dir_gap.clone()));

    let config = sample::Config {
        fasta: args.get_fasta,
        force: args.force,
        ..Default::default()
    };

    let outcomes = Sampler::new(toolkit.as_ref(), config)
        .run_all(&args.dir_input, &registry)
        .with_context(|| format!("sampling `{}`", args.dir_input.display()))?;

    let skipped = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == sample::Outcome::Skipped)
        .count();
    info!("sampled {} datasets ({skipped} skipped)", outcomes.len());

    Ok(())
}

fn validate(args: &ValidateArgs) -> Result<()> {
    let toolkit = args.toolkit.build()?;

    let outcome = validate::validate(&args.original_file, &args.randomized_file, toolkit.as_ref())
        .with_context(|| format!("validating `{}`", args.randomized_file.display()))?;

    if outcome == validate::Outcome::Passed {
        info!("{}: all invariants hold", args.randomized_file.display());
    }

    Ok(())
}

fn manifest(args: &ManifestArgs) -> Result<()> {
    let models = ModelTable::from_path(&args.model_params)
        .with_context(|| format!("reading `{}`", args.model_params.display()))?;

    let counts = manifest::run_all(&args.input_dir, &args.models_dir, &models, &args.output_dir)
        .context("writing manifests")?;

    for (group, jobs) in counts {
        info!("{group}: {jobs} jobs");
    }

    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////
// Main
////////////////////////////////////////////////////////////////////////////////////////

/// Prepares fixed-width positive and negative interval datasets.
#[derive(Parser)]
struct Args {
    /// The step to run.
    #[command(subcommand)]
    command: Command,

    /// The logging verbosity.
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    match &args.command {
        Command::Normalize(args) => normalize(args),
        Command::Sample(args) => sample(args),
        Command::Validate(args) => validate(args),
        Command::Manifest(args) => manifest(args),
    }
}
