//! Training-job manifests.
//!
//! A manifest lists one command line per training job for a dataset group.
//! Every ordered pair of distinct assemblies of the group is a (source,
//! target) adaptation task, and every task is trained once per model
//! configuration. Jobs are ordered by model first (in table order) and then
//! by pair, with pairs enumerated over the sorted assemblies.

use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;
use tracing::warn;

use crate::checkpoint;
use crate::dataset;

pub mod model;

pub use model::Hyperparameter;
pub use model::ModelConfig;
pub use model::ModelTable;
pub use model::Weight;

/// The file name of a manifest within its group directory.
pub const MANIFEST_FILE_NAME: &str = "train.run";

/// The name of the dataset cache directory passed to every job.
const DATASET_CACHE: &str = "datasets";

/// The backbone architecture passed to every job.
const ARCHITECTURE: &str = "hybrid";

/// An error related to manifests.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// A group directory name is not valid UTF-8.
    InvalidGroup(PathBuf),
    /// The model table could not be read.
    Model(model::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::InvalidGroup(path) => {
                write!(f, "invalid group directory: `{}`", path.display())
            }
            Error::Model(err) => write!(f, "model error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<model::Error> for Error {
    fn from(value: model::Error) -> Self {
        Error::Model(value)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The sequence files a job trains and evaluates on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatasetPaths {
    /// The source positives.
    pub source_positive: String,
    /// The source negatives.
    pub source_negative: String,
    /// The unlabeled target data used in training (the 2x negatives).
    pub target_train: String,
    /// The target positives.
    pub target_positive: String,
    /// The target negatives.
    pub target_negative: String,
}

impl DatasetPaths {
    /// Names the sequence files of the group `name` for one task.
    pub fn new(name: &str, source: &str, target: &str) -> Self {
        let source = format!("{name}.{source}");
        let target = format!("{name}.{target}");

        Self {
            source_positive: format!("{source}.fa"),
            source_negative: format!("{source}.random.fa"),
            target_train: format!("{target}.random_2x.fa"),
            target_positive: format!("{target}.fa"),
            target_negative: format!("{target}.random.fa"),
        }
    }
}

/// One training job.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingJob {
    /// The model configuration.
    model: ModelConfig,
    /// The training script.
    script: PathBuf,
    /// The dataset group.
    group: String,
    /// The source assembly.
    source: String,
    /// The target assembly.
    target: String,
    /// The sequence files.
    datasets: DatasetPaths,
}

impl TrainingJob {
    /// Creates a job training `model` to adapt from `source` to `target`.
    ///
    /// The training script is `{models_dir}/{model}.py`.
    pub fn new(
        model: &ModelConfig,
        models_dir: &Path,
        group: &str,
        source: &str,
        target: &str,
    ) -> Self {
        Self {
            script: models_dir.join(format!("{}.py", model.name())),
            model: model.clone(),
            group: group.to_owned(),
            source: source.to_owned(),
            target: target.to_owned(),
            datasets: DatasetPaths::new(group, source, target),
        }
    }

    /// Gets the model configuration.
    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Gets the source assembly.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Gets the target assembly.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Gets the sequence files.
    pub fn datasets(&self) -> &DatasetPaths {
        &self.datasets
    }

    /// The name of the task, `{group}.{source}.{target}`.
    pub fn task(&self) -> String {
        format!("{}.{}.{}", self.group, self.source, self.target)
    }

    /// The tag the job logs under.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    ///
    /// use peakset::manifest::ModelConfig;
    /// use peakset::manifest::TrainingJob;
    ///
    /// let model = ModelConfig::new("erm", 3, 20, vec![]);
    /// let job = TrainingJob::new(&model, Path::new("models"), "ctcf", "hg38", "mm10");
    /// assert_eq!(job.log_tag(), "src_only-ctcf.hg38.mm10-seed-3");
    /// ```
    pub fn log_tag(&self) -> String {
        format!("{}-{}-seed-{}", self.model.tag(), self.task(), self.model.seed())
    }
}

impl std::fmt::Display for TrainingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let datasets = &self.datasets;

        write!(
            f,
            "python3 {} -d {} -c {DATASET_CACHE} \
             --source-positive {} --source-negative {} --target-train {} \
             --target-positive {} --target-negative {} \
             -a {ARCHITECTURE} --scratch --seed {} --epochs {} --log {}",
            self.script.display(),
            self.task(),
            datasets.source_positive,
            datasets.source_negative,
            datasets.target_train,
            datasets.target_positive,
            datasets.target_negative,
            self.model.seed(),
            self.model.epochs(),
            self.log_tag(),
        )?;

        for hyperparameter in self.model.hyperparameters() {
            write!(f, " {hyperparameter}")?;
        }

        Ok(())
    }
}

/// Enumerates the jobs of one group.
///
/// Models are the outer loop, in table order. Within a model, every ordered
/// pair of distinct assemblies appears once, in sorted order.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use std::path::Path;
///
/// use peakset::manifest::generate;
/// use peakset::manifest::ModelTable;
///
/// let table = ModelTable::from_reader(&b"model,seed,epochs\nmdd,0,20\n"[..])?;
/// let assemblies = BTreeSet::from(["hg38", "mm10", "ce11"].map(String::from));
///
/// let jobs = generate("ctcf", &assemblies, &table, Path::new("models"));
/// let pairs = jobs
///     .iter()
///     .map(|job| format!("{}>{}", job.source(), job.target()))
///     .collect::<Vec<_>>();
///
/// assert_eq!(
///     pairs,
///     ["ce11>hg38", "ce11>mm10", "hg38>ce11", "hg38>mm10", "mm10>ce11", "mm10>hg38"]
/// );
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn generate(
    group: &str,
    assemblies: &BTreeSet<String>,
    models: &ModelTable,
    models_dir: &Path,
) -> Vec<TrainingJob> {
    let mut jobs = Vec::new();

    for model in models.iter() {
        for source in assemblies {
            for target in assemblies.iter().filter(|target| *target != source) {
                jobs.push(TrainingJob::new(model, models_dir, group, source, target));
            }
        }
    }

    jobs
}

/// Writes a manifest, replacing any previous one.
pub fn write(destination: &Path, jobs: &[TrainingJob]) -> io::Result<()> {
    checkpoint::commit(destination, |staged| {
        let mut writer = BufWriter::new(File::create(staged)?);

        for job in jobs {
            writeln!(writer, "{job}")?;
        }

        writer.flush()
    })
}

/// Writes a manifest for every group directory of `input_dir`.
///
/// The assemblies of a group are discovered from the file names within its
/// directory. Each manifest lands in `{output_dir}/{group}/train.run`.
/// Returns the number of jobs per group.
pub fn run_all(
    input_dir: &Path,
    models_dir: &Path,
    models: &ModelTable,
    output_dir: &Path,
) -> Result<Vec<(String, usize)>> {
    let mut counts = Vec::new();

    for group_dir in dataset::sorted_subdirs(input_dir)? {
        let group = group_dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidGroup(group_dir.clone()))?
            .to_owned();

        info!("generating run scripts for {group}");

        let assemblies = dataset::discover_assemblies(&group_dir, &group)?;
        if assemblies.len() < 2 {
            warn!(
                "group `{group}` has {} assemblies, so its manifest is empty",
                assemblies.len()
            );
        }

        let jobs = generate(&group, &assemblies, models, models_dir);

        let destination = output_dir.join(&group);
        std::fs::create_dir_all(&destination)?;
        write(&destination.join(MANIFEST_FILE_NAME), &jobs)?;

        counts.push((group, jobs.len()));
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    const TABLE: &[u8] = b"model,seed,epochs,bottleneck-dim,trade-off-norm,trade-off,iters-per-epoch,pretrain-epochs
erm,0,20,,,,,
mdd,1,30,1024,,0.3,500,
";

    fn assemblies(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_command_line() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let table = ModelTable::from_reader(TABLE)?;
        let jobs = generate(
            "ctcf",
            &assemblies(&["mm10", "hg38"]),
            &table,
            Path::new("models"),
        );

        assert_eq!(jobs.len(), 4);
        assert_eq!(
            jobs[0].to_string(),
            "python3 models/erm.py -d ctcf.hg38.mm10 -c datasets \
             --source-positive ctcf.hg38.fa --source-negative ctcf.hg38.random.fa \
             --target-train ctcf.mm10.random_2x.fa --target-positive ctcf.mm10.fa \
             --target-negative ctcf.mm10.random.fa -a hybrid --scratch --seed 0 --epochs 20 \
             --log src_only-ctcf.hg38.mm10-seed-0"
        );
        assert_eq!(
            jobs[3].to_string(),
            "python3 models/mdd.py -d ctcf.mm10.hg38 -c datasets \
             --source-positive ctcf.mm10.fa --source-negative ctcf.mm10.random.fa \
             --target-train ctcf.hg38.random_2x.fa --target-positive ctcf.hg38.fa \
             --target-negative ctcf.hg38.random.fa -a hybrid --scratch --seed 1 --epochs 30 \
             --log mdd-ctcf.mm10.hg38-seed-1 --bottleneck-dim 1024 --trade-off 0.3 \
             --iters-per-epoch 500"
        );

        Ok(())
    }

    #[test]
    fn test_every_ordered_pair_once() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let table = ModelTable::from_reader(&b"model,seed,epochs\nmdd,0,20\n"[..])?;
        let jobs = generate(
            "ctcf",
            &assemblies(&["hg38", "mm10", "ce11"]),
            &table,
            Path::new("models"),
        );

        assert_eq!(jobs.len(), 6);

        let pairs = jobs
            .iter()
            .map(|job| (job.source(), job.target()))
            .collect::<BTreeSet<_>>();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().all(|(source, target)| source != target));

        Ok(())
    }

    #[test]
    fn test_models_are_the_outer_loop() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let table = ModelTable::from_reader(TABLE)?;
        let jobs = generate(
            "ctcf",
            &assemblies(&["hg38", "mm10", "ce11"]),
            &table,
            Path::new("models"),
        );

        let models = jobs
            .iter()
            .map(|job| job.model().name())
            .collect::<Vec<_>>();
        assert_eq!(
            models,
            vec!["erm", "erm", "erm", "erm", "erm", "erm", "mdd", "mdd", "mdd", "mdd", "mdd", "mdd"]
        );

        Ok(())
    }

    #[test]
    fn test_run_all_replaces_manifest() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("manifest")?;
        let input = dir.path().join("in");
        let output = dir.path().join("out");

        let group_dir = input.join("ctcf");
        std::fs::create_dir_all(&group_dir)?;
        for name in [
            "ctcf.hg38.fa",
            "ctcf.hg38.random.fa",
            "ctcf.mm10.fa",
            "ctcf.ce11.random_2x.fa",
        ] {
            std::fs::write(group_dir.join(name), "")?;
        }

        let manifest = output.join("ctcf").join(MANIFEST_FILE_NAME);
        std::fs::create_dir_all(output.join("ctcf"))?;
        std::fs::write(&manifest, "stale\n")?;

        let table = ModelTable::from_reader(&b"model,seed,epochs\nmdd,0,20\n"[..])?;
        let counts = run_all(&input, Path::new("models"), &table, &output)?;
        assert_eq!(counts, vec![(String::from("ctcf"), 6)]);

        let contents = std::fs::read_to_string(&manifest)?;
        assert_eq!(contents.lines().count(), 6);
        assert!(!contents.contains("stale"));
        assert!(contents.lines().all(|line| line.starts_with("python3 models/mdd.py")));

        Ok(())
    }
}
