//! The model-parameter table.
//!
//! The table is a CSV file with one row per model configuration. The
//! `model`, `seed` and `epochs` columns are required; every recognized
//! hyperparameter column is optional, as is any single cell within it.
//!
//! ```text
//! model,seed,epochs,bottleneck-dim,trade-off-norm,trade-off,iters-per-epoch,pretrain-epochs
//! erm,0,20,,,,,
//! mdd,0,20,1024,,0.3,500,
//! ```

use std::io;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use nonempty::NonEmpty;
use serde::Deserialize;

/// The identifier of the baseline model trained on the source only.
pub const BASELINE_MODEL: &str = "erm";

/// The log tag of the baseline model.
pub const BASELINE_TAG: &str = "src_only";

/// An error related to the model table.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// A row could not be read.
    Csv(csv::Error),
    /// The table has no rows.
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Csv(err) => write!(f, "invalid model table: {err}"),
            Error::Empty => write!(f, "the model table has no models"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::Csv(value)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A numeric value rendered the way its table column was typed.
///
/// A column holds integers only when every row sets it to a whole number;
/// otherwise all of its values are rendered as floats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Weight {
    /// A whole number from an all-integer column.
    Integer(i64),
    /// A value from a column with any fractional or missing value.
    Float(f64),
}

impl Weight {
    /// Gets the value.
    pub fn value(&self) -> f64 {
        match self {
            Weight::Integer(value) => *value as f64,
            Weight::Float(value) => *value,
        }
    }

    /// Gets the whole number `value` is, if it is one.
    fn as_integer(value: f64) -> Option<i64> {
        let truncated = value as i64;
        (value.is_finite() && truncated as f64 == value).then_some(truncated)
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weight::Integer(value) => write!(f, "{value}"),
            Weight::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// A hyperparameter passed through to a training script.
#[derive(Clone, Debug, PartialEq)]
pub enum Hyperparameter {
    /// The width of the bottleneck layer.
    BottleneckDim(u64),
    /// The norm of the trade-off term.
    TradeOffNorm(String),
    /// The weight of the adaptation loss.
    TradeOff(Weight),
    /// The number of iterations per epoch.
    ItersPerEpoch(u64),
    /// The number of pretraining epochs.
    PretrainEpochs(u64),
}

impl Hyperparameter {
    /// The command line flag, without its leading dashes.
    pub fn name(&self) -> &'static str {
        match self {
            Hyperparameter::BottleneckDim(_) => "bottleneck-dim",
            Hyperparameter::TradeOffNorm(_) => "trade-off-norm",
            Hyperparameter::TradeOff(_) => "trade-off",
            Hyperparameter::ItersPerEpoch(_) => "iters-per-epoch",
            Hyperparameter::PretrainEpochs(_) => "pretrain-epochs",
        }
    }
}

impl std::fmt::Display for Hyperparameter {
    /// Renders the hyperparameter as a flag and its value.
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::manifest::Hyperparameter;
    /// use peakset::manifest::Weight;
    ///
    /// assert_eq!(
    ///     Hyperparameter::TradeOff(Weight::Float(1.0)).to_string(),
    ///     "--trade-off 1.0"
    /// );
    /// assert_eq!(
    ///     Hyperparameter::TradeOff(Weight::Integer(1)).to_string(),
    ///     "--trade-off 1"
    /// );
    /// assert_eq!(
    ///     Hyperparameter::BottleneckDim(256).to_string(),
    ///     "--bottleneck-dim 256"
    /// );
    /// ```
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--{} ", self.name())?;

        match self {
            Hyperparameter::BottleneckDim(value)
            | Hyperparameter::ItersPerEpoch(value)
            | Hyperparameter::PretrainEpochs(value) => write!(f, "{value}"),
            Hyperparameter::TradeOffNorm(value) => write!(f, "{value}"),
            Hyperparameter::TradeOff(value) => write!(f, "{value}"),
        }
    }
}

/// One row of the table as it is stored.
#[derive(Debug, Deserialize)]
struct Row {
    /// The `model` column.
    model: String,
    /// The `seed` column.
    seed: u64,
    /// The `epochs` column.
    epochs: u64,
    /// The `bottleneck-dim` column.
    #[serde(rename = "bottleneck-dim", default)]
    bottleneck_dim: Option<u64>,
    /// The `trade-off-norm` column.
    #[serde(rename = "trade-off-norm", default)]
    trade_off_norm: Option<String>,
    /// The `trade-off` column.
    #[serde(rename = "trade-off", default)]
    trade_off: Option<f64>,
    /// The `iters-per-epoch` column.
    #[serde(rename = "iters-per-epoch", default)]
    iters_per_epoch: Option<u64>,
    /// The `pretrain-epochs` column.
    #[serde(rename = "pretrain-epochs", default)]
    pretrain_epochs: Option<u64>,
}

impl From<Row> for ModelConfig {
    fn from(row: Row) -> Self {
        let hyperparameters = [
            row.bottleneck_dim.map(Hyperparameter::BottleneckDim),
            row.trade_off_norm
                .filter(|value| !value.trim().is_empty())
                .map(Hyperparameter::TradeOffNorm),
            row.trade_off
                .map(|value| Hyperparameter::TradeOff(Weight::Float(value))),
            row.iters_per_epoch.map(Hyperparameter::ItersPerEpoch),
            row.pretrain_epochs.map(Hyperparameter::PretrainEpochs),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            name: row.model,
            seed: row.seed,
            epochs: row.epochs,
            hyperparameters,
        }
    }
}

/// A model configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    /// The model identifier, which is also the name of its script.
    name: String,
    /// The training seed.
    seed: u64,
    /// The number of training epochs.
    epochs: u64,
    /// The hyperparameters that were set, in flag order.
    hyperparameters: Vec<Hyperparameter>,
}

impl ModelConfig {
    /// Creates a new [`ModelConfig`].
    pub fn new(
        name: impl Into<String>,
        seed: u64,
        epochs: u64,
        hyperparameters: Vec<Hyperparameter>,
    ) -> Self {
        Self {
            name: name.into(),
            seed,
            epochs,
            hyperparameters,
        }
    }

    /// Gets the model identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the training seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Gets the number of training epochs.
    pub fn epochs(&self) -> u64 {
        self.epochs
    }

    /// Gets the hyperparameters that were set.
    pub fn hyperparameters(&self) -> &[Hyperparameter] {
        &self.hyperparameters
    }

    /// The name the model goes by in log tags.
    ///
    /// # Examples
    ///
    /// ```
    /// use peakset::manifest::ModelConfig;
    ///
    /// assert_eq!(ModelConfig::new("erm", 0, 1, vec![]).tag(), "src_only");
    /// assert_eq!(ModelConfig::new("mdd", 0, 1, vec![]).tag(), "mdd");
    /// ```
    pub fn tag(&self) -> &str {
        match self.name.as_str() {
            BASELINE_MODEL => BASELINE_TAG,
            name => name,
        }
    }
}

/// The model configurations, in table order.
#[derive(Clone, Debug)]
pub struct ModelTable(NonEmpty<ModelConfig>);

impl ModelTable {
    /// Reads a table from CSV.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let rows = reader
            .deserialize::<Row>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let integral = rows
            .iter()
            .all(|row| row.trade_off.and_then(Weight::as_integer).is_some());

        let mut models = rows.into_iter().map(ModelConfig::from).collect::<Vec<_>>();

        if integral {
            for model in &mut models {
                for hyperparameter in &mut model.hyperparameters {
                    if let Hyperparameter::TradeOff(weight) = hyperparameter {
                        if let Some(value) = Weight::as_integer(weight.value()) {
                            *weight = Weight::Integer(value);
                        }
                    }
                }
            }
        }

        NonEmpty::from_vec(models).map(Self).ok_or(Error::Empty)
    }

    /// Reads a table from a CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Gets the model configurations.
    pub fn models(&self) -> &NonEmpty<ModelConfig> {
        &self.0
    }

    /// Iterates over the model configurations.
    pub fn iter(&self) -> impl Iterator<Item = &ModelConfig> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_resolves_hyperparameters() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let table = ModelTable::from_reader(
            &b"model,seed,epochs,bottleneck-dim,trade-off-norm,trade-off,iters-per-epoch,pretrain-epochs
erm,0,20,,,,,
mdd,1,30,1024,,0.3,500,
jan,2,10,,l2,1.0,,5
"[..],
        )?;

        let models = table.iter().collect::<Vec<_>>();
        assert_eq!(models.len(), 3);

        assert_eq!(models[0].name(), "erm");
        assert!(models[0].hyperparameters().is_empty());

        assert_eq!((models[1].seed(), models[1].epochs()), (1, 30));
        assert_eq!(
            models[1].hyperparameters(),
            &[
                Hyperparameter::BottleneckDim(1024),
                Hyperparameter::TradeOff(Weight::Float(0.3)),
                Hyperparameter::ItersPerEpoch(500),
            ]
        );

        assert_eq!(
            models[2].hyperparameters(),
            &[
                Hyperparameter::TradeOffNorm(String::from("l2")),
                Hyperparameter::TradeOff(Weight::Float(1.0)),
                Hyperparameter::PretrainEpochs(5),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_table_without_optional_columns() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let table = ModelTable::from_reader(&b"model,seed,epochs\ndann,7,3\n"[..])?;
        assert_eq!(table.models().head, ModelConfig::new("dann", 7, 3, vec![]));
        Ok(())
    }

    #[test]
    fn test_trade_off_follows_its_column() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let table = ModelTable::from_reader(&b"model,seed,epochs,trade-off\nmdd,0,20,1\njan,0,20,3\n"[..])?;
        assert_eq!(
            table.models().head.hyperparameters(),
            &[Hyperparameter::TradeOff(Weight::Integer(1))]
        );
        assert_eq!(
            table.models().head.hyperparameters()[0].to_string(),
            "--trade-off 1"
        );

        let table = ModelTable::from_reader(&b"model,seed,epochs,trade-off\nmdd,0,20,1\njan,0,20,0.5\n"[..])?;
        assert_eq!(
            table.models().head.hyperparameters()[0].to_string(),
            "--trade-off 1.0"
        );

        let table = ModelTable::from_reader(&b"model,seed,epochs,trade-off\nerm,0,20,\nmdd,0,20,1\n"[..])?;
        assert_eq!(
            table.models().last().hyperparameters()[0].to_string(),
            "--trade-off 1.0"
        );

        Ok(())
    }

    #[test]
    fn test_empty_table() {
        let err = ModelTable::from_reader(&b"model,seed,epochs\n"[..]).unwrap_err();
        assert!(matches!(err, Error::Empty));

        let err = ModelTable::from_reader(&b"model,seed,epochs\nerm,zero,1\n"[..]).unwrap_err();
        assert!(matches!(err, Error::Csv(_)));
    }
}
