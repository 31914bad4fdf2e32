//! Train/validation split resolution.

use crate::data::value::{Partition, RawDataset};
use crate::error::TuneError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::warn;

/// Partitions handed to the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainEvalSplit {
    pub train: Partition,
    pub validation: Partition,
}

/// Where the validation partition came from, for logging and the run manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSource {
    Validation,
    Test,
    RandomFromTrain,
    RandomFromSingle,
}

impl SplitSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Test => "test",
            Self::RandomFromTrain => "random_from_train",
            Self::RandomFromSingle => "random_from_single",
        }
    }
}

/// Derive a train/validation pair from a raw dataset.
///
/// Existing `validation` or `test` partitions are used as-is and
/// `test_size`/`seed` are ignored; otherwise the train partition (or the
/// single collection) is split with [`random_split`].
pub fn resolve_split(
    dataset: RawDataset,
    test_size: f64,
    seed: u64,
) -> Result<(TrainEvalSplit, SplitSource), TuneError> {
    match dataset {
        RawDataset::Partitioned(mut parts) => {
            let Some(train) = parts.remove("train") else {
                let names: Vec<String> = parts.into_keys().collect();
                return Err(TuneError::split(format!(
                    "could not build train/validation splits for the given dataset \
                     (partitions: {names:?})"
                )));
            };
            for (name, source) in [
                ("validation", SplitSource::Validation),
                ("test", SplitSource::Test),
            ] {
                if let Some(validation) = parts.remove(name) {
                    if validation.is_empty() || train.is_empty() {
                        warn!(
                            partition = name,
                            train = train.len(),
                            validation = validation.len(),
                            "Existing split has an empty side; using it as-is"
                        );
                    }
                    return Ok((TrainEvalSplit { train, validation }, source));
                }
            }
            Ok((
                random_split(train, test_size, seed)?,
                SplitSource::RandomFromTrain,
            ))
        }
        RawDataset::Single(collection) => Ok((
            random_split(collection, test_size, seed)?,
            SplitSource::RandomFromSingle,
        )),
    }
}

/// Shuffle with a seeded RNG and cut off `ceil(test_size * n)` records for validation.
pub fn random_split(
    partition: Partition,
    test_size: f64,
    seed: u64,
) -> Result<TrainEvalSplit, TuneError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TuneError::split(format!(
            "test_size must be between 0 and 1 (exclusive), got {test_size}"
        )));
    }

    let n = partition.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(TuneError::split(format!(
            "cannot split {n} records with test_size {test_size}: \
             train would have {n_train} and validation {n_test} records"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let Partition { columns, records } = partition;
    let mut slots: Vec<Option<_>> = records.into_iter().map(Some).collect();
    let mut take = |idx: &[usize]| -> Vec<_> {
        idx.iter().filter_map(|&i| slots[i].take()).collect()
    };
    let train_records = take(&indices[..n_train]);
    let validation_records = take(&indices[n_train..]);

    Ok(TrainEvalSplit {
        train: Partition::new(columns.clone(), train_records),
        validation: Partition::new(columns, validation_records),
    })
}
