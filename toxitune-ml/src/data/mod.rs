//! Dataset loading and shaping: sources, column resolution and splits.

pub mod columns;
pub mod source;
pub mod split;
pub mod value;

pub use columns::{LABEL_CANDIDATES, ResolvedColumns, TEXT_CANDIDATES, resolve_column};
pub use source::{DataSource, DataSourceInfo, HubSource, LocalSource, open_source};
pub use split::{SplitSource, TrainEvalSplit, random_split, resolve_split};
pub use value::{FieldValue, Partition, RawDataset, Record};
