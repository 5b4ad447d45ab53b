pub mod annotation;
pub mod spectrogram;
pub mod dataset;
pub mod split;
pub mod batcher;

pub use annotation::{load_annotation, reduce_annotation};
pub use spectrogram::{load_spectrogram, normalize_rgb};
pub use dataset::{load_sample, GuitarTabDataset, SamplePair, TabSample};
pub use split::{make_rng, random_split, split_sizes, SplitDataset, SplitSizes, Splits, TabItem};
pub use batcher::{
    create_dataloaders, effective_workers, worker_degree, BatchResult, DataLoaders, TabBatch, TabBatcher, TabLoader,
};
