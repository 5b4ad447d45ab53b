//! ギタータブ譜認識の学習用データ処理
//!
//! - `ml`: スペクトログラム画像とアノテーションのデータセット、分割、バッチ生成
//! - `segment_renamer`: 時間区切りスペクトログラム画像の連番リネーム

pub mod config;
pub mod error;
pub mod ml;
pub mod segment_renamer;

pub use config::{
    DatasetSettings, ExistingOutputPolicy, LoaderSettings, PairingMode, PipelineConfig,
    RenameSettings, ShapePolicy,
};
pub use error::{DatasetError, RenameError, Result};
pub use ml::{create_dataloaders, BatchResult, DataLoaders, GuitarTabDataset, TabBatch, TabLoader, TabSample};
pub use segment_renamer::{normalize_directory, RenameOp, RenameReport, SegmentName};
