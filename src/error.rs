//! データセット関連のエラー定義

use std::path::PathBuf;

/// データセット読み込み・分割で発生するエラー
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// 画像数とアノテーション数が一致しない
    #[error("Mismatch in image and annotation file counts: {images} images, {annotations} annotations")]
    CountMismatch { images: usize, annotations: usize },

    /// ステム名で対応するファイルが見つからない
    #[error("No matching annotation for image: {}", file.display())]
    UnpairedFile { file: PathBuf },

    /// 分割比率が不正
    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    /// 設定値が不正
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("NPY read error: {0}")]
    Npy(#[from] ndarray_npy::ViewNpyError),

    /// 対応していない形状・型のアノテーション
    #[error("Unsupported annotation {}: {detail}", path.display())]
    UnsupportedAnnotation { path: PathBuf, detail: String },

    /// アノテーション長が期待値と異なる（Strictポリシー時のみ）
    #[error("Annotation {} has unexpected length {actual} (expected {expected})", path.display())]
    AnnotationShape {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// バッチ内でアノテーション長が揃っていない
    #[error("Ragged batch: expected annotation length {expected}, got {actual}")]
    RaggedBatch { expected: usize, actual: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl DatasetError {
    /// 構築時に検出される設定エラーかどうか
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DatasetError::CountMismatch { .. }
                | DatasetError::UnpairedFile { .. }
                | DatasetError::InvalidSplit(_)
                | DatasetError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// セグメント画像リネームのエラー
#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rejectポリシーで出力先に既存ファイルがある
    #[error("{} output file(s) already exist in {}", existing.len(), dir.display())]
    OutputExists { dir: PathBuf, existing: Vec<PathBuf> },
}

impl RenameError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| RenameError::Io { path, source }
    }
}
