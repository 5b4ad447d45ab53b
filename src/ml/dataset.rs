//! スペクトログラム画像とアノテーションのペアを提供するデータセット

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array3};

use crate::config::{DatasetSettings, PairingMode};
use crate::error::{DatasetError, Result};
use crate::ml::{load_annotation, load_spectrogram};

/// 画像とアノテーションのファイルペア
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub image: PathBuf,
    pub annotation: PathBuf,
}

/// 読み込み済みのサンプル
#[derive(Debug, Clone)]
pub struct TabSample {
    /// 正規化済み画像 `(3, H, W)`
    pub image: Array3<f32>,
    /// 弦ごとのクラスID
    pub annotation: Array1<i64>,
}

/// ギタータブ譜学習データセット（パスのペアのみ保持）
///
/// 画像は `get` のたびにデコードされる。
#[derive(Debug, Clone)]
pub struct GuitarTabDataset {
    pairs: Vec<SamplePair>,
    settings: DatasetSettings,
}

/// ファイルペアを読み込む（画像デコード + アノテーション変換）
pub fn load_sample(image: &Path, annotation: &Path, settings: &DatasetSettings) -> Result<TabSample> {
    let image = load_spectrogram(image, settings)?;
    let annotation = load_annotation(annotation, settings)?;
    Ok(TabSample { image, annotation })
}

/// 指定拡張子のファイルをファイル名順で列挙
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                if ext.to_string_lossy().eq_ignore_ascii_case(extension) {
                    files.push(path);
                }
            }
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// ステム名で対応付け（画像のソート順を維持）
fn pair_by_stem(images: Vec<PathBuf>, annotations: Vec<PathBuf>) -> Result<Vec<SamplePair>> {
    let mut by_stem: HashMap<String, PathBuf> = annotations
        .into_iter()
        .map(|path| (stem_of(&path), path))
        .collect();

    images
        .into_iter()
        .map(|image| match by_stem.remove(&stem_of(&image)) {
            Some(annotation) => Ok(SamplePair { image, annotation }),
            None => Err(DatasetError::UnpairedFile { file: image }),
        })
        .collect()
}

impl GuitarTabDataset {
    /// 画像ディレクトリとアノテーションディレクトリからデータセットを構築
    ///
    /// 画像数とアノテーション数が一致しない場合は設定エラー。
    pub fn new(image_dir: &Path, annotation_dir: &Path, settings: &DatasetSettings) -> Result<Self> {
        if settings.image_size == 0 {
            return Err(DatasetError::InvalidConfig("image_size must be positive".to_string()));
        }
        if settings.std.iter().any(|s| *s == 0.0) {
            return Err(DatasetError::InvalidConfig("std must be non-zero".to_string()));
        }

        let images = list_files(image_dir, &settings.image_extension)?;
        let annotations = list_files(annotation_dir, &settings.annotation_extension)?;

        if images.len() != annotations.len() {
            return Err(DatasetError::CountMismatch {
                images: images.len(),
                annotations: annotations.len(),
            });
        }

        let pairs = match settings.pairing {
            PairingMode::Positional => images
                .into_iter()
                .zip(annotations)
                .map(|(image, annotation)| SamplePair { image, annotation })
                .collect(),
            PairingMode::ByStem => pair_by_stem(images, annotations)?,
        };

        log::info!(
            "Loaded {} spectrogram/annotation pairs from {} and {} ({:?})",
            pairs.len(),
            image_dir.display(),
            annotation_dir.display(),
            settings.pairing
        );

        Ok(Self {
            pairs,
            settings: settings.clone(),
        })
    }

    /// サンプル数
    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn settings(&self) -> &DatasetSettings {
        &self.settings
    }

    /// 指定位置のファイルペア
    pub fn pair(&self, index: usize) -> Option<&SamplePair> {
        self.pairs.get(index)
    }

    /// 指定位置のサンプルを読み込む（画像デコード + アノテーション変換）
    pub fn get(&self, index: usize) -> Result<TabSample> {
        let pair = self.pairs.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.pairs.len(),
        })?;

        load_sample(&pair.image, &pair.annotation, &self.settings)
    }
}
