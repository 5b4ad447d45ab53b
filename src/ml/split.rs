//! データセットの学習 / 検証 / テスト分割

use std::path::PathBuf;
use std::sync::Arc;

use burn::data::dataset::Dataset;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{DatasetError, Result};
use crate::ml::GuitarTabDataset;

/// 各分割のサンプル数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

/// 比率から分割サイズを計算
///
/// `train = floor(train_ratio * n)`, `valid = floor(val_ratio * n)`, 残りがテスト。
/// テストが0件以下になる場合は設定エラー。
pub fn split_sizes(n: usize, train_ratio: f64, val_ratio: f64) -> Result<SplitSizes> {
    if !(0.0..=1.0).contains(&train_ratio) || !(0.0..=1.0).contains(&val_ratio) {
        return Err(DatasetError::InvalidSplit(format!(
            "ratios must be within [0, 1] (train={}, val={})",
            train_ratio, val_ratio
        )));
    }

    let train = (train_ratio * n as f64).floor() as usize;
    let valid = (val_ratio * n as f64).floor() as usize;
    let test = n as i64 - train as i64 - valid as i64;

    if test <= 0 {
        return Err(DatasetError::InvalidSplit(format!(
            "test split would have {} samples (n={}, train={}, valid={})",
            test, n, train, valid
        )));
    }

    Ok(SplitSizes {
        train,
        valid,
        test: test as usize,
    })
}

/// シード指定があれば固定、なければOSの乱数で初期化
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// 分割データセットのアイテム（パスと元データセットでの位置のみ保持）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabItem {
    /// 元データセットでのインデックス
    pub index: usize,
    pub image: PathBuf,
    pub annotation: PathBuf,
}

/// 元データセットのインデックス部分集合
#[derive(Clone, Debug)]
pub struct SplitDataset {
    source: Arc<GuitarTabDataset>,
    indices: Vec<usize>,
}

impl SplitDataset {
    pub fn new(source: Arc<GuitarTabDataset>, indices: Vec<usize>) -> Self {
        Self { source, indices }
    }

    /// 元データセットでのインデックス一覧
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn source(&self) -> &Arc<GuitarTabDataset> {
        &self.source
    }
}

impl Dataset<TabItem> for SplitDataset {
    fn get(&self, index: usize) -> Option<TabItem> {
        let source_index = *self.indices.get(index)?;
        let pair = self.source.pair(source_index)?;
        Some(TabItem {
            index: source_index,
            image: pair.image.clone(),
            annotation: pair.annotation.clone(),
        })
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

/// 分割結果
#[derive(Clone, Debug)]
pub struct Splits {
    pub train: SplitDataset,
    pub valid: SplitDataset,
    pub test: SplitDataset,
}

/// データセットをランダムに3分割（互いに素で全体を覆う）
pub fn random_split(
    dataset: Arc<GuitarTabDataset>,
    train_ratio: f64,
    val_ratio: f64,
    rng: &mut StdRng,
) -> Result<Splits> {
    let sizes = split_sizes(dataset.size(), train_ratio, val_ratio)?;

    // インデックスのみをシャッフル
    let mut indices: Vec<usize> = (0..dataset.size()).collect();
    indices.shuffle(rng);

    let test = indices.split_off(sizes.train + sizes.valid);
    let valid = indices.split_off(sizes.train);
    let train = indices;

    Ok(Splits {
        train: SplitDataset::new(dataset.clone(), train),
        valid: SplitDataset::new(dataset.clone(), valid),
        test: SplitDataset::new(dataset, test),
    })
}
