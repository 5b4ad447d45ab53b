//! バッチ生成とデータローダー

use std::path::Path;
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::tensor::{backend::Backend, Int, Tensor};
use rand::Rng;
use rayon::prelude::*;

use crate::config::{DatasetSettings, PipelineConfig};
use crate::error::{DatasetError, Result};
use crate::ml::{load_sample, make_rng, random_split, GuitarTabDataset, Splits, TabItem, TabSample};

/// ワーカー数: `min(max_workers, cores / 2)`
pub fn worker_degree(max_workers: usize, cores: usize) -> usize {
    max_workers.min(cores / 2)
}

/// 実行環境の論理コア数から決めたワーカー数
pub fn effective_workers(max_workers: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    worker_degree(max_workers, cores)
}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct TabBatch<B: Backend> {
    /// `[batch_size, 3, size, size]`
    pub images: Tensor<B, 4>,
    /// `[batch_size, num_strings]`
    pub targets: Tensor<B, 2, Int>,
}

/// ローダーが返す1バッチ分の結果（ワーカー間で共有できるよう `Arc` で包む）
pub type BatchResult<B> = std::result::Result<TabBatch<B>, Arc<DatasetError>>;

/// 分割ごとのデータローダー
pub type TabLoader<B> = Arc<dyn DataLoader<B, BatchResult<B>>>;

/// バッチャー
///
/// バッチ内のアイテムをワーカープールで並列に読み込むが、
/// 結果は常にアイテム順に並ぶ。
#[derive(Clone)]
pub struct TabBatcher<B: Backend> {
    settings: DatasetSettings,
    device: B::Device,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl<B: Backend> TabBatcher<B> {
    /// `workers == 0` の場合は呼び出しスレッドで順に読み込む
    pub fn new(settings: DatasetSettings, device: B::Device, workers: usize) -> Result<Self> {
        let pool = if workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("tab-loader-{}", i))
                .build()?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(Self { settings, device, pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.current_num_threads())
    }

    /// アイテムのパスから読み込んでバッチを生成
    pub fn load_batch(&self, items: &[TabItem]) -> Result<TabBatch<B>> {
        let settings = &self.settings;
        let load = |item: &TabItem| load_sample(&item.image, &item.annotation, settings);

        let samples: Vec<TabSample> = match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(load).collect::<Result<Vec<_>>>())?,
            None => items.iter().map(load).collect::<Result<Vec<_>>>()?,
        };

        let batch_size = samples.len();
        let side = settings.image_size as usize;
        let label_len = samples.first().map_or(0, |s| s.annotation.len());

        let mut all_pixels = Vec::with_capacity(batch_size * 3 * side * side);
        let mut targets_vec = Vec::with_capacity(batch_size * label_len);

        for (sample, item) in samples.iter().zip(items) {
            if sample.annotation.len() != label_len {
                log::error!(
                    "バッチ内のアノテーション長が不一致: {}",
                    item.annotation.display()
                );
                return Err(DatasetError::RaggedBatch {
                    expected: label_len,
                    actual: sample.annotation.len(),
                });
            }
            all_pixels.extend(sample.image.iter().copied());
            targets_vec.extend(sample.annotation.iter().copied());
        }

        // 1回の転送でバッチ全体をデバイスへ
        let images = Tensor::<B, 1>::from_floats(all_pixels.as_slice(), &self.device)
            .reshape([batch_size, 3, side, side]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), &self.device)
            .reshape([batch_size, label_len]);

        Ok(TabBatch { images, targets })
    }
}

impl<B: Backend> Batcher<B, TabItem, BatchResult<B>> for TabBatcher<B> {
    fn batch(&self, items: Vec<TabItem>, _device: &B::Device) -> BatchResult<B> {
        self.load_batch(&items).map_err(Arc::new)
    }
}

/// 学習・検証・テスト用のローダー
pub struct DataLoaders<B: Backend> {
    pub train: TabLoader<B>,
    pub valid: TabLoader<B>,
    pub test: TabLoader<B>,
    /// 各ローダーの元になった分割
    pub splits: Splits,
}

/// ディレクトリからデータセットを構築し、3つのローダーを作成
///
/// 学習用のみパスごとにシャッフルする。
pub fn create_dataloaders<B: Backend>(
    image_dir: &Path,
    annotation_dir: &Path,
    config: &PipelineConfig,
    device: &B::Device,
) -> Result<DataLoaders<B>> {
    let loader = &config.loader;
    loader.validate()?;

    let dataset = Arc::new(GuitarTabDataset::new(image_dir, annotation_dir, &config.dataset)?);

    let mut rng = make_rng(loader.seed);
    let splits = random_split(dataset.clone(), loader.train_ratio, loader.val_ratio, &mut rng)?;

    let workers = effective_workers(loader.max_workers);
    log::info!(
        "Split {} samples: train={} valid={} test={} (batch_size={}, workers={})",
        dataset.size(),
        splits.train.len(),
        splits.valid.len(),
        splits.test.len(),
        loader.batch_size,
        workers
    );

    // 3つのローダーで同じワーカープールを共有
    let batcher = TabBatcher::<B>::new(config.dataset.clone(), device.clone(), workers)?;

    // プールはバッチャー内にあるので、ローダー側はオンデマンド読み込み
    let train = DataLoaderBuilder::new(batcher.clone())
        .batch_size(loader.batch_size)
        .shuffle(rng.gen())
        .num_workers(0)
        .build(splits.train.clone());

    let valid = DataLoaderBuilder::new(batcher.clone())
        .batch_size(loader.batch_size)
        .num_workers(0)
        .build(splits.valid.clone());

    let test = DataLoaderBuilder::new(batcher)
        .batch_size(loader.batch_size)
        .num_workers(0)
        .build(splits.test.clone());

    Ok(DataLoaders {
        train,
        valid,
        test,
        splits,
    })
}
