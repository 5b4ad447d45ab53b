//! データセットを分割し、全バッチを1パス読み込んで形状を表示するバイナリ

use std::path::PathBuf;

use anyhow::Context;
use burn::tensor::backend::Backend;
use clap::Parser;
use burn::data::dataset::Dataset;
use guitar_tab_data::{
    create_dataloaders, ml::effective_workers, PairingMode, PipelineConfig, ShapePolicy, TabLoader,
};

#[derive(Parser, Debug)]
#[command(version, about = "Split a spectrogram/annotation dataset and iterate its batches")]
struct Args {
    #[arg(long_help = "Directory of spectrogram images")]
    image_dir: PathBuf,
    #[arg(long_help = "Directory of .npy annotations")]
    annotation_dir: PathBuf,
    #[arg(short, long, long_help = "JSON pipeline configuration file")]
    config: Option<PathBuf>,
    #[arg(short, long)]
    batch_size: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, long_help = "Fail on annotations whose length is not num_strings")]
    strict: bool,
    #[arg(long, long_help = "Pair images and annotations by file stem instead of sorted position")]
    by_stem: bool,
    #[arg(long, default_value_t = 1)]
    passes: usize,
}

fn run_pass<B: Backend>(name: &str, loader: &TabLoader<B>) -> anyhow::Result<()> {
    let mut samples = 0;
    let mut batches = 0;
    for (i, batch) in loader.iter().enumerate() {
        // 読み込みに失敗したバッチでパスを打ち切る
        let batch = batch.with_context(|| format!("{} バッチ {} の読み込みに失敗しました", name, i))?;
        let dims = batch.images.dims();
        samples += dims[0];
        batches += 1;
        log::debug!("{} batch {}: images {:?} targets {:?}", name, i, dims, batch.targets.dims());
    }
    println!("  {}: {} サンプル / {} バッチ", name, samples, batches);
    Ok(())
}

fn run<B: Backend>(args: &Args, config: &PipelineConfig, device: B::Device) -> anyhow::Result<()> {
    let loaders = create_dataloaders::<B>(&args.image_dir, &args.annotation_dir, config, &device)
        .context("データローダーの作成に失敗しました")?;

    println!("学習データ: {} 枚", loaders.splits.train.len());
    println!("検証データ: {} 枚", loaders.splits.valid.len());
    println!("テストデータ: {} 枚", loaders.splits.test.len());
    println!("ワーカー数: {}", effective_workers(config.loader.max_workers));

    for pass in 0..args.passes {
        println!("パス {}:", pass + 1);
        run_pass("train", &loaders.train)?;
        run_pass("valid", &loaders.valid)?;
        run_pass("test", &loaders.test)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // アノテーション形状の警告が既定で見えるよう warn 以上を出力
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("設定ファイルの読み込みに失敗しました: {}", path.display()))?,
        None => PipelineConfig::load_or_default(PipelineConfig::default_path()),
    };
    if let Some(batch_size) = args.batch_size {
        config.loader.batch_size = batch_size;
    }
    if args.seed.is_some() {
        config.loader.seed = args.seed;
    }
    if args.strict {
        config.dataset.shape_policy = ShapePolicy::Strict;
    }
    if args.by_stem {
        config.dataset.pairing = PairingMode::ByStem;
    }
    config.display();

    #[cfg(feature = "wgpu")]
    {
        println!("GPU (WGPU) モードで読み込みます");
        run::<burn::backend::Wgpu>(&args, &config, Default::default())
    }
    #[cfg(not(feature = "wgpu"))]
    {
        println!("CPU (NdArray) モードで読み込みます");
        run::<burn::backend::NdArray>(&args, &config, Default::default())
    }
}
