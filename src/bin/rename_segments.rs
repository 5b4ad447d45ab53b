//! セグメント画像を曲ごとの連番名でコピーするバイナリ
//!
//! 引数なしで実行すると `./cqt_images` から `./cqt_images_renamed` へコピーする。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use guitar_tab_data::{normalize_directory, ExistingOutputPolicy, PipelineConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputMode {
    Accumulate,
    Clear,
    Reject,
}

impl From<OutputMode> for ExistingOutputPolicy {
    fn from(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Accumulate => ExistingOutputPolicy::Accumulate,
            OutputMode::Clear => ExistingOutputPolicy::Clear,
            OutputMode::Reject => ExistingOutputPolicy::Reject,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Copy time-segmented spectrograms into per-track sequential names")]
struct Args {
    #[arg(short, long, long_help = "Directory with <base>_segment_<m>_<s>.<d>.<ext> files.\nDefault: ./cqt_images")]
    input_dir: Option<PathBuf>,
    #[arg(short, long, long_help = "Destination directory, created if missing.\nDefault: ./cqt_images_renamed")]
    output_dir: Option<PathBuf>,
    #[arg(short, long, long_help = "JSON pipeline configuration file")]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, long_help = "What to do with files already in the destination")]
    existing_output: Option<OutputMode>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("設定ファイルの読み込みに失敗しました: {}", path.display()))?
            .rename,
        None => PipelineConfig::default().rename,
    };
    if let Some(dir) = args.input_dir {
        settings.source_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }
    if let Some(mode) = args.existing_output {
        settings.existing_output = mode.into();
    }

    let report = normalize_directory(&settings, |op| {
        println!("Copied {} → {}", op.source, op.target);
    })
    .with_context(|| format!("リネームに失敗しました: {}", settings.source_dir.display()))?;

    if !report.overwritten.is_empty() {
        log::warn!("{} 個の既存ファイルを上書きしました", report.overwritten.len());
    }
    println!(
        "✅ Renaming complete! {} files in {} groups, check '{}' for updated files.",
        report.copied,
        report.groups,
        settings.output_dir.display()
    );
    Ok(())
}
