//! パイプライン設定管理モジュール
//!
//! リサイズ解像度・正規化定数・分割比率・リネーム先などをJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, Result};

/// 画像とアノテーションの対応付け方法
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    /// それぞれをファイル名でソートし、同じ順位同士を対応付ける
    #[default]
    Positional,
    /// 拡張子を除いたファイル名が一致するもの同士を対応付ける
    ByStem,
}

/// アノテーション長が期待値と異なる場合の扱い
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShapePolicy {
    /// 警告を出してそのまま返す
    #[default]
    Lenient,
    /// エラーにする
    Strict,
}

/// 出力先ディレクトリに既存ファイルがある場合の扱い
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExistingOutputPolicy {
    /// 既存ファイルは残したまま追加・上書きする
    #[default]
    Accumulate,
    /// コピー前に出力先のファイルを削除する
    Clear,
    /// 書き込み先が既に存在する場合はコピー前にエラー
    Reject,
}

impl std::fmt::Display for ExistingOutputPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExistingOutputPolicy::Accumulate => write!(f, "accumulate"),
            ExistingOutputPolicy::Clear => write!(f, "clear"),
            ExistingOutputPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// データセット設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// スペクトログラム画像の拡張子
    pub image_extension: String,
    /// アノテーションの拡張子
    pub annotation_extension: String,
    /// リサイズ後の画像サイズ（正方形）
    pub image_size: u32,
    /// チャネルごとの平均（ImageNet）
    pub mean: [f32; 3],
    /// チャネルごとの標準偏差（ImageNet）
    pub std: [f32; 3],
    /// 弦の数 = アノテーションの期待長
    pub num_strings: usize,
    /// one-hot 行の幅（フレット位置クラス数）
    pub num_frets: usize,
    #[serde(default)]
    pub pairing: PairingMode,
    #[serde(default)]
    pub shape_policy: ShapePolicy,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            image_extension: "png".to_string(),
            annotation_extension: "npy".to_string(),
            image_size: 224, // ResNet入力サイズ
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            num_strings: 6,
            num_frets: 19,
            pairing: PairingMode::default(),
            shape_policy: ShapePolicy::default(),
        }
    }
}

/// データローダー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// バッチサイズ
    pub batch_size: usize,
    /// 学習データの割合
    pub train_ratio: f64,
    /// 検証データの割合（残りはテスト）
    pub val_ratio: f64,
    /// ワーカー数の上限
    pub max_workers: usize,
    /// 分割・シャッフル用のシード（None の場合は毎回ランダム）
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            batch_size: 64,
            train_ratio: 0.8,
            val_ratio: 0.1,
            max_workers: 4,
            seed: None,
        }
    }
}

impl LoaderSettings {
    /// 値の妥当性をチェック
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DatasetError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        for (name, ratio) in [("train_ratio", self.train_ratio), ("val_ratio", self.val_ratio)] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(DatasetError::InvalidSplit(format!(
                    "{} must be within [0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if self.train_ratio + self.val_ratio >= 1.0 {
            return Err(DatasetError::InvalidSplit(format!(
                "train_ratio + val_ratio must be below 1.0 (got {} + {}), test split would be empty",
                self.train_ratio, self.val_ratio
            )));
        }
        Ok(())
    }
}

/// セグメント画像リネーム設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameSettings {
    /// 入力ディレクトリ
    pub source_dir: PathBuf,
    /// 出力ディレクトリ
    pub output_dir: PathBuf,
    /// 連番のゼロ埋め桁数
    pub index_width: usize,
    #[serde(default)]
    pub existing_output: ExistingOutputPolicy,
}

impl Default for RenameSettings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("./cqt_images"),
            output_dir: PathBuf::from("./cqt_images_renamed"),
            index_width: 4,
            existing_output: ExistingOutputPolicy::default(),
        }
    }
}

/// パイプライン全体の設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dataset: DatasetSettings,
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub rename: RenameSettings,
}

impl PipelineConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("guitar_tab_data.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 指定パスから設定を読み込む、存在しない・読めない場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("設定ファイルが存在しません。デフォルト設定を使用します: {}", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                log::info!("設定ファイルを読み込みました: {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定情報を表示
    pub fn display(&self) {
        println!("=== パイプライン設定 ===");
        println!(
            "画像: *.{} -> {}x{}",
            self.dataset.image_extension, self.dataset.image_size, self.dataset.image_size
        );
        println!("アノテーション: *.{}", self.dataset.annotation_extension);
        println!("平均: {:?} / 標準偏差: {:?}", self.dataset.mean, self.dataset.std);
        println!(
            "弦数: {} / フレットクラス数: {}",
            self.dataset.num_strings, self.dataset.num_frets
        );
        println!("対応付け: {:?} / 形状チェック: {:?}", self.dataset.pairing, self.dataset.shape_policy);
        println!("\n--- ローダー設定 ---");
        println!("バッチサイズ: {}", self.loader.batch_size);
        println!(
            "分割比率: train={} val={} test={:.2}",
            self.loader.train_ratio,
            self.loader.val_ratio,
            1.0 - self.loader.train_ratio - self.loader.val_ratio
        );
        println!("ワーカー上限: {}", self.loader.max_workers);
        match self.loader.seed {
            Some(seed) => println!("シード: {}", seed),
            None => println!("シード: ランダム"),
        }
        println!("\n--- リネーム設定 ---");
        println!(
            "{} -> {} (桁数 {}, 既存出力: {})",
            self.rename.source_dir.display(),
            self.rename.output_dir.display(),
            self.rename.index_width,
            self.rename.existing_output
        );
        println!("========================\n");
    }
}
