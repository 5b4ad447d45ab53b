//! タブ譜アノテーション（.npy）の読み込み
//!
//! アノテーションは弦ごとのクラスID `(6,)` か、one-hot 表現 `(6, 19)` のいずれか。
//! one-hot の場合は行ごとの argmax でクラスIDに変換します。

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use ndarray::{Array1, ArrayD, ArrayViewD, Axis};
use ndarray_npy::{ViewNpyError, ViewNpyExt};

use crate::config::{DatasetSettings, ShapePolicy};
use crate::error::{DatasetError, Result};

/// .npy の要素型を順に試してビューを作り、f64 配列として返す
macro_rules! view_as_f64 {
    ($bytes:expr, $($ty:ty),+ $(,)?) => {{
        $(
            match ArrayViewD::<$ty>::view_npy($bytes) {
                Ok(view) => return Ok(view.mapv(|v| v as f64)),
                Err(ViewNpyError::WrongDescriptor(_)) => {}
                Err(e) => return Err(e.into()),
            }
        )+
    }};
}

fn view_numeric(bytes: &[u8], path: &Path) -> Result<ArrayD<f64>> {
    view_as_f64!(bytes, i64, i32, i16, i8, u8, u16, u32, u64, f32, f64);

    match ArrayViewD::<bool>::view_npy(bytes) {
        Ok(view) => Ok(view.mapv(|v| if v { 1.0 } else { 0.0 })),
        Err(ViewNpyError::WrongDescriptor(descr)) => Err(DatasetError::UnsupportedAnnotation {
            path: path.to_path_buf(),
            detail: format!("unsupported dtype {:?}", descr),
        }),
        Err(e) => Err(e.into()),
    }
}

/// 2次元 one-hot なら行ごとの argmax、1次元ならそのままクラスIDに変換
///
/// argmax は NumPy と同じく最初の最大値のインデックスを返す。
/// それ以外の形状は `None`。
pub fn reduce_annotation(values: ArrayViewD<'_, f64>, num_frets: usize) -> Option<Array1<i64>> {
    match values.shape() {
        [_] => Some(values.iter().map(|&v| v as i64).collect()),
        [_, cols] if *cols == num_frets => Some(
            values
                .axis_iter(Axis(0))
                .map(|row| {
                    let mut best = 0usize;
                    for (i, &v) in row.iter().enumerate() {
                        if v > row[best] {
                            best = i;
                        }
                    }
                    best as i64
                })
                .collect(),
        ),
        _ => None,
    }
}

/// アノテーションを読み込んでクラスID列を返す
///
/// ファイルは読み取り専用でメモリマップされる。
/// 長さが `num_strings` と異なる場合、Lenient なら警告のみ、Strict ならエラー。
pub fn load_annotation(path: &Path, settings: &DatasetSettings) -> Result<Array1<i64>> {
    let file = File::open(path)?;
    // SAFETY: マップは読み取り専用で、この関数内でのみ参照する
    let mmap = unsafe { Mmap::map(&file)? };
    let values = view_numeric(&mmap, path)?;

    let classes = reduce_annotation(values.view(), settings.num_frets).ok_or_else(|| {
        DatasetError::UnsupportedAnnotation {
            path: path.to_path_buf(),
            detail: format!("unexpected shape {:?}", values.shape()),
        }
    })?;

    if classes.len() != settings.num_strings {
        match settings.shape_policy {
            ShapePolicy::Lenient => log::warn!(
                "Annotation has unexpected shape: [{}] (expected [{}]) in {}",
                classes.len(),
                settings.num_strings,
                path.display()
            ),
            ShapePolicy::Strict => {
                return Err(DatasetError::AnnotationShape {
                    path: path.to_path_buf(),
                    expected: settings.num_strings,
                    actual: classes.len(),
                })
            }
        }
    }

    Ok(classes)
}
