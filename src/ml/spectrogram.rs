//! スペクトログラム画像の読み込みと正規化

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array3;

use crate::config::DatasetSettings;
use crate::error::Result;

/// 画像を読み込み、RGB変換・リサイズ・正規化を行う
///
/// ImageNetの平均と標準偏差（設定値）で正規化します。
///
/// # 戻り値
/// - 正規化された画像 `(C, H, W)`
pub fn load_spectrogram(path: &Path, settings: &DatasetSettings) -> Result<Array3<f32>> {
    let img = image::open(path)?.to_rgb8();
    Ok(normalize_rgb(&img, settings))
}

/// RGB画像をリサイズして `(C, H, W)` のテンソルに変換
pub fn normalize_rgb(img: &RgbImage, settings: &DatasetSettings) -> Array3<f32> {
    let size = settings.image_size;
    let resized;
    let img = if img.dimensions() == (size, size) {
        img
    } else {
        // PILのResizeと同じくバイリニア補間
        resized = imageops::resize(img, size, size, FilterType::Triangle);
        &resized
    };

    let side = size as usize;
    let mean = settings.mean;
    let std = settings.std;

    Array3::from_shape_fn((3, side, side), |(channel, y, x)| {
        let pixel = img.get_pixel(x as u32, y as u32);
        let value = pixel[channel] as f32 / 255.0;
        (value - mean[channel]) / std[channel]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn settings(size: u32) -> DatasetSettings {
        DatasetSettings {
            image_size: size,
            ..DatasetSettings::default()
        }
    }

    #[test]
    fn test_normalize_solid_color() {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 0, 128]));
        let tensor = normalize_rgb(&img, &settings(4));

        assert_eq!(tensor.dim(), (3, 4, 4));
        let s = DatasetSettings::default();
        let r = (1.0 - s.mean[0]) / s.std[0];
        let g = (0.0 - s.mean[1]) / s.std[1];
        let b = (128.0 / 255.0 - s.mean[2]) / s.std[2];
        assert!((tensor[[0, 2, 3]] - r).abs() < 1e-5);
        assert!((tensor[[1, 0, 0]] - g).abs() < 1e-5);
        assert!((tensor[[2, 3, 1]] - b).abs() < 1e-5);
    }

    #[test]
    fn test_resize_to_configured_size() {
        let img = RgbImage::from_pixel(10, 6, Rgb([10, 20, 30]));
        let tensor = normalize_rgb(&img, &settings(8));
        assert_eq!(tensor.dim(), (3, 8, 8));
    }

    #[test]
    fn test_channel_major_layout() {
        // 左上だけ赤
        let mut img = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let tensor = normalize_rgb(&img, &settings(2));

        assert!(tensor[[0, 0, 0]] > tensor[[0, 0, 1]]);
        assert!(tensor[[0, 0, 0]] > tensor[[0, 1, 0]]);
        assert_eq!(tensor[[1, 0, 0]], tensor[[1, 1, 1]]);
    }

    #[test]
    fn test_load_grayscale_file_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(5, 5, image::Luma([200])).save(&path).unwrap();

        let tensor = load_spectrogram(&path, &settings(3)).unwrap();
        assert_eq!(tensor.dim(), (3, 3, 3));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_spectrogram(&dir.path().join("nope.png"), &settings(3)).is_err());
    }
}
