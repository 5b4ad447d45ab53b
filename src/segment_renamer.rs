//! 時間区切りスペクトログラム画像のリネーム
//!
//! `<base>_segment_<分>_<秒>.<1/10秒>.<ext>` 形式のファイルを曲（base）ごとにまとめ、
//! 再生時刻順に `<base>_0000.<ext>`, `<base>_0001.<ext>` ... として別ディレクトリへコピーします。
//! 元のファイルは変更しません。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{ExistingOutputPolicy, RenameSettings};
use crate::error::RenameError;

static SEGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)_segment_(\d+)_(\d+)\.(\d+)\.([A-Za-z0-9]+)$").expect("valid segment pattern")
});

/// ファイル名から取り出したセグメント情報
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentName {
    pub base: String,
    pub minutes: u64,
    pub seconds: u64,
    /// 1/10秒単位（桁数は問わず、`12` は1.2秒）
    pub decisecond: u64,
    pub extension: String,
}

impl SegmentName {
    /// パターンに一致しない場合は `None`
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = SEGMENT_PATTERN.captures(file_name)?;
        Some(Self {
            base: caps[1].to_string(),
            minutes: caps[2].parse().ok()?,
            seconds: caps[3].parse().ok()?,
            decisecond: caps[4].parse().ok()?,
            extension: caps[5].to_string(),
        })
    }

    /// 曲頭からの経過秒
    pub fn elapsed_seconds(&self) -> f64 {
        self.minutes as f64 * 60.0 + self.seconds as f64 + self.decisecond as f64 / 10.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEntry {
    pub elapsed: f64,
    pub file_name: String,
    pub extension: String,
}

/// 同じ曲に属するセグメント
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGroup {
    pub base: String,
    pub entries: Vec<SegmentEntry>,
}

/// ディレクトリ走査結果
#[derive(Debug, Clone, Default)]
pub struct SegmentScan {
    /// 最初に出現した順
    pub groups: Vec<SegmentGroup>,
    /// パターンに一致しなかったファイル名
    pub skipped: Vec<String>,
}

/// ディレクトリを走査し、ファイル名順に base ごとにまとめる
pub fn scan_segments(source_dir: &Path) -> Result<SegmentScan, RenameError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source_dir).map_err(RenameError::io(source_dir))? {
        let entry = entry.map_err(RenameError::io(source_dir))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();

    let mut scan = SegmentScan::default();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for name in names {
        let Some(segment) = SegmentName::parse(&name) else {
            scan.skipped.push(name);
            continue;
        };

        let idx = *group_index.entry(segment.base.clone()).or_insert_with(|| {
            scan.groups.push(SegmentGroup {
                base: segment.base.clone(),
                entries: Vec::new(),
            });
            scan.groups.len() - 1
        });

        scan.groups[idx].entries.push(SegmentEntry {
            elapsed: segment.elapsed_seconds(),
            file_name: name,
            extension: segment.extension,
        });
    }

    Ok(scan)
}

/// 1ファイル分のコピー計画
#[derive(Debug, Clone, PartialEq)]
pub struct RenameOp {
    pub source: String,
    pub target: String,
    pub elapsed: f64,
}

/// 各グループを経過時間順に並べ、連番の出力名を割り当てる
///
/// 同じ経過時間のものはファイル名順のまま（安定ソート）。
pub fn plan_renames(groups: &[SegmentGroup], index_width: usize) -> Vec<RenameOp> {
    let mut ops = Vec::new();
    let mut targets = HashSet::new();

    for group in groups {
        let mut entries: Vec<&SegmentEntry> = group.entries.iter().collect();
        entries.sort_by(|a, b| a.elapsed.total_cmp(&b.elapsed));

        for (index, entry) in entries.into_iter().enumerate() {
            let target = format!(
                "{}_{:0width$}.{}",
                group.base,
                index,
                entry.extension,
                width = index_width
            );
            if !targets.insert(target.clone()) {
                log::warn!("出力名が重複しています（後のコピーで上書き）: {}", target);
            }
            ops.push(RenameOp {
                source: entry.file_name.clone(),
                target,
                elapsed: entry.elapsed,
            });
        }
    }

    ops
}

/// リネーム結果
#[derive(Debug, Clone, Default)]
pub struct RenameReport {
    pub copied: usize,
    pub skipped: usize,
    pub groups: usize,
    /// 実行前から存在し、上書きされた出力ファイル
    pub overwritten: Vec<PathBuf>,
}

/// 出力先の通常ファイルを削除
fn clear_output(dest_dir: &Path) -> Result<(), RenameError> {
    for entry in fs::read_dir(dest_dir).map_err(RenameError::io(dest_dir))? {
        let path = entry.map_err(RenameError::io(dest_dir))?.path();
        if path.is_file() {
            fs::remove_file(&path).map_err(RenameError::io(&path))?;
        }
    }
    Ok(())
}

/// `settings.source_dir` のセグメント画像を `settings.output_dir` へ連番名でコピー
///
/// コピーに成功するたびに `on_copy` が呼ばれる。パターンに一致しないファイルは黙って無視する。
pub fn normalize_directory<F>(settings: &RenameSettings, mut on_copy: F) -> Result<RenameReport, RenameError>
where
    F: FnMut(&RenameOp),
{
    let source_dir = settings.source_dir.as_path();
    let dest_dir = settings.output_dir.as_path();
    let scan = scan_segments(source_dir)?;
    let ops = plan_renames(&scan.groups, settings.index_width);

    fs::create_dir_all(dest_dir).map_err(RenameError::io(dest_dir))?;

    match settings.existing_output {
        ExistingOutputPolicy::Accumulate => {}
        ExistingOutputPolicy::Clear => clear_output(dest_dir)?,
        ExistingOutputPolicy::Reject => {
            let existing: Vec<PathBuf> = ops
                .iter()
                .map(|op| dest_dir.join(&op.target))
                .filter(|path| path.exists())
                .collect();
            if !existing.is_empty() {
                return Err(RenameError::OutputExists {
                    dir: dest_dir.to_path_buf(),
                    existing,
                });
            }
        }
    }

    let mut report = RenameReport {
        skipped: scan.skipped.len(),
        groups: scan.groups.len(),
        ..RenameReport::default()
    };

    for op in &ops {
        let src_path = source_dir.join(&op.source);
        let dest_path = dest_dir.join(&op.target);

        if dest_path.exists() {
            log::debug!("既存ファイルを上書きします: {}", dest_path.display());
            report.overwritten.push(dest_path.clone());
        }

        fs::copy(&src_path, &dest_path).map_err(RenameError::io(&src_path))?;
        report.copied += 1;
        on_copy(op);
    }

    log::info!(
        "{} files copied into {} ({} groups, {} skipped)",
        report.copied,
        dest_dir.display(),
        report.groups,
        report.skipped
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), name).unwrap();
    }

    fn settings(src: &Path, dest: &Path, existing_output: ExistingOutputPolicy) -> RenameSettings {
        RenameSettings {
            source_dir: src.to_path_buf(),
            output_dir: dest.to_path_buf(),
            existing_output,
            ..RenameSettings::default()
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_parse_segment_name() {
        let seg = SegmentName::parse("my_song_segment_1_05.3.png").unwrap();
        assert_eq!(seg.base, "my_song");
        assert_eq!(seg.minutes, 1);
        assert_eq!(seg.seconds, 5);
        assert_eq!(seg.decisecond, 3);
        assert_eq!(seg.extension, "png");
        assert!((seg.elapsed_seconds() - 65.3).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_other_names() {
        assert!(SegmentName::parse("random.png").is_none());
        assert!(SegmentName::parse("song_segment_1_05.png").is_none());
        assert!(SegmentName::parse("song_segment_a_05.3.png").is_none());
        assert!(SegmentName::parse("song_segment_1_05.3.png.bak~").is_none());
    }

    #[test]
    fn test_multi_digit_tenths_sort_by_elapsed_time() {
        let seg = SegmentName::parse("song_segment_0_05.12.png").unwrap();
        assert_eq!(seg.decisecond, 12);
        assert!((seg.elapsed_seconds() - 6.2).abs() < 1e-9);

        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "song_segment_0_06.5.png");
        touch(dir.path(), "song_segment_0_05.12.png");
        touch(dir.path(), "song_segment_0_06.0.png");

        let scan = scan_segments(dir.path()).unwrap();
        assert!(scan.skipped.is_empty());
        let sources: Vec<String> = plan_renames(&scan.groups, 4).into_iter().map(|op| op.source).collect();
        assert_eq!(
            sources,
            vec![
                "song_segment_0_06.0.png".to_string(),
                "song_segment_0_05.12.png".to_string(),
                "song_segment_0_06.5.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_nested_segment_marker() {
        let seg = SegmentName::parse("a_segment_b_segment_0_01.0.jpg").unwrap();
        assert_eq!(seg.base, "a_segment_b");
        assert_eq!(seg.extension, "jpg");
    }

    #[test]
    fn test_scan_groups_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "zeta_segment_0_00.0.png");
        touch(dir.path(), "alpha_segment_0_10.0.png");
        touch(dir.path(), "alpha_segment_0_05.0.png");
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("beta_segment_0_00.0.png")).unwrap();

        let scan = scan_segments(dir.path()).unwrap();
        let bases: Vec<&str> = scan.groups.iter().map(|g| g.base.as_str()).collect();
        assert_eq!(bases, vec!["alpha", "zeta"]);
        assert_eq!(scan.groups[0].entries.len(), 2);
        assert_eq!(scan.skipped, vec!["notes.txt".to_string()]);
    }

    #[test]
    fn test_plan_sorts_numerically() {
        let group = SegmentGroup {
            base: "song".to_string(),
            entries: vec![
                SegmentEntry { elapsed: 65.3, file_name: "song_segment_1_05.3.png".into(), extension: "png".into() },
                SegmentEntry { elapsed: 30.1, file_name: "song_segment_0_30.1.png".into(), extension: "png".into() },
                SegmentEntry { elapsed: 120.0, file_name: "song_segment_2_00.0.png".into(), extension: "png".into() },
            ],
        };
        let ops = plan_renames(&[group], 4);
        let pairs: Vec<(&str, &str)> = ops.iter().map(|o| (o.source.as_str(), o.target.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("song_segment_0_30.1.png", "song_0000.png"),
                ("song_segment_1_05.3.png", "song_0001.png"),
                ("song_segment_2_00.0.png", "song_0002.png"),
            ]
        );
    }

    #[test]
    fn test_plan_ties_keep_listing_order() {
        let group = SegmentGroup {
            base: "t".to_string(),
            entries: vec![
                SegmentEntry { elapsed: 5.0, file_name: "t_segment_0_05.0.png".into(), extension: "png".into() },
                SegmentEntry { elapsed: 5.0, file_name: "t_segment_0_5.0.png".into(), extension: "png".into() },
                SegmentEntry { elapsed: 1.0, file_name: "t_segment_0_01.0.png".into(), extension: "png".into() },
            ],
        };
        let ops = plan_renames(&[group], 2);
        assert_eq!(ops[0].target, "t_00.png");
        assert_eq!(ops[1].source, "t_segment_0_05.0.png");
        assert_eq!(ops[2].source, "t_segment_0_5.0.png");
    }

    #[test]
    fn test_normalize_reports_each_copy() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("renamed");
        touch(src.path(), "song_segment_0_01.0.png");
        touch(src.path(), "song_segment_0_00.5.png");
        touch(src.path(), "random.png");

        let mut notices = Vec::new();
        let settings = settings(src.path(), &dest, ExistingOutputPolicy::Accumulate);
        let report = normalize_directory(&settings, |op| {
            notices.push(format!("Copied {} → {}", op.source, op.target));
        })
        .unwrap();

        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.groups, 1);
        assert_eq!(notices, vec![
            "Copied song_segment_0_00.5.png → song_0000.png".to_string(),
            "Copied song_segment_0_01.0.png → song_0001.png".to_string(),
        ]);
        assert_eq!(fs::read_to_string(dest.join("song_0000.png")).unwrap(), "song_segment_0_00.5.png");
        // 元ファイルは残る
        assert_eq!(listing(src.path()).len(), 3);
    }

    #[test]
    fn test_clear_policy_removes_stale_files() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        touch(src.path(), "song_segment_0_00.0.png");
        touch(dest.path(), "stale_0000.png");

        let settings = settings(src.path(), dest.path(), ExistingOutputPolicy::Clear);
        normalize_directory(&settings, |_| {}).unwrap();
        assert_eq!(listing(dest.path()), vec!["song_0000.png".to_string()]);
    }

    #[test]
    fn test_reject_policy_refuses_overwrite() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        touch(src.path(), "song_segment_0_00.0.png");
        touch(src.path(), "song_segment_0_01.0.png");
        fs::write(dest.path().join("song_0001.png"), "old").unwrap();

        let settings = settings(src.path(), dest.path(), ExistingOutputPolicy::Reject);
        let mut copied = 0;
        let err = normalize_directory(&settings, |_| copied += 1).unwrap_err();
        match err {
            RenameError::OutputExists { existing, .. } => assert_eq!(existing.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(copied, 0);
        assert_eq!(fs::read_to_string(dest.path().join("song_0001.png")).unwrap(), "old");
    }

    #[test]
    fn test_accumulate_reports_overwritten() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        touch(src.path(), "song_segment_0_00.0.png");

        let settings = settings(src.path(), dest.path(), ExistingOutputPolicy::Accumulate);
        let first = normalize_directory(&settings, |_| {}).unwrap();
        assert!(first.overwritten.is_empty());
        let second = normalize_directory(&settings, |_| {}).unwrap();
        assert_eq!(second.overwritten, vec![dest.path().join("song_0000.png")]);
    }

    #[test]
    fn test_missing_source_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_segments(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, RenameError::Io { .. }));
    }
}
