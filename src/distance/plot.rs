//! 距離分布のヒストグラム出力
//!
//! `detailed_player_distances.csv` を年度・チームごとに分け、
//! `<output_dir>/<year>/<Team>_<year>_distance_distribution.png` に描画する。

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::{info, warn};

use crate::error::ScraperError;

use super::types::DetailedDistance;

/// プロット出力ディレクトリの既定値
pub const PLOT_DIR: &str = "distance_plots";

const BINS: usize = 20;
const KDE_POINTS: usize = 200;
const IMAGE_SIZE: (u32, u32) = (1000, 600);
const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);
const KDE_COLOR: RGBColor = RGBColor(70, 130, 180);

/// ヒストグラムの1区間
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

fn plot_error(e: impl Display) -> ScraperError {
    ScraperError::Plot(e.to_string())
}

/// `Air Force`, 2023 → `Air_Force_2023_distance_distribution.png`
pub fn plot_file_name(team: &str, year: u16) -> String {
    format!(
        "{}_{}_distance_distribution.png",
        team.replace(' ', "_"),
        year
    )
}

/// 最小値〜最大値を `bins` 等分する（最大値は最後の区間に含める）
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // 全て同じ値なら幅1の区間にする
    let (min, max) = if max > min { (min, max) } else { (min - 0.5, min + 0.5) };
    let width = (max - min) / bins as f64;

    let mut result: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: min + width * i as f64,
            end: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for &value in values {
        let index = (((value - min) / width) as usize).min(bins - 1);
        result[index].count += 1;
    }
    result
}

/// ガウスカーネル密度推定（Scottの帯域幅）を件数スケールで返す
///
/// 標本が2件未満、または分散が0の場合は空。
pub fn kde_curve(values: &[f64], bin_width: f64, points: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    if n < 2 || points < 2 {
        return Vec::new();
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return Vec::new();
    }

    let bandwidth = std_dev * (n as f64).powf(-0.2);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let step = (max - min) / (points - 1) as f64;
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let scale = n as f64 * bin_width;

    (0..points)
        .map(|i| {
            let x = min + step * i as f64;
            let density: f64 = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density * scale)
        })
        .collect()
}

/// 詳細CSVを読み込み、年度・チームごとの距離にまとめる
pub fn read_detailed(path: &Path) -> Result<BTreeMap<(u16, String), Vec<f64>>, ScraperError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut groups: BTreeMap<(u16, String), Vec<f64>> = BTreeMap::new();

    for row in reader.deserialize() {
        let row: DetailedDistance = row?;
        groups
            .entry((row.year, row.team))
            .or_default()
            .push(row.distance_km);
    }
    Ok(groups)
}

/// 1チーム分のヒストグラムを描画する
pub fn draw_histogram(
    path: &Path,
    team: &str,
    year: u16,
    distances: &[f64],
) -> Result<(), ScraperError> {
    let bins = histogram_bins(distances, BINS);
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return Err(ScraperError::Plot(format!("{} ({}) に距離データがありません", team, year)));
    };
    let bin_width = first.end - first.start;
    let curve = kde_curve(distances, bin_width, KDE_POINTS);

    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(1) as f64;
    let max_curve = curve.iter().map(|(_, y)| *y).fold(0.0, f64::max);
    let y_max = max_count.max(max_curve) * 1.1;

    let root = BitMapBackend::new(path, IMAGE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Distance Distribution for {} ({})", team, year),
            ("sans-serif", 28).into_font(),
        )
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(first.start..last.end, 0.0..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Distance from Hometown to University (km)")
        .y_desc("Number of Players")
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(bins.iter().map(|bin| {
            Rectangle::new(
                [(bin.start, 0.0), (bin.end, bin.count as f64)],
                BAR_COLOR.filled(),
            )
        }))
        .map_err(plot_error)?;

    if !curve.is_empty() {
        chart
            .draw_series(LineSeries::new(curve, KDE_COLOR.stroke_width(2)))
            .map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    Ok(())
}

/// 詳細CSVから年度・チームごとのヒストグラムを書き出し、作成したファイルを返す
pub fn plot_distributions(
    detailed_csv: &Path,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, ScraperError> {
    let groups = read_detailed(detailed_csv)?;
    let mut written = Vec::new();

    for ((year, team), distances) in &groups {
        if distances.is_empty() {
            warn!("{} ({}) の距離データがないためスキップ", team, year);
            continue;
        }

        let year_dir = output_dir.join(year.to_string());
        std::fs::create_dir_all(&year_dir)?;

        let path = year_dir.join(plot_file_name(team, *year));
        draw_histogram(&path, team, *year, distances)?;
        info!("グラフを保存: {:?}", path);
        written.push(path);
    }

    Ok(written)
}
