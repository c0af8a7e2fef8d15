//! 距離計算モジュール
//!
//! 選手の出身地と大学所在地をジオコーディングし、大圏距離を年度・チーム別に集計する。
//! 集計結果からチームごとの距離分布グラフも出力できる。

mod calculator;
mod geocode;
mod plot;
mod types;

pub use calculator::{
    haversine_km, load_team_locations, team_name_from_file, write_report, DistanceCalculator,
    AVERAGE_FILE, DETAILED_FILE,
};
pub use plot::{
    draw_histogram, histogram_bins, kde_curve, plot_distributions, plot_file_name, read_detailed,
    Bin, PLOT_DIR,
};
pub use geocode::{usable_location, CachedGeocoder, Geocoder, NominatimGeocoder};
pub use types::{
    Coordinates, DetailedDistance, DistanceConfig, DistanceReport, TeamAverage,
};
