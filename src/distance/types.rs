//! 距離計算の型定義

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 緯度経度（度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// 選手ごとの距離
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedDistance {
    #[serde(rename = "Year")]
    pub year: u16,
    #[serde(rename = "Team")]
    pub team: String,
    #[serde(rename = "Player")]
    pub player: String,
    #[serde(rename = "Hometown")]
    pub hometown: String,
    #[serde(rename = "Distance (km)")]
    pub distance_km: f64,
}

/// チームごとの平均距離
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAverage {
    #[serde(rename = "Year")]
    pub year: u16,
    #[serde(rename = "Team")]
    pub team: String,
    /// 距離を計算できた選手がいない場合は空
    #[serde(rename = "Average Distance (km)")]
    pub average_km: Option<f64>,
    #[serde(rename = "Player Count")]
    pub player_count: usize,
    #[serde(rename = "Players with Hometown")]
    pub players_with_hometown: usize,
    #[serde(rename = "Missing Hometown")]
    pub missing_hometown: usize,
}

/// 計算結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceReport {
    pub detailed: Vec<DetailedDistance>,
    pub averages: Vec<TeamAverage>,
}

/// 距離計算の設定
#[derive(Debug, Clone)]
pub struct DistanceConfig {
    /// `<roster_dir>/<year>/*_roster.csv` を読む
    pub roster_dir: PathBuf,
    pub team_locations: PathBuf,
    pub output_dir: PathBuf,
    /// ジオコーディングAPIのレート制限用
    pub geocode_delay: Duration,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            roster_dir: PathBuf::from("."),
            team_locations: PathBuf::from("team_locations.csv"),
            output_dir: PathBuf::from("."),
            geocode_delay: Duration::from_secs(1),
        }
    }
}

impl DistanceConfig {
    pub fn with_roster_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.roster_dir = path.into();
        self
    }

    pub fn with_team_locations(mut self, path: impl Into<PathBuf>) -> Self {
        self.team_locations = path.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_geocode_delay(mut self, delay: Duration) -> Self {
        self.geocode_delay = delay;
        self
    }
}
