//! 出身地から大学までの距離計算

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::extract::UNKNOWN;

use super::geocode::{usable_location, CachedGeocoder, Geocoder};
use super::types::{Coordinates, DetailedDistance, DistanceConfig, DistanceReport, TeamAverage};

/// 地球の平均半径 (km)
const EARTH_RADIUS_KM: f64 = 6371.0088;

const ROSTER_SUFFIX: &str = "_roster.csv";

pub const DETAILED_FILE: &str = "detailed_player_distances.csv";
pub const AVERAGE_FILE: &str = "average_team_distances.csv";

const DETAILED_HEADER: [&str; 5] = ["Year", "Team", "Player", "Hometown", "Distance (km)"];
const AVERAGE_HEADER: [&str; 6] = [
    "Year",
    "Team",
    "Average Distance (km)",
    "Player Count",
    "Players with Hometown",
    "Missing Hometown",
];

/// 大圏距離（haversine）
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `Team,Location` のCSVを読む（場所が空欄や `-` の行は除外）
pub fn load_team_locations(path: &Path) -> Result<HashMap<String, String>, ScraperError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let team_col = headers.iter().position(|h| h.trim() == "Team");
    let location_col = headers.iter().position(|h| h.trim() == "Location");

    let (Some(team_col), Some(location_col)) = (team_col, location_col) else {
        return Err(ScraperError::Config(format!(
            "{:?} に Team, Location 列がありません",
            path
        )));
    };

    let mut locations = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let team = record.get(team_col).map(str::trim).unwrap_or_default();
        let Some(location) = record.get(location_col).and_then(usable_location) else {
            continue;
        };
        if !team.is_empty() {
            locations.insert(team.to_string(), location.to_string());
        }
    }
    Ok(locations)
}

/// `Air_Force_roster.csv` → `Air Force`
pub fn team_name_from_file(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(ROSTER_SUFFIX)?;
    Some(stem.replace('_', " "))
}

fn roster_files(dir: &Path) -> Result<Vec<PathBuf>, ScraperError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| team_name_from_file(path).is_some())
        .collect();
    files.sort();
    Ok(files)
}

/// 選手名と出身地（列が無い場合は空）
fn read_roster(path: &Path) -> Result<Vec<(String, String)>, ScraperError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let name_col = headers.iter().position(|h| h.trim() == "Name");
    let hometown_col = headers.iter().position(|h| h.trim() == "Hometown");

    let mut players = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = name_col
            .and_then(|i| record.get(i))
            .unwrap_or(UNKNOWN)
            .to_string();
        let hometown = hometown_col
            .and_then(|i| record.get(i))
            .unwrap_or_default()
            .to_string();
        players.push((name, hometown));
    }
    Ok(players)
}

/// ロスターCSVから距離を集計する
pub struct DistanceCalculator<G> {
    config: DistanceConfig,
    geocoder: CachedGeocoder<G>,
    team_locations: HashMap<String, String>,
}

impl<G: Geocoder> DistanceCalculator<G> {
    pub fn new(config: DistanceConfig, geocoder: G, team_locations: HashMap<String, String>) -> Self {
        Self {
            config,
            geocoder: CachedGeocoder::new(geocoder),
            team_locations,
        }
    }

    /// 設定の team_locations ファイルを読み込んで作成
    pub fn from_config(config: DistanceConfig, geocoder: G) -> Result<Self, ScraperError> {
        let team_locations = load_team_locations(&config.team_locations)?;
        info!("大学所在地{}件を読み込み", team_locations.len());
        Ok(Self::new(config, geocoder, team_locations))
    }

    pub async fn run(&self, years: &[u16]) -> Result<DistanceReport, ScraperError> {
        let mut report = DistanceReport::default();

        for &year in years {
            let dir = self.config.roster_dir.join(year.to_string());
            if !dir.is_dir() {
                info!("ディレクトリ {:?} が存在しないため{}年をスキップ", dir, year);
                continue;
            }

            let files = roster_files(&dir)?;
            info!("{}年のロスターを処理中: {}ファイル", year, files.len());

            for file in files {
                if let Some(team) = team_name_from_file(&file) {
                    self.process_team(year, &team, &file, &mut report).await?;
                }
            }
        }

        Ok(report)
    }

    async fn process_team(
        &self,
        year: u16,
        team: &str,
        file: &Path,
        report: &mut DistanceReport,
    ) -> Result<(), ScraperError> {
        let Some(university_location) = self.team_locations.get(team) else {
            warn!("大学所在地が見つかりません: '{}'", team);
            return Ok(());
        };
        let Some(university) = self.geocoder.locate(university_location).await else {
            warn!(
                "大学所在地をジオコーディングできません '{}': {}",
                team, university_location
            );
            return Ok(());
        };

        let players = read_roster(file)?;
        let mut distances = Vec::new();
        let mut missing = 0usize;

        for (player, hometown) in &players {
            let Some(home) = self.geocoder.locate(hometown).await else {
                missing += 1;
                continue;
            };

            let distance = haversine_km(home, university);
            distances.push(distance);
            report.detailed.push(DetailedDistance {
                year,
                team: team.to_string(),
                player: player.clone(),
                hometown: hometown.clone(),
                distance_km: round2(distance),
            });

            sleep(self.config.geocode_delay).await;
        }

        let average_km = if distances.is_empty() {
            warn!("有効な距離を計算できた選手がいません: '{}' ({}年)", team, year);
            None
        } else {
            let average = distances.iter().sum::<f64>() / distances.len() as f64;
            info!("平均距離 '{}' ({}年): {:.2} km", team, year, average);
            Some(round2(average))
        };

        report.averages.push(TeamAverage {
            year,
            team: team.to_string(),
            average_km,
            player_count: players.len(),
            players_with_hometown: distances.len(),
            missing_hometown: missing,
        });

        Ok(())
    }
}

/// 2つのCSVを書き出してパスを返す
pub fn write_report(
    report: &DistanceReport,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf), ScraperError> {
    std::fs::create_dir_all(output_dir)?;

    let detailed_path = output_dir.join(DETAILED_FILE);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&detailed_path)?;
    writer.write_record(DETAILED_HEADER)?;
    for row in &report.detailed {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let average_path = output_dir.join(AVERAGE_FILE);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&average_path)?;
    writer.write_record(AVERAGE_HEADER)?;
    for row in &report.averages {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("選手別距離を保存: {:?}", detailed_path);
    info!("チーム別平均距離を保存: {:?}", average_path);
    Ok((detailed_path, average_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine() {
        let origin = Coordinates::new(0.0, 0.0);
        let one_degree = haversine_km(origin, Coordinates::new(0.0, 1.0));
        assert!((one_degree - 111.195).abs() < 0.01);
        assert_eq!(haversine_km(origin, origin), 0.0);

        // Austin → Los Angeles は約1972km
        let austin = Coordinates::new(30.2672, -97.7431);
        let los_angeles = Coordinates::new(34.0522, -118.2437);
        let d = haversine_km(austin, los_angeles);
        assert!((1960.0..1985.0).contains(&d), "{}", d);
        assert!((haversine_km(los_angeles, austin) - d).abs() < 1e-9);
    }

    #[test]
    fn test_team_name_from_file() {
        assert_eq!(
            team_name_from_file(Path::new("2023/Air_Force_roster.csv")),
            Some("Air Force".to_string())
        );
        assert_eq!(team_name_from_file(Path::new("2023/notes.csv")), None);
    }

    #[test]
    fn test_load_team_locations_skips_unusable_rows() {
        let dir = std::env::temp_dir().join(format!("roster-locations-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("team_locations.csv");
        std::fs::write(
            &path,
            "Team,Location\nTexas,\"Austin, TX\"\nRice,-\n,\"Provo, UT\"\nArmy, \nNavy,\" Annapolis, MD \"\n",
        )
        .unwrap();

        let locations = load_team_locations(&path).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations["Texas"], "Austin, TX");
        assert_eq!(locations["Navy"], "Annapolis, MD");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_team_locations_requires_columns() {
        let dir = std::env::temp_dir().join(format!("roster-locations-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("team_locations.csv");
        std::fs::write(&path, "School,City\nTexas,Austin\n").unwrap();

        assert!(matches!(load_team_locations(&path), Err(ScraperError::Config(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1234.5678), 1234.57);
        assert_eq!(round2(0.004), 0.0);
    }
}
