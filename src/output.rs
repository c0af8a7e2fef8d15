//! CSV出力と失敗ログ

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::ScraperError;
use crate::extract::PlayerRecord;

/// ロスターCSVのヘッダー
pub const PLAYER_HEADER: [&str; 3] = ["Name", "Hometown", "High School"];

/// 選手リストをCSVに書き出す（既存ファイルは上書き）
pub fn write_players_csv(path: &Path, players: &[PlayerRecord]) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(PLAYER_HEADER)?;
    for player in players {
        writer.write_record([
            player.name.trim(),
            player.hometown.trim(),
            player.high_school.trim(),
        ])?;
    }
    writer.flush()?;

    info!("選手{}人を保存: {:?}", players.len(), path);
    Ok(())
}

/// 失敗したURLを追記するログファイル
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// リトライを使い切ったURL
    pub async fn append(&self, url: &str, message: &str) {
        self.write_line(format!("Failed to process {}: {}\n", url, single_line(message)))
            .await;
    }

    /// ワーカー側で捕捉されなかった失敗
    pub async fn append_unexpected(&self, url: &str, message: &str) {
        self.write_line(format!("Failed to complete {}: {}\n", url, single_line(message)))
            .await;
    }

    async fn write_line(&self, line: String) {
        let _guard = self.lock.lock().await;

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            error!("失敗ログの書き込みに失敗 {:?}: {}", self.path, e);
        }
    }
}

fn single_line(message: &str) -> String {
    message.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}
