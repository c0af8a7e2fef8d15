//! ロスター表スクレイパーの型定義

use std::path::PathBuf;
use std::time::Duration;

/// チーム一覧ページのリンク
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamLink {
    pub name: String,
    pub href: String,
}

impl TeamLink {
    /// `/2023/team/8/index.html` → `8`
    pub fn team_id(&self) -> Option<&str> {
        let mut segments = self.href.split('/').filter(|s| !s.is_empty());
        segments.find(|s| *s == "team")?;
        segments.next().filter(|id| *id != "index.html")
    }

    /// `<Team_Name>_roster.csv`
    pub fn file_name(&self) -> String {
        format!("{}_roster.csv", self.name.replace(' ', "_"))
    }
}

/// `table.team-roster` の内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 列数がヘッダーと一致せず読み飛ばした行数
    pub skipped_rows: usize,
}

/// 年度ごとの結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearSummary {
    pub year: u16,
    pub teams_found: usize,
    pub rosters_written: Vec<PathBuf>,
    pub teams_failed: usize,
}

/// ロスター表スクレイパーの設定
#[derive(Debug, Clone)]
pub struct TableScrapeConfig {
    pub base_url: String,
    /// `<output_dir>/<year>/` に書き出す
    pub output_dir: PathBuf,
    /// チーム間の待機時間
    pub request_delay: Duration,
    pub timeout: Duration,
}

impl Default for TableScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cfbstats.com".to_string(),
            output_dir: PathBuf::from("."),
            request_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TableScrapeConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }
}
