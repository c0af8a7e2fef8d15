//! 静的ページからのロスター表取得

use std::path::{Path, PathBuf};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::ScraperError;

use super::parse::{parse_roster_table, roster_url, team_links};
use super::types::{RosterTable, TableScrapeConfig, TeamLink, YearSummary};

/// cfbstats のロスター表スクレイパー
#[derive(Debug, Clone)]
pub struct TableScraper {
    config: TableScrapeConfig,
    client: reqwest::Client,
}

impl TableScraper {
    pub fn new(config: TableScrapeConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Navigation(format!(
                "ステータス {}: {}",
                status.as_u16(),
                url
            )));
        }
        Ok(response.text().await?)
    }

    /// 複数年度を順に処理する（失敗した年度はログに残して次へ）
    pub async fn scrape_years(&self, years: &[u16]) -> Vec<YearSummary> {
        let mut summaries = Vec::new();
        for &year in years {
            match self.scrape_year(year).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!("{}年のチーム一覧ページ取得に失敗: {}", year, e),
            }
        }
        summaries
    }

    pub async fn scrape_year(&self, year: u16) -> Result<YearSummary, ScraperError> {
        info!("{}年を処理中...", year);

        let year_dir = self.config.output_dir.join(year.to_string());
        std::fs::create_dir_all(&year_dir)?;

        let index_url = format!("{}/{}/team/index.html", self.config.base_url, year);
        let index_html = self.fetch_html(&index_url).await?;
        let teams = team_links(&index_html, year);
        info!("チーム{}件を検出 ({}年)", teams.len(), year);

        let mut summary = YearSummary {
            year,
            teams_found: teams.len(),
            ..Default::default()
        };

        for team in &teams {
            match self.scrape_team(team, year, &year_dir).await {
                Ok(Some(path)) => summary.rosters_written.push(path),
                Ok(None) => {}
                Err(e) => {
                    warn!("ロスター取得に失敗 {} ({}年): {}", team.name, year, e);
                    summary.teams_failed += 1;
                }
            }
            sleep(self.config.request_delay).await;
        }

        Ok(summary)
    }

    async fn scrape_team(
        &self,
        team: &TeamLink,
        year: u16,
        year_dir: &Path,
    ) -> Result<Option<PathBuf>, ScraperError> {
        let Some(team_id) = team.team_id() else {
            warn!("チームIDを取得できません: {}", team.href);
            return Ok(None);
        };

        let url = roster_url(&self.config.base_url, year, team_id);
        info!("チーム処理中 {} (ID: {}): {}", team.name, team_id, url);

        let html = self.fetch_html(&url).await?;
        let Some(table) = parse_roster_table(&html) else {
            warn!("ロスター表が見つかりません {} ({}年)", team.name, year);
            return Ok(None);
        };

        let path = year_dir.join(team.file_name());
        write_roster_csv(&path, &table)?;
        info!("ロスターを保存: {:?} ({}行)", path, table.rows.len());
        Ok(Some(path))
    }
}

/// ロスター表をそのままCSVに書き出す
pub fn write_roster_csv(path: &Path, table: &RosterTable) -> Result<(), ScraperError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
