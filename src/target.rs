//! URLリストの読み込みと重複スキップ判定

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::ScraperError;

/// 出力ファイル名のサフィックス
const OUTPUT_SUFFIX: &str = "players_data.csv";

/// 対象のロスターページ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    url: Url,
    site: String,
    segment: String,
}

impl TargetUrl {
    /// `http`/`https` の絶対URLのみ受け付ける
    pub fn parse(raw: &str) -> Result<Self, ScraperError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", raw, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ScraperError::InvalidUrl(format!(
                "{}: 未対応のスキーム {}",
                raw,
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ScraperError::InvalidUrl(format!("{}: ホストがありません", raw)))?;
        let site = host.split('.').next().unwrap_or(host).to_string();

        let segment = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default()
            .to_string();

        Ok(Self { url, site, segment })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// ホスト名の先頭ラベル
    pub fn site(&self) -> &str {
        &self.site
    }

    /// パスの最後のセグメント（通常は年度）
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// `<site>_<segment>_players_data.csv`
    pub fn output_file_name(&self) -> String {
        format!("{}_{}_{}", self.site, self.segment, OUTPUT_SUFFIX)
    }

    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.output_file_name())
    }

    /// 出力済みならスキップ対象
    pub fn is_already_scraped(&self, output_dir: &Path) -> bool {
        self.output_path(output_dir).exists()
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// テキストからURLを抽出（ラベル行や空行は無視）
pub fn parse_url_list(content: &str) -> Vec<TargetUrl> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match TargetUrl::parse(line) {
            Ok(target) => Some(target),
            Err(e) => {
                debug!("URLリストの行を無視: {}", e);
                None
            }
        })
        .collect()
}

/// URLリストファイルを読み込む
pub fn read_url_list(path: &Path) -> Result<Vec<TargetUrl>, ScraperError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_url_list(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_key() {
        let target = TargetUrl::parse("https://gohuskies.com/sports/football/roster/2022").unwrap();
        assert_eq!(target.site(), "gohuskies");
        assert_eq!(target.segment(), "2022");
        assert_eq!(target.output_file_name(), "gohuskies_2022_players_data.csv");

        let target = TargetUrl::parse("https://www.example.edu/roster/2019/").unwrap();
        assert_eq!(target.site(), "www");
        assert_eq!(target.segment(), "2019");
    }

    #[test]
    fn test_parse_url_list_strict() {
        let content = "Baylor:\nhttps://baylorbears.com/sports/football/roster/2018\n\n  \nftp://files.example.com/roster\nnot a url\nhttp://a.example.com/x/2020\n";
        let targets = parse_url_list(content);
        let urls: Vec<&str> = targets.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://baylorbears.com/sports/football/roster/2018",
                "http://a.example.com/x/2020"
            ]
        );
    }

    #[test]
    fn test_is_already_scraped() {
        let dir = std::env::temp_dir().join(format!("roster-target-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let target = TargetUrl::parse("https://gousc.com/sports/football/roster/2021").unwrap();
        assert!(!target.is_already_scraped(&dir));

        std::fs::write(target.output_path(&dir), "Name,Hometown,High School\n").unwrap();
        assert!(target.is_already_scraped(&dir));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
