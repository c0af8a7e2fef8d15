use std::time::Duration;

use thiserror::Error;

use crate::retry;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("抽出エラー: {0}")]
    Extraction(String),

    #[error("ジオコーディングエラー: {0}")]
    Geocode(String),

    #[error("不正なURL: {0}")]
    InvalidUrl(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("グラフ描画エラー: {0}")]
    Plot(String),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// エラーメッセージにレートリミットのシグネチャが含まれるか
    pub fn is_rate_limit(&self) -> bool {
        retry::is_rate_limit_signal(&self.to_string())
    }

    /// メッセージに埋め込まれた待機時間 (`try again in 1m24.14s`)
    pub fn rate_limit_wait(&self) -> Option<Duration> {
        retry::parse_rate_limit_wait(&self.to_string())
    }
}
