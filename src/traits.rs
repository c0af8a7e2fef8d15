use async_trait::async_trait;

use crate::error::ScraperError;

/// レンダリング済みHTMLの取得
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// URLを開いて最終的なマークアップを返す
    async fn fetch(&self, url: &str) -> Result<String, ScraperError>;
}

/// マークアップから構造化データを抽出する外部サービス
#[async_trait]
pub trait Extractor: Send + Sync {
    /// `players` 配列を含む JSON を期待する。形が違う場合の扱いは呼び出し側が決める。
    async fn extract(&self, markup: &str, prompt: &str) -> Result<serde_json::Value, ScraperError>;
}
