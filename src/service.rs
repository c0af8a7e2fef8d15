use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::extract::players_from_response;
use crate::output::{write_players_csv, FailureLog};
use crate::reduce::reduce_markup;
use crate::retry::RetryPolicy;
use crate::target::TargetUrl;
use crate::traits::{Extractor, PageFetcher};

/// URL1件の処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 抽出完了。`path` は抽出結果が空（形式不正）のとき `None`
    Success {
        players: usize,
        path: Option<PathBuf>,
    },
    /// 出力済みのためスキップ
    Skipped { path: PathBuf },
    /// リトライを使い切った
    Failed { message: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TaskOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed { .. })
    }
}

struct Inner {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    output_dir: PathBuf,
    prompt: String,
    retry: RetryPolicy,
    failure_log: Arc<FailureLog>,
}

/// tower::Serviceを実装したURL単位のワークフロー
///
/// 重複チェック → リトライ付き (取得 → 縮小 → 抽出 → CSV出力)
#[derive(Clone)]
pub struct RosterService {
    inner: Arc<Inner>,
}

impl RosterService {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        output_dir: impl Into<PathBuf>,
        prompt: impl Into<String>,
        retry: RetryPolicy,
        failure_log: Arc<FailureLog>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                extractor,
                output_dir: output_dir.into(),
                prompt: prompt.into(),
                retry,
                failure_log,
            }),
        }
    }

    pub fn failure_log(&self) -> &Arc<FailureLog> {
        &self.inner.failure_log
    }

    /// URL1件を最後まで処理する
    pub async fn process(&self, target: &TargetUrl) -> TaskOutcome {
        self.inner.process(target).await
    }
}

impl Inner {
    async fn process(&self, target: &TargetUrl) -> TaskOutcome {
        let path = target.output_path(&self.output_dir);
        if target.is_already_scraped(&self.output_dir) {
            info!("{} のCSVは出力済みのためスキップ", target);
            return TaskOutcome::Skipped { path };
        }

        match self.retry.run(target.as_str(), move || self.attempt(target)).await {
            Ok(Some(players)) => TaskOutcome::Success {
                players,
                path: Some(path),
            },
            Ok(None) => TaskOutcome::Success {
                players: 0,
                path: None,
            },
            Err(e) => {
                let message = e.to_string();
                warn!("リトライ上限に達したため中止 {}: {}", target, message);
                self.failure_log.append(target.as_str(), &message).await;
                TaskOutcome::Failed { message }
            }
        }
    }

    async fn attempt(&self, target: &TargetUrl) -> Result<Option<usize>, ScraperError> {
        let html = self.fetcher.fetch(target.as_str()).await?;
        let markup = reduce_markup(&html);
        info!(
            "HTMLを縮小 {}: {} -> {} bytes",
            target,
            html.len(),
            markup.len()
        );

        let response = self.extractor.extract(&markup, &self.prompt).await?;

        let Some(players) = players_from_response(&response) else {
            warn!("{} の抽出結果に選手リストがありません", target);
            return Ok(None);
        };

        write_players_csv(&target.output_path(&self.output_dir), &players)?;
        Ok(Some(players.len()))
    }
}

impl Service<TargetUrl> for RosterService {
    type Response = TaskOutcome;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: TargetUrl) -> Self::Future {
        info!("処理開始: {}", req);

        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.process(&req).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticFetcher;

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, ScraperError> {
            Ok("<html><body><script>x()</script><p>roster</p></body></html>".into())
        }
    }

    struct StaticExtractor(serde_json::Value);

    #[async_trait]
    impl Extractor for StaticExtractor {
        async fn extract(&self, markup: &str, _prompt: &str) -> Result<serde_json::Value, ScraperError> {
            assert!(!markup.contains("x()"));
            Ok(self.0.clone())
        }
    }

    fn service(dir: &std::path::Path, response: serde_json::Value) -> RosterService {
        RosterService::new(
            Arc::new(StaticFetcher),
            Arc::new(StaticExtractor(response)),
            dir,
            "prompt",
            RetryPolicy::default(),
            Arc::new(FailureLog::new(dir.join("failed_urls.log"))),
        )
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("roster-service-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_call_writes_csv() {
        let dir = temp_dir("call");
        let mut svc = service(&dir, json!({"players": [{"name": "A", "hometown": "X"}]}));
        let target = TargetUrl::parse("https://site.example.com/roster/2022").unwrap();

        let outcome = svc.call(target.clone()).await.unwrap();
        assert_eq!(
            outcome,
            TaskOutcome::Success {
                players: 1,
                path: Some(target.output_path(&dir)),
            }
        );

        // 2回目はスキップ
        let outcome = svc.call(target.clone()).await.unwrap();
        assert!(outcome.is_skipped());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_malformed_extraction_is_empty_success() {
        let dir = temp_dir("malformed");
        let svc = service(&dir, json!("no json here"));
        let target = TargetUrl::parse("https://site.example.com/roster/2023").unwrap();

        let outcome = svc.process(&target).await;
        assert_eq!(
            outcome,
            TaskOutcome::Success {
                players: 0,
                path: None
            }
        );
        assert!(!target.output_path(&dir).exists());
        assert!(!dir.join("failed_urls.log").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
