//! 並列実行ドライバ
//!
//! URLごとのワークフローを固定数のワーカーで実行し、完了順に結果を集める。

use std::sync::Arc;
use std::time::Instant;

use futures::future::poll_fn;
use futures::StreamExt;
use tower::Service;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::ScraperError;
use crate::output::FailureLog;
use crate::retry::RetryPolicy;
use crate::service::{RosterService, TaskOutcome};
use crate::target::{read_url_list, TargetUrl};
use crate::traits::{Extractor, PageFetcher};

/// 1回の実行結果（完了順）
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(String, TaskOutcome)>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }

    pub fn get(&self, url: &str) -> Option<&TaskOutcome> {
        self.outcomes
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, outcome)| outcome)
    }
}

/// ロスター抽出パイプライン
pub struct RosterPipeline {
    config: PipelineConfig,
    service: RosterService,
}

impl RosterPipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        prompt: impl Into<String>,
    ) -> Self {
        let failure_log = Arc::new(FailureLog::new(config.failure_log.clone()));
        let service = RosterService::new(
            fetcher,
            extractor,
            config.output_dir.clone(),
            prompt,
            RetryPolicy::new(config.max_retries),
            failure_log,
        );
        Self { config, service }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 設定のURLリストを読み込んで実行
    pub async fn run_from_file(&self) -> Result<RunSummary, ScraperError> {
        let targets = read_url_list(&self.config.url_list)?;
        info!(
            "URL {}件を読み込み: {:?}",
            targets.len(),
            self.config.url_list
        );
        self.run(targets).await
    }

    pub async fn run(&self, targets: Vec<TargetUrl>) -> Result<RunSummary, ScraperError> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let start = Instant::now();
        let total = targets.len();
        let failure_log = self.service.failure_log().clone();

        let mut results = futures::stream::iter(targets.into_iter().map(|target| {
            let mut service = self.service.clone();
            let url = target.to_string();
            let handle = tokio::spawn(async move {
                poll_fn(|cx| service.poll_ready(cx)).await?;
                service.call(target).await
            });
            async move { (url, handle.await) }
        }))
        .buffer_unordered(self.config.workers.max(1));

        let mut summary = RunSummary::default();
        while let Some((url, joined)) = results.next().await {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => unexpected(&failure_log, &url, e.to_string()).await,
                Err(e) => unexpected(&failure_log, &url, e.to_string()).await,
            };

            match &outcome {
                TaskOutcome::Success { players, path } => {
                    info!("完了 {}: 選手{}人 -> {:?}", url, players, path)
                }
                TaskOutcome::Skipped { .. } => info!("スキップ {}", url),
                TaskOutcome::Failed { message } => error!("失敗 {}: {}", url, message),
            }
            summary.outcomes.push((url, outcome));
        }

        info!(
            "実行完了: 成功 {}/{}件, スキップ {}件, 失敗 {}件 ({:?})",
            summary.succeeded(),
            total,
            summary.skipped(),
            summary.failed(),
            start.elapsed()
        );
        Ok(summary)
    }
}

async fn unexpected(failure_log: &FailureLog, url: &str, message: String) -> TaskOutcome {
    error!("想定外の失敗 {}: {}", url, message);
    failure_log.append_unexpected(url, &message).await;
    TaskOutcome::Failed { message }
}
