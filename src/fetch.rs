//! ヘッドレスブラウザでのページ取得
//!
//! 試行ごとに新しいブラウザを起動し、どの経路で抜けても必ず終了させる。

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::ScraperError;
use crate::traits::PageFetcher;

const SCROLL_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// クローズ後にプロセス終了を待つ上限
const BROWSER_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 終了処理で使うブラウザプロセスの操作
#[async_trait]
trait BrowserProcess: Send {
    /// CDP経由で閉じる
    async fn request_close(&mut self) -> Result<(), String>;
    /// プロセスを強制終了する
    async fn force_kill(&mut self);
    /// プロセスの終了を待つ
    async fn wait_exit(&mut self) -> Result<(), String>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> Result<(), String> {
        self.close().await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn force_kill(&mut self) {
        if let Some(Err(e)) = self.kill().await {
            debug!("ブラウザプロセスの強制終了に失敗: {}", e);
        }
    }

    async fn wait_exit(&mut self) -> Result<(), String> {
        self.wait().await.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// 終了処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Graceful,
    Killed,
}

/// 閉じられない・終了しないブラウザは強制終了する（待機は `limit` まで）
async fn shutdown<P: BrowserProcess>(process: &mut P, limit: Duration) -> Shutdown {
    let mut outcome = Shutdown::Graceful;

    if let Err(e) = process.request_close().await {
        debug!("ブラウザのクローズに失敗: {}", e);
        process.force_kill().await;
        outcome = Shutdown::Killed;
    }

    match tokio::time::timeout(limit, process.wait_exit()).await {
        Ok(Ok(())) => outcome,
        Ok(Err(e)) => {
            debug!("ブラウザ終了待ちに失敗: {}", e);
            outcome
        }
        Err(_) => {
            warn!("ブラウザが{:?}以内に終了しないため強制終了", limit);
            process.force_kill().await;
            Shutdown::Killed
        }
    }
}

/// 起動中のブラウザ1つ分
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl BrowserSession {
    /// ブラウザを閉じてプロセスの終了を待つ
    async fn close(mut self) {
        if shutdown(&mut self.browser, BROWSER_EXIT_TIMEOUT).await == Shutdown::Killed {
            debug!("ブラウザを強制終了: {:?}", self.user_data_dir);
        }
        self.handler.abort();

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("ユーザーデータディレクトリの削除に失敗 {:?}: {}", self.user_data_dir, e);
        }
    }
}

/// chromiumoxide を使った `PageFetcher`
#[derive(Debug, Clone, Default)]
pub struct BrowserFetcher {
    config: FetchConfig,
}

impl BrowserFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn launch(&self) -> Result<BrowserSession, ScraperError> {
        // ワーカー間で衝突しないユーザーデータディレクトリ
        let unique_id = format!(
            "{}-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let user_data_dir = std::env::temp_dir().join(format!("roster-scraper-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(1280, 800)
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(path) = self.config.chrome_executable() {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        Ok(BrowserSession {
            browser,
            handler,
            user_data_dir,
        })
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<String, ScraperError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let result = self.load_and_scroll(&page, url).await;

        if result.is_err() && self.config.debug {
            self.log_screenshot(&page).await;
        }
        if let Err(e) = page.close().await {
            debug!("ページのクローズに失敗: {}", e);
        }

        result
    }

    async fn load_and_scroll(&self, page: &Page, url: &str) -> Result<String, ScraperError> {
        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(self.config.page_load_timeout, navigation).await {
            Ok(Ok(())) => debug!("ページ読み込み完了: {}", url),
            Ok(Err(e)) => return Err(ScraperError::Navigation(format!("{}: {}", url, e))),
            Err(_) => {
                return Err(ScraperError::Timeout(format!(
                    "ページ読み込みが{:?}を超過: {}",
                    self.config.page_load_timeout, url
                )))
            }
        }

        self.scroll_until_stable(page).await?;

        page.content()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))
    }

    /// 高さが変わらなくなるまでスクロールして遅延読み込みを発火させる
    async fn scroll_until_stable(&self, page: &Page) -> Result<(), ScraperError> {
        let mut last_height = scroll_height(page).await?;

        for i in 0..self.config.max_scroll_iterations {
            page.evaluate(SCROLL_TO_BOTTOM_SCRIPT)
                .await
                .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
            sleep(self.config.scroll_pause).await;

            let new_height = scroll_height(page).await?;
            if new_height == last_height {
                debug!("ページ高さが安定 ({}px, スクロール{}回)", new_height, i + 1);
                return Ok(());
            }
            last_height = new_height;
        }

        Err(ScraperError::Timeout(format!(
            "スクロール{}回後もページ高さが増加中",
            self.config.max_scroll_iterations
        )))
    }

    async fn log_screenshot(&self, page: &Page) {
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(screenshot) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
                debug!("失敗時のスクリーンショット: data:image/png;base64,{}", encoded);
            }
            Err(e) => debug!("スクリーンショットの取得に失敗: {}", e),
        }
    }
}

async fn scroll_height(page: &Page) -> Result<i64, ScraperError> {
    page.evaluate(SCROLL_HEIGHT_SCRIPT)
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?
        .into_value::<i64>()
        .map_err(|e| ScraperError::JavaScript(e.to_string()))
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        info!("ブラウザを起動中: {}", url);
        let session = self.launch().await?;

        let result = self.render(&session.browser, url).await;
        session.close().await;

        match &result {
            Ok(html) => info!("取得完了 {} ({} bytes)", url, html.len()),
            Err(e) => warn!("取得に失敗 {}: {}", url, e),
        }
        result
    }
}
