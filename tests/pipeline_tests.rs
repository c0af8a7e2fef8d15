use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use roster_scraper::{
    Extractor, PageFetcher, PipelineConfig, RosterPipeline, ScraperError, TargetUrl, TaskOutcome,
};
use serde_json::{json, Value};

/// URLをそのまま本文に埋め込んだHTMLを返す
#[derive(Default)]
struct FakeFetcher {
    calls: AtomicUsize,
    delays: HashMap<String, Duration>,
    panic_on: Option<String>,
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(url) {
            panic!("browser crashed");
        }
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        Ok(format!(
            "<html><head><script>track()</script></head><body><p>{}</p></body></html>",
            url
        ))
    }
}

/// URLごとに用意した結果を順に返し、尽きたら選手2人を返す
#[derive(Default)]
struct FakeExtractor {
    calls: AtomicUsize,
    scripts: Mutex<HashMap<String, VecDeque<Result<Value, String>>>>,
}

impl FakeExtractor {
    fn script(self, url: &str, results: Vec<Result<Value, String>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), results.into());
        self
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, markup: &str, _prompt: &str) -> Result<Value, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!markup.contains("track()"));

        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .iter_mut()
                .find(|(url, _)| markup.contains(url.as_str()))
                .and_then(|(_, queue)| queue.pop_front())
        };

        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ScraperError::Extraction(message)),
            None => Ok(json!({
                "players": [
                    {"name": "A", "hometown": "X"},
                    {"name": "B"}
                ]
            })),
        }
    }
}

struct TestDir(PathBuf);

impl TestDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "roster-pipeline-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_output_dir(self.0.join("Data"))
            .with_failure_log(self.0.join("failed_urls.log"))
            .with_url_list(self.0.join("url_list.txt"))
    }

    fn failure_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.0.join("failed_urls.log"))
            .map(|c| c.lines().map(String::from).collect())
            .unwrap_or_default()
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn pipeline(
    dir: &TestDir,
    fetcher: Arc<FakeFetcher>,
    extractor: Arc<FakeExtractor>,
) -> RosterPipeline {
    RosterPipeline::new(dir.config(), fetcher, extractor, "Extract players.")
}

fn target(url: &str) -> TargetUrl {
    TargetUrl::parse(url).unwrap()
}

#[tokio::test]
async fn writes_csv_with_sentinels() {
    let dir = TestDir::new("csv");
    let fetcher = Arc::new(FakeFetcher::default());
    let extractor = Arc::new(FakeExtractor::default());
    let pipeline = pipeline(&dir, fetcher, extractor);

    let url = "https://gohuskies.com/sports/football/roster/2022";
    let summary = pipeline.run(vec![target(url)]).await.unwrap();
    assert_eq!(summary.succeeded(), 1);

    let csv = std::fs::read_to_string(
        dir.path()
            .join("Data")
            .join("gohuskies_2022_players_data.csv"),
    )
    .unwrap();
    assert_eq!(csv, "Name,Hometown,High School\nA,X,Unknown\nB,Unknown,Unknown\n");
    assert!(dir.failure_lines().is_empty());
}

#[tokio::test]
async fn existing_csv_skips_fetch_and_extraction() {
    let dir = TestDir::new("dedup");
    let fetcher = Arc::new(FakeFetcher::default());
    let extractor = Arc::new(FakeExtractor::default());
    let pipeline = pipeline(&dir, fetcher.clone(), extractor.clone());

    let urls = vec![
        target("https://a.example.com/roster/2020"),
        target("https://b.example.com/roster/2021"),
    ];

    let first = pipeline.run(urls.clone()).await.unwrap();
    assert_eq!(first.succeeded(), 2);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);

    let second = pipeline.run(urls).await.unwrap();
    assert_eq!(second.skipped(), 2);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn three_failures_log_exactly_once() {
    let dir = TestDir::new("fail");
    let url = "https://broken.example.com/roster/2019";
    let fetcher = Arc::new(FakeFetcher::default());
    let extractor = Arc::new(FakeExtractor::default().script(
        url,
        vec![
            Err("status 500: upstream error".into()),
            Err("status 500: upstream error".into()),
            Err("status 502: bad gateway".into()),
        ],
    ));
    let pipeline = pipeline(&dir, fetcher.clone(), extractor.clone());

    let summary = pipeline.run(vec![target(url)]).await.unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        dir.failure_lines(),
        vec![format!(
            "Failed to process {}: 抽出エラー: status 502: bad gateway",
            url
        )]
    );
    assert!(!dir
        .path()
        .join("Data")
        .join("broken_2019_players_data.csv")
        .exists());
}

#[tokio::test(start_paused = true)]
async fn rate_limits_do_not_consume_retry_budget() {
    let dir = TestDir::new("ratelimit");
    let url = "https://limited.example.com/roster/2018";
    let limited = "status 429: rate_limit_exceeded: Please try again in 0m2.5s.";
    let fetcher = Arc::new(FakeFetcher::default());
    let extractor = Arc::new(FakeExtractor::default().script(
        url,
        vec![
            Err(limited.into()),
            Err(limited.into()),
            Err("status 500: flaky".into()),
            Err("status 500: flaky".into()),
        ],
    ));
    let pipeline = pipeline(&dir, fetcher, extractor.clone());

    let start = tokio::time::Instant::now();
    let summary = pipeline.run(vec![target(url)]).await.unwrap();

    assert!(matches!(
        summary.get(url),
        Some(TaskOutcome::Success { players: 2, .. })
    ));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 5);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(dir.failure_lines().is_empty());
}

#[tokio::test]
async fn panicking_worker_is_logged_by_driver() {
    let dir = TestDir::new("panic");
    let bad = "https://crash.example.com/roster/2020";
    let good = "https://fine.example.com/roster/2020";
    let fetcher = Arc::new(FakeFetcher {
        panic_on: Some(bad.to_string()),
        ..Default::default()
    });
    let extractor = Arc::new(FakeExtractor::default());
    let pipeline = pipeline(&dir, fetcher, extractor);

    let summary = pipeline.run(vec![target(bad), target(good)]).await.unwrap();

    assert!(summary.get(good).unwrap().is_success());
    assert!(summary.get(bad).unwrap().is_failed());

    let lines = dir.failure_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(&format!("Failed to complete {}: ", bad)));
}

#[tokio::test(start_paused = true)]
async fn outcomes_arrive_in_completion_order() {
    let dir = TestDir::new("order");
    let slow = "https://slow.example.com/roster/2021";
    let fast = "https://fast.example.com/roster/2021";
    let fetcher = Arc::new(FakeFetcher {
        delays: HashMap::from([
            (slow.to_string(), Duration::from_secs(30)),
            (fast.to_string(), Duration::from_secs(1)),
        ]),
        ..Default::default()
    });
    let extractor = Arc::new(FakeExtractor::default());
    let pipeline = pipeline(&dir, fetcher, extractor);

    let summary = pipeline.run(vec![target(slow), target(fast)]).await.unwrap();

    let order: Vec<&str> = summary.outcomes.iter().map(|(u, _)| u.as_str()).collect();
    assert_eq!(order, vec![fast, slow]);
}

#[tokio::test]
async fn run_from_file_uses_strict_url_rule() {
    let dir = TestDir::new("file");
    std::fs::write(
        dir.path().join("url_list.txt"),
        "Baylor:\nhttps://baylorbears.com/sports/football/roster/2018\n\nnot-a-url\n",
    )
    .unwrap();

    let fetcher = Arc::new(FakeFetcher::default());
    let extractor = Arc::new(FakeExtractor::default());
    let pipeline = pipeline(&dir, fetcher.clone(), extractor);

    let summary = pipeline.run_from_file().await.unwrap();
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert!(dir
        .path()
        .join("Data")
        .join("baylorbears_2018_players_data.csv")
        .exists());
}

/// 同時に実行中の取得数を記録する
#[derive(Default)]
struct GaugeFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl PageFetcher for GaugeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(200)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("<html><body><p>{}</p></body></html>", url))
    }
}

#[tokio::test(start_paused = true)]
async fn worker_pool_never_exceeds_configured_size() {
    let dir = TestDir::new("pool");
    let fetcher = Arc::new(GaugeFetcher::default());
    let extractor = Arc::new(FakeExtractor::default());
    let pipeline = RosterPipeline::new(
        dir.config().with_workers(5),
        fetcher.clone(),
        extractor,
        "Extract players.",
    );

    let targets: Vec<TargetUrl> = (0..40)
        .map(|i| target(&format!("https://team{}.example.com/roster/2020", i)))
        .collect();
    let summary = pipeline.run(targets).await.unwrap();

    assert_eq!(summary.outcomes.len(), 40);
    assert_eq!(summary.succeeded(), 40);
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 5);
    assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
}
