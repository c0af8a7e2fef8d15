//! カレッジフットボールのロスターデータ収集ライブラリ
//!
//! - ロスターページをヘッドレスブラウザで描画し、LLMで選手の出身地・出身高校を抽出してCSV保存
//! - cfbstats のロスター表を年度別にCSV保存
//! - 出身地と大学所在地の距離を集計し、チームごとの分布グラフを出力
//!
//! # ロスター抽出の使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use roster_scraper::{
//!     BrowserFetcher, ExtractionConfig, FetchConfig, LlmExtractor, PipelineConfig, RosterPipeline,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let extraction = ExtractionConfig::from_env().unwrap();
//!     let prompt = extraction.prompt.clone();
//!
//!     let pipeline = RosterPipeline::new(
//!         PipelineConfig::new().with_workers(5),
//!         Arc::new(BrowserFetcher::new(FetchConfig::default())),
//!         Arc::new(LlmExtractor::new(extraction).unwrap()),
//!         prompt,
//!     );
//!
//!     let summary = pipeline.run_from_file().await.unwrap();
//!     println!("failed: {}", summary.failed());
//! }
//! ```
//!
//! # 距離計算の使用例
//!
//! ```rust,ignore
//! use roster_scraper::distance::{write_report, DistanceCalculator, DistanceConfig, NominatimGeocoder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DistanceConfig::default();
//!     let output_dir = config.output_dir.clone();
//!     let calculator = DistanceCalculator::from_config(config, NominatimGeocoder::new().unwrap()).unwrap();
//!     let report = calculator.run(&[2018, 2019]).await.unwrap();
//!     write_report(&report, &output_dir).unwrap();
//! }
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod reduce;
pub mod retry;
pub mod service;
pub mod tables;
pub mod target;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{ExtractionConfig, FetchConfig, PipelineConfig, DEFAULT_PROMPT};
pub use error::ScraperError;
pub use extract::{players_from_response, LlmExtractor, PlayerRecord};
pub use fetch::BrowserFetcher;
pub use output::{write_players_csv, FailureLog};
pub use pipeline::{RosterPipeline, RunSummary};
pub use reduce::reduce_markup;
pub use retry::{parse_rate_limit_wait, RetryPolicy};
pub use service::{RosterService, TaskOutcome};
pub use target::{read_url_list, TargetUrl};
pub use traits::{Extractor, PageFetcher};

// ロスター表スクレイパー
pub use tables::{TableScrapeConfig, TableScraper};
