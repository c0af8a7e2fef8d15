//! roster-scraper CLI

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap::builder::RangedU64ValueParser;
use roster_scraper::config::{MAX_WORKERS, MIN_WORKERS};
use roster_scraper::distance::{
    plot_distributions, write_report, DistanceCalculator, DistanceConfig, NominatimGeocoder,
    DETAILED_FILE, PLOT_DIR,
};
use roster_scraper::{
    BrowserFetcher, ExtractionConfig, FetchConfig, LlmExtractor, PipelineConfig, RosterPipeline,
    TableScrapeConfig, TableScraper,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roster-scraper")]
#[command(about = "College football roster data collection")]
#[command(version)]
struct Cli {
    /// Debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render roster pages and extract players with the LLM service
    Extract {
        /// Newline-delimited list of roster URLs
        #[arg(long, default_value = "url_list.txt")]
        urls: PathBuf,

        /// Directory for <site>_<segment>_players_data.csv files
        #[arg(long, default_value = "Data")]
        output: PathBuf,

        #[arg(long, default_value = "failed_urls.log")]
        failure_log: PathBuf,

        /// Concurrent workers (5 to 10)
        #[arg(
            short,
            long,
            default_value_t = MIN_WORKERS,
            value_parser = RangedU64ValueParser::<usize>::new().range(MIN_WORKERS as u64..=MAX_WORKERS as u64)
        )]
        workers: usize,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Log a screenshot when a page fails to load
        #[arg(long)]
        debug_screenshots: bool,
    },

    /// Scrape cfbstats roster tables into <output>/<year>/<Team>_roster.csv
    Tables {
        #[arg(long = "year", required = true)]
        years: Vec<u16>,

        #[arg(long, default_value = ".")]
        output: PathBuf,

        #[arg(long, default_value = "https://cfbstats.com")]
        base_url: String,
    },

    /// Geocode hometowns and compute distances to each university
    Distances {
        #[arg(long = "year", required = true)]
        years: Vec<u16>,

        /// Directory containing <year>/*_roster.csv
        #[arg(long, default_value = ".")]
        rosters: PathBuf,

        #[arg(long, default_value = "team_locations.csv")]
        team_locations: PathBuf,

        #[arg(long, default_value = ".")]
        output: PathBuf,
    },

    /// Draw one distance histogram per year and team from the detailed CSV
    Plots {
        #[arg(long, default_value = DETAILED_FILE)]
        detailed: PathBuf,

        /// Writes <output>/<year>/<Team>_<year>_distance_distribution.png
        #[arg(long, default_value = PLOT_DIR)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,roster_scraper=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Extract {
            urls,
            output,
            failure_log,
            workers,
            headed,
            debug_screenshots,
        } => {
            let extraction =
                ExtractionConfig::from_env().context("抽出サービスの設定読み込みに失敗")?;
            let prompt = extraction.prompt.clone();
            let extractor =
                LlmExtractor::new(extraction).context("抽出クライアントの作成に失敗")?;
            let fetcher = BrowserFetcher::new(
                FetchConfig::default()
                    .with_headless(!headed)
                    .with_debug(debug_screenshots),
            );

            let config = PipelineConfig::new()
                .with_url_list(urls)
                .with_output_dir(output)
                .with_failure_log(failure_log)
                .with_workers(workers);

            let pipeline =
                RosterPipeline::new(config, Arc::new(fetcher), Arc::new(extractor), prompt);
            let summary = pipeline
                .run_from_file()
                .await
                .context("ロスター抽出の実行に失敗")?;

            info!(
                "完了: 成功 {}件, スキップ {}件, 失敗 {}件",
                summary.succeeded(),
                summary.skipped(),
                summary.failed()
            );
        }

        Commands::Tables {
            years,
            output,
            base_url,
        } => {
            let scraper = TableScraper::new(
                TableScrapeConfig::default()
                    .with_base_url(base_url)
                    .with_output_dir(output),
            )
            .context("ロスター表スクレイパーの作成に失敗")?;

            for summary in scraper.scrape_years(&years).await {
                info!(
                    "{}年: チーム {}件, 保存 {}件, 失敗 {}件",
                    summary.year,
                    summary.teams_found,
                    summary.rosters_written.len(),
                    summary.teams_failed
                );
            }
        }

        Commands::Distances {
            years,
            rosters,
            team_locations,
            output,
        } => {
            let config = DistanceConfig::default()
                .with_roster_dir(rosters)
                .with_team_locations(team_locations)
                .with_output_dir(&output);

            let geocoder = NominatimGeocoder::new().context("ジオコーダの作成に失敗")?;
            let calculator = DistanceCalculator::from_config(config, geocoder)
                .context("大学所在地の読み込みに失敗")?;
            let report = calculator
                .run(&years)
                .await
                .context("距離計算に失敗")?;
            write_report(&report, &output).context("距離CSVの書き出しに失敗")?;
        }

        Commands::Plots { detailed, output } => {
            let written = plot_distributions(&detailed, &output)
                .with_context(|| format!("{:?} のグラフ作成に失敗", detailed))?;
            info!("グラフ {}件を保存: {:?}", written.len(), output);
        }
    }

    Ok(())
}
