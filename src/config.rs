use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::ScraperError;

/// ワーカー数の範囲
pub const MIN_WORKERS: usize = 5;
pub const MAX_WORKERS: usize = 10;

/// 抽出プロンプト
pub const DEFAULT_PROMPT: &str =
    "Extract all players' names, hometowns, and high schools from the HTML.";

/// ロスター抽出パイプラインの設定
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub url_list: PathBuf,
    pub output_dir: PathBuf,
    pub failure_log: PathBuf,
    pub workers: usize,
    pub max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            url_list: PathBuf::from("url_list.txt"),
            output_dir: PathBuf::from("Data"),
            failure_log: PathBuf::from("failed_urls.log"),
            workers: 5,
            max_retries: 3,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.url_list = path.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_failure_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log = path.into();
        self
    }

    /// `MIN_WORKERS..=MAX_WORKERS` に丸める
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(MIN_WORKERS, MAX_WORKERS);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }
}

/// ブラウザでのページ取得設定
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub headless: bool,
    pub page_load_timeout: Duration,
    /// スクロール後の待機時間
    pub scroll_pause: Duration,
    /// スクロール回数の上限（無限スクロール対策）
    pub max_scroll_iterations: u32,
    /// 未指定時は CHROME_PATH / CHROMIUM_PATH を参照
    pub chrome_path: Option<String>,
    /// 失敗時にスクリーンショットをログ出力
    pub debug: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            page_load_timeout: Duration::from_secs(30),
            scroll_pause: Duration::from_secs(3),
            max_scroll_iterations: 50,
            chrome_path: None,
            debug: false,
        }
    }
}

impl FetchConfig {
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    pub fn with_scroll_pause(mut self, pause: Duration) -> Self {
        self.scroll_pause = pause;
        self
    }

    pub fn with_max_scroll_iterations(mut self, max: u32) -> Self {
        self.max_scroll_iterations = max.max(1);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 使用するChrome実行ファイル
    pub fn chrome_executable(&self) -> Option<String> {
        self.chrome_path.clone().or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .ok()
        })
    }
}

/// 抽出サービス (LLM + 埋め込み) の設定
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub api_key: String,
    /// OpenAI互換APIのベースURL
    pub llm_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub prompt: String,
    /// これを超えるマークアップは分割して埋め込みで絞り込む（文字数）
    pub chunk_size: usize,
    pub top_k: usize,
    pub request_timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            llm_base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.0,
            embedding_base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            chunk_size: 12_000,
            top_k: 4,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ExtractionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// 環境変数（.env があれば読み込む）から設定を作成
    ///
    /// `GROQ_API_KEY` は必須。キーのハードコードされた既定値は持たない。
    pub fn from_env() -> Result<Self, ScraperError> {
        if dotenvy::dotenv().is_ok() {
            debug!(".envファイルを読み込み");
        }

        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| ScraperError::Config("GROQ_API_KEY が設定されていません".into()))?;
        if api_key.trim().is_empty() {
            return Err(ScraperError::Config("GROQ_API_KEY が空です".into()));
        }

        let mut config = Self::new(api_key.trim());
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm_base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding_base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.llm_base_url = url.into();
        self
    }

    pub fn with_embedding(mut self, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        self.embedding_base_url = base_url.into();
        self.embedding_model = model.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, top_k: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.top_k = top_k.max(1);
        self
    }
}
