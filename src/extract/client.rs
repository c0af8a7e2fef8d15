//! LLM抽出クライアント（OpenAI互換 chat completions）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::error::ScraperError;
use crate::traits::Extractor;

use super::embedding::{split_chunks, EmbeddingClient};

const SYSTEM_PROMPT: &str = "You extract structured data from HTML. \
Respond with a single JSON object of the form \
{\"players\": [{\"name\": string, \"hometown\": string, \"high_school\": string}]}. \
Omit a field when the page does not state it. Do not add commentary.";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// LLM + 埋め込みモデルで選手データを抽出する
#[derive(Debug, Clone)]
pub struct LlmExtractor {
    config: ExtractionConfig,
    client: reqwest::Client,
    embedder: EmbeddingClient,
}

impl LlmExtractor {
    pub fn new(config: ExtractionConfig) -> Result<Self, ScraperError> {
        if config.api_key.is_empty() {
            return Err(ScraperError::Config("抽出サービスのAPIキーが空です".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let embedder = EmbeddingClient::new(
            client.clone(),
            config.embedding_base_url.clone(),
            config.embedding_model.clone(),
        );

        Ok(Self {
            config,
            client,
            embedder,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// LLMに渡すマークアップ（大きい場合は埋め込みで絞り込む）
    async fn context_for(&self, markup: &str, prompt: &str) -> String {
        if markup.chars().count() <= self.config.chunk_size {
            return markup.to_string();
        }

        let chunks = split_chunks(markup, self.config.chunk_size);
        let selected = match self.embedder.rank(&chunks, prompt, self.config.top_k).await {
            Ok(selected) => selected,
            Err(e) => {
                warn!("埋め込みによる順位付けに失敗、先頭のチャンクを使用: {}", e);
                (0..self.config.top_k.min(chunks.len())).collect()
            }
        };

        info!(
            "HTMLを{}チャンクに分割、{}件を送信",
            chunks.len(),
            selected.len()
        );
        selected
            .into_iter()
            .map(|i| chunks[i].as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn request_body(&self, context: &str, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("{}\n\nHTML:\n{}", prompt, context) }
            ]
        })
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, markup: &str, prompt: &str) -> Result<Value, ScraperError> {
        let context = self.context_for(markup, prompt).await;
        let url = format!(
            "{}/chat/completions",
            self.config.llm_base_url.trim_end_matches('/')
        );

        debug!(
            "抽出リクエスト: model={}, context={}文字",
            self.config.model,
            context.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(&context, prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // 本文に待機時間が含まれるので、メッセージにそのまま残す
        if !status.is_success() {
            return Err(ScraperError::Extraction(format!(
                "ステータス {}: {}",
                status.as_u16(),
                body
            )));
        }

        parse_completion(&body)
    }
}

/// chat completions のレスポンスから JSON を取り出す
///
/// モデルの出力が JSON でない場合は文字列としてそのまま返す（抽出結果なし扱い）。
pub fn parse_completion(body: &str) -> Result<Value, ScraperError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ScraperError::Extraction("レスポンスに本文がありません".into()))?;

    let trimmed = strip_code_fence(&content);
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("モデル出力がJSONではありません: {}", e);
            Ok(Value::String(content))
        }
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
