//! 埋め込みモデルによるチャンク選択
//!
//! 大きなページはそのままLLMに渡すとコンテキストを超えるため、
//! 分割したチャンクとプロンプトを埋め込み、類似度の高いチャンクだけを残す。

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScraperError;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama 互換の埋め込みクライアント
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ScraperError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::Extraction(format!(
                "埋め込みAPI ステータス {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        Ok(parsed.embedding)
    }

    /// プロンプトに近い順に `top_k` 個のチャンクを選び、元の順序で返す
    pub async fn rank(
        &self,
        chunks: &[String],
        prompt: &str,
        top_k: usize,
    ) -> Result<Vec<usize>, ScraperError> {
        let query = self.embed(prompt).await?;

        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            vectors.push(self.embed(chunk).await?);
        }

        let selected = select_chunks(&query, &vectors, top_k);
        debug!("選択したチャンク {:?} / {}", selected, chunks.len());
        Ok(selected)
    }
}

/// 文字数で分割（文字境界を保つ）
pub fn split_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// 類似度上位 `top_k` 件のインデックス（昇順）
pub fn select_chunks(query: &[f32], vectors: &[Vec<f32>], top_k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut selected: Vec<usize> = scored.into_iter().take(top_k).map(|(i, _)| i).collect();
    selected.sort_unstable();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks() {
        let chunks = split_chunks("abcdefg", 3);
        assert_eq!(chunks, vec!["abc", "def", "g"]);

        let chunks = split_chunks("ñañaña", 2);
        assert_eq!(chunks, vec!["ña", "ña", "ña"]);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_select_chunks_keeps_document_order() {
        let query = vec![1.0, 0.0];
        let vectors = vec![
            vec![0.0, 1.0],
            vec![0.9, 0.1],
            vec![0.1, 0.9],
            vec![1.0, 0.0],
        ];
        assert_eq!(select_chunks(&query, &vectors, 2), vec![1, 3]);
        assert_eq!(select_chunks(&query, &vectors, 10), vec![0, 1, 2, 3]);
    }
}
