//! 抽出サービスモジュール
//!
//! 縮小済みHTMLとプロンプトをLLMに送り、選手リストを受け取る

mod client;
mod embedding;
mod types;

pub use client::{parse_completion, LlmExtractor};
pub use embedding::{cosine_similarity, select_chunks, split_chunks, EmbeddingClient};
pub use types::{players_from_response, PlayerRecord, UNKNOWN};
