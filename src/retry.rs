//! リトライ / レートリミット処理
//!
//! 通常のエラーは回数制限付きでリトライし、レートリミットのエラーは
//! メッセージに含まれる待機時間だけ待ってから回数を消費せずにリトライする。

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::ScraperError;

/// デフォルトのリトライ回数
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// レートリミット待機の上限
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60 * 60);

static WAIT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn wait_pattern() -> &'static Regex {
    WAIT_PATTERN.get_or_init(|| {
        Regex::new(r"try again in (?:(\d+)m)?(\d+)(?:\.(\d+))?s").expect("wait pattern is valid")
    })
}

/// レートリミットのシグネチャ判定
pub fn is_rate_limit_signal(message: &str) -> bool {
    message.contains("rate_limit_exceeded") || message.contains("429")
}

/// `try again in <M>m<S>s` から待機時間を取り出す
///
/// 秒の小数部は文字列のままナノ秒に変換するので `1m24.14s` は正確に 84.14 秒になる。
pub fn parse_rate_limit_wait(message: &str) -> Option<Duration> {
    let caps = wait_pattern().captures(message)?;

    let minutes: u64 = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let seconds: u64 = caps.get(2)?.as_str().parse().ok()?;

    let nanos = match caps.get(3) {
        Some(frac) => {
            let digits: String = frac.as_str().chars().take(9).collect();
            format!("{:0<9}", digits).parse::<u32>().ok()?
        }
        None => 0,
    };

    let total = minutes.checked_mul(60)?.checked_add(seconds)?;
    Some(Duration::new(total, nanos).min(MAX_RATE_LIMIT_WAIT))
}

/// 1回の試行が失敗した後の遷移先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// 再試行する
    Attempting,
    /// 指定時間待ってから再試行する（回数は消費しない）
    RateLimited(Duration),
    /// リトライ回数を使い切った
    Failed,
}

/// タスクごとのリトライ状態
#[derive(Debug, Clone)]
pub struct RetryState {
    remaining: u32,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            remaining: max_retries,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn on_error(&mut self, err: &ScraperError) -> AttemptState {
        if err.is_rate_limit() {
            if let Some(wait) = err.rate_limit_wait() {
                return AttemptState::RateLimited(wait);
            }
            debug!("待機時間のないレートリミット応答のため通常の失敗として扱う");
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            AttemptState::Attempting
        } else {
            AttemptState::Failed
        }
    }
}

/// リトライ設定
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// `op` を成功するかリトライ回数を使い切るまで実行する
    ///
    /// 失敗時は最後のエラーを返す。失敗ログへの書き込みは呼び出し側が行う。
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ScraperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScraperError>>,
    {
        let mut state = RetryState::new(self.max_retries.max(1));
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match state.on_error(&err) {
                AttemptState::RateLimited(wait) => {
                    warn!(
                        "{}: 試行{}回目でレートリミット、{:?}待機",
                        label, attempt, wait
                    );
                    sleep(wait).await;
                }
                AttemptState::Attempting => {
                    warn!(
                        "{}: 試行{}回目が失敗 (残り{}回): {}",
                        label,
                        attempt,
                        state.remaining(),
                        err
                    );
                }
                AttemptState::Failed => return Err(err),
            }
        }
    }
}
