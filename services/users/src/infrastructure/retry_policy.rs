// ストア呼び出しの再試行ポリシー
//
// 一時的な障害（タイムアウト、スロットリング等）のみを指数バックオフで再試行する。
// 一意性違反などの恒久的なエラーは即座に呼び出し元へ返す。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

// ===========================================
// デフォルト値定義
// ===========================================

/// 最大試行回数（初回を含む）
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 初回再試行までの待機時間（ミリ秒）
pub const DEFAULT_BASE_DELAY_MS: u64 = 50;

/// 待機時間の上限（ミリ秒）
pub const DEFAULT_MAX_DELAY_MS: u64 = 1000;

// ===========================================
// 環境変数名定義
// ===========================================

pub const ENV_MAX_ATTEMPTS: &str = "USER_STORE_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_MS: &str = "USER_STORE_RETRY_BASE_DELAY_MS";
pub const ENV_MAX_DELAY_MS: &str = "USER_STORE_RETRY_MAX_DELAY_MS";

/// 再試行可否を判定できるエラー
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// 指数バックオフ再試行ポリシー
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大試行回数（1以上）
    pub max_attempts: u32,
    /// 初回再試行までの待機時間
    pub base_delay: Duration,
    /// 待機時間の上限
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// 明示的な値でポリシーを作成（試行回数は最低1回）
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// 環境変数から読み込み
    ///
    /// 未設定、またはパースエラーの場合はデフォルト値を使用する。
    ///
    /// # 環境変数
    /// - USER_STORE_MAX_ATTEMPTS: 最大試行回数
    /// - USER_STORE_RETRY_BASE_DELAY_MS: 初回再試行までの待機時間（ミリ秒）
    /// - USER_STORE_RETRY_MAX_DELAY_MS: 待機時間の上限（ミリ秒）
    pub fn from_env() -> Self {
        let max_attempts = parse_env(ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS);
        let base_delay_ms = parse_env(ENV_BASE_DELAY_MS, DEFAULT_BASE_DELAY_MS);
        let max_delay_ms = parse_env(ENV_MAX_DELAY_MS, DEFAULT_MAX_DELAY_MS);

        Self::new(
            max_attempts,
            Duration::from_millis(base_delay_ms),
            Duration::from_millis(max_delay_ms),
        )
    }

    /// n回目の試行が失敗した後の待機時間
    ///
    /// `min(base * 2^(n-1), max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// 操作を実行し、再試行可能なエラーの間は待機して繰り返す
    ///
    /// `operation`には1始まりの試行番号が渡される。
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "ストア呼び出し失敗、再試行"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        retryable = err.is_retryable(),
                        "ストア呼び出し失敗、再試行せず終了"
                    );
                    return Err(err);
                }
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
