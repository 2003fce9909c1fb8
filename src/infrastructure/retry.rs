//! 재시도 정책 모듈
//! 초기 페이지 로드 등 transient 오류에 대한 bounded retry 계산

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::browser::SessionError;

/// 재시도 정책 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함, 최소 1)
    pub max_attempts: u32,
    /// 기본 지연 시간 (밀리초)
    pub base_delay_ms: u64,
    /// 최대 지연 시간 (밀리초)
    pub max_delay_ms: u64,
    /// 백오프 승수 (1.0 = 고정 백오프)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// 고정 간격 재시도
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// `attempt`번째 시도(1부터) 실패 후 재시도 가능 여부
    pub fn should_retry(&self, attempt: u32, error: &SessionError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    /// `attempt`번째 시도 실패 후 대기 시간
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.base_delay_ms as f64 * self.backoff_multiplier.max(1.0).powi(exponent);
        let capped = scaled.min(self.max_delay_ms.max(self.base_delay_ms) as f64);
        Duration::from_millis(capped as u64)
    }

    pub async fn wait(&self, attempt: u32) {
        tokio::time::sleep(self.delay_for(attempt)).await;
    }
}
