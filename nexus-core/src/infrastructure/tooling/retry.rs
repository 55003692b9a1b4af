use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ToolInvokeError;
use super::interface::{ToolGateway, ToolResponse};
use crate::config::ToolGatewayConfig;

/// Transport failures worth another attempt. Matched case-insensitively
/// against the rendered error.
pub const RETRYABLE_PATTERNS: &[&str] = &[
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "connection closed",
    "broken pipe",
    "temporarily unavailable",
    "econnreset",
    "econnrefused",
    "http 502",
    "http 503",
    "http 504",
];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

impl From<&ToolGatewayConfig> for RetryPolicy {
    fn from(config: &ToolGatewayConfig) -> Self {
        Self::new(config.max_retries, config.base_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

pub fn is_retryable(error: &ToolInvokeError) -> bool {
    if matches!(error, ToolInvokeError::InvalidJson { .. }) {
        return false;
    }
    let rendered = error.to_string().to_lowercase();
    RETRYABLE_PATTERNS
        .iter()
        .any(|pattern| rendered.contains(pattern))
}

/// Invokes `name`, retrying retryable transport failures with exponential
/// backoff. The last error is returned once the policy is exhausted.
pub async fn invoke_with_retry(
    gateway: &dyn ToolGateway,
    name: &str,
    args: Value,
    policy: RetryPolicy,
) -> Result<ToolResponse, ToolInvokeError> {
    let mut attempt = 0;
    loop {
        match gateway.invoke(name, args.clone()).await {
            Ok(response) => return Ok(response),
            Err(err) if attempt < policy.max_retries && is_retryable(&err) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                debug!(
                    tool = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying tool gateway call"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                warn!(tool = name, attempts = attempt + 1, error = %err, "Tool gateway call failed");
                return Err(err);
            }
        }
    }
}
