//! Timeout + bounded retry policy for outbound provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error_handler::{AiLlmError, env_u64_or};

/// How a single provider call is bounded.
///
/// Every attempt runs under `timeout`; a failed attempt is repeated at most
/// `max_retries` times, and only when [`AiLlmError::is_transient`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    /// Reads `LLM_TIMEOUT_SECS` and `LLM_RETRY_BACKOFF_MS`.
    pub fn from_env() -> Result<Self, AiLlmError> {
        let d = Self::default();
        Ok(Self {
            timeout: Duration::from_secs(env_u64_or("LLM_TIMEOUT_SECS", d.timeout.as_secs())?),
            max_retries: d.max_retries,
            backoff: Duration::from_millis(env_u64_or(
                "LLM_RETRY_BACKOFF_MS",
                d.backoff.as_millis() as u64,
            )?),
        })
    }

    /// Runs `op` under the policy. `what` names the call in logs.
    pub async fn run<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T, AiLlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiLlmError>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(r) => r,
                Err(_) => Err(AiLlmError::Timeout(self.timeout)),
            };
            match result {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries && e.is_transient() => {
                    attempt += 1;
                    warn!(
                        call = what,
                        attempt,
                        error = %e,
                        backoff_ms = self.backoff.as_millis(),
                        "transient provider failure; retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::ConfigError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 1,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_once_on_timeout_then_gives_up() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = fast_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;
        assert!(matches!(res, Err(AiLlmError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = fast_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ConfigError::EmptyModel.into()) }
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_attempt_can_succeed() {
        let calls = AtomicU32::new(0);
        let res = fast_policy()
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AiLlmError::Timeout(Duration::from_millis(1)))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(res.unwrap(), 42);
    }
}
