use crate::error::{EngineError, ProviderError};
use guardlink_core::config::RetryPolicy;
use std::future::Future;

/// Run one remote call under the retry budget: every attempt is capped by
/// the per-call timeout, transient failures back off exponentially until the
/// attempt budget is spent, and permanent failures return immediately.
/// State-driven conditions (a missing invitation, an empty listing) are not
/// errors and never pass through here.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op: &'static str,
    mut call: F,
) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1u32;
    loop {
        match tokio::time::timeout(policy.op_timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(source)) if !source.is_transient() => {
                return Err(EngineError::Failed { op, source });
            }
            Ok(Err(source)) => {
                if attempt >= policy.attempts {
                    return Err(EngineError::Exhausted {
                        op,
                        attempts: attempt,
                        source,
                    });
                }
                let delay = policy.backoff(attempt);
                tracing::warn!(op, attempt, error = %source, delay_ms = delay.as_millis() as u64, "transient failure, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(_elapsed) => {
                if attempt >= policy.attempts {
                    return Err(EngineError::Timeout {
                        op,
                        timeout: policy.op_timeout,
                    });
                }
                tracing::warn!(op, attempt, timeout = ?policy.op_timeout, "call timed out, retrying");
            }
        }
        attempt += 1;
    }
}
