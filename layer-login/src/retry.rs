//! What to do when a login step's network call fails.
//!
//! A policy only chooses between "sleep this long and call again" and "give
//! up"; classifying the final error stays with the login flow.

use std::future::Future;
use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::sleep;

use crate::errors::InvocationError;

/// Decides, per failure, whether a step is attempted again.
pub trait RetryPolicy: Send + Sync + 'static {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration>;
}

/// The failure being judged, plus how often and how long the step has already waited.
pub struct RetryContext {
    pub fail_count:   NonZeroU32,
    pub slept_so_far: Duration,
    pub error:        InvocationError,
}

/// Fail on the first error.
pub struct NoRetries;
impl RetryPolicy for NoRetries {
    fn should_retry(&self, _: &RetryContext) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Wait out a first `FLOOD_WAIT_n` when `n` is within `threshold`, and give a
/// first I/O error one more try after `io_errors_as_flood_of`.
pub struct AutoSleep {
    pub threshold:             Duration,
    pub io_errors_as_flood_of: Option<Duration>,
}

impl Default for AutoSleep {
    fn default() -> Self {
        Self {
            threshold:             Duration::from_secs(60),
            io_errors_as_flood_of: Some(Duration::from_secs(1)),
        }
    }
}

impl RetryPolicy for AutoSleep {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration> {
        if let Some(secs) = ctx.error.flood_wait_seconds() {
            if ctx.fail_count.get() == 1 && secs <= self.threshold.as_secs() {
                tracing::info!("[layer-login] FLOOD_WAIT_{secs}, sleeping before retry");
                return ControlFlow::Continue(Duration::from_secs(secs));
            }
        }
        if matches!(ctx.error, InvocationError::Io(_)) && ctx.fail_count.get() == 1 {
            if let Some(d) = self.io_errors_as_flood_of {
                tracing::info!("[layer-login] I/O error, sleeping {d:?} before retry");
                return ControlFlow::Continue(d);
            }
        }
        ControlFlow::Break(())
    }
}

/// Run `call` until it succeeds or `policy` gives up. Calls never overlap.
pub(crate) async fn with_retries<T, F, Fut>(policy: &dyn RetryPolicy, mut call: F) -> Result<T, InvocationError>
where
    F:   FnMut() -> Fut,
    Fut: Future<Output = Result<T, InvocationError>>,
{
    let mut fail_count   = NonZeroU32::MIN;
    let mut slept_so_far = Duration::default();
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                let ctx = RetryContext { fail_count, slept_so_far, error: e };
                match policy.should_retry(&ctx) {
                    ControlFlow::Continue(delay) => {
                        sleep(delay).await;
                        slept_so_far += delay;
                        fail_count = fail_count.saturating_add(1);
                    }
                    ControlFlow::Break(()) => return Err(ctx.error),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RpcError;
    use std::cell::Cell;

    fn flood(secs: u32) -> InvocationError {
        RpcError::from_telegram(420, &format!("FLOOD_WAIT_{secs}")).into()
    }

    #[tokio::test(start_paused = true)]
    async fn auto_sleep_retries_flood_wait_once() {
        let calls = Cell::new(0);
        let start = tokio::time::Instant::now();
        let out = with_retries(&AutoSleep::default(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n == 1 { Err(flood(3)) } else { Ok(n) } }
        })
        .await;
        assert_eq!(out.unwrap(), 2);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn flood_above_threshold_is_returned() {
        let out: Result<(), _> = with_retries(&AutoSleep::default(), || async { Err(flood(600)) }).await;
        assert_eq!(out.unwrap_err().flood_wait_seconds(), Some(600));
    }

    #[tokio::test]
    async fn no_retries_returns_first_error() {
        let calls = Cell::new(0);
        let out: Result<(), _> = with_retries(&NoRetries, || {
            calls.set(calls.get() + 1);
            async { Err(InvocationError::Dropped) }
        })
        .await;
        assert!(matches!(out, Err(InvocationError::Dropped)));
        assert_eq!(calls.get(), 1);
    }
}
