//! Time-to-first-byte guarded retry.
//!
//! Object storage GETs occasionally stall server side before sending
//! anything back. Each attempt races the request against a deadline timer;
//! the deadline only bounds the wait for the first response, never the
//! transfer that follows. Expired attempts are cancelled and retried with
//! the deadline doubled.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_TIMEOUT: Duration = Duration::from_millis(2000);
const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Deadline schedule for [`ResilientFetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtfbPolicy {
    /// Deadline for the first attempt; doubled on every retry
    pub base_timeout: Duration,
    /// Total attempts before giving up
    pub max_attempts: u32,
}

impl Default for TtfbPolicy {
    fn default() -> Self {
        Self {
            base_timeout: DEFAULT_BASE_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl TtfbPolicy {
    /// Sum of all deadlines, i.e. the time spent when every attempt stalls.
    pub fn worst_case(&self) -> Duration {
        (0..self.max_attempts).map(|i| self.base_timeout * 2u32.pow(i)).sum()
    }
}

/// Outcome of a guarded fetch that did not produce a value.
#[derive(Debug)]
pub enum FetchError<E> {
    /// Every attempt hit its deadline before a response arrived
    Timeout { attempts: u32, elapsed: Duration },
    /// The server answered, with an error; never retried
    Rejected(E),
}

impl<E: fmt::Display> fmt::Display for FetchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout { attempts, elapsed } => write!(
                f,
                "no response after {} attempts ({} ms)",
                attempts,
                elapsed.as_millis()
            ),
            FetchError::Rejected(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for FetchError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Timeout { .. } => None,
            FetchError::Rejected(e) => Some(e),
        }
    }
}

/// Runs request futures under a [`TtfbPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ResilientFetch {
    policy: TtfbPolicy,
}

impl ResilientFetch {
    pub fn new(policy: TtfbPolicy) -> Self {
        Self { policy }
    }

    /// Call `attempt` until one of its futures resolves before its deadline.
    ///
    /// The future should resolve as soon as the response starts (headers
    /// received); whatever it returns is handed back untouched. A future
    /// that loses the race is dropped, which aborts the in-flight request.
    pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, FetchError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut deadline = self.policy.base_timeout;

        for n in 1..=self.policy.max_attempts {
            let attempt_started = Instant::now();
            let cancel = CancellationToken::new();
            let responded = Arc::new(AtomicBool::new(false));
            let timer = arm_deadline(deadline, cancel.clone(), responded.clone());

            let outcome = tokio::select! {
                biased;
                result = attempt() => Some(result),
                _ = cancel.cancelled() => None,
            };

            // Disarm; a timer that already fired only cancels a token
            // nobody is waiting on anymore.
            responded.store(true, Ordering::SeqCst);
            timer.abort();

            match outcome {
                Some(result) => {
                    tracing::debug!(
                        attempt = n,
                        ttfb_ms = attempt_started.elapsed().as_millis() as u64,
                        "first response byte"
                    );
                    return result.map_err(FetchError::Rejected);
                }
                None => {
                    tracing::debug!(
                        attempt = n,
                        deadline_ms = deadline.as_millis() as u64,
                        "time to first byte exceeded, cancelling request"
                    );
                }
            }

            deadline *= 2;
        }

        Err(FetchError::Timeout {
            attempts: self.policy.max_attempts,
            elapsed: started.elapsed(),
        })
    }
}

fn arm_deadline(
    deadline: Duration,
    cancel: CancellationToken,
    responded: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        if !responded.load(Ordering::SeqCst) {
            cancel.cancel();
        }
    })
}
