//! Polling until a remote resource is stable
//!
//! A [`WaitPlan`] names what is awaited and how often to poll. Waits end on
//! the first of: a non-transient state, the plan timeout, or cancellation
//! of the operation context.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use meridian_core::provider::OperationContext;

use crate::config::RetrySettings;
use crate::errors::{ScalewayError, ScalewayResult};

/// API domain, carrying default timeouts and polling intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Instance,
    Volume,
    Snapshot,
    Vpc,
    Gateway,
    Lb,
    Baremetal,
}

impl Domain {
    /// Default timeout of every operation in this domain
    pub fn timeout(self) -> Duration {
        match self {
            Domain::Gateway | Domain::Volume => Duration::from_secs(10 * 60),
            Domain::Snapshot => Duration::from_secs(60 * 60),
            _ => Duration::from_secs(5 * 60),
        }
    }

    /// Default polling interval
    pub fn retry_interval(self) -> Duration {
        match self {
            Domain::Baremetal => Duration::from_secs(15),
            Domain::Vpc => Duration::from_secs(1),
            _ => Duration::from_secs(5),
        }
    }
}

/// A remote object with a lifecycle status
pub trait Waitable {
    fn status(&self) -> &str;

    /// Progress is expected without user action
    fn is_transient(&self) -> bool;

    /// Terminal failure, waiting further is pointless
    fn is_failed(&self) -> bool {
        self.status() == "error"
    }
}

/// What to wait for and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPlan {
    pub kind: &'static str,
    pub scope: String,
    pub id: String,
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPlan {
    /// Plan polling at the domain default unless `settings` overrides it
    pub fn new(
        kind: &'static str,
        scope: impl fmt::Display,
        id: impl Into<String>,
        domain: Domain,
        settings: &RetrySettings,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            scope: scope.to_string(),
            id: id.into(),
            interval: settings
                .wait_interval_override
                .unwrap_or_else(|| domain.retry_interval()),
            timeout,
        }
    }

    fn subject(&self) -> String {
        format!("{}/{}", self.scope, self.id)
    }

    fn timeout_error(&self, started: Instant) -> ScalewayError {
        ScalewayError::Timeout {
            kind: self.kind.to_string(),
            id: self.subject(),
            elapsed: started.elapsed(),
        }
    }
}

async fn pause(interval: Duration) {
    if interval.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(interval).await;
    }
}

/// Run `poll` under the plan timeout and the context's cancellation
async fn bounded<T>(
    ctx: &OperationContext,
    plan: &WaitPlan,
    poll: impl Future<Output = ScalewayResult<T>>,
) -> ScalewayResult<T> {
    let started = Instant::now();
    tokio::select! {
        result = tokio::time::timeout(plan.timeout, poll) => match result {
            Ok(outcome) => outcome,
            Err(_) => Err(plan.timeout_error(started)),
        },
        _ = ctx.cancelled() => Err(ScalewayError::Cancelled(format!("waiting for {} {}", plan.kind, plan.subject()))),
    }
}

/// Poll `fetch` until the object is in a non-transient state
pub async fn wait_for<T, F, Fut>(ctx: &OperationContext, plan: &WaitPlan, mut fetch: F) -> ScalewayResult<T>
where
    T: Waitable,
    F: FnMut() -> Fut,
    Fut: Future<Output = ScalewayResult<T>>,
{
    let poll = async {
        loop {
            let current = fetch().await?;
            if current.is_failed() {
                return Err(ScalewayError::UnexpectedState {
                    kind: plan.kind.to_string(),
                    id: plan.subject(),
                    state: current.status().to_string(),
                });
            }
            if !current.is_transient() {
                return Ok(current);
            }
            log::debug!(
                "{} {} is {}, polling again in {:?}",
                plan.kind,
                plan.subject(),
                current.status(),
                plan.interval
            );
            pause(plan.interval).await;
        }
    };
    bounded(ctx, plan, poll).await
}

/// Like [`wait_for`], tolerating an object that no longer exists (`None`)
pub async fn wait_for_optional<T, F, Fut>(
    ctx: &OperationContext,
    plan: &WaitPlan,
    fetch: F,
) -> ScalewayResult<Option<T>>
where
    T: Waitable,
    F: FnMut() -> Fut,
    Fut: Future<Output = ScalewayResult<T>>,
{
    match wait_for(ctx, plan, fetch).await {
        Ok(current) => Ok(Some(current)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Poll `fetch` until the object is gone; a not-found error is success
pub async fn wait_for_absence<T, F, Fut>(ctx: &OperationContext, plan: &WaitPlan, mut fetch: F) -> ScalewayResult<()>
where
    T: Waitable,
    F: FnMut() -> Fut,
    Fut: Future<Output = ScalewayResult<T>>,
{
    let poll = async {
        loop {
            match fetch().await {
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
                Ok(current) => {
                    log::debug!(
                        "{} {} still present ({}), polling again in {:?}",
                        plan.kind,
                        plan.subject(),
                        current.status(),
                        plan.interval
                    );
                }
            }
            pause(plan.interval).await;
        }
    };
    bounded(ctx, plan, poll).await
}

/// Run `action`; on a transient-state error, run `waiter` and try once more.
/// Any other outcome is returned as-is.
pub async fn retry_on_transient_state_error<T, A, AFut, W, WFut>(mut action: A, waiter: W) -> ScalewayResult<T>
where
    A: FnMut() -> AFut,
    AFut: Future<Output = ScalewayResult<T>>,
    W: FnOnce() -> WFut,
    WFut: Future<Output = ScalewayResult<()>>,
{
    match action().await {
        Err(e) if e.is_transient_state() => {
            log::debug!("transient state, waiting before retrying: {}", e);
            waiter().await?;
            action().await
        }
        other => other,
    }
}
