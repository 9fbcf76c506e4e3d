//! Drives a long-running server-side operation to completion.
//!
//! The same loop serves every "start something, then wait for it" command: the thing being
//! waited on is abstracted behind [`OperationPoller`], which knows how to fetch the current state,
//! decide whether it is terminal, and turn a terminal state into a result.  The loop itself owns
//! the timing (exponential backoff, overall deadline), tolerates a bounded number of transient
//! polling errors, and reacts to Ctrl-C according to the [`InterruptPolicy`].
mod backoff;
mod lro;

use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::{
    Instant,
    sleep,
    sleep_until,
};
use tracing::*;

pub use self::backoff::Backoff;
pub use self::lro::{
    LroPoller,
    response_as,
};
use crate::client::is_transient;
use crate::constants::*;
use crate::errors::*;
use crate::interrupt::Interrupts;
use crate::progress::Progress;
use crate::properties::Properties;
use crate::time::parse_duration;

err_impl! {WaitError,
    #[error("timed out waiting for {0}; it is still running on the server, use `describe` to check on it")]
    Timeout(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("stopped waiting for {0}; the operation continues to run in the background")]
    Aborted(String),

    #[error("gave up polling {0} after repeated errors")]
    TooManyErrors(String),
}

pub fn is_aborted(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| matches!(e.downcast_ref::<WaitError>(), Some(WaitError::Aborted(_))))
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InterruptPolicy {
    #[default]
    Abort,
    CancelOperation,
}

#[derive(Clone, Debug)]
pub struct WaitOptions {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub timeout: Option<Duration>,
    pub max_consecutive_errors: u32,
    pub interrupt_policy: InterruptPolicy,
}

impl Default for WaitOptions {
    fn default() -> Self {
        WaitOptions {
            initial_interval: Duration::from_millis(DEFAULT_INITIAL_POLL_INTERVAL_MS),
            max_interval: Duration::from_millis(DEFAULT_MAX_POLL_INTERVAL_MS),
            multiplier: DEFAULT_POLL_MULTIPLIER,
            timeout: None,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            interrupt_policy: InterruptPolicy::Abort,
        }
    }
}

impl WaitOptions {
    pub fn from_properties(props: &Properties) -> anyhow::Result<WaitOptions> {
        let mut opts = WaitOptions::default();
        if let Some(v) = props.resolve("waiter/initial_interval")? {
            opts.initial_interval = parse_duration(&v)?;
        }
        if let Some(v) = props.resolve("waiter/max_interval")? {
            opts.max_interval = parse_duration(&v)?;
        }
        if let Some(v) = props.resolve("waiter/timeout")? {
            opts.timeout = Some(parse_duration(&v)?);
        }
        Ok(opts)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.timeout = timeout;
        }
        self
    }

    pub fn with_interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.interrupt_policy = policy;
        self
    }

    /// Fixed-interval polling, as used for log streaming where latency matters more than load.
    pub fn with_fixed_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self.max_interval = interval;
        self
    }
}

#[async_trait]
pub trait OperationPoller: Send {
    type State: Send + Sync;
    type Output: Send;

    fn name(&self) -> &str;

    async fn poll(&mut self) -> anyhow::Result<Self::State>;

    fn is_done(&self, state: &Self::State) -> bool;

    fn get_result(&self, state: Self::State) -> anyhow::Result<Self::Output>;

    async fn cancel(&mut self) -> EmptyResult {
        bail!("{} does not support cancellation", self.name())
    }

    fn status_detail(&self, _state: &Self::State) -> Option<String> {
        None
    }

    async fn on_poll(&mut self, _state: &Self::State) {}

    async fn finish(&mut self) {}
}

pub async fn wait_for<P: OperationPoller>(
    poller: &mut P,
    opts: &WaitOptions,
    mut interrupts: Interrupts,
    progress: &dyn Progress,
) -> anyhow::Result<P::Output> {
    let res = wait_loop(poller, opts, &mut interrupts, progress).await;
    poller.finish().await;

    match &res {
        Ok(_) => progress.done(),
        Err(err) => progress.fail(&format!("{err}")),
    }
    res
}

async fn wait_loop<P: OperationPoller>(
    poller: &mut P,
    opts: &WaitOptions,
    interrupts: &mut Interrupts,
    progress: &dyn Progress,
) -> anyhow::Result<P::Output> {
    let name = poller.name().to_string();
    let deadline = opts.timeout.map(|t| Instant::now() + t);
    let mut backoff = Backoff::new(opts.initial_interval, opts.max_interval, opts.multiplier);
    let mut consecutive_errors = 0;
    let mut cancel_requested = false;

    loop {
        match poller.poll().await {
            Ok(state) => {
                consecutive_errors = 0;
                progress.tick(poller.status_detail(&state).as_deref());
                if poller.is_done(&state) {
                    debug!("{name} is done");
                    return poller.get_result(state);
                }
                poller.on_poll(&state).await;
            },
            Err(err) if is_transient(&err) => {
                consecutive_errors += 1;
                if consecutive_errors > opts.max_consecutive_errors {
                    return Err(err.context(WaitError::TooManyErrors(name)));
                }
                warn!(
                    "error polling {name} (attempt {consecutive_errors} of {}), retrying: {err}",
                    opts.max_consecutive_errors
                );
            },
            Err(err) => return Err(err),
        }

        let interval = backoff.next_interval();
        debug!("waiting {interval:?} before polling {name} again");
        tokio::select! {
            _ = sleep(interval) => (),
            _ = deadline_passed(deadline) => return Err(WaitError::timeout(&name)),
            count = interrupts.next() => match opts.interrupt_policy {
                InterruptPolicy::Abort => return Err(WaitError::aborted(&name)),
                InterruptPolicy::CancelOperation if cancel_requested || count > 1 => {
                    return Err(WaitError::aborted(&name));
                },
                InterruptPolicy::CancelOperation => {
                    cancel_requested = true;
                    warn!("cancelling {name}; press Ctrl-C again to stop waiting");
                    if let Err(err) = poller.cancel().await {
                        warn!("could not cancel {name}: {err:#}");
                    }
                },
            },
        }
    }
}

async fn deadline_passed(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => futures::future::pending().await,
    }
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<(String, anyhow::Error)>,
}

impl<T> BatchOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// One error summarising every failure, or `Ok` if nothing failed.  If any wait was aborted,
    /// the summary wraps that error so [`is_aborted`] still holds for the batch.
    pub fn into_result(self) -> anyhow::Result<Vec<(String, T)>> {
        if self.failed.is_empty() {
            return Ok(self.succeeded);
        }

        let details = self
            .failed
            .iter()
            .map(|(name, err)| format!("  - {name}: {err:#}"))
            .collect::<Vec<_>>()
            .join("\n");
        let total = self.failed.len() + self.succeeded.len();
        let summary = format!("{} of {total} operations failed:\n{details}", self.failed.len());
        match self.failed.into_iter().find(|(_, err)| is_aborted(err)) {
            Some((_, err)) => Err(err.context(summary)),
            None => Err(anyhow!(summary)),
        }
    }
}

// Each poller reports through this; the shared progress only sees how many have finished.
struct BatchProgress<'a> {
    inner: &'a dyn Progress,
    finished: AtomicUsize,
    total: usize,
}

impl BatchProgress<'_> {
    fn report(&self, finished: usize) {
        self.inner.tick(Some(&format!("{finished} of {} finished", self.total)));
    }
}

impl Progress for BatchProgress<'_> {
    fn tick(&self, _detail: Option<&str>) {
        self.report(self.finished.load(Ordering::Relaxed));
    }

    fn done(&self) {
        self.report(self.finished.fetch_add(1, Ordering::Relaxed) + 1);
    }

    fn fail(&self, _msg: &str) {
        self.report(self.finished.fetch_add(1, Ordering::Relaxed) + 1);
    }
}

/// Waits on several operations at once.  A failure in one does not stop the others; every
/// poller shares the same interrupt source, so Ctrl-C applies the policy to all of them.
pub async fn wait_for_all<P: OperationPoller>(
    pollers: Vec<P>,
    opts: &WaitOptions,
    interrupts: Interrupts,
    progress: &dyn Progress,
) -> BatchOutcome<P::Output> {
    let batch = BatchProgress {
        inner: progress,
        finished: AtomicUsize::new(0),
        total: pollers.len(),
    };
    let batch = &batch;
    let waits = pollers.into_iter().map(|mut poller| {
        let interrupts = interrupts.clone();
        async move {
            let res = wait_for(&mut poller, opts, interrupts, batch).await;
            (poller.name().to_string(), res)
        }
    });

    let mut outcome = BatchOutcome { succeeded: vec![], failed: vec![] };
    for (name, res) in join_all(waits).await {
        match res {
            Ok(output) => outcome.succeeded.push((name, output)),
            Err(err) => outcome.failed.push((name, err)),
        }
    }

    if outcome.is_success() {
        progress.done();
    } else {
        progress.fail(&format!("{} operations failed", outcome.failed.len()));
    }
    outcome
}

#[cfg(test)]
mod tests;
