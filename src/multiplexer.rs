//! Connection multiplexer: drives one batch of jobs over a bounded pool.
//!
//! All transfers of a batch live in a single [`FuturesUnordered`] polled from
//! the calling task, so at most `parallel` requests are in flight and no
//! worker tasks are spawned. As soon as a transfer completes its job is
//! parsed, its results folded into the batch aggregate, and the next job of
//! the backlog takes the free slot. Dropping the pool abandons whatever is
//! still in flight.

use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info, trace, warn};

use crate::job::{prepare_url, Job, Response};
use crate::transport::Transport;
use crate::{FetchError, ItemStatus, Query, QueryState, Result, ResultList};

/// Upper bound for one wait on the pool before re-polling.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const SPINNER: [char; 4] = ['\\', '-', '/', '|'];

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Aggregated items, `None` if no job produced data.
    pub results: Option<ResultList>,
    /// Transfers that reached a terminal state.
    pub tried: usize,
    /// Transfers still in flight when the batch stopped.
    pub abandoned: usize,
}

struct Transfer {
    job: Job,
    outcome: Result<Vec<u8>>,
}

/// Runs batches of jobs with a concurrency cap and a per-transfer timeout.
#[derive(Clone, Copy)]
pub struct Multiplexer<'a> {
    transport: &'a dyn Transport,
    parallel: usize,
    timeout: Duration,
}

impl<'a> Multiplexer<'a> {
    /// Creates a multiplexer; `parallel` is clamped to at least one.
    pub fn new(transport: &'a dyn Transport, parallel: usize, timeout: Duration) -> Self {
        Self {
            transport,
            parallel: parallel.max(1),
            timeout,
        }
    }

    /// Returns a copy using a different per-transfer timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Maximum number of concurrent transfers.
    pub fn parallel(&self) -> usize {
        self.parallel
    }

    /// Per-transfer timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `jobs` to completion and returns the aggregated results.
    pub async fn invoke(&self, jobs: Vec<Job>, state: &mut QueryState) -> Result<Option<ResultList>> {
        Ok(self.run(jobs, state).await?.results)
    }

    /// Runs `jobs` to completion, reporting how many transfers were tried.
    ///
    /// Stops early once every job was tried, once a named job brings the
    /// accepted counter to the target, or once an anonymous job brings the
    /// aggregate to the target. A pool failure stops the batch and returns
    /// what was collected so far. A job without URL, or a named job without
    /// parser, is rejected before anything is dispatched.
    pub async fn run(&self, jobs: Vec<Job>, state: &mut QueryState) -> Result<BatchReport> {
        validate(&jobs)?;

        let cnt = jobs.len();
        let mut report = BatchReport::default();
        if cnt == 0 {
            return Ok(report);
        }

        let mut backlog = jobs.into_iter();
        let mut pool = FuturesUnordered::new();
        for job in backlog.by_ref().take(self.parallel) {
            pool.push(self.dispatch(job, &state.query));
        }

        let mut aggregate = ResultList::new();
        loop {
            let transfer = match tokio::time::timeout(POLL_INTERVAL, pool.next()).await {
                Ok(Some(transfer)) => transfer,
                Ok(None) => break,
                Err(_) => {
                    trace!(in_flight = pool.len(), "Waiting for transfers");
                    continue;
                }
            };

            report.tried += 1;
            let named = transfer.job.is_named();
            let parsed = match self.collect(transfer, report.tried, &mut aggregate, state) {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!("{} in download queue, aborting batch", e);
                    break;
                }
            };

            // only a successful parse can change whether the target is met
            let target_met = parsed
                && if named {
                    state.accepted >= state.target()
                } else {
                    aggregate.len() >= state.target()
                };
            if report.tried >= cnt || target_met {
                debug!(
                    tried = report.tried,
                    accepted = state.accepted,
                    buffered = aggregate.len(),
                    "Batch done"
                );
                break;
            }

            if let Some(job) = backlog.next() {
                pool.push(self.dispatch(job, &state.query));
            }
        }

        report.abandoned = pool.len();
        if report.abandoned > 0 {
            debug!("Abandoning {} transfer(s) still in flight", report.abandoned);
        }
        drop(pool);

        if !aggregate.is_empty() {
            report.results = Some(aggregate);
        }
        Ok(report)
    }

    fn dispatch(&self, mut job: Job, query: &Query) -> impl Future<Output = Transfer> + 'a {
        job.url = prepare_url(&job.url, query);
        debug!(provider = job.label(), url = %job.url, "Dispatching");

        let transport = self.transport;
        let timeout = self.timeout;
        async move {
            let outcome = match tokio::time::timeout(timeout, transport.fetch(&job.url, timeout)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::Timeout),
            };
            Transfer { job, outcome }
        }
    }

    /// Parses one finished transfer into the aggregate.
    ///
    /// Returns whether items were added. Only a pool failure is returned as
    /// an error; everything else is reported and dropped.
    fn collect(
        &self,
        transfer: Transfer,
        tried: usize,
        aggregate: &mut ResultList,
        state: &mut QueryState,
    ) -> Result<bool> {
        let Transfer { job, outcome } = transfer;
        let provider = job.label();

        let body = match outcome {
            Ok(body) => body,
            Err(e) if e.is_pool_failure() => return Err(e),
            Err(e) => {
                warn!(provider, url = %job.url, "{}", e);
                return Ok(false);
            }
        };

        if body.is_empty() {
            if job.is_named() {
                warn!(provider, "page not reachable.");
            }
            return Ok(false);
        }

        let Some(parser) = job.parser.as_ref() else {
            warn!(provider, "Unable to exec callback (no parser)");
            return Ok(false);
        };

        let response = Response {
            url: &job.url,
            body: &body,
            custom: job.custom.as_deref(),
        };
        match parser.parse(&response) {
            Some(list) if list.is_success() => {
                let items = list.len();
                if job.is_named() {
                    state.accepted += items;
                    info!(provider, items, "found!");
                } else {
                    info!("Downloading [{}] [#{}]", SPINNER[(tried - 1) % SPINNER.len()], tried);
                }
                aggregate.append(list);
                debug!(
                    tried,
                    target = state.target(),
                    buffered = aggregate.len(),
                    "Tried sources"
                );
                Ok(true)
            }
            failed => {
                if job.is_named() {
                    let status = failed
                        .and_then(|list| list.failure_status())
                        .unwrap_or(ItemStatus::Failed);
                    warn!(provider, "{}", status.reason());
                }
                Ok(false)
            }
        }
    }
}

fn validate(jobs: &[Job]) -> Result<()> {
    for job in jobs {
        if job.url.is_empty() {
            return Err(FetchError::Misuse(format!("empty url for '{}'", job.label())));
        }
        if job.is_named() && job.parser.is_none() {
            return Err(FetchError::Misuse(format!("no parser for '{}'", job.label())));
        }
    }
    Ok(())
}
