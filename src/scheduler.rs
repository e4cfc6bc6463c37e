//! Group scheduler: runs the provider table group by group.
//!
//! A group is every provider between two boundaries of the table. Groups
//! run strictly in order; a group's batch is built only after the previous
//! group finished, so an early group that satisfies the request keeps later
//! providers from ever being contacted.

use std::sync::Arc;

use tracing::{debug, info};

use crate::finalize::Finalizer;
use crate::job::Job;
use crate::provider::{Provider, ProviderParser, ProviderTable, TableEntry};
use crate::{Multiplexer, QueryState, Result, ResultList};

/// Label used for providers after the last boundary.
const TRAILING_GROUP: &str = "remaining";

/// State of one group while it is processed.
enum GroupStep {
    RunBatch(Vec<Job>),
    Finalize(ResultList),
    Fold(Option<ResultList>),
    /// Nothing came back; move on without folding.
    Retry,
    /// Folded, but the target is still not met.
    Insufficient,
    Satisfied,
}

/// Drives the provider table through a [`Multiplexer`].
pub struct Scheduler<'a> {
    mux: Multiplexer<'a>,
}

impl<'a> Scheduler<'a> {
    pub fn new(mux: Multiplexer<'a>) -> Self {
        Self { mux }
    }

    /// Runs the groups of `table` until the finalized results reach the
    /// target item count or the table is exhausted.
    pub async fn execute(
        &self,
        table: &ProviderTable,
        state: &mut QueryState,
        finalizer: &dyn Finalizer,
    ) -> Result<Option<ResultList>> {
        let mut overall = ResultList::new();
        let mut batch: Vec<Job> = Vec::new();

        for entry in table.entries() {
            match entry {
                TableEntry::Boundary(label) => {
                    let jobs = std::mem::take(&mut batch);
                    if self.run_group(label, jobs, state, finalizer, &mut overall).await? {
                        debug!("Target reached, skipping remaining groups");
                        return Ok(Some(overall));
                    }
                }
                TableEntry::Provider {
                    provider,
                    enabled: true,
                } => {
                    if let Some(job) = build_job(provider, state) {
                        batch.push(job);
                    }
                }
                TableEntry::Provider { .. } => {}
            }
        }

        if !batch.is_empty() {
            self.run_group(TRAILING_GROUP, batch, state, finalizer, &mut overall)
                .await?;
        }

        Ok((!overall.is_empty()).then_some(overall))
    }

    /// Runs one group; returns true once the overall target is met.
    async fn run_group(
        &self,
        label: &str,
        jobs: Vec<Job>,
        state: &mut QueryState,
        finalizer: &dyn Finalizer,
        overall: &mut ResultList,
    ) -> Result<bool> {
        let mut step = GroupStep::RunBatch(jobs);
        loop {
            step = match step {
                GroupStep::RunBatch(jobs) if jobs.is_empty() => GroupStep::Retry,
                GroupStep::RunBatch(jobs) => {
                    info!("Now switching to group {}", label);
                    match self.mux.invoke(jobs, state).await? {
                        Some(raw) => GroupStep::Finalize(raw),
                        None => GroupStep::Retry,
                    }
                }
                GroupStep::Finalize(raw) => {
                    GroupStep::Fold(finalizer.finalize(raw, state, &self.mux).await?)
                }
                GroupStep::Fold(finalized) => {
                    if let Some(finalized) = finalized {
                        overall.append(finalized);
                    }
                    debug!(
                        group = label,
                        items = overall.len(),
                        target = state.target(),
                        "Group folded"
                    );
                    if overall.len() >= state.target() {
                        GroupStep::Satisfied
                    } else {
                        GroupStep::Insufficient
                    }
                }
                GroupStep::Retry => {
                    debug!(group = label, "Group yielded nothing, trying next group");
                    return Ok(false);
                }
                GroupStep::Insufficient => return Ok(false),
                GroupStep::Satisfied => return Ok(true),
            };
        }
    }
}

/// Builds the job for one enabled provider, calling its URL builder.
fn build_job(provider: &Arc<dyn Provider>, state: &mut QueryState) -> Option<Job> {
    if state.providers_tried >= state.query.plugmax {
        debug!("Provider cap reached, skipping '{}'", provider.name());
        return None;
    }

    let Some(url) = provider.url(&state.query).filter(|url| !url.is_empty()) else {
        debug!("'{}' cannot serve this query", provider.name());
        return None;
    };
    debug!("Registering provider '{}' <{}>", provider.name(), url);
    state.providers_tried += 1;

    let config = provider.config();
    let mut job = Job::new(url)
        .with_name(config.name.clone())
        .with_parser(Arc::new(ProviderParser(Arc::clone(provider))));
    if let Some(color) = &config.color {
        job = job.with_color(color.clone());
    }
    Some(job)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::finalize::{CoverFinalizer, GenericFinalizer};
    use crate::job::Response;
    use crate::provider::tests::EchoProvider;
    use crate::provider::ProviderConfig;
    use crate::transport::mock::MockTransport;
    use crate::{Query, ResultItem};

    /// Provider counting how often its URL builder runs.
    struct CountingProvider {
        config: ProviderConfig,
        url: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    impl CountingProvider {
        fn new(name: &str, url: Option<&str>, calls: Arc<AtomicUsize>) -> Self {
            Self {
                config: ProviderConfig {
                    name: name.to_string(),
                    key: name[..1].to_string(),
                    ..Default::default()
                },
                url: url.map(str::to_string),
                calls,
            }
        }
    }

    impl Provider for CountingProvider {
        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        fn url(&self, _query: &Query) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.url.clone()
        }

        fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
            Some(ResultList::from(vec![ResultItem::new(response.body)]))
        }
    }

    fn state(number: usize) -> QueryState {
        QueryState::new(Query::new().with_number(number))
    }

    fn texts(list: &ResultList) -> Vec<String> {
        list.items().iter().map(|i| i.text().into_owned()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_group_satisfies_target() {
        let transport = MockTransport::new()
            .body("http://a", "A")
            .body("http://b", "B")
            .body("http://c", "C");
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));
        let unsafe_calls = Arc::new(AtomicUsize::new(0));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("lastfm", "http://a"))
            .provider(EchoProvider::new("amazon", "http://b"))
            .boundary("safe")
            .provider(CountingProvider::new("google", Some("http://c"), unsafe_calls.clone()))
            .boundary("unsafe");

        let mut state = state(2);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(unsafe_calls.load(Ordering::SeqCst), 0);
        assert!(!transport.requested().contains(&"http://c".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_next_group() {
        let transport = MockTransport::new()
            .failing("http://a")
            .body("http://c", "C");
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("lastfm", "http://a"))
            .boundary("safe")
            .provider(EchoProvider::new("google", "http://c"))
            .boundary("unsafe");

        let mut state = state(1);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(texts(&results), vec!["C"]);
        assert_eq!(state.accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cover_download_falls_back_to_next_group() {
        let transport = MockTransport::new()
            .body("http://safe/a", "http://img/dead.jpg")
            .failing("http://img/dead.jpg")
            .failing("http://unsafe/b")
            .body("http://unsafe/c", "http://img/ok.jpg")
            .body("http://img/ok.jpg", "JPEG");
        let mux = Multiplexer::new(&transport, 1, Duration::from_secs(5));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("alpha", "http://safe/a"))
            .boundary("safe")
            .provider(EchoProvider::new("beta", "http://unsafe/b"))
            .provider(EchoProvider::new("gamma", "http://unsafe/c"))
            .boundary("unsafe");

        let mut state = state(1);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &CoverFinalizer::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(texts(&results), vec!["JPEG"]);
        assert_eq!(state.accepted, 1);
        assert_eq!(
            transport.requested(),
            vec![
                "http://safe/a",
                "http://img/dead.jpg",
                "http://unsafe/b",
                "http://unsafe/c",
                "http://img/ok.jpg",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_group_folds_and_continues() {
        let transport = MockTransport::new()
            .body("http://a", "A")
            .delayed("http://c", "C", Duration::from_millis(5));
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("lastfm", "http://a"))
            .boundary("safe")
            .provider(EchoProvider::new("google", "http://c"))
            .boundary("unsafe");

        let mut state = state(5);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap()
            .unwrap();

        // group order is preserved in the overall result
        assert_eq!(texts(&results), vec!["A", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicates_across_one_group_are_dropped() {
        let transport = MockTransport::new()
            .body("http://a", "same")
            .body("http://b", "same");
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("lastfm", "http://a"))
            .provider(EchoProvider::new("amazon", "http://b"))
            .boundary("safe");

        let mut state = state(3);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(texts(&results), vec!["same"]);
        assert_eq!(state.accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_disabled_and_unserviceable_providers() {
        let transport = MockTransport::new().body("http://c", "C");
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("amazon", "http://b").disabled())
            .provider(CountingProvider::new("coverhunt", None, calls.clone()))
            .provider(EchoProvider::new("google", "http://c"))
            .boundary("all");

        let mut state = state(1);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(texts(&results), vec!["C"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.providers_tried, 1);
        assert_eq!(transport.requested(), vec!["http://c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_cap() {
        let transport = MockTransport::new()
            .body("http://a", "A")
            .body("http://b", "B");
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("lastfm", "http://a"))
            .provider(EchoProvider::new("amazon", "http://b"))
            .boundary("safe");

        let mut state = QueryState::new(Query::new().with_number(5).with_plugmax(1));
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(texts(&results), vec!["A"]);
        assert_eq!(transport.requested(), vec!["http://a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_providers_form_last_group() {
        let transport = MockTransport::new().body("http://a", "A");
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));

        let table = ProviderTable::new().provider(EchoProvider::new("lastfm", "http://a"));

        let mut state = state(1);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(texts(&results), vec!["A"]);
    }

    #[tokio::test]
    async fn test_empty_table() {
        let transport = MockTransport::new();
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));
        let mut state = state(1);

        let results = Scheduler::new(mux)
            .execute(&ProviderTable::new(), &mut state, &GenericFinalizer::new())
            .await
            .unwrap();
        assert!(results.is_none());
        assert!(transport.requested().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_everything_fails() {
        let transport = MockTransport::new().failing("http://a").failing("http://c");
        let mux = Multiplexer::new(&transport, 4, Duration::from_secs(5));

        let table = ProviderTable::new()
            .provider(EchoProvider::new("lastfm", "http://a"))
            .boundary("safe")
            .provider(EchoProvider::new("google", "http://c"))
            .boundary("unsafe");

        let mut state = state(1);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, &GenericFinalizer::new())
            .await
            .unwrap();
        assert!(results.is_none());
    }
}
