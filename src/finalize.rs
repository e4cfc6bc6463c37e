//! Finalizers: per-batch acceptance policy applied before results are folded.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::filters::{flag_blacklisted, flag_duplicates, DEFAULT_BLACKLIST};
use crate::job::{Job, Parser, Response};
use crate::{Multiplexer, QueryState, Result, ResultItem, ResultList};

/// Post-processes the raw results of one group.
///
/// Returns what should be folded into the overall result, or `None` if
/// nothing is acceptable. Implementations may run further batches through
/// `mux`, e.g. to download what the group only located.
#[async_trait]
pub trait Finalizer: Send + Sync {
    async fn finalize(
        &self,
        raw: ResultList,
        state: &mut QueryState,
        mux: &Multiplexer<'_>,
    ) -> Result<Option<ResultList>>;
}

/// Filters duplicates and denylisted payloads and keeps the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericFinalizer {
    blacklist: &'static [&'static [u8]],
}

impl GenericFinalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the denylist.
    pub fn with_blacklist(mut self, blacklist: &'static [&'static [u8]]) -> Self {
        self.blacklist = blacklist;
        self
    }
}

#[async_trait]
impl Finalizer for GenericFinalizer {
    async fn finalize(
        &self,
        mut raw: ResultList,
        state: &mut QueryState,
        _mux: &Multiplexer<'_>,
    ) -> Result<Option<ResultList>> {
        flag_duplicates(&mut raw, state);
        flag_blacklisted(&mut raw, self.blacklist, state);

        let accepted = raw.into_accepted();
        Ok((!accepted.is_empty()).then_some(accepted))
    }
}

/// Called with every image as soon as its download finished.
pub type DownloadCallback = Arc<dyn Fn(&ResultItem) + Send + Sync>;

/// Finalizer for cover art.
///
/// Cover providers only yield image URLs. After filtering, the URLs are
/// either returned as they are or, when the query asks for downloads,
/// fetched in a second batch of anonymous jobs whose results are the images.
/// URLs that yield no image are taken off the accepted counter again.
#[derive(Clone)]
pub struct CoverFinalizer {
    blacklist: &'static [&'static [u8]],
    on_download: Option<DownloadCallback>,
}

impl Default for CoverFinalizer {
    fn default() -> Self {
        Self {
            blacklist: DEFAULT_BLACKLIST,
            on_download: None,
        }
    }
}

impl fmt::Debug for CoverFinalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverFinalizer")
            .field("blacklist", &self.blacklist.len())
            .field("on_download", &self.on_download.is_some())
            .finish()
    }
}

impl CoverFinalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the denylist.
    pub fn with_blacklist(mut self, blacklist: &'static [&'static [u8]]) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Sets a callback invoked for each downloaded image.
    pub fn with_download_callback(mut self, callback: DownloadCallback) -> Self {
        self.on_download = Some(callback);
        self
    }
}

/// Keeps a downloaded body as an item tagged with its URL.
fn keep_body(response: &Response<'_>, on_download: Option<&DownloadCallback>) -> Option<ResultList> {
    let item = ResultItem::new(response.body).with_source(response.url);
    if let Some(callback) = on_download {
        callback(&item);
    }
    Some(ResultList::from(vec![item]))
}

#[async_trait]
impl Finalizer for CoverFinalizer {
    async fn finalize(
        &self,
        mut raw: ResultList,
        state: &mut QueryState,
        mux: &Multiplexer<'_>,
    ) -> Result<Option<ResultList>> {
        flag_duplicates(&mut raw, state);
        flag_blacklisted(&mut raw, self.blacklist, state);

        let accepted = raw.into_accepted();
        let found = accepted.len();
        let urls: ResultList = accepted
            .into_iter()
            .filter(|item| !item.data.is_empty())
            .collect();
        state.reject(found - urls.len());
        if urls.is_empty() {
            return Ok(None);
        }
        if !state.query.download {
            return Ok(Some(urls));
        }

        let on_download = self.on_download.clone();
        let parser: Arc<dyn Parser> =
            Arc::new(move |response: &Response<'_>| keep_body(response, on_download.as_ref()));
        let jobs: Vec<Job> = urls
            .items()
            .iter()
            .map(|item| Job::new(item.text()).with_parser(parser.clone()))
            .collect();
        let count = jobs.len();
        debug!("Downloading {} image(s)", count);

        let budget = mux
            .timeout()
            .saturating_mul(u32::try_from(count).unwrap_or(u32::MAX));
        let images = mux.with_timeout(budget).invoke(jobs, state).await?;
        let downloaded = images.as_ref().map_or(0, ResultList::len);
        state.reject(count.saturating_sub(downloaded));
        info!("Successfully downloaded {} image(s)", downloaded);
        Ok(images)
    }
}

/// Finalizer for providers that only locate their data.
///
/// Every accepted item is a URL. The URLs are fetched as anonymous jobs and
/// parsed with `parser`; the parsed items replace the located URLs on the
/// accepted counter.
#[derive(Clone)]
pub struct FollowFinalizer {
    parser: Arc<dyn Parser>,
}

impl fmt::Debug for FollowFinalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FollowFinalizer").finish_non_exhaustive()
    }
}

impl FollowFinalizer {
    pub fn new(parser: Arc<dyn Parser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl Finalizer for FollowFinalizer {
    async fn finalize(
        &self,
        mut raw: ResultList,
        state: &mut QueryState,
        mux: &Multiplexer<'_>,
    ) -> Result<Option<ResultList>> {
        flag_duplicates(&mut raw, state);

        let urls = raw.into_accepted();
        if urls.is_empty() {
            return Ok(None);
        }
        let jobs: Vec<Job> = urls
            .items()
            .iter()
            .map(|item| Job::new(item.text()).with_parser(self.parser.clone()))
            .collect();
        let count = jobs.len();
        debug!("Following {} lookup(s)", count);

        let budget = mux
            .timeout()
            .saturating_mul(u32::try_from(count).unwrap_or(u32::MAX));
        let found = mux.with_timeout(budget).invoke(jobs, state).await?;
        state.reject(count);
        let Some(mut found) = found else {
            return Ok(None);
        };
        state.accepted += found.len();
        flag_duplicates(&mut found, state);

        let found = found.into_accepted();
        Ok((!found.is_empty()).then_some(found))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::{ItemStatus, Query};

    fn raw(payloads: &[&str]) -> ResultList {
        payloads
            .iter()
            .map(|p| ResultItem::new(*p).with_source("http://provider"))
            .collect()
    }

    #[tokio::test]
    async fn test_generic_finalizer_filters_duplicates() {
        let transport = MockTransport::new();
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new().with_number(3));
        state.accepted = 3;

        let out = GenericFinalizer::new()
            .finalize(raw(&["A", "A", "B"]), &mut state, &mux)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out.items().iter().all(|i| i.status == ItemStatus::AllOk));
        assert_eq!(state.accepted, 2);
    }

    #[tokio::test]
    async fn test_generic_finalizer_nothing_left() {
        static BAD: &[&[u8]] = &[b"bad"];
        let transport = MockTransport::new();
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new());
        state.accepted = 1;

        let out = GenericFinalizer::new()
            .with_blacklist(BAD)
            .finalize(raw(&["bad"]), &mut state, &mux)
            .await
            .unwrap();

        assert!(out.is_none());
        assert_eq!(state.accepted, 0);
    }

    #[tokio::test]
    async fn test_cover_finalizer_returns_urls_without_download() {
        let transport = MockTransport::new();
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new().with_number(5).with_download(false));
        state.accepted = 3;

        let blacklisted = "http://ecx.images-amazon.com/images/I/11J2DMYABHL.jpg";
        let out = CoverFinalizer::new()
            .finalize(
                raw(&["http://img/1.jpg", blacklisted, "http://img/1.jpg"]),
                &mut state,
                &mux,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out.items()[0].data, b"http://img/1.jpg");
        assert_eq!(state.accepted, 1);
        assert!(transport.requested().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cover_finalizer_downloads_images() {
        let transport = MockTransport::new()
            .body("http://img/1.jpg", "JPEG-1")
            .body("http://img/2.jpg", "JPEG-2");
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new().with_number(2));
        state.accepted = 2;

        let out = CoverFinalizer::new()
            .finalize(raw(&["http://img/1.jpg", "http://img/2.jpg"]), &mut state, &mux)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.len(), 2);
        let mut images: Vec<_> = out
            .items()
            .iter()
            .map(|i| (i.source.clone().unwrap(), i.text().into_owned()))
            .collect();
        images.sort();
        assert_eq!(
            images,
            vec![
                ("http://img/1.jpg".to_string(), "JPEG-1".to_string()),
                ("http://img/2.jpg".to_string(), "JPEG-2".to_string()),
            ]
        );
        // downloads are anonymous
        assert_eq!(state.accepted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cover_finalizer_failed_downloads() {
        let transport = MockTransport::new().failing("http://img/gone.jpg");
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new());
        state.accepted = 1;

        let out = CoverFinalizer::new()
            .finalize(raw(&["http://img/gone.jpg"]), &mut state, &mux)
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(state.accepted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cover_finalizer_counts_only_downloaded_images() {
        let transport = MockTransport::new()
            .body("http://img/1.jpg", "JPEG-1")
            .failing("http://img/gone.jpg");
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new().with_number(2));
        state.accepted = 2;

        let out = CoverFinalizer::new()
            .finalize(raw(&["http://img/gone.jpg", "http://img/1.jpg"]), &mut state, &mux)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(state.accepted, 1);
    }

    #[tokio::test]
    async fn test_cover_finalizer_rejects_empty_urls() {
        let transport = MockTransport::new();
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new().with_download(false));
        state.accepted = 2;

        let out = CoverFinalizer::new()
            .finalize(raw(&["", "http://img/1.jpg"]), &mut state, &mux)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(state.accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cover_finalizer_reports_each_download() {
        let transport = MockTransport::new()
            .body("http://img/1.jpg", "JPEG-1")
            .body("http://img/2.jpg", "JPEG-2");
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new().with_number(2));
        state.accepted = 2;

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let finalizer = CoverFinalizer::new().with_download_callback(Arc::new(move |item: &ResultItem| {
            sink.lock().unwrap().push(item.source.clone().unwrap_or_default());
        }));

        finalizer
            .finalize(raw(&["http://img/1.jpg", "http://img/2.jpg"]), &mut state, &mux)
            .await
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["http://img/1.jpg", "http://img/2.jpg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cover_finalizer_huge_timeout_saturates() {
        let transport = MockTransport::new().body("http://img/1.jpg", "JPEG-1");
        let mux = Multiplexer::new(&transport, 2, Duration::MAX);
        let mut state = QueryState::new(Query::new());
        state.accepted = 2;

        let out = CoverFinalizer::new()
            .finalize(raw(&["http://img/1.jpg", "http://img/1.jpg?2"]), &mut state, &mux)
            .await
            .unwrap();
        assert!(out.is_some());
    }

    fn lines() -> Arc<dyn Parser> {
        Arc::new(|response: &Response<'_>| -> Option<ResultList> {
            Some(
                response
                    .text()
                    .lines()
                    .map(|line| ResultItem::new(line).with_source(response.url))
                    .collect(),
            )
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_finalizer_replaces_urls_with_parsed_items() {
        let transport = MockTransport::new()
            .body("http://lookup/1", "homepage: a\nwiki: b")
            .body("http://lookup/2", "wiki: b\nshop: c")
            .failing("http://lookup/3");
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new().with_number(10));
        state.accepted = 3;

        let out = FollowFinalizer::new(lines())
            .finalize(
                raw(&["http://lookup/1", "http://lookup/2", "http://lookup/3"]),
                &mut state,
                &mux,
            )
            .await
            .unwrap()
            .unwrap();

        let mut texts: Vec<_> = out.items().iter().map(|i| i.text().into_owned()).collect();
        texts.sort();
        assert_eq!(texts, vec!["homepage: a", "shop: c", "wiki: b"]);
        assert_eq!(state.accepted, 3);
        assert_eq!(transport.requested().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_finalizer_nothing_found() {
        let transport = MockTransport::new().failing("http://lookup/1");
        let mux = Multiplexer::new(&transport, 2, Duration::from_secs(1));
        let mut state = QueryState::new(Query::new());
        state.accepted = 1;

        let out = FollowFinalizer::new(lines())
            .finalize(raw(&["http://lookup/1"]), &mut state, &mux)
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(state.accepted, 0);
    }

    #[test]
    fn test_keep_body() {
        let list = keep_body(&Response::new("http://img/1.jpg", b"\xff\xd8"), None).unwrap();
        assert_eq!(list.items()[0].data, b"\xff\xd8");
        assert_eq!(list.items()[0].source.as_deref(), Some("http://img/1.jpg"));
    }
}
