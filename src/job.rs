//! Job descriptors and the parser capability they carry.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{Query, ResultList};

/// Read-only view of a finished transfer handed to a parser.
#[derive(Clone, Copy)]
pub struct Response<'a> {
    /// URL the body was fetched from.
    pub url: &'a str,
    /// Accumulated response body.
    pub body: &'a [u8],
    /// Caller's pass-through value from the job.
    pub custom: Option<&'a (dyn Any + Send + Sync)>,
}

impl<'a> Response<'a> {
    /// Creates a response view without a custom value.
    pub fn new(url: &'a str, body: &'a [u8]) -> Self {
        Self {
            url,
            body,
            custom: None,
        }
    }

    /// Body decoded as text, replacing invalid UTF-8.
    pub fn text(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.body)
    }
}

/// Turns a raw response into result items.
///
/// Returns `None` on hard failure, or a container whose first item carries a
/// failure tag (see [`ResultList::failure`]).
pub trait Parser: Send + Sync {
    fn parse(&self, response: &Response<'_>) -> Option<ResultList>;
}

impl<F> Parser for F
where
    F: Fn(&Response<'_>) -> Option<ResultList> + Send + Sync,
{
    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        self(response)
    }
}

/// One pending fetch.
#[derive(Clone)]
pub struct Job {
    /// Request URL, possibly still containing `${artist}`-style placeholders.
    pub url: String,
    /// Parser invoked on a successful transfer.
    pub parser: Option<Arc<dyn Parser>>,
    /// Display name; named jobs count toward the item target.
    pub name: Option<String>,
    /// Colored display name.
    pub color: Option<String>,
    /// Opaque value passed through to the parser.
    pub custom: Option<Arc<dyn Any + Send + Sync>>,
}

impl Job {
    /// Creates an anonymous job.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parser: None,
            name: None,
            color: None,
            custom: None,
        }
    }

    /// Sets the parser.
    pub fn with_parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Makes this a named job.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the colored display name.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Attaches a pass-through value.
    pub fn with_custom(mut self, custom: Arc<dyn Any + Send + Sync>) -> Self {
        self.custom = Some(custom);
        self
    }

    /// Returns true for jobs counted toward the named item target.
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Name used in diagnostics.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("download")
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("has_parser", &self.parser.is_some())
            .finish()
    }
}

/// Substitutes `${artist}`, `${album}` and `${title}` in a URL template.
///
/// Values are percent-encoded; missing values become empty strings.
pub fn prepare_url(template: &str, query: &Query) -> String {
    let mut url = template.to_string();
    for (placeholder, value) in [
        ("${artist}", &query.artist),
        ("${album}", &query.album),
        ("${title}", &query.title),
    ] {
        if url.contains(placeholder) {
            let encoded = value
                .as_deref()
                .map(|v| urlencoding::encode(v).into_owned())
                .unwrap_or_default();
            url = url.replace(placeholder, &encoded);
        }
    }
    url
}
