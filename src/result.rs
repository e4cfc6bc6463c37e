//! Result items and the ordered container they are collected in.

use serde::{Deserialize, Serialize};

/// Status tag attached to every result item.
///
/// Filters never remove items; they flip the status so that indices taken
/// before filtering stay valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Usable item.
    #[default]
    AllOk,
    /// Parser did not find its opening marker.
    NoBeginTag,
    /// Parser did not find its closing marker.
    NoEndTag,
    /// Payload matched the denylist.
    Blacklisted,
    /// Payload is identical to an earlier item.
    Duplicate,
    /// Parser failed without a more specific reason.
    Failed,
}

impl ItemStatus {
    /// Returns true for [`ItemStatus::AllOk`].
    pub fn is_ok(self) -> bool {
        self == ItemStatus::AllOk
    }

    /// Short human readable reason, used in diagnostics.
    pub fn reason(self) -> &'static str {
        match self {
            ItemStatus::AllOk => "ok",
            ItemStatus::NoBeginTag => "No begin tag found.",
            ItemStatus::NoEndTag => "No end tag found.",
            ItemStatus::Blacklisted => "blacklisted",
            ItemStatus::Duplicate => "duplicate",
            ItemStatus::Failed => "failed.",
        }
    }
}

/// A single fetched (and optionally parsed) piece of data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultItem {
    /// Payload, text or binary.
    pub data: Vec<u8>,
    /// URL or origin this item came from.
    pub source: Option<String>,
    /// Status tag.
    pub status: ItemStatus,
}

impl ResultItem {
    /// Creates a new item with status [`ItemStatus::AllOk`].
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            source: None,
            status: ItemStatus::AllOk,
        }
    }

    /// Creates a payload-less item carrying only a failure tag.
    pub fn error(status: ItemStatus) -> Self {
        Self {
            data: Vec::new(),
            source: None,
            status,
        }
    }

    /// Sets the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns true if the item is still accepted.
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Size of the payload in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Payload as text, replacing invalid UTF-8.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Ordered container of result items; insertion order is discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultList {
    items: Vec<ResultItem>,
}

impl ResultList {
    /// Creates a new empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a container whose only item carries a failure tag.
    pub fn failure(status: ItemStatus) -> Self {
        Self {
            items: vec![ResultItem::error(status)],
        }
    }

    /// Appends one item.
    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    /// Moves every item of `other` to the end of this list, keeping order.
    pub fn append(&mut self, mut other: ResultList) {
        self.items.append(&mut other.items);
    }

    /// Returns the number of items, flagged ones included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the container holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the items.
    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    /// Returns mutable items. Length cannot change through this view.
    pub fn items_mut(&mut self) -> &mut [ResultItem] {
        &mut self.items
    }

    /// Returns the first item, if any.
    pub fn first(&self) -> Option<&ResultItem> {
        self.items.first()
    }

    /// Iterates over items still marked [`ItemStatus::AllOk`].
    pub fn accepted(&self) -> impl Iterator<Item = &ResultItem> {
        self.items.iter().filter(|item| item.is_ok())
    }

    /// Returns true when a parser produced usable data.
    ///
    /// A container whose first item carries a failure tag is a parse failure.
    pub fn is_success(&self) -> bool {
        self.first().is_some_and(ResultItem::is_ok)
    }

    /// Failure tag of a failed parse, if the parser attached one.
    pub fn failure_status(&self) -> Option<ItemStatus> {
        self.first().map(|item| item.status).filter(|s| !s.is_ok())
    }

    /// Consumes the container, keeping only accepted items.
    pub fn into_accepted(self) -> ResultList {
        Self {
            items: self.items.into_iter().filter(ResultItem::is_ok).collect(),
        }
    }
}

impl From<Vec<ResultItem>> for ResultList {
    fn from(items: Vec<ResultItem>) -> Self {
        Self { items }
    }
}

impl FromIterator<ResultItem> for ResultList {
    fn from_iter<I: IntoIterator<Item = ResultItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultList {
    type Item = ResultItem;
    type IntoIter = std::vec::IntoIter<ResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
