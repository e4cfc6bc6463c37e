//! Provider trait, configuration and the ordered provider table.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::job::{Parser, Response};
use crate::{Query, ResultList};

/// Group membership bitmask of a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupMask(u32);

impl GroupMask {
    pub const NONE: GroupMask = GroupMask(0);
    /// Reliable, free sources.
    pub const SAFE: GroupMask = GroupMask(1 << 0);
    /// Sources that may return wrong or low quality data.
    pub const UNSAFE: GroupMask = GroupMask(1 << 1);
    pub const FAST: GroupMask = GroupMask(1 << 2);
    pub const SLOW: GroupMask = GroupMask(1 << 3);
    /// Sources for rarely wanted data.
    pub const SPECIAL: GroupMask = GroupMask(1 << 4);

    /// Returns true if every bit of `other` is set.
    pub fn contains(self, other: GroupMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for GroupMask {
    type Output = GroupMask;

    fn bitor(self, rhs: GroupMask) -> GroupMask {
        GroupMask(self.0 | rhs.0)
    }
}

/// Configuration for a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name of the provider.
    pub name: String,
    /// One-letter selector key (e.g., "l" for last.fm).
    pub key: String,
    /// Colored display name.
    #[serde(default)]
    pub color: Option<String>,
    /// Whether the provider is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Group membership.
    #[serde(default)]
    pub groups: GroupMask,
}

fn default_enabled() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            key: String::new(),
            color: None,
            enabled: true,
            groups: GroupMask::NONE,
        }
    }
}

/// Trait for implementing metadata providers.
///
/// A provider bundles a URL builder and a response parser. Both are pure and
/// synchronous; the engine does all I/O.
pub trait Provider: Send + Sync {
    /// Returns the provider configuration.
    fn config(&self) -> &ProviderConfig;

    /// Builds the request URL, or `None` if this provider cannot serve the query.
    fn url(&self, query: &Query) -> Option<String>;

    /// Parses a downloaded response.
    fn parse(&self, response: &Response<'_>) -> Option<ResultList>;

    /// Returns the provider name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Returns the selector key.
    fn key(&self) -> &str {
        &self.config().key
    }

    /// Returns whether the provider is enabled by default.
    fn is_enabled(&self) -> bool {
        self.config().enabled
    }
}

/// Exposes a provider's parse step as a job [`Parser`].
pub struct ProviderParser(pub Arc<dyn Provider>);

impl Parser for ProviderParser {
    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        self.0.parse(response)
    }
}

/// One row of a provider table.
#[derive(Clone)]
pub enum TableEntry {
    /// A provider and whether it takes part in this request.
    Provider {
        provider: Arc<dyn Provider>,
        enabled: bool,
    },
    /// End of a group; everything since the previous boundary runs as one batch.
    Boundary(String),
}

impl fmt::Debug for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableEntry::Provider { provider, enabled } => f
                .debug_struct("Provider")
                .field("name", &provider.name())
                .field("enabled", enabled)
                .finish(),
            TableEntry::Boundary(label) => f.debug_tuple("Boundary").field(label).finish(),
        }
    }
}

/// Ordered provider table partitioned into groups by boundaries.
///
/// Providers after the last boundary form an implicit final group.
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    entries: Vec<TableEntry>,
}

impl ProviderTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider, enabled according to its configuration.
    pub fn provider<P: Provider + 'static>(self, provider: P) -> Self {
        self.shared(Arc::new(provider))
    }

    /// Appends an already shared provider.
    pub fn shared(mut self, provider: Arc<dyn Provider>) -> Self {
        let enabled = provider.is_enabled();
        self.entries.push(TableEntry::Provider { provider, enabled });
        self
    }

    /// Closes the current group.
    pub fn boundary(mut self, label: impl Into<String>) -> Self {
        self.entries.push(TableEntry::Boundary(label.into()));
        self
    }

    /// Returns the entries in declaration order.
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Number of providers, enabled or not.
    pub fn provider_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TableEntry::Provider { .. }))
            .count()
    }

    /// Enables exactly the providers matching `from`.
    ///
    /// A selector matches a provider by name or key, every provider of the
    /// group it labels, or everything for `"all"`. An empty selection keeps
    /// the configured defaults.
    pub fn select(&mut self, from: &[String]) {
        if from.is_empty() {
            return;
        }
        let wants = |s: &str| from.iter().any(|f| f.eq_ignore_ascii_case(s));
        let all = wants("all");

        // Group labels close their group, so walk backwards to know the label
        // of the group each provider belongs to.
        let mut label: Option<String> = None;
        for entry in self.entries.iter_mut().rev() {
            match entry {
                TableEntry::Boundary(l) => label = Some(l.clone()),
                TableEntry::Provider { provider, enabled } => {
                    *enabled = all
                        || wants(provider.name())
                        || wants(provider.key())
                        || label.as_deref().is_some_and(&wants);
                }
            }
        }
    }

    /// Names of the enabled providers, in order.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TableEntry::Provider {
                    provider,
                    enabled: true,
                } => Some(provider.name()),
                _ => None,
            })
            .collect()
    }
}
