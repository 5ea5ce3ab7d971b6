//! Node-location primitives over a hierarchical markup document.
//!
//! Two implementations share the [`DocumentBackend`] trait: [`StaticBackend`]
//! over a parsed HTML tree and [`LiveBackend`] over a WebDriver session. The
//! extraction engine only talks to the trait.

mod live;
mod static_doc;

pub use live::{LiveBackend, LiveNode, LiveOptions, ResourceClass};
pub use static_doc::{StaticBackend, StaticNode};

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{ExtractError, Result};
use crate::schema::Selector;

/// A cookie held by the document's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Blocking condition for [`DocumentBackend::wait_until`].
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// The current location matches the pattern anywhere.
    LocationMatches(Regex),
}

impl WaitCondition {
    pub fn location_matches(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(WaitCondition::LocationMatches)
            .map_err(|e| ExtractError::Authoring(format!("invalid location pattern: {e}")))
    }

    pub fn is_met(&self, location: &str) -> bool {
        match self {
            WaitCondition::LocationMatches(re) => re.is_match(location),
        }
    }
}

/// Uniform document access. Each backend instance is owned by one worker, so
/// futures are not required to be `Send`.
#[async_trait(?Send)]
pub trait DocumentBackend {
    type Node: Clone;

    /// The document itself; selectors evaluated here search the whole tree.
    async fn root(&self) -> Result<Self::Node>;

    /// First match of `selector` under `context` (or the `nth` match when the
    /// selector carries an index). `"."` returns `context`.
    async fn locate_one(&self, selector: &Selector, context: &Self::Node) -> Result<Self::Node>;

    /// All matches under `context` in document order. Never fails on zero matches.
    async fn locate_all(&self, selector: &Selector, context: &Self::Node)
        -> Result<Vec<Self::Node>>;

    async fn text_of(&self, node: &Self::Node) -> Result<String>;

    async fn attribute_of(&self, node: &Self::Node, name: &str) -> Result<Option<String>>;

    async fn current_location(&self) -> Result<String>;

    /// Whether `attribute_of` already returns absolute URLs for link attributes.
    fn links_are_absolute(&self) -> bool;

    async fn navigate(&mut self, location: &str) -> Result<()>;

    /// Load a filesystem path as the document, with a `file://` origin.
    async fn load_local(&mut self, path: &Path) -> Result<()>;

    async fn cookies(&self) -> Result<Vec<Cookie>>;

    async fn wait_until(&self, condition: &WaitCondition) -> Result<()>;
}

/// Render cookies as `name=value` lines.
pub fn format_cookies(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}\n", c.name, c.value))
        .collect()
}

/// Pick the match a selector asks for from an ordered candidate list.
pub(crate) fn pick<T>(selector: &Selector, mut candidates: Vec<T>) -> Result<T> {
    let index = selector.index().unwrap_or(0);
    if index < candidates.len() {
        Ok(candidates.swap_remove(index))
    } else {
        Err(ExtractError::NotFound(selector.to_string()))
    }
}

/// Narrow `locate_all` results for an indexed selector to at most one node.
pub(crate) fn narrow<T>(selector: &Selector, mut all: Vec<T>) -> Vec<T> {
    match selector.index() {
        Some(i) if i < all.len() => vec![all.swap_remove(i)],
        Some(_) => Vec::new(),
        None => all,
    }
}
