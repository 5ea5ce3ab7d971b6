use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use ego_tree::NodeId;
use reqwest::header::{HeaderMap, SET_COOKIE};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use super::{narrow, pick, Cookie, DocumentBackend, WaitCondition};
use crate::error::{ExtractError, Result};
use crate::schema::Selector;

/// Elements whose text never renders.
const HIDDEN_TEXT_PARENTS: &[&str] = &["script", "style", "template", "noscript"];

/// Handle to a node in a [`StaticBackend`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticNode(NodeId);

/// Offline document: fetched or read once, parsed once, then queried.
pub struct StaticBackend {
    client: reqwest::Client,
    document: Html,
    location: Url,
    cookies: Vec<Cookie>,
}

impl StaticBackend {
    /// An empty document at `about:blank`. Fetches made by `navigate` carry `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            document: Html::new_document(),
            location: parse_location("about:blank")?,
            cookies: Vec::new(),
        })
    }

    /// Parse `html` as if it had been loaded from `location`.
    pub fn from_html(html: &str, location: &str) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            document: Html::parse_document(html),
            location: parse_location(location)?,
            cookies: Vec::new(),
        })
    }

    fn element(&self, node: StaticNode) -> Result<ElementRef<'_>> {
        if node.0 == self.document.tree.root().id() {
            return Ok(self.document.root_element());
        }
        self.document
            .tree
            .get(node.0)
            .and_then(ElementRef::wrap)
            .ok_or_else(|| ExtractError::NotFound(format!("stale node {:?}", node.0)))
    }

    fn select_all(&self, selector: &Selector, context: StaticNode) -> Result<Vec<StaticNode>> {
        if selector.is_context() {
            return Ok(vec![context]);
        }
        let compiled = selector.compile()?;
        let nodes = if context.0 == self.document.tree.root().id() {
            self.document
                .select(&compiled)
                .map(|el| StaticNode(el.id()))
                .collect()
        } else {
            self.element(context)?
                .select(&compiled)
                .map(|el| StaticNode(el.id()))
                .collect()
        };
        Ok(nodes)
    }

    fn replace_document(&mut self, body: &str, location: Url) {
        self.document = Html::parse_document(body);
        self.location = location;
    }

    fn remember_cookies(&mut self, fresh: Vec<Cookie>) {
        for cookie in fresh {
            match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
                Some(existing) => existing.value = cookie.value,
                None => self.cookies.push(cookie),
            }
        }
    }
}

#[async_trait(?Send)]
impl DocumentBackend for StaticBackend {
    type Node = StaticNode;

    async fn root(&self) -> Result<StaticNode> {
        Ok(StaticNode(self.document.tree.root().id()))
    }

    async fn locate_one(&self, selector: &Selector, context: &StaticNode) -> Result<StaticNode> {
        if selector.is_context() {
            return Ok(*context);
        }
        pick(selector, self.select_all(selector, *context)?)
    }

    async fn locate_all(&self, selector: &Selector, context: &StaticNode) -> Result<Vec<StaticNode>> {
        Ok(narrow(selector, self.select_all(selector, *context)?))
    }

    async fn text_of(&self, node: &StaticNode) -> Result<String> {
        Ok(visible_text(self.element(*node)?))
    }

    async fn attribute_of(&self, node: &StaticNode, name: &str) -> Result<Option<String>> {
        Ok(self.element(*node)?.value().attr(name).map(str::to_string))
    }

    async fn current_location(&self) -> Result<String> {
        Ok(self.location.to_string())
    }

    fn links_are_absolute(&self) -> bool {
        false
    }

    async fn navigate(&mut self, location: &str) -> Result<()> {
        let resp = self.client.get(location).send().await?;
        let status = resp.status();
        let final_url = resp.url().clone();
        let cookies = parse_set_cookies(resp.headers());

        if !status.is_success() {
            return Err(ExtractError::Network(format!(
                "GET {location} returned status {}",
                status.as_u16()
            )));
        }

        let body = resp.text().await?;
        debug!(url = location, final_url = %final_url, bytes = body.len(), "Fetched document");

        self.replace_document(&body, final_url);
        self.remember_cookies(cookies);
        Ok(())
    }

    async fn load_local(&mut self, path: &Path) -> Result<()> {
        let absolute = tokio::fs::canonicalize(path).await?;
        let body = tokio::fs::read_to_string(&absolute).await?;
        let origin = Url::from_file_path(&absolute)
            .map_err(|_| ExtractError::InvalidLocation(absolute.display().to_string()))?;

        debug!(path = %absolute.display(), bytes = body.len(), "Loaded local document");
        self.replace_document(&body, origin);
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.cookies.clone())
    }

    async fn wait_until(&self, condition: &WaitCondition) -> Result<()> {
        warn!(
            location = %self.location,
            met = condition.is_met(self.location.as_str()),
            "wait_until has no effect on a static document, only the last known location is checked"
        );
        Ok(())
    }
}

fn parse_location(location: &str) -> Result<Url> {
    Url::parse(location).map_err(|e| ExtractError::InvalidLocation(format!("{location}: {e}")))
}

/// Concatenated text of `el` and its descendants, skipping non-rendered elements.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|parent| HIDDEN_TEXT_PARENTS.contains(&parent.value().name()));
        if !hidden {
            out.push_str(text);
        }
    }
    out.trim().to_string()
}

/// `name=value` pairs from `Set-Cookie` headers; attributes after `;` are dropped.
fn parse_set_cookies(headers: &HeaderMap) -> Vec<Cookie> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|raw| raw.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| Cookie {
                name: name.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}
