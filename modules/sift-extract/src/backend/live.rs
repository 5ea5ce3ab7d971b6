use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;
use webdriver_client::{ChromeOptions, ElementId, Locator, Session, WebDriverClient};

use super::{narrow, pick, Cookie, DocumentBackend, WaitCondition};
use crate::engine::{absolutize, LINK_ATTRIBUTES};
use crate::error::{ExtractError, Result};
use crate::schema::Selector;

/// Chrome version requested for every session.
const BROWSER_VERSION: &str = "137";

/// Sub-resource classes that can be switched off in the browser profile.
/// Blocking changes load time only, never extraction results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Images,
    /// Camera, microphone and other media streams.
    Media,
    Stylesheets,
    JavaScript,
    Notifications,
    Popups,
    Plugins,
    Geolocation,
}

impl ResourceClass {
    fn pref_key(self) -> &'static str {
        match self {
            ResourceClass::Images => "profile.managed_default_content_settings.images",
            ResourceClass::Media => "profile.default_content_setting_values.media_stream",
            ResourceClass::Stylesheets => "profile.default_content_setting_values.stylesheets",
            ResourceClass::JavaScript => "profile.default_content_setting_values.javascript",
            ResourceClass::Notifications => "profile.default_content_setting_values.notifications",
            ResourceClass::Popups => "profile.default_content_setting_values.popups",
            ResourceClass::Plugins => "profile.default_content_setting_values.plugins",
            ResourceClass::Geolocation => "profile.default_content_setting_values.geolocation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// WebDriver remote end, e.g. `http://localhost:4444`.
    pub webdriver_url: String,
    pub headless: bool,
    pub blocked: Vec<ResourceClass>,
    /// Upper bound on each WebDriver command.
    pub command_timeout: Duration,
    /// Upper bound on `wait_until`.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            blocked: vec![ResourceClass::Images, ResourceClass::Media],
            command_timeout: Duration::from_secs(20),
            wait_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl LiveOptions {
    fn chrome_options(&self) -> ChromeOptions {
        let mut chrome = ChromeOptions::new().browser_version(BROWSER_VERSION);
        if self.headless {
            chrome = chrome
                .arg("--headless=new")
                .arg("--no-sandbox")
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage");
        }
        for class in &self.blocked {
            chrome = chrome.pref(class.pref_key(), 2);
        }
        chrome
    }
}

/// Handle to the document or one of its elements inside a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveNode {
    Document,
    Element(ElementId),
}

/// Rendered document driven through a WebDriver session.
pub struct LiveBackend {
    session: Session,
    options: LiveOptions,
}

impl LiveBackend {
    /// Open a browser session. The session lives until [`close`](Self::close).
    pub async fn open(options: LiveOptions) -> Result<Self> {
        let client = WebDriverClient::new(&options.webdriver_url, options.command_timeout)?;
        let session = client.new_session(&options.chrome_options()).await?;
        info!(
            session_id = session.id(),
            blocked = ?options.blocked,
            "Live browser session opened"
        );
        Ok(Self { session, options })
    }

    pub async fn close(self) -> Result<()> {
        self.session.delete().await?;
        Ok(())
    }

    async fn find_all(&self, selector: &Selector, context: &LiveNode) -> Result<Vec<LiveNode>> {
        if selector.is_context() {
            return Ok(vec![context.clone()]);
        }
        let locator = Locator::Css(selector.as_css().to_string());
        let found = self
            .session
            .find_elements(&locator, element_of(context))
            .await?;
        Ok(found.into_iter().map(LiveNode::Element).collect())
    }

    async fn document_element(&self) -> Result<ElementId> {
        Ok(self
            .session
            .find_element(&Locator::TagName("html".to_string()), None)
            .await?)
    }

    async fn resolve(&self, node: &LiveNode) -> Result<ElementId> {
        match node {
            LiveNode::Element(id) => Ok(id.clone()),
            LiveNode::Document => self.document_element().await,
        }
    }
}

fn element_of(node: &LiveNode) -> Option<&ElementId> {
    match node {
        LiveNode::Element(id) => Some(id),
        LiveNode::Document => None,
    }
}

#[async_trait(?Send)]
impl DocumentBackend for LiveBackend {
    type Node = LiveNode;

    async fn root(&self) -> Result<LiveNode> {
        Ok(LiveNode::Document)
    }

    async fn locate_one(&self, selector: &Selector, context: &LiveNode) -> Result<LiveNode> {
        if selector.is_context() {
            return Ok(context.clone());
        }
        if selector.index().is_none() {
            let locator = Locator::Css(selector.as_css().to_string());
            let found = self
                .session
                .find_element(&locator, element_of(context))
                .await?;
            return Ok(LiveNode::Element(found));
        }
        pick(selector, self.find_all(selector, context).await?)
    }

    async fn locate_all(&self, selector: &Selector, context: &LiveNode) -> Result<Vec<LiveNode>> {
        Ok(narrow(selector, self.find_all(selector, context).await?))
    }

    async fn text_of(&self, node: &LiveNode) -> Result<String> {
        let id = self.resolve(node).await?;
        let text = self.session.element_text(&id).await?;
        Ok(text.trim().to_string())
    }

    /// Reads the DOM property first, which the browser has already made absolute
    /// for `href`/`src`, and falls back to the raw attribute. Link attributes
    /// without a property (`data-url`) are resolved against the current page.
    async fn attribute_of(&self, node: &LiveNode, name: &str) -> Result<Option<String>> {
        let id = self.resolve(node).await?;
        let property = self.session.element_property(&id, name).await?;
        if let Some(value) = property.as_str().filter(|v| !v.is_empty()) {
            return Ok(Some(value.to_string()));
        }
        let Some(raw) = self.session.element_attribute(&id, name).await? else {
            return Ok(None);
        };
        if !LINK_ATTRIBUTES.contains(&name) {
            return Ok(Some(raw));
        }
        let base = self.current_location().await?;
        Ok(Some(absolutize(&raw, &base)))
    }

    async fn current_location(&self) -> Result<String> {
        Ok(self.session.current_url().await?)
    }

    fn links_are_absolute(&self) -> bool {
        true
    }

    async fn navigate(&mut self, location: &str) -> Result<()> {
        self.session.navigate(location).await?;
        debug!(url = location, "Navigated live session");
        Ok(())
    }

    async fn load_local(&mut self, path: &Path) -> Result<()> {
        let absolute = tokio::fs::canonicalize(path).await?;
        let origin = Url::from_file_path(&absolute)
            .map_err(|_| ExtractError::InvalidLocation(absolute.display().to_string()))?;
        self.navigate(origin.as_str()).await
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        let cookies = self.session.cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
            })
            .collect())
    }

    async fn wait_until(&self, condition: &WaitCondition) -> Result<()> {
        let started = Instant::now();
        loop {
            let location = self.current_location().await?;
            if condition.is_met(&location) {
                return Ok(());
            }
            if started.elapsed() >= self.options.wait_timeout {
                return Err(ExtractError::Timeout(format!(
                    "location `{location}` did not match within {:?}",
                    self.options.wait_timeout
                )));
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}
