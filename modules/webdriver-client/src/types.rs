use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Key under which W3C remote ends return element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

// --- Wire envelopes ---

/// Every WebDriver response wraps its payload in `{"value": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireResponse<T> {
    pub value: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewSessionValue {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireElement {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub id: String,
}

// --- Public types ---

/// Opaque reference to an element inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl From<WireElement> for ElementId {
    fn from(el: WireElement) -> Self {
        ElementId(el.id)
    }
}

/// Location strategy for element lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
    TagName(String),
}

impl Locator {
    pub(crate) fn to_body(&self) -> Value {
        let (using, value) = match self {
            Locator::Css(v) => ("css selector", v),
            Locator::XPath(v) => ("xpath", v),
            Locator::TagName(v) => ("tag name", v),
        };
        json!({ "using": using, "value": value })
    }
}

/// A cookie stored in the browsing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Chrome capabilities sent when opening a session.
#[derive(Debug, Clone, Default)]
pub struct ChromeOptions {
    pub args: Vec<String>,
    pub prefs: Map<String, Value>,
    pub browser_version: Option<String>,
}

impl ChromeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn pref(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.prefs.insert(key.into(), value.into());
        self
    }

    pub fn browser_version(mut self, version: impl Into<String>) -> Self {
        self.browser_version = Some(version.into());
        self
    }

    /// Build the `capabilities` request body for `POST /session`.
    pub fn to_capabilities(&self) -> Value {
        let mut always_match = Map::new();
        always_match.insert("browserName".into(), json!("chrome"));
        if let Some(ref version) = self.browser_version {
            always_match.insert("browserVersion".into(), json!(version));
        }
        always_match.insert(
            "goog:chromeOptions".into(),
            json!({ "args": self.args, "prefs": self.prefs }),
        );
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}
