pub mod error;
pub mod types;

pub use error::{Result, WebDriverError};
pub use types::{ChromeOptions, Cookie, ElementId, Locator, ELEMENT_KEY};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use types::{NewSessionValue, WireElement, WireError, WireResponse};

pub struct WebDriverClient {
    client: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    /// Build a client for the remote end at `base_url` (e.g. `http://localhost:4444`).
    /// Every command carries `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Open a new browsing session with the given Chrome capabilities.
    pub async fn new_session(&self, options: &ChromeOptions) -> Result<Session> {
        let endpoint = format!("{}/session", self.base_url);
        let resp = self
            .client
            .post(&endpoint)
            .json(&options.to_capabilities())
            .send()
            .await?;

        let value: NewSessionValue = read_value(resp).await?;
        tracing::debug!(session_id = %value.session_id, "WebDriver session opened");

        Ok(Session {
            client: self.client.clone(),
            endpoint: format!("{}/session/{}", self.base_url, value.session_id),
            id: value.session_id,
        })
    }
}

/// A live browsing session. Commands are issued in order; the session is not
/// meant to be shared between tasks.
pub struct Session {
    client: reqwest::Client,
    endpoint: String,
    id: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let _: Value = self.post("url", json!({ "url": url })).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        self.get("url").await
    }

    /// Find the first element matching `locator`, searching from `from` when given,
    /// otherwise from the document.
    pub async fn find_element(
        &self,
        locator: &Locator,
        from: Option<&ElementId>,
    ) -> Result<ElementId> {
        let path = match from {
            Some(el) => format!("element/{}/element", el.0),
            None => "element".to_string(),
        };
        let el: WireElement = self.post(&path, locator.to_body()).await?;
        Ok(el.into())
    }

    /// Find all elements matching `locator` in document order.
    pub async fn find_elements(
        &self,
        locator: &Locator,
        from: Option<&ElementId>,
    ) -> Result<Vec<ElementId>> {
        let path = match from {
            Some(el) => format!("element/{}/elements", el.0),
            None => "elements".to_string(),
        };
        let els: Vec<WireElement> = self.post(&path, locator.to_body()).await?;
        Ok(els.into_iter().map(ElementId::from).collect())
    }

    /// Rendered text of an element.
    pub async fn element_text(&self, el: &ElementId) -> Result<String> {
        self.get(&format!("element/{}/text", el.0)).await
    }

    /// Raw attribute value as written in the markup.
    pub async fn element_attribute(&self, el: &ElementId, name: &str) -> Result<Option<String>> {
        self.get(&format!("element/{}/attribute/{name}", el.0)).await
    }

    /// DOM property value. For `href`/`src` this is already absolute.
    pub async fn element_property(&self, el: &ElementId, name: &str) -> Result<Value> {
        self.get(&format!("element/{}/property/{name}", el.0)).await
    }

    pub async fn cookies(&self) -> Result<Vec<Cookie>> {
        self.get("cookie").await
    }

    /// End the session. The remote end closes the browser.
    pub async fn delete(self) -> Result<()> {
        let resp = self.client.delete(&self.endpoint).send().await?;
        let _: Value = read_value(resp).await?;
        tracing::debug!(session_id = %self.id, "WebDriver session closed");
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .client
            .get(format!("{}/{path}", self.endpoint))
            .send()
            .await?;
        read_value(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}/{path}", self.endpoint))
            .json(&body)
            .send()
            .await?;
        read_value(resp).await
    }
}

/// Unwrap the `{"value": ...}` envelope, turning error payloads into `WebDriverError::Api`.
async fn read_value<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<WireResponse<WireError>>(&body) {
            Ok(wire) => WebDriverError::Api {
                status: status.as_u16(),
                error: wire.value.error,
                message: wire.value.message,
            },
            Err(_) => WebDriverError::Api {
                status: status.as_u16(),
                error: "unknown error".to_string(),
                message: body,
            },
        });
    }

    let wire: WireResponse<T> = serde_json::from_str(&body)?;
    Ok(wire.value)
}
