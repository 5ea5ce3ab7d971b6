use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebDriverError>;

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("WebDriver error (status {status}, {error}): {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl WebDriverError {
    /// True when the remote end reported that no element matched a locator.
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, WebDriverError::Api { error, .. } if error == "no such element")
    }

    /// True for client-side timeouts and the remote `timeout` error code.
    pub fn is_timeout(&self) -> bool {
        match self {
            WebDriverError::Timeout(_) => true,
            WebDriverError::Api { error, .. } => error == "timeout" || error == "script timeout",
            _ => false,
        }
    }
}

impl From<reqwest::Error> for WebDriverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WebDriverError::Timeout(err.to_string())
        } else {
            WebDriverError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WebDriverError {
    fn from(err: serde_json::Error) -> Self {
        WebDriverError::Protocol(err.to_string())
    }
}
