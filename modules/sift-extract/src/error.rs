use thiserror::Error;
use webdriver_client::WebDriverError;

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No node matches selector: {0}")]
    NotFound(String),

    #[error("Schema authoring error: {0}")]
    Authoring(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Authoring errors are schema bugs. Callers must not retry or skip past them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractError::Authoring(_))
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExtractError::Timeout(err.to_string())
        } else {
            ExtractError::Network(err.to_string())
        }
    }
}

impl From<WebDriverError> for ExtractError {
    fn from(err: WebDriverError) -> Self {
        if err.is_no_such_element() {
            return ExtractError::NotFound(err.to_string());
        }
        if err.is_timeout() {
            return ExtractError::Timeout(err.to_string());
        }
        match err {
            WebDriverError::Network(msg) => ExtractError::Network(msg),
            WebDriverError::Api { ref error, .. } if error == "invalid selector" => {
                ExtractError::Authoring(err.to_string())
            }
            other => ExtractError::Session(other.to_string()),
        }
    }
}
