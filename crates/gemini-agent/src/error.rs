use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("generation API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse stream event: {source}\n  data: {data}")]
    Parse {
        data: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("generation cancelled")]
    Cancelled,
}

impl GeminiError {
    /// Provider status code, when the failure came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            GeminiError::Upstream { status, .. } => Some(*status),
            GeminiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
