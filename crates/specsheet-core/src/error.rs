use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecsheetError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("re-authorization required: {0}")]
    ReauthRequired(String),

    #[error("{service} error{}: {detail}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        service: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("record store error: {0}")]
    Store(String),

    #[error("search error: {0}")]
    Search(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpecsheetError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(service: &'static str, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status,
            detail: detail.into(),
        }
    }

    /// Wrap a transport-level failure from `reqwest`.
    pub fn transport(service: &'static str, err: reqwest::Error) -> Self {
        Self::Upstream {
            service,
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpecsheetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_display_includes_status_when_known() {
        let e = SpecsheetError::upstream("algolia", Some(403), "invalid key");
        assert_eq!(e.to_string(), "algolia error (403): invalid key");
    }

    #[test]
    fn upstream_display_without_status() {
        let e = SpecsheetError::upstream("gmail", None, "connection reset");
        assert_eq!(e.to_string(), "gmail error: connection reset");
    }
}
