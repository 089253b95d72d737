use tracing::debug;

use crate::stream::ChunkStream;
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{GeminiError, Result};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Thin HTTP driver for one Gemini model.
///
/// Construct once at startup and share; `reqwest::Client` pools connections
/// internally. No timeout is applied beyond the transport default.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Point the client at another API root (used against mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    /// Single-shot `generateContent`.
    pub async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        debug!(model = %self.model, "generateContent");
        let response = self
            .http
            .post(self.endpoint("generateContent"))
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// `streamGenerateContent` with server-sent events. The returned stream
    /// yields text chunks as the provider produces them.
    pub async fn stream(&self, api_key: &str, request: &GenerateRequest) -> Result<ChunkStream> {
        debug!(model = %self.model, "streamGenerateContent");
        let response = self
            .http
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(ChunkStream::spawn(response))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(GeminiError::Upstream { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationConfig;
    use futures::StreamExt;
    use mockito::Matcher;

    fn request() -> GenerateRequest {
        GenerateRequest::user_text("prompt\nidea", GenerationConfig::default())
    }

    #[tokio::test]
    async fn generate_returns_first_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "k-1")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "generationConfig": {"temperature": 0.2, "maxOutputTokens": 8192}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r##"{"candidates":[{"content":{"parts":[{"text":"# Spec"}]}}]}"##)
            .create_async()
            .await;

        let client = GeminiClient::new("gemini-test").with_base_url(server.url());
        let resp = client.generate("k-1", &request()).await.unwrap();
        assert_eq!(resp.text().as_deref(), Some("# Spec"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let client = GeminiClient::new("gemini-test").with_base_url(server.url());
        let err = client.generate("k", &request()).await.unwrap_err();
        match err {
            GeminiError::Upstream { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_yields_chunks_in_arrival_order() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"one \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"two \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"three\"}]}}]}\r\n\r\n",
        );
        server
            .mock("POST", "/models/gemini-test:streamGenerateContent")
            .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = GeminiClient::new("gemini-test").with_base_url(server.url());
        let chunks: Vec<String> = client
            .stream("k", &request())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["one ", "two ", "three"]);
    }

    #[tokio::test]
    async fn stream_error_status_is_reported_before_streaming() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-test:streamGenerateContent")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::new("gemini-test").with_base_url(server.url());
        let err = client.stream("bad", &request()).await.err().unwrap();
        assert_eq!(err.status(), Some(400));
    }
}
