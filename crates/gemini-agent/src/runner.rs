use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::GeminiClient;
use crate::credentials::CredentialResolver;
use crate::types::{GenerateRequest, GenerationConfig};
use crate::{GeminiError, Result};

/// Returned when the provider produced no text at all.
pub const FALLBACK_TEXT: &str = "Text generation failed.";

/// Upper bound on accumulated text. Anything past this is dropped and the
/// upstream stream is released early.
pub const MAX_TEXT_BYTES: usize = 1024 * 1024;

// ─── Cancellation ─────────────────────────────────────────────────────────

/// Receiving side of a cancellation signal, observed by [`collect`].
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Sending side; call [`CancelHandle::cancel`] or turn it into a
/// [`CancelOnDrop`] guard.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Cancels when dropped. Hold one for as long as the caller is interested
/// in the result; an HTTP handler whose future is dropped on disconnect
/// drops the guard with it.
#[derive(Debug)]
pub struct CancelOnDrop(CancelHandle);

pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn cancel_on_drop(self) -> CancelOnDrop {
        CancelOnDrop(self)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the sender is gone without
    /// having cancelled.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

// ─── Fold ─────────────────────────────────────────────────────────────────

/// Concatenate a chunk stream in arrival order.
///
/// Stops with [`GeminiError::Cancelled`] as soon as `cancel` fires; the
/// stream is dropped on return, which releases the upstream body.
pub async fn collect<S>(stream: S, cancel: &Cancellation) -> Result<String>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    let mut stream = stream;
    let mut cancel = cancel.clone();
    let mut text = String::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GeminiError::Cancelled),
            next = stream.next() => match next {
                Some(chunk) => {
                    text.push_str(&chunk?);
                    if text.len() > MAX_TEXT_BYTES {
                        warn!(bytes = text.len(), "generated text exceeds limit; truncating");
                        let mut end = MAX_TEXT_BYTES;
                        while !text.is_char_boundary(end) {
                            end -= 1;
                        }
                        text.truncate(end);
                        break;
                    }
                }
                None => break,
            },
        }
    }

    Ok(text)
}

// ─── SpecAgent ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// One `generateContent` call, one response body.
    Single,
    /// `streamGenerateContent` with SSE; chunks are folded into one string.
    Streaming,
}

/// Turns a product idea into specification text with a fixed system prompt.
///
/// Performs no retry; the caller decides what to do with an error.
#[derive(Debug, Clone)]
pub struct SpecAgent {
    client: GeminiClient,
    credentials: CredentialResolver,
    system_prompt: String,
    mode: GenerationMode,
    config: GenerationConfig,
}

impl SpecAgent {
    pub fn new(
        client: GeminiClient,
        credentials: CredentialResolver,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            system_prompt: system_prompt.into(),
            mode: GenerationMode::Streaming,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Resolve a key, send `system_prompt + "\n" + idea`, and return the text.
    ///
    /// Returns [`FALLBACK_TEXT`] when the provider yields nothing.
    pub async fn generate_spec(&self, product_idea: &str, cancel: &Cancellation) -> Result<String> {
        let api_key = self.credentials.get_api_key().await?;
        let request = GenerateRequest::user_text(
            format!("{}\n{}", self.system_prompt, product_idea),
            self.config.clone(),
        );

        let started = std::time::Instant::now();
        let text = match self.mode {
            GenerationMode::Single => {
                let mut cancel = cancel.clone();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(GeminiError::Cancelled),
                    resp = self.client.generate(&api_key, &request) => resp?.text().unwrap_or_default(),
                }
            }
            GenerationMode::Streaming => {
                let stream = self.client.stream(&api_key, &request).await?;
                collect(stream, cancel).await?
            }
        };

        info!(
            model = self.client.model(),
            mode = ?self.mode,
            bytes = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );

        if text.trim().is_empty() {
            Ok(FALLBACK_TEXT.to_string())
        } else {
            Ok(text)
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ChunkStream;
    use mockito::Matcher;
    use tokio::sync::mpsc;

    fn mock_stream(chunks: Vec<Result<String>>) -> ChunkStream {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });
        ChunkStream::from_channel(rx)
    }

    fn agent(server: &mockito::Server, mode: GenerationMode) -> SpecAgent {
        let client = GeminiClient::new("gemini-test").with_base_url(server.url());
        let creds = CredentialResolver::new(None).with_env(|_| Some("test-key".into()));
        SpecAgent::new(client, creds, "SYSTEM").with_mode(mode)
    }

    #[tokio::test]
    async fn collect_concatenates_in_order() {
        let stream = mock_stream(vec![Ok("a".into()), Ok("b".into()), Ok("c".into())]);
        let text = collect(stream, &Cancellation::never()).await.unwrap();
        assert_eq!(text, "abc");
    }

    #[tokio::test]
    async fn collect_propagates_chunk_error() {
        let stream = mock_stream(vec![
            Ok("a".into()),
            Err(GeminiError::Upstream {
                status: 500,
                body: "boom".into(),
            }),
        ]);
        let err = collect(stream, &Cancellation::never()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn collect_stops_when_cancelled() {
        // A sender that is kept alive but never sends: without cancellation
        // this stream would never end.
        let (tx, rx) = mpsc::channel::<Result<String>>(1);
        let stream = ChunkStream::from_channel(rx);
        let (handle, cancel) = cancellation();
        handle.cancel();
        let err = collect(stream, &cancel).await.unwrap_err();
        assert!(matches!(err, GeminiError::Cancelled));
        drop(tx);
    }

    #[tokio::test]
    async fn cancel_on_drop_fires() {
        let (handle, cancel) = cancellation();
        {
            let _guard = handle.cancel_on_drop();
            assert!(!cancel.is_cancelled());
        }
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn never_does_not_fire() {
        let mut cancel = Cancellation::never();
        let fired = tokio::time::timeout(std::time::Duration::from_millis(20), cancel.cancelled())
            .await
            .is_ok();
        assert!(!fired);
    }

    #[tokio::test]
    async fn collect_truncates_oversized_text() {
        let big = "x".repeat(MAX_TEXT_BYTES);
        let stream = mock_stream(vec![Ok(big), Ok("overflow".into()), Ok("ignored".into())]);
        let text = collect(stream, &Cancellation::never()).await.unwrap();
        assert_eq!(text.len(), MAX_TEXT_BYTES);
    }

    #[tokio::test]
    async fn single_mode_sends_prompt_then_idea() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "SYSTEM\na todo app"}]}]
            })))
            .with_body(r##"{"candidates":[{"content":{"parts":[{"text":"# Todo"}]}}]}"##)
            .create_async()
            .await;

        let text = agent(&server, GenerationMode::Single)
            .generate_spec("a todo app", &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(text, "# Todo");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_candidate_returns_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let text = agent(&server, GenerationMode::Single)
            .generate_spec("idea", &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(text, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn streaming_mode_folds_chunks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-test:streamGenerateContent")
            .match_query(Matcher::Any)
            .with_header("content-type", "text/event-stream")
            .with_body(concat!(
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"# Spec\\n\"}]}}]}\n\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"body\"}]}}]}\n\n",
            ))
            .create_async()
            .await;

        let text = agent(&server, GenerationMode::Streaming)
            .generate_spec("idea", &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(text, "# Spec\nbody");
    }

    #[tokio::test]
    async fn upstream_failure_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = agent(&server, GenerationMode::Single)
            .generate_spec("idea", &Cancellation::never())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("overloaded"));
    }
}
