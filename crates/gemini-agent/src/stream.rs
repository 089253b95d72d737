use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::types::GenerateResponse;
use crate::{GeminiError, Result};

// ─── ChunkStream ──────────────────────────────────────────────────────────

/// An async stream of text chunks from a `streamGenerateContent?alt=sse`
/// response, in arrival order.
///
/// Backed by a Tokio mpsc channel. A background task owns the HTTP body,
/// decodes SSE frames and forwards the text of each chunk. Dropping
/// `ChunkStream` closes the receiver, which causes the background task to
/// exit on the next send attempt and release the upstream connection.
pub struct ChunkStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl ChunkStream {
    pub(crate) fn spawn(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                for data in decoder.push(&bytes) {
                    if !forward(&tx, &data).await {
                        return;
                    }
                }
            }

            // Provider closed the body; flush a final frame without a blank line.
            for data in decoder.finish() {
                if !forward(&tx, &data).await {
                    return;
                }
            }
        });

        ChunkStream { rx }
    }

    /// Test-only constructor: wrap a raw mpsc receiver as a `ChunkStream`.
    #[cfg(test)]
    pub(crate) fn from_channel(rx: mpsc::Receiver<Result<String>>) -> Self {
        Self { rx }
    }
}

impl Stream for ChunkStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Parse one SSE `data:` payload and send its text. Returns `false` when the
/// stream should stop (receiver dropped or a parse failure was reported).
async fn forward(tx: &mpsc::Sender<Result<String>>, data: &str) -> bool {
    match parse_chunk(data) {
        Ok(Some(text)) => tx.send(Ok(text)).await.is_ok(),
        Ok(None) => !tx.is_closed(),
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

pub(crate) fn parse_chunk(data: &str) -> Result<Option<String>> {
    let chunk: GenerateResponse =
        serde_json::from_str(data).map_err(|source| GeminiError::Parse {
            data: data.to_string(),
            source,
        })?;
    Ok(chunk.text())
}

// ─── SSE framing ──────────────────────────────────────────────────────────

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network reads are reassembled before decoding.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: BytesMut,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the `data` payload of every completed event.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw = self.buf.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw[..pos])
                .trim_end_matches('\r')
                .to_string();
            if let Some(event) = self.take_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body has ended.
    pub(crate) fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buf.is_empty() {
            let rest = self.buf.split();
            let line = String::from_utf8_lossy(&rest).trim_end().to_string();
            if let Some(event) = self.take_line(&line) {
                events.push(event);
            }
        }
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
        events
    }

    fn take_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let event = self.data.join("\n");
            self.data.clear();
            return Some(event);
        }
        if let Some(rest) = line.strip_prefix("data:") {
            self.data
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        // `event:`, `id:`, `retry:` and `:` comments carry nothing we use.
        None
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK_A: &str = r##"{"candidates":[{"content":{"role":"model","parts":[{"text":"# Over"}]}}]}"##;
    const CHUNK_B: &str = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"view"}]},"finishReason":"STOP"}]}"#;

    #[test]
    fn decoder_emits_one_event_per_blank_line() {
        let mut d = SseDecoder::default();
        let body = format!("data: {CHUNK_A}\r\n\r\ndata: {CHUNK_B}\r\n\r\n");
        let events = d.push(body.as_bytes());
        assert_eq!(events, vec![CHUNK_A.to_string(), CHUNK_B.to_string()]);
        assert!(d.finish().is_empty());
    }

    #[test]
    fn decoder_reassembles_lines_split_across_reads() {
        let mut d = SseDecoder::default();
        let body = format!("data: {CHUNK_A}\n\n");
        let (head, tail) = body.as_bytes().split_at(17);
        assert!(d.push(head).is_empty());
        assert_eq!(d.push(tail), vec![CHUNK_A.to_string()]);
    }

    #[test]
    fn decoder_keeps_multibyte_characters_intact() {
        let mut d = SseDecoder::default();
        let body = "data: 仕様書\n\n".as_bytes();
        // Split inside the first three-byte character.
        let (head, tail) = body.split_at(7);
        assert!(d.push(head).is_empty());
        assert_eq!(d.push(tail), vec!["仕様書".to_string()]);
    }

    #[test]
    fn decoder_ignores_comments_and_event_names() {
        let mut d = SseDecoder::default();
        let events = d.push(b": keep-alive\nevent: message\ndata: x\n\n");
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut d = SseDecoder::default();
        assert!(d.push(format!("data: {CHUNK_B}").as_bytes()).is_empty());
        assert_eq!(d.finish(), vec![CHUNK_B.to_string()]);
    }

    #[test]
    fn parse_chunk_extracts_text() {
        assert_eq!(parse_chunk(CHUNK_A).unwrap().as_deref(), Some("# Over"));
    }

    #[test]
    fn parse_chunk_without_candidates_is_none() {
        let usage_only = r#"{"usageMetadata":{"promptTokenCount":3,"totalTokenCount":3}}"#;
        assert!(parse_chunk(usage_only).unwrap().is_none());
    }

    #[test]
    fn parse_chunk_reports_bad_json() {
        let err = parse_chunk("{not json").unwrap_err();
        assert!(matches!(err, GeminiError::Parse { .. }));
    }

    #[tokio::test]
    async fn channel_stream_yields_in_order() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok("a".to_string())).await.unwrap();
        tx.send(Ok("b".to_string())).await.unwrap();
        drop(tx);
        let chunks: Vec<_> = ChunkStream::from_channel(rx).collect().await;
        let chunks: Vec<String> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(chunks, vec!["a", "b"]);
    }
}
