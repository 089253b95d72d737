//! `gemini-agent` — async Rust driver for the Gemini text-generation API.
//!
//! # Architecture
//!
//! ```text
//! CredentialResolver  ← env var, then Secret Manager (project id required)
//!     │
//!     ▼
//! GeminiClient        ← POST models/{model}:generateContent
//!     │                  POST models/{model}:streamGenerateContent?alt=sse
//!     ▼
//! ChunkStream         ← implements futures::Stream<Item = Result<String>>
//!     │                  background task decodes SSE + mpsc channel
//!     ▼
//! collect()           ← fold in arrival order, observes a Cancellation
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use gemini_agent::{Cancellation, CredentialResolver, GeminiClient, SpecAgent};
//!
//! let agent = SpecAgent::new(
//!     GeminiClient::new("gemini-2.5-flash"),
//!     CredentialResolver::new(None),
//!     "You write software specifications.",
//! );
//! let spec = agent.generate_spec("a todo app", &Cancellation::never()).await?;
//! println!("{spec}");
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod runner;
pub mod stream;
pub mod types;


pub use client::{GeminiClient, DEFAULT_MODEL};
pub use credentials::CredentialResolver;
pub use error::GeminiError;
pub use runner::{
    cancellation, collect, CancelHandle, CancelOnDrop, Cancellation, GenerationMode, SpecAgent,
    FALLBACK_TEXT,
};
pub use stream::ChunkStream;
pub use types::{GenerateRequest, GenerateResponse, GenerationConfig};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, GeminiError>;
