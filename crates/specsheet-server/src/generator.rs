use async_trait::async_trait;
use gemini_agent::{
    Cancellation, CredentialResolver, GeminiClient, GeminiError, GenerationConfig, GenerationMode,
    SpecAgent,
};
use specsheet_core::config::GenerationSettings;
use specsheet_core::prompt::SYSTEM_PROMPT;

/// The generation seam handlers depend on. Implemented by
/// [`gemini_agent::SpecAgent`]; tests substitute their own.
#[async_trait]
pub trait SpecGenerator: Send + Sync {
    async fn generate(&self, idea: &str, cancel: &Cancellation) -> Result<String, GeminiError>;
}

#[async_trait]
impl SpecGenerator for SpecAgent {
    async fn generate(&self, idea: &str, cancel: &Cancellation) -> Result<String, GeminiError> {
        self.generate_spec(idea, cancel).await
    }
}

/// Build the production agent from configuration.
pub fn agent_from_settings(settings: &GenerationSettings) -> SpecAgent {
    let mode = if settings.streaming {
        GenerationMode::Streaming
    } else {
        GenerationMode::Single
    };
    SpecAgent::new(
        GeminiClient::new(settings.model.clone()),
        CredentialResolver::new(settings.gcp_project_id.clone()),
        SYSTEM_PROMPT,
    )
    .with_mode(mode)
    .with_generation_config(GenerationConfig {
        temperature: settings.temperature,
        max_output_tokens: settings.max_output_tokens,
        ..GenerationConfig::default()
    })
}
