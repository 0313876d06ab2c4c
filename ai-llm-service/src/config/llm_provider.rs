/// Represents the provider (backend) used for large language model (LLM) inference.
///
/// `OpenAI` covers every OpenAI-compatible REST API (OpenAI itself, Upstage
/// Solar, vLLM, LM Studio). `Ollama` is the local runtime.
///
/// # Examples
///
/// ```
/// use ai_llm_service::config::llm_provider::LlmProvider;
///
/// let p: LlmProvider = "ollama".parse().unwrap();
/// assert_eq!(p, LlmProvider::Ollama);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Local Ollama runtime for on-device inference.
    Ollama,
    /// OpenAI-compatible chat/embeddings API.
    OpenAI,
}

impl std::str::FromStr for LlmProvider {
    type Err = crate::error_handler::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" | "chatgpt" | "upstage" => Ok(LlmProvider::OpenAI),
            other => Err(crate::error_handler::ConfigError::UnsupportedProvider(
                other.to_string(),
            )),
        }
    }
}
