//! Shared LLM plumbing: provider clients (OpenAI-compatible, Ollama), streaming
//! chat, timeout/retry policy, health probes and role profiles.

pub mod chat;
pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod retry;
pub mod service_profiles;
pub mod services;
pub mod streaming;
pub mod telemetry;

pub use chat::{ChatMessage, ChatRole};
pub use error_handler::AiLlmError;
pub use service_profiles::LlmServiceProfiles;
pub use streaming::TextStream;
