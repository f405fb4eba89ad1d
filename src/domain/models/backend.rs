#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use super::Message;
use super::Persona;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompletionError {
    #[error("OpenRouter API key is not defined")]
    Auth,

    #[error("{0}")]
    Upstream(String),
}

impl CompletionError {
    pub fn upstream(msg: impl Into<String>) -> CompletionError {
        return CompletionError::Upstream(msg.into());
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> CompletionError {
        return CompletionError::Upstream(err.to_string());
    }
}

/// Everything a backend needs for one completion: the fixed system
/// instruction followed by the full chat history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendPrompt {
    pub system: String,
    pub messages: Vec<Message>,
}

impl BackendPrompt {
    pub fn new(persona: &Persona, messages: Vec<Message>) -> BackendPrompt {
        return BackendPrompt {
            system: persona.system_prompt.to_string(),
            messages,
        };
    }
}

#[async_trait]
pub trait Backend {
    /// Used at startup to verify the credential and endpoint are usable.
    async fn health_check(&self) -> Result<()>;

    /// Requests a single, non-streamed completion. Exactly one request is
    /// made; retrying is left to the caller.
    async fn get_completion(&self, prompt: BackendPrompt) -> Result<String, CompletionError>;
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;
