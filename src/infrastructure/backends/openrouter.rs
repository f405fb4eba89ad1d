#[cfg(test)]
#[path = "openrouter_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::CompletionError;

const REFERER: &str = "https://github.com/djchany/bogum-chat";
const TITLE: &str = "Bogum Chat";

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<MessageRequest>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionMessageResponse {
    content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionChoiceResponse {
    message: CompletionMessageResponse,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ErrorDetailResponse {
    message: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoiceResponse>,
    error: Option<ErrorDetailResponse>,
}

fn error_message(body: &str) -> Option<String> {
    let res = serde_json::from_str::<CompletionResponse>(body).ok()?;
    return res.error.map(|error| return error.message);
}

pub struct OpenRouter {
    url: String,
    token: String,
    model: String,
    timeout: String,
}

impl Default for OpenRouter {
    fn default() -> OpenRouter {
        return OpenRouter {
            url: Config::get(ConfigKey::ApiURL),
            token: Config::get(ConfigKey::ApiKey),
            model: Config::get(ConfigKey::Model),
            timeout: Config::get(ConfigKey::BackendHealthCheckTimeout),
        };
    }
}

impl OpenRouter {
    fn endpoint(&self, path: &str) -> String {
        return format!("{}/{path}", self.url.trim_end_matches('/'));
    }

    fn to_request(&self, prompt: BackendPrompt) -> CompletionRequest {
        let mut messages = vec![MessageRequest {
            role: "system".to_string(),
            content: prompt.system,
        }];
        messages.extend(prompt.messages.into_iter().map(|message| {
            return MessageRequest {
                role: message.role.to_string(),
                content: message.content,
            };
        }));

        return CompletionRequest {
            model: self.model.to_string(),
            messages,
        };
    }
}

#[async_trait]
impl Backend for OpenRouter {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("OpenRouter URL is not defined");
        }
        if self.token.is_empty() {
            bail!("OpenRouter API key is not defined");
        }

        let res = reqwest::Client::new()
            .get(self.endpoint("models"))
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        let status = match res {
            Ok(res) => res.status().as_u16(),
            Err(err) => {
                tracing::error!(error = ?err, "OpenRouter is not reachable");
                bail!("OpenRouter is not reachable");
            }
        };

        if status >= 400 {
            tracing::error!(status = status, "OpenRouter health check failed");
            bail!("OpenRouter health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn get_completion(&self, prompt: BackendPrompt) -> Result<String, CompletionError> {
        if self.token.is_empty() {
            return Err(CompletionError::Auth);
        }

        let req = self.to_request(prompt);
        tracing::debug!(model = %req.model, messages = req.messages.len(), "Completion request");

        let res = reqwest::Client::new()
            .post(self.endpoint("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&req)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                "Failed to make completion request to OpenRouter"
            );
            let reason = error_message(&body).unwrap_or_else(|| return body.to_string());
            return Err(CompletionError::upstream(format!(
                "OpenRouter returned {status}: {reason}"
            )));
        }

        let ores: CompletionResponse = serde_json::from_str(&body).map_err(|err| {
            return CompletionError::upstream(format!("Invalid completion response: {err}"));
        })?;
        tracing::debug!(body = ?ores, "Completion response");

        if let Some(error) = ores.error {
            return Err(CompletionError::upstream(error.message));
        }

        let content = ores
            .choices
            .into_iter()
            .next()
            .and_then(|choice| return choice.message.content);

        return match content {
            Some(text) => Ok(text),
            None => Err(CompletionError::upstream(
                "OpenRouter returned no completion choices",
            )),
        };
    }
}
