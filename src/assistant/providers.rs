use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::debug;

use crate::types::ChatEvent;

/// Trait for LLM provider implementations.
///
/// `complete_stream` pushes `Text` chunks followed by `Done` (or `Error`);
/// `complete` collects the same stream into one string.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<ChatEvent>,
    ) -> anyhow::Result<()>;

    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let (tx, mut rx) = mpsc::channel::<ChatEvent>(32);

        // Drive the stream and drain it concurrently so a reply longer than
        // the channel capacity cannot wedge the producer.
        let collect = async {
            let mut text = String::new();
            let mut failure = None;
            while let Some(event) = rx.recv().await {
                match event {
                    ChatEvent::Text(chunk) => text.push_str(&chunk),
                    ChatEvent::Done => break,
                    ChatEvent::Error(e) => failure = Some(e),
                }
            }
            (text, failure)
        };

        let (streamed, (text, failure)) = tokio::join!(self.complete_stream(prompt, tx), collect);
        streamed?;
        if let Some(e) = failure {
            anyhow::bail!("provider error: {e}");
        }
        Ok(text)
    }
}

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<ChatEvent>,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let _ = tx.send(ChatEvent::Error(format!("{status}: {text}"))).await;
            let _ = tx.send(ChatEvent::Done).await;
            return Ok(());
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete SSE events
            while let Some(pos) = buffer.find("\n\n") {
                let event_text = buffer[..pos].to_string();
                buffer = buffer[pos + 2..].to_string();

                let mut event_type = String::new();
                let mut data = String::new();
                for line in event_text.lines() {
                    if let Some(et) = line.strip_prefix("event: ") {
                        event_type = et.to_string();
                    } else if let Some(d) = line.strip_prefix("data: ") {
                        data = d.to_string();
                    }
                }

                if data.is_empty() || data == "[DONE]" {
                    continue;
                }

                let parsed: serde_json::Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("skipping unparseable SSE data: {e}");
                        continue;
                    }
                };

                match event_type.as_str() {
                    "content_block_delta" => {
                        if let Some(text) = parsed
                            .get("delta")
                            .and_then(|d| d.get("text"))
                            .and_then(|t| t.as_str())
                        {
                            let _ = tx.send(ChatEvent::Text(text.into())).await;
                        }
                    }
                    "message_stop" => {
                        let _ = tx.send(ChatEvent::Done).await;
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }

        let _ = tx.send(ChatEvent::Done).await;
        Ok(())
    }
}

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<ChatEvent>,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.max_tokens,
            "stream": true,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let _ = tx.send(ChatEvent::Error(format!("{status}: {text}"))).await;
            let _ = tx.send(ChatEvent::Done).await;
            return Ok(());
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find("\n\n") {
                let event = buffer[..pos].to_string();
                buffer = buffer[pos + 2..].to_string();

                if let Some(data) = event.strip_prefix("data: ") {
                    if data == "[DONE]" {
                        let _ = tx.send(ChatEvent::Done).await;
                        return Ok(());
                    }
                    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) {
                        if let Some(text) = parsed
                            .get("choices")
                            .and_then(|c| c.as_array())
                            .and_then(|c| c.first())
                            .and_then(|c| c.get("delta"))
                            .and_then(|d| d.get("content"))
                            .and_then(|t| t.as_str())
                        {
                            let _ = tx.send(ChatEvent::Text(text.into())).await;
                        }
                    }
                }
            }
        }

        let _ = tx.send(ChatEvent::Done).await;
        Ok(())
    }
}

/// Deterministic provider for offline runs and tests: replies with the last
/// non-empty line of the prompt. Both prompt templates end with the user's
/// question, so the reply is the question itself.
pub struct EchoProvider;

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn complete_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<ChatEvent>,
    ) -> anyhow::Result<()> {
        let reply = prompt
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string();
        let _ = tx.send(ChatEvent::Text(reply)).await;
        let _ = tx.send(ChatEvent::Done).await;
        Ok(())
    }
}

/// Create a provider from config.
pub fn from_config(
    config: &crate::config::AssistantConfig,
) -> anyhow::Result<Box<dyn LlmProvider>> {
    if config.provider == "echo" {
        return Ok(Box::new(EchoProvider));
    }

    let api_key = config.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "no API key for provider '{}'. Set {} env var.",
            config.provider,
            match config.provider.as_str() {
                "anthropic" => "ANTHROPIC_API_KEY",
                "openai" => "OPENAI_API_KEY",
                _ => "the appropriate API key",
            }
        )
    })?;

    match config.provider.as_str() {
        "anthropic" => Ok(Box::new(AnthropicProvider::new(
            api_key,
            config.model.clone(),
            config.max_tokens,
        ))),
        "openai" => Ok(Box::new(OpenAiProvider::new(
            api_key,
            config.model.clone(),
            config.max_tokens,
        ))),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}
