use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{ConsoleConfig, Endpoint};
use crate::error::{ConsoleError, Result};
use crate::interfaces::remote::{CommandExecutor, LlmProbe, StatusSource};
use crate::status::DesktopStatus;

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProbeReply {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionReply {
    #[serde(default)]
    connected: bool,
}

/// JSON-over-HTTP client for the local desktop bridge server.
#[derive(Clone)]
pub struct HttpBridge {
    client: reqwest::Client,
    status_url: String,
    llm_probe_url: String,
    command_url: String,
    check_connection_url: String,
}

impl HttpBridge {
    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConsoleError::Http(e.to_string()))?;

        Ok(Self {
            client,
            status_url: config.endpoint_url(Endpoint::Status)?,
            llm_probe_url: config.endpoint_url(Endpoint::LlmProbe)?,
            command_url: config.endpoint_url(Endpoint::Command)?,
            check_connection_url: config.endpoint_url(Endpoint::CheckConnection)?,
        })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConsoleError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(ConsoleError::Http(describe_failure(status, &body)));
        }
        serde_json::from_str(&body).map_err(|e| ConsoleError::Serialization(e.to_string()))
    }

    async fn get(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConsoleError::Http(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn post_prompt(&self, url: &str, prompt: &str) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(&PromptRequest { prompt })
            .send()
            .await
            .map_err(|e| ConsoleError::Http(e.to_string()))?;
        Self::read_json(response).await
    }
}

/// `HTTP <status>: <message>`, preferring the server's `message` field.
fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {message}")
    }
}

#[async_trait]
impl StatusSource for HttpBridge {
    async fn fetch_status(&self) -> Result<DesktopStatus> {
        let value = self.get(&self.status_url).await?;
        serde_json::from_value(value).map_err(|e| ConsoleError::Serialization(e.to_string()))
    }

    async fn check_connection(&self) -> Result<bool> {
        let value = self.get(&self.check_connection_url).await?;
        let reply: ConnectionReply =
            serde_json::from_value(value).map_err(|e| ConsoleError::Serialization(e.to_string()))?;
        Ok(reply.connected)
    }
}

#[async_trait]
impl LlmProbe for HttpBridge {
    async fn probe(&self, prompt: &str) -> Result<bool> {
        let value = self.post_prompt(&self.llm_probe_url, prompt).await?;
        let reply: ProbeReply =
            serde_json::from_value(value).map_err(|e| ConsoleError::Serialization(e.to_string()))?;
        debug!(status = %reply.status, "llm probe replied");
        Ok(reply.status == "success")
    }
}

#[async_trait]
impl CommandExecutor for HttpBridge {
    async fn execute(&self, prompt: &str) -> Result<Value> {
        self.post_prompt(&self.command_url, prompt).await
    }
}
