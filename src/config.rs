use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConsoleError, Result};
use crate::status::MergePolicy;

const DEFAULT_BASE_URL: &str = "http://localhost:9876";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointConfig {
    #[serde(default = "default_status_endpoint")]
    pub status: String,
    #[serde(default = "default_llm_probe_endpoint")]
    pub llm_probe: String,
    #[serde(default = "default_command_endpoint")]
    pub command: String,
    #[serde(default = "default_check_connection_endpoint")]
    pub check_connection: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            status: default_status_endpoint(),
            llm_probe: default_llm_probe_endpoint(),
            command: default_command_endpoint(),
            check_connection: default_check_connection_endpoint(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_status_endpoint() -> String {
    "/api/status".to_string()
}

fn default_llm_probe_endpoint() -> String {
    "/api/llm_test".to_string()
}

fn default_command_endpoint() -> String {
    "/api/command".to_string()
}

fn default_check_connection_endpoint() -> String {
    "/api/check_connection".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_probe_prompt() -> String {
    "ping".to_string()
}

fn default_connect_timeout_ms() -> Option<u64> {
    Some(2000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Status,
    LlmProbe,
    Command,
    CheckConnection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConsoleConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_probe_prompt")]
    pub probe_prompt: String,
    #[serde(default)]
    pub merge_policy: MergePolicy,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self::convention_defaults()
    }
}

impl ConsoleConfig {
    pub fn convention_defaults() -> Self {
        Self {
            base_url: default_base_url(),
            endpoints: EndpointConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
            probe_prompt: default_probe_prompt(),
            merge_policy: MergePolicy::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: None,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: ConsoleConfig =
            serde_json::from_str(raw).map_err(|e| ConsoleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ConsoleError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConsoleError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.probe_prompt.trim().is_empty() {
            return Err(ConsoleError::Config(
                "probe_prompt must not be empty".to_string(),
            ));
        }
        for endpoint in [
            Endpoint::Status,
            Endpoint::LlmProbe,
            Endpoint::Command,
            Endpoint::CheckConnection,
        ] {
            self.endpoint_url(endpoint)?;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Absolute endpoints are used as-is; paths are joined onto `base_url`.
    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<String> {
        let raw = match endpoint {
            Endpoint::Status => &self.endpoints.status,
            Endpoint::LlmProbe => &self.endpoints.llm_probe,
            Endpoint::Command => &self.endpoints.command,
            Endpoint::CheckConnection => &self.endpoints.check_connection,
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConsoleError::Config(format!(
                "endpoint {endpoint:?} is empty"
            )));
        }
        if is_http_url(raw) {
            return Ok(raw.to_string());
        }
        let base = self.base_url.trim().trim_end_matches('/');
        if !is_http_url(base) {
            return Err(ConsoleError::Config(format!(
                "base_url must start with http:// or https://, got `{}`",
                self.base_url
            )));
        }
        Ok(format!("{base}/{}", raw.trim_start_matches('/')))
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
