// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the gatehouse session core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use gatehouse_core::types::LimitSet;
use serde::{Deserialize, Serialize};

/// Top-level gatehouse configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatehouseConfig {
    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate-limit defaults and whitelist seed.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Model provider API settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Tool server endpoints and invocation settings.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Generation pipeline settings.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on `/admin/*` routes. `None` disables the
    /// admin surface entirely.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            admin_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Rate-limit configuration.
///
/// These values seed the limit store on first boot; after that the
/// persisted config (editable over the admin surface) is authoritative.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Prompts allowed per minute.
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Prompts allowed per chat over its lifetime.
    #[serde(default = "default_per_chat")]
    pub per_chat: u32,

    /// Prompts allowed per hour.
    #[serde(default = "default_hourly")]
    pub hourly: u32,

    /// Prompts allowed per day.
    #[serde(default = "default_daily")]
    pub daily: u32,

    /// User IDs exempt from all limit checks.
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            per_chat: default_per_chat(),
            hourly: default_hourly(),
            daily: default_daily(),
            whitelist: Vec::new(),
        }
    }
}

impl LimitsConfig {
    /// The global limits as a `LimitSet`.
    pub fn as_limit_set(&self) -> LimitSet {
        LimitSet {
            burst: self.burst,
            per_chat: self.per_chat,
            hourly: self.hourly,
            daily: self.daily,
        }
    }
}

fn default_burst() -> u32 {
    10
}

fn default_per_chat() -> u32 {
    50
}

fn default_hourly() -> u32 {
    150
}

fn default_daily() -> u32 {
    1000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Capacity of the violation recorder queue. Records are dropped
    /// (with a warning) when the queue is full.
    #[serde(default = "default_violation_queue_depth")]
    pub violation_queue_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            violation_queue_depth: default_violation_queue_depth(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("gatehouse").join("gatehouse.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("gatehouse.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_violation_queue_depth() -> usize {
    256
}

/// Model provider API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider API key. `None` requires the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model to use for generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens to generate per model turn.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Provider API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Tool server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Per-invocation timeout in seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// Base URL per tool server, keyed by server name. Tools belonging
    /// to a server without an entry are not registered.
    #[serde(default = "default_tool_servers")]
    pub servers: HashMap<String, String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
            servers: default_tool_servers(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    60
}

fn default_tool_servers() -> HashMap<String, String> {
    [
        ("financial-data", "http://127.0.0.1:7101"),
        ("market-technical", "http://127.0.0.1:7102"),
        ("governance-compliance", "http://127.0.0.1:7103"),
        ("news-sentiment", "http://127.0.0.1:7104"),
        ("visualization", "http://127.0.0.1:7105"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Generation pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Maximum model turns per user message (first turn plus tool
    /// follow-ups).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Total wall-clock budget for one generation in seconds.
    #[serde(default = "default_total_timeout_secs")]
    pub total_timeout_secs: u64,

    /// Maximum history turns loaded into the model context.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Inline system prompt string.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            total_timeout_secs: default_total_timeout_secs(),
            history_limit: default_history_limit(),
            system_prompt: None,
        }
    }
}

fn default_max_iterations() -> u32 {
    2
}

fn default_total_timeout_secs() -> u64 {
    300
}

fn default_history_limit() -> u32 {
    40
}
