// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the gatehouse trait seams.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Unique identifier for a chat (one conversation thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

/// Unique identifier for a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

/// Unique identifier for a tool invocation within one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// --- Admission types ---

/// The four rate-limit scopes, in fail-fast evaluation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LimitScope {
    /// Per-minute burst window (checked first).
    Burst,
    /// Lifetime-of-chat counter, no time reset.
    PerChat,
    /// Rolling-fixed hourly window.
    Hourly,
    /// Rolling-fixed daily window.
    Daily,
}

impl LimitScope {
    /// Window length for the time-scoped levels. `PerChat` has no window.
    pub fn window(&self) -> Option<Duration> {
        match self {
            LimitScope::Burst => Some(Duration::from_secs(60)),
            LimitScope::Hourly => Some(Duration::from_secs(3600)),
            LimitScope::Daily => Some(Duration::from_secs(86400)),
            LimitScope::PerChat => None,
        }
    }

    /// Machine-readable error code emitted when this scope blocks a prompt.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            LimitScope::Burst => ErrorCode::RateLimitedBurst,
            LimitScope::PerChat => ErrorCode::RateLimitedChat,
            LimitScope::Hourly => ErrorCode::RateLimitedHour,
            LimitScope::Daily => ErrorCode::RateLimitedDay,
        }
    }
}

/// One value per limit scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSet {
    pub burst: u32,
    pub per_chat: u32,
    pub hourly: u32,
    pub daily: u32,
}

impl LimitSet {
    /// The limit for a single scope.
    pub fn get(&self, scope: LimitScope) -> u32 {
        match scope {
            LimitScope::Burst => self.burst,
            LimitScope::PerChat => self.per_chat,
            LimitScope::Hourly => self.hourly,
            LimitScope::Daily => self.daily,
        }
    }
}

/// Per-user override: unspecified scopes fall back to the global limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_chat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<u32>,
}

/// Persisted limit configuration: globals, per-user overrides, whitelist.
///
/// Exactly one active config exists at a time. Readers always observe a
/// consistent snapshot; the admin path publishes a whole new copy on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLimitConfig {
    pub global: LimitSet,
    #[serde(default)]
    pub overrides: HashMap<String, LimitOverride>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub version: u64,
}

/// Current usage across the four scopes, as observed by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    pub burst: u32,
    pub per_chat: u32,
    pub hourly: u32,
    pub daily: u32,
}

/// Post-decision usage view returned on `Allow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Counts after the admitted prompt's increments.
    pub current: UsageCounts,
    /// Effective limits for the user (overrides applied).
    pub limits: LimitSet,
}

/// The outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// All four checks passed; counters were committed.
    Allow(UsageSnapshot),
    /// The first violated scope, fail-fast. No counter at or beyond this
    /// scope was incremented.
    Block {
        scope: LimitScope,
        limit: u32,
        prompts_used: u32,
    },
}

impl Decision {
    /// True when the prompt was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Durable per-user window counters. Windows are fixed with lazy reset:
/// an expired window is zeroed only when the next admission reads it, so a
/// user can burst up to twice the nominal limit across a window boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounters {
    pub minute_count: u32,
    pub minute_start: DateTime<Utc>,
    pub hour_count: u32,
    pub hour_start: DateTime<Utc>,
    pub day_count: u32,
    pub day_start: DateTime<Utc>,
}

impl WindowCounters {
    /// A zeroed record with all window starts at `now`.
    pub fn zeroed(now: DateTime<Utc>) -> Self {
        Self {
            minute_count: 0,
            minute_start: now,
            hour_count: 0,
            hour_start: now,
            day_count: 0,
            day_start: now,
        }
    }

    /// The count a scope contributes at `now`, treating expired windows as 0.
    /// The read never mutates; the reset happens on the next commit.
    pub fn effective_count(&self, scope: LimitScope, now: DateTime<Utc>) -> u32 {
        let (count, start, window_secs) = match scope {
            LimitScope::Burst => (self.minute_count, self.minute_start, 60),
            LimitScope::Hourly => (self.hour_count, self.hour_start, 3600),
            LimitScope::Daily => (self.day_count, self.day_start, 86400),
            LimitScope::PerChat => return 0,
        };
        let age = now.signed_duration_since(start);
        if age.num_seconds() >= window_secs { 0 } else { count }
    }
}

/// Immutable record of a blocked admission attempt.
///
/// Created only on a blocked decision; never mutated or deleted by the
/// core (retention is an external cleanup job).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub user_id: UserId,
    pub chat_id: Option<ChatId>,
    pub scope: LimitScope,
    pub limit_value: u32,
    pub prompts_used: u32,
    pub decided_action: String,
    /// The blocked message text, when the gateway knows it.
    pub user_message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

// --- Stream protocol types ---

/// Machine-readable error codes carried on `error` events.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimitedBurst,
    RateLimitedChat,
    RateLimitedHour,
    RateLimitedDay,
    AlreadyProcessing,
    ToolFailure,
    GenerationCancelled,
    StoreUnavailable,
    GenerationTimeout,
    MaxIterations,
    InvalidMessage,
    ProviderFailure,
}

/// Aggregated metadata carried on `message_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub tokens_used: u64,
    /// Distinct tool names actually invoked, in first-use order.
    pub tools_used: Vec<String>,
    /// Wall-clock from message acceptance to completion.
    pub processing_time_ms: u64,
    /// Chart artifact produced by a visualization tool, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_url: Option<String>,
}

/// Ordered outbound events for one message's lifetime.
///
/// `chunk_id` starts at 0 and increments by exactly 1 per text chunk.
/// Exactly one terminal event ends the sequence: `message_complete` XOR
/// `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextChunk {
        content: String,
        chunk_id: u64,
    },
    ToolCallStart {
        tool_name: String,
        tool_id: ToolCallId,
    },
    ToolCallComplete {
        tool_id: ToolCallId,
        result: serde_json::Value,
    },
    MessageComplete {
        message_id: String,
        metadata: MessageMetadata,
    },
    Error {
        message: String,
        code: ErrorCode,
    },
    Pong,
}

// --- Provider types ---

/// Role of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One part of a chat message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    /// A plain-text turn.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }
}

/// A request to the model provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    /// Provider-format tool definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
}

/// Token usage reported by the model stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A single chunk from a streaming model response, already decoded from
/// the provider's wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderChunk {
    /// Incremental assistant text.
    TextDelta(String),
    /// The model requested a tool invocation (arguments fully accumulated).
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// Usage update (may arrive more than once; last wins).
    Usage(TokenUsage),
    /// End of the model turn.
    Stop { stop_reason: Option<String> },
}

/// A message persisted by the metadata sink, reloaded as chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_scope_windows() {
        assert_eq!(
            LimitScope::Burst.window(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            LimitScope::Hourly.window(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            LimitScope::Daily.window(),
            Some(Duration::from_secs(86400))
        );
        assert_eq!(LimitScope::PerChat.window(), None);
    }

    #[test]
    fn limit_scope_error_codes() {
        assert_eq!(LimitScope::Burst.error_code(), ErrorCode::RateLimitedBurst);
        assert_eq!(
            LimitScope::PerChat.error_code(),
            ErrorCode::RateLimitedChat
        );
        assert_eq!(LimitScope::Hourly.error_code(), ErrorCode::RateLimitedHour);
        assert_eq!(LimitScope::Daily.error_code(), ErrorCode::RateLimitedDay);
    }

    #[test]
    fn error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RateLimitedBurst).unwrap();
        assert_eq!(json, "\"RATE_LIMITED_BURST\"");
        let json = serde_json::to_string(&ErrorCode::AlreadyProcessing).unwrap();
        assert_eq!(json, "\"ALREADY_PROCESSING\"");
    }

    #[test]
    fn stream_event_wire_shape() {
        let event = StreamEvent::TextChunk {
            content: "hello".into(),
            chunk_id: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text_chunk");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["chunk_id"], 0);

        let event = StreamEvent::Error {
            message: "blocked".into(),
            code: ErrorCode::RateLimitedDay,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "RATE_LIMITED_DAY");

        let json = serde_json::to_value(&StreamEvent::Pong).unwrap();
        assert_eq!(json["type"], "pong");
    }

    #[test]
    fn message_metadata_omits_absent_chart_url() {
        let meta = MessageMetadata {
            tokens_used: 42,
            tools_used: vec!["get_stock_info".into()],
            processing_time_ms: 1200,
            chart_url: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("chart_url").is_none());
    }

    #[test]
    fn effective_count_zeroes_expired_windows() {
        let t0 = Utc::now();
        let mut counters = WindowCounters::zeroed(t0);
        counters.minute_count = 10;
        counters.hour_count = 40;

        // Inside the window, counts are visible.
        let t1 = t0 + chrono::Duration::seconds(30);
        assert_eq!(counters.effective_count(LimitScope::Burst, t1), 10);
        assert_eq!(counters.effective_count(LimitScope::Hourly, t1), 40);

        // 61s later the minute window is expired but the hour is not.
        let t2 = t0 + chrono::Duration::seconds(61);
        assert_eq!(counters.effective_count(LimitScope::Burst, t2), 0);
        assert_eq!(counters.effective_count(LimitScope::Hourly, t2), 40);
    }

    #[test]
    fn override_falls_back_per_scope() {
        let global = LimitSet {
            burst: 10,
            per_chat: 50,
            hourly: 150,
            daily: 1000,
        };
        assert_eq!(global.get(LimitScope::Burst), 10);
        assert_eq!(global.get(LimitScope::Daily), 1000);

        let ov: LimitOverride =
            serde_json::from_str(r#"{"burst": 20}"#).unwrap();
        assert_eq!(ov.burst, Some(20));
        assert_eq!(ov.hourly, None);
    }
}
