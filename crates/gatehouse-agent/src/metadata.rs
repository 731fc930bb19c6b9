// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation of per-message usage metadata.

use std::time::Instant;

use gatehouse_core::{MessageMetadata, TokenUsage};

/// Collects metadata across the whole generation: token usage, tool names
/// in first-use order, and the chart artifact if a visualization tool
/// produced one.
pub struct MetadataBuilder {
    started: Instant,
    text: String,
    tools_used: Vec<String>,
    usage: Option<TokenUsage>,
    chart_url: Option<String>,
}

impl MetadataBuilder {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            text: String::new(),
            tools_used: Vec::new(),
            usage: None,
            chart_url: None,
        }
    }

    pub fn push_text(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Full assistant text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct tool names, first-use order preserved.
    pub fn record_tool(&mut self, name: &str) {
        if !self.tools_used.iter().any(|t| t == name) {
            self.tools_used.push(name.to_string());
        }
    }

    /// Usage updates may arrive more than once per stream; last wins,
    /// but a later report never clears an earlier one.
    pub fn record_usage(&mut self, usage: TokenUsage) {
        let merged = match self.usage {
            Some(prev) => TokenUsage {
                input_tokens: if usage.input_tokens > 0 {
                    usage.input_tokens
                } else {
                    prev.input_tokens
                },
                output_tokens: usage.output_tokens.max(prev.output_tokens),
            },
            None => usage,
        };
        self.usage = Some(merged);
    }

    /// Capture a chart artifact from a tool result, first one wins.
    pub fn note_result(&mut self, result: &serde_json::Value) {
        if self.chart_url.is_none()
            && let Some(url) = result.get("chart_url").and_then(|v| v.as_str())
        {
            self.chart_url = Some(url.to_string());
        }
    }

    pub fn build(self) -> MessageMetadata {
        let tokens_used = match self.usage {
            Some(u) => u64::from(u.input_tokens) + u64::from(u.output_tokens),
            // No usage reported by the stream; estimate from word count.
            None => estimate_tokens(&self.text),
        };
        MessageMetadata {
            tokens_used,
            tools_used: self.tools_used,
            processing_time_ms: self.started.elapsed().as_millis() as u64,
            chart_url: self.chart_url,
        }
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.split_whitespace().count() as f64 * 1.3).round() as u64
}
