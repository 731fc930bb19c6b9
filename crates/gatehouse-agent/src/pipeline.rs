// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generation pipeline: a bounded agentic model loop.
//!
//! One run per admitted message. The pipeline streams model output, runs
//! requested tools through the orchestrator, feeds results back to the
//! model, and ends with exactly one terminal event: `Completed` or
//! `Failed`. A total wall-clock budget bounds the whole run; the caller's
//! cancellation token aborts it at any await point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use gatehouse_config::model::{GenerationConfig, ProviderConfig};
use gatehouse_core::{
    ChatId, ChatMessage, ChatRequest, ContentPart, ErrorCode, GatehouseError,
    MessageMetadata, MetadataSink, ModelProvider, ProviderChunk, Role, ToolCallId, UserId,
};
use gatehouse_tools::{ToolOrchestrator, ToolOutcome};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events emitted by a running generation, in order. The dispatcher turns
/// these into numbered wire events.
#[derive(Debug)]
pub enum PipelineEvent {
    Text(String),
    ToolStart {
        tool_name: String,
        tool_id: ToolCallId,
    },
    ToolComplete {
        tool_id: ToolCallId,
        result: serde_json::Value,
    },
    /// Terminal: the message finished normally.
    Completed {
        message_id: String,
        metadata: MessageMetadata,
    },
    /// Terminal: the message failed.
    Failed { code: ErrorCode, message: String },
}

/// A terminal failure with its machine-readable code.
struct Failure {
    code: ErrorCode,
    message: String,
}

impl Failure {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<GatehouseError> for Failure {
    fn from(e: GatehouseError) -> Self {
        let code = match &e {
            GatehouseError::Provider { .. } => ErrorCode::ProviderFailure,
            GatehouseError::Tool { .. } => ErrorCode::ToolFailure,
            GatehouseError::Store { .. } => ErrorCode::StoreUnavailable,
            GatehouseError::Timeout { .. } => ErrorCode::GenerationTimeout,
            GatehouseError::Cancelled => ErrorCode::GenerationCancelled,
            _ => ErrorCode::ProviderFailure,
        };
        Self::new(code, e.to_string())
    }
}

pub struct GenerationPipeline {
    provider: Arc<dyn ModelProvider>,
    orchestrator: Arc<ToolOrchestrator>,
    sink: Arc<dyn MetadataSink>,
    model: String,
    max_tokens: u32,
    system_prompt: Option<String>,
    max_iterations: u32,
    total_timeout: Duration,
    history_limit: u32,
}

impl GenerationPipeline {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        orchestrator: Arc<ToolOrchestrator>,
        sink: Arc<dyn MetadataSink>,
        provider_config: &ProviderConfig,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            provider,
            orchestrator,
            sink,
            model: provider_config.model.clone(),
            max_tokens: provider_config.max_tokens,
            system_prompt: generation.system_prompt.clone(),
            max_iterations: generation.max_iterations,
            total_timeout: Duration::from_secs(generation.total_timeout_secs),
            history_limit: generation.history_limit,
        }
    }

    /// Run one generation. Emits zero or more non-terminal events followed
    /// by exactly one terminal event on `tx` (unless the receiver is gone,
    /// in which case the run stops quietly).
    pub async fn run(
        &self,
        user: &UserId,
        chat: &ChatId,
        message: &str,
        cancel: CancellationToken,
        tx: mpsc::Sender<PipelineEvent>,
    ) {
        let started = Instant::now();

        // The user turn is persisted up front so history survives even a
        // failed generation. Persistence is non-fatal.
        let user_message_id = Uuid::new_v4().to_string();
        if let Err(e) = self
            .sink
            .persist_message(user, chat, &user_message_id, Role::User, message, None)
            .await
        {
            warn!(user = %user, error = %e, "failed to persist user message");
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(Failure::new(ErrorCode::GenerationCancelled, "generation cancelled"))
            }
            r = tokio::time::timeout(
                self.total_timeout,
                self.generate(user, chat, message, &cancel, &tx, started),
            ) => match r {
                Ok(inner) => inner,
                Err(_) => Err(Failure::new(
                    ErrorCode::GenerationTimeout,
                    format!("generation exceeded {}s", self.total_timeout.as_secs()),
                )),
            },
        };

        if let Err(failure) = result {
            // Abort any tool work still in flight before reporting.
            cancel.cancel();
            info!(user = %user, code = %failure.code, "generation failed");
            let _ = tx
                .send(PipelineEvent::Failed {
                    code: failure.code,
                    message: failure.message,
                })
                .await;
        }
    }

    async fn generate(
        &self,
        user: &UserId,
        chat: &ChatId,
        user_message: &str,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<PipelineEvent>,
        started: Instant,
    ) -> Result<(), Failure> {
        let history = match self.sink.load_history(chat, self.history_limit).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(chat = %chat, error = %e, "failed to load chat history");
                Vec::new()
            }
        };

        let mut messages: Vec<ChatMessage> = history
            .into_iter()
            .map(|turn| ChatMessage::text(turn.role, turn.content))
            .collect();
        messages.push(ChatMessage::text(Role::User, user_message));

        let tool_definitions = self.orchestrator.registry().provider_definitions();
        let mut meta = crate::metadata::MetadataBuilder::new(started);

        for iteration in 1..=self.max_iterations {
            debug!(iteration, "starting model turn");
            let request = ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                system: self.system_prompt.clone(),
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let mut stream = self.provider.stream(request).await?;
            let mut turn_text = String::new();
            let mut tool_calls: Vec<(String, String, serde_json::Value)> = Vec::new();

            while let Some(item) = stream.next().await {
                match item? {
                    ProviderChunk::TextDelta(text) => {
                        meta.push_text(&text);
                        turn_text.push_str(&text);
                        send(tx, PipelineEvent::Text(text)).await?;
                    }
                    ProviderChunk::ToolCall { id, name, arguments } => {
                        tool_calls.push((id, name, arguments));
                    }
                    ProviderChunk::Usage(usage) => meta.record_usage(usage),
                    ProviderChunk::Stop { stop_reason } => {
                        debug!(?stop_reason, "model turn finished");
                        break;
                    }
                }
            }

            if tool_calls.is_empty() {
                return self.finish(user, chat, meta, tx).await;
            }
            if iteration == self.max_iterations {
                return Err(Failure::new(
                    ErrorCode::MaxIterations,
                    format!("tool calls still pending after {iteration} model turns"),
                ));
            }

            let mut results: Vec<(String, serde_json::Value, bool)> = Vec::new();
            for (id, name, args) in &tool_calls {
                send(
                    tx,
                    PipelineEvent::ToolStart {
                        tool_name: name.clone(),
                        tool_id: ToolCallId(id.clone()),
                    },
                )
                .await?;
                meta.record_tool(name);

                let outcome = self.orchestrator.invoke(name, args, cancel).await;
                let (result, is_error) = match outcome {
                    ToolOutcome::Completed(value) => {
                        meta.note_result(&value);
                        (value, false)
                    }
                    ToolOutcome::TimedOut => {
                        (json!({"error": format!("tool `{name}` timed out")}), true)
                    }
                    ToolOutcome::Failed(msg) => (json!({"error": msg}), true),
                    ToolOutcome::Cancelled => {
                        return Err(Failure::new(
                            ErrorCode::GenerationCancelled,
                            "generation cancelled",
                        ));
                    }
                };
                send(
                    tx,
                    PipelineEvent::ToolComplete {
                        tool_id: ToolCallId(id.clone()),
                        result: result.clone(),
                    },
                )
                .await?;
                results.push((id.clone(), result, is_error));
            }

            // Feed the tool exchange back for the next model turn.
            let mut assistant_parts = Vec::new();
            if !turn_text.is_empty() {
                assistant_parts.push(ContentPart::Text { text: turn_text });
            }
            for (id, name, args) in tool_calls {
                assistant_parts.push(ContentPart::ToolUse {
                    id,
                    name,
                    input: args,
                });
            }
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: assistant_parts,
            });
            messages.push(ChatMessage {
                role: Role::User,
                content: results
                    .into_iter()
                    .map(|(id, value, is_error)| ContentPart::ToolResult {
                        tool_use_id: id,
                        content: value.to_string(),
                        is_error,
                    })
                    .collect(),
            });
        }

        // max_iterations >= 1 is enforced by config validation; the loop
        // always returns before falling through.
        Err(Failure::new(
            ErrorCode::MaxIterations,
            "no model turns executed",
        ))
    }

    async fn finish(
        &self,
        user: &UserId,
        chat: &ChatId,
        meta: crate::metadata::MetadataBuilder,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<(), Failure> {
        let message_id = Uuid::new_v4().to_string();
        let text = meta.text().to_string();
        let metadata = meta.build();

        if let Err(e) = self
            .sink
            .persist_message(user, chat, &message_id, Role::Assistant, &text, Some(&metadata))
            .await
        {
            warn!(user = %user, error = %e, "failed to persist assistant message");
        }

        send(
            tx,
            PipelineEvent::Completed {
                message_id,
                metadata,
            },
        )
        .await
    }
}

/// A closed channel means the connection is gone; surface it as a
/// cancellation so the run unwinds without further work.
async fn send(
    tx: &mpsc::Sender<PipelineEvent>,
    event: PipelineEvent,
) -> Result<(), Failure> {
    tx.send(event).await.map_err(|_| {
        Failure::new(ErrorCode::GenerationCancelled, "client disconnected")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gatehouse_config::model::ToolsConfig;
    use gatehouse_core::{ChatTurn, ChunkStream, TokenUsage, ToolBackend};
    use gatehouse_tools::ToolRegistry;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that plays back one scripted chunk list per model turn.
    struct ScriptedProvider {
        turns: Mutex<VecDeque<Vec<ProviderChunk>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Vec<ProviderChunk>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn stream(&self, request: ChatRequest) -> Result<ChunkStream, GatehouseError> {
            self.requests.lock().unwrap().push(request);
            let chunks = self
                .turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Ok(Box::pin(futures::stream::iter(
                chunks.into_iter().map(Ok),
            )))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        persisted: Mutex<Vec<(Role, String, bool)>>,
        history: Vec<ChatTurn>,
    }

    #[async_trait]
    impl MetadataSink for RecordingSink {
        async fn persist_message(
            &self,
            _user: &UserId,
            _chat: &ChatId,
            _message_id: &str,
            role: Role,
            content: &str,
            metadata: Option<&MessageMetadata>,
        ) -> Result<(), GatehouseError> {
            self.persisted
                .lock()
                .unwrap()
                .push((role, content.to_string(), metadata.is_some()));
            Ok(())
        }

        async fn load_history(
            &self,
            _chat: &ChatId,
            _limit: u32,
        ) -> Result<Vec<ChatTurn>, GatehouseError> {
            Ok(self.history.clone())
        }
    }

    struct EchoBackend;

    #[async_trait]
    impl ToolBackend for EchoBackend {
        async fn invoke(
            &self,
            _server: &str,
            tool: &str,
            arguments: &serde_json::Value,
        ) -> Result<serde_json::Value, GatehouseError> {
            if tool == "create_price_chart" {
                return Ok(json!({"chart_url": "https://charts.local/x.png"}));
            }
            Ok(json!({"tool": tool, "args": arguments}))
        }
    }

    fn pipeline(
        provider: Arc<ScriptedProvider>,
        sink: Arc<RecordingSink>,
    ) -> GenerationPipeline {
        let registry = Arc::new(ToolRegistry::from_config(&ToolsConfig::default()));
        let orchestrator = Arc::new(ToolOrchestrator::new(
            registry,
            Arc::new(EchoBackend),
            Duration::from_secs(60),
        ));
        GenerationPipeline::new(
            provider,
            orchestrator,
            sink,
            &ProviderConfig::default(),
            &GenerationConfig::default(),
        )
    }

    async fn run_collect(
        pipeline: &GenerationPipeline,
        cancel: CancellationToken,
    ) -> Vec<PipelineEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        pipeline
            .run(
                &UserId("u1".into()),
                &ChatId("c1".into()),
                "tell me about RELIANCE",
                cancel,
                tx,
            )
            .await;
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn text_turn() -> Vec<ProviderChunk> {
        vec![
            ProviderChunk::Usage(TokenUsage {
                input_tokens: 20,
                output_tokens: 0,
            }),
            ProviderChunk::TextDelta("Reliance ".into()),
            ProviderChunk::TextDelta("is up.".into()),
            ProviderChunk::Usage(TokenUsage {
                input_tokens: 0,
                output_tokens: 8,
            }),
            ProviderChunk::Stop {
                stop_reason: Some("end_turn".into()),
            },
        ]
    }

    fn tool_turn(tool: &str) -> Vec<ProviderChunk> {
        vec![
            ProviderChunk::ToolCall {
                id: format!("toolu_{tool}"),
                name: tool.into(),
                arguments: json!({"symbol": "RELIANCE"}),
            },
            ProviderChunk::Stop {
                stop_reason: Some("tool_use".into()),
            },
        ]
    }

    #[tokio::test]
    async fn text_only_run_completes_with_metadata() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_turn()]));
        let sink = Arc::new(RecordingSink::default());
        let p = pipeline(provider, sink.clone());

        let events = run_collect(&p, CancellationToken::new()).await;
        assert!(matches!(events[0], PipelineEvent::Text(_)));
        match events.last() {
            Some(PipelineEvent::Completed { metadata, .. }) => {
                assert_eq!(metadata.tokens_used, 28);
                assert!(metadata.tools_used.is_empty());
            }
            other => panic!("expected Completed terminal, got {other:?}"),
        }

        // User turn first, assistant aggregate with metadata second.
        let persisted = sink.persisted.lock().unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].0, Role::User);
        assert_eq!(persisted[1], (Role::Assistant, "Reliance is up.".into(), true));
    }

    #[tokio::test]
    async fn tool_loop_feeds_results_back_and_completes() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("get_stock_info"),
            text_turn(),
        ]));
        let sink = Arc::new(RecordingSink::default());
        let p = pipeline(provider.clone(), sink);

        let events = run_collect(&p, CancellationToken::new()).await;
        assert!(matches!(events[0], PipelineEvent::ToolStart { .. }));
        assert!(matches!(events[1], PipelineEvent::ToolComplete { .. }));
        match events.last() {
            Some(PipelineEvent::Completed { metadata, .. }) => {
                assert_eq!(metadata.tools_used, vec!["get_stock_info"]);
            }
            other => panic!("expected Completed terminal, got {other:?}"),
        }

        // Second request carries the tool exchange.
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert_eq!(second.messages.len(), 3);
        assert!(second.messages[1]
            .content
            .iter()
            .any(|p| matches!(p, ContentPart::ToolUse { .. })));
        assert!(second.messages[2]
            .content
            .iter()
            .any(|p| matches!(p, ContentPart::ToolResult { is_error: false, .. })));
    }

    #[tokio::test]
    async fn pending_tools_on_last_iteration_fail_with_max_iterations() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("get_stock_info"),
            tool_turn("get_news_sentiment"),
        ]));
        let p = pipeline(provider, Arc::new(RecordingSink::default()));

        let events = run_collect(&p, CancellationToken::new()).await;
        match events.last() {
            Some(PipelineEvent::Failed { code, .. }) => {
                assert_eq!(*code, ErrorCode::MaxIterations)
            }
            other => panic!("expected Failed terminal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_failure_is_recoverable() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("summon_dragon"),
            text_turn(),
        ]));
        let p = pipeline(provider.clone(), Arc::new(RecordingSink::default()));

        let events = run_collect(&p, CancellationToken::new()).await;
        // Start/complete pair still emitted, with an error payload.
        match &events[1] {
            PipelineEvent::ToolComplete { result, .. } => {
                assert!(result["error"].as_str().is_some())
            }
            other => panic!("expected ToolComplete, got {other:?}"),
        }
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::Completed { .. })
        ));

        // The error flows back to the model as an error tool_result.
        let requests = provider.requests.lock().unwrap();
        assert!(requests[1].messages[2]
            .content
            .iter()
            .any(|p| matches!(p, ContentPart::ToolResult { is_error: true, .. })));
    }

    #[tokio::test]
    async fn chart_url_lands_in_metadata() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("create_price_chart"),
            text_turn(),
        ]));
        let p = pipeline(provider, Arc::new(RecordingSink::default()));

        let events = run_collect(&p, CancellationToken::new()).await;
        match events.last() {
            Some(PipelineEvent::Completed { metadata, .. }) => {
                assert_eq!(
                    metadata.chart_url.as_deref(),
                    Some("https://charts.local/x.png")
                );
            }
            other => panic!("expected Completed terminal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_token_fails_with_cancelled() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_turn()]));
        let p = pipeline(provider, Arc::new(RecordingSink::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let events = run_collect(&p, cancel).await;
        match events.last() {
            Some(PipelineEvent::Failed { code, .. }) => {
                assert_eq!(*code, ErrorCode::GenerationCancelled)
            }
            other => panic!("expected Failed terminal, got {other:?}"),
        }
    }

    /// Provider whose stream stays open without ever yielding a chunk.
    struct StalledProvider;

    #[async_trait]
    impl ModelProvider for StalledProvider {
        async fn stream(&self, _request: ChatRequest) -> Result<ChunkStream, GatehouseError> {
            Ok(Box::pin(futures::stream::pending()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_model_stream_fails_with_generation_timeout() {
        let registry = Arc::new(ToolRegistry::from_config(&ToolsConfig::default()));
        let orchestrator = Arc::new(ToolOrchestrator::new(
            registry,
            Arc::new(EchoBackend),
            Duration::from_secs(60),
        ));
        let generation = GenerationConfig {
            total_timeout_secs: 2,
            ..GenerationConfig::default()
        };
        let sink = Arc::new(RecordingSink::default());
        let p = GenerationPipeline::new(
            Arc::new(StalledProvider),
            orchestrator,
            sink.clone(),
            &ProviderConfig::default(),
            &generation,
        );

        let events = run_collect(&p, CancellationToken::new()).await;
        assert_eq!(events.len(), 1);
        match events.last() {
            Some(PipelineEvent::Failed { code, message }) => {
                assert_eq!(*code, ErrorCode::GenerationTimeout);
                assert!(message.contains("2s"));
            }
            other => panic!("expected Failed terminal, got {other:?}"),
        }

        // Only the user turn was persisted; no assistant aggregate.
        let persisted = sink.persisted.lock().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].0, Role::User);
    }

    #[tokio::test]
    async fn history_turns_precede_the_user_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_turn()]));
        let sink = Arc::new(RecordingSink {
            history: vec![
                ChatTurn {
                    role: Role::User,
                    content: "earlier question".into(),
                },
                ChatTurn {
                    role: Role::Assistant,
                    content: "earlier answer".into(),
                },
            ],
            ..Default::default()
        });
        let p = pipeline(provider.clone(), sink);

        run_collect(&p, CancellationToken::new()).await;
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].messages.len(), 3);
        assert_eq!(requests[0].messages[0].role, Role::User);
        assert_eq!(requests[0].messages[1].role, Role::Assistant);
    }
}
