//! The supervisor agent loop
//!
//! One call to [`SupervisorAgent::handle`] is one agent turn. Turns on the
//! same session are serialized through the session store's per-key lock;
//! different sessions run in parallel. Events stream out through a channel
//! so the gateway can forward deltas as they arrive; a watch-based
//! cancellation token stops the loop at the next suspension point when the
//! client disconnects.

use crate::confirm::{classify, ConfirmationStore, Lexeme, PendingConfirmation};
use crate::context::ContextBuilder;
use crate::metrics::AgentMetrics;
use selkie_core::config::{AgentConfig, MemoryConfig};
use selkie_core::metrics::{Metrics, SharedMetrics};
use selkie_core::Error;
use selkie_llm::{retry_with_backoff, ChatMessage, LlmAdapter, LlmResponse, RetryPolicy, ToolDefinition};
use selkie_memory::{EntryType, MemorySystem};
use selkie_session::{SessionKey, SessionStore};
use selkie_tools::ToolRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Reply shown when the LLM keeps failing or the step cap is hit
const APOLOGY_TEXT: &str = "I couldn't complete that. Please try again.";

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The model produced a final text reply
    Text,
    /// A destructive tool is waiting for user confirmation
    NeedsConfirmation,
    /// The step cap was reached
    StepCap,
    /// The turn was cancelled (client disconnect)
    Cancelled,
    /// The LLM failed past its retry budget
    Error,
}

impl TerminationReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::NeedsConfirmation => "needs_confirmation",
            Self::StepCap => "step_cap",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }
}

/// One event in the reply stream
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A chunk of reply text
    Delta(String),
    /// A destructive tool needs user input; the prompt names the action
    NeedsInput { prompt: String },
    /// Terminal event; nothing follows it
    Done { reason: TerminationReason },
}

/// The supervisor agent
pub struct SupervisorAgent {
    llm: Arc<dyn LlmAdapter>,
    tools: Arc<ToolRegistry>,
    memory: Arc<MemorySystem>,
    sessions: Arc<SessionStore>,
    context: ContextBuilder,
    confirmations: ConfirmationStore,
    config: AgentConfig,
    pub metrics: AgentMetrics,
    process_metrics: SharedMetrics,
}

impl SupervisorAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LlmAdapter>,
        tools: Arc<ToolRegistry>,
        memory: Arc<MemorySystem>,
        sessions: Arc<SessionStore>,
        system_prompt: impl Into<String>,
        config: AgentConfig,
        memory_settings: MemoryConfig,
        process_metrics: SharedMetrics,
    ) -> Self {
        let context = ContextBuilder::new(
            system_prompt,
            memory_settings.working_tokens_max,
            memory.clone(),
            sessions.clone(),
        );
        Self {
            llm,
            tools,
            memory,
            sessions,
            context,
            confirmations: ConfirmationStore::new(),
            config,
            metrics: AgentMetrics::new(),
            process_metrics,
        }
    }

    /// Run one agent turn, streaming events to the returned receiver
    ///
    /// The turn holds the session's key lock for its duration, so concurrent
    /// requests to the same session queue in arrival order.
    pub fn handle(
        self: &Arc<Self>,
        key: SessionKey,
        text: String,
        cancel: watch::Receiver<bool>,
    ) -> mpsc::Receiver<AgentEvent> {
        let (events, receiver) = mpsc::channel(32);
        let agent = Arc::clone(self);

        tokio::spawn(async move {
            let lock = agent.sessions.key_lock(&key).await;
            let _guard = lock.lock().await;

            let reason = agent.run_turn(&key, &text, cancel, &events).await;
            agent.metrics.record_termination(reason.as_str());
            let _ = events.send(AgentEvent::Done { reason }).await;
        });

        receiver
    }

    /// The turn body; returns how it ended
    async fn run_turn(
        &self,
        key: &SessionKey,
        text: &str,
        mut cancel: watch::Receiver<bool>,
        events: &mpsc::Sender<AgentEvent>,
    ) -> TerminationReason {
        // Confirmation short-circuit: a pending destructive call plus a
        // recognized lexeme bypasses the model entirely.
        if self.confirmations.has_pending(&key.canonical()).await {
            match classify(text) {
                Lexeme::Confirm => {
                    let Some(pending) = self.confirmations.take(&key.canonical()).await else {
                        return self.agent_loop(key, text, &mut cancel, events).await;
                    };
                    return self.execute_confirmed(key, text, pending, events).await;
                }
                Lexeme::Cancel => {
                    let _ = self.confirmations.take(&key.canonical()).await;
                    let reply = "Cancelled.";
                    let _ = events.send(AgentEvent::Delta(reply.to_string())).await;
                    self.persist_exchange(key, text, reply).await;
                    return TerminationReason::Text;
                }
                Lexeme::Other => {
                    // Not a confirmation; fall through to the model with the
                    // pending call left in place until its TTL.
                }
            }
        }

        self.agent_loop(key, text, &mut cancel, events).await
    }

    /// Execute a confirmed destructive call without an LLM round-trip
    async fn execute_confirmed(
        &self,
        key: &SessionKey,
        text: &str,
        pending: PendingConfirmation,
        events: &mpsc::Sender<AgentEvent>,
    ) -> TerminationReason {
        tracing::info!(
            session = %key,
            tool = %pending.tool_name,
            "executing confirmed destructive tool"
        );
        let output = self
            .tools
            .execute(&pending.tool_name, pending.arguments)
            .await;

        let reply = if output.success {
            output.observation
        } else {
            format!("That didn't work: {}", output.observation)
        };
        let _ = events.send(AgentEvent::Delta(reply.clone())).await;
        self.persist_exchange(key, text, &reply).await;
        TerminationReason::Text
    }

    /// The tool-calling loop
    async fn agent_loop(
        &self,
        key: &SessionKey,
        text: &str,
        cancel: &mut watch::Receiver<bool>,
        events: &mpsc::Sender<AgentEvent>,
    ) -> TerminationReason {
        let mut messages = self.context.build(key, text).await;
        let tools = self.tool_definitions().await;

        for step in 0..self.config.max_steps {
            if *cancel.borrow() {
                tracing::debug!(session = %key, step, "turn cancelled");
                return TerminationReason::Cancelled;
            }

            let response = match self.call_llm(messages.clone(), tools.clone(), cancel).await {
                Ok(response) => response,
                Err(Error::Cancelled) => return TerminationReason::Cancelled,
                Err(e) => {
                    tracing::error!(session = %key, error = %e, "LLM failed past retry budget");
                    let _ = events.send(AgentEvent::Delta(APOLOGY_TEXT.to_string())).await;
                    self.persist_exchange(key, text, APOLOGY_TEXT).await;
                    return TerminationReason::Error;
                }
            };

            if !response.has_tool_calls() {
                let reply = response.content;
                let _ = events.send(AgentEvent::Delta(reply.clone())).await;
                self.persist_exchange(key, text, &reply).await;
                self.capture_exchange(key, text, &reply).await;
                return TerminationReason::Text;
            }

            // Surface any pre-tool commentary before handling the calls
            if !response.content.is_empty() {
                let _ = events.send(AgentEvent::Delta(response.content.clone())).await;
            }

            for call in &response.tool_calls {
                if self.tools.needs_confirmation(&call.name).await {
                    let prompt = match self.tools.preview(&call.name, &call.arguments).await {
                        Some(preview) => format!("{}\nConfirm? (yes/no)", preview),
                        None => format!(
                            "About to run `{}`. Confirm? (yes/no)",
                            call.name
                        ),
                    };
                    self.confirmations
                        .put(PendingConfirmation::new(
                            key.canonical(),
                            call.name.clone(),
                            call.arguments.clone(),
                        ))
                        .await;
                    let _ = events
                        .send(AgentEvent::NeedsInput {
                            prompt: prompt.clone(),
                        })
                        .await;
                    self.persist_exchange(key, text, &prompt).await;
                    return TerminationReason::NeedsConfirmation;
                }

                // Tool errors are not retried here; the observation goes
                // back to the model, which may choose to recover.
                let output = self.tools.execute(&call.name, call.arguments.clone()).await;
                tracing::debug!(
                    session = %key,
                    tool = %call.name,
                    success = output.success,
                    step,
                    "tool executed"
                );
                messages.push(ChatMessage::assistant(format!(
                    "Calling {} with {}",
                    call.name, call.arguments
                )));
                messages.push(ChatMessage::tool(output.observation));
            }
        }

        tracing::warn!(session = %key, max_steps = self.config.max_steps, "step cap reached");
        let _ = events.send(AgentEvent::Delta(APOLOGY_TEXT.to_string())).await;
        self.persist_exchange(key, text, APOLOGY_TEXT).await;
        TerminationReason::StepCap
    }

    /// One LLM call under timeout, retry policy and cancellation
    async fn call_llm(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
        cancel: &mut watch::Receiver<bool>,
    ) -> selkie_core::Result<LlmResponse> {
        let policy = RetryPolicy {
            attempts_max: self.config.llm_retries,
            ..RetryPolicy::default()
        };
        let timeout = Duration::from_millis(self.config.llm_timeout_ms);

        let started = Instant::now();
        let call = retry_with_backoff(&policy, || {
            let messages = messages.clone();
            let tools = tools.clone();
            async move {
                match tokio::time::timeout(timeout, self.llm.generate_with_tools(messages, tools))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::LlmTimeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
        });

        let result = tokio::select! {
            result = call => result,
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return Err(Error::Cancelled);
                }
                return Err(Error::internal("cancellation channel closed"));
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_llm_call(latency_ms);
        Metrics::incr(&self.process_metrics.agent_llm_calls_total);
        Metrics::add(&self.process_metrics.agent_llm_latency_ms_total, latency_ms);

        result
    }

    /// Tool definitions in the adapter's neutral shape
    async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .list_metadata()
            .await
            .into_iter()
            .map(|m| ToolDefinition {
                name: m.name.clone(),
                description: m.description.clone(),
                parameters: m.to_json_schema(),
            })
            .collect()
    }

    /// Append the user/assistant exchange to the transcript
    async fn persist_exchange(&self, key: &SessionKey, user: &str, assistant: &str) {
        let mut session = self.sessions.get_or_create(key).await;
        session.add_message("user", user);
        session.add_message("assistant", assistant);
        if let Err(e) = self.sessions.save(&mut session).await {
            tracing::error!(session = %key, error = %e, "failed to persist exchange");
        }
    }

    /// Capture the exchange into long-term memory as an event
    async fn capture_exchange(&self, key: &SessionKey, user: &str, assistant: &str) {
        let content = format!("User said: {} / Assistant replied: {}", user, assistant);
        if let Err(e) = self
            .memory
            .capture(
                content,
                EntryType::Event,
                vec![format!("session:{}", key.canonical())],
                serde_json::Value::Null,
            )
            .await
        {
            tracing::debug!(error = %e, "exchange capture failed");
        }
    }

    /// Pending-confirmation check, used by tests and the gateway
    pub async fn has_pending_confirmation(&self, key: &SessionKey) -> bool {
        self.confirmations.has_pending(&key.canonical()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selkie_llm::{MockLlm, ToolCallRequest};
    use selkie_memory::{MemorySystemConfig, MockEmbedder};
    use selkie_tools::builtin::{register_task_tools, TaskStore};
    use serde_json::json;

    struct Fixture {
        agent: Arc<SupervisorAgent>,
        tasks: Arc<TaskStore>,
        sessions: Arc<SessionStore>,
        llm: Arc<MockLlm>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(llm: MockLlm) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Metrics::new_shared();

        let memory = Arc::new(
            MemorySystem::open(
                MemorySystemConfig::new(dir.path().join("memories")),
                Arc::new(MockEmbedder::new(16)),
                None,
                metrics.clone(),
            )
            .unwrap(),
        );
        let sessions = Arc::new(SessionStore::open(dir.path().join("sessions")).unwrap());
        let tools = Arc::new(ToolRegistry::new());
        let tasks = Arc::new(TaskStore::open(dir.path().join("tasks.json")).unwrap());
        register_task_tools(&tools, tasks.clone()).await.unwrap();

        let llm = Arc::new(llm);
        let agent = Arc::new(SupervisorAgent::new(
            llm.clone(),
            tools,
            memory,
            sessions.clone(),
            "You are a test assistant.",
            AgentConfig {
                max_steps: 5,
                llm_retries: 2,
                llm_timeout_ms: 5000,
            },
            MemoryConfig::default(),
            metrics,
        ));

        Fixture {
            agent,
            tasks,
            sessions,
            llm,
            _dir: dir,
        }
    }

    fn key() -> SessionKey {
        SessionKey::parse("agent:main:cli:u1").unwrap()
    }

    async fn collect(
        agent: &Arc<SupervisorAgent>,
        text: &str,
    ) -> Vec<AgentEvent> {
        let (_tx, cancel) = watch::channel(false);
        let mut receiver = agent.handle(key(), text.to_string(), cancel);
        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_plain_text_turn() {
        let f = fixture(MockLlm::scripted(vec![LlmResponse::text("hello there")])).await;
        let events = collect(&f.agent, "hi").await;

        assert_eq!(events[0], AgentEvent::Delta("hello there".to_string()));
        assert_eq!(
            *events.last().unwrap(),
            AgentEvent::Done {
                reason: TerminationReason::Text
            }
        );

        // Transcript carries both sides of the exchange
        let history = f.sessions.history(&key(), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_tool_loop_executes_and_iterates() {
        let tool_call = LlmResponse {
            tool_calls: vec![ToolCallRequest {
                id: "call_0".into(),
                name: "list_tasks".into(),
                arguments: json!({}),
            }],
            finish_reason: "tool_calls".into(),
            ..Default::default()
        };
        let f = fixture(MockLlm::scripted(vec![
            tool_call,
            LlmResponse::text("you have no tasks"),
        ]))
        .await;

        let events = collect(&f.agent, "what are my tasks?").await;
        assert!(events.contains(&AgentEvent::Delta("you have no tasks".to_string())));
        assert_eq!(f.llm.call_count(), 2, "observation fed back for a second call");
    }

    #[tokio::test]
    async fn test_destructive_tool_needs_confirmation() {
        let delete_call = LlmResponse {
            tool_calls: vec![ToolCallRequest {
                id: "call_0".into(),
                name: "delete_tasks".into(),
                arguments: json!({}),
            }],
            finish_reason: "tool_calls".into(),
            ..Default::default()
        };
        let f = fixture(MockLlm::scripted(vec![delete_call])).await;
        f.tasks.create("water plants").await.unwrap();
        f.tasks.create("call mom").await.unwrap();

        // First turn: the agent must hold the call and ask
        let events = collect(&f.agent, "clear all tasks").await;
        let prompt = events
            .iter()
            .find_map(|e| match e {
                AgentEvent::NeedsInput { prompt } => Some(prompt.clone()),
                _ => None,
            })
            .expect("needs_input event");
        assert!(prompt.contains("water plants"));
        assert!(prompt.contains("call mom"));
        assert_eq!(
            *events.last().unwrap(),
            AgentEvent::Done {
                reason: TerminationReason::NeedsConfirmation
            }
        );
        assert_eq!(f.tasks.list().await.len(), 2, "nothing deleted yet");
        assert!(f.agent.has_pending_confirmation(&key()).await);
        let llm_calls_before = f.llm.call_count();

        // Second turn: "yes" executes without another LLM round-trip
        let events = collect(&f.agent, "yes").await;
        assert!(f.tasks.list().await.is_empty(), "both tasks deleted");
        assert_eq!(f.llm.call_count(), llm_calls_before, "no LLM call for the confirmation");
        assert!(matches!(events[0], AgentEvent::Delta(_)));

        // A second "yes" finds nothing pending and goes through the model
        let _ = collect(&f.agent, "yes").await;
        assert!(f.llm.call_count() > llm_calls_before);
    }

    #[tokio::test]
    async fn test_cancel_lexeme_discards_pending() {
        let delete_call = LlmResponse {
            tool_calls: vec![ToolCallRequest {
                id: "call_0".into(),
                name: "delete_tasks".into(),
                arguments: json!({}),
            }],
            finish_reason: "tool_calls".into(),
            ..Default::default()
        };
        let f = fixture(MockLlm::scripted(vec![delete_call])).await;
        f.tasks.create("precious task").await.unwrap();

        collect(&f.agent, "clear my tasks").await;
        assert!(f.agent.has_pending_confirmation(&key()).await);

        let events = collect(&f.agent, "no").await;
        assert!(events.contains(&AgentEvent::Delta("Cancelled.".to_string())));
        assert!(!f.agent.has_pending_confirmation(&key()).await);
        assert_eq!(f.tasks.list().await.len(), 1, "nothing deleted");
    }

    #[tokio::test]
    async fn test_step_cap_yields_apology() {
        // The model asks for the same tool forever
        let loop_call = || LlmResponse {
            tool_calls: vec![ToolCallRequest {
                id: "call_0".into(),
                name: "list_tasks".into(),
                arguments: json!({}),
            }],
            finish_reason: "tool_calls".into(),
            ..Default::default()
        };
        let f = fixture(MockLlm::scripted(
            (0..10).map(|_| loop_call()).collect(),
        ))
        .await;

        let events = collect(&f.agent, "loop forever").await;
        assert_eq!(
            *events.last().unwrap(),
            AgentEvent::Done {
                reason: TerminationReason::StepCap
            }
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, AgentEvent::Delta(d) if d.contains("couldn't complete"))));
        assert_eq!(f.llm.call_count(), 5, "bounded by max_steps");
    }

    #[tokio::test]
    async fn test_turns_serialized_per_session() {
        let f = fixture(MockLlm::new()).await;

        let (_tx, cancel) = watch::channel(false);
        let mut first = f.agent.handle(key(), "one".into(), cancel.clone());
        let mut second = f.agent.handle(key(), "two".into(), cancel);

        // Drain both turns; the per-key lock guarantees the transcripts of
        // the two exchanges do not interleave.
        while first.recv().await.is_some() {}
        while second.recv().await.is_some() {}

        let history = f.sessions.history(&key(), 10).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "one");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[2].content, "two");
    }

    #[tokio::test]
    async fn test_cancellation_stops_turn() {
        let f = fixture(MockLlm::new()).await;
        let (tx, cancel) = watch::channel(false);

        // Cancel before the turn starts its first LLM call
        tx.send(true).unwrap();
        let mut receiver = f.agent.handle(key(), "hello".into(), cancel);

        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        assert_eq!(
            *events.last().unwrap(),
            AgentEvent::Done {
                reason: TerminationReason::Cancelled
            }
        );
        // No deltas were produced
        assert_eq!(events.len(), 1);
    }
}
