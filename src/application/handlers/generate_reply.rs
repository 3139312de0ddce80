//! Reply orchestrator - drives one streaming bot reply end to end.
//!
//! A run moves through the [`ReplyPhase`] machine: build the model
//! context, loop through tool decisions, stream the reply fragment by
//! fragment, persist it, and announce completion. Runs are spawned by
//! the submit handler and communicate only through the broadcast hub,
//! the stream registry, and the conversation store; failures never
//! reach the HTTP layer, and a disconnecting subscriber never cancels
//! a run.

use std::sync::Arc;

use thiserror::Error;

use crate::adapters::sse::{BroadcastHub, PushFrame};
use crate::application::stream_registry::{RegistryError, StreamSessionRegistry};
use crate::domain::conversation::{Conversation, HistoryTurn, Message};
use crate::domain::foundation::{ConversationId, MessageId, StateMachine, ValidationError};
use crate::domain::prompt::SYSTEM_PROMPT;
use crate::domain::streaming::{MessageSnapshot, ReplyPhase, StreamEvent, StreamKey};
use crate::ports::{
    ChatModel, ContextTurn, ConversationStore, ForecastKind, ModelError, StoreError,
    ToolCallRequest, WeatherService,
};

/// Reply used when the model produces no text at all.
const FALLBACK_REPLY: &str = "I apologize, but I'm having trouble processing your request.";

/// Reply broadcast when a run fails, so no client hangs in "typing".
const ERROR_REPLY: &str =
    "Sorry, something went wrong while answering. Please try asking again.";

/// Status label broadcast before context building starts.
const STATUS_PROCESSING: &str = "processing";

/// Status label broadcast while a weather tool call runs.
const STATUS_FETCHING: &str = "Fetching weather data...";

/// Status label broadcast when token streaming begins.
const STATUS_GENERATING: &str = "generating";

/// Tool name the model uses to ask for weather data.
const WEATHER_TOOL: &str = "get_weather";

/// Tuning knobs for reply generation.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on tool-decision rounds before a run is failed.
    pub max_tool_rounds: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_tool_rounds: 5 }
    }
}

/// Arguments the model supplies with a `get_weather` call.
#[derive(Debug, serde::Deserialize)]
struct WeatherArgs {
    city: String,
    #[serde(rename = "type", default)]
    kind: ForecastKind,
}

/// Errors that abort a reply run.
///
/// These stay inside the orchestrator; the public entry point converts
/// every failure into the `Errored` recovery path.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("stream session error: {0}")]
    Session(#[from] RegistryError),

    #[error("model requested tools for {0} rounds without answering")]
    ToolRoundsExceeded(u32),

    #[error("phase transition rejected: {0}")]
    Phase(#[from] ValidationError),
}

/// Drives the generation of one streaming bot reply.
pub struct ReplyOrchestrator {
    store: Arc<dyn ConversationStore>,
    model: Arc<dyn ChatModel>,
    weather: Arc<dyn WeatherService>,
    registry: Arc<StreamSessionRegistry>,
    hub: Arc<BroadcastHub>,
    config: OrchestratorConfig,
}

impl ReplyOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        model: Arc<dyn ChatModel>,
        weather: Arc<dyn WeatherService>,
        registry: Arc<StreamSessionRegistry>,
        hub: Arc<BroadcastHub>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            model,
            weather,
            registry,
            hub,
            config,
        }
    }

    /// Runs one reply for a just-submitted user message.
    ///
    /// Never returns an error: failures roll back the partial message,
    /// broadcast an apology, and end with a `done` event.
    pub async fn run(&self, conversation_id: ConversationId, user_text: String) {
        self.hub
            .broadcast(
                &conversation_id,
                PushFrame::event(StreamEvent::status(STATUS_PROCESSING)),
            )
            .await;

        match self.drive(conversation_id, &user_text).await {
            Ok(message_id) => {
                tracing::info!(%conversation_id, %message_id, "Reply completed");
            }
            Err((error, partial)) => {
                tracing::error!(%conversation_id, "Reply failed: {}", error);
                self.recover(conversation_id, partial).await;
            }
        }
    }

    /// The happy path of the phase machine.
    ///
    /// Returns the partially created bot message ID alongside the error
    /// so [`run`](Self::run) can roll it back.
    async fn drive(
        &self,
        conversation_id: ConversationId,
        user_text: &str,
    ) -> Result<MessageId, (ReplyError, Option<MessageId>)> {
        let mut phase = ReplyPhase::Building;

        // Building: system prompt, prior history, then the new message.
        let conversation = self
            .store
            .get(conversation_id)
            .await
            .map_err(|e| (ReplyError::Store(e), None))?
            .ok_or((ReplyError::ConversationNotFound(conversation_id), None))?;

        let mut context = Vec::with_capacity(conversation.history().len() + 2);
        context.push(ContextTurn::system(SYSTEM_PROMPT));
        context.extend(conversation.history().iter().map(ContextTurn::from));
        context.push(ContextTurn::user(user_text));

        phase = phase
            .transition_to(ReplyPhase::ToolDecision)
            .map_err(|e| (ReplyError::Phase(e), None))?;

        let (reply_text, last_city) = self
            .tool_loop(&conversation, &mut context, &mut phase)
            .await
            .map_err(|e| (e, None))?;

        // Streaming: the bot message exists in the store before the
        // first token so reconnect syncs always find it.
        phase = phase
            .transition_to(ReplyPhase::Streaming)
            .map_err(|e| (ReplyError::Phase(e), None))?;
        self.hub
            .broadcast(
                &conversation_id,
                PushFrame::event(StreamEvent::status(STATUS_GENERATING)),
            )
            .await;

        let message = Message::bot_streaming();
        let message_id = *message.id();
        self.store
            .append_message(conversation_id, &message)
            .await
            .map_err(|e| (ReplyError::Store(e), None))?;
        let partial = Some(message_id);

        let key = self
            .registry
            .create_session(conversation_id, message_id)
            .await;

        for fragment in fragments(&reply_text) {
            let outcome = self
                .registry
                .append(&key, fragment)
                .await
                .map_err(|e| (ReplyError::Session(e), partial))?;

            // Best-effort durable checkpoint; live delivery continues
            // even when the store is briefly down.
            if let Err(e) = self
                .store
                .update_message_text(conversation_id, message_id, &outcome.text)
                .await
            {
                tracing::warn!(%conversation_id, %message_id, "Mid-stream persist failed: {}", e);
            }

            let event = StreamEvent::token(message_id, fragment);
            let frame = match outcome.cursor {
                Some(cursor) => PushFrame::logged(cursor, event),
                None => PushFrame::event(event),
            };
            self.hub.broadcast(&conversation_id, frame).await;
        }

        // Persisting: completion must land; a message stuck with
        // streaming=true would look like an eternal "typing" state.
        phase = phase
            .transition_to(ReplyPhase::Persisting)
            .map_err(|e| (ReplyError::Phase(e), partial))?;

        let final_text = self
            .registry
            .complete(&key)
            .await
            .map_err(|e| (ReplyError::Session(e), partial))?;
        self.store
            .complete_message(conversation_id, message_id)
            .await
            .map_err(|e| (ReplyError::Store(e), partial))?;

        if let Err(e) = self
            .store
            .append_history(
                conversation_id,
                &[
                    HistoryTurn::human(user_text),
                    HistoryTurn::ai(final_text.clone()),
                ],
            )
            .await
        {
            tracing::warn!(%conversation_id, "History append failed: {}", e);
        }
        if let Some(city) = last_city {
            if let Err(e) = self.store.set_last_city(conversation_id, &city).await {
                tracing::warn!(%conversation_id, "Last-city update failed: {}", e);
            }
        }

        phase = phase
            .transition_to(ReplyPhase::Done)
            .map_err(|e| (ReplyError::Phase(e), partial))?;
        debug_assert!(phase.is_finished());

        self.hub
            .broadcast(
                &conversation_id,
                PushFrame::event(StreamEvent::Done { message_id }),
            )
            .await;

        Ok(message_id)
    }

    /// Tool-decision / tool-execution cycle.
    ///
    /// Returns the reply text (fallback when the model stays silent)
    /// and the last city a tool call asked about.
    async fn tool_loop(
        &self,
        conversation: &Conversation,
        context: &mut Vec<ContextTurn>,
        phase: &mut ReplyPhase,
    ) -> Result<(String, Option<String>), ReplyError> {
        let conversation_id = *conversation.id();
        let mut last_city = None;

        for _round in 0..self.config.max_tool_rounds {
            let turn = self.model.generate(context).await?;

            if !turn.has_tool_calls() {
                let reply = turn
                    .content
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_REPLY.to_string());
                return Ok((reply, last_city));
            }

            *phase = phase.transition_to(ReplyPhase::ToolExecuting)?;
            context.push(ContextTurn::Assistant {
                content: turn.content.clone(),
                tool_calls: turn.tool_calls.clone(),
            });

            for call in &turn.tool_calls {
                self.hub
                    .broadcast(
                        &conversation_id,
                        PushFrame::event(StreamEvent::status(STATUS_FETCHING)),
                    )
                    .await;

                let result = self.execute_tool(conversation, call, &mut last_city).await;
                context.push(ContextTurn::tool_result(call.id.clone(), result));
            }

            *phase = phase.transition_to(ReplyPhase::ToolDecision)?;
        }

        Err(ReplyError::ToolRoundsExceeded(self.config.max_tool_rounds))
    }

    /// Runs one tool call, mapping every failure to apologetic
    /// tool-result text so a bad lookup never aborts the reply.
    async fn execute_tool(
        &self,
        conversation: &Conversation,
        call: &ToolCallRequest,
        last_city: &mut Option<String>,
    ) -> String {
        if call.name != WEATHER_TOOL {
            tracing::warn!(tool = %call.name, "Model requested unknown tool");
            return format!("Unknown tool: {}", call.name);
        }

        let args: WeatherArgs = match call.parse_arguments() {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Malformed tool arguments: {}", e);
                return "Could not read the requested city.".to_string();
            }
        };

        // A blank city falls back to the one remembered from earlier
        // turns, matching how the assistant is prompted to behave.
        let city = if args.city.trim().is_empty() {
            match conversation.last_city() {
                Some(city) => city.to_string(),
                None => return "No city was specified.".to_string(),
            }
        } else {
            args.city.trim().to_string()
        };

        *last_city = Some(city.clone());
        self.weather.summary(&city, args.kind).await
    }

    /// The `Errored` path: roll back the partial message and make sure
    /// every watching client gets a terminal reply.
    async fn recover(&self, conversation_id: ConversationId, partial: Option<MessageId>) {
        if let Some(message_id) = partial {
            self.registry
                .discard(&StreamKey::new(conversation_id, message_id))
                .await;
            if let Err(e) = self.store.remove_message(conversation_id, message_id).await {
                tracing::warn!(%conversation_id, %message_id, "Partial message cleanup failed: {}", e);
            }
        }

        let apology = Message::bot(ERROR_REPLY);
        let apology_id = *apology.id();
        if let Err(e) = self.store.append_message(conversation_id, &apology).await {
            tracing::warn!(%conversation_id, "Apology persist failed: {}", e);
        }

        self.hub
            .broadcast(
                &conversation_id,
                PushFrame::event(StreamEvent::message_sync(vec![MessageSnapshot::from(
                    &apology,
                )])),
            )
            .await;
        self.hub
            .broadcast(
                &conversation_id,
                PushFrame::event(StreamEvent::Done {
                    message_id: apology_id,
                }),
            )
            .await;
    }
}

impl std::fmt::Debug for ReplyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Splits reply text into whitespace-preserving fragments whose
/// concatenation is exactly the input.
fn fragments(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockChatModel;
    use crate::adapters::memory::{InMemoryConversationStore, InMemoryEventLog};
    use crate::domain::streaming::StreamKey;
    use crate::ports::{EventLog, WeatherError, WeatherReport};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Canned weather service recording lookups.
    struct StubWeather {
        summary: String,
        calls: std::sync::Mutex<Vec<(String, ForecastKind)>>,
    }

    impl StubWeather {
        fn new(summary: impl Into<String>) -> Self {
            Self {
                summary: summary.into(),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, ForecastKind)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherService for StubWeather {
        async fn summary(&self, city: &str, kind: ForecastKind) -> String {
            self.calls.lock().unwrap().push((city.to_string(), kind));
            self.summary.clone()
        }

        async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
            Err(WeatherError::city_not_found(city))
        }
    }

    struct Harness {
        store: Arc<InMemoryConversationStore>,
        log: Arc<InMemoryEventLog>,
        registry: Arc<StreamSessionRegistry>,
        hub: Arc<BroadcastHub>,
        weather: Arc<StubWeather>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryConversationStore::new());
            let log = Arc::new(InMemoryEventLog::new());
            let registry = Arc::new(StreamSessionRegistry::new(
                log.clone() as Arc<dyn EventLog>,
                Duration::from_secs(300),
            ));
            let hub = Arc::new(BroadcastHub::with_default_capacity());
            let weather = Arc::new(StubWeather::new("Sunny, 21C in Pune"));
            Self {
                store,
                log,
                registry,
                hub,
                weather,
            }
        }

        fn orchestrator(&self, model: MockChatModel) -> ReplyOrchestrator {
            ReplyOrchestrator::new(
                self.store.clone(),
                Arc::new(model),
                self.weather.clone(),
                self.registry.clone(),
                self.hub.clone(),
                OrchestratorConfig::default(),
            )
        }

        async fn conversation(&self) -> ConversationId {
            let conversation = Conversation::new(None);
            let id = *conversation.id();
            self.store.create(&conversation).await.unwrap();
            id
        }
    }

    fn drain(receiver: &mut tokio::sync::mpsc::Receiver<PushFrame>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = receiver.try_recv() {
            if let PushFrame::Event { event, .. } = frame {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test]
    async fn plain_reply_streams_tokens_then_done() {
        let harness = Harness::new();
        let conversation_id = harness.conversation().await;
        let mut subscription = harness.hub.subscribe(&conversation_id).await;

        let orchestrator = harness.orchestrator(MockChatModel::new().with_reply("Clear skies."));
        orchestrator.run(conversation_id, "weather?".to_string()).await;

        let events = drain(&mut subscription.receiver);
        assert!(matches!(events.first(), Some(StreamEvent::Status { label }) if label == "processing"));
        let tokens: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, "Clear skies.");
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));

        let stored = harness.store.get(conversation_id).await.unwrap().unwrap();
        let bot = stored.messages().iter().find(|m| m.is_bot()).unwrap();
        assert_eq!(bot.text(), "Clear skies.");
        assert!(!bot.is_streaming());
        assert_eq!(stored.history().len(), 2);
    }

    #[tokio::test]
    async fn tool_round_fetches_weather_before_answering() {
        let harness = Harness::new();
        let conversation_id = harness.conversation().await;
        let mut subscription = harness.hub.subscribe(&conversation_id).await;

        let model = MockChatModel::new()
            .with_tool_call("call_1", "get_weather", r#"{"city":"Pune","type":"current"}"#)
            .with_reply("It is sunny in Pune.");
        let orchestrator = harness.orchestrator(model);
        orchestrator
            .run(conversation_id, "weather in Pune".to_string())
            .await;

        assert_eq!(
            harness.weather.calls(),
            vec![("Pune".to_string(), ForecastKind::Current)]
        );
        let events = drain(&mut subscription.receiver);
        let statuses: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Status { label } => Some(label.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec!["processing", "Fetching weather data...", "generating"]
        );

        let stored = harness.store.get(conversation_id).await.unwrap().unwrap();
        assert_eq!(stored.last_city(), Some("Pune"));
    }

    #[tokio::test]
    async fn empty_model_reply_substitutes_fallback() {
        let harness = Harness::new();
        let conversation_id = harness.conversation().await;

        let orchestrator = harness.orchestrator(MockChatModel::new().with_reply("  "));
        orchestrator.run(conversation_id, "hello".to_string()).await;

        let stored = harness.store.get(conversation_id).await.unwrap().unwrap();
        let bot = stored.messages().iter().find(|m| m.is_bot()).unwrap();
        assert_eq!(bot.text(), FALLBACK_REPLY);
        assert!(!bot.is_streaming());
    }

    #[tokio::test]
    async fn model_failure_broadcasts_apology_and_done() {
        let harness = Harness::new();
        let conversation_id = harness.conversation().await;
        let mut subscription = harness.hub.subscribe(&conversation_id).await;

        let orchestrator = harness.orchestrator(
            MockChatModel::new().with_error(ModelError::unavailable("overloaded")),
        );
        orchestrator.run(conversation_id, "hello".to_string()).await;

        let events = drain(&mut subscription.receiver);
        let apology = events.iter().find_map(|e| match e {
            StreamEvent::Message { messages } => messages.first(),
            _ => None,
        });
        assert!(apology.is_some());
        assert!(!apology.unwrap().text.is_empty());
        assert!(!apology.unwrap().streaming);
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));

        // Nothing left behind in the streaming state.
        let stored = harness.store.get(conversation_id).await.unwrap().unwrap();
        assert!(stored.streaming_messages().next().is_none());
    }

    #[tokio::test]
    async fn endless_tool_requests_hit_the_round_bound() {
        let harness = Harness::new();
        let conversation_id = harness.conversation().await;

        let mut model = MockChatModel::new();
        for round in 0..6 {
            model = model.with_tool_call(
                format!("call_{round}"),
                "get_weather",
                r#"{"city":"Pune"}"#,
            );
        }
        let orchestrator = harness.orchestrator(model);
        orchestrator.run(conversation_id, "weather".to_string()).await;

        // Five rounds ran, then the run errored into the apology path.
        assert_eq!(harness.weather.calls().len(), 5);
        let stored = harness.store.get(conversation_id).await.unwrap().unwrap();
        assert!(stored.streaming_messages().next().is_none());
    }

    #[tokio::test]
    async fn tokens_are_recorded_in_the_log_with_cursors() {
        let harness = Harness::new();
        let conversation_id = harness.conversation().await;

        let orchestrator = harness.orchestrator(MockChatModel::new().with_reply("a b c"));
        orchestrator.run(conversation_id, "hi".to_string()).await;

        let stored = harness.store.get(conversation_id).await.unwrap().unwrap();
        let bot = stored.messages().iter().find(|m| m.is_bot()).unwrap();
        let key = StreamKey::new(conversation_id, *bot.id());

        // Three fragments plus the completion marker.
        assert_eq!(harness.log.event_count(&key), 4);
    }

    #[tokio::test]
    async fn log_outage_still_streams_live() {
        let harness = Harness::new();
        let conversation_id = harness.conversation().await;
        let mut subscription = harness.hub.subscribe(&conversation_id).await;
        harness.log.set_failing(true);

        let orchestrator = harness.orchestrator(MockChatModel::new().with_reply("still here"));
        orchestrator.run(conversation_id, "hi".to_string()).await;

        let events = drain(&mut subscription.receiver);
        let tokens: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, "still here");
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[test]
    fn fragments_concatenate_to_the_input() {
        let text = "The  quick\nbrown fox.";
        let joined: String = fragments(text).collect();
        assert_eq!(joined, text);
    }
}
