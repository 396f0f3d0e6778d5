//! Chat turn orchestration.
//!
//! `ChatOrchestrator` runs one turn end to end: persist the user message,
//! assemble context, resolve the model and provider, call the provider,
//! forward partial output, and persist at most one assistant message.
//!
//! The two writes of a turn are independent store calls. A turn that fails
//! after the user message was written keeps that message; nothing is rolled
//! back and nothing is retried.

use std::sync::Arc;

use futures_util::StreamExt;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use colloquy_types::auth::Identity;
use colloquy_types::chat::{
    Canvas, ChatEvent, ChatMessage, ChatTurn, MessageRole, SendMessageRequest,
};
use colloquy_types::config::ChatConfig;
use colloquy_types::error::{ChatError, RepositoryError};
use colloquy_types::llm::{Message, ModelParams, ProviderError, StreamEvent};
use colloquy_types::model::{CatalogStatus, ModelRecord};

use crate::chat::context::ConversationAssembler;
use crate::chat::repository::ChatStore;
use crate::chat::service::owned_canvas;
use crate::chat::turn::{TurnState, TurnTracker};
use crate::llm::box_provider::BoxChatProvider;
use crate::llm::catalog::ModelCatalog;
use crate::llm::provider::ProviderStream;
use crate::llm::registry::ProviderRegistry;

/// Message sent to the client when the upstream stream did not complete.
const STREAM_FAILED_MESSAGE: &str = "the model stream ended before the answer was complete";

/// A streamed turn in progress.
///
/// `events` yields the `user` echo first, then `assistant` updates, then
/// optionally `error`, then `done`. The channel closes without `done` only
/// when the turn was cancelled.
pub struct ChatStream {
    pub user_message: ChatMessage,
    pub assistant_id: Uuid,
    pub events: mpsc::Receiver<ChatEvent>,
    pub handle: JoinHandle<TurnOutcome>,
}

/// How a turn ended, as seen by the pump task.
#[derive(Debug)]
pub struct TurnOutcome {
    pub state: TurnState,
    /// The stored assistant message; `None` if nothing was persisted.
    pub assistant_message: Option<ChatMessage>,
}

/// Everything resolved before the provider is called.
struct PreparedTurn {
    tracker: TurnTracker,
    canvas: Canvas,
    user_message: ChatMessage,
    messages: Vec<Message>,
    model: ModelRecord,
    provider: Arc<BoxChatProvider>,
    params: ModelParams,
}

enum Termination {
    Completed(String),
    Truncated { received: usize, reason: String },
    Cancelled,
}

/// Runs chat turns against a store, a model catalog and a provider registry.
pub struct ChatOrchestrator<S: ChatStore, C: ModelCatalog> {
    store: Arc<S>,
    catalog: Arc<C>,
    registry: Arc<ProviderRegistry>,
    assembler: ConversationAssembler<S>,
    default_model: String,
    stream_buffer: usize,
}

impl<S, C> ChatOrchestrator<S, C>
where
    S: ChatStore + 'static,
    C: ModelCatalog + 'static,
{
    pub fn new(
        store: Arc<S>,
        catalog: Arc<C>,
        registry: Arc<ProviderRegistry>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            assembler: ConversationAssembler::new(Arc::clone(&store), config.context_window),
            store,
            catalog,
            registry,
            default_model: config.default_model.clone(),
            stream_buffer: config.stream_buffer.max(1),
        }
    }

    /// Run a turn and wait for the whole answer.
    pub async fn invoke(
        &self,
        identity: &Identity,
        canvas_id: &Uuid,
        request: SendMessageRequest,
    ) -> Result<ChatTurn, ChatError> {
        let mut turn = self.prepare(identity, canvas_id, request).await?;

        let answer = match turn
            .provider
            .call_once(&turn.model.vendor_model, &turn.messages, &turn.params)
            .await
        {
            Ok(answer) if answer.content.is_empty() => {
                turn.tracker.fail();
                return Err(ProviderError::EmptyUpstreamResponse.into());
            }
            Ok(answer) => answer,
            Err(err) => {
                warn!(canvas_id = %canvas_id, model = %turn.model.id, error = %err, "provider call failed");
                turn.tracker.fail();
                return Err(err.into());
            }
        };

        turn.tracker.advance(TurnState::Finalizing);
        let assistant = assistant_message(
            Uuid::now_v7(),
            &turn.user_message,
            &turn.model,
            answer.content,
        );
        persist_assistant(self.store.as_ref(), &assistant).await;
        turn.tracker.advance(TurnState::Completed);

        Ok(ChatTurn {
            user_message: turn.user_message,
            assistant_message: assistant,
        })
    }

    /// Run a turn and stream the answer.
    ///
    /// Errors returned here happen before any event is produced. After
    /// `Ok`, failures are reported in-band as an `error` event. Firing
    /// `cancel` or dropping `events` abandons the turn: the provider stream
    /// is dropped and no assistant message is stored.
    pub async fn stream(
        &self,
        identity: &Identity,
        canvas_id: &Uuid,
        request: SendMessageRequest,
        cancel: CancellationToken,
    ) -> Result<ChatStream, ChatError> {
        let mut turn = self.prepare(identity, canvas_id, request).await?;

        let upstream = match turn
            .provider
            .open_stream(
                &turn.model.vendor_model,
                std::mem::take(&mut turn.messages),
                turn.params.clone(),
            )
            .await
        {
            Ok(upstream) => upstream,
            Err(err) => {
                warn!(canvas_id = %canvas_id, model = %turn.model.id, error = %err, "provider stream failed to open");
                turn.tracker.fail();
                return Err(err.into());
            }
        };
        turn.tracker.advance(TurnState::Streaming);

        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let assistant_id = Uuid::now_v7();
        // The channel is empty, so the echo always fits.
        let _ = tx.try_send(ChatEvent::User {
            id: turn.user_message.id,
            content: turn.user_message.content.clone(),
        });

        let user_message = turn.user_message.clone();
        let handle = tokio::spawn(pump(
            Arc::clone(&self.store),
            turn,
            upstream,
            tx,
            cancel,
            assistant_id,
        ));

        Ok(ChatStream {
            user_message,
            assistant_id,
            events: rx,
            handle,
        })
    }

    async fn prepare(
        &self,
        identity: &Identity,
        canvas_id: &Uuid,
        request: SendMessageRequest,
    ) -> Result<PreparedTurn, ChatError> {
        if request.content.trim().is_empty() {
            return Err(ChatError::Validation("content must not be empty".to_string()));
        }

        let canvas = owned_canvas(self.store.as_ref(), &identity.tenant_id, canvas_id).await?;

        let mut tracker = TurnTracker::new(canvas.id);

        let user_message = ChatMessage::new(
            canvas.id,
            request.parent_id,
            MessageRole::User,
            request.content,
            identity.user_id,
        )
        .with_metadata(request.metadata);

        if let Err(err) = self.store.create_message(&user_message).await {
            tracker.fail();
            warn!(canvas_id = %canvas.id, error = %err, "failed to persist user message");
            return Err(match err {
                RepositoryError::Conflict(_) => ChatError::Validation(
                    "parent message must belong to the same canvas".to_string(),
                ),
                other => ChatError::PersistFailed(other.to_string()),
            });
        }
        tracker.advance(TurnState::UserPersisted);
        info!(
            canvas_id = %canvas.id,
            message_id = %user_message.id,
            user_id = %identity.user_id,
            "user message persisted"
        );

        let history = self
            .assembler
            .assemble(&canvas.id, user_message.parent_id.as_ref())
            .await;
        let mut messages: Vec<Message> = history
            .into_iter()
            .map(|m| Message::new(m.role, m.content))
            .collect();
        messages.push(Message::user(user_message.content.clone()));
        tracker.advance(TurnState::ContextAssembled);

        let model_id = request
            .model_id
            .or_else(|| canvas.model_id.clone())
            .unwrap_or_else(|| self.default_model.clone());

        let (model, provider) = match self.resolve(&model_id).await {
            Ok(resolved) => resolved,
            Err(err) => {
                tracker.fail();
                warn!(canvas_id = %canvas.id, model = %model_id, error = %err, "model resolution failed");
                return Err(err);
            }
        };
        let params = match &request.params {
            Some(overrides) => model.params.merged_with(overrides),
            None => model.params.clone(),
        };
        tracker.advance(TurnState::Invoking);

        Ok(PreparedTurn {
            tracker,
            canvas,
            user_message,
            messages,
            model,
            provider,
            params,
        })
    }

    /// Model record → active credential → cached adapter.
    async fn resolve(
        &self,
        model_id: &str,
    ) -> Result<(ModelRecord, Arc<BoxChatProvider>), ChatError> {
        let model = self
            .catalog
            .get_model(model_id)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?
            .filter(|m| m.status == CatalogStatus::Active)
            .ok_or_else(|| ChatError::ModelResolution(format!("model '{model_id}' not found")))?;

        let api_key: SecretString = self
            .catalog
            .active_api_key(&model.provider_id)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?
            .ok_or_else(|| {
                ChatError::ModelResolution(format!(
                    "no active API key for provider '{}'",
                    model.provider_id
                ))
            })?;

        let provider = self
            .registry
            .get_provider(&model.provider_id, &api_key)
            .map_err(|err| match err {
                ProviderError::ProviderNotFound(id) => {
                    ChatError::ModelResolution(format!("provider '{id}' not registered"))
                }
                other => ChatError::Upstream(other),
            })?;

        Ok((model, provider))
    }
}

/// Forward provider events to the client, then finalize.
async fn pump<S: ChatStore>(
    store: Arc<S>,
    mut turn: PreparedTurn,
    mut upstream: ProviderStream,
    tx: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
    assistant_id: Uuid,
) -> TurnOutcome {
    let canvas_id = turn.canvas.id;
    let mut forwarded = 0usize;
    let mut last_len = 0usize;

    let termination = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Termination::Cancelled,
            _ = tx.closed() => break Termination::Cancelled,
            next = upstream.next() => next,
        };

        match next {
            Some(StreamEvent::Partial { content }) => {
                last_len = content.len();
                let event = ChatEvent::Assistant {
                    id: assistant_id,
                    content,
                };
                if !forward(&tx, &cancel, event).await {
                    break Termination::Cancelled;
                }
                forwarded += 1;
            }
            Some(StreamEvent::Completed { content }) => break Termination::Completed(content),
            Some(StreamEvent::Truncated { content, reason }) => {
                break Termination::Truncated {
                    received: content.len(),
                    reason,
                };
            }
            None => {
                break Termination::Truncated {
                    received: last_len,
                    reason: "stream closed without a terminal event".to_string(),
                };
            }
        }
    };

    // Releases the upstream connection before any further awaits.
    drop(upstream);

    match termination {
        Termination::Cancelled => {
            info!(
                canvas_id = %canvas_id,
                message_id = %assistant_id,
                forwarded,
                "turn cancelled by client, partial answer discarded"
            );
            turn.tracker.fail();
            TurnOutcome {
                state: turn.tracker.state(),
                assistant_message: None,
            }
        }
        Termination::Truncated { received, reason } => {
            warn!(
                canvas_id = %canvas_id,
                message_id = %assistant_id,
                received_bytes = received,
                reason = %reason,
                "provider stream truncated, answer not persisted"
            );
            turn.tracker.fail();
            let _ = forward(
                &tx,
                &cancel,
                ChatEvent::Error {
                    content: STREAM_FAILED_MESSAGE.to_string(),
                },
            )
            .await;
            let _ = forward(&tx, &cancel, ChatEvent::Done).await;
            TurnOutcome {
                state: turn.tracker.state(),
                assistant_message: None,
            }
        }
        Termination::Completed(content) if content.is_empty() => {
            warn!(canvas_id = %canvas_id, message_id = %assistant_id, "provider stream completed empty");
            turn.tracker.fail();
            let _ = forward(
                &tx,
                &cancel,
                ChatEvent::Error {
                    content: ProviderError::EmptyUpstreamResponse.to_string(),
                },
            )
            .await;
            let _ = forward(&tx, &cancel, ChatEvent::Done).await;
            TurnOutcome {
                state: turn.tracker.state(),
                assistant_message: None,
            }
        }
        Termination::Completed(content) => {
            if content.len() != last_len {
                // The terminal carried more than the last partial did.
                let event = ChatEvent::Assistant {
                    id: assistant_id,
                    content: content.clone(),
                };
                if !forward(&tx, &cancel, event).await {
                    turn.tracker.fail();
                    return TurnOutcome {
                        state: turn.tracker.state(),
                        assistant_message: None,
                    };
                }
            }

            turn.tracker.advance(TurnState::Finalizing);
            let assistant = assistant_message(assistant_id, &turn.user_message, &turn.model, content);
            let stored = persist_assistant(store.as_ref(), &assistant).await;
            turn.tracker.advance(TurnState::Completed);
            let _ = forward(&tx, &cancel, ChatEvent::Done).await;

            TurnOutcome {
                state: turn.tracker.state(),
                assistant_message: stored.then_some(assistant),
            }
        }
    }
}

/// Send one event unless the turn is cancelled first. `false` means the
/// client is gone.
async fn forward(tx: &mpsc::Sender<ChatEvent>, cancel: &CancellationToken, event: ChatEvent) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

fn assistant_message(
    id: Uuid,
    user_message: &ChatMessage,
    model: &ModelRecord,
    content: String,
) -> ChatMessage {
    let mut message = ChatMessage::new(
        user_message.canvas_id,
        Some(user_message.id),
        MessageRole::Assistant,
        content,
        user_message.created_by,
    )
    .with_metadata(Some(serde_json::json!({
        "model": model.id,
        "provider": model.provider_id,
    })));
    message.id = id;
    message
}

/// Store the final answer once. A failure here is logged, never retried:
/// the client already has the answer and a retry could store it twice.
async fn persist_assistant<S: ChatStore>(store: &S, message: &ChatMessage) -> bool {
    match store.create_message(message).await {
        Ok(()) => {
            info!(
                canvas_id = %message.canvas_id,
                message_id = %message.id,
                bytes = message.content.len(),
                "assistant message persisted"
            );
            true
        }
        Err(err) => {
            error!(
                canvas_id = %message.canvas_id,
                message_id = %message.id,
                parent_id = ?message.parent_id,
                bytes = message.content.len(),
                error = %err,
                "durability lost: answer delivered but assistant message not persisted"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        boxed, Ending, InMemoryCatalog, InMemoryChatStore, ScriptedProvider, TEST_TENANT,
    };
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        store: Arc<InMemoryChatStore>,
        orchestrator: ChatOrchestrator<InMemoryChatStore, InMemoryCatalog>,
        identity: Identity,
    }

    fn harness_with(provider: ScriptedProvider, catalog: InMemoryCatalog) -> Harness {
        let store = Arc::new(InMemoryChatStore::default());
        let mut registry = ProviderRegistry::new();
        let slot = std::sync::Mutex::new(Some(provider));
        registry.register_factory("scripted", move |_: &SecretString| {
            slot.lock()
                .unwrap()
                .take()
                .map(boxed)
                .ok_or(ProviderError::UpstreamCallFailed("factory exhausted".into()))
        });
        let config = ChatConfig {
            stream_buffer: 4,
            ..ChatConfig::default()
        };
        let orchestrator =
            ChatOrchestrator::new(Arc::clone(&store), Arc::new(catalog), Arc::new(registry), &config);
        Harness {
            store,
            orchestrator,
            identity: Identity {
                user_id: Uuid::now_v7(),
                tenant_id: TEST_TENANT,
                email: "ada@example.com".to_string(),
            },
        }
    }

    fn default_catalog() -> InMemoryCatalog {
        InMemoryCatalog::default()
            .with_model("default", "scripted", "scripted-1")
            .with_key("scripted", "sk-test")
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        harness_with(provider, default_catalog())
    }

    fn say(content: &str) -> SendMessageRequest {
        SendMessageRequest {
            content: content.to_string(),
            ..Default::default()
        }
    }

    async fn drain(mut events: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut out = Vec::new();
        while let Some(event) = events.recv().await {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn stream_echoes_user_then_growing_content_then_done() {
        let h = harness(ScriptedProvider::new(&["Hel", "lo", "!"], Ending::Complete));
        let canvas = h.store.seed_canvas(None);

        let stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .unwrap();
        let assistant_id = stream.assistant_id;
        let events = drain(stream.events).await;
        let outcome = stream.handle.await.unwrap();

        assert_eq!(
            events.first(),
            Some(&ChatEvent::User {
                id: stream.user_message.id,
                content: "Hi".to_string()
            })
        );
        assert_eq!(events.last(), Some(&ChatEvent::Done));

        let lengths: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Assistant { id, content } => {
                    assert_eq!(*id, assistant_id);
                    Some(content.len())
                }
                _ => None,
            })
            .collect();
        assert_eq!(lengths, vec![3, 5, 6]);

        assert_eq!(outcome.state, TurnState::Completed);
        assert_eq!(h.store.count_role(MessageRole::User), 1);
        assert_eq!(h.store.count_role(MessageRole::Assistant), 1);

        let stored = outcome.assistant_message.unwrap();
        assert_eq!(stored.id, assistant_id);
        assert_eq!(stored.content, "Hello!");
        assert_eq!(stored.parent_id, Some(stream.user_message.id));
        assert_eq!(stored.metadata["model"], "default");
    }

    #[tokio::test]
    async fn completion_longer_than_last_partial_is_forwarded() {
        let provider = ScriptedProvider::new(&["Hel", "lo"], Ending::CompleteWithTail(" world".into()));
        let h = harness(provider);
        let canvas = h.store.seed_canvas(None);

        let stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .unwrap();
        let events = drain(stream.events).await;
        let outcome = stream.handle.await.unwrap();

        let assistant: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Assistant { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(assistant, vec!["Hel", "Hello", "Hello world"]);
        assert_eq!(events.last(), Some(&ChatEvent::Done));

        let stored = outcome.assistant_message.unwrap();
        assert_eq!(stored.content, "Hello world");
        assert_eq!(h.store.count_role(MessageRole::Assistant), 1);
    }

    #[tokio::test]
    async fn empty_completion_is_reported_and_not_persisted() {
        let provider = ScriptedProvider::new(&[], Ending::Complete);
        let h = harness(provider);
        let canvas = h.store.seed_canvas(None);

        let stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .unwrap();
        let events = drain(stream.events).await;
        let outcome = stream.handle.await.unwrap();

        // Empty completion is a failed turn, reported in-band.
        assert!(matches!(events[1], ChatEvent::Error { .. }));
        assert_eq!(events.last(), Some(&ChatEvent::Done));
        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(h.store.count_role(MessageRole::User), 1);
        assert_eq!(h.store.count_role(MessageRole::Assistant), 0);
    }

    #[tokio::test]
    async fn many_partials_persist_one_assistant_message() {
        let deltas: Vec<String> = (0..50).map(|i| format!("w{i} ")).collect();
        let refs: Vec<&str> = deltas.iter().map(String::as_str).collect();
        let h = harness(ScriptedProvider::new(&refs, Ending::Complete));
        let canvas = h.store.seed_canvas(None);

        let stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("count"), CancellationToken::new())
            .await
            .unwrap();
        let events = drain(stream.events).await;
        stream.handle.await.unwrap();

        let assistant_events = events
            .iter()
            .filter(|e| matches!(e, ChatEvent::Assistant { .. }))
            .count();
        assert_eq!(assistant_events, 50);
        assert_eq!(h.store.count_role(MessageRole::Assistant), 1);
    }

    #[tokio::test]
    async fn truncated_stream_reports_error_and_persists_nothing() {
        let h = harness(ScriptedProvider::new(
            &["par", "tial"],
            Ending::Truncate("connection reset".into()),
        ));
        let canvas = h.store.seed_canvas(None);

        let stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .unwrap();
        let events = drain(stream.events).await;
        let outcome = stream.handle.await.unwrap();

        let n = events.len();
        assert!(matches!(events[n - 2], ChatEvent::Error { .. }));
        assert_eq!(events[n - 1], ChatEvent::Done);
        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(h.store.count_role(MessageRole::Assistant), 0);
        assert_eq!(h.store.count_role(MessageRole::User), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_stream_and_persists_nothing() {
        let provider = ScriptedProvider::new(&["thinking"], Ending::Hang);
        let released = Arc::clone(&provider.released);
        let h = harness(provider);
        let canvas = h.store.seed_canvas(None);
        let cancel = CancellationToken::new();

        let mut stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), cancel.clone())
            .await
            .unwrap();

        assert!(matches!(stream.events.recv().await, Some(ChatEvent::User { .. })));
        assert!(matches!(stream.events.recv().await, Some(ChatEvent::Assistant { .. })));

        cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(5), stream.handle)
            .await
            .expect("pump should stop after cancellation")
            .unwrap();

        assert_eq!(outcome.state, TurnState::Failed);
        assert!(outcome.assistant_message.is_none());
        assert!(released.load(Ordering::SeqCst));
        assert!(stream.events.recv().await.is_none());
        assert_eq!(h.store.count_role(MessageRole::Assistant), 0);
    }

    #[tokio::test]
    async fn dropped_receiver_counts_as_cancellation() {
        let provider = ScriptedProvider::new(&["a"], Ending::Hang);
        let released = Arc::clone(&provider.released);
        let h = harness(provider);
        let canvas = h.store.seed_canvas(None);

        let stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .unwrap();
        drop(stream.events);

        let outcome = tokio::time::timeout(Duration::from_secs(5), stream.handle)
            .await
            .expect("pump should notice the closed channel")
            .unwrap();
        assert_eq!(outcome.state, TurnState::Failed);
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(h.store.count_role(MessageRole::Assistant), 0);
    }

    #[tokio::test]
    async fn assistant_persist_failure_still_completes_stream() {
        let h = harness(ScriptedProvider::new(&["ok"], Ending::Complete));
        h.store.fail_writes_for(MessageRole::Assistant);
        let canvas = h.store.seed_canvas(None);

        let stream = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .unwrap();
        let events = drain(stream.events).await;
        let outcome = stream.handle.await.unwrap();

        assert_eq!(events.last(), Some(&ChatEvent::Done));
        assert_eq!(outcome.state, TurnState::Completed);
        assert!(outcome.assistant_message.is_none());
        assert_eq!(h.store.count_role(MessageRole::Assistant), 0);
    }

    #[tokio::test]
    async fn user_persist_failure_is_fatal() {
        let provider = ScriptedProvider::new(&["never"], Ending::Complete);
        let opened = Arc::clone(&provider.opened);
        let h = harness(provider);
        h.store.fail_writes_for(MessageRole::User);
        let canvas = h.store.seed_canvas(None);

        let err = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::PersistFailed(_)));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
        assert!(h.store.messages().is_empty());
    }

    #[tokio::test]
    async fn parent_from_other_canvas_is_rejected() {
        let h = harness(ScriptedProvider::new(&["x"], Ending::Complete));
        let canvas = h.store.seed_canvas(None);
        let other = h.store.seed_canvas(None);
        let foreign = ChatMessage::new(other.id, None, MessageRole::User, "elsewhere", Uuid::now_v7());
        let foreign_id = foreign.id;
        h.store.seed_message(foreign);

        let request = SendMessageRequest {
            parent_id: Some(foreign_id),
            ..say("Hi")
        };
        let err = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, request)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_canvas_is_not_found() {
        let h = harness(ScriptedProvider::new(&["x"], Ending::Complete));
        let err = h
            .orchestrator
            .invoke(&h.identity, &Uuid::now_v7(), say("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::CanvasNotFound));
    }

    #[tokio::test]
    async fn canvas_of_another_tenant_is_not_found() {
        let h = harness(ScriptedProvider::new(&["x"], Ending::Complete));
        let foreign = h.store.seed_canvas_in(Uuid::now_v7(), None);

        let err = h
            .orchestrator
            .invoke(&h.identity, &foreign.id, say("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::CanvasNotFound));
        let err = h
            .orchestrator
            .stream(&h.identity, &foreign.id, say("Hi"), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::CanvasNotFound));
        assert!(h.store.messages().is_empty());
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_persisting() {
        let h = harness(ScriptedProvider::new(&["x"], Ending::Complete));
        let canvas = h.store.seed_canvas(None);
        let err = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert!(h.store.messages().is_empty());
    }

    #[tokio::test]
    async fn invoke_persists_user_and_assistant() {
        let h = harness(ScriptedProvider::new(&["Hello", " there"], Ending::Complete));
        let canvas = h.store.seed_canvas(None);

        let turn = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("Hi"))
            .await
            .unwrap();

        assert_eq!(turn.assistant_message.content, "Hello there");
        assert_eq!(turn.assistant_message.parent_id, Some(turn.user_message.id));
        assert_eq!(h.store.count_role(MessageRole::User), 1);
        assert_eq!(h.store.count_role(MessageRole::Assistant), 1);
    }

    #[tokio::test]
    async fn invoke_sends_history_then_current_turn() {
        let provider = ScriptedProvider::new(&["answer"], Ending::Complete);
        let received = Arc::clone(&provider.received);
        let h = harness(provider);
        let canvas = h.store.seed_canvas(None);

        let first = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("first question"))
            .await
            .unwrap();
        let follow_up = SendMessageRequest {
            parent_id: Some(first.assistant_message.id),
            ..say("second question")
        };
        h.orchestrator
            .invoke(&h.identity, &canvas.id, follow_up)
            .await
            .unwrap();

        let calls = received.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            vec![
                Message::user("first question"),
                Message::assistant("answer"),
                Message::user("second question"),
            ]
        );
    }

    #[tokio::test]
    async fn model_resolution_prefers_request_then_canvas_then_default() {
        let catalog = default_catalog()
            .with_model("canvas-model", "scripted", "scripted-1")
            .with_model("request-model", "scripted", "scripted-1");
        let h = harness_with(ScriptedProvider::new(&["ok"], Ending::Complete), catalog);

        let canvas = h.store.seed_canvas(Some("canvas-model"));
        let turn = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("Hi"))
            .await
            .unwrap();
        assert_eq!(turn.assistant_message.metadata["model"], "canvas-model");

        let request = SendMessageRequest {
            model_id: Some("request-model".to_string()),
            ..say("Hi again")
        };
        let turn = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, request)
            .await
            .unwrap();
        assert_eq!(turn.assistant_message.metadata["model"], "request-model");

        let plain = h.store.seed_canvas(None);
        let turn = h
            .orchestrator
            .invoke(&h.identity, &plain.id, say("Hi"))
            .await
            .unwrap();
        assert_eq!(turn.assistant_message.metadata["model"], "default");
    }

    #[tokio::test]
    async fn unknown_or_inactive_model_is_resolution_error() {
        let catalog = default_catalog();
        catalog.deactivate("default");
        let h = harness_with(ScriptedProvider::new(&["x"], Ending::Complete), catalog);
        let canvas = h.store.seed_canvas(Some("missing"));

        let err = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ModelResolution(_)));

        let plain = h.store.seed_canvas(None);
        let err = h
            .orchestrator
            .invoke(&h.identity, &plain.id, say("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ModelResolution(_)));
        // The user turns stay persisted; no assistant was written.
        assert_eq!(h.store.count_role(MessageRole::User), 2);
        assert_eq!(h.store.count_role(MessageRole::Assistant), 0);
    }

    #[tokio::test]
    async fn missing_api_key_is_resolution_error() {
        let catalog = InMemoryCatalog::default().with_model("default", "scripted", "scripted-1");
        let h = harness_with(ScriptedProvider::new(&["x"], Ending::Complete), catalog);
        let canvas = h.store.seed_canvas(None);
        let err = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ModelResolution(_)));
    }

    #[tokio::test]
    async fn catalog_failure_is_storage_error() {
        let h = harness_with(
            ScriptedProvider::new(&["x"], Ending::Complete),
            default_catalog().unavailable(),
        );
        let canvas = h.store.seed_canvas(None);
        let err = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Storage(_)));
    }

    #[tokio::test]
    async fn provider_open_failure_is_upstream_error() {
        let h = harness(ScriptedProvider::failing_to_open());
        let canvas = h.store.seed_canvas(None);
        let err = h
            .orchestrator
            .stream(&h.identity, &canvas.id, say("Hi"), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::Upstream(ProviderError::UpstreamCallFailed(_))));
    }

    #[tokio::test]
    async fn unsupported_vendor_model_is_upstream_error() {
        let catalog = default_catalog().with_model("odd", "scripted", "not-a-model");
        let h = harness_with(ScriptedProvider::new(&["x"], Ending::Complete), catalog);
        let canvas = h.store.seed_canvas(Some("odd"));
        let err = h
            .orchestrator
            .invoke(&h.identity, &canvas.id, say("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Upstream(ProviderError::ModelNotSupported(_))));
    }
}
