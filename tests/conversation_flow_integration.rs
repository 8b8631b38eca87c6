//! Integration tests for the conversation pipeline.
//!
//! These tests exercise the full application stack — session manager,
//! orchestrator, provider registry, retriever — through the public API,
//! with scripted mock backends standing in for the LLM providers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use sage_chat::adapters::ai::{MockBackend, MockResponse};
use sage_chat::adapters::storage::InMemorySessionStore;
use sage_chat::application::{
    ChatOrchestrator, ContextRetriever, DomainManager, KeywordScorer, OrchestratorConfig,
    PluginHost, ProviderRegistry, SessionChannels, SessionManager, StreamEvent,
};
use sage_chat::domain::foundation::{DomainId, ErrorCode, ProviderId, ResponseTypeId, SessionId};
use sage_chat::domain::provider::{ModelSpec, Provider};
use sage_chat::domain::session::{ConfigPatch, MessageStatus, SessionConfig};
use sage_chat::ports::GenerationError;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Stack {
    orchestrator: Arc<ChatOrchestrator>,
    sessions: Arc<SessionManager>,
    providers: Arc<ProviderRegistry>,
    channels: Arc<SessionChannels>,
    primary: Arc<MockBackend>,
    fallback: Arc<MockBackend>,
}

fn stack(primary: MockBackend, fallback: MockBackend) -> Stack {
    let primary = Arc::new(primary);
    let fallback = Arc::new(fallback);
    let providers = Arc::new(
        ProviderRegistry::new()
            .with_provider(
                Provider::new(
                    ProviderId::new("openai").unwrap(),
                    "OpenAI",
                    vec![
                        ModelSpec::new("gpt-4", 4000),
                        ModelSpec::new("gpt-3.5-turbo", 4000),
                    ],
                    "usage-based",
                ),
                primary.clone(),
            )
            .with_provider(
                Provider::new(
                    ProviderId::new("anthropic").unwrap(),
                    "Anthropic",
                    vec![ModelSpec::new("claude-3", 8000)],
                    "usage-based",
                ),
                fallback.clone(),
            ),
    );
    let domains = Arc::new(DomainManager::with_default_limits());
    let sessions = Arc::new(SessionManager::new(
        Arc::new(InMemorySessionStore::new()),
        providers.clone(),
        domains.clone(),
    ));
    let retriever = Arc::new(ContextRetriever::new(domains, Arc::new(KeywordScorer)));
    let channels = Arc::new(SessionChannels::new());
    let orchestrator = Arc::new(ChatOrchestrator::new(
        sessions.clone(),
        retriever,
        Arc::new(PluginHost::new()),
        providers.clone(),
        channels.clone(),
        OrchestratorConfig::default(),
    ));
    Stack {
        orchestrator,
        sessions,
        providers,
        channels,
        primary,
        fallback,
    }
}

fn session_config() -> SessionConfig {
    SessionConfig::new(
        DomainId::new("biblical").unwrap(),
        ResponseTypeId::new("conversation").unwrap(),
        ProviderId::new("openai").unwrap(),
        "gpt-4",
    )
}

async fn run_turn(stack: &Stack, session_id: &SessionId, text: &str) -> Vec<StreamEvent> {
    let prepared = stack.orchestrator.begin(session_id, text).await.unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    stack.orchestrator.run(prepared, tx).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

// =============================================================================
// Streaming and event fan-out
// =============================================================================

#[tokio::test]
async fn test_turn_streams_chunks_and_mirrors_to_websocket_channel() {
    let stack = stack(
        MockBackend::new().with_response(MockResponse::success(["Be still ", "and know."])),
        MockBackend::new(),
    );
    let session = stack.sessions.create_session(session_config()).await.unwrap();
    let mut ws = stack.channels.subscribe(session.id()).await;

    let events = run_turn(&stack, session.id(), "A verse about stillness").await;

    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], StreamEvent::Chunk { seq: 0, .. }));
    assert!(matches!(events[1], StreamEvent::Chunk { seq: 1, .. }));
    match &events[2] {
        StreamEvent::Done { content, .. } => assert_eq!(content, "Be still and know."),
        other => panic!("expected Done, got {:?}", other),
    }

    // The WebSocket channel sees the same event sequence.
    for expected in &events {
        let mirrored = ws.recv().await.unwrap();
        assert_eq!(mirrored.message_id(), expected.message_id());
    }

    // Transcript: user message plus a completed assistant message, both
    // stamped with the config they were generated under.
    let history = stack.sessions.get_history(session.id(), 10, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content(), "A verse about stillness");
    assert_eq!(history[1].status(), MessageStatus::Complete);
    assert_eq!(history[1].domain_id().as_str(), "biblical");
    assert_eq!(history[1].response_type_id().as_str(), "conversation");
}

#[tokio::test]
async fn test_second_turn_while_busy_is_rejected() {
    let stack = stack(MockBackend::new(), MockBackend::new());
    let session = stack.sessions.create_session(session_config()).await.unwrap();

    let prepared = stack.orchestrator.begin(session.id(), "first").await.unwrap();

    let err = stack.orchestrator.begin(session.id(), "second").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::SessionBusy);

    // Finishing the first turn frees the slot.
    let (tx, _rx) = mpsc::channel(64);
    stack.orchestrator.run(prepared, tx).await;
    assert!(stack.orchestrator.begin(session.id(), "third").await.is_ok());
}

#[tokio::test]
async fn test_cancellation_retains_partial_content_and_frees_slot() {
    let stack = stack(
        MockBackend::new()
            .with_response(MockResponse::success(["one ", "two ", "three ", "four ", "five"]))
            .with_delay(Duration::from_millis(30)),
        MockBackend::new(),
    );
    let session = stack.sessions.create_session(session_config()).await.unwrap();
    let session_id = *session.id();

    let prepared = stack.orchestrator.begin(&session_id, "count slowly").await.unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    let orchestrator = stack.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.run(prepared, tx).await });

    tokio::time::sleep(Duration::from_millis(80)).await;
    stack.orchestrator.cancel(&session_id).await.unwrap();
    run.await.unwrap();

    let mut terminal = None;
    while let Some(event) = rx.recv().await {
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    match terminal.expect("no terminal event") {
        StreamEvent::Error { code, partial_content, .. } => {
            assert_eq!(code, "CANCELLED");
            assert!(partial_content.is_some());
        }
        other => panic!("expected Error, got {:?}", other),
    }

    let history = stack.sessions.get_history(&session_id, 10, None).await.unwrap();
    let assistant = history.last().unwrap();
    assert_eq!(assistant.status(), MessageStatus::Failed);
    assert!(!assistant.content().is_empty());

    // The slot is free again.
    assert!(!stack.sessions.is_busy(&session_id));
    assert!(stack.orchestrator.begin(&session_id, "again").await.is_ok());
}

// =============================================================================
// Failover and provider health
// =============================================================================

#[tokio::test]
async fn test_failover_demotes_primary_and_completes_on_default() {
    let stack = stack(
        MockBackend::new()
            .with_response(MockResponse::error(GenerationError::unavailable("down")))
            .with_response(MockResponse::error(GenerationError::unavailable("down"))),
        MockBackend::new().with_response(MockResponse::success(["fallback answer"])),
    );
    stack
        .providers
        .set_default(&ProviderId::new("anthropic").unwrap())
        .await
        .unwrap();
    let session = stack.sessions.create_session(session_config()).await.unwrap();

    let events = run_turn(&stack, session.id(), "anything").await;

    match events.last().unwrap() {
        StreamEvent::Done { content, .. } => assert_eq!(content, "fallback answer"),
        other => panic!("expected Done, got {:?}", other),
    }

    // Two attempts on the session provider, then one on the default,
    // carried over to a model the fallback actually offers.
    assert_eq!(stack.primary.call_count(), 2);
    assert_eq!(stack.fallback.call_count(), 1);
    assert_eq!(stack.fallback.calls()[0].model, "claude-3");

    let openai = stack.providers.get(&ProviderId::new("openai").unwrap()).await.unwrap();
    assert!(!openai.status().is_connected());
    let anthropic = stack.providers.get(&ProviderId::new("anthropic").unwrap()).await.unwrap();
    assert!(anthropic.status().is_connected());
}

// =============================================================================
// Config updates between turns
// =============================================================================

#[tokio::test]
async fn test_config_update_applies_to_next_turn_only() {
    let stack = stack(
        MockBackend::new().with_response(MockResponse::success(["from openai"])),
        MockBackend::new().with_response(MockResponse::success(["from anthropic"])),
    );
    let session = stack.sessions.create_session(session_config()).await.unwrap();

    run_turn(&stack, session.id(), "first turn").await;
    assert_eq!(stack.primary.call_count(), 1);

    let patch = ConfigPatch {
        provider_id: Some(ProviderId::new("anthropic").unwrap()),
        model: Some("claude-3".to_string()),
        ..Default::default()
    };
    let update = stack.sessions.update_config(session.id(), patch).await.unwrap();
    assert!(update.rejected.is_empty());

    run_turn(&stack, session.id(), "second turn").await;
    assert_eq!(stack.primary.call_count(), 1);
    assert_eq!(stack.fallback.call_count(), 1);
    assert_eq!(stack.fallback.calls()[0].model, "claude-3");
}

#[tokio::test]
async fn test_rejected_config_fields_leave_valid_fields_committed() {
    let stack = stack(MockBackend::new(), MockBackend::new());
    let session = stack.sessions.create_session(session_config()).await.unwrap();

    let patch = ConfigPatch {
        domain_id: Some(DomainId::new("atlantean").unwrap()),
        temperature: Some(0.2),
        ..Default::default()
    };
    let update = stack.sessions.update_config(session.id(), patch).await.unwrap();

    assert_eq!(update.rejected.len(), 1);
    assert_eq!(update.rejected[0].field, "domain_id");
    assert_eq!(update.config.domain_id.as_str(), "biblical");
    assert!((update.config.params.temperature - 0.2).abs() < f32::EPSILON);
}
