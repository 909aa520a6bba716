//! End-to-end conductor flows against a scripted backend
//!
//! The test holds the sending half of every reply channel, so it decides
//! exactly when each chunk arrives relative to mode switches.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use comex_conductor::backend::{SessionConfig, SourceReference};
use comex_conductor::{
    ChatBackend, ChatSessionHandle, Conductor, ConductorConfig, ConductorError, ConductorMessage,
    MessageStatus, ModeId, ProviderChunk, ProviderEvent, Sender, SurfaceEvent, STREAM_ERROR_TEXT,
};

#[derive(Default)]
struct Script {
    /// One sender per `send_stream` call, oldest first
    replies: Vec<mpsc::Sender<ProviderEvent>>,
    /// Configs of every created session
    sessions: Vec<SessionConfig>,
    /// Make `send_stream` fail before any reply starts
    fail_send: bool,
}

#[derive(Clone, Default)]
struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    fn reply(&self, n: usize) -> mpsc::Sender<ProviderEvent> {
        self.script.lock().replies[n].clone()
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
    turns: usize,
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn create_session(
        &self,
        config: SessionConfig,
    ) -> anyhow::Result<Box<dyn ChatSessionHandle>> {
        self.script.lock().sessions.push(config);
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            turns: 0,
        }))
    }
}

#[async_trait]
impl ChatSessionHandle for ScriptedSession {
    async fn send_stream(&mut self, _text: &str) -> anyhow::Result<mpsc::Receiver<ProviderEvent>> {
        let mut script = self.script.lock();
        if script.fail_send {
            anyhow::bail!("connection refused");
        }
        let (tx, rx) = mpsc::channel(16);
        script.replies.push(tx);
        self.turns += 2;
        Ok(rx)
    }

    fn history_len(&self) -> usize {
        self.turns
    }
}

fn setup() -> (ScriptedBackend, Conductor<ScriptedBackend>) {
    let backend = ScriptedBackend::default();
    let conductor = Conductor::with_backend(Arc::new(backend.clone()), ConductorConfig::default());
    (backend, conductor)
}

fn text(t: &str) -> ProviderEvent {
    ProviderEvent::Chunk(ProviderChunk::text(t))
}

#[tokio::test]
async fn test_mode_switch_starts_empty_history() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::General).await.unwrap();
    conductor.submit("Olá").await.unwrap();
    let tx = backend.reply(0);
    tx.send(text("Oi!")).await.unwrap();
    drop(tx);
    backend.script.lock().replies.clear();
    conductor.drive().await.unwrap();
    assert_eq!(conductor.session().unwrap().history_len(), 2);

    conductor.start_session(ModeId::Ncm).await.unwrap();
    assert_eq!(conductor.session().unwrap().history_len(), 0);
    assert_eq!(conductor.mode(), Some(ModeId::Ncm));

    let script = backend.script.lock();
    assert_eq!(script.sessions.len(), 2);
    assert!(script.sessions[1].system_instruction.contains("NCM"));
}

#[tokio::test]
async fn test_reply_text_is_concatenation_of_deltas() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::General).await.unwrap();
    let id = conductor.submit("Qual a NCM para smartphones?").await.unwrap();

    {
        let tx = backend.reply(0);
        for part in ["A NCM ", "", "é ", "8517.13.00."] {
            tx.send(text(part)).await.unwrap();
        }
    }
    backend.script.lock().replies.clear();
    conductor.drive().await.unwrap();

    let reply = conductor.store().get(&id).unwrap();
    assert_eq!(reply.text, "A NCM é 8517.13.00.");
    assert_eq!(reply.status, MessageStatus::Complete);
    assert!(!reply.is_error);
    assert!(!conductor.is_loading());
}

#[tokio::test]
async fn test_grounding_kept_in_arrival_order() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::Legal).await.unwrap();
    let id = conductor.submit("Qual a alíquota do II?").await.unwrap();

    {
        let tx = backend.reply(0);
        tx.send(ProviderEvent::Chunk(
            ProviderChunk::text("Segundo a TEC, 16%.").with_grounding(vec![
                SourceReference::web("https://a.example/tec", Some("TEC")),
                SourceReference::other("gs://bucket/doc", Some("Interno")),
            ]),
        ))
        .await
        .unwrap();
        tx.send(ProviderEvent::Chunk(ProviderChunk::grounding(vec![
            SourceReference::web("https://b.example/lei", None),
            SourceReference::web("https://a.example/tec", Some("TEC")),
        ])))
        .await
        .unwrap();
    }
    backend.script.lock().replies.clear();
    conductor.drive().await.unwrap();

    let reply = conductor.store().get(&id).unwrap();
    assert_eq!(reply.text, "Segundo a TEC, 16%.");
    let uris: Vec<&str> = reply.grounding.iter().map(|g| g.uri.as_str()).collect();
    assert_eq!(
        uris,
        vec![
            "https://a.example/tec",
            "https://b.example/lei",
            "https://a.example/tec"
        ]
    );
    assert_eq!(reply.grounding[1].display_title(), "b.example");
}

#[tokio::test]
async fn test_stale_generation_event_is_dropped() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::General).await.unwrap();
    let mut stream = conductor.send("pergunta antiga").await.unwrap();
    backend.reply(0).send(text("resposta atrasada")).await.unwrap();

    conductor.start_session(ModeId::Docs).await.unwrap();
    let welcome = conductor.store().last().unwrap().clone();

    let late = stream.next().await.unwrap();
    assert_ne!(late.generation, conductor.generation());
    assert_eq!(conductor.apply(&welcome.id, late), Ok(false));
    assert_eq!(conductor.store().last().unwrap(), &welcome);
}

#[tokio::test]
async fn test_happy_path_notifications() {
    let (backend, mut conductor) = setup();
    let mut updates = conductor.subscribe();
    conductor.start_session(ModeId::General).await.unwrap();
    let id = conductor.submit("Olá").await.unwrap();

    backend.reply(0).send(text("Olá! ")).await.unwrap();
    backend.reply(0).send(text("Como posso ajudar?")).await.unwrap();
    backend.script.lock().replies.clear();
    conductor.drive().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(update) = updates.try_recv() {
        seen.push(update);
    }

    assert!(matches!(seen[0], ConductorMessage::ModeChanged { mode: ModeId::General, .. }));
    let deltas: String = seen
        .iter()
        .filter_map(|m| match m {
            ConductorMessage::TextDelta { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, "Olá! Como posso ajudar?");
    assert!(seen
        .iter()
        .any(|m| matches!(m, ConductorMessage::StreamEnd { message_id } if *message_id == id)));
    assert!(matches!(
        seen.last(),
        Some(ConductorMessage::Loading { loading: false })
    ));

    let senders: Vec<Sender> = conductor.messages().iter().map(|m| m.sender).collect();
    assert_eq!(senders, vec![Sender::Bot, Sender::User, Sender::Bot]);
}

#[tokio::test]
async fn test_mid_stream_failure_replaces_partial_text() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::Docs).await.unwrap();
    let id = conductor.submit("Gere uma packing list").await.unwrap();

    {
        let tx = backend.reply(0);
        tx.send(text("Packing list:\n")).await.unwrap();
        tx.send(ProviderEvent::Failed("stream reset".to_string()))
            .await
            .unwrap();
        // Ignored: the stream already failed
        let _ = tx.send(text("tarde demais")).await;
    }
    backend.script.lock().replies.clear();
    conductor.drive().await.unwrap();

    let reply = conductor.store().get(&id).unwrap();
    assert_eq!(reply.text, STREAM_ERROR_TEXT);
    assert!(reply.is_error);
    assert_eq!(reply.status, MessageStatus::Errored);
    assert!(!conductor.is_loading());

    // The conductor accepts the next message
    conductor.submit("Tente de novo").await.unwrap();
}

#[tokio::test]
async fn test_provider_error_before_stream_marks_placeholder() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::General).await.unwrap();
    backend.script.lock().fail_send = true;

    let id = conductor.submit("Olá").await.unwrap();
    conductor.drive().await.unwrap();

    let reply = conductor.store().get(&id).unwrap();
    assert_eq!(reply.text, STREAM_ERROR_TEXT);
    assert!(reply.is_error);
    assert!(!conductor.is_loading());
    assert_eq!(conductor.session().unwrap().history_len(), 0);
}

#[tokio::test]
async fn test_switch_during_streaming_freezes_placeholder() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::General).await.unwrap();
    let id = conductor.submit("Explique o drawback").await.unwrap();

    let tx = backend.reply(0);
    tx.send(text("O drawback é ")).await.unwrap();
    assert!(conductor.step().await.unwrap());

    conductor
        .handle_event(SurfaceEvent::ModeSelected {
            mode: ModeId::Legal,
        })
        .await
        .unwrap();
    assert!(!conductor.is_streaming());
    assert!(!conductor.is_loading());

    // The abandoned stream was dropped with its receiver
    assert!(tx.send(text("um regime aduaneiro")).await.is_err());

    let frozen = conductor.store().get(&id).unwrap();
    assert_eq!(frozen.text, "O drawback é ");
    assert_eq!(frozen.status, MessageStatus::Streaming);

    let last = conductor.store().last().unwrap();
    assert_eq!(last.sender, Sender::Bot);
    assert!(last.text.contains("Jurídico"));
    assert_eq!(conductor.suggestions().len(), 4);
}

#[tokio::test]
async fn test_empty_input_rejected_without_side_effects() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::General).await.unwrap();
    let before = conductor.messages().to_vec();

    assert!(matches!(
        conductor.submit("  \n\t ").await,
        Err(ConductorError::EmptyInput)
    ));
    assert!(matches!(
        conductor.send("").await,
        Err(ConductorError::EmptyInput)
    ));

    assert_eq!(conductor.messages(), before.as_slice());
    assert!(!conductor.is_loading());
    assert!(backend.script.lock().replies.is_empty());
}

#[tokio::test]
async fn test_poll_streaming_applies_ready_items() {
    let (backend, mut conductor) = setup();
    conductor.start_session(ModeId::Ncm).await.unwrap();
    let id = conductor.submit("NCM de café torrado?").await.unwrap();
    assert!(!conductor.poll_streaming());

    backend.reply(0).send(text("0901.21.00")).await.unwrap();
    assert!(conductor.poll_streaming());
    assert!(conductor.is_streaming());
    assert_eq!(conductor.store().get(&id).unwrap().text, "0901.21.00");

    backend.script.lock().replies.clear();
    conductor.poll_streaming();
    assert!(!conductor.is_streaming());
    assert_eq!(
        conductor.store().get(&id).unwrap().status,
        MessageStatus::Complete
    );
}
