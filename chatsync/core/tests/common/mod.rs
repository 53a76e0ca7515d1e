//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use chatsync_core::{
    CompletionError, CompletionRequest, CompletionService, ConversationStore, ModelRegistry,
    StreamingToken, SyncConfig, SyncEngine, SyncMessage,
};

/// Backend replaying a fixed reply, optionally with a pause before each token
pub struct ScriptedBackend {
    tokens: Vec<String>,
    delay: Duration,
    reject: Option<CompletionError>,
    fail_after_tokens: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn reply(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(ToString::to_string).collect(),
            delay: Duration::ZERO,
            reject: None,
            fail_after_tokens: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Send the tokens, then a stream error instead of completing
    pub fn failing_after(tokens: &[&str], error: &str) -> Self {
        Self {
            fail_after_tokens: Some(error.to_string()),
            ..Self::reply(tokens)
        }
    }

    pub fn rejecting(error: CompletionError) -> Self {
        Self {
            reject: Some(error),
            ..Self::reply(&[])
        }
    }

    /// Counter of `send_streaming` calls, readable after the backend moves
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CompletionService for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn send_streaming(
        &self,
        _request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref error) = self.reject {
            return Err(error.clone());
        }

        let (tx, rx) = mpsc::channel(16);
        let tokens = self.tokens.clone();
        let delay = self.delay;
        let failure = self.fail_after_tokens.clone();
        tokio::spawn(async move {
            for token in &tokens {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(StreamingToken::Token(token.clone())).await.is_err() {
                    return;
                }
            }
            let last = match failure {
                Some(error) => StreamingToken::Error(error),
                None => StreamingToken::Complete {
                    message: tokens.concat(),
                },
            };
            let _ = tx.send(last).await;
        });
        Ok(rx)
    }
}

pub fn config(coalesce_ms: u64) -> SyncConfig {
    SyncConfig {
        coalesce_window: Duration::from_millis(coalesce_ms),
        ..SyncConfig::default()
    }
}

pub fn engine<S: ConversationStore>(
    backend: ScriptedBackend,
    store: S,
    config: SyncConfig,
) -> (SyncEngine<ScriptedBackend, S>, mpsc::Receiver<SyncMessage>) {
    let (tx, rx) = mpsc::channel(1024);
    let engine = SyncEngine::new(backend, store, ModelRegistry::builtin(), config, tx);
    (engine, rx)
}

/// Step the engine until the response in flight has settled
pub async fn settle<S: ConversationStore>(engine: &mut SyncEngine<ScriptedBackend, S>) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while engine.state().is_loading() {
            assert!(engine.step().await.expect("step"));
        }
    })
    .await
    .expect("response settled");
}

/// Step the engine until nothing happens for a while
pub async fn idle<S: ConversationStore>(engine: &mut SyncEngine<ScriptedBackend, S>) {
    while let Ok(more) = tokio::time::timeout(Duration::from_millis(500), engine.step()).await {
        assert!(more.expect("step"));
    }
}

/// Content of the reply in the live list and in the store
pub fn reply_lengths<S: ConversationStore>(
    engine: &SyncEngine<ScriptedBackend, S>,
    id: &chatsync_core::ConversationId,
) -> (usize, usize) {
    let live = engine.live_messages().get(1).map_or(0, |m| m.content.len());
    let stored = engine
        .store()
        .get(id)
        .expect("store read")
        .and_then(|c| c.messages.get(1).map(|m| m.content.len()))
        .unwrap_or(0);
    (live, stored)
}

/// Step until the live reply is ahead of what the store holds
pub async fn step_until_pending<S: ConversationStore>(
    engine: &mut SyncEngine<ScriptedBackend, S>,
    id: &chatsync_core::ConversationId,
) {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let (live, stored) = reply_lengths(engine, id);
            if live > stored {
                break;
            }
            assert!(engine.step().await.expect("step"));
        }
    })
    .await
    .expect("reply got ahead of the store");
}

pub fn drain(rx: &mut mpsc::Receiver<SyncMessage>) -> Vec<SyncMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Every committed conversation, in order
pub fn commits(msgs: &[SyncMessage]) -> Vec<chatsync_core::Conversation> {
    msgs.iter()
        .filter_map(|m| match m {
            SyncMessage::ConversationCommitted { conversation } => Some(conversation.clone()),
            _ => None,
        })
        .collect()
}
