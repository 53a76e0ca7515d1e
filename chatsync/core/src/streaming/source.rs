//! Message Stream Source
//!
//! Turns one completion request into a sequence of full message-list
//! snapshots delivered on the engine's event channel. Each snapshot replaces
//! the live list wholesale: history, the new user message, and the assistant
//! message as far as it has grown.
//!
//! Nothing is sent until the backend has accepted the request, so a request
//! that fails up front leaves the conversation exactly as it was. The source
//! never retries.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::{CompletionError, CompletionRequest, CompletionService, StreamingToken};
use crate::conversation::ChatMessage;
use crate::events::SyncEvent;
use crate::messages::{ConversationId, MessageRole};

/// Identifies the stream session an update belongs to.
///
/// The epoch is bumped on every conversation switch; updates carrying an
/// older epoch are stale no matter which conversation they name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamTicket {
    /// Conversation the stream was started for
    pub conversation_id: ConversationId,
    /// Switch epoch at start time
    pub epoch: u64,
}

/// An update produced by a running stream
#[derive(Clone, Debug, PartialEq)]
pub enum SourceUpdate {
    /// Full replacement of the live message list
    Snapshot {
        /// Session tag
        ticket: StreamTicket,
        /// History, user message and the assistant message so far
        messages: Vec<ChatMessage>,
        /// True until the terminal token
        loading: bool,
    },
    /// The request failed before or during streaming
    Failed {
        /// Session tag
        ticket: StreamTicket,
        /// What went wrong
        error: CompletionError,
    },
}

impl SourceUpdate {
    /// The session this update belongs to
    #[must_use]
    pub fn ticket(&self) -> &StreamTicket {
        match self {
            Self::Snapshot { ticket, .. } | Self::Failed { ticket, .. } => ticket,
        }
    }
}

/// A request waiting to be started
#[derive(Clone, Debug)]
pub struct MessageStreamSource {
    ticket: StreamTicket,
    request: CompletionRequest,
    history: Vec<ChatMessage>,
}

impl MessageStreamSource {
    /// Prepare a stream for a conversation's history
    pub fn new(
        ticket: StreamTicket,
        model: impl Into<String>,
        history: Vec<ChatMessage>,
        system_prompt: Option<String>,
    ) -> Self {
        let mut request = CompletionRequest::new(model).with_history(&history);
        if let Some(system) = system_prompt {
            request = request.with_system(system);
        }
        Self {
            ticket,
            request,
            history,
        }
    }

    /// Set sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.request = self.request.with_temperature(temperature);
        self
    }

    /// The session tag updates will carry
    #[must_use]
    pub fn ticket(&self) -> &StreamTicket {
        &self.ticket
    }

    /// Send the user message and forward snapshots until the stream ends
    pub fn start<B>(
        self,
        backend: Arc<B>,
        user_message: ChatMessage,
        events_tx: mpsc::Sender<SyncEvent>,
    ) -> StreamHandle
    where
        B: CompletionService + ?Sized + 'static,
    {
        let ticket = self.ticket.clone();
        let task = tokio::spawn(async move {
            self.forward(backend.as_ref(), user_message, events_tx).await;
        });
        StreamHandle::from_parts(ticket, task)
    }

    async fn forward<B>(
        self,
        backend: &B,
        user_message: ChatMessage,
        events_tx: mpsc::Sender<SyncEvent>,
    ) where
        B: CompletionService + ?Sized,
    {
        let Self {
            ticket,
            request,
            history,
        } = self;
        let request = request.with_message(MessageRole::User, user_message.content.clone());

        let emit = |update: SourceUpdate| {
            let events_tx = events_tx.clone();
            async move { events_tx.send(SyncEvent::Stream(update)).await.is_ok() }
        };

        let mut rx = match backend.send_streaming(&request).await {
            Ok(rx) => rx,
            Err(error) => {
                tracing::debug!(conversation = %ticket.conversation_id, error = %error, "Completion request rejected");
                emit(SourceUpdate::Failed { ticket, error }).await;
                return;
            }
        };

        let mut messages = history;
        messages.push(user_message);
        let base_len = messages.len();

        let snapshot = |messages: &[ChatMessage], loading: bool| SourceUpdate::Snapshot {
            ticket: ticket.clone(),
            messages: messages.to_vec(),
            loading,
        };

        if !emit(snapshot(&messages, true)).await {
            return;
        }

        while let Some(token) = rx.recv().await {
            match token {
                StreamingToken::Token(text) => {
                    if messages.len() == base_len {
                        messages.push(ChatMessage::new(MessageRole::Assistant, text));
                    } else if let Some(reply) = messages.last_mut() {
                        reply.content.push_str(&text);
                    }
                    if !emit(snapshot(&messages, true)).await {
                        return;
                    }
                }
                StreamingToken::Complete { message } => {
                    if messages.len() == base_len && !message.is_empty() {
                        messages.push(ChatMessage::new(MessageRole::Assistant, message));
                    }
                    emit(snapshot(&messages, false)).await;
                    return;
                }
                StreamingToken::Error(error) => {
                    emit(SourceUpdate::Failed {
                        ticket: ticket.clone(),
                        error: CompletionError::Transport(error),
                    })
                    .await;
                    return;
                }
            }
        }

        // Backend dropped the channel without a terminal token
        emit(snapshot(&messages, false)).await;
    }
}

/// A running stream; cancelling or dropping it stops forwarding
#[derive(Debug)]
pub struct StreamHandle {
    ticket: StreamTicket,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub(crate) fn from_parts(ticket: StreamTicket, task: JoinHandle<()>) -> Self {
        Self { ticket, task }
    }

    /// Session tag of this stream
    #[must_use]
    pub fn ticket(&self) -> &StreamTicket {
        &self.ticket
    }

    /// Stop forwarding updates
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the forwarding task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Backend replaying a fixed script of tokens
    struct ScriptedBackend {
        tokens: Vec<StreamingToken>,
        reject: Option<CompletionError>,
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
            if let Some(ref error) = self.reject {
                return Err(error.clone());
            }
            let (tx, rx) = mpsc::channel(self.tokens.len().max(1));
            for token in &self.tokens {
                let _ = tx.send(token.clone()).await;
            }
            Ok(rx)
        }
    }

    fn ticket() -> StreamTicket {
        StreamTicket {
            conversation_id: ConversationId::from("conv"),
            epoch: 1,
        }
    }

    async fn collect(backend: ScriptedBackend) -> Vec<SourceUpdate> {
        let (tx, mut rx) = mpsc::channel(64);
        let source = MessageStreamSource::new(ticket(), "gpt-4o", Vec::new(), None);
        let _handle = source.start(Arc::new(backend), ChatMessage::user("Hello"), tx);

        let mut updates = Vec::new();
        while let Some(event) = rx.recv().await {
            if let SyncEvent::Stream(update) = event {
                updates.push(update);
            }
        }
        updates
    }

    #[tokio::test]
    async fn test_snapshots_grow_then_complete() {
        let updates = collect(ScriptedBackend {
            tokens: vec![
                StreamingToken::Token("Hello".into()),
                StreamingToken::Token(", how can I help?".into()),
                StreamingToken::Complete {
                    message: "Hello, how can I help?".into(),
                },
            ],
            reject: None,
        })
        .await;

        assert_eq!(updates.len(), 4);
        let SourceUpdate::Snapshot {
            messages, loading, ..
        } = &updates[0]
        else {
            panic!("expected snapshot");
        };
        assert!(*loading);
        assert_eq!(messages.len(), 1);

        let SourceUpdate::Snapshot {
            messages, loading, ..
        } = updates.last().unwrap()
        else {
            panic!("expected snapshot");
        };
        assert!(!*loading);
        assert_eq!(messages[1].content, "Hello, how can I help?");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(updates.iter().all(|u| u.ticket() == &ticket()));
    }

    #[tokio::test]
    async fn test_rejected_request_sends_no_snapshot() {
        let updates = collect(ScriptedBackend {
            tokens: Vec::new(),
            reject: Some(CompletionError::missing_credential(
                crate::registry::Provider::OpenAi,
            )),
        })
        .await;

        assert_eq!(updates.len(), 1);
        assert!(matches!(
            &updates[0],
            SourceUpdate::Failed {
                error: CompletionError::MissingCredential { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mid_stream_error() {
        let updates = collect(ScriptedBackend {
            tokens: vec![
                StreamingToken::Token("Partial".into()),
                StreamingToken::Error("connection reset".into()),
            ],
            reject: None,
        })
        .await;

        assert_eq!(updates.len(), 3);
        assert_eq!(
            updates[2],
            SourceUpdate::Failed {
                ticket: ticket(),
                error: CompletionError::Transport("connection reset".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_closed_channel_completes() {
        let updates = collect(ScriptedBackend {
            tokens: vec![StreamingToken::Token("Hi".into())],
            reject: None,
        })
        .await;

        assert!(matches!(
            updates.last(),
            Some(SourceUpdate::Snapshot { loading: false, .. })
        ));
    }
}
