//! Conversation switching while a response streams

mod common;

use std::time::Duration;

use chatsync_core::{ConversationStore, MemoryStore, SyncEvent, SyncMessage, SyncState};
use pretty_assertions::assert_eq;

use common::{config, drain, engine, idle, ScriptedBackend};

#[tokio::test(start_paused = true)]
async fn switching_away_and_back_discards_late_updates() {
    let backend = ScriptedBackend::reply(&["late", " reply"]).with_delay(Duration::from_millis(100));
    let (mut engine, mut rx) = engine(backend, MemoryStore::new(), config(50));
    engine.start().await.unwrap();
    let a = engine.active_conversation().cloned().unwrap();

    engine.handle_event(SyncEvent::NewConversation).await.unwrap();
    let b = engine.active_conversation().cloned().unwrap();
    assert_ne!(a, b);

    engine
        .handle_event(SyncEvent::SelectConversation { id: a.clone() })
        .await
        .unwrap();
    drain(&mut rx);

    engine
        .handle_event(SyncEvent::UserMessage {
            content: "Tell me a story".into(),
        })
        .await
        .unwrap();
    assert_eq!(engine.state(), SyncState::Submitting);

    engine
        .handle_event(SyncEvent::SelectConversation { id: b.clone() })
        .await
        .unwrap();
    engine
        .handle_event(SyncEvent::SelectConversation { id: a.clone() })
        .await
        .unwrap();
    idle(&mut engine).await;

    assert_eq!(engine.active_conversation(), Some(&a));
    assert_eq!(engine.state(), SyncState::Ready);
    assert!(engine.live_messages().is_empty());

    let stored_a = engine.store().get(&a).unwrap().unwrap();
    assert!(stored_a.messages.is_empty());
    assert!(!stored_a.is_streaming);
    assert!(engine.store().get(&b).unwrap().unwrap().messages.is_empty());

    let msgs = drain(&mut rx);
    assert!(msgs.iter().any(|m| matches!(
        m,
        SyncMessage::RestoreInput { content } if content == "Tell me a story"
    )));
    assert!(!msgs
        .iter()
        .any(|m| matches!(m, SyncMessage::ConversationCommitted { .. })));
}

#[tokio::test(start_paused = true)]
async fn other_conversations_late_stream_never_reaches_active_one() {
    let backend = ScriptedBackend::reply(&["late", " reply"]).with_delay(Duration::from_millis(100));
    let (mut engine, mut rx) = engine(backend, MemoryStore::new(), config(50));
    engine.start().await.unwrap();
    let a = engine.active_conversation().cloned().unwrap();
    engine.handle_event(SyncEvent::NewConversation).await.unwrap();
    let b = engine.active_conversation().cloned().unwrap();
    drain(&mut rx);

    engine
        .handle_event(SyncEvent::UserMessage {
            content: "Reply on B".into(),
        })
        .await
        .unwrap();
    for id in [&a, &b, &a] {
        engine
            .handle_event(SyncEvent::SelectConversation { id: id.clone() })
            .await
            .unwrap();
    }
    idle(&mut engine).await;

    assert_eq!(engine.active_conversation(), Some(&a));
    assert_eq!(engine.state(), SyncState::Ready);
    assert!(engine.live_messages().is_empty());
    assert!(engine.store().get(&a).unwrap().unwrap().messages.is_empty());
    assert!(!drain(&mut rx).iter().any(|m| matches!(
        m,
        SyncMessage::ConversationCommitted { conversation } if conversation.id == a
    )));
}

#[tokio::test(start_paused = true)]
async fn switching_mid_stream_keeps_partial_reply() {
    let backend = ScriptedBackend::reply(&["first", " second", " third"])
        .with_delay(Duration::from_millis(100));
    let (mut engine, mut rx) = engine(backend, MemoryStore::new(), config(50));
    engine.start().await.unwrap();
    let a = engine.active_conversation().cloned().unwrap();
    engine.handle_event(SyncEvent::NewConversation).await.unwrap();
    let b = engine.active_conversation().cloned().unwrap();
    engine
        .handle_event(SyncEvent::SelectConversation { id: a.clone() })
        .await
        .unwrap();

    engine
        .handle_event(SyncEvent::UserMessage {
            content: "Go".into(),
        })
        .await
        .unwrap();
    while engine.state() != SyncState::Streaming {
        assert!(engine.step().await.unwrap());
    }
    drain(&mut rx);

    engine
        .handle_event(SyncEvent::SelectConversation { id: b.clone() })
        .await
        .unwrap();
    idle(&mut engine).await;

    let stored_a = engine.store().get(&a).unwrap().unwrap();
    assert_eq!(stored_a.messages.len(), 2);
    assert_eq!(stored_a.messages[1].content, "first");
    assert!(!stored_a.is_streaming);
    assert_eq!(stored_a.title, "Go");

    assert_eq!(engine.active_conversation(), Some(&b));
    assert!(engine.live_messages().is_empty());
    assert!(!drain(&mut rx)
        .iter()
        .any(|m| matches!(m, SyncMessage::RestoreInput { .. })));
}

#[tokio::test]
async fn reselecting_active_conversation_is_a_no_op() {
    let (mut engine, mut rx) = engine(ScriptedBackend::reply(&[]), MemoryStore::new(), config(50));
    engine.start().await.unwrap();
    let a = engine.active_conversation().cloned().unwrap();
    drain(&mut rx);

    engine
        .handle_event(SyncEvent::SelectConversation { id: a })
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());
}
