mod common;

use std::time::Duration;

use common::ScriptedProvider;
use templar_conversation::{
    ConversationError, ConversationRegistry, HistoryScope, ResponderConfig, SenderLimits,
};
use templar_core::ChatMessage;

fn config() -> ResponderConfig {
    ResponderConfig::default().with_persona("P".to_string())
}

#[test]
fn registry_validates_persona() {
    let result = ConversationRegistry::new(
        ScriptedProvider::default(),
        ResponderConfig::default().with_persona(String::new()),
        HistoryScope::PerSender,
    );
    assert!(matches!(result, Err(ConversationError::InvalidPersona)));
}

#[tokio::test]
async fn shared_scope_mixes_all_senders() {
    let provider = ScriptedProvider::default();
    let registry = ConversationRegistry::new(provider.clone(), config(), HistoryScope::Shared)
        .unwrap();

    assert_eq!(registry.reply("alice", "Hello").await, "re:Hello");
    assert_eq!(registry.reply("bob", "Greetings").await, "re:Greetings");

    let turns = registry.responder_for("carol").await.snapshot().await;
    assert_eq!(
        turns,
        vec![
            ChatMessage::system("P"),
            ChatMessage::user("Hello"),
            ChatMessage::assistant("re:Hello"),
            ChatMessage::user("Greetings"),
            ChatMessage::assistant("re:Greetings"),
        ]
    );
    assert_eq!(registry.active_conversations().await, 1);
    assert_eq!(registry.scope(), HistoryScope::Shared);
}

#[tokio::test]
async fn per_sender_scope_isolates_histories() {
    let provider = ScriptedProvider::default();
    let registry = ConversationRegistry::new(provider.clone(), config(), HistoryScope::PerSender)
        .unwrap();

    registry.reply("alice", "Hello").await;
    registry.reply("bob", "Greetings").await;
    registry.reply("alice", "Again").await;

    let alice = registry.responder_for("alice").await.snapshot().await;
    let bob = registry.responder_for("bob").await.snapshot().await;

    assert_eq!(alice.len(), 5);
    assert_eq!(alice[3], ChatMessage::user("Again"));
    assert_eq!(
        bob,
        vec![
            ChatMessage::system("P"),
            ChatMessage::user("Greetings"),
            ChatMessage::assistant("re:Greetings"),
        ]
    );
    assert_eq!(registry.active_conversations().await, 2);
}

#[tokio::test]
async fn reset_only_touches_that_sender() {
    let provider = ScriptedProvider::default();
    let registry = ConversationRegistry::new(provider.clone(), config(), HistoryScope::PerSender)
        .unwrap();

    registry.reply("alice", "Hello").await;
    registry.reply("bob", "Greetings").await;
    registry.reset("alice").await;
    registry.reset("nobody").await;

    assert_eq!(registry.responder_for("alice").await.snapshot().await.len(), 1);
    assert_eq!(registry.responder_for("bob").await.snapshot().await.len(), 3);
}

#[tokio::test]
async fn idle_senders_are_evicted() {
    let registry = ConversationRegistry::new(
        ScriptedProvider::default(),
        config(),
        HistoryScope::PerSender,
    )
    .unwrap()
    .with_sender_limits(SenderLimits {
        max_senders: 0,
        idle_timeout: Duration::ZERO,
    });

    for i in 0..50 {
        registry.reply(&format!("sender-{i}"), "hi").await;
    }
    assert_eq!(registry.active_conversations().await, 50);

    assert_eq!(registry.evict_idle().await, 50);
    assert_eq!(registry.active_conversations().await, 0);
}

#[tokio::test]
async fn recently_active_senders_survive_eviction() {
    let registry = ConversationRegistry::new(
        ScriptedProvider::default(),
        config(),
        HistoryScope::PerSender,
    )
    .unwrap()
    .with_sender_limits(SenderLimits {
        max_senders: 0,
        idle_timeout: Duration::from_secs(3600),
    });

    registry.reply("alice", "Hello").await;
    registry.reply("bob", "Greetings").await;

    assert_eq!(registry.evict_idle().await, 0);
    assert_eq!(registry.active_conversations().await, 2);
    assert_eq!(registry.responder_for("alice").await.snapshot().await.len(), 3);
}

#[tokio::test]
async fn sender_cap_drops_least_recent_conversation() {
    let registry = ConversationRegistry::new(
        ScriptedProvider::default(),
        config(),
        HistoryScope::PerSender,
    )
    .unwrap()
    .with_sender_limits(SenderLimits {
        max_senders: 2,
        idle_timeout: Duration::from_secs(3600),
    });

    registry.reply("alice", "Hello").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    registry.reply("bob", "Greetings").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    registry.reply("carol", "Salve").await;

    assert_eq!(registry.active_conversations().await, 2);
    // Bob keeps his history; Alice starts over.
    assert_eq!(registry.responder_for("bob").await.snapshot().await.len(), 3);
    assert_eq!(registry.responder_for("alice").await.snapshot().await.len(), 1);
    assert_eq!(registry.active_conversations().await, 2);
}

#[tokio::test]
async fn shared_scope_has_nothing_to_evict() {
    let registry =
        ConversationRegistry::new(ScriptedProvider::default(), config(), HistoryScope::Shared)
            .unwrap()
            .with_sender_limits(SenderLimits {
                max_senders: 1,
                idle_timeout: Duration::ZERO,
            });

    registry.reply("alice", "Hello").await;
    registry.reply("bob", "Greetings").await;

    assert_eq!(registry.evict_idle().await, 0);
    assert_eq!(registry.active_conversations().await, 1);
}
