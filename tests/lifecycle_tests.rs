//! State-machine tests for the conversation lifecycle: create, append,
//! soft delete, revival, fork, and mutual-deletion removal.

use dm_service::error::AppError;
use dm_service::models::MessageKind;
use dm_service::services::{ChatService, NewMessage, StaticUserDirectory};
use dm_service::store::ConversationStore;
use dm_service::websocket::ChannelBroker;
use std::sync::Arc;
use uuid::Uuid;

fn service() -> Arc<ChatService> {
    Arc::new(ChatService::new(
        ConversationStore::new(),
        ChannelBroker::new(),
        Arc::new(StaticUserDirectory::new(["alice", "bob", "carol"])),
    ))
}

fn message(sender: &str, text: &str) -> NewMessage {
    NewMessage {
        sender: sender.to_string(),
        text: text.to_string(),
        msg_date_time: None,
        kind: MessageKind::Direct,
    }
}

async fn two_party_chat(chats: &ChatService) -> Uuid {
    chats
        .create_chat(
            vec!["alice".into(), "bob".into()],
            vec![message("alice", "m1")],
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn create_requires_two_distinct_known_participants() {
    let chats = service();

    let err = chats.create_chat(vec!["alice".into()], vec![]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = chats
        .create_chat(vec!["alice".into(), "alice".into()], vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = chats
        .create_chat(vec!["alice".into(), "mallory".into()], vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn unknown_sender_aborts_before_any_mutation() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;

    let err = chats
        .add_message(chat_id, message("mallory", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let convo = chats.get_chat(chat_id).await.unwrap();
    assert_eq!(convo.messages.len(), 1);
}

#[tokio::test]
async fn known_outsider_cannot_send_into_or_revive_a_chat() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;
    chats.delete_for_user(chat_id, "alice").await.unwrap();

    // Carol exists in the directory but is not a participant: her send is
    // rejected and must not clear alice's deletion marker.
    let err = chats
        .add_message(chat_id, message("carol", "intruding"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let convo = chats.get_chat(chat_id).await.unwrap();
    assert_eq!(convo.messages.len(), 1);
    assert_eq!(convo.deleted_usernames(), vec!["alice"]);
}

#[tokio::test]
async fn messages_keep_append_order() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;

    chats.add_message(chat_id, message("bob", "m2")).await.unwrap();
    chats.add_message(chat_id, message("alice", "m3")).await.unwrap();

    let convo = chats.get_chat(chat_id).await.unwrap();
    let texts: Vec<&str> = convo.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn soft_delete_is_idempotent() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;

    let first = chats.delete_for_user(chat_id, "alice").await.unwrap();
    let second = chats.delete_for_user(chat_id, "alice").await.unwrap();

    assert!(!first.deleted_completely);
    assert_eq!(first.deleted_by, second.deleted_by);
    assert_eq!(second.deleted_by, vec!["alice"]);
}

#[tokio::test]
async fn deletion_markers_never_exceed_participants() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;

    chats.delete_for_user(chat_id, "alice").await.unwrap();
    chats.delete_for_user(chat_id, "alice").await.unwrap();

    let convo = chats.get_chat(chat_id).await.unwrap();
    assert!(convo.deleted_by.len() <= convo.participants.len());

    // A non-participant cannot place a marker at all.
    let err = chats.delete_for_user(chat_id, "carol").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn revival_clears_markers_and_preserves_history() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;
    chats.delete_for_user(chat_id, "alice").await.unwrap();

    let convo = chats.add_message(chat_id, message("bob", "m2")).await.unwrap();

    assert_eq!(convo.id, chat_id);
    assert!(convo.deleted_by.is_empty());
    let texts: Vec<&str> = convo.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["m1", "m2"]);
}

#[tokio::test]
async fn fork_leaves_original_untouched() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;
    chats.delete_for_user(chat_id, "alice").await.unwrap();

    let fork = chats.add_message(chat_id, message("alice", "m2")).await.unwrap();

    assert_ne!(fork.id, chat_id);
    assert_eq!(fork.participants, vec!["alice", "bob"]);
    assert_eq!(fork.messages.len(), 1);
    assert_eq!(fork.messages[0].text, "m2");
    assert!(fork.deleted_by.is_empty());

    let original = chats.get_chat(chat_id).await.unwrap();
    assert_eq!(original.messages.len(), 1);
    assert_eq!(original.deleted_usernames(), vec!["alice"]);
}

#[tokio::test]
async fn fork_yields_two_active_chats_for_the_other_participant() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;
    chats.delete_for_user(chat_id, "alice").await.unwrap();
    let fork = chats.add_message(chat_id, message("alice", "m2")).await.unwrap();

    // Bob never deleted anything: he now sees the stale original and the
    // fresh fork side by side.
    let bobs: Vec<Uuid> = chats
        .chats_for_user("bob")
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(bobs.len(), 2);
    assert!(bobs.contains(&chat_id));
    assert!(bobs.contains(&fork.id));

    // Alice only sees the fork.
    let alices: Vec<Uuid> = chats
        .chats_for_user("alice")
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(alices, vec![fork.id]);
}

#[tokio::test]
async fn mutual_deletion_removes_chat_and_messages() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;

    chats.delete_for_user(chat_id, "alice").await.unwrap();
    let report = chats.delete_for_user(chat_id, "bob").await.unwrap();
    assert!(report.deleted_completely);

    assert!(matches!(
        chats.get_chat(chat_id).await.unwrap_err(),
        AppError::NotFound
    ));
    assert!(chats.chats_for_user("alice").await.unwrap().is_empty());
    assert!(chats.chats_for_user("bob").await.unwrap().is_empty());

    // A straggling delete attempt is benign, not a failure.
    let report = chats.delete_for_user(chat_id, "alice").await.unwrap();
    assert!(report.deleted_completely);
}

#[tokio::test]
async fn visibility_excludes_own_soft_deletes_only() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;
    chats.delete_for_user(chat_id, "alice").await.unwrap();

    assert!(chats.chats_for_user("alice").await.unwrap().is_empty());

    let bobs = chats.chats_for_user("bob").await.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].deleted_usernames(), vec!["alice"]);
}

#[tokio::test]
async fn visible_chats_are_sorted_most_recently_updated_first() {
    let chats = service();
    let first = two_party_chat(&chats).await;
    let second = chats
        .create_chat(
            vec!["alice".into(), "carol".into()],
            vec![message("carol", "hey")],
        )
        .await
        .unwrap()
        .id;

    // Touch the older chat so it moves back to the front.
    chats.add_message(first, message("bob", "newest")).await.unwrap();

    let ids: Vec<Uuid> = chats
        .chats_for_user("alice")
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn add_participant_keeps_markers_and_rejects_duplicates() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;
    chats.delete_for_user(chat_id, "bob").await.unwrap();

    let convo = chats.add_participant(chat_id, "carol").await.unwrap();
    assert_eq!(convo.participants.len(), 3);
    assert_eq!(convo.deleted_usernames(), vec!["bob"]);

    let err = chats.add_participant(chat_id, "carol").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn can_delete_reflects_marker_state() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;

    let report = chats.can_delete(chat_id).await.unwrap();
    assert!(!report.can_delete);
    assert!(report.deleted_by.is_empty());

    chats.delete_for_user(chat_id, "alice").await.unwrap();
    let report = chats.can_delete(chat_id).await.unwrap();
    assert!(!report.can_delete);
    assert_eq!(report.deleted_by, vec!["alice"]);

    // Once everyone has deleted, the record itself is gone.
    chats.delete_for_user(chat_id, "bob").await.unwrap();
    assert!(matches!(
        chats.can_delete(chat_id).await.unwrap_err(),
        AppError::NotFound
    ));
}

#[tokio::test]
async fn concurrent_final_deletes_are_both_benign() {
    let chats = service();
    let chat_id = two_party_chat(&chats).await;

    let a = {
        let chats = chats.clone();
        tokio::spawn(async move { chats.delete_for_user(chat_id, "alice").await })
    };
    let b = {
        let chats = chats.clone();
        tokio::spawn(async move { chats.delete_for_user(chat_id, "bob").await })
    };

    let ra = a.await.unwrap().unwrap();
    let rb = b.await.unwrap().unwrap();

    // Exactly one of the racers observes the partial state at most; both
    // succeed, and the record ends up gone with all messages.
    assert!(ra.deleted_completely || rb.deleted_completely);
    assert!(matches!(
        chats.get_chat(chat_id).await.unwrap_err(),
        AppError::NotFound
    ));
}
