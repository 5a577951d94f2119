mod common;

use anyhow::Result;
use common::{stored, Harness, WAIT};
use serde_json::json;
use signtalk::channel::{events, ReceiveMessageMessage};
use signtalk::model::{Identity, MessageOrigin, RoomKey};
use signtalk::{Error, SessionState};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// A relayed message, tagged with alice's room with `room_peer` if given
fn incoming(room_peer: Option<&str>, sender: &str, text: &str) -> ReceiveMessageMessage {
    ReceiveMessageMessage {
        room_key: room_peer.map(|peer| RoomKey::derive(&Identity::new("alice"), &Identity::new(peer))),
        sender: Identity::new(sender),
        sender_name: sender.to_uppercase(),
        text: text.to_string(),
        time: Some("10:15".to_string()),
    }
}

#[tokio::test]
async fn test_bind_joins_room_with_derived_key() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    assert_eq!(session.state(), SessionState::Unbound);

    let binding = session.bind(Identity::new("bob")).await?;

    assert_eq!(binding.room_key.as_str(), "alice_bob");
    assert_eq!(binding.peer, Identity::new("bob"));
    assert_eq!(session.state(), SessionState::Bound);

    let joins = h.transport.published_named(events::JOIN_ROOM);
    assert_eq!(joins, vec![json!({"roomKey": "alice_bob", "identity": "alice"})]);

    Ok(())
}

#[tokio::test]
async fn test_rebind_leaves_before_joining() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    session.bind(Identity::new("bob")).await?;
    let second = session.bind(Identity::new("carol")).await?;

    assert_eq!(second.room_key.as_str(), "alice_carol");
    assert_eq!(session.binding(), Some(&second));

    let names: Vec<String> = h.transport.published().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec![events::JOIN_ROOM, events::LEAVE_ROOM, events::JOIN_ROOM]);

    let leaves = h.transport.published_named(events::LEAVE_ROOM);
    assert_eq!(leaves[0]["roomKey"], "alice_bob");

    Ok(())
}

#[tokio::test]
async fn test_same_pair_resolves_same_room() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    let first = session.bind(Identity::new("bob")).await?;
    session.bind(Identity::new("carol")).await?;
    let again = session.bind(Identity::new("bob")).await?;

    assert_eq!(first.room_id, again.room_id);
    assert_eq!(first.room_key, again.room_key);
    assert_eq!(h.backend.resolve_calls.load(Ordering::SeqCst), 3);

    Ok(())
}

#[tokio::test]
async fn test_failed_resolution_leaves_session_unbound() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    session.bind(Identity::new("bob")).await?;

    h.backend.fail(true);
    let result = session.bind(Identity::new("carol")).await;

    assert!(matches!(result, Err(Error::RoomResolution(_))));
    assert_eq!(session.state(), SessionState::Unbound);
    assert!(session.binding().is_none());

    // Old room left, no join for the new one
    assert_eq!(h.transport.published_named(events::LEAVE_ROOM).len(), 1);
    assert_eq!(h.transport.published_named(events::JOIN_ROOM).len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_slow_resolution_times_out() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session_with_timeout(Duration::from_millis(50));

    h.backend.delay(Duration::from_millis(500));
    let result = session.bind(Identity::new("bob")).await;

    assert!(matches!(result, Err(Error::RoomResolution(_))));
    assert_eq!(session.state(), SessionState::Unbound);
    assert!(h.transport.published_named(events::JOIN_ROOM).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_messages_for_other_rooms_are_discarded() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    assert!(!session.on_incoming_message(incoming(None, "bob", "too early")));

    session.bind(Identity::new("bob")).await?;

    assert!(!session.on_incoming_message(incoming(Some("carol"), "carol", "wrong room")));
    assert!(session.on_incoming_message(incoming(Some("bob"), "bob", "hi")));
    assert!(session.on_incoming_message(incoming(None, "bob", "no key")));

    let texts: Vec<&str> = session.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["hi", "no key"]);
    assert!(session.messages().iter().all(|m| m.origin == MessageOrigin::Live));
    assert_eq!(session.messages()[0].display_time, "10:15");

    Ok(())
}

#[tokio::test]
async fn test_history_is_sorted_and_precedes_live_messages() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    let binding = session.bind(Identity::new("bob")).await?;
    h.backend.set_history(
        binding.room_id,
        vec![
            stored("third", "bob", "2024-03-01 10:02:00"),
            stored("first", "alice", "2024-03-01 10:00:00"),
            stored("second", "bob", "2024-03-01T10:01:00Z"),
        ],
    );

    session.on_incoming_message(incoming(Some("bob"), "bob", "live"));

    let history = session.load_history(binding.room_id).await?;

    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert!(history.iter().all(|m| m.origin == MessageOrigin::History));
    assert_eq!(history[0].display_time, "10:00");

    let all: Vec<&str> = session.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(all, vec!["first", "second", "third", "live"]);

    Ok(())
}

#[tokio::test]
async fn test_unparseable_history_date_is_displayed_verbatim() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    let binding = session.bind(Identity::new("bob")).await?;
    h.backend.set_history(
        binding.room_id,
        vec![
            stored("a", "bob", "2024-03-01 10:00:00"),
            stored("b", "bob", "yesterday"),
        ],
    );

    let history = session.load_history(binding.room_id).await?;

    assert_eq!(history.len(), 2);
    assert_eq!(history[1].display_time, "yesterday");
    assert!(history[1].timestamp.is_none());

    Ok(())
}

#[tokio::test]
async fn test_history_failure_is_reported() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    let binding = session.bind(Identity::new("bob")).await?;
    h.backend.fail(true);

    let result = session.load_history(binding.room_id).await;

    assert!(matches!(result, Err(Error::HistoryUnavailable(_))));
    assert_eq!(session.state(), SessionState::Bound);

    Ok(())
}

#[tokio::test]
async fn test_send_requires_room_and_does_not_echo() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    assert!(matches!(session.send("hello").await, Err(Error::NoActiveRoom)));
    assert!(h.transport.published_named(events::SEND_MESSAGE).is_empty());

    let binding = session.bind(Identity::new("bob")).await?;
    session.send("  hello  ").await?;
    session.send("   ").await?;

    let sent = h.transport.wait_for(events::SEND_MESSAGE, 1, WAIT).await?;
    assert_eq!(
        sent,
        vec![json!({
            "roomKey": "alice_bob",
            "roomId": binding.room_id,
            "sender": "alice",
            "text": "hello",
        })]
    );
    assert!(session.messages().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_send_fails_while_disconnected() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    session.bind(Identity::new("bob")).await?;

    h.transport.disconnect().await?;
    common::eventually("disconnect", || !h.channel.is_connected()).await?;

    assert!(matches!(session.send("hello").await, Err(Error::ChannelDisconnected)));
    assert!(h.transport.published_named(events::SEND_MESSAGE).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_rejoin_reemits_join() -> Result<()> {
    let h = Harness::new().await?;
    let mut session = h.session();

    session.rejoin().await?;
    assert!(h.transport.published().is_empty());

    session.bind(Identity::new("bob")).await?;
    session.rejoin().await?;

    let joins = h.transport.published_named(events::JOIN_ROOM);
    assert_eq!(joins.len(), 2);
    assert_eq!(joins[0], joins[1]);

    Ok(())
}
