//! Behavioural integration tests for the thread lifecycle.
//!
//! These tests exercise end-to-end scenarios over the in-memory adapters:
//! opening a thread from an inbound private message, relaying in both
//! directions, scheduling and cancelling a delayed close, and recovering
//! state after a simulated restart.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mockable::DefaultClock;

use mailbridge::thread::{
    adapters::memory::{InMemoryAuditLog, InMemoryConfigStore, InMemoryTransport},
    domain::{
        CloseRequest, CloserIdentity, CorrespondentId, CorrespondentProfile, Destination,
        InboundMessage, Membership, MessageAuthor, MessageRef,
    },
    services::{ManagerSettings, ThreadManager, topic_for},
};

type Manager = ThreadManager<InMemoryTransport, InMemoryConfigStore, InMemoryAuditLog, DefaultClock>;

struct World {
    transport: Arc<InMemoryTransport>,
    config: Arc<InMemoryConfigStore>,
    audit: Arc<InMemoryAuditLog>,
    log_feed: mailbridge::thread::domain::ChannelRef,
    manager: Manager,
}

impl World {
    fn new() -> Self {
        let transport = Arc::new(InMemoryTransport::new());
        let config = Arc::new(InMemoryConfigStore::new());
        let audit = Arc::new(InMemoryAuditLog::new());
        let log_feed = transport.preload_channel("staff-log-feed", None);
        let manager = manager_over(&transport, &config, &audit, log_feed);
        Self {
            transport,
            config,
            audit,
            log_feed,
            manager,
        }
    }

    /// Builds a second manager over the same stores, as a process restart
    /// would.
    fn restarted(&self) -> Manager {
        manager_over(&self.transport, &self.config, &self.audit, self.log_feed)
    }

    fn register_member(&self, id: u64, name: &str) -> CorrespondentId {
        let key = CorrespondentId::from_u64(id);
        self.transport.register_profile(CorrespondentProfile {
            id: key,
            name: name.to_owned(),
            discriminator: "1234".to_owned(),
            avatar_url: None,
            registered_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap_or_default(),
            membership: Some(Membership {
                joined_at: Utc.with_ymd_and_hms(2025, 1, 10, 9, 30, 0).single().unwrap_or_default(),
                nickname: None,
                roles: vec!["Member".to_owned()],
            }),
        });
        key
    }
}

fn manager_over(
    transport: &Arc<InMemoryTransport>,
    config: &Arc<InMemoryConfigStore>,
    audit: &Arc<InMemoryAuditLog>,
    log_feed: mailbridge::thread::domain::ChannelRef,
) -> Manager {
    ThreadManager::new(
        Arc::clone(transport),
        Arc::clone(config),
        Arc::clone(audit),
        Arc::new(DefaultClock),
        ManagerSettings::new(log_feed),
    )
}

fn inbound(id: u64, author: u64, content: &str, source: Destination) -> InboundMessage {
    InboundMessage {
        id: MessageRef::from_u64(id),
        author: MessageAuthor {
            id: author,
            name: format!("author-{author}"),
            avatar_url: None,
        },
        content: content.to_owned(),
        created_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).single().unwrap_or_default(),
        attachments: Vec::new(),
        source,
    }
}

/// Lets fire-and-forget tasks drain before asserting.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(25)).await;
}

// ============================================================================
// Scenario: A private message opens a thread and reaches the staff channel
// ============================================================================

/// When an unknown correspondent writes in, a thread is provisioned and the
/// message is mirrored into the new staff channel.
#[tokio::test(flavor = "multi_thread")]
async fn an_inbound_message_opens_a_thread_and_is_mirrored() {
    let world = World::new();
    let alice = world.register_member(42, "alice");

    let thread = world
        .manager
        .find_or_create(alice)
        .await
        .expect("thread provisioned");
    let message = inbound(1, 42, "my account is locked", Destination::Direct(alice));
    thread
        .send(&message, None, false)
        .await
        .expect("message mirrored");
    settle().await;

    let channel = thread.channel().expect("provisioned channel");
    let staff_cards = world.transport.sent(Destination::Channel(channel));
    assert!(staff_cards
        .iter()
        .any(|record| record.card.description == "my account is locked"));

    // The mirrored copy carries the audit trail.
    assert!(world
        .audit
        .appended()
        .iter()
        .any(|entry| entry.content == "my account is locked"));
}

// ============================================================================
// Scenario: A staff reply reaches both endpoints
// ============================================================================

/// When staff reply inside the thread channel, the reply is mirrored to the
/// channel and to the correspondent's private stream.
#[tokio::test(flavor = "multi_thread")]
async fn a_staff_reply_reaches_both_endpoints() {
    let world = World::new();
    let alice = world.register_member(42, "alice");

    let thread = world
        .manager
        .find_or_create(alice)
        .await
        .expect("thread provisioned");
    let channel = thread.channel().expect("provisioned channel");

    let reply = inbound(2, 7, "resetting it now", Destination::Channel(channel));
    thread.reply(&reply).await.expect("reply relayed");
    settle().await;

    for destination in [Destination::Channel(channel), Destination::Direct(alice)] {
        assert!(
            world
                .transport
                .sent(destination)
                .iter()
                .any(|record| record.card.description == "resetting it now"),
            "missing mirrored reply at {destination:?}"
        );
    }
}

// ============================================================================
// Scenario: A delayed close survives a restart
// ============================================================================

/// When the process restarts while a delayed close is armed, resumption
/// re-arms the persisted record against the recovered thread.
#[tokio::test(flavor = "multi_thread")]
async fn a_delayed_close_survives_a_restart() {
    let world = World::new();
    let alice = world.register_member(42, "alice");

    let thread = world
        .manager
        .find_or_create(alice)
        .await
        .expect("thread provisioned");
    thread
        .close(
            CloseRequest::new(CloserIdentity::new(7, "mod"))
                .with_delay(Duration::from_secs(3600)),
        )
        .await
        .expect("close armed");

    // Simulated restart: fresh manager, same transport and stores.
    let restarted = world.restarted();
    restarted
        .resume_pending_closures()
        .await
        .expect("resumption succeeds");
    settle().await;

    assert_eq!(world.config.closure_count(), 1);
    let recovered = restarted
        .find(alice)
        .await
        .expect("lookup succeeds")
        .expect("a recovered thread");
    assert!(recovered
        .pending_closure()
        .await
        .expect("readable record")
        .is_some());
}

// ============================================================================
// Scenario: Message activity cancels a scheduled close
// ============================================================================

/// When any message is relayed while a close is pending, the close is
/// cancelled and staff see exactly one cancellation notice.
#[tokio::test(flavor = "multi_thread")]
async fn message_activity_cancels_a_scheduled_close() {
    let world = World::new();
    let alice = world.register_member(42, "alice");

    let thread = world
        .manager
        .find_or_create(alice)
        .await
        .expect("thread provisioned");
    thread
        .close(
            CloseRequest::new(CloserIdentity::new(7, "mod"))
                .with_delay(Duration::from_secs(3600)),
        )
        .await
        .expect("close armed");

    let message = inbound(3, 42, "wait, one more thing", Destination::Direct(alice));
    thread.send(&message, None, false).await.expect("message mirrored");
    settle().await;

    assert_eq!(world.config.closure_count(), 0);
    let channel = thread.channel().expect("provisioned channel");
    let notices = world
        .transport
        .sent(Destination::Channel(channel))
        .iter()
        .filter(|record| record.card.description == "Scheduled close has been cancelled.")
        .count();
    assert_eq!(notices, 1);
}

// ============================================================================
// Scenario: An immediate close archives and tears the thread down
// ============================================================================

/// When staff close a thread immediately, the conversation is archived, the
/// channel is deleted, and a summary lands in the staff feed.
#[tokio::test(flavor = "multi_thread")]
async fn an_immediate_close_archives_and_tears_down() {
    let world = World::new();
    let alice = world.register_member(42, "alice");
    world.audit.set_first_message("my account is locked");

    let thread = world
        .manager
        .find_or_create(alice)
        .await
        .expect("thread provisioned");
    let channel = thread.channel().expect("provisioned channel");

    thread
        .close(CloseRequest::new(CloserIdentity::new(7, "mod")))
        .await
        .expect("close succeeds");
    settle().await;

    assert!(!world.transport.channel_exists(channel));
    assert!(world.manager.find(alice).await.expect("lookup succeeds").is_none());

    let feed = world.transport.sent(Destination::Channel(world.log_feed));
    assert!(feed
        .iter()
        .any(|record| record.card.description.contains("my account is locked")));
}

// ============================================================================
// Scenario: A recovered thread keeps relaying after a restart
// ============================================================================

/// When the registry is empty after a restart, an existing channel's topic
/// metadata is enough to recover the thread and continue relaying.
#[tokio::test(flavor = "multi_thread")]
async fn recovery_by_topic_restores_relaying() {
    let world = World::new();
    let alice = world.register_member(42, "alice");
    let channel = world
        .transport
        .preload_channel("alice-1234", Some(&topic_for(alice)));

    let restarted = world.restarted();
    let thread = restarted
        .find_by_channel(channel)
        .await
        .expect("lookup succeeds")
        .expect("a recovered thread");

    let message = inbound(4, 42, "still there?", Destination::Direct(alice));
    thread.send(&message, None, false).await.expect("message mirrored");
    settle().await;

    assert!(world
        .transport
        .sent(Destination::Channel(channel))
        .iter()
        .any(|record| record.card.description == "still there?"));
}
