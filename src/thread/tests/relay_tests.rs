//! Relay delivery tests: mention gathering, audit appends, mirrored-card
//! construction, and original-message cleanup.

use std::sync::Arc;

use crate::thread::{
    adapters::memory::{InMemoryAuditLog, InMemoryConfigStore, InMemoryTransport},
    domain::{Attachment, CardTag, CorrespondentId, Destination},
    services::{MessageRelay, RelayParams, build_mirror_card, role_footer},
};
use crate::thread::tests::harness::{channel_message, direct_message, settle, with_attachments};

struct RelayFixture {
    transport: Arc<InMemoryTransport>,
    config: Arc<InMemoryConfigStore>,
    audit: Arc<InMemoryAuditLog>,
    relay: MessageRelay<InMemoryTransport, InMemoryConfigStore, InMemoryAuditLog>,
    channel: Destination,
    key: CorrespondentId,
}

fn fixture() -> RelayFixture {
    let transport = Arc::new(InMemoryTransport::new());
    let config = Arc::new(InMemoryConfigStore::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let relay = MessageRelay::new(
        Arc::clone(&transport),
        Arc::clone(&config),
        Arc::clone(&audit),
    );
    let channel = Destination::Channel(transport.preload_channel("alice-1234", None));
    RelayFixture {
        transport,
        config,
        audit,
        relay,
        channel,
        key: CorrespondentId::from_u64(42),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn correspondent_relay_carries_subscription_and_squad_mentions() {
    let fx = fixture();
    fx.config
        .set_subscriptions(fx.key, vec!["<@&100>".to_owned()]);
    fx.config
        .set_notification_squad(fx.key, vec!["<@200>".to_owned(), "<@201>".to_owned()]);

    let message = direct_message(1, 42, "hello");
    fx.relay
        .relay(RelayParams {
            message: &message,
            destination: fx.channel,
            thread_key: fx.key,
            from_staff: false,
        })
        .await
        .expect("relay succeeds");

    let sent = fx.transport.sent(fx.channel);
    assert_eq!(
        sent.first().and_then(|record| record.mentions.clone()),
        Some("<@&100> <@200> <@201>".to_owned())
    );

    // The squad is one-shot: a second relay carries only the subscription.
    let second = direct_message(2, 42, "again");
    fx.relay
        .relay(RelayParams {
            message: &second,
            destination: fx.channel,
            thread_key: fx.key,
            from_staff: false,
        })
        .await
        .expect("relay succeeds");

    let sent = fx.transport.sent(fx.channel);
    assert_eq!(
        sent.get(1).and_then(|record| record.mentions.clone()),
        Some("<@&100>".to_owned())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn staff_relay_never_carries_mentions() {
    let fx = fixture();
    fx.config
        .set_subscriptions(fx.key, vec!["<@&100>".to_owned()]);

    let Destination::Channel(channel) = fx.channel else {
        unreachable!("the fixture destination is a channel");
    };
    let message = channel_message(1, 7, channel, "staff note");
    fx.relay
        .relay(RelayParams {
            message: &message,
            destination: Destination::Direct(fx.key),
            thread_key: fx.key,
            from_staff: true,
        })
        .await
        .expect("relay succeeds");

    let sent = fx.transport.sent(Destination::Direct(fx.key));
    assert_eq!(sent.len(), 1);
    assert!(sent.first().is_some_and(|record| record.mentions.is_none()));
}

#[tokio::test(flavor = "multi_thread")]
async fn original_is_deleted_only_when_attachment_free() {
    let fx = fixture();

    let bare = direct_message(1, 42, "no attachments");
    fx.relay
        .relay(RelayParams {
            message: &bare,
            destination: fx.channel,
            thread_key: fx.key,
            from_staff: false,
        })
        .await
        .expect("relay succeeds");
    assert_eq!(fx.transport.deletions(), vec![(bare.source, bare.id)]);

    let attached = with_attachments(
        direct_message(2, 42, "with upload"),
        vec![Attachment::upload("https://cdn.example.test/doc.pdf", "doc.pdf")],
    );
    fx.relay
        .relay(RelayParams {
            message: &attached,
            destination: fx.channel,
            thread_key: fx.key,
            from_staff: false,
        })
        .await
        .expect("relay succeeds");
    assert_eq!(fx.transport.deletions().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn correspondent_relay_appends_a_directed_audit_entry() {
    let fx = fixture();
    let message = direct_message(1, 42, "log me");

    fx.relay
        .relay(RelayParams {
            message: &message,
            destination: fx.channel,
            thread_key: fx.key,
            from_staff: false,
        })
        .await
        .expect("relay succeeds");
    settle().await;

    let appended = fx.audit.appended();
    assert_eq!(appended.len(), 1);
    let entry = appended.first().expect("one appended entry");
    assert_eq!(entry.content, "log me");
    assert_eq!(entry.destination, Some(fx.key));
}

#[tokio::test(flavor = "multi_thread")]
async fn staff_private_copy_skips_the_audit_append() {
    let fx = fixture();
    let Destination::Channel(channel) = fx.channel else {
        unreachable!("the fixture destination is a channel");
    };
    let message = channel_message(1, 7, channel, "staff reply");

    // The staff-channel copy carries the append...
    fx.relay
        .relay(RelayParams {
            message: &message,
            destination: fx.channel,
            thread_key: fx.key,
            from_staff: true,
        })
        .await
        .expect("relay succeeds");
    // ...and the private-stream copy skips it.
    fx.relay
        .relay(RelayParams {
            message: &message,
            destination: Destination::Direct(fx.key),
            thread_key: fx.key,
            from_staff: true,
        })
        .await
        .expect("relay succeeds");
    settle().await;

    let appended = fx.audit.appended();
    assert_eq!(appended.len(), 1);
    assert_eq!(
        appended.first().and_then(|entry| entry.destination),
        None
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn a_delivery_failure_surfaces_as_an_error() {
    let fx = fixture();
    fx.transport.fail_sends(true);

    let message = direct_message(1, 42, "hello");
    let result = fx
        .relay
        .relay(RelayParams {
            message: &message,
            destination: fx.channel,
            thread_key: fx.key,
            from_staff: false,
        })
        .await;

    assert!(result.is_err());
    assert!(fx.transport.sent(fx.channel).is_empty());
    // The failed delivery never deletes the original.
    assert!(fx.transport.deletions().is_empty());
}

#[test]
fn mirror_card_carries_role_styling_and_origin() {
    let message = direct_message(5, 42, "body text");
    let card = build_mirror_card(&message, false);

    assert_eq!(card.description, "body text");
    assert_eq!(card.footer.as_deref(), Some(role_footer(false)));
    assert_eq!(card.tag, CardTag::Correspondent);
    assert_eq!(card.origin, Some(message.id));
    assert_eq!(card.timestamp, Some(message.created_at));
    assert_eq!(
        card.author.as_ref().map(|author| author.name.as_str()),
        Some("user-42")
    );

    let staff = build_mirror_card(&message, true);
    assert_eq!(staff.footer.as_deref(), Some("Moderator"));
    assert_eq!(staff.tag, CardTag::Staff);
}

#[test]
fn mirror_card_surfaces_every_classified_candidate() {
    let message = with_attachments(
        direct_message(6, 42, "see also http://x.com/extra.png"),
        vec![
            Attachment::upload("https://cdn.example.test/shot.gif", "shot.gif"),
            Attachment::upload("https://cdn.example.test/doc.pdf", "doc.pdf"),
        ],
    );
    let card = build_mirror_card(&message, false);

    assert_eq!(
        card.image_url.as_deref(),
        Some("https://cdn.example.test/shot.gif")
    );

    let names: Vec<&str> = card.fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Additional Image upload (1)", "File upload (1)"]
    );
    assert_eq!(
        card.fields.first().map(|field| field.value.as_str()),
        Some("http://x.com/extra.png")
    );
    assert!(card.fields.first().is_some_and(|field| !field.inline));
    assert_eq!(
        card.fields.get(1).map(|field| field.value.as_str()),
        Some("[doc.pdf](https://cdn.example.test/doc.pdf)")
    );
    assert!(card.fields.get(1).is_some_and(|field| field.inline));
}
