//! Domain value-type tests: cards, closures, and messages.

use chrono::{TimeZone, Utc};
use std::time::Duration;

use crate::thread::domain::{
    CloseRequest, CloserIdentity, EDITED_MARKER, MessageCard, PendingClosure,
};
use crate::thread::tests::harness::direct_message;

#[test]
fn mark_edited_appends_the_marker_once() {
    let mut card = MessageCard::notice("hello".to_owned()).with_footer("User");

    assert!(card.mark_edited());
    assert_eq!(card.footer.as_deref(), Some("User - (Edited)"));

    assert!(!card.mark_edited());
    assert_eq!(card.footer.as_deref(), Some("User - (Edited)"));
}

#[test]
fn mark_edited_creates_a_footer_when_none_exists() {
    let mut card = MessageCard::notice("hello".to_owned());
    assert!(card.mark_edited());
    assert_eq!(card.footer.as_deref(), Some(EDITED_MARKER));
}

#[test]
fn empty_message_detection_ignores_whitespace() {
    let blank = direct_message(1, 42, "   \n\t ");
    assert!(blank.is_empty());

    let filled = direct_message(2, 42, "hi");
    assert!(!filled.is_empty());
}

#[test]
fn close_request_round_trips_through_a_pending_record() {
    let fire_at = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).single().unwrap_or_default();
    let request = CloseRequest::new(CloserIdentity::new(7, "mod"))
        .with_delay(Duration::from_secs(300))
        .silent()
        .keep_channel()
        .with_message("wrapping up");

    let pending = request.into_pending(fire_at);
    assert_eq!(pending.fire_at, fire_at);
    assert!(pending.silent);
    assert!(!pending.delete_channel);
    assert_eq!(pending.message.as_deref(), Some("wrapping up"));

    let recovered = CloseRequest::from(pending);
    assert!(recovered.delay().is_zero());
    assert!(recovered.is_silent());
    assert!(!recovered.deletes_channel());
    assert_eq!(recovered.message(), Some("wrapping up"));
}

#[test]
fn pending_closure_serde_round_trip() {
    let record = PendingClosure {
        fire_at: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).single().unwrap_or_default(),
        closer: CloserIdentity::new(7, "mod"),
        silent: false,
        delete_channel: true,
        message: None,
    };

    let json = serde_json::to_string(&record).expect("serializable record");
    let back: PendingClosure = serde_json::from_str(&json).expect("deserializable record");
    assert_eq!(back, record);
}
