//! Channel naming and topic-metadata extraction tests.

use crate::thread::domain::CorrespondentId;
use crate::thread::services::{disambiguate_channel_name, extract_correspondent_id, topic_for};
use rstest::rstest;

#[rstest]
#[case("Some User!", "1234", "someuser-1234")]
#[case("ALL-CAPS", "0007", "all-caps-0007")]
#[case("日本語", "4242", "null-4242")]
#[case("", "9999", "null-9999")]
fn channel_names_are_sanitized_and_suffixed(
    #[case] handle: &str,
    #[case] suffix: &str,
    #[case] expected: &str,
) {
    assert_eq!(disambiguate_channel_name(handle, suffix, &[]), expected);
}

#[test]
fn colliding_names_gain_disambiguation_markers() {
    let existing = vec!["bob-1234".to_owned(), "bob-1234-x".to_owned()];
    assert_eq!(
        disambiguate_channel_name("Bob", "1234", &existing),
        "bob-1234-x-x"
    );
}

#[test]
fn topic_round_trips_through_extraction() {
    let id = CorrespondentId::from_u64(42);
    let topic = topic_for(id);
    assert_eq!(topic, "User ID: 42");
    assert_eq!(extract_correspondent_id(&topic), Some(id));
}

#[rstest]
#[case("User ID: 42 | Note: this member is not part of this server.", Some(42))]
#[case("no identifier here", None)]
#[case("User ID: not-a-number", None)]
fn extraction_tolerates_surrounding_text(#[case] text: &str, #[case] expected: Option<u64>) {
    assert_eq!(
        extract_correspondent_id(text),
        expected.map(CorrespondentId::from_u64)
    );
}
