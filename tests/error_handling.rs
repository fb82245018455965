//! Error-taxonomy checks: `NotFound`, `InvalidArgument`, and
//! malformed-rating rejection, exercised at the crate boundary rather
//! than the unit-test level.

use fingerprint::Fingerprint;
use store::{IndexStore, InMemoryKv, Rating, StoreError};
use std::sync::Arc;
use upstream::{UpstreamClient, UpstreamError};

/// `load` on an unknown fingerprint fails with `NotFound`, not a generic
/// error — callers on the search path treat this as "no candidate", but
/// the lower-level `IndexStore::load` API surfaces it explicitly.
#[tokio::test]
async fn load_unknown_fingerprint_is_not_found() {
    let store = IndexStore::new(Arc::new(InMemoryKv::new()));
    let err = store
        .load(&Fingerprint::from_bytes([0x42; 16]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

/// More than 2 tags is a programmer error (`InvalidArgument`), raised
/// before any network request is attempted — `search` validates the tag
/// count up front.
#[tokio::test]
async fn search_rejects_more_than_two_tags() {
    let client = UpstreamClient::new("http://example.invalid", "boorudex-test/0.1");
    let tags = vec!["touhou".to_string(), "reimu".to_string(), "marisa".to_string()];
    let err = client.search(&tags, &[], None, None).await.unwrap_err();
    assert!(matches!(err, UpstreamError::InvalidArgument(3)));
}

/// A rating character outside `{s, q, e}` is rejected rather than
/// silently accepted.
#[test]
fn invalid_rating_character_is_rejected() {
    let err = Rating::try_from('x').unwrap_err();
    assert!(matches!(err, StoreError::InvalidRating('x')));
}

/// Valid rating characters round-trip through `TryFrom`/`as_char`.
#[test]
fn valid_rating_characters_round_trip() {
    for (ch, rating) in [('s', Rating::Safe), ('q', Rating::Questionable), ('e', Rating::Explicit)] {
        let parsed = Rating::try_from(ch).unwrap();
        assert_eq!(parsed, rating);
        assert_eq!(parsed.as_char(), ch);
    }
}
