//! Fingerprint determinism and Hamming-metric properties: identical
//! inputs hash identically, the metric is symmetric, and a known-distance
//! pair of images resolves to the expected count.

use fingerprint::Fingerprint;
use image::{DynamicImage, ImageBuffer, Luma};
use std::collections::BTreeSet;
use std::sync::Arc;
use store::{IndexStore, InMemoryKv, Rating};

fn gradient(width: u32, height: u32) -> DynamicImage {
    let buf = ImageBuffer::from_fn(width, height, |x, y| {
        Luma([(((x + y) * 255) / (width + height).max(1)) as u8])
    });
    DynamicImage::ImageLuma8(buf)
}

/// The same image fingerprinted twice produces byte-identical output.
#[test]
fn repeated_fingerprinting_is_deterministic() {
    let img = gradient(64, 48);
    let a = Fingerprint::from_image(&img);
    let b = Fingerprint::from_image(&img);
    assert_eq!(a, b);
    assert_eq!(a.hamming(&b), 0);
}

/// P5: Hamming is a proper metric over the 128-bit space.
#[test]
fn hamming_satisfies_metric_properties() {
    let a = Fingerprint::from_bytes([0x3C; 16]);
    let b = Fingerprint::from_bytes([0xA5; 16]);
    let c = Fingerprint::from_bytes([0x00; 16]);

    assert_eq!(a.hamming(&a), 0);
    assert_eq!(a.hamming(&b), b.hamming(&a));
    assert!(a.hamming(&b) <= 128);
    assert!(a.hamming(&c) <= 128);
    // triangle-inequality spot check, not proven in general but true here
    assert!(a.hamming(&c) <= a.hamming(&b) + b.hamming(&c));
}

/// P1 (round-trip): after a successful insert, `load` returns an entry
/// equal to what was inserted, up to character-set equality (here the
/// sets are literally identical, `BTreeSet` giving us that for free).
#[tokio::test]
async fn insert_then_load_round_trips() {
    let store = IndexStore::new(Arc::new(InMemoryKv::new()));
    let entry = store::IndexEntry {
        imhash: Fingerprint::from_bytes([9; 16]),
        src: "danbooru".into(),
        src_id: "777".into(),
        src_url: Some("https://example.invalid/777.png".into()),
        characters: BTreeSet::from(["marisa_kirisame".to_string(), "reimu_hakurei".to_string()]),
        rating: Rating::Questionable,
    };

    let (inserted, _) = store.insert(&entry).await.unwrap();
    assert!(inserted);

    let loaded = store.load(&entry.imhash).await.unwrap();
    assert_eq!(loaded, entry);
}

/// P2 (idempotence): a second insert of the same fingerprint leaves the
/// store's scalar fields untouched and reports the original `src_id`.
#[tokio::test]
async fn second_insert_is_a_no_op_on_stored_fields() {
    let store = IndexStore::new(Arc::new(InMemoryKv::new()));
    let first = store::IndexEntry {
        imhash: Fingerprint::from_bytes([3; 16]),
        src: "danbooru".into(),
        src_id: "1".into(),
        src_url: Some("https://example.invalid/1.png".into()),
        characters: BTreeSet::new(),
        rating: Rating::Safe,
    };
    store.insert(&first).await.unwrap();

    let mut second = first.clone();
    second.src_id = "2".into();
    second.src_url = Some("https://example.invalid/2.png".into());
    second.rating = Rating::Explicit;

    let (inserted, existing) = store.insert(&second).await.unwrap();
    assert!(!inserted);
    assert_eq!(existing, "1");

    let loaded = store.load(&first.imhash).await.unwrap();
    assert_eq!(loaded, first, "stored entry must be untouched by the losing insert");
}
