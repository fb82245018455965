//! Key schema for the KV store. Keys are 8-bit clean: fingerprint bytes are
//! embedded directly after a UTF-8 prefix, never re-encoded as hex or
//! base64, so all key builders return `Vec<u8>` rather than `String`.

use fingerprint::Fingerprint;

pub fn hash_key(imhash: &Fingerprint, field: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(5 + 16 + 1 + field.len());
    key.extend_from_slice(b"hash:");
    key.extend_from_slice(imhash.as_bytes());
    key.push(b':');
    key.extend_from_slice(field.as_bytes());
    key
}

/// `hash_idx:{i:02d}:{b:02x}` — posting list for byte position `i` == value `b`.
pub fn hash_idx_key(i: usize, b: u8) -> Vec<u8> {
    format!("hash_idx:{i:02}:{b:02x}").into_bytes()
}

pub fn character_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(10 + name.len());
    key.extend_from_slice(b"character:");
    key.extend_from_slice(name.as_bytes());
    key
}

pub fn indexed_key(src: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + src.len());
    key.extend_from_slice(b"indexed:");
    key.extend_from_slice(src.as_bytes());
    key
}

pub fn awaiting_index_key(src: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + src.len());
    key.extend_from_slice(b"awaiting_index:");
    key.extend_from_slice(src.as_bytes());
    key
}

pub const INDEXED_TAGS_KEY: &[u8] = b"indexed_tags";

pub fn index_queue_key(tag: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(13 + tag.len());
    key.extend_from_slice(b"index_queue:");
    key.extend_from_slice(tag.as_bytes());
    key
}
