//! Entity tags for optimistic concurrency.
//!
//! A tag is the lowercase hex SHA-256 of an event's mutable state. It is not
//! stored; every write bumps `updated_at`, so every write changes the tag.

use axum_helpers::normalize_etag;
use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::models::Event;

fn field(hasher: &mut Sha256, value: Option<&str>) {
    // Length-prefixed so `None`, `""` and shifted separators never collide
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update((v.len() as u64).to_be_bytes());
            hasher.update(v.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

/// Unquoted tag for `event`.
pub fn compute(event: &Event) -> String {
    let mut hasher = Sha256::new();
    let ts = |t: &chrono::DateTime<chrono::Utc>| t.to_rfc3339_opts(SecondsFormat::Micros, true);

    field(&mut hasher, Some(&event.id.to_string()));
    field(&mut hasher, Some(&event.title));
    field(&mut hasher, event.description.as_deref());
    field(&mut hasher, event.location.as_deref());
    field(&mut hasher, Some(&ts(&event.start_time)));
    field(&mut hasher, Some(&ts(&event.end_time)));
    field(&mut hasher, Some(&ts(&event.updated_at)));

    hex::encode(hasher.finalize())
}

/// Strong entity tag header value: `"<hex>"`.
pub fn header_value(event: &Event) -> String {
    format!("\"{}\"", compute(event))
}

/// Compare a client-supplied tag (quoted, weak or bare) with the current state.
///
/// `*` matches any current representation, so it only guards against a
/// missing event.
pub fn matches(event: &Event, provided: &str) -> bool {
    let tag = normalize_etag(provided);
    tag == "*" || tag == compute(event)
}
