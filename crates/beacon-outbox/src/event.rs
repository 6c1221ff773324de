//! Event value type and content fingerprints.

use crate::TrackRejection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// A single user-interaction event.
///
/// Serialized as `{"eventId": "...", "properties": {...}}`, which is also the
/// element format of the collector request body and of the recovery store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    event_id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl Event {
    /// Build an event, rejecting an empty id.
    pub fn new(
        event_id: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Result<Self, TrackRejection> {
        let event_id = event_id.into();
        if event_id.is_empty() {
            return Err(TrackRejection::EmptyEventId);
        }
        Ok(Self {
            event_id,
            properties,
        })
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Whether this event could have been produced by [`Event::new`].
    pub(crate) fn is_valid(&self) -> bool {
        !self.event_id.is_empty()
    }

    /// Content fingerprint used for deduplication.
    ///
    /// Two events share a fingerprint iff their canonical JSON encodings are
    /// byte-identical. Object keys are sorted at every depth, so property
    /// insertion order never matters.
    pub fn fingerprint(&self) -> EventFingerprint {
        let mut canonical = Vec::with_capacity(64);
        canonical.extend_from_slice(b"{\"eventId\":");
        write_canonical(&Value::String(self.event_id.clone()), &mut canonical);
        canonical.extend_from_slice(b",\"properties\":");
        write_canonical_object(&self.properties, &mut canonical);
        canonical.push(b'}');

        let digest = Sha256::digest(&canonical);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        EventFingerprint(bytes)
    }
}

/// SHA-256 of an event's canonical JSON encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventFingerprint([u8; 32]);

impl fmt::Debug for EventFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventFingerprint(")?;
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

/// Collect the fingerprints of a set of events.
pub fn fingerprints<'a>(events: impl IntoIterator<Item = &'a Event>) -> HashSet<EventFingerprint> {
    events.into_iter().map(Event::fingerprint).collect()
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        // Scalars have a single serde_json encoding.
        scalar => out.extend_from_slice(scalar.to_string().as_bytes()),
    }
}

fn write_canonical_object(map: &Map<String, Value>, out: &mut Vec<u8>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push(b'{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_canonical(&Value::String(key.clone()), out);
        out.push(b':');
        write_canonical(value, out);
    }
    out.push(b'}');
}
