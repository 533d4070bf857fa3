//! The message envelope that travels through pipeline queues.

use std::collections::HashMap;

use serde_json::Value;

/// Open key/value bag carried alongside a message's payload.
///
/// Tasks append to this map in place; the core never merges a
/// separately-returned metadata map back into it (see `DESIGN.md`,
/// "maps.Copy of task-returned metadata").
pub type Metadata = HashMap<String, Value>;

/// Pairs a payload of type `T` with the metadata accumulated by upstream
/// stages. Owned exclusively by whichever stage currently holds it, except
/// across a fan-out split where each emitted element gets its own clone.
#[derive(Debug, Clone)]
pub struct Msg<T> {
    pub data: T,
    pub metadata: Metadata,
}

impl<T> Msg<T> {
    pub fn new(data: T, metadata: Metadata) -> Self {
        Self { data, metadata }
    }

    pub fn with_empty_metadata(data: T) -> Self {
        Self {
            data,
            metadata: Metadata::new(),
        }
    }
}
