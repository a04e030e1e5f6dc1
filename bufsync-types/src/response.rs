//! Daemon response to a handled event.

use serde::{Deserialize, Serialize};

use crate::ContentHash;

/// What the daemon tells the editor after handling an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResponse {
    /// Content hash of the driver buffer after the event.
    pub state: ContentHash,
    /// The client must send full text next time.
    pub resend: bool,
    /// Per-provider output, opaque to the synchronization layer.
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

impl EventResponse {
    /// A response asking the client to resend full text.
    pub fn resend(state: ContentHash) -> Self {
        Self {
            state,
            resend: true,
            results: Vec::new(),
        }
    }
}
