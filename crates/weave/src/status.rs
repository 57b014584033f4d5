//! The status channel: transient records explaining refused upgrades.
//!
//! A WebSocket close can't carry a rejection reason, so when the
//! authentication gate refuses an upgrade it records a short-lived HTTP
//! status code under the initiator's session id. The initiator, after
//! observing an abnormal closure, polls once for that record.
//!
//! Records are single-read and expire after a fixed window whether or
//! not anyone reads them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One recorded rejection.
struct Record {
    code: u16,
    recorded_at: Instant,
}

/// Session-id → status-code table with single-read semantics.
///
/// Cheap to clone — a handle over shared state, owned by the server and
/// torn down with it. The server's run loop drives
/// [`expire_stale`](Self::expire_stale) periodically; [`take`](Self::take)
/// also expires lazily so a record is never observable past its window.
#[derive(Clone)]
pub struct StatusTable {
    shared: Arc<Shared>,
}

struct Shared {
    ttl: Duration,
    records: Mutex<HashMap<String, Record>>,
}

impl StatusTable {
    /// How long a record stays readable.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

    /// Creates a table whose records expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                ttl,
                records: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Records `code` under `session_id`.
    ///
    /// A rejection with no session id has nowhere to be looked up from,
    /// so it is simply not recorded.
    pub fn record(&self, session_id: Option<&str>, code: u16) {
        let Some(session_id) = session_id else {
            return;
        };
        tracing::debug!(session = session_id, code, "status recorded");
        self.shared.records.lock().insert(
            session_id.to_string(),
            Record {
                code,
                recorded_at: Instant::now(),
            },
        );
    }

    /// Takes the record for `session_id`, if one exists and hasn't
    /// expired. Single-read: the record is removed either way.
    pub fn take(&self, session_id: &str) -> Option<u16> {
        let record = self.shared.records.lock().remove(session_id)?;
        if record.recorded_at.elapsed() > self.shared.ttl {
            return None;
        }
        Some(record.code)
    }

    /// Drops every record past its window. Returns how many were removed.
    pub fn expire_stale(&self) -> usize {
        let mut records = self.shared.records.lock();
        let before = records.len();
        records.retain(|_, record| {
            record.recorded_at.elapsed() <= self.shared.ttl
        });
        before - records.len()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.shared.records.lock().len()
    }

    /// Returns `true` if no record is held.
    pub fn is_empty(&self) -> bool {
        self.shared.records.lock().is_empty()
    }

    /// Answers a status poll, in the wire shape of the status endpoint.
    ///
    /// A missing `id` parameter and a missing record both produce error
    /// replies, distinguishable by message.
    pub fn reply(&self, session_id: Option<&str>) -> StatusReply {
        match session_id {
            None => StatusReply::error("no id provided"),
            Some(id) => match self.take(id) {
                Some(code) => StatusReply::Found { status: code },
                None => StatusReply::error("no status recorded"),
            },
        }
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

// ---------------------------------------------------------------------------
// StatusReply
// ---------------------------------------------------------------------------

/// Body of a status poll response.
///
/// Serializes to `{"status": <code>}` on success and
/// `{"err": true, "msg": "..."}` otherwise — the embedding application
/// exposes this from whatever HTTP route it registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusReply {
    /// A recorded status was found (and consumed).
    Found {
        /// The recorded HTTP status code (401, 403, or 500).
        status: u16,
    },
    /// No record, or no id supplied.
    Error {
        /// Always `true`.
        err: bool,
        /// Human-readable reason.
        msg: String,
    },
}

impl StatusReply {
    fn error(msg: &str) -> Self {
        Self::Error {
            err: true,
            msg: msg.to_string(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
