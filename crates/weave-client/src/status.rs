//! The status probe: how a client learns *why* an upgrade was refused.
//!
//! Transports typically cannot carry a rejection reason on the close
//! itself, so the acceptor records a short-lived status under the
//! attempt's session identifier and the initiator polls for it after
//! observing an abnormal closure. How that poll travels (usually an HTTP
//! endpoint) is the embedding application's business — the client only
//! needs something that answers "was a status recorded for this id?".

/// Looks up the recorded status for a failed connect attempt.
///
/// Implementations are injected into the
/// [`ClientBuilder`](crate::ClientBuilder); the lookup is one-shot per
/// attempt and its result is single-read on the acceptor side.
pub trait StatusProbe: Send + Sync + 'static {
    /// Returns the recorded status code for `session_id`, if any.
    ///
    /// `None` means no record — an ordinary network failure rather than a
    /// deliberate rejection.
    fn lookup(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Option<u16>> + Send;
}

/// A probe that never finds a status.
///
/// The default for clients that have no status channel: every abnormal
/// closure is treated as an ordinary network failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl StatusProbe for NoProbe {
    async fn lookup(&self, _session_id: &str) -> Option<u16> {
        None
    }
}
