//! Authentication hook gating the upgrade of each incoming connection.
//!
//! Weave doesn't implement authentication itself — the embedding
//! application does (JWT validation, an auth service call, a shared
//! secret). The framework defines the [`Authenticator`] trait and calls
//! it once per upgrade request, before any connection object exists.

use weave_transport::{HeaderMap, Url};

/// What the predicate gets to look at: the upgrade request's headers, its
/// parsed target, and the credential token from the query string.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    /// Headers as sent by the initiator.
    pub headers: &'a HeaderMap,

    /// The request target, including all query parameters.
    pub url: &'a Url,

    /// The `token` query parameter, when one was sent.
    pub token: Option<&'a str>,
}

/// An unexpected failure inside the predicate.
///
/// Recorded as a generic `500` status; the underlying error never reaches
/// the initiator.
pub type AuthFault = Box<dyn std::error::Error + Send + Sync>;

/// Decides whether an upgrade request may become a connection.
///
/// - `Ok(true)` — accept: the connection object is created.
/// - `Ok(false)` — reject: a `401` status is recorded under the request's
///   session id and the channel is dropped.
/// - `Err(_)` — fault: a `500` status is recorded and the channel is
///   dropped; the fault itself goes to the diagnostic log only.
///
/// # Example
///
/// ```rust
/// use weave::{AuthFault, AuthRequest, Authenticator};
///
/// /// Accepts connections presenting the configured shared secret.
/// struct SecretAuth {
///     secret: String,
/// }
///
/// impl Authenticator for SecretAuth {
///     async fn check(
///         &self,
///         request: AuthRequest<'_>,
///     ) -> Result<bool, AuthFault> {
///         Ok(request.token == Some(self.secret.as_str()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates one upgrade request.
    fn check(
        &self,
        request: AuthRequest<'_>,
    ) -> impl std::future::Future<Output = Result<bool, AuthFault>> + Send;
}

/// An [`Authenticator`] that accepts every request — the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Authenticator for AcceptAll {
    async fn check(&self, _request: AuthRequest<'_>) -> Result<bool, AuthFault> {
        Ok(true)
    }
}
