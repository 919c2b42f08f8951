//! Route authorization.
//!
//! Routes registered with [`Route::authorize`](crate::Route::authorize) are
//! checked by the [`Authorize`] implementation in
//! [`ServerOptions::authorization`](crate::ServerOptions::authorization)
//! before any argument is bound or any handler built. Without a configured
//! authorizer the requirement is ignored.

use crate::handler::BoxFuture;
use crate::request::Request;

/// Outcome of an authorization check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthDecision {
    /// Carry on with the request.
    Allow,
    /// `401` with the fixed body `Not authorized`.
    Deny,
    /// Answer with `status` and `message` instead of running the route.
    /// An unrepresentable status fails the request with a 500.
    Reject { status: u16, message: String },
}

impl AuthDecision {
    pub fn reject(status: u16, message: impl Into<String>) -> Self {
        Self::Reject { status, message: message.into() }
    }
}

impl From<bool> for AuthDecision {
    fn from(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

/// Decides whether a request may reach a protected route.
///
/// Implemented for plain closures, which covers most uses:
///
/// ```rust
/// use kiwi::{AuthDecision, ServerOptions};
///
/// let options = ServerOptions::default().authorization(|req: &kiwi::Request, roles: &[String]| {
///     match req.header("x-role") {
///         Some(role) if roles.iter().any(|r| r == role) => AuthDecision::Allow,
///         Some(_) => AuthDecision::reject(403, "forbidden"),
///         None => AuthDecision::Deny,
///     }
/// });
/// ```
pub trait Authorize: Send + Sync + 'static {
    fn authorize<'a>(&'a self, request: &'a Request, roles: &'a [String]) -> BoxFuture<'a, AuthDecision>;
}

impl<F> Authorize for F
where
    F: Fn(&Request, &[String]) -> AuthDecision + Send + Sync + 'static,
{
    fn authorize<'a>(&'a self, request: &'a Request, roles: &'a [String]) -> BoxFuture<'a, AuthDecision> {
        let decision = self(request, roles);
        Box::pin(std::future::ready(decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_map_to_allow_and_deny() {
        assert_eq!(AuthDecision::from(true), AuthDecision::Allow);
        assert_eq!(AuthDecision::from(false), AuthDecision::Deny);
    }

    #[tokio::test]
    async fn closures_receive_request_and_roles() {
        let check = |req: &Request, roles: &[String]| {
            AuthDecision::from(req.header("x-role").is_some_and(|r| roles.iter().any(|x| x == r)))
        };
        let (parts, ()) = http::Request::builder().header("x-role", "admin").body(()).unwrap().into_parts();
        let req = Request::new(parts, None);

        assert_eq!(check.authorize(&req, &["admin".to_owned()]).await, AuthDecision::Allow);
        assert_eq!(check.authorize(&req, &["owner".to_owned()]).await, AuthDecision::Deny);
    }
}
