//! Route access guard.
//!
//! The same decision table runs at two independent enforcement points: the
//! router level (bearer-token identity, JSON 401/403 outcomes) and the
//! network edge (cookie-inspecting middleware issuing redirects before any
//! protected handler runs). The edge sees only coarse signals: the presence
//! of the session cookie and the role cookie's claim.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::str::FromStr;
use std::sync::Arc;

use super::{Role, ROLE_COOKIE, SESSION_COOKIE};

/// Path of the sign-in page unauthenticated users are redirected to
pub const SIGN_IN_PATH: &str = "/signin";
/// Path shown when an authenticated user lacks the required role
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Declared access requirements for a route or route prefix
#[derive(Debug, Clone, Copy)]
pub struct RouteAccess {
    pub auth_required: bool,
    /// Empty slice means "any authenticated role"
    pub allowed_roles: &'static [Role],
}

/// Outcome of evaluating a request against a route's requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Redirect to sign-in, preserving the intended path for post-login return
    SignIn,
    /// Authenticated but insufficient role
    Denied,
}

impl RouteAccess {
    pub const fn public() -> Self {
        Self {
            auth_required: false,
            allowed_roles: &[],
        }
    }

    pub const fn authenticated() -> Self {
        Self {
            auth_required: true,
            allowed_roles: &[],
        }
    }

    pub const fn roles(allowed: &'static [Role]) -> Self {
        Self {
            auth_required: true,
            allowed_roles: allowed,
        }
    }

    /// Applies the access decision table. `role` is `None` for
    /// unauthenticated callers and for callers whose role claim failed to
    /// parse (an unparseable claim never satisfies a role requirement).
    pub fn evaluate(&self, role: Option<Role>) -> AccessDecision {
        if !self.auth_required {
            return AccessDecision::Allow;
        }
        match role {
            None => AccessDecision::SignIn,
            Some(_) if self.allowed_roles.is_empty() => AccessDecision::Allow,
            Some(role) if self.allowed_roles.contains(&role) => AccessDecision::Allow,
            Some(_) => AccessDecision::Denied,
        }
    }
}

/// Ordered prefix rules applied by the edge middleware. The longest matching
/// prefix wins; unmatched paths pass through.
#[derive(Debug, Clone, Default)]
pub struct EdgeGuard {
    rules: Vec<(String, RouteAccess)>,
}

impl EdgeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: impl Into<String>, access: RouteAccess) -> Self {
        self.rules.push((prefix.into(), access));
        self
    }

    fn match_rule(&self, path: &str) -> Option<&RouteAccess> {
        self.rules
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| access)
    }
}

/// Edge-level guard middleware. Runs before authentication proper and must
/// not let a protected response render ahead of the decision.
pub async fn edge_guard_middleware(
    State(guard): State<Arc<EdgeGuard>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(access) = guard.match_rule(&path) else {
        return next.run(request).await;
    };

    let authenticated = jar
        .get(SESSION_COOKIE)
        .map(|c| !c.value().is_empty())
        .unwrap_or(false);
    let role = jar
        .get(ROLE_COOKIE)
        .and_then(|c| Role::from_str(c.value()).ok());

    // The edge only sees cookie claims; the router-level check re-validates
    // the bearer token itself.
    let effective_role = if authenticated {
        role.or(if access.allowed_roles.is_empty() {
            // Any authenticated role passes; claim content is irrelevant here
            Some(Role::Client)
        } else {
            None
        })
    } else {
        None
    };

    match access.evaluate(effective_role) {
        AccessDecision::Allow => next.run(request).await,
        AccessDecision::SignIn => {
            let target = format!("{}?callback={}", SIGN_IN_PATH, encode_path(&path));
            Redirect::to(&target).into_response()
        }
        AccessDecision::Denied => Redirect::to(UNAUTHORIZED_PATH).into_response(),
    }
}

// Percent-encode the characters that would corrupt a query parameter
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
