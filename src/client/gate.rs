//! Role gate for the client's views.
//!
//! Every gated CLI command asks [`authorize`] before it talks to the server.
//! The gate only looks at the stored session context, so an expired token is
//! still caught later by the server's 401.

use tracing::warn;

use crate::db::UserRole;

use super::context::{SessionContext, StoredUser};

/// Where a user is sent when they may not stay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Login,
    Parking,
    Sessions,
    Dashboard,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Login => "/login",
            Destination::Parking => "/parking",
            Destination::Sessions => "/sessions",
            Destination::Dashboard => "/dashboard",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Allow(StoredUser),
    Redirect(Destination),
}

/// Rank of a stored role string; unknown roles rank below customer
pub fn rank(role: &str) -> u8 {
    role.parse::<UserRole>().map(|r| r.level()).unwrap_or(0)
}

/// Home view for a role
pub fn default_destination(role: &str) -> Destination {
    match role.parse::<UserRole>() {
        Ok(UserRole::Customer) | Err(_) => Destination::Parking,
        Ok(UserRole::Operator) => Destination::Sessions,
        Ok(UserRole::Admin) => Destination::Dashboard,
    }
}

/// Decide whether the stored session may enter a view that needs `required`.
///
/// A stored user that does not decode wipes both credentials keys.
pub fn authorize(ctx: &mut SessionContext, required: Option<UserRole>) -> AccessDecision {
    if ctx.token().filter(|t| !t.is_empty()).is_none() {
        return AccessDecision::Redirect(Destination::Login);
    }

    let user = match ctx.user() {
        None => return AccessDecision::Redirect(Destination::Login),
        Some(Ok(user)) => user,
        Some(Err(e)) => {
            warn!(error = %e, "Stored user is corrupt, clearing credentials");
            if let Err(e) = ctx.clear() {
                warn!(error = %e, "Failed to clear credentials");
            }
            return AccessDecision::Redirect(Destination::Login);
        }
    };

    match required {
        Some(required) if rank(&user.role) < required.level() => {
            AccessDecision::Redirect(default_destination(&user.role))
        }
        _ => AccessDecision::Allow(user),
    }
}
