//! Route guard: decides whether a protected view may render.

use crate::auth::SessionSnapshot;
use crate::authz::{self, Permission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    NotAdmin,
}

impl DenyReason {
    pub fn title(&self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "Access denied",
            DenyReason::NotAdmin => "Insufficient permissions",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "You need to log in to view this page",
            DenyReason::NotAdmin => "This page requires administrator rights",
        }
    }

    /// Label of the navigation action offered by the default denied view.
    pub fn action_label(&self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "Log in",
            DenyReason::NotAdmin => "Go to dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still validating; render a spinner and nothing else.
    Loading,
    Denied(DenyReason),
    Allowed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteGuard {
    pub require_admin: bool,
}

impl RouteGuard {
    pub const AUTHENTICATED: RouteGuard = RouteGuard {
        require_admin: false,
    };
    pub const ADMIN: RouteGuard = RouteGuard {
        require_admin: true,
    };

    /// Evaluated on every render; holds no state of its own.
    pub fn evaluate(&self, session: &SessionSnapshot) -> GuardDecision {
        if session.is_loading {
            return GuardDecision::Loading;
        }
        if !authz::allows(session, Permission::ViewRecords) {
            return GuardDecision::Denied(DenyReason::NotAuthenticated);
        }
        if self.require_admin && !authz::allows(session, Permission::AdminPages) {
            return GuardDecision::Denied(DenyReason::NotAdmin);
        }
        GuardDecision::Allowed
    }
}
