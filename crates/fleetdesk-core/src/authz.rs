//! Role-based authorization.
//!
//! `allows` is the only place a role is compared. Views, guards and the
//! console all ask it rather than inspecting the identity themselves.

use crate::auth::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Browse cars, owners and statistics.
    ViewRecords,
    /// Create, edit and delete cars and owners.
    ManageRecords,
    ManageUsers,
    ManageSettings,
    ViewAnalytics,
    /// Open the admin-only pages at all.
    AdminPages,
}

impl Permission {
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Permission::ManageRecords
                | Permission::ManageUsers
                | Permission::ManageSettings
                | Permission::AdminPages
        )
    }

    /// Completes "You do not have permission to ...".
    pub fn action(&self) -> &'static str {
        match self {
            Permission::ViewRecords => "view records",
            Permission::ManageRecords => "modify records",
            Permission::ManageUsers => "manage users",
            Permission::ManageSettings => "change system settings",
            Permission::ViewAnalytics => "view analytics",
            Permission::AdminPages => "open this page",
        }
    }
}

pub fn allows(session: &SessionSnapshot, permission: Permission) -> bool {
    if !session.is_authenticated() {
        return false;
    }
    !permission.requires_admin() || session.is_admin()
}
