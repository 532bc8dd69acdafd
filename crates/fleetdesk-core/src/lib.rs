//! fleetdesk-core: the client side of the fleet records console.
//!
//! Holds the backend API client, domain models, the authenticated session,
//! the query cache and the role checks. Front ends (the terminal UI) build
//! on [`console::Console`], which wires these together.

pub mod api;
pub mod auth;
pub mod authz;
pub mod cache;
pub mod console;
pub mod guard;
pub mod models;
pub mod store;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use api::{ApiClient, ApiError, CredentialProvider, FleetApi};
pub use auth::{SessionHandle, SessionManager, SessionSnapshot, TokenStore};
pub use authz::Permission;
pub use cache::{QueryCache, QueryKey, QueryObserver, QueryOptions, QueryState, Resource};
pub use console::{AnalyticsView, Console, ConsoleError};
pub use guard::{DenyReason, GuardDecision, RouteGuard};
