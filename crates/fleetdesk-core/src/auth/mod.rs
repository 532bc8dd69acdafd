//! Authentication module for the console session.
//!
//! This module provides:
//! - `SessionManager`: login / register / logout / startup validation
//! - `SessionHandle`: read side of the session, also the HTTP credential source
//! - `TokenStore`: where the bearer token survives restarts (file, keychain, memory)
//!
//! A token only becomes visible once the identity behind it has been fetched,
//! so observers never see a credential without a user.

pub mod credentials;
pub mod session;
pub mod token_store;

pub use credentials::KeyringTokenStore;
pub use session::{SessionHandle, SessionManager, SessionSnapshot};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
