//! REST API client module for the fleet records service.
//!
//! This module provides:
//! - `FleetApi`: the backend contract, one method per endpoint
//! - `ApiClient`: the reqwest implementation of that contract
//! - `CredentialProvider`: where the client pulls the bearer token from
//! - `ApiError`: HTTP failures classified by status
//!
//! The backend issues bearer tokens from `POST /login`; every other call
//! carries `Authorization: Bearer <token>` when a session exists.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{CredentialProvider, FleetApi, NoCredentials};
pub use client::ApiClient;
pub use error::ApiError;
