//! Data models for fleet records.
//!
//! These mirror the JSON shapes served by the fleet backend:
//!
//! - `CarWithOwner`, `CarCreate`, `CarUpdate`: vehicle records
//! - `Owner`, `OwnerCreate`, `OwnerUpdate`: owner records with their cars
//! - `CarQuery`, `OwnerQuery`: search parameters
//! - `User`, `Role`: accounts and the identity returned by `/users/me`
//! - Statistics and status payloads for the dashboard

pub mod car;
pub mod owner;
pub mod stats;
pub mod user;

pub use car::{CarCreate, CarQuery, CarResponse, CarSortColumn, CarUpdate, CarWithOwner, SortOrder};
pub use owner::{CarForOwner, Owner, OwnerCreate, OwnerQuery, OwnerUpdate};
pub use stats::{CarStatistics, CarsByYear, MessageResponse, OwnerStatistics, PricedCar, StatusResponse};
pub use user::{LoginResponse, RegisterRequest, Role, User, UserUpdate};
