use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{
    CarCreate, CarQuery, CarResponse, CarStatistics, CarUpdate, CarWithOwner, LoginResponse,
    MessageResponse, Owner, OwnerCreate, OwnerQuery, OwnerStatistics, OwnerUpdate,
    StatusResponse, User, UserUpdate,
};

/// Source of the bearer token attached to outgoing requests.
///
/// The client asks on every request, so whatever owns the session is the
/// single place the credential lives.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Provider for unauthenticated clients (CLI status checks, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// The fleet backend, one method per endpoint.
///
/// Each call is exactly one HTTP round trip. Non-2xx responses come back as
/// an `ApiError` inside the `anyhow::Error`.
#[async_trait]
pub trait FleetApi: Send + Sync {
    // ===== Basic =====

    async fn hello(&self) -> Result<String>;
    async fn status(&self) -> Result<StatusResponse>;

    // ===== Cars =====

    async fn list_cars(&self, skip: u32, limit: u32) -> Result<Vec<CarWithOwner>>;
    async fn get_car(&self, id: i64) -> Result<CarWithOwner>;
    async fn create_car(&self, car: &CarCreate) -> Result<CarResponse>;
    async fn update_car(&self, id: i64, car: &CarUpdate) -> Result<CarResponse>;
    async fn delete_car(&self, id: i64) -> Result<MessageResponse>;
    async fn car_statistics(&self) -> Result<CarStatistics>;
    async fn search_cars(&self, query: &CarQuery) -> Result<Vec<CarWithOwner>>;
    async fn search_cars_by_brand(&self, brand: &str) -> Result<Vec<CarWithOwner>>;
    async fn search_cars_by_color(&self, color: &str) -> Result<Vec<CarWithOwner>>;
    async fn search_cars_by_year(&self, year: i32) -> Result<Vec<CarWithOwner>>;
    async fn search_cars_by_price_range(&self, min: f64, max: f64) -> Result<Vec<CarWithOwner>>;
    async fn search_cars_by_owner(&self, owner_id: i64) -> Result<Vec<CarWithOwner>>;

    // ===== Owners =====

    async fn list_owners(&self, skip: u32, limit: u32) -> Result<Vec<Owner>>;
    async fn get_owner(&self, id: i64) -> Result<Owner>;
    async fn create_owner(&self, owner: &OwnerCreate) -> Result<Owner>;
    async fn update_owner(&self, id: i64, owner: &OwnerUpdate) -> Result<Owner>;
    async fn delete_owner(&self, id: i64) -> Result<MessageResponse>;
    async fn owner_statistics(&self) -> Result<Vec<OwnerStatistics>>;
    async fn search_owners_by_term(&self, term: &str) -> Result<Vec<Owner>>;
    async fn search_owners(&self, query: &OwnerQuery) -> Result<Vec<Owner>>;

    // ===== Authentication =====

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;
    async fn register(&self, username: &str, password: &str, confirm_password: &str)
        -> Result<User>;
    async fn register_admin(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User>;
    /// Identity behind `token`, which is sent explicitly rather than pulled
    /// from the provider so a candidate token can be validated before it is
    /// published to the session.
    async fn current_user(&self, token: &str) -> Result<User>;

    // ===== User management (admin) =====

    async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<User>>;
    async fn get_user(&self, id: i64) -> Result<User>;
    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User>;
    async fn delete_user(&self, id: i64) -> Result<MessageResponse>;

    // ===== Analytics =====

    async fn analytics_overview(&self) -> Result<Value>;
    async fn cars_by_year(&self) -> Result<Value>;
    async fn owners_stats(&self) -> Result<Value>;

    // ===== System settings (admin) =====

    async fn settings(&self) -> Result<Value>;
    async fn update_settings(&self, settings: &Value) -> Result<Value>;
    async fn create_backup(&self) -> Result<Value>;
    async fn system_logs(&self, limit: u32) -> Result<Value>;
}
