//! reqwest implementation of the fleet backend contract.
//!
//! Every request and response is traced at debug level; failures at warn.
//! The bearer token is pulled from the `CredentialProvider` when each request
//! is built, so a logout is visible to the very next call.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    CarCreate, CarQuery, CarResponse, CarStatistics, CarUpdate, CarWithOwner, LoginResponse,
    MessageResponse, Owner, OwnerCreate, OwnerQuery, OwnerStatistics, OwnerUpdate,
    RegisterRequest, StatusResponse, User, UserUpdate,
};

use super::{ApiError, CredentialProvider, FleetApi};

// ============================================================================
// Constants
// ============================================================================

/// Backend address used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// API client for the fleet backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("API base URL cannot carry a path: {}", base_url));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer_headers(token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Bearer token contains invalid header characters")?,
            );
        }
        Ok(headers)
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        Self::bearer_headers(self.credentials.bearer_token().as_deref())
    }

    /// Build a request carrying the current session's credential.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        Ok(self.client.request(method, url).headers(self.auth_headers()?))
    }

    /// Build a request that never carries a credential.
    fn anonymous(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        Ok(self.client.request(method, url))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send the request, logging both legs, and return the successful response.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let request = request.build().context("Failed to build request")?;
        let method = request.method().clone();
        let url = request.url().clone();

        debug!(%method, %url, "API request");

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, %url, error = %e, "API request failed");
                return Err(anyhow::Error::from(ApiError::NetworkError(e))
                    .context(format!("Failed to send {} request to {}", method, url)));
            }
        };

        let status = response.status().as_u16();
        debug!(%method, %url, status, "API response");

        Self::check_response(response).await.map_err(|e| {
            warn!(%method, %url, status, error = %e, "API error response");
            e
        })
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let url = response.url().clone();
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.execute(self.request(Method::GET, segments)?).await
    }

    async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        query: &Q,
    ) -> Result<T> {
        self.execute(self.request(Method::GET, segments)?.query(query))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.execute(self.request(Method::POST, segments)?.json(body))
            .await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.execute(self.request(Method::PUT, segments)?.json(body))
            .await
    }

    async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.execute(self.request(Method::DELETE, segments)?).await
    }
}

#[async_trait]
impl FleetApi for ApiClient {
    // ===== Basic =====

    async fn hello(&self) -> Result<String> {
        let response = self.send(self.anonymous(Method::GET, &["hello"])?).await?;
        let text = response
            .text()
            .await
            .context("Failed to read hello response")?;
        // The endpoint answers either a JSON string or plain text
        Ok(serde_json::from_str::<String>(&text).unwrap_or(text))
    }

    async fn status(&self) -> Result<StatusResponse> {
        self.execute(self.anonymous(Method::GET, &["api", "status"])?)
            .await
    }

    // ===== Cars =====

    async fn list_cars(&self, skip: u32, limit: u32) -> Result<Vec<CarWithOwner>> {
        self.get_with_query(&["cars"], &[("skip", skip), ("limit", limit)])
            .await
    }

    async fn get_car(&self, id: i64) -> Result<CarWithOwner> {
        self.get(&["cars", &id.to_string()]).await
    }

    async fn create_car(&self, car: &CarCreate) -> Result<CarResponse> {
        self.post(&["cars"], car).await
    }

    async fn update_car(&self, id: i64, car: &CarUpdate) -> Result<CarResponse> {
        self.put(&["cars", &id.to_string()], car).await
    }

    async fn delete_car(&self, id: i64) -> Result<MessageResponse> {
        self.delete(&["cars", &id.to_string()]).await
    }

    async fn car_statistics(&self) -> Result<CarStatistics> {
        self.get(&["cars", "statistics"]).await
    }

    async fn search_cars(&self, query: &CarQuery) -> Result<Vec<CarWithOwner>> {
        self.post(&["cars", "search"], query).await
    }

    async fn search_cars_by_brand(&self, brand: &str) -> Result<Vec<CarWithOwner>> {
        self.get(&["cars", "search", "brand", brand]).await
    }

    async fn search_cars_by_color(&self, color: &str) -> Result<Vec<CarWithOwner>> {
        self.get(&["cars", "search", "color", color]).await
    }

    async fn search_cars_by_year(&self, year: i32) -> Result<Vec<CarWithOwner>> {
        self.get(&["cars", "search", "year", &year.to_string()])
            .await
    }

    async fn search_cars_by_price_range(&self, min: f64, max: f64) -> Result<Vec<CarWithOwner>> {
        self.get_with_query(
            &["cars", "search", "price-range"],
            &[("min_price", min), ("max_price", max)],
        )
        .await
    }

    async fn search_cars_by_owner(&self, owner_id: i64) -> Result<Vec<CarWithOwner>> {
        self.get(&["cars", "search", "owner", &owner_id.to_string()])
            .await
    }

    // ===== Owners =====

    async fn list_owners(&self, skip: u32, limit: u32) -> Result<Vec<Owner>> {
        self.get_with_query(&["owners"], &[("skip", skip), ("limit", limit)])
            .await
    }

    async fn get_owner(&self, id: i64) -> Result<Owner> {
        self.get(&["owners", &id.to_string()]).await
    }

    async fn create_owner(&self, owner: &OwnerCreate) -> Result<Owner> {
        self.post(&["owners"], owner).await
    }

    async fn update_owner(&self, id: i64, owner: &OwnerUpdate) -> Result<Owner> {
        self.put(&["owners", &id.to_string()], owner).await
    }

    async fn delete_owner(&self, id: i64) -> Result<MessageResponse> {
        self.delete(&["owners", &id.to_string()]).await
    }

    async fn owner_statistics(&self) -> Result<Vec<OwnerStatistics>> {
        self.get(&["owners", "statistics"]).await
    }

    async fn search_owners_by_term(&self, term: &str) -> Result<Vec<Owner>> {
        self.get(&["owners", "search", term]).await
    }

    async fn search_owners(&self, query: &OwnerQuery) -> Result<Vec<Owner>> {
        self.post(&["owners", "search"], query).await
    }

    // ===== Authentication =====

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = serde_json::json!({ "username": username, "password": password });
        self.execute(self.anonymous(Method::POST, &["login"])?.json(&body))
            .await
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User> {
        let body = RegisterRequest {
            username,
            password,
            confirm_password,
        };
        self.post(&["register"], &body).await
    }

    async fn register_admin(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User> {
        let body = RegisterRequest {
            username,
            password,
            confirm_password,
        };
        self.post(&["register", "admin"], &body).await
    }

    async fn current_user(&self, token: &str) -> Result<User> {
        let request = self
            .anonymous(Method::GET, &["users", "me"])?
            .headers(Self::bearer_headers(Some(token))?);
        self.execute(request).await
    }

    // ===== User management =====

    async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<User>> {
        self.get_with_query(&["admin", "users"], &[("skip", skip), ("limit", limit)])
            .await
    }

    async fn get_user(&self, id: i64) -> Result<User> {
        self.get(&["admin", "users", &id.to_string()]).await
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        self.put(&["admin", "users", &id.to_string()], update)
            .await
    }

    async fn delete_user(&self, id: i64) -> Result<MessageResponse> {
        self.delete(&["admin", "users", &id.to_string()]).await
    }

    // ===== Analytics =====

    async fn analytics_overview(&self) -> Result<Value> {
        self.get(&["analytics", "overview"]).await
    }

    async fn cars_by_year(&self) -> Result<Value> {
        self.get(&["analytics", "cars-by-year"]).await
    }

    async fn owners_stats(&self) -> Result<Value> {
        self.get(&["analytics", "owners-stats"]).await
    }

    // ===== System settings =====

    async fn settings(&self) -> Result<Value> {
        self.get(&["settings"]).await
    }

    async fn update_settings(&self, settings: &Value) -> Result<Value> {
        self.put(&["settings"], settings).await
    }

    async fn create_backup(&self) -> Result<Value> {
        self.get(&["settings", "backup"]).await
    }

    async fn system_logs(&self, limit: u32) -> Result<Value> {
        self.get_with_query(&["settings", "logs"], &[("limit", limit)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedToken(Mutex<Option<String>>);

    impl CredentialProvider for FixedToken {
        fn bearer_token(&self) -> Option<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn client_with(base: &str, token: Option<&str>) -> (ApiClient, Arc<FixedToken>) {
        let provider = Arc::new(FixedToken(Mutex::new(token.map(str::to_string))));
        let client = ApiClient::new(base, Duration::from_secs(1), provider.clone())
            .expect("client");
        (client, provider)
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let (client, _) = client_with(DEFAULT_BASE_URL, None);
        let url = client.endpoint(&["cars", "statistics"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/cars/statistics");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let (client, _) = client_with("https://fleet.example.com/api/", None);
        let url = client.endpoint(&["owners", "7"]).unwrap();
        assert_eq!(url.as_str(), "https://fleet.example.com/api/owners/7");
    }

    #[test]
    fn test_endpoint_encodes_search_terms() {
        let (client, _) = client_with(DEFAULT_BASE_URL, None);
        let url = client
            .endpoint(&["cars", "search", "brand", "Land Rover/Range"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/cars/search/brand/Land%20Rover%2FRange"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = ApiClient::new("not a url", Duration::from_secs(1), Arc::new(super::super::NoCredentials));
        assert!(result.is_err());
        let result = ApiClient::new("mailto:ops@example.com", Duration::from_secs(1), Arc::new(super::super::NoCredentials));
        assert!(result.is_err());
    }

    #[test]
    fn test_auth_headers_follow_provider() {
        let (client, provider) = client_with(DEFAULT_BASE_URL, Some("abc123"));
        let headers = client.auth_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc123");

        // Clearing the session is visible to the next request without touching the client
        *provider.0.lock().unwrap() = None;
        let headers = client.auth_headers().unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_request_attaches_current_token() {
        let (client, _) = client_with(DEFAULT_BASE_URL, Some("tok"));
        let request = client
            .request(Method::GET, &["cars"])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer tok");

        let anonymous = client
            .anonymous(Method::POST, &["login"])
            .unwrap()
            .build()
            .unwrap();
        assert!(anonymous.headers().get(header::AUTHORIZATION).is_none());
    }
}
