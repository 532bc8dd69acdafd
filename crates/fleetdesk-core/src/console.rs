//! The console: session, query cache and backend wired together.
//!
//! Views read through the `observe`-style methods (non-blocking, called on
//! every render tick) and write through the mutation methods, which validate,
//! check the role, call the backend and invalidate what changed. Mutations
//! never return raw backend errors; they come back as `ConsoleError`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, FleetApi};
use crate::auth::{SessionHandle, SessionManager, SessionSnapshot, TokenStore};
use crate::authz::{self, Permission};
use crate::cache::{
    BroadcastRefresh, QueryCache, QueryError, QueryKey, QueryObserver, QueryOptions, QueryState,
    RefreshPolicy, RefreshTrigger, Resource,
};
use crate::models::{
    CarQuery, CarResponse, CarStatistics, CarUpdate, CarWithOwner, MessageResponse, Owner,
    OwnerQuery, OwnerStatistics, OwnerUpdate, Role, SortOrder, StatusResponse, User,
};
use crate::validation::{self, CarInput, FieldErrors, OwnerInput, RegisterInput};

/// Page size used for the unpaged owner and user lists.
pub const LIST_LIMIT: u32 = 100;

/// Families touched by any car or owner write.
const RECORD_FAMILIES: [Resource; 5] = [
    Resource::Cars,
    Resource::Owners,
    Resource::CarStatistics,
    Resource::OwnerStatistics,
    Resource::Analytics,
];

#[derive(Debug, Clone, Error)]
pub enum ConsoleError {
    #[error("Please fix the highlighted fields")]
    Validation(FieldErrors),

    #[error("You do not have permission to {0}")]
    PermissionDenied(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Your session has expired, please log in again")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}

impl ConsoleError {
    fn classify(api: Option<&ApiError>, action: &str, fallback: impl FnOnce() -> String) -> Self {
        match api {
            Some(ApiError::AccessDenied(_)) => ConsoleError::PermissionDenied(action.to_string()),
            Some(ApiError::Unauthorized) => ConsoleError::Unauthorized,
            Some(ApiError::NotFound(detail)) => ConsoleError::NotFound(detail.clone()),
            Some(
                ApiError::BadRequest(detail)
                | ApiError::Conflict(detail)
                | ApiError::Unprocessable(detail),
            ) => ConsoleError::Failed(detail.clone()),
            Some(e) if e.is_transient() => ConsoleError::Unavailable(e.to_string()),
            Some(e) => ConsoleError::Failed(e.to_string()),
            None => ConsoleError::Unavailable(fallback()),
        }
    }

    /// Classify a failed backend call made to `action`.
    pub fn from_api(err: &anyhow::Error, action: &str) -> Self {
        Self::classify(ApiError::find(err), action, || format!("{:#}", err))
    }

    /// Classify a failed query for display.
    pub fn from_query(err: &QueryError, action: &str) -> Self {
        match err {
            QueryError::Fetch(_) => Self::classify(err.api_error(), action, || err.to_string()),
            QueryError::TypeMismatch(_) | QueryError::Discarded(_) => {
                ConsoleError::Failed(err.to_string())
            }
        }
    }

    /// Whether offering "try again" makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConsoleError::Unavailable(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::Validation(errors) => match errors.iter().next() {
                Some((_, message)) if errors.len() == 1 => message.to_string(),
                _ => self.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

pub struct Console {
    api: Arc<dyn FleetApi>,
    session: SessionManager,
    cache: QueryCache,
    refresh: Box<dyn RefreshPolicy>,
}

impl Console {
    pub fn new(api: Arc<dyn FleetApi>, session: SessionManager) -> Self {
        Self {
            api,
            session,
            cache: QueryCache::new(),
            refresh: Box::new(BroadcastRefresh::default()),
        }
    }

    /// Build the HTTP client and session around one shared session cell.
    pub fn connect(base_url: &str, timeout: Duration, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let handle = SessionHandle::new();
        let client = ApiClient::new(base_url, timeout, Arc::new(handle.clone()))?;
        let api: Arc<dyn FleetApi> = Arc::new(client);
        let session = SessionManager::new(Arc::clone(&api), tokens, handle);
        Ok(Self::new(api, session))
    }

    pub fn api(&self) -> &Arc<dyn FleetApi> {
        &self.api
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn allows(&self, permission: Permission) -> bool {
        authz::allows(&self.session.snapshot(), permission)
    }

    fn require(&self, permission: Permission) -> Result<(), ConsoleError> {
        if self.allows(permission) {
            Ok(())
        } else {
            Err(ConsoleError::PermissionDenied(permission.action().to_string()))
        }
    }

    // ===== Session =====

    pub async fn initialize(&self) {
        self.session.initialize().await;
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ConsoleError> {
        validation::validate_login(username, password).map_err(ConsoleError::Validation)?;
        if self.session.login(username.trim(), password).await {
            // Nothing cached under the previous identity may leak into the new one
            self.cache.clear();
            Ok(())
        } else {
            Err(ConsoleError::InvalidCredentials)
        }
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<(), ConsoleError> {
        validation::validate_registration(input).map_err(ConsoleError::Validation)?;
        let ok = self
            .session
            .register(input.username.trim(), &input.password, &input.confirm_password)
            .await;
        if ok {
            self.cache.clear();
            Ok(())
        } else {
            Err(ConsoleError::Failed(
                "Registration failed, the username may already be taken".to_string(),
            ))
        }
    }

    pub async fn register_admin(&self, input: &RegisterInput) -> Result<(), ConsoleError> {
        validation::validate_registration(input).map_err(ConsoleError::Validation)?;
        let ok = self
            .session
            .register_admin(input.username.trim(), &input.password, &input.confirm_password)
            .await;
        if ok {
            self.cache.clear();
            Ok(())
        } else {
            Err(ConsoleError::Failed(
                "Administrator registration failed".to_string(),
            ))
        }
    }

    pub fn logout(&self) {
        self.session.logout();
        self.cache.clear();
    }

    /// Route a refresh trigger through the policy. Ignored when logged out.
    pub fn refresh(&self, trigger: RefreshTrigger) {
        if self.session.handle().is_authenticated() {
            self.refresh.on_trigger(trigger, &self.cache);
        }
    }

    pub fn retry(&self, key: &QueryKey) -> bool {
        self.cache.retry(key)
    }

    // ===== Query keys =====

    pub fn cars_key(query: &CarQuery) -> QueryKey {
        QueryKey::with_params(Resource::Cars, &("search", query))
    }

    pub fn car_key(id: i64) -> QueryKey {
        QueryKey::with_params(Resource::Cars, &("detail", id))
    }

    pub fn owners_key(term: &str) -> QueryKey {
        let term = term.trim();
        if term.is_empty() {
            QueryKey::with_params(Resource::Owners, &("list", LIST_LIMIT))
        } else {
            QueryKey::with_params(Resource::Owners, &("search", term))
        }
    }

    pub fn owners_for_form_key() -> QueryKey {
        QueryKey::with_params(Resource::Owners, &"form")
    }

    pub fn car_statistics_key() -> QueryKey {
        QueryKey::new(Resource::CarStatistics)
    }

    pub fn owner_statistics_key() -> QueryKey {
        QueryKey::new(Resource::OwnerStatistics)
    }

    pub fn users_key() -> QueryKey {
        QueryKey::with_params(Resource::Users, &LIST_LIMIT)
    }

    pub fn settings_key() -> QueryKey {
        QueryKey::new(Resource::Settings)
    }

    pub fn logs_key(limit: u32) -> QueryKey {
        QueryKey::with_params(Resource::Settings, &("logs", limit))
    }

    pub fn analytics_key(view: AnalyticsView) -> QueryKey {
        QueryKey::with_params(Resource::Analytics, &view.name())
    }

    pub fn status_key() -> QueryKey {
        QueryKey::new(Resource::Status)
    }

    // ===== Queries (non-blocking) =====

    fn gated<T, F, Fut>(
        &self,
        permission: Permission,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !self.allows(permission) {
            return QueryState::disabled();
        }
        self.cache.observe(key, options, fetcher)
    }

    pub fn cars(
        &self,
        query: &CarQuery,
        observer: &mut QueryObserver<Vec<CarWithOwner>>,
    ) -> QueryState<Vec<CarWithOwner>> {
        if !self.allows(Permission::ViewRecords) {
            return QueryState::disabled();
        }
        let api = Arc::clone(&self.api);
        let params = query.clone();
        observer.observe(
            &self.cache,
            &Self::cars_key(query),
            &QueryOptions::list(),
            move || async move { api.search_cars(&params).await },
        )
    }

    pub fn car(&self, id: i64) -> QueryState<CarWithOwner> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ViewRecords,
            &Self::car_key(id),
            &QueryOptions::default(),
            move || async move { api.get_car(id).await },
        )
    }

    pub fn owners(&self, term: &str, observer: &mut QueryObserver<Vec<Owner>>) -> QueryState<Vec<Owner>> {
        if !self.allows(Permission::ViewRecords) {
            return QueryState::disabled();
        }
        let api = Arc::clone(&self.api);
        let term = term.trim().to_string();
        let key = Self::owners_key(&term);
        observer.observe(&self.cache, &key, &QueryOptions::list(), move || async move {
            if term.is_empty() {
                api.list_owners(0, LIST_LIMIT).await
            } else {
                api.search_owners_by_term(&term).await
            }
        })
    }

    /// Owner picker of the car form and the search filters.
    pub fn owners_for_form(&self) -> QueryState<Vec<Owner>> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ViewRecords,
            &Self::owners_for_form_key(),
            &QueryOptions::reference(),
            move || async move { api.search_owners(&Self::owner_picker_query()).await },
        )
    }

    /// Picker entries are sorted by last name.
    fn owner_picker_query() -> OwnerQuery {
        OwnerQuery {
            sort_by: Some("lastname".to_string()),
            sort_order: Some(SortOrder::Asc),
            limit: Some(LIST_LIMIT),
            ..OwnerQuery::default()
        }
    }

    pub fn car_statistics(&self) -> QueryState<CarStatistics> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ViewRecords,
            &Self::car_statistics_key(),
            &QueryOptions::default(),
            move || async move { api.car_statistics().await },
        )
    }

    pub fn owner_statistics(&self) -> QueryState<Vec<OwnerStatistics>> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ViewRecords,
            &Self::owner_statistics_key(),
            &QueryOptions::default(),
            move || async move { api.owner_statistics().await },
        )
    }

    pub fn users(&self) -> QueryState<Vec<User>> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ManageUsers,
            &Self::users_key(),
            &QueryOptions::default(),
            move || async move { api.list_users(0, LIST_LIMIT).await },
        )
    }

    pub fn settings(&self) -> QueryState<Value> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ManageSettings,
            &Self::settings_key(),
            &QueryOptions::default(),
            move || async move { api.settings().await },
        )
    }

    pub fn system_logs(&self, limit: u32) -> QueryState<Value> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ManageSettings,
            &Self::logs_key(limit),
            &QueryOptions::default(),
            move || async move { api.system_logs(limit).await },
        )
    }

    pub fn analytics(&self, view: AnalyticsView) -> QueryState<Value> {
        let api = Arc::clone(&self.api);
        self.gated(
            Permission::ViewAnalytics,
            &Self::analytics_key(view),
            &QueryOptions::default(),
            move || async move {
                match view {
                    AnalyticsView::Overview => api.analytics_overview().await,
                    AnalyticsView::CarsByYear => api.cars_by_year().await,
                    AnalyticsView::OwnersStats => api.owners_stats().await,
                }
            },
        )
    }

    /// Backend health; needs no session.
    pub fn status(&self) -> QueryState<StatusResponse> {
        let api = Arc::clone(&self.api);
        self.cache.observe(
            &Self::status_key(),
            &QueryOptions::default(),
            move || async move { api.status().await },
        )
    }

    // ===== Queries (awaited) =====

    pub async fn fetch_cars(&self, query: &CarQuery) -> Result<Arc<Vec<CarWithOwner>>, ConsoleError> {
        self.require(Permission::ViewRecords)?;
        let api = Arc::clone(&self.api);
        let params = query.clone();
        self.cache
            .fetch(&Self::cars_key(query), &QueryOptions::list(), move || async move {
                api.search_cars(&params).await
            })
            .await
            .map_err(|e| ConsoleError::from_query(&e, "view cars"))
    }

    pub async fn fetch_owners(&self, term: &str) -> Result<Arc<Vec<Owner>>, ConsoleError> {
        self.require(Permission::ViewRecords)?;
        let api = Arc::clone(&self.api);
        let term = term.trim().to_string();
        let key = Self::owners_key(&term);
        self.cache
            .fetch(&key, &QueryOptions::list(), move || async move {
                if term.is_empty() {
                    api.list_owners(0, LIST_LIMIT).await
                } else {
                    api.search_owners_by_term(&term).await
                }
            })
            .await
            .map_err(|e| ConsoleError::from_query(&e, "view owners"))
    }

    pub async fn fetch_car_statistics(&self) -> Result<Arc<CarStatistics>, ConsoleError> {
        self.require(Permission::ViewRecords)?;
        let api = Arc::clone(&self.api);
        self.cache
            .fetch(&Self::car_statistics_key(), &QueryOptions::default(), move || async move {
                api.car_statistics().await
            })
            .await
            .map_err(|e| ConsoleError::from_query(&e, "view statistics"))
    }

    /// Backend greeting from `GET /hello`. Not cached.
    pub async fn greeting(&self) -> Result<String, ConsoleError> {
        self.api
            .hello()
            .await
            .map_err(|e| ConsoleError::from_api(&e, "reach the server"))
    }

    pub async fn fetch_status(&self) -> Result<Arc<StatusResponse>, ConsoleError> {
        let api = Arc::clone(&self.api);
        self.cache
            .fetch(&Self::status_key(), &QueryOptions::default(), move || async move {
                api.status().await
            })
            .await
            .map_err(|e| ConsoleError::from_query(&e, "check the server"))
    }

    // ===== Mutations =====

    async fn mutation<T, Fut>(
        &self,
        permission: Permission,
        action: &str,
        request: Fut,
    ) -> Result<T, ConsoleError>
    where
        Fut: Future<Output = Result<T>>,
    {
        match self.cache.mutate(action, request).await {
            Ok(value) => Ok(value),
            Err(e) => {
                let error = ConsoleError::from_api(&e, action);
                match &error {
                    ConsoleError::Unauthorized => {
                        warn!(action, "Backend rejected the session");
                        self.logout();
                    }
                    ConsoleError::PermissionDenied(_) => {
                        warn!(action, ?permission, "Backend denied the operation");
                    }
                    _ => {}
                }
                Err(error)
            }
        }
    }

    fn records_changed(&self) {
        for family in RECORD_FAMILIES {
            self.cache.invalidate(family);
        }
    }

    pub async fn create_car(&self, input: &CarInput) -> Result<CarResponse, ConsoleError> {
        self.require(Permission::ManageRecords)?;
        let car = validation::validate_car(input).map_err(ConsoleError::Validation)?;
        let created = self
            .mutation(Permission::ManageRecords, "create cars", self.api.create_car(&car))
            .await?;
        info!(id = created.id, "Created car");
        self.records_changed();
        Ok(created)
    }

    pub async fn update_car(&self, id: i64, input: &CarInput) -> Result<CarResponse, ConsoleError> {
        self.require(Permission::ManageRecords)?;
        let car = validation::validate_car(input).map_err(ConsoleError::Validation)?;
        let update = CarUpdate::from(car);
        let updated = self
            .mutation(Permission::ManageRecords, "edit cars", self.api.update_car(id, &update))
            .await?;
        info!(id, "Updated car");
        self.records_changed();
        Ok(updated)
    }

    pub async fn delete_car(&self, id: i64) -> Result<MessageResponse, ConsoleError> {
        self.require(Permission::ManageRecords)?;
        let response = self
            .mutation(Permission::ManageRecords, "delete cars", self.api.delete_car(id))
            .await?;
        info!(id, "Deleted car");
        self.records_changed();
        Ok(response)
    }

    pub async fn create_owner(&self, input: &OwnerInput) -> Result<Owner, ConsoleError> {
        self.require(Permission::ManageRecords)?;
        let owner = validation::validate_owner(input).map_err(ConsoleError::Validation)?;
        let created = self
            .mutation(Permission::ManageRecords, "create owners", self.api.create_owner(&owner))
            .await?;
        info!(id = created.ownerid, "Created owner");
        self.records_changed();
        Ok(created)
    }

    pub async fn update_owner(&self, id: i64, input: &OwnerInput) -> Result<Owner, ConsoleError> {
        self.require(Permission::ManageRecords)?;
        let owner = validation::validate_owner(input).map_err(ConsoleError::Validation)?;
        let update = OwnerUpdate::from(owner);
        let updated = self
            .mutation(Permission::ManageRecords, "edit owners", self.api.update_owner(id, &update))
            .await?;
        info!(id, "Updated owner");
        self.records_changed();
        Ok(updated)
    }

    /// Deleting an owner removes their cars too.
    pub async fn delete_owner(&self, id: i64) -> Result<MessageResponse, ConsoleError> {
        self.require(Permission::ManageRecords)?;
        let response = self
            .mutation(Permission::ManageRecords, "delete owners", self.api.delete_owner(id))
            .await?;
        info!(id, "Deleted owner");
        self.records_changed();
        Ok(response)
    }

    pub async fn update_user(&self, id: i64, username: &str, role: Role) -> Result<User, ConsoleError> {
        self.require(Permission::ManageUsers)?;
        let update =
            validation::validate_user_update(username, role).map_err(ConsoleError::Validation)?;
        let updated = self
            .mutation(Permission::ManageUsers, "edit users", self.api.update_user(id, &update))
            .await?;
        info!(id, role = %updated.role, "Updated user");
        self.cache.invalidate(Resource::Users);
        Ok(updated)
    }

    pub async fn delete_user(&self, id: i64) -> Result<MessageResponse, ConsoleError> {
        self.require(Permission::ManageUsers)?;
        if self.snapshot().identity.is_some_and(|me| me.id == id) {
            return Err(ConsoleError::Failed(
                "You cannot delete your own account".to_string(),
            ));
        }
        let response = self
            .mutation(Permission::ManageUsers, "delete users", self.api.delete_user(id))
            .await?;
        info!(id, "Deleted user");
        self.cache.invalidate(Resource::Users);
        Ok(response)
    }

    pub async fn update_settings(&self, settings: &Value) -> Result<Value, ConsoleError> {
        self.require(Permission::ManageSettings)?;
        let saved = self
            .mutation(
                Permission::ManageSettings,
                "change system settings",
                self.api.update_settings(settings),
            )
            .await?;
        info!("Updated system settings");
        self.cache.invalidate(Resource::Settings);
        Ok(saved)
    }

    pub async fn create_backup(&self) -> Result<Value, ConsoleError> {
        self.require(Permission::ManageSettings)?;
        let backup = self
            .mutation(Permission::ManageSettings, "create backups", self.api.create_backup())
            .await?;
        info!("Created backup");
        Ok(backup)
    }
}

/// The three analytics payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsView {
    Overview,
    CarsByYear,
    OwnersStats,
}

impl AnalyticsView {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsView::Overview => "overview",
            AnalyticsView::CarsByYear => "cars-by-year",
            AnalyticsView::OwnersStats => "owners-stats",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::testing::FakeBackend;

    async fn console_as(user: Option<(&str, &str)>) -> (Arc<FakeBackend>, Console) {
        let backend = Arc::new(FakeBackend::new());
        let session = SessionManager::new(
            backend.clone(),
            Arc::new(MemoryTokenStore::new()),
            SessionHandle::new(),
        );
        let console = Console::new(backend.clone(), session);
        console.initialize().await;
        if let Some((username, password)) = user {
            console.login(username, password).await.unwrap();
        }
        (backend, console)
    }

    fn toyota(owner_id: i64) -> CarInput {
        CarInput {
            brand: "Toyota".into(),
            model: "Corolla".into(),
            color: "red".into(),
            registration_number: "001AAA01".into(),
            model_year: "2022".into(),
            price: "8000000".into(),
            owner_id: Some(owner_id),
        }
    }

    #[tokio::test]
    async fn test_created_car_appears_in_next_read() {
        let (_backend, console) = console_as(Some(("admin", "admin123"))).await;
        let query = CarQuery::default();
        assert_eq!(console.fetch_cars(&query).await.unwrap().len(), 3);

        let created = console.create_car(&toyota(2)).await.unwrap();
        let cars = console.fetch_cars(&query).await.unwrap();
        assert_eq!(cars.len(), 4);
        assert!(cars.iter().any(|c| c.id == created.id && c.model == "Corolla"));
    }

    #[tokio::test]
    async fn test_updated_owner_appears_in_next_read() {
        let (_backend, console) = console_as(Some(("admin", "admin123"))).await;
        console.fetch_owners("").await.unwrap();

        console
            .update_owner(
                2,
                &OwnerInput {
                    firstname: "Ivan".into(),
                    lastname: "Sidorov".into(),
                },
            )
            .await
            .unwrap();
        let owners = console.fetch_owners("").await.unwrap();
        assert!(owners.iter().any(|o| o.ownerid == 2 && o.lastname == "Sidorov"));
    }

    #[tokio::test]
    async fn test_deleting_owner_removes_their_cars() {
        let (backend, console) = console_as(Some(("admin", "admin123"))).await;
        let query = CarQuery::default();
        let before = console.fetch_cars(&query).await.unwrap();
        assert_eq!(before.iter().filter(|c| c.owner_id == 1).count(), 2);
        console.fetch_owners("").await.unwrap();
        console.fetch_car_statistics().await.unwrap();

        console.delete_owner(1).await.unwrap();

        let owners = console.fetch_owners("").await.unwrap();
        assert!(owners.iter().all(|o| o.ownerid != 1));
        let cars = console.fetch_cars(&query).await.unwrap();
        assert!(cars.iter().all(|c| c.owner_id != 1));
        assert_eq!(console.fetch_car_statistics().await.unwrap().total_cars, 1);
        assert_eq!(backend.car_ids(), vec![12]);
    }

    #[tokio::test]
    async fn test_negative_price_sends_nothing() {
        let (backend, console) = console_as(Some(("admin", "admin123"))).await;
        let before = backend.total_calls();

        let err = console
            .create_car(&CarInput {
                price: "-5".into(),
                ..toyota(1)
            })
            .await
            .unwrap_err();
        match err {
            ConsoleError::Validation(errors) => {
                assert_eq!(errors.get(validation::field::PRICE), Some("Price cannot be negative"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(backend.total_calls(), before);
    }

    #[tokio::test]
    async fn test_user_role_cannot_write() {
        let (backend, console) = console_as(Some(("alice", "secret1"))).await;
        let err = console.create_car(&toyota(1)).await.unwrap_err();
        assert!(matches!(err, ConsoleError::PermissionDenied(_)));
        assert_eq!(err.to_string(), "You do not have permission to modify records");
        assert_eq!(backend.call_count("create_car"), 0);

        assert!(matches!(
            console.delete_user(1).await,
            Err(ConsoleError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_forbidden_is_permission_denied() {
        let (backend, console) = console_as(Some(("admin", "admin123"))).await;
        let cars = console.fetch_cars(&CarQuery::default()).await.unwrap();
        backend.fail("delete_car", 403);

        let err = console.delete_car(10).await.unwrap_err();
        assert_eq!(err.to_string(), "You do not have permission to delete cars");
        // List data is unchanged and the session survives
        assert_eq!(console.fetch_cars(&CarQuery::default()).await.unwrap(), cars);
        assert!(console.snapshot().is_admin());
    }

    #[tokio::test]
    async fn test_unauthorized_mutation_ends_session() {
        let (backend, console) = console_as(Some(("admin", "admin123"))).await;
        backend.fail("update_settings", 401);

        let err = console
            .update_settings(&serde_json::json!({ "maintenance_mode": true }))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Unauthorized));
        assert!(!console.snapshot().is_authenticated());
        assert!(console.cache().is_empty());
    }

    #[tokio::test]
    async fn test_offline_is_retryable() {
        let (backend, console) = console_as(Some(("alice", "secret1"))).await;
        backend.set_offline(true);
        let err = console.fetch_cars(&CarQuery::default()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, ConsoleError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_queries_are_gated_by_session() {
        let (backend, console) = console_as(None).await;
        let mut observer = QueryObserver::new();

        let cars = console.cars(&CarQuery::default(), &mut observer);
        assert!(cars.data.is_none());
        assert!(!cars.is_fetching);
        assert!(console.users().data.is_none());
        assert!(matches!(
            console.fetch_cars(&CarQuery::default()).await,
            Err(ConsoleError::PermissionDenied(_))
        ));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_queries_disabled_for_users() {
        let (backend, console) = console_as(Some(("alice", "secret1"))).await;
        let calls = backend.total_calls();
        assert!(!console.users().is_fetching);
        assert!(!console.settings().is_fetching);
        assert_eq!(backend.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_logout_clears_cache() {
        let (_backend, console) = console_as(Some(("admin", "admin123"))).await;
        console.fetch_cars(&CarQuery::default()).await.unwrap();
        assert!(!console.cache().is_empty());

        let generation = console.cache().generation();
        console.logout();
        assert!(console.cache().is_empty());
        assert!(console.cache().generation() > generation);
        assert!(!console.snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn test_login_errors() {
        let (backend, console) = console_as(None).await;
        assert!(matches!(
            console.login("", "").await,
            Err(ConsoleError::Validation(_))
        ));
        assert_eq!(backend.total_calls(), 0);
        let err = console.login("alice", "nope").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid username or password");
    }

    #[tokio::test]
    async fn test_register_mismatch_sends_nothing() {
        let (backend, console) = console_as(None).await;
        let err = console
            .register(&RegisterInput {
                username: "bob".into(),
                password: "secret9".into(),
                confirm_password: "secret0".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Passwords do not match");
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let (backend, console) = console_as(Some(("admin", "admin123"))).await;
        assert!(matches!(
            console.delete_user(1).await,
            Err(ConsoleError::Failed(_))
        ));
        assert_eq!(backend.call_count("delete_user"), 0);
        console.delete_user(2).await.unwrap();
    }

    /// Reads the users list the way a view does: observe, let the fetch land, observe again.
    async fn read_users(console: &Console) -> Arc<Vec<User>> {
        console.users();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let state = console.users();
        assert!(state.error.is_none());
        state.data.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_update_invalidates_users() {
        let (backend, console) = console_as(Some(("admin", "admin123"))).await;
        let before = read_users(&console).await;
        let alice = before.iter().find(|u| u.id == 2).unwrap();
        assert_eq!(alice.role, Role::User);
        let calls = backend.call_count("list_users");

        let updated = console.update_user(2, "alice", Role::Admin).await.unwrap();
        assert_eq!(updated.role, Role::Admin);

        let after = read_users(&console).await;
        let alice = after.iter().find(|u| u.id == 2).unwrap();
        assert_eq!(alice.role, Role::Admin);
        assert!(backend.call_count("list_users") > calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_delete_invalidates_users() {
        let (backend, console) = console_as(Some(("admin", "admin123"))).await;
        let before = read_users(&console).await;
        assert!(before.iter().any(|u| u.id == 2));
        let calls = backend.call_count("list_users");

        console.delete_user(2).await.unwrap();

        let after = read_users(&console).await;
        assert!(after.iter().all(|u| u.id != 2));
        assert_eq!(after.len(), before.len() - 1);
        assert!(backend.call_count("list_users") > calls);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_cache_and_session() {
        let (_backend, console) = console_as(Some(("admin", "admin123"))).await;
        console.fetch_cars(&CarQuery::default()).await.unwrap();
        let cached = console.cache().len();
        assert!(cached > 0);

        let err = console.login("admin", "wrong-password").await.unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidCredentials));
        assert_eq!(console.cache().len(), cached);
        assert!(console.session().snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn test_greeting_is_public() {
        let (backend, console) = console_as(None).await;
        assert_eq!(console.greeting().await.unwrap(), "Hello, fleet!");
        assert_eq!(backend.call_count("hello"), 1);

        backend.set_offline(true);
        let err = console.greeting().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_owner_picker_sorted_by_last_name() {
        let (backend, console) = console_as(Some(("alice", "secret1"))).await;
        console.owners_for_form();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let owners = console.owners_for_form().data.unwrap();
        let last_names: Vec<&str> = owners.iter().map(|o| o.lastname.as_str()).collect();
        assert_eq!(last_names, vec!["Petrov", "Sadykova"]);
        assert_eq!(backend.call_count("search_owners"), 1);
        assert_eq!(backend.call_count("list_owners"), 0);
    }

    #[tokio::test]
    async fn test_refresh_ignored_when_logged_out() {
        let (_backend, console) = console_as(None).await;
        console.fetch_status().await.unwrap();
        console.refresh(RefreshTrigger::Interval);
        assert_eq!(console.cache().len(), 1);
    }
}
