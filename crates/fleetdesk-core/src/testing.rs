//! In-memory fleet backend for unit tests.
//!
//! Behaves like the real service for the parts the console depends on:
//! token issuance, `/users/me`, CRUD with owner cascade, statistics. Every
//! call is recorded by endpoint name so tests can assert on network traffic.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiError, FleetApi};
use crate::models::{
    CarCreate, CarForOwner, CarQuery, CarResponse, CarStatistics, CarUpdate, CarWithOwner,
    LoginResponse, MessageResponse, Owner, OwnerCreate, OwnerQuery, OwnerStatistics, OwnerUpdate,
    PricedCar, Role, SortOrder, StatusResponse, User, UserUpdate,
};

struct FakeState {
    users: Vec<(User, String)>,
    tokens: HashMap<String, i64>,
    cars: Vec<CarResponse>,
    owners: Vec<(i64, String, String)>,
    settings: Value,
    next_id: i64,
    token_seq: u64,
    failures: HashMap<&'static str, u16>,
    offline: bool,
}

pub struct FakeBackend {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<&'static str>>,
    delay: Mutex<Duration>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// Seeded with `admin`/`admin123` (ADMIN), `alice`/`secret1` (USER),
    /// two owners and three cars. Owner 1 has two cars.
    pub fn new() -> Self {
        let owners = vec![
            (1, "Aigerim".to_string(), "Sadykova".to_string()),
            (2, "Ivan".to_string(), "Petrov".to_string()),
        ];
        let cars = vec![
            car(10, "Toyota", "Camry", 2019, 9_500_000.0, 1),
            car(11, "Lada", "Vesta", 2021, 4_200_000.0, 1),
            car(12, "Kia", "Rio", 2018, 5_100_000.0, 2),
        ];
        Self {
            state: Mutex::new(FakeState {
                users: vec![
                    (user(1, "admin", Role::Admin), "admin123".into()),
                    (user(2, "alice", Role::User), "secret1".into()),
                ],
                tokens: HashMap::new(),
                cars,
                owners,
                settings: json!({
                    "system_name": "Fleet Records",
                    "admin_email": "admin@example.com",
                    "maintenance_mode": false,
                }),
                next_id: 100,
                token_seq: 0,
                failures: HashMap::new(),
                offline: false,
            }),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Mint a valid token for an existing user without recording a call.
    pub fn issue_token(&self, username: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state
            .users
            .iter()
            .find(|(u, _)| u.username == username)
            .map(|(u, _)| u.id)
            .expect("unknown user");
        state.token_seq += 1;
        let token = format!("token-{}-{}", username, state.token_seq);
        state.tokens.insert(token.clone(), id);
        token
    }

    pub fn revoke_tokens(&self) {
        self.state.lock().unwrap().tokens.clear();
    }

    /// Every later call to `endpoint` fails with `status`.
    pub fn fail(&self, endpoint: &'static str, status: u16) {
        self.state.lock().unwrap().failures.insert(endpoint, status);
    }

    pub fn recover(&self, endpoint: &'static str) {
        self.state.lock().unwrap().failures.remove(endpoint);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Simulated latency applied to every call (virtual time under `start_paused`).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == endpoint).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn car_ids(&self) -> Vec<i64> {
        self.state.lock().unwrap().cars.iter().map(|c| c.id).collect()
    }

    async fn enter(&self, endpoint: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(endpoint);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(ApiError::ServerError("connection refused".into()).into());
        }
        if let Some(status) = state.failures.get(endpoint) {
            let status = reqwest::StatusCode::from_u16(*status).expect("status code");
            return Err(ApiError::from_status(status, r#"{"detail": "injected failure"}"#).into());
        }
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }
}

fn user(id: i64, username: &str, role: Role) -> User {
    User {
        id,
        username: username.to_string(),
        role,
    }
}

fn car(id: i64, brand: &str, model: &str, year: i32, price: f64, owner_id: i64) -> CarResponse {
    CarResponse {
        id,
        brand: brand.to_string(),
        model: model.to_string(),
        color: "white".to_string(),
        registration_number: format!("{}ABC02", id),
        model_year: year,
        price,
        owner_id,
    }
}

fn not_found(what: &str) -> anyhow::Error {
    ApiError::NotFound(format!("{} not found", what)).into()
}

impl FakeState {
    fn joined(&self, car: &CarResponse) -> CarWithOwner {
        let owner = self.owners.iter().find(|(id, _, _)| *id == car.owner_id);
        CarWithOwner {
            id: car.id,
            brand: car.brand.clone(),
            model: car.model.clone(),
            color: car.color.clone(),
            registration_number: car.registration_number.clone(),
            model_year: car.model_year,
            price: car.price,
            owner_id: car.owner_id,
            owner: owner.map(|(_, f, l)| format!("{} {}", f, l)),
            owner_firstname: owner.map(|(_, f, _)| f.clone()),
            owner_lastname: owner.map(|(_, _, l)| l.clone()),
        }
    }

    fn owner(&self, id: i64) -> Option<Owner> {
        self.owners
            .iter()
            .find(|(oid, _, _)| *oid == id)
            .map(|(oid, first, last)| Owner {
                ownerid: *oid,
                firstname: first.clone(),
                lastname: last.clone(),
                cars: self
                    .cars
                    .iter()
                    .filter(|c| c.owner_id == *oid)
                    .map(|c| CarForOwner {
                        id: c.id,
                        brand: c.brand.clone(),
                        model: c.model.clone(),
                        color: c.color.clone(),
                        registration_number: c.registration_number.clone(),
                        model_year: c.model_year,
                        price: c.price,
                        owner_id: c.owner_id,
                    })
                    .collect(),
            })
    }

    fn all_owners(&self) -> Vec<Owner> {
        self.owners
            .iter()
            .filter_map(|(id, _, _)| self.owner(*id))
            .collect()
    }

    fn filter_cars(&self, keep: impl Fn(&CarResponse) -> bool) -> Vec<CarWithOwner> {
        self.cars.iter().filter(|c| keep(c)).map(|c| self.joined(c)).collect()
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[async_trait]
impl FleetApi for FakeBackend {
    async fn hello(&self) -> Result<String> {
        self.enter("hello").await?;
        Ok("Hello, fleet!".to_string())
    }

    async fn status(&self) -> Result<StatusResponse> {
        self.enter("status").await?;
        Ok(StatusResponse {
            status: "ok".into(),
            app: "fleet-records".into(),
            version: "1.0.0".into(),
            timestamp: "2026-01-01T00:00:00".into(),
        })
    }

    async fn list_cars(&self, skip: u32, limit: u32) -> Result<Vec<CarWithOwner>> {
        self.enter("list_cars").await?;
        self.with_state(|s| {
            Ok(s.filter_cars(|_| true)
                .into_iter()
                .skip(skip as usize)
                .take(limit as usize)
                .collect())
        })
    }

    async fn get_car(&self, id: i64) -> Result<CarWithOwner> {
        self.enter("get_car").await?;
        self.with_state(|s| {
            s.filter_cars(|c| c.id == id)
                .into_iter()
                .next()
                .ok_or_else(|| not_found("Car"))
        })
    }

    async fn create_car(&self, car: &CarCreate) -> Result<CarResponse> {
        self.enter("create_car").await?;
        self.with_state(|s| {
            if s.owner(car.owner_id).is_none() {
                return Err(not_found("Owner"));
            }
            let created = CarResponse {
                id: s.next_id(),
                brand: car.brand.clone(),
                model: car.model.clone(),
                color: car.color.clone(),
                registration_number: car.registration_number.clone(),
                model_year: car.model_year,
                price: car.price,
                owner_id: car.owner_id,
            };
            s.cars.push(created.clone());
            Ok(created)
        })
    }

    async fn update_car(&self, id: i64, update: &CarUpdate) -> Result<CarResponse> {
        self.enter("update_car").await?;
        self.with_state(|s| {
            let car = s
                .cars
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| not_found("Car"))?;
            if let Some(v) = &update.brand {
                car.brand = v.clone();
            }
            if let Some(v) = &update.model {
                car.model = v.clone();
            }
            if let Some(v) = &update.color {
                car.color = v.clone();
            }
            if let Some(v) = &update.registration_number {
                car.registration_number = v.clone();
            }
            if let Some(v) = update.model_year {
                car.model_year = v;
            }
            if let Some(v) = update.price {
                car.price = v;
            }
            if let Some(v) = update.owner_id {
                car.owner_id = v;
            }
            Ok(car.clone())
        })
    }

    async fn delete_car(&self, id: i64) -> Result<MessageResponse> {
        self.enter("delete_car").await?;
        self.with_state(|s| {
            let before = s.cars.len();
            s.cars.retain(|c| c.id != id);
            if s.cars.len() == before {
                return Err(not_found("Car"));
            }
            Ok(MessageResponse {
                message: format!("Car {} deleted", id),
                success: true,
            })
        })
    }

    async fn car_statistics(&self) -> Result<CarStatistics> {
        self.enter("car_statistics").await?;
        self.with_state(|s| {
            let priced = |c: &CarResponse| PricedCar {
                id: c.id,
                brand: c.brand.clone(),
                model: c.model.clone(),
                price: c.price,
            };
            let total = s.cars.len();
            let average = if total == 0 {
                0.0
            } else {
                s.cars.iter().map(|c| c.price).sum::<f64>() / total as f64
            };
            Ok(CarStatistics {
                total_cars: total as i64,
                total_owners: s.owners.len() as i64,
                average_price: average,
                most_expensive: s
                    .cars
                    .iter()
                    .max_by(|a, b| a.price.total_cmp(&b.price))
                    .map(priced),
                cheapest: s
                    .cars
                    .iter()
                    .min_by(|a, b| a.price.total_cmp(&b.price))
                    .map(priced),
            })
        })
    }

    async fn search_cars(&self, query: &CarQuery) -> Result<Vec<CarWithOwner>> {
        self.enter("search_cars").await?;
        self.with_state(|s| {
            let brand = query.brand.as_deref().map(str::to_lowercase);
            let color = query.color.as_deref().map(str::to_lowercase);
            Ok(s.filter_cars(|c| {
                brand
                    .as_deref()
                    .map_or(true, |b| c.brand.to_lowercase().contains(b))
                    && color
                        .as_deref()
                        .map_or(true, |col| c.color.to_lowercase().contains(col))
                    && query.model_year.map_or(true, |y| c.model_year == y)
                    && query.min_price.map_or(true, |p| c.price >= p)
                    && query.max_price.map_or(true, |p| c.price <= p)
                    && query.owner_id.map_or(true, |o| c.owner_id == o)
            })
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
        })
    }

    async fn search_cars_by_brand(&self, brand: &str) -> Result<Vec<CarWithOwner>> {
        self.enter("search_cars_by_brand").await?;
        self.with_state(|s| Ok(s.filter_cars(|c| c.brand.eq_ignore_ascii_case(brand))))
    }

    async fn search_cars_by_color(&self, color: &str) -> Result<Vec<CarWithOwner>> {
        self.enter("search_cars_by_color").await?;
        self.with_state(|s| Ok(s.filter_cars(|c| c.color.eq_ignore_ascii_case(color))))
    }

    async fn search_cars_by_year(&self, year: i32) -> Result<Vec<CarWithOwner>> {
        self.enter("search_cars_by_year").await?;
        self.with_state(|s| Ok(s.filter_cars(|c| c.model_year == year)))
    }

    async fn search_cars_by_price_range(&self, min: f64, max: f64) -> Result<Vec<CarWithOwner>> {
        self.enter("search_cars_by_price_range").await?;
        self.with_state(|s| Ok(s.filter_cars(|c| c.price >= min && c.price <= max)))
    }

    async fn search_cars_by_owner(&self, owner_id: i64) -> Result<Vec<CarWithOwner>> {
        self.enter("search_cars_by_owner").await?;
        self.with_state(|s| Ok(s.filter_cars(|c| c.owner_id == owner_id)))
    }

    async fn list_owners(&self, skip: u32, limit: u32) -> Result<Vec<Owner>> {
        self.enter("list_owners").await?;
        self.with_state(|s| {
            Ok(s.all_owners()
                .into_iter()
                .skip(skip as usize)
                .take(limit as usize)
                .collect())
        })
    }

    async fn get_owner(&self, id: i64) -> Result<Owner> {
        self.enter("get_owner").await?;
        self.with_state(|s| s.owner(id).ok_or_else(|| not_found("Owner")))
    }

    async fn create_owner(&self, owner: &OwnerCreate) -> Result<Owner> {
        self.enter("create_owner").await?;
        self.with_state(|s| {
            let id = s.next_id();
            s.owners
                .push((id, owner.firstname.clone(), owner.lastname.clone()));
            s.owner(id).ok_or_else(|| not_found("Owner"))
        })
    }

    async fn update_owner(&self, id: i64, update: &OwnerUpdate) -> Result<Owner> {
        self.enter("update_owner").await?;
        self.with_state(|s| {
            let entry = s
                .owners
                .iter_mut()
                .find(|(oid, _, _)| *oid == id)
                .ok_or_else(|| not_found("Owner"))?;
            if let Some(first) = &update.firstname {
                entry.1 = first.clone();
            }
            if let Some(last) = &update.lastname {
                entry.2 = last.clone();
            }
            s.owner(id).ok_or_else(|| not_found("Owner"))
        })
    }

    async fn delete_owner(&self, id: i64) -> Result<MessageResponse> {
        self.enter("delete_owner").await?;
        self.with_state(|s| {
            let before = s.owners.len();
            s.owners.retain(|(oid, _, _)| *oid != id);
            if s.owners.len() == before {
                return Err(not_found("Owner"));
            }
            // Cars cascade with their owner
            s.cars.retain(|c| c.owner_id != id);
            Ok(MessageResponse {
                message: format!("Owner {} deleted", id),
                success: true,
            })
        })
    }

    async fn owner_statistics(&self) -> Result<Vec<OwnerStatistics>> {
        self.enter("owner_statistics").await?;
        self.with_state(|s| {
            Ok(s.all_owners()
                .into_iter()
                .map(|o| OwnerStatistics {
                    ownerid: o.ownerid,
                    car_count: o.cars.len() as i64,
                    firstname: o.firstname,
                    lastname: o.lastname,
                })
                .collect())
        })
    }

    async fn search_owners_by_term(&self, term: &str) -> Result<Vec<Owner>> {
        self.enter("search_owners_by_term").await?;
        let term = term.to_lowercase();
        self.with_state(|s| {
            Ok(s.all_owners()
                .into_iter()
                .filter(|o| o.full_name().to_lowercase().contains(&term))
                .collect())
        })
    }

    async fn search_owners(&self, query: &OwnerQuery) -> Result<Vec<Owner>> {
        self.enter("search_owners").await?;
        let term = query.search.as_deref().unwrap_or("").to_lowercase();
        self.with_state(|s| {
            let mut owners: Vec<Owner> = s
                .all_owners()
                .into_iter()
                .filter(|o| o.full_name().to_lowercase().contains(&term))
                .collect();
            match query.sort_by.as_deref() {
                Some("lastname") => owners.sort_by(|a, b| a.lastname.cmp(&b.lastname)),
                Some("firstname") => owners.sort_by(|a, b| a.firstname.cmp(&b.firstname)),
                _ => {}
            }
            if query.sort_order == Some(SortOrder::Desc) {
                owners.reverse();
            }
            Ok(owners
                .into_iter()
                .skip(query.offset.unwrap_or(0) as usize)
                .take(query.limit.map_or(usize::MAX, |l| l as usize))
                .collect())
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        self.enter("login").await?;
        let known = self.with_state(|s| {
            Ok(s.users
                .iter()
                .any(|(u, p)| u.username == username && p == password))
        })?;
        if !known {
            return Err(ApiError::Unauthorized.into());
        }
        Ok(LoginResponse {
            access_token: self.issue_token(username),
            token_type: "bearer".into(),
        })
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
        _confirm_password: &str,
    ) -> Result<User> {
        self.enter("register").await?;
        self.add_user(username, password, Role::User)
    }

    async fn register_admin(
        &self,
        username: &str,
        password: &str,
        _confirm_password: &str,
    ) -> Result<User> {
        self.enter("register_admin").await?;
        self.add_user(username, password, Role::Admin)
    }

    async fn current_user(&self, token: &str) -> Result<User> {
        self.enter("current_user").await?;
        self.with_state(|s| {
            let id = s
                .tokens
                .get(token)
                .copied()
                .ok_or_else(|| ApiError::Unauthorized)?;
            s.users
                .iter()
                .find(|(u, _)| u.id == id)
                .map(|(u, _)| u.clone())
                .ok_or_else(|| not_found("User"))
        })
    }

    async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<User>> {
        self.enter("list_users").await?;
        self.with_state(|s| {
            Ok(s.users
                .iter()
                .map(|(u, _)| u.clone())
                .skip(skip as usize)
                .take(limit as usize)
                .collect())
        })
    }

    async fn get_user(&self, id: i64) -> Result<User> {
        self.enter("get_user").await?;
        self.with_state(|s| {
            s.users
                .iter()
                .find(|(u, _)| u.id == id)
                .map(|(u, _)| u.clone())
                .ok_or_else(|| not_found("User"))
        })
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        self.enter("update_user").await?;
        self.with_state(|s| {
            let (user, _) = s
                .users
                .iter_mut()
                .find(|(u, _)| u.id == id)
                .ok_or_else(|| not_found("User"))?;
            if let Some(name) = &update.username {
                user.username = name.clone();
            }
            if let Some(role) = update.role {
                user.role = role;
            }
            Ok(user.clone())
        })
    }

    async fn delete_user(&self, id: i64) -> Result<MessageResponse> {
        self.enter("delete_user").await?;
        self.with_state(|s| {
            s.users.retain(|(u, _)| u.id != id);
            Ok(MessageResponse {
                message: format!("User {} deleted", id),
                success: true,
            })
        })
    }

    async fn analytics_overview(&self) -> Result<Value> {
        self.enter("analytics_overview").await?;
        self.with_state(|s| {
            Ok(json!({
                "total_cars": s.cars.len(),
                "total_owners": s.owners.len(),
                "total_users": s.users.len(),
            }))
        })
    }

    async fn cars_by_year(&self) -> Result<Value> {
        self.enter("cars_by_year").await?;
        self.with_state(|s| {
            let mut counts: Vec<(i32, usize)> = Vec::new();
            for car in &s.cars {
                match counts.iter_mut().find(|(y, _)| *y == car.model_year) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((car.model_year, 1)),
                }
            }
            counts.sort();
            Ok(Value::Array(
                counts
                    .into_iter()
                    .map(|(year, count)| json!({ "year": year, "count": count }))
                    .collect(),
            ))
        })
    }

    async fn owners_stats(&self) -> Result<Value> {
        self.enter("owners_stats").await?;
        self.with_state(|s| {
            Ok(Value::Array(
                s.all_owners()
                    .iter()
                    .map(|o| {
                        json!({
                            "owner_id": o.ownerid,
                            "name": o.full_name(),
                            "car_count": o.cars.len(),
                        })
                    })
                    .collect(),
            ))
        })
    }

    async fn settings(&self) -> Result<Value> {
        self.enter("settings").await?;
        self.with_state(|s| Ok(s.settings.clone()))
    }

    async fn update_settings(&self, settings: &Value) -> Result<Value> {
        self.enter("update_settings").await?;
        self.with_state(|s| {
            s.settings = settings.clone();
            Ok(s.settings.clone())
        })
    }

    async fn create_backup(&self) -> Result<Value> {
        self.enter("create_backup").await?;
        Ok(json!({ "message": "Backup created", "file": "backup.sql" }))
    }

    async fn system_logs(&self, limit: u32) -> Result<Value> {
        self.enter("system_logs").await?;
        let lines: Vec<Value> = (0..limit.min(3))
            .map(|i| json!({ "level": "INFO", "message": format!("entry {}", i) }))
            .collect();
        Ok(json!({ "logs": lines }))
    }
}

impl FakeBackend {
    fn add_user(&self, username: &str, password: &str, role: Role) -> Result<User> {
        self.with_state(|s| {
            if s.users.iter().any(|(u, _)| u.username == username) {
                return Err(ApiError::BadRequest("Username already registered".into()).into());
            }
            let created = user(s.next_id(), username, role);
            s.users.push((created.clone(), password.to_string()));
            Ok(created)
        })
    }
}
