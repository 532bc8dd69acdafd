//! Application state for the fleetdesk console.
//!
//! `App` owns the `Console` plus everything that is purely presentation:
//! the selected tab, list selections, the open form, notifications and the
//! persisted search state. Each loop iteration calls `tick`, which re-reads
//! the query cache for the visible tab; key handlers call the action methods.

use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};

use fleetdesk_core::api::ApiError;
use fleetdesk_core::authz::Permission;
use fleetdesk_core::cache::{QueryKey, QueryObserver, QueryState, RefreshTicker, RefreshTrigger};
use fleetdesk_core::console::{AnalyticsView, Console, ConsoleError};
use fleetdesk_core::guard::{DenyReason, GuardDecision, RouteGuard};
use fleetdesk_core::models::{
    CarQuery, CarStatistics, CarWithOwner, Owner, OwnerStatistics, StatusResponse, User,
};
use fleetdesk_core::store::{
    Persisted, PersistedStore, CARS_SEARCH_STATE_KEY, OWNERS_SEARCH_TERM_KEY,
};
use fleetdesk_core::validation::field;
use fleetdesk_core::SessionSnapshot;

use crate::config::Config;
use crate::forms::{Form, FormKind};

// ============================================================================
// Constants
// ============================================================================

/// Number of rows to move on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// How long a notification stays in the status bar.
const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Lines of the system log shown on the settings tab.
pub const LOG_LINES: u32 = 50;

// ============================================================================
// UI State Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Cars,
    Owners,
    Analytics,
    Users,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Dashboard,
        Tab::Cars,
        Tab::Owners,
        Tab::Analytics,
        Tab::Users,
        Tab::Settings,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Cars => "Cars",
            Tab::Owners => "Owners",
            Tab::Analytics => "Analytics",
            Tab::Users => "Users",
            Tab::Settings => "Settings",
        }
    }

    pub fn guard(&self) -> RouteGuard {
        match self {
            Tab::Users | Tab::Settings => RouteGuard::ADMIN,
            _ => RouteGuard::AUTHENTICATED,
        }
    }

    fn index(&self) -> usize {
        Tab::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

/// Current UI focus area (list panel or detail panel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    /// Typing into the owners search term.
    Searching,
    ShowingHelp,
    EditingForm,
    ConfirmingDelete,
    ConfirmingQuit,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    shown_at: Instant,
}

impl Notification {
    fn is_expired(&self) -> bool {
        self.shown_at.elapsed() >= NOTIFICATION_TTL
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Car { id: i64, label: String },
    Owner { id: i64, label: String, cars: usize },
    User { id: i64, label: String },
}

impl DeleteTarget {
    pub fn label(&self) -> &str {
        match self {
            DeleteTarget::Car { label, .. }
            | DeleteTarget::Owner { label, .. }
            | DeleteTarget::User { label, .. } => label,
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            DeleteTarget::Owner { label, cars, .. } if *cars > 0 => format!(
                "Delete {} and their {} car{}?",
                label,
                cars,
                if *cars == 1 { "" } else { "s" }
            ),
            other => format!("Delete {}?", other.label()),
        }
    }
}

/// Latest query snapshots, refreshed every tick for the visible tab.
pub struct Views {
    pub status: QueryState<StatusResponse>,
    pub car_stats: QueryState<CarStatistics>,
    pub owner_stats: QueryState<Vec<OwnerStatistics>>,
    pub cars: QueryState<Vec<CarWithOwner>>,
    pub owners: QueryState<Vec<Owner>>,
    pub owners_for_form: QueryState<Vec<Owner>>,
    pub users: QueryState<Vec<User>>,
    pub settings: QueryState<Value>,
    pub logs: QueryState<Value>,
    pub overview: QueryState<Value>,
    pub cars_by_year: QueryState<Value>,
    pub owners_stats: QueryState<Value>,
}

impl Default for Views {
    fn default() -> Self {
        Self {
            status: QueryState::disabled(),
            car_stats: QueryState::disabled(),
            owner_stats: QueryState::disabled(),
            cars: QueryState::disabled(),
            owners: QueryState::disabled(),
            owners_for_form: QueryState::disabled(),
            users: QueryState::disabled(),
            settings: QueryState::disabled(),
            logs: QueryState::disabled(),
            overview: QueryState::disabled(),
            cars_by_year: QueryState::disabled(),
            owners_stats: QueryState::disabled(),
        }
    }
}

fn rejected<T>(state: &QueryState<T>) -> bool {
    state
        .error
        .as_ref()
        .is_some_and(|e| matches!(e.api_error(), Some(ApiError::Unauthorized)))
}

impl Views {
    /// True when any read came back 401.
    fn session_rejected(&self) -> bool {
        rejected(&self.car_stats)
            || rejected(&self.owner_stats)
            || rejected(&self.cars)
            || rejected(&self.owners)
            || rejected(&self.owners_for_form)
            || rejected(&self.users)
            || rejected(&self.settings)
            || rejected(&self.logs)
            || rejected(&self.overview)
            || rejected(&self.cars_by_year)
            || rejected(&self.owners_stats)
    }
}

fn slice<T>(state: &QueryState<Vec<T>>) -> &[T] {
    state.data.as_deref().map(Vec::as_slice).unwrap_or(&[])
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub console: Console,
    pub config: Config,
    save_config: bool,

    pub state: AppState,
    pub current_tab: Tab,
    pub focus: Focus,

    pub car_query: Persisted<CarQuery>,
    pub owner_term: Persisted<String>,
    cars_observer: QueryObserver<Vec<CarWithOwner>>,
    owners_observer: QueryObserver<Vec<Owner>>,
    pub views: Views,

    pub car_selection: usize,
    pub owner_selection: usize,
    pub user_selection: usize,

    pub form: Option<Form>,
    pub pending_delete: Option<DeleteTarget>,
    pub notification: Option<Notification>,

    /// Render ticks since start, drives the spinner.
    pub frames: usize,
    ticker: RefreshTicker,
    was_authenticated: bool,
    /// The stored session is still being checked; `tick` settles it.
    startup_pending: bool,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let tokens = config.token_store()?;
        let console = Console::connect(&config.api_base_url, config.request_timeout(), tokens)?;
        let store = match config.state_dir().and_then(PersistedStore::new) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "UI state will not be persisted");
                None
            }
        };
        let mut app = Self::with_console(console, config, store);
        app.save_config = true;
        Ok(app)
    }

    /// Build around an existing console. The config is never written back.
    pub fn with_console(console: Console, config: Config, store: Option<PersistedStore>) -> Self {
        let ticker = RefreshTicker::new(config.refresh_interval());
        Self {
            console,
            config,
            save_config: false,
            state: AppState::Normal,
            current_tab: Tab::Dashboard,
            focus: Focus::List,
            car_query: Persisted::load(store.clone(), CARS_SEARCH_STATE_KEY, CarQuery::default()),
            owner_term: Persisted::load(store, OWNERS_SEARCH_TERM_KEY, String::new()),
            cars_observer: QueryObserver::new(),
            owners_observer: QueryObserver::new(),
            views: Views::default(),
            car_selection: 0,
            owner_selection: 0,
            user_selection: 0,
            form: None,
            pending_delete: None,
            notification: None,
            frames: 0,
            ticker,
            was_authenticated: false,
            startup_pending: false,
        }
    }

    /// Start validating any stored session in the background. Until it settles
    /// the guard reports `Loading`; `tick` then resumes or asks for a login.
    pub fn start(&mut self) {
        let session = self.console.session().clone();
        tokio::spawn(async move { session.initialize().await });
        self.startup_pending = true;
    }

    fn finish_startup(&mut self, snapshot: &SessionSnapshot) {
        self.startup_pending = false;
        self.was_authenticated = snapshot.is_authenticated();
        match snapshot.username() {
            Some(username) => info!(username, "Resumed session"),
            None => self.open_login(None),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.console.snapshot()
    }

    pub fn guard_decision(&self) -> GuardDecision {
        self.current_tab.guard().evaluate(&self.snapshot())
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.console.allows(permission)
    }

    // ===== Loop =====

    pub fn tick(&mut self) {
        self.frames = self.frames.wrapping_add(1);
        if self.notification.as_ref().is_some_and(Notification::is_expired) {
            self.notification = None;
        }
        if self.ticker.poll() {
            self.console.refresh(RefreshTrigger::Interval);
        }

        let snapshot = self.snapshot();
        if self.startup_pending && !snapshot.is_loading {
            self.finish_startup(&snapshot);
        }
        let authenticated = snapshot.is_authenticated();
        if self.was_authenticated && !authenticated {
            self.session_lost("Your session has ended, please log in again");
        }
        self.was_authenticated = authenticated;

        self.sync_queries();
        if self.views.session_rejected() {
            warn!("Backend rejected the session");
            self.console.logout();
            self.was_authenticated = false;
            self.session_lost("Your session has expired, please log in again");
        }
        self.clamp_selections();
    }

    /// Observe the queries of the visible tab. Tabs the guard denies read nothing.
    pub fn sync_queries(&mut self) {
        self.views.status = self.console.status();

        if self.guard_decision() == GuardDecision::Allowed {
            match self.current_tab {
                Tab::Dashboard => {
                    self.views.car_stats = self.console.car_statistics();
                    self.views.owner_stats = self.console.owner_statistics();
                }
                Tab::Cars => {
                    self.views.cars = self
                        .console
                        .cars(self.car_query.get(), &mut self.cars_observer);
                }
                Tab::Owners => {
                    self.views.owners = self
                        .console
                        .owners(self.owner_term.get(), &mut self.owners_observer);
                }
                Tab::Analytics => {
                    self.views.overview = self.console.analytics(AnalyticsView::Overview);
                    self.views.cars_by_year = self.console.analytics(AnalyticsView::CarsByYear);
                    self.views.owners_stats = self.console.analytics(AnalyticsView::OwnersStats);
                }
                Tab::Users => {
                    self.views.users = self.console.users();
                }
                Tab::Settings => {
                    self.views.settings = self.console.settings();
                    self.views.logs = self.console.system_logs(LOG_LINES);
                }
            }
        }

        let picks_owner = self.form.as_ref().is_some_and(|f| {
            matches!(
                f.kind,
                FormKind::CreateCar | FormKind::EditCar(_) | FormKind::CarFilters
            )
        });
        if picks_owner {
            self.views.owners_for_form = self.console.owners_for_form();
        }
    }

    /// Keys read by the visible tab.
    pub fn visible_keys(&self) -> Vec<QueryKey> {
        let mut keys = vec![Console::status_key()];
        match self.current_tab {
            Tab::Dashboard => {
                keys.push(Console::car_statistics_key());
                keys.push(Console::owner_statistics_key());
            }
            Tab::Cars => keys.push(Console::cars_key(self.car_query.get())),
            Tab::Owners => keys.push(Console::owners_key(self.owner_term.get())),
            Tab::Analytics => {
                keys.push(Console::analytics_key(AnalyticsView::Overview));
                keys.push(Console::analytics_key(AnalyticsView::CarsByYear));
                keys.push(Console::analytics_key(AnalyticsView::OwnersStats));
            }
            Tab::Users => keys.push(Console::users_key()),
            Tab::Settings => {
                keys.push(Console::settings_key());
                keys.push(Console::logs_key(LOG_LINES));
            }
        }
        keys
    }

    /// Refetch what is on screen now.
    pub fn refresh_visible(&mut self) {
        for key in self.visible_keys() {
            self.console.cache().invalidate_key(&key);
        }
    }

    /// Clear errored queries on screen so they fetch again.
    pub fn retry(&mut self) {
        let retried = self
            .visible_keys()
            .iter()
            .filter(|key| self.console.retry(key))
            .count();
        if retried > 0 {
            info!(retried, "Retrying failed queries");
        }
    }

    pub fn focus_gained(&mut self) {
        self.console.refresh(RefreshTrigger::FocusGained);
    }

    fn reset_views(&mut self) {
        self.cars_observer.reset();
        self.owners_observer.reset();
        self.views = Views::default();
        self.car_selection = 0;
        self.owner_selection = 0;
        self.user_selection = 0;
        self.pending_delete = None;
    }

    fn session_lost(&mut self, message: &str) {
        self.reset_views();
        let on_auth_form = self.form.as_ref().is_some_and(|f| f.kind.is_auth());
        if !on_auth_form {
            self.open_login(Some(message.to_string()));
        }
    }

    // ===== Lists =====

    pub fn cars(&self) -> &[CarWithOwner] {
        slice(&self.views.cars)
    }

    pub fn owners(&self) -> &[Owner] {
        slice(&self.views.owners)
    }

    pub fn users(&self) -> &[User] {
        slice(&self.views.users)
    }

    pub fn form_owners(&self) -> &[Owner] {
        slice(&self.views.owners_for_form)
    }

    pub fn selected_car(&self) -> Option<&CarWithOwner> {
        self.cars().get(self.car_selection)
    }

    pub fn selected_owner(&self) -> Option<&Owner> {
        self.owners().get(self.owner_selection)
    }

    pub fn selected_user(&self) -> Option<&User> {
        self.users().get(self.user_selection)
    }

    fn selection_mut(&mut self) -> Option<(&mut usize, usize)> {
        let len = match self.current_tab {
            Tab::Cars => self.cars().len(),
            Tab::Owners => self.owners().len(),
            Tab::Users => self.users().len(),
            _ => return None,
        };
        let selection = match self.current_tab {
            Tab::Cars => &mut self.car_selection,
            Tab::Owners => &mut self.owner_selection,
            _ => &mut self.user_selection,
        };
        Some((selection, len))
    }

    pub fn move_selection(&mut self, delta: isize) {
        if let Some((selection, len)) = self.selection_mut() {
            if len == 0 {
                *selection = 0;
            } else {
                let max = (len - 1) as isize;
                *selection = (*selection as isize + delta).clamp(0, max) as usize;
            }
        }
    }

    pub fn select_first(&mut self) {
        if let Some((selection, _)) = self.selection_mut() {
            *selection = 0;
        }
    }

    pub fn select_last(&mut self) {
        if let Some((selection, len)) = self.selection_mut() {
            *selection = len.saturating_sub(1);
        }
    }

    fn clamp_selections(&mut self) {
        let clamp = |selection: &mut usize, len: usize| {
            *selection = (*selection).min(len.saturating_sub(1));
        };
        let (cars, owners, users) = (self.cars().len(), self.owners().len(), self.users().len());
        clamp(&mut self.car_selection, cars);
        clamp(&mut self.owner_selection, owners);
        clamp(&mut self.user_selection, users);
    }

    // ===== Navigation =====

    pub fn switch_tab(&mut self, tab: Tab) {
        if self.current_tab != tab {
            self.current_tab = tab;
            self.focus = Focus::List;
            self.console.refresh(RefreshTrigger::Navigation);
        }
    }

    /// The action offered by the denied view.
    pub fn guard_action(&mut self) {
        match self.guard_decision() {
            GuardDecision::Denied(DenyReason::NotAuthenticated) => self.open_login(None),
            GuardDecision::Denied(DenyReason::NotAdmin) => self.switch_tab(Tab::Dashboard),
            GuardDecision::Loading | GuardDecision::Allowed => {}
        }
    }

    // ===== Cars search =====

    pub fn next_page(&mut self) {
        // A short page is the last one
        if (self.cars().len() as u32) < self.car_query.get().limit {
            return;
        }
        self.car_query.update(CarQuery::next_page);
        self.car_selection = 0;
    }

    pub fn prev_page(&mut self) {
        if self.car_query.get().offset == 0 {
            return;
        }
        self.car_query.update(CarQuery::prev_page);
        self.car_selection = 0;
    }

    pub fn cycle_sort(&mut self) {
        self.car_query.update(|q| {
            q.sort_by = q.sort_by.next();
            q.offset = 0;
        });
        self.car_selection = 0;
    }

    pub fn toggle_sort_order(&mut self) {
        self.car_query.update(|q| {
            q.sort_order = q.sort_order.toggle();
            q.offset = 0;
        });
        self.car_selection = 0;
    }

    pub fn reset_filters(&mut self) {
        self.car_query.update(|q| {
            q.reset_filters();
            q.offset = 0;
        });
        self.car_selection = 0;
    }

    // ===== Owners search =====

    pub fn start_search(&mut self) {
        self.state = AppState::Searching;
    }

    pub fn search_input(&mut self, c: char) {
        self.owner_term.update(|term| term.push(c));
        self.owner_selection = 0;
    }

    pub fn search_backspace(&mut self) {
        self.owner_term.update(|term| {
            term.pop();
        });
        self.owner_selection = 0;
    }

    pub fn clear_search(&mut self) {
        self.owner_term.set(String::new());
        self.owner_selection = 0;
    }

    // ===== Forms =====

    pub fn open_login(&mut self, message: Option<String>) {
        self.form = Some(Form::login(self.config.last_username.as_deref()).with_message(message));
        self.state = AppState::EditingForm;
    }

    pub fn open_register(&mut self, admin: bool) {
        self.form = Some(Form::register(admin));
        self.state = AppState::EditingForm;
    }

    fn open_form(&mut self, form: Form) {
        self.form = Some(form);
        self.state = AppState::EditingForm;
    }

    pub fn close_form(&mut self) {
        self.form = None;
        self.state = AppState::Normal;
    }

    /// Check a permission before opening a dialog, telling the user on denial.
    fn require(&mut self, permission: Permission) -> bool {
        if self.allows(permission) {
            return true;
        }
        let denied = ConsoleError::PermissionDenied(permission.action().to_string());
        self.notify_error(denied.user_message());
        false
    }

    /// `n` on a list tab.
    pub fn open_create_form(&mut self) {
        let form = match self.current_tab {
            Tab::Cars => Form::car(None),
            Tab::Owners => Form::owner(None),
            _ => return,
        };
        if self.require(Permission::ManageRecords) {
            self.open_form(form);
        }
    }

    /// `e` on a list tab or the settings tab.
    pub fn open_edit_form(&mut self) {
        let (form, permission) = match self.current_tab {
            Tab::Cars => match self.selected_car() {
                Some(car) => (Form::car(Some(car)), Permission::ManageRecords),
                None => return,
            },
            Tab::Owners => match self.selected_owner() {
                Some(owner) => (Form::owner(Some(owner)), Permission::ManageRecords),
                None => return,
            },
            Tab::Users => match self.selected_user() {
                Some(user) => (Form::user(user), Permission::ManageUsers),
                None => return,
            },
            Tab::Settings => match self.views.settings.data.as_deref() {
                Some(settings) => (Form::settings(settings), Permission::ManageSettings),
                None => return,
            },
            Tab::Dashboard | Tab::Analytics => return,
        };
        if self.require(permission) {
            self.open_form(form);
        }
    }

    pub fn open_filters(&mut self) {
        let form = Form::car_filters(self.car_query.get());
        self.open_form(form);
    }

    pub async fn submit_form(&mut self) {
        let Some(form) = self.form.clone() else {
            return;
        };
        let outcome = match form.kind {
            FormKind::Login => {
                let (username, password) = form.credentials();
                self.console
                    .login(&username, &password)
                    .await
                    .map(|()| format!("Logged in as {}", username.trim()))
            }
            FormKind::Register => self
                .console
                .register(&form.register_input())
                .await
                .map(|()| "Account created".to_string()),
            FormKind::RegisterAdmin => self
                .console
                .register_admin(&form.register_input())
                .await
                .map(|()| "Administrator account created".to_string()),
            FormKind::CreateCar => self
                .console
                .create_car(&form.car_input())
                .await
                .map(|car| format!("Car #{} created", car.id)),
            FormKind::EditCar(id) => self
                .console
                .update_car(id, &form.car_input())
                .await
                .map(|_| "Car updated".to_string()),
            FormKind::CreateOwner => self
                .console
                .create_owner(&form.owner_input())
                .await
                .map(|owner| format!("Owner {} created", owner.full_name())),
            FormKind::EditOwner(id) => self
                .console
                .update_owner(id, &form.owner_input())
                .await
                .map(|_| "Owner updated".to_string()),
            FormKind::EditUser(id) => {
                let (username, role) = form.user_update();
                self.console
                    .update_user(id, &username, role)
                    .await
                    .map(|user| format!("User {} updated", user.username))
            }
            FormKind::Settings => {
                let base = self
                    .views
                    .settings
                    .data
                    .as_deref()
                    .cloned()
                    .unwrap_or(Value::Null);
                self.console
                    .update_settings(&form.settings_value(&base))
                    .await
                    .map(|_| "Settings saved".to_string())
            }
            FormKind::CarFilters => match form.car_query(self.car_query.get()) {
                Ok(query) => {
                    self.car_query.set(query);
                    self.car_selection = 0;
                    self.close_form();
                    return;
                }
                Err(errors) => Err(ConsoleError::Validation(errors)),
            },
        };

        match outcome {
            Ok(message) => {
                self.close_form();
                if form.kind.is_auth() {
                    self.logged_in(form.value(field::USERNAME));
                }
                self.notify_success(message);
            }
            Err(ConsoleError::Unauthorized) => {
                self.was_authenticated = false;
                self.form = None;
                self.session_lost("Your session has expired, please log in again");
            }
            Err(ConsoleError::Validation(errors)) => {
                if let Some(open) = self.form.as_mut() {
                    open.set_errors(errors);
                }
            }
            Err(other) => {
                if let Some(open) = self.form.as_mut() {
                    open.set_message(other.user_message());
                }
            }
        }
    }

    fn logged_in(&mut self, username: &str) {
        self.reset_views();
        self.was_authenticated = true;
        self.ticker.reset();

        let username = username.trim().to_string();
        if self.config.last_username.as_deref() != Some(username.as_str()) {
            self.config.last_username = Some(username);
            if self.save_config {
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
        }
    }

    pub fn logout(&mut self) {
        self.console.logout();
        self.was_authenticated = false;
        self.reset_views();
        self.current_tab = Tab::Dashboard;
        self.notify_success("Logged out");
        self.open_login(None);
    }

    // ===== Deletes =====

    pub fn request_delete(&mut self) {
        let target = match self.current_tab {
            Tab::Cars => self.selected_car().map(|car| DeleteTarget::Car {
                id: car.id,
                label: car.title(),
            }),
            Tab::Owners => self.selected_owner().map(|owner| DeleteTarget::Owner {
                id: owner.ownerid,
                label: owner.full_name(),
                cars: owner.cars.len(),
            }),
            Tab::Users => self.selected_user().map(|user| DeleteTarget::User {
                id: user.id,
                label: user.username.clone(),
            }),
            _ => None,
        };
        let Some(target) = target else {
            return;
        };
        let permission = match target {
            DeleteTarget::User { .. } => Permission::ManageUsers,
            _ => Permission::ManageRecords,
        };
        if self.require(permission) {
            self.pending_delete = Some(target);
            self.state = AppState::ConfirmingDelete;
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
        self.state = AppState::Normal;
    }

    pub async fn confirm_delete(&mut self) {
        let Some(target) = self.pending_delete.take() else {
            return;
        };
        self.state = AppState::Normal;
        let result = match &target {
            DeleteTarget::Car { id, .. } => self.console.delete_car(*id).await,
            DeleteTarget::Owner { id, .. } => self.console.delete_owner(*id).await,
            DeleteTarget::User { id, .. } => self.console.delete_user(*id).await,
        };
        match result {
            Ok(_) => self.notify_success(format!("Deleted {}", target.label())),
            Err(ConsoleError::Unauthorized) => {
                self.was_authenticated = false;
                self.session_lost("Your session has expired, please log in again");
            }
            Err(e) => self.notify_error(e.user_message()),
        }
    }

    // ===== Settings =====

    pub async fn create_backup(&mut self) {
        match self.console.create_backup().await {
            Ok(result) => {
                let message = result
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Backup created")
                    .to_string();
                self.notify_success(message);
            }
            Err(ConsoleError::Unauthorized) => {
                self.was_authenticated = false;
                self.session_lost("Your session has expired, please log in again");
            }
            Err(e) => self.notify_error(e.user_message()),
        }
    }

    // ===== Notifications =====

    pub fn notify_success(&mut self, message: impl Into<String>) {
        self.notification = Some(Notification {
            kind: NotificationKind::Success,
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(message = %message, "Showing error");
        self.notification = Some(Notification {
            kind: NotificationKind::Error,
            message,
            shown_at: Instant::now(),
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use fleetdesk_core::auth::{MemoryTokenStore, SessionHandle, SessionManager};
    use fleetdesk_core::testing::FakeBackend;
    use tempfile::TempDir;

    use ratatui::{backend::TestBackend, Terminal};

    use crate::config::TokenStorage;
    use crate::ui::render::render;

    pub(crate) fn app_with(store: Option<PersistedStore>) -> (Arc<FakeBackend>, App) {
        let backend = Arc::new(FakeBackend::new());
        let app = app_on(backend.clone(), MemoryTokenStore::new(), store);
        (backend, app)
    }

    fn app_on(backend: Arc<FakeBackend>, tokens: MemoryTokenStore, store: Option<PersistedStore>) -> App {
        let session = SessionManager::new(backend.clone(), Arc::new(tokens), SessionHandle::new());
        let console = Console::new(backend.clone(), session);
        let config = Config {
            token_storage: TokenStorage::Memory,
            refresh_interval_secs: 0,
            ..Config::default()
        };
        App::with_console(console, config, store)
    }

    /// Start the app and wait for the stored session check to settle.
    pub(crate) async fn start(app: &mut App) {
        app.start();
        for _ in 0..20 {
            if !app.snapshot().is_loading {
                break;
            }
            tokio::task::yield_now().await;
        }
        app.tick();
    }

    async fn settle(app: &mut App) {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        app.tick();
    }

    async fn log_in(app: &mut App, username: &str, password: &str) {
        app.open_login(None);
        let form = app.form.as_mut().unwrap();
        form.fields[0].value = username.to_string();
        form.fields[1].value = password.to_string();
        app.submit_form().await;
    }

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_session_shows_loading_until_checked() {
        let backend = Arc::new(FakeBackend::new());
        let token = backend.issue_token("admin");
        backend.set_delay(Duration::from_secs(2));
        let mut app = app_on(backend.clone(), MemoryTokenStore::with_token(&token), None);

        app.start();
        app.tick();
        assert!(app.snapshot().is_loading);
        assert_eq!(app.guard_decision(), GuardDecision::Loading);
        assert!(app.form.is_none());
        assert!(screen_text(&app).contains("Checking session"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        app.tick();
        assert!(!app.snapshot().is_loading);
        assert_eq!(app.guard_decision(), GuardDecision::Allowed);
        assert!(app.form.is_none());
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.snapshot().username(), Some("admin"));
    }

    #[tokio::test]
    async fn test_start_without_session_asks_for_login() {
        let (backend, mut app) = app_with(None);
        start(&mut app).await;
        assert_eq!(app.state, AppState::EditingForm);
        assert_eq!(app.form.as_ref().unwrap().kind, FormKind::Login);

        app.switch_tab(Tab::Cars);
        app.tick();
        assert_eq!(
            app.guard_decision(),
            GuardDecision::Denied(DenyReason::NotAuthenticated)
        );
        // Only the public status check reaches the backend
        settle(&mut app).await;
        assert_eq!(backend.total_calls(), backend.call_count("status"));
    }

    #[tokio::test]
    async fn test_login_form_logs_in() {
        let (_backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "admin", "admin123").await;

        assert!(app.form.is_none());
        assert_eq!(app.state, AppState::Normal);
        assert!(app.snapshot().is_admin());
        assert_eq!(app.config.last_username.as_deref(), Some("admin"));
        assert_eq!(
            app.notification.as_ref().map(|n| n.message.as_str()),
            Some("Logged in as admin")
        );
    }

    #[tokio::test]
    async fn test_bad_login_keeps_form_open() {
        let (_backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "admin", "wrong").await;

        let form = app.form.as_ref().unwrap();
        assert_eq!(form.message.as_deref(), Some("Invalid username or password"));
        assert!(!app.snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn test_user_denied_admin_tabs() {
        let (backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "alice", "secret1").await;

        app.switch_tab(Tab::Users);
        app.tick();
        assert_eq!(
            app.guard_decision(),
            GuardDecision::Denied(DenyReason::NotAdmin)
        );
        settle(&mut app).await;
        assert_eq!(backend.call_count("list_users"), 0);

        app.guard_action();
        assert_eq!(app.current_tab, Tab::Dashboard);
    }

    #[tokio::test]
    async fn test_user_cannot_open_create_form() {
        let (_backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "alice", "secret1").await;

        app.switch_tab(Tab::Cars);
        app.open_create_form();
        assert!(app.form.is_none());
        let notification = app.notification.as_ref().unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert_eq!(
            notification.message,
            "You do not have permission to modify records"
        );
    }

    #[tokio::test]
    async fn test_cars_tab_lists_and_deletes() {
        let (backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "admin", "admin123").await;

        app.switch_tab(Tab::Cars);
        app.tick();
        settle(&mut app).await;
        assert_eq!(app.cars().len(), 3);

        app.request_delete();
        assert_eq!(app.state, AppState::ConfirmingDelete);
        assert_eq!(app.pending_delete.as_ref().unwrap().prompt(), "Delete Toyota Camry?");
        app.confirm_delete().await;
        assert_eq!(backend.car_ids(), vec![11, 12]);

        settle(&mut app).await;
        settle(&mut app).await;
        assert_eq!(app.cars().len(), 2);
    }

    #[tokio::test]
    async fn test_owner_delete_prompt_mentions_cars() {
        let target = DeleteTarget::Owner {
            id: 1,
            label: "Aigerim Sadykova".into(),
            cars: 2,
        };
        assert_eq!(target.prompt(), "Delete Aigerim Sadykova and their 2 cars?");
        let target = DeleteTarget::User {
            id: 2,
            label: "alice".into(),
        };
        assert_eq!(target.prompt(), "Delete alice?");
    }

    #[tokio::test]
    async fn test_validation_errors_stay_in_form() {
        let (backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "admin", "admin123").await;

        app.switch_tab(Tab::Owners);
        app.open_create_form();
        app.submit_form().await;
        let form = app.form.as_ref().unwrap();
        assert!(!form.errors.is_empty());
        assert_eq!(backend.call_count("create_owner"), 0);
    }

    #[tokio::test]
    async fn test_rejected_read_ends_session() {
        let (backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "admin", "admin123").await;

        backend.fail("car_statistics", 401);
        app.tick();
        settle(&mut app).await;

        assert!(!app.snapshot().is_authenticated());
        let form = app.form.as_ref().unwrap();
        assert_eq!(form.kind, FormKind::Login);
        assert_eq!(
            form.message.as_deref(),
            Some("Your session has expired, please log in again")
        );
    }

    #[tokio::test]
    async fn test_search_state_persists() {
        let dir = TempDir::new().unwrap();
        {
            let store = PersistedStore::new(dir.path().to_path_buf()).unwrap();
            let (_backend, mut app) = app_with(Some(store));
            app.cycle_sort();
            app.search_input('I');
            app.search_input('v');
        }

        let store = PersistedStore::new(dir.path().to_path_buf()).unwrap();
        let (_backend, app) = app_with(Some(store));
        assert_eq!(app.owner_term.get(), "Iv");
        assert_ne!(app.car_query.get().sort_by, CarQuery::default().sort_by);
    }

    #[tokio::test]
    async fn test_logout_returns_to_login() {
        let (_backend, mut app) = app_with(None);
        start(&mut app).await;
        log_in(&mut app, "admin", "admin123").await;
        app.switch_tab(Tab::Settings);

        app.logout();
        assert!(!app.snapshot().is_authenticated());
        assert_eq!(app.current_tab, Tab::Dashboard);
        assert_eq!(app.form.as_ref().unwrap().kind, FormKind::Login);
        assert!(app.console.cache().is_empty());
    }

    #[test]
    fn test_tab_cycle() {
        assert_eq!(Tab::Dashboard.next(), Tab::Cars);
        assert_eq!(Tab::Settings.next(), Tab::Dashboard);
        assert_eq!(Tab::Dashboard.prev(), Tab::Settings);
        assert!(Tab::Users.guard().require_admin);
        assert!(!Tab::Cars.guard().require_admin);
    }
}
