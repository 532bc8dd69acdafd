//! Overlay form state.
//!
//! Every dialog (login, registration, car/owner/user editing, search filters,
//! settings) is a `Form`: an ordered list of fields plus a submit button. The
//! form only holds text; turning it into requests and validating it is the
//! console's job, except for the filter form which builds a `CarQuery`.

use serde_json::Value;

use fleetdesk_core::models::{CarQuery, CarWithOwner, Owner, Role, User};
use fleetdesk_core::validation::{field, CarInput, FieldErrors, OwnerInput, RegisterInput};

/// Longest value accepted by any text field.
pub const MAX_FIELD_LENGTH: usize = 128;

pub mod settings_field {
    pub const SYSTEM_NAME: &str = "system_name";
    pub const ADMIN_EMAIL: &str = "admin_email";
    pub const MAINTENANCE_MODE: &str = "maintenance_mode";
}

pub mod filter_field {
    pub const MIN_PRICE: &str = "min_price";
    pub const MAX_PRICE: &str = "max_price";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Masked input.
    Secret,
    /// Owner id chosen from the loaded owner list.
    Owner,
    Role,
    /// "true" / "false".
    Toggle,
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub kind: FieldKind,
}

impl FormField {
    fn text(name: &'static str, label: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            label,
            value: value.into(),
            kind: FieldKind::Text,
        }
    }

    fn secret(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            value: String::new(),
            kind: FieldKind::Secret,
        }
    }

    fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_editable_text(&self) -> bool {
        matches!(self.kind, FieldKind::Text | FieldKind::Secret)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Login,
    Register,
    RegisterAdmin,
    CreateCar,
    EditCar(i64),
    CreateOwner,
    EditOwner(i64),
    EditUser(i64),
    Settings,
    CarFilters,
}

impl FormKind {
    pub fn title(&self) -> &'static str {
        match self {
            FormKind::Login => "Log in",
            FormKind::Register => "Create account",
            FormKind::RegisterAdmin => "Create administrator",
            FormKind::CreateCar => "New car",
            FormKind::EditCar(_) => "Edit car",
            FormKind::CreateOwner => "New owner",
            FormKind::EditOwner(_) => "Edit owner",
            FormKind::EditUser(_) => "Edit user",
            FormKind::Settings => "System settings",
            FormKind::CarFilters => "Search cars",
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self {
            FormKind::Login => "Log in",
            FormKind::Register | FormKind::RegisterAdmin => "Register",
            FormKind::CreateCar | FormKind::CreateOwner => "Create",
            FormKind::CarFilters => "Search",
            _ => "Save",
        }
    }

    /// Login and registration may switch between each other.
    pub fn is_auth(&self) -> bool {
        matches!(self, FormKind::Login | FormKind::Register | FormKind::RegisterAdmin)
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    /// Index into `fields`; `fields.len()` is the submit button.
    pub focus: usize,
    pub errors: FieldErrors,
    /// Form-level error or notice.
    pub message: Option<String>,
}

impl Form {
    fn new(kind: FormKind, fields: Vec<FormField>) -> Self {
        Self {
            kind,
            fields,
            focus: 0,
            errors: FieldErrors::new(),
            message: None,
        }
    }

    pub fn login(last_username: Option<&str>) -> Self {
        let username = last_username.unwrap_or_default();
        let mut form = Self::new(
            FormKind::Login,
            vec![
                FormField::text(field::USERNAME, "Username", username),
                FormField::secret(field::PASSWORD, "Password"),
            ],
        );
        // Jump straight to the password when the username is remembered
        if !username.is_empty() {
            form.focus = 1;
        }
        form
    }

    pub fn register(admin: bool) -> Self {
        let kind = if admin {
            FormKind::RegisterAdmin
        } else {
            FormKind::Register
        };
        Self::new(
            kind,
            vec![
                FormField::text(field::USERNAME, "Username", ""),
                FormField::secret(field::PASSWORD, "Password"),
                FormField::secret(field::CONFIRM_PASSWORD, "Confirm"),
            ],
        )
    }

    pub fn car(existing: Option<&CarWithOwner>) -> Self {
        let kind = existing.map_or(FormKind::CreateCar, |c| FormKind::EditCar(c.id));
        let get = |f: fn(&CarWithOwner) -> String| existing.map(f).unwrap_or_default();
        Self::new(
            kind,
            vec![
                FormField::text(field::BRAND, "Brand", get(|c| c.brand.clone())),
                FormField::text(field::MODEL, "Model", get(|c| c.model.clone())),
                FormField::text(field::COLOR, "Color", get(|c| c.color.clone())),
                FormField::text(
                    field::REGISTRATION_NUMBER,
                    "Reg. number",
                    get(|c| c.registration_number.clone()),
                ),
                FormField::text(field::MODEL_YEAR, "Year", get(|c| c.model_year.to_string())),
                FormField::text(field::PRICE, "Price", get(|c| format!("{}", c.price))),
                FormField::text(field::OWNER, "Owner", get(|c| c.owner_id.to_string()))
                    .with_kind(FieldKind::Owner),
            ],
        )
    }

    pub fn owner(existing: Option<&Owner>) -> Self {
        let kind = existing.map_or(FormKind::CreateOwner, |o| FormKind::EditOwner(o.ownerid));
        Self::new(
            kind,
            vec![
                FormField::text(
                    field::FIRSTNAME,
                    "First name",
                    existing.map(|o| o.firstname.clone()).unwrap_or_default(),
                ),
                FormField::text(
                    field::LASTNAME,
                    "Last name",
                    existing.map(|o| o.lastname.clone()).unwrap_or_default(),
                ),
            ],
        )
    }

    pub fn user(user: &User) -> Self {
        Self::new(
            FormKind::EditUser(user.id),
            vec![
                FormField::text(field::USERNAME, "Username", user.username.clone()),
                FormField::text("role", "Role", user.role.to_string()).with_kind(FieldKind::Role),
            ],
        )
    }

    pub fn settings(current: &Value) -> Self {
        let text = |key: &str| {
            current
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let maintenance = current
            .get(settings_field::MAINTENANCE_MODE)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self::new(
            FormKind::Settings,
            vec![
                FormField::text(settings_field::SYSTEM_NAME, "System name", text(settings_field::SYSTEM_NAME)),
                FormField::text(settings_field::ADMIN_EMAIL, "Admin email", text(settings_field::ADMIN_EMAIL)),
                FormField::text(
                    settings_field::MAINTENANCE_MODE,
                    "Maintenance",
                    maintenance.to_string(),
                )
                .with_kind(FieldKind::Toggle),
            ],
        )
    }

    pub fn car_filters(query: &CarQuery) -> Self {
        let opt = |v: Option<String>| v.unwrap_or_default();
        Self::new(
            FormKind::CarFilters,
            vec![
                FormField::text(field::BRAND, "Brand", opt(query.brand.clone())),
                FormField::text(field::COLOR, "Color", opt(query.color.clone())),
                FormField::text(field::MODEL_YEAR, "Year", opt(query.model_year.map(|y| y.to_string()))),
                FormField::text(filter_field::MIN_PRICE, "Min price", opt(query.min_price.map(|p| p.to_string()))),
                FormField::text(filter_field::MAX_PRICE, "Max price", opt(query.max_price.map(|p| p.to_string()))),
                FormField::text(field::OWNER, "Owner", opt(query.owner_id.map(|o| o.to_string())))
                    .with_kind(FieldKind::Owner),
            ],
        )
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn value(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
            .unwrap_or_default()
    }

    pub fn on_submit(&self) -> bool {
        self.focus >= self.fields.len()
    }

    pub fn focused_field(&self) -> Option<&FormField> {
        self.fields.get(self.focus)
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % (self.fields.len() + 1);
    }

    pub fn focus_prev(&mut self) {
        let slots = self.fields.len() + 1;
        self.focus = (self.focus + slots - 1) % slots;
    }

    pub fn input_char(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            if field.is_editable_text() && field.value.chars().count() < MAX_FIELD_LENGTH {
                field.value.push(c);
            }
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            if field.is_editable_text() {
                field.value.pop();
            }
        }
    }

    /// Change a choice field. Owner fields step through `owners`; the empty
    /// choice sits before the first owner.
    pub fn cycle(&mut self, forward: bool, owners: &[Owner]) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        match field.kind {
            FieldKind::Role => {
                let role = if field.value == Role::Admin.to_string() {
                    Role::Admin
                } else {
                    Role::User
                };
                field.value = role.toggle().to_string();
            }
            FieldKind::Toggle => {
                field.value = (field.value != "true").to_string();
            }
            FieldKind::Owner => {
                let current = owners
                    .iter()
                    .position(|o| o.ownerid.to_string() == field.value);
                // Slot 0 is "no owner", slot i+1 is owners[i]
                let slots = owners.len() + 1;
                let slot = current.map_or(0, |i| i + 1);
                let next = if forward {
                    (slot + 1) % slots
                } else {
                    (slot + slots - 1) % slots
                };
                field.value = match next {
                    0 => String::new(),
                    n => owners[n - 1].ownerid.to_string(),
                };
            }
            FieldKind::Text | FieldKind::Secret => {}
        }
    }

    pub fn set_errors(&mut self, errors: FieldErrors) {
        // Put the cursor on the first offending field
        if let Some((name, _)) = errors.iter().next() {
            if let Some(index) = self.fields.iter().position(|f| f.name == name) {
                self.focus = index;
            }
        }
        self.errors = errors;
        self.message = None;
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.errors = FieldErrors::new();
        self.message = Some(message.into());
    }

    pub fn credentials(&self) -> (String, String) {
        (
            self.value(field::USERNAME).to_string(),
            self.value(field::PASSWORD).to_string(),
        )
    }

    pub fn register_input(&self) -> RegisterInput {
        RegisterInput {
            username: self.value(field::USERNAME).to_string(),
            password: self.value(field::PASSWORD).to_string(),
            confirm_password: self.value(field::CONFIRM_PASSWORD).to_string(),
        }
    }

    pub fn car_input(&self) -> CarInput {
        CarInput {
            brand: self.value(field::BRAND).to_string(),
            model: self.value(field::MODEL).to_string(),
            color: self.value(field::COLOR).to_string(),
            registration_number: self.value(field::REGISTRATION_NUMBER).to_string(),
            model_year: self.value(field::MODEL_YEAR).to_string(),
            price: self.value(field::PRICE).to_string(),
            owner_id: self.value(field::OWNER).parse().ok(),
        }
    }

    pub fn owner_input(&self) -> OwnerInput {
        OwnerInput {
            firstname: self.value(field::FIRSTNAME).to_string(),
            lastname: self.value(field::LASTNAME).to_string(),
        }
    }

    pub fn user_update(&self) -> (String, Role) {
        let role = if self.value("role") == Role::Admin.to_string() {
            Role::Admin
        } else {
            Role::User
        };
        (self.value(field::USERNAME).to_string(), role)
    }

    /// The settings object to send: `base` with the form's fields replaced.
    pub fn settings_value(&self, base: &Value) -> Value {
        let mut settings = match base {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        settings.insert(
            settings_field::SYSTEM_NAME.to_string(),
            Value::String(self.value(settings_field::SYSTEM_NAME).trim().to_string()),
        );
        settings.insert(
            settings_field::ADMIN_EMAIL.to_string(),
            Value::String(self.value(settings_field::ADMIN_EMAIL).trim().to_string()),
        );
        settings.insert(
            settings_field::MAINTENANCE_MODE.to_string(),
            Value::Bool(self.value(settings_field::MAINTENANCE_MODE) == "true"),
        );
        Value::Object(settings)
    }

    /// Apply the filter fields to `base`, returning to the first page.
    pub fn car_query(&self, base: &CarQuery) -> Result<CarQuery, FieldErrors> {
        let mut errors = FieldErrors::new();
        let text = |name: &str| {
            let value = self.value(name).trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        let model_year = match text(field::MODEL_YEAR) {
            Some(v) => match v.parse::<i32>() {
                Ok(year) => Some(year),
                Err(_) => {
                    errors.add(field::MODEL_YEAR, "Year must be a number");
                    None
                }
            },
            None => None,
        };
        let mut price = |name: &'static str| match text(name) {
            Some(v) => match v.replace(' ', "").parse::<f64>() {
                Ok(p) if p >= 0.0 => Some(p),
                _ => {
                    errors.add(name, "Enter a non-negative amount");
                    None
                }
            },
            None => None,
        };
        let min_price = price(filter_field::MIN_PRICE);
        let max_price = price(filter_field::MAX_PRICE);

        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                errors.add(filter_field::MAX_PRICE, "Max price is below min price");
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CarQuery {
            brand: text(field::BRAND),
            color: text(field::COLOR),
            model_year,
            min_price,
            max_price,
            owner_id: text(field::OWNER).and_then(|v| v.parse().ok()),
            offset: 0,
            ..base.clone()
        })
    }
}
