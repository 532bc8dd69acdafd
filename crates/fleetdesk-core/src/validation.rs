//! Client-side form rules. A form that fails here never reaches the network.

use std::fmt;

use crate::models::{CarCreate, OwnerCreate, Role, UserUpdate};

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2030;
pub const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;

/// Per-field messages, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<(&'static str, String)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message; only the first one per field is kept.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.errors.push((field, message.into()));
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        f.write_str(&joined.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

pub mod field {
    pub const BRAND: &str = "brand";
    pub const MODEL: &str = "model";
    pub const COLOR: &str = "color";
    pub const REGISTRATION_NUMBER: &str = "registrationNumber";
    pub const MODEL_YEAR: &str = "modelYear";
    pub const PRICE: &str = "price";
    pub const OWNER: &str = "owner_id";
    pub const FIRSTNAME: &str = "firstname";
    pub const LASTNAME: &str = "lastname";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirm_password";
}

/// Raw text of the car form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarInput {
    pub brand: String,
    pub model: String,
    pub color: String,
    pub registration_number: String,
    pub model_year: String,
    pub price: String,
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerInput {
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

fn check_text(errors: &mut FieldErrors, field: &'static str, label: &str, value: &str, max: usize) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.add(field, format!("{} is required", label));
    } else if len > max {
        errors.add(field, format!("At most {} characters", max));
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, 'А'..='я' | 'ё' | 'Ё') || c.is_whitespace()
}

fn check_name(errors: &mut FieldErrors, field: &'static str, label: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, format!("{} is required", label));
    } else if value.chars().count() < MIN_NAME_LEN {
        errors.add(field, format!("At least {} characters", MIN_NAME_LEN));
    } else if !value.chars().all(is_name_char) {
        errors.add(field, "Only letters are allowed");
    }
}

pub fn validate_car(input: &CarInput) -> Result<CarCreate, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_text(&mut errors, field::BRAND, "Brand", &input.brand, 100);
    check_text(&mut errors, field::MODEL, "Model", &input.model, 100);
    check_text(&mut errors, field::COLOR, "Color", &input.color, 40);
    check_text(
        &mut errors,
        field::REGISTRATION_NUMBER,
        "Registration number",
        &input.registration_number,
        40,
    );

    let year = input.model_year.trim();
    let model_year = if year.is_empty() {
        errors.add(field::MODEL_YEAR, "Year is required");
        None
    } else {
        match year.parse::<i32>() {
            Ok(y) if y < MIN_YEAR => {
                errors.add(field::MODEL_YEAR, format!("Year must be {} or later", MIN_YEAR));
                None
            }
            Ok(y) if y > MAX_YEAR => {
                errors.add(field::MODEL_YEAR, format!("Year must be {} or earlier", MAX_YEAR));
                None
            }
            Ok(y) => Some(y),
            Err(_) => {
                errors.add(field::MODEL_YEAR, "Year must be a whole number");
                None
            }
        }
    };

    let price_text = input.price.trim();
    let price = if price_text.is_empty() {
        errors.add(field::PRICE, "Price is required");
        None
    } else {
        match price_text.parse::<f64>() {
            Ok(p) if !p.is_finite() => {
                errors.add(field::PRICE, "Price must be a number");
                None
            }
            Ok(p) if p < 0.0 => {
                errors.add(field::PRICE, "Price cannot be negative");
                None
            }
            Ok(p) => Some(p),
            Err(_) => {
                errors.add(field::PRICE, "Price must be a number");
                None
            }
        }
    };

    if input.owner_id.is_none() {
        errors.add(field::OWNER, "Owner is required");
    }

    match (model_year, price, input.owner_id) {
        (Some(model_year), Some(price), Some(owner_id)) if errors.is_empty() => Ok(CarCreate {
            brand: input.brand.trim().to_string(),
            model: input.model.trim().to_string(),
            color: input.color.trim().to_string(),
            registration_number: input.registration_number.trim().to_string(),
            model_year,
            price,
            owner_id,
        }),
        _ => Err(errors),
    }
}

pub fn validate_owner(input: &OwnerInput) -> Result<OwnerCreate, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, field::FIRSTNAME, "First name", &input.firstname);
    check_name(&mut errors, field::LASTNAME, "Last name", &input.lastname);
    errors.into_result(|| OwnerCreate {
        firstname: input.firstname.trim().to_string(),
        lastname: input.lastname.trim().to_string(),
    })
}

pub fn validate_registration(input: &RegisterInput) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if input.username.trim().is_empty() {
        errors.add(field::USERNAME, "Username is required");
    }
    if input.password.is_empty() {
        errors.add(field::PASSWORD, "Password is required");
    }
    if input.confirm_password.is_empty() {
        errors.add(field::CONFIRM_PASSWORD, "Confirm the password");
    }
    if errors.is_empty() {
        if input.password != input.confirm_password {
            errors.add(field::CONFIRM_PASSWORD, "Passwords do not match");
        } else if input.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                field::PASSWORD,
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            );
        }
    }
    errors.into_result(|| ())
}

pub fn validate_login(username: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if username.trim().is_empty() {
        errors.add(field::USERNAME, "Username is required");
    }
    if password.is_empty() {
        errors.add(field::PASSWORD, "Password is required");
    }
    errors.into_result(|| ())
}

/// Admin edit of an account: the username may not be blanked.
pub fn validate_user_update(username: &str, role: Role) -> Result<UserUpdate, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_text(&mut errors, field::USERNAME, "Username", username, 100);
    errors.into_result(|| UserUpdate {
        username: Some(username.trim().to_string()),
        role: Some(role),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camry() -> CarInput {
        CarInput {
            brand: "Toyota".into(),
            model: "Camry".into(),
            color: "white".into(),
            registration_number: "777ABC02".into(),
            model_year: "2019".into(),
            price: "9500000".into(),
            owner_id: Some(1),
        }
    }

    #[test]
    fn test_valid_car() {
        let car = validate_car(&camry()).unwrap();
        assert_eq!(car.model_year, 2019);
        assert_eq!(car.price, 9_500_000.0);
        assert_eq!(car.owner_id, 1);
    }

    #[test]
    fn test_negative_price() {
        let errors = validate_car(&CarInput {
            price: "-5".into(),
            ..camry()
        })
        .unwrap_err();
        assert_eq!(errors.get(field::PRICE), Some("Price cannot be negative"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_zero_price_is_allowed() {
        assert!(validate_car(&CarInput {
            price: "0".into(),
            ..camry()
        })
        .is_ok());
    }

    #[test]
    fn test_year_bounds() {
        for (year, ok) in [("1899", false), ("1900", true), ("2030", true), ("2031", false), ("20x0", false)] {
            let result = validate_car(&CarInput {
                model_year: year.into(),
                ..camry()
            });
            assert_eq!(result.is_ok(), ok, "year {}", year);
        }
    }

    #[test]
    fn test_text_lengths() {
        let errors = validate_car(&CarInput {
            brand: "   ".into(),
            color: "x".repeat(41),
            registration_number: "R".repeat(40),
            owner_id: None,
            ..camry()
        })
        .unwrap_err();
        assert_eq!(errors.get(field::BRAND), Some("Brand is required"));
        assert_eq!(errors.get(field::COLOR), Some("At most 40 characters"));
        assert_eq!(errors.get(field::REGISTRATION_NUMBER), None);
        assert_eq!(errors.get(field::OWNER), Some("Owner is required"));
    }

    #[test]
    fn test_owner_names() {
        assert!(validate_owner(&OwnerInput {
            firstname: "Ivan".into(),
            lastname: "Petrov".into(),
        })
        .is_ok());
        assert!(validate_owner(&OwnerInput {
            firstname: "Алёна".into(),
            lastname: "Ёлкина".into(),
        })
        .is_ok());
        assert!(validate_owner(&OwnerInput {
            firstname: "Mary Ann".into(),
            lastname: "Smith".into(),
        })
        .is_ok());

        let errors = validate_owner(&OwnerInput {
            firstname: "J".into(),
            lastname: "Sm1th".into(),
        })
        .unwrap_err();
        assert_eq!(errors.get(field::FIRSTNAME), Some("At least 2 characters"));
        assert_eq!(errors.get(field::LASTNAME), Some("Only letters are allowed"));
    }

    #[test]
    fn test_registration_rules() {
        let ok = RegisterInput {
            username: "bob".into(),
            password: "secret9".into(),
            confirm_password: "secret9".into(),
        };
        assert!(validate_registration(&ok).is_ok());

        let mismatch = RegisterInput {
            confirm_password: "secret8".into(),
            ..ok.clone()
        };
        assert_eq!(
            validate_registration(&mismatch).unwrap_err().get(field::CONFIRM_PASSWORD),
            Some("Passwords do not match")
        );

        let short = RegisterInput {
            password: "abc".into(),
            confirm_password: "abc".into(),
            ..ok.clone()
        };
        assert!(validate_registration(&short).unwrap_err().get(field::PASSWORD).is_some());

        let blank = RegisterInput::default();
        assert_eq!(validate_registration(&blank).unwrap_err().len(), 3);
    }

    #[test]
    fn test_login_rules() {
        assert!(validate_login("admin", "pw").is_ok());
        let errors = validate_login(" ", "").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.to_string(), "username: Username is required; password: Password is required");
    }

    #[test]
    fn test_user_update() {
        let update = validate_user_update(" carol ", Role::Admin).unwrap();
        assert_eq!(update.username.as_deref(), Some("carol"));
        assert!(validate_user_update("", Role::User).is_err());
    }
}
