use serde::{Deserialize, Serialize};

/// Compact car record embedded in an owner response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarForOwner {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub color: String,
    #[serde(rename = "registrationNumber")]
    pub registration_number: String,
    #[serde(rename = "modelYear")]
    pub model_year: i32,
    pub price: f64,
    pub owner_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub ownerid: i64,
    pub firstname: String,
    pub lastname: String,
    #[serde(default)]
    pub cars: Vec<CarForOwner>,
}

impl Owner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    pub fn car_count_display(&self) -> String {
        match self.cars.len() {
            0 => "no cars".to_string(),
            1 => "1 car".to_string(),
            n => format!("{} cars", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerCreate {
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
}

impl From<OwnerCreate> for OwnerUpdate {
    fn from(owner: OwnerCreate) -> Self {
        Self {
            firstname: Some(owner.firstname),
            lastname: Some(owner.lastname),
        }
    }
}

/// Body of `POST /owners/search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<super::SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_with_cars() {
        let json = r#"{"ownerid": 2, "firstname": "Dana", "lastname": "Omarova",
            "cars": [{"id": 5, "brand": "Kia", "model": "Rio", "color": "blue",
            "registrationNumber": "123KZ", "modelYear": 2020, "price": 6000000, "owner_id": 2}]}"#;
        let owner: Owner = serde_json::from_str(json).expect("owner JSON");
        assert_eq!(owner.full_name(), "Dana Omarova");
        assert_eq!(owner.cars.len(), 1);
        assert_eq!(owner.car_count_display(), "1 car");
    }

    #[test]
    fn test_owner_without_cars_field() {
        let owner: Owner =
            serde_json::from_str(r#"{"ownerid": 1, "firstname": "A", "lastname": "B"}"#)
                .expect("owner JSON");
        assert!(owner.cars.is_empty());
        assert_eq!(owner.car_count_display(), "no cars");
    }

    #[test]
    fn test_owner_update_skips_absent_fields() {
        let update = OwnerUpdate {
            lastname: Some("Ivanova".to_string()),
            ..OwnerUpdate::default()
        };
        let value = serde_json::to_value(&update).expect("serialize");
        assert_eq!(value, serde_json::json!({"lastname": "Ivanova"}));
    }
}
