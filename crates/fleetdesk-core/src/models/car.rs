use serde::{Deserialize, Serialize};

/// A car as returned by list, get and search endpoints, joined with its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarWithOwner {
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
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub owner_firstname: Option<String>,
    #[serde(default)]
    pub owner_lastname: Option<String>,
}

impl CarWithOwner {
    pub fn title(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    /// Owner display name, falling back to the id when the join is missing.
    pub fn owner_name(&self) -> String {
        match (&self.owner_firstname, &self.owner_lastname) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            _ => self
                .owner
                .clone()
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| format!("Owner #{}", self.owner_id)),
        }
    }
}

/// Response body of create/update: the car without the owner join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarResponse {
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
pub struct CarCreate {
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

/// Partial update; absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "registrationNumber", skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(rename = "modelYear", skip_serializing_if = "Option::is_none")]
    pub model_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
}

impl From<CarCreate> for CarUpdate {
    fn from(car: CarCreate) -> Self {
        Self {
            brand: Some(car.brand),
            model: Some(car.model),
            color: Some(car.color),
            registration_number: Some(car.registration_number),
            model_year: Some(car.model_year),
            price: Some(car.price),
            owner_id: Some(car.owner_id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn toggle(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortOrder::Asc => "▲",
            SortOrder::Desc => "▼",
        }
    }
}

/// Columns the search endpoint accepts in `sort_by`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CarSortColumn {
    #[default]
    Id,
    Brand,
    Model,
    ModelYear,
    Price,
}

impl CarSortColumn {
    pub fn next(&self) -> Self {
        match self {
            CarSortColumn::Id => CarSortColumn::Brand,
            CarSortColumn::Brand => CarSortColumn::Model,
            CarSortColumn::Model => CarSortColumn::ModelYear,
            CarSortColumn::ModelYear => CarSortColumn::Price,
            CarSortColumn::Price => CarSortColumn::Id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CarSortColumn::Id => "id",
            CarSortColumn::Brand => "brand",
            CarSortColumn::Model => "model",
            CarSortColumn::ModelYear => "year",
            CarSortColumn::Price => "price",
        }
    }
}

/// Body of `POST /cars/search`. Also the persisted search state of the cars tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "modelYear", default, skip_serializing_if = "Option::is_none")]
    pub model_year: Option<i32>,
    #[serde(rename = "minPrice", default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(rename = "maxPrice", default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub sort_by: CarSortColumn,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "CarQuery::default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for CarQuery {
    fn default() -> Self {
        Self {
            brand: None,
            color: None,
            model_year: None,
            min_price: None,
            max_price: None,
            owner_id: None,
            sort_by: CarSortColumn::Id,
            sort_order: SortOrder::Asc,
            limit: Self::default_limit(),
            offset: 0,
        }
    }
}

impl CarQuery {
    fn default_limit() -> u32 {
        20
    }

    /// True when no filter narrows the result set.
    pub fn is_unfiltered(&self) -> bool {
        self.brand.is_none()
            && self.color.is_none()
            && self.model_year.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.owner_id.is_none()
    }

    /// Clear every filter, keeping sort and page size.
    pub fn reset_filters(&mut self) {
        *self = Self {
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            limit: self.limit,
            ..Self::default()
        };
    }

    pub fn next_page(&mut self) {
        self.offset = self.offset.saturating_add(self.limit);
    }

    pub fn prev_page(&mut self) {
        self.offset = self.offset.saturating_sub(self.limit);
    }

    pub fn page_number(&self) -> u32 {
        if self.limit == 0 {
            1
        } else {
            self.offset / self.limit + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_car_with_owner() {
        let json = r#"{"id": 7, "brand": "Toyota", "model": "Camry", "color": "white",
            "registrationNumber": "777ABC02", "modelYear": 2019, "price": 9500000,
            "owner_id": 3, "owner_firstname": "Aigerim", "owner_lastname": "Sadykova"}"#;

        let car: CarWithOwner = serde_json::from_str(json).expect("car JSON");
        assert_eq!(car.registration_number, "777ABC02");
        assert_eq!(car.model_year, 2019);
        assert_eq!(car.owner_name(), "Aigerim Sadykova");
        assert_eq!(car.title(), "Toyota Camry");
    }

    #[test]
    fn test_owner_name_fallbacks() {
        let json = r#"{"id": 1, "brand": "Lada", "model": "Niva", "color": "green",
            "registrationNumber": "A1", "modelYear": 2001, "price": 1.0, "owner_id": 9}"#;
        let mut car: CarWithOwner = serde_json::from_str(json).expect("car JSON");
        assert_eq!(car.owner_name(), "Owner #9");

        car.owner = Some("Nurlan Abenov".to_string());
        assert_eq!(car.owner_name(), "Nurlan Abenov");
    }

    #[test]
    fn test_car_query_serializes_only_set_filters() {
        let query = CarQuery {
            brand: Some("BMW".to_string()),
            max_price: Some(100.0),
            ..CarQuery::default()
        };
        let value = serde_json::to_value(&query).expect("serialize");
        assert_eq!(value["brand"], "BMW");
        assert_eq!(value["maxPrice"], 100.0);
        assert_eq!(value["sort_by"], "id");
        assert_eq!(value["sort_order"], "asc");
        assert_eq!(value["limit"], 20);
        assert!(value.get("color").is_none());
        assert!(value.get("minPrice").is_none());
    }

    #[test]
    fn test_car_query_defaults_from_partial_json() {
        let query: CarQuery = serde_json::from_str(r#"{"color": "red"}"#).expect("query");
        assert_eq!(query.color.as_deref(), Some("red"));
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
        assert_eq!(query.sort_by, CarSortColumn::Id);
    }

    #[test]
    fn test_car_query_paging() {
        let mut query = CarQuery::default();
        assert_eq!(query.page_number(), 1);
        query.next_page();
        assert_eq!(query.offset, 20);
        assert_eq!(query.page_number(), 2);
        query.prev_page();
        query.prev_page();
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_reset_filters_keeps_sort() {
        let mut query = CarQuery {
            brand: Some("Kia".to_string()),
            sort_by: CarSortColumn::Price,
            sort_order: SortOrder::Desc,
            offset: 40,
            ..CarQuery::default()
        };
        query.reset_filters();
        assert!(query.is_unfiltered());
        assert_eq!(query.sort_by, CarSortColumn::Price);
        assert_eq!(query.sort_order, SortOrder::Desc);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_sort_column_cycle() {
        assert_eq!(CarSortColumn::Id.next(), CarSortColumn::Brand);
        assert_eq!(CarSortColumn::Price.next(), CarSortColumn::Id);
        assert_eq!(
            serde_json::to_value(CarSortColumn::ModelYear).expect("serialize"),
            "modelYear"
        );
    }
}
