use serde::{Deserialize, Serialize};

/// A car referenced from the statistics payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedCar {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarStatistics {
    #[serde(default)]
    pub total_cars: i64,
    #[serde(default)]
    pub total_owners: i64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub most_expensive: Option<PricedCar>,
    #[serde(default)]
    pub cheapest: Option<PricedCar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerStatistics {
    pub ownerid: i64,
    pub firstname: String,
    pub lastname: String,
    #[serde(default)]
    pub car_count: i64,
}

impl OwnerStatistics {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarsByYear {
    #[serde(alias = "modelYear", alias = "model_year")]
    pub year: i32,
    #[serde(alias = "total")]
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default = "MessageResponse::default_success")]
    pub success: bool,
}

impl MessageResponse {
    fn default_success() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_car_statistics() {
        let json = r#"{"total_cars": 12, "total_owners": 5, "average_price": 7250000.5,
            "most_expensive": {"id": 3, "brand": "BMW", "model": "X5", "price": 30000000},
            "cheapest": {"id": 9, "brand": "Daewoo", "model": "Nexia", "price": 900000}}"#;
        let stats: CarStatistics = serde_json::from_str(json).expect("stats JSON");
        assert_eq!(stats.total_cars, 12);
        assert_eq!(stats.most_expensive.as_ref().map(|c| c.id), Some(3));
        assert_eq!(stats.cheapest.as_ref().map(|c| c.brand.as_str()), Some("Daewoo"));
    }

    #[test]
    fn test_empty_database_statistics() {
        let stats: CarStatistics =
            serde_json::from_str(r#"{"total_cars": 0, "total_owners": 0, "average_price": 0,
                "most_expensive": null, "cheapest": null}"#)
                .expect("stats JSON");
        assert!(stats.most_expensive.is_none());
    }

    #[test]
    fn test_message_response_defaults_success() {
        let msg: MessageResponse =
            serde_json::from_str(r#"{"message": "Car deleted"}"#).expect("message JSON");
        assert!(msg.success);
    }
}
