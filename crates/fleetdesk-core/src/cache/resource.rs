use std::fmt;

use serde::Serialize;

/// Resource family: every cache entry derived from one backend resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cars,
    Owners,
    CarStatistics,
    OwnerStatistics,
    Users,
    Settings,
    Analytics,
    Status,
}

impl Resource {
    pub fn family(&self) -> &'static str {
        match self {
            Resource::Cars => "cars",
            Resource::Owners => "owners",
            Resource::CarStatistics => "carStatistics",
            Resource::OwnerStatistics => "ownerStatistics",
            Resource::Users => "users",
            Resource::Settings => "settings",
            Resource::Analytics => "analytics",
            Resource::Status => "status",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}

/// Cache key: a resource family plus the JSON-serialized request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: Resource,
    params: String,
}

impl QueryKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: String::new(),
        }
    }

    pub fn with_params<P: Serialize + ?Sized>(resource: Resource, params: &P) -> Self {
        // Serializing plain data structs cannot fail; an empty suffix would only merge keys
        let params = serde_json::to_string(params).unwrap_or_default();
        Self { resource, params }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}{}", self.resource, self.params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CarQuery;

    #[test]
    fn test_keys_differ_by_params() {
        let page1 = CarQuery::default();
        let mut page2 = CarQuery::default();
        page2.next_page();

        let a = QueryKey::with_params(Resource::Cars, &("search", &page1));
        let b = QueryKey::with_params(Resource::Cars, &("search", &page2));
        assert_ne!(a, b);
        assert_eq!(a.resource(), b.resource());
        assert_eq!(a, QueryKey::with_params(Resource::Cars, &("search", &page1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryKey::new(Resource::CarStatistics).to_string(), "carStatistics");
        assert_eq!(
            QueryKey::with_params(Resource::Owners, &["detail", "3"]).to_string(),
            r#"owners["detail","3"]"#
        );
    }
}
