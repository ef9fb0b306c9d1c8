use std::collections::HashMap;
use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::error::RegistryError;

/// Canonical form of an endpoint path: trailing slashes trimmed, empty and
/// `/` are the same endpoint. Matching is case-sensitive.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Path-keyed endpoint table. Written only while the server is assembled,
/// shared read-only afterwards.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Arc<Endpoint>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, endpoint: Endpoint) -> Result<(), RegistryError> {
        let path = normalize_path(endpoint.path());
        if self.endpoints.contains_key(&path) {
            return Err(RegistryError::PathInUse(path));
        }
        self.endpoints.insert(path, Arc::new(endpoint));
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(&normalize_path(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointBuilder;

    fn endpoint(path: &str) -> Endpoint {
        EndpointBuilder::new("test", path).build().unwrap()
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("/api/"), "/api");
        assert_eq!(normalize_path("/api///"), "/api");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/Api"), "/Api"); // case-sensitive
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint("/api")).unwrap();
        assert_eq!(
            registry.register(endpoint("/api/")).unwrap_err(),
            RegistryError::PathInUse("/api".to_string())
        );
    }

    #[test]
    fn lookup_normalizes() {
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint("/api")).unwrap();
        assert!(registry.get("/api/").is_some());
        assert!(registry.get("/api").is_some());
        assert!(registry.get("/other").is_none());

        registry.register(endpoint("")).unwrap();
        assert!(registry.get("/").is_some());
    }
}
