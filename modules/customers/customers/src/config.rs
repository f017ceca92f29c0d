//! Configuration for the customers module.

use serde::Deserialize;

/// Page-size policy applied by the gRPC adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CustomersConfig {
    /// Used when a request asks for `limit <= 0`.
    pub default_limit: u32,
    /// Upper bound for list calls.
    pub max_list_limit: u32,
    /// Upper bound for free-text search.
    pub max_search_limit: u32,
}

impl Default for CustomersConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_list_limit: 100,
            max_search_limit: 50,
        }
    }
}
