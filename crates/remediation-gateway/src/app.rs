//! Wiring that assembles the registry, breaker fabric, adapters and config into an executor,
//! and exposes it as shared HTTP application state.

use std::collections::HashMap;
use std::sync::Arc;

use remediation_adapters::{AdfAdapter, DatabricksAdapter};
use remediation_common::RemediationConfig;
use remediation_core::{CircuitBreakerFabric, PlatformAdapter, PlaybookExecutor, PlaybookRegistry};

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<PlaybookExecutor>,
}

/// Credentials for the two platform adapters, read from the environment at startup.
pub struct AdapterCredentials {
    pub databricks_base_url: String,
    pub databricks_token: String,
    pub adf_management_api_base: String,
    pub adf_bearer_token: String,
    pub adf_subscription_id: String,
}

impl AdapterCredentials {
    pub fn from_env() -> Self {
        Self {
            databricks_base_url: std::env::var("DATABRICKS_BASE_URL")
                .unwrap_or_else(|_| "https://example.cloud.databricks.com".to_string()),
            databricks_token: std::env::var("DATABRICKS_TOKEN").unwrap_or_default(),
            adf_management_api_base: std::env::var("ADF_MANAGEMENT_API_BASE")
                .unwrap_or_else(|_| "https://management.azure.com".to_string()),
            adf_bearer_token: std::env::var("ADF_BEARER_TOKEN").unwrap_or_default(),
            adf_subscription_id: std::env::var("ADF_SUBSCRIPTION_ID").unwrap_or_default(),
        }
    }
}

pub fn build_executor(config: RemediationConfig, credentials: AdapterCredentials) -> Arc<PlaybookExecutor> {
    let registry = Arc::new(PlaybookRegistry::with_builtin_defaults());
    let breaker = CircuitBreakerFabric::new();

    let mut adapters: HashMap<&'static str, Arc<dyn PlatformAdapter>> = HashMap::new();
    adapters.insert(
        "databricks",
        Arc::new(DatabricksAdapter::new(
            credentials.databricks_base_url,
            credentials.databricks_token,
        )),
    );
    adapters.insert(
        "adf",
        Arc::new(AdfAdapter::new(
            credentials.adf_management_api_base,
            credentials.adf_bearer_token,
            credentials.adf_subscription_id,
        )),
    );

    Arc::new(PlaybookExecutor::new(registry, breaker, adapters, config))
}
