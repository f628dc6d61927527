//! Concrete `PlatformAdapter` implementations: a Databricks REST adapter, an Azure Data
//! Factory management-API adapter, and a scripted in-memory double for tests.

pub mod adf;
pub mod databricks;
pub mod mock;

pub use adf::AdfAdapter;
pub use databricks::DatabricksAdapter;
pub use mock::ScriptedAdapter;
