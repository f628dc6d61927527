//! Recovery orchestrator core: the playbook registry, platform adapter contract, circuit
//! breaker fabric, health verifier, snapshot store, playbook executor and operator surface.

pub mod adapter;
pub mod breaker;
pub mod builtin;
pub mod executor;
pub mod health;
pub mod operator;
pub mod registry;
pub mod snapshot;

pub use adapter::{
    AdapterResult, ClusterLifecycle, ClusterState, PipelineRunState, PipelineRunStatus,
    PlatformAdapter, RunLifecycle, RunResult, RunState,
};
pub use breaker::{derive_breaker_key, CircuitBreakerFabric};
pub use executor::PlaybookExecutor;
pub use operator::OperatorSurface;
pub use registry::PlaybookRegistry;
