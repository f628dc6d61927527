//! Playbook Registry (C1): a process-wide, read-only catalog of `error_type -> PlaybookConfig`.

use std::collections::HashMap;

use remediation_common::PlaybookConfig;

/// Read-only catalog populated once at startup. Unknown `error_type` keys return `None`;
/// the executor turns an absent lookup into a `noop` failure ("no playbook").
#[derive(Debug, Clone)]
pub struct PlaybookRegistry {
    playbooks: HashMap<String, PlaybookConfig>,
}

impl PlaybookRegistry {
    pub fn new(playbooks: HashMap<String, PlaybookConfig>) -> Self {
        Self { playbooks }
    }

    /// Build the registry from the declarative built-in table (see `builtin::default_playbooks`).
    pub fn with_builtin_defaults() -> Self {
        Self::new(super::builtin::default_playbooks())
    }

    pub fn get(&self, error_type: &str) -> Option<&PlaybookConfig> {
        self.playbooks.get(error_type)
    }

    pub fn list(&self) -> Vec<&str> {
        self.playbooks.keys().map(String::as_str).collect()
    }

    pub fn public_views(&self) -> Vec<remediation_common::PlaybookPublicView> {
        self.playbooks
            .iter()
            .map(|(error_type, config)| config.public_view(error_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_error_type_is_absent() {
        let registry = PlaybookRegistry::new(HashMap::new());
        assert!(registry.get("DoesNotExist").is_none());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn builtin_registry_resolves_known_error_types() {
        let registry = PlaybookRegistry::with_builtin_defaults();
        assert!(registry.get("DatabricksJobExecutionError").is_some());
        assert!(registry.get("DatabricksOutOfMemoryError").is_some());
    }
}
