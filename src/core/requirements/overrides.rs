use serde::de::DeserializeOwned;
use std::env;

use super::RequirementsConfig;

pub const REQUIREMENT_ENV_PREFIX: &str = "JX_REQUIREMENT_";

fn parse_bool(name: &str, value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => {
            crate::log_warn!("requirements", "ignoring {}{}={}, expected true or false", REQUIREMENT_ENV_PREFIX, name, value);
            None
        }
    }
}

fn parse_enum<T: DeserializeOwned>(name: &str, value: &str) -> Option<T> {
    match serde_yml::from_str::<T>(value.trim()) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            crate::log_warn!("requirements", "ignoring unknown value {}{}={}", REQUIREMENT_ENV_PREFIX, name, value);
            None
        }
    }
}

impl RequirementsConfig {
    /// Apply `JX_REQUIREMENT_*` environment variables on top of the loaded file.
    pub fn override_from_environment(&mut self) {
        self.override_with(|name| env::var(format!("{}{}", REQUIREMENT_ENV_PREFIX, name)).ok());
    }

    /// Apply overrides from `lookup`, which receives the variable name
    /// without the `JX_REQUIREMENT_` prefix. Blank values are ignored.
    pub fn override_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let strings: [(&str, &mut String); 17] = [
            ("CLUSTER_NAME", &mut self.cluster.cluster_name),
            ("PROJECT", &mut self.cluster.project_id),
            ("ZONE", &mut self.cluster.zone),
            ("REGION", &mut self.cluster.region),
            ("CHART_REPOSITORY", &mut self.cluster.chart_repository),
            ("REGISTRY", &mut self.cluster.registry),
            ("ENV_GIT_OWNER", &mut self.cluster.environment_git_owner),
            ("EXTERNALDNS_SA_NAME", &mut self.cluster.external_dns_sa_name),
            ("KANIKO_SA_NAME", &mut self.cluster.kaniko_sa_name),
            ("VAULT_NAME", &mut self.vault.name),
            ("VAULT_SA_NAME", &mut self.vault.service_account),
            ("VAULT_KEYRING_NAME", &mut self.vault.keyring),
            ("VAULT_KEY_NAME", &mut self.vault.key),
            ("VAULT_BUCKET_NAME", &mut self.vault.bucket),
            ("VELERO_SA_NAME", &mut self.velero.service_account),
            ("VELERO_SCHEDULE", &mut self.velero.schedule),
            ("VELERO_TTL", &mut self.velero.time_to_live),
        ];
        for (name, field) in strings {
            if let Some(value) = get(name) {
                *field = value;
            }
        }

        let flags: [(&str, &mut bool); 8] = [
            ("ENV_GIT_PUBLIC", &mut self.cluster.environment_git_public),
            ("GIT_PUBLIC", &mut self.cluster.git_public),
            ("KANIKO", &mut self.kaniko),
            ("INGRESS_TLS_PRODUCTION", &mut self.ingress.tls.production),
            ("STORAGE_BACKUP_ENABLED", &mut self.storage.backup.enabled),
            ("STORAGE_LOGS_ENABLED", &mut self.storage.logs.enabled),
            ("STORAGE_REPORTS_ENABLED", &mut self.storage.reports.enabled),
            ("STORAGE_REPOSITORY_ENABLED", &mut self.storage.repository.enabled),
        ];
        for (name, field) in flags {
            if let Some(value) = get(name).and_then(|v| parse_bool(name, &v)) {
                *field = value;
            }
        }

        for (name, entry) in [
            ("STORAGE_BACKUP_URL", &mut self.storage.backup),
            ("STORAGE_LOGS_URL", &mut self.storage.logs),
            ("STORAGE_REPORTS_URL", &mut self.storage.reports),
            ("STORAGE_REPOSITORY_URL", &mut self.storage.repository),
        ] {
            if let Some(url) = get(name) {
                entry.url = url;
            }
        }

        if let Some(value) = get("SECRET_STORAGE_TYPE").and_then(|v| parse_enum("SECRET_STORAGE_TYPE", &v)) {
            self.secret_storage = Some(value);
        }
        if let Some(value) = get("WEBHOOK").and_then(|v| parse_enum("WEBHOOK", &v)) {
            self.webhook = Some(value);
        }
        if let Some(value) = get("REPOSITORY").and_then(|v| parse_enum("REPOSITORY", &v)) {
            self.repository = Some(value);
        }
        if let Some(value) = get("DEV_ENV_APPROVERS") {
            self.cluster.dev_env_approvers = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(value) = get("VERSIONS_GIT_REF") {
            self.version_stream.reference = value;
        }
    }
}
