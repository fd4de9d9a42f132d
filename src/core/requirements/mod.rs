//! The `jx-requirements.yml` model.
//!
//! Requirements describe the cluster, git provider, storage and environments
//! a GitOps installation targets. They are loaded from the environment
//! repository, filled in by `step verify preinstall`, and saved back.

mod io;
mod merge;
mod overrides;
mod schema;

pub use io::{
    load_requirements_config, load_requirements_config_file, parse_requirements,
    save_requirements_values_file, RequirementsValues, REQUIREMENTS_CONFIG_FILE_NAME,
    REQUIREMENTS_CONFIG_FILE_NAME_ALT, REQUIREMENTS_VALUES_FILE_NAME,
};
pub use merge::Merge;
pub use overrides::REQUIREMENT_ENV_PREFIX;

use serde::{Deserialize, Serialize};

use crate::cloud;
use crate::error::{Error, Result};

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookType {
    Prow,
    Lighthouse,
    Jenkins,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretStorageType {
    Local,
    Vault,
}

impl SecretStorageType {
    /// Value recorded under `secretsLocation` in the install config map.
    pub fn location_kind(&self) -> &'static str {
        match self {
            SecretStorageType::Local => "fileSystem",
            SecretStorageType::Vault => "vault",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    Nexus,
    Chartmuseum,
    Bucketrepo,
    Artifactory,
    None,
    #[serde(rename = "")]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsConfig {
    #[serde(default)]
    pub auto_update: AutoUpdateConfig,
    #[serde(default, rename = "bootConfigURL", skip_serializing_if = "String::is_empty")]
    pub boot_config_url: String,
    #[serde(default, rename = "buildPackURL", skip_serializing_if = "String::is_empty")]
    pub build_pack_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_pack_ref: String,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<EnvironmentConfig>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub gitops: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub helmfile: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub kaniko: bool,
    #[serde(default)]
    pub ingress: IngressConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_storage: Option<SecretStorageType>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default, skip_serializing_if = "is_false")]
    pub terraform: bool,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub velero: VeleroConfig,
    #[serde(default)]
    pub version_stream: VersionStreamConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoUpdateConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub schedule: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chart_repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dev_env_approvers: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_registry_org: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment_git_owner: String,
    #[serde(default)]
    pub environment_git_public: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_name: String,
    #[serde(default)]
    pub git_public: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_server: String,
    #[serde(default, rename = "externalDNSSAName", skip_serializing_if = "String::is_empty")]
    pub external_dns_sa_name: String,
    #[serde(default, rename = "kanikoSAName", skip_serializing_if = "String::is_empty")]
    pub kaniko_sa_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, rename = "project", skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strict_permissions: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_kind: String,
    #[serde(default, skip_serializing_if = "IngressConfig::is_empty")]
    pub ingress: IngressConfig,
    #[serde(default, skip_serializing_if = "is_false")]
    pub remote_cluster: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub promotion_strategy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url_template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfig {
    #[serde(default, rename = "cloud_dns_secret_name", skip_serializing_if = "String::is_empty")]
    pub cloud_dns_secret_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, rename = "domainIssuerURL", skip_serializing_if = "String::is_empty")]
    pub domain_issuer_url: String,
    #[serde(default, rename = "externalDNS")]
    pub external_dns: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_load_balancer: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace_sub_domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_type: String,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub production: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub logs: StorageEntryConfig,
    #[serde(default)]
    pub reports: StorageEntryConfig,
    #[serde(default)]
    pub repository: StorageEntryConfig,
    #[serde(default)]
    pub backup: StorageEntryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keyring: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VeleroConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schedule: String,
    #[serde(default, rename = "ttl", skip_serializing_if = "String::is_empty")]
    pub time_to_live: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStreamConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "ref")]
    pub reference: String,
}

impl IngressConfig {
    /// Whether the domain is a wildcard DNS service derived from the load
    /// balancer IP, which changes whenever the ingress service is recreated.
    pub fn is_auto_dns_domain(&self) -> bool {
        [".nip.io", ".xip.io", ".sslip.io"]
            .iter()
            .any(|suffix| self.domain.ends_with(suffix))
    }

    fn is_empty(&self) -> bool {
        self == &IngressConfig::default()
    }
}

impl RequirementsConfig {
    /// A fresh requirements file: dev, staging and production environments,
    /// local secrets and a prow webhook in the `jx` namespace.
    pub fn new() -> Self {
        Self {
            secret_storage: Some(SecretStorageType::Local),
            webhook: Some(WebhookType::Prow),
            repository: Some(RepositoryType::Nexus),
            cluster: ClusterConfig {
                namespace: "jx".to_string(),
                ..Default::default()
            },
            environments: ["dev", "staging", "production"]
                .iter()
                .map(|key| EnvironmentConfig {
                    key: key.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Defaults applied to every loaded file.
    pub(crate) fn add_defaults(&mut self) {
        if self.cluster.namespace.is_empty() {
            self.cluster.namespace = "jx".to_string();
        }
        if self.webhook.is_none() {
            self.webhook = Some(WebhookType::Prow);
        }
        if self.secret_storage.is_none() {
            self.secret_storage = Some(SecretStorageType::Local);
        }
    }

    pub fn is_cloud_provider(&self) -> bool {
        cloud::is_cloud_provider(&self.cluster.provider)
    }

    /// Decide whether missing cluster resources may be created.
    ///
    /// An explicit `true`/`false` flag wins; otherwise resources are lazily
    /// created unless Terraform manages the infrastructure.
    pub fn is_lazy_create_secrets(&self, flag: &str) -> Result<bool> {
        match flag.trim().to_lowercase().as_str() {
            "" => Ok(!self.terraform),
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(Error::validation_invalid_argument(
                "lazy-create",
                format!("invalid option for lazy-create: {}, should be true or false", other),
                Some(other.to_string()),
                Some(vec!["true".to_string(), "false".to_string()]),
            )),
        }
    }

    pub fn environment(&self, key: &str) -> Result<&EnvironmentConfig> {
        self.environments
            .iter()
            .find(|e| e.key == key)
            .ok_or_else(|| Error::environment_not_found(key))
    }

    pub fn is_secret_storage_vault(&self) -> bool {
        self.secret_storage == Some(SecretStorageType::Vault)
    }
}
