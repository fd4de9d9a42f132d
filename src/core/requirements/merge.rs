//! Field level merge of requirements.
//!
//! A value set in the changed config (non-empty string, `true`, `Some`,
//! non-empty list) replaces the current one; unset values never clear
//! anything. Environments are matched by `key` and merged recursively,
//! environments only present in the changed config are appended.

use super::{
    AutoUpdateConfig, ClusterConfig, EnvironmentConfig, IngressConfig, RequirementsConfig,
    StorageConfig, StorageEntryConfig, TlsConfig, VaultConfig, VeleroConfig, VersionStreamConfig,
};

pub trait Merge {
    fn merge(&mut self, changed: &Self);
}

fn string(current: &mut String, changed: &str) {
    if !changed.is_empty() {
        *current = changed.to_string();
    }
}

fn flag(current: &mut bool, changed: bool) {
    if changed {
        *current = true;
    }
}

fn option<T: Clone>(current: &mut Option<T>, changed: &Option<T>) {
    if changed.is_some() {
        current.clone_from(changed);
    }
}

fn list<T: Clone>(current: &mut Vec<T>, changed: &[T]) {
    if !changed.is_empty() {
        *current = changed.to_vec();
    }
}

impl Merge for RequirementsConfig {
    fn merge(&mut self, changed: &Self) {
        self.auto_update.merge(&changed.auto_update);
        string(&mut self.boot_config_url, &changed.boot_config_url);
        string(&mut self.build_pack_url, &changed.build_pack_url);
        string(&mut self.build_pack_ref, &changed.build_pack_ref);
        self.cluster.merge(&changed.cluster);
        merge_environments(&mut self.environments, &changed.environments);
        flag(&mut self.gitops, changed.gitops);
        flag(&mut self.helmfile, changed.helmfile);
        flag(&mut self.kaniko, changed.kaniko);
        self.ingress.merge(&changed.ingress);
        option(&mut self.repository, &changed.repository);
        option(&mut self.secret_storage, &changed.secret_storage);
        self.storage.merge(&changed.storage);
        flag(&mut self.terraform, changed.terraform);
        self.vault.merge(&changed.vault);
        self.velero.merge(&changed.velero);
        self.version_stream.merge(&changed.version_stream);
        option(&mut self.webhook, &changed.webhook);
    }
}

fn merge_environments(current: &mut Vec<EnvironmentConfig>, changed: &[EnvironmentConfig]) {
    for env in changed {
        match current.iter_mut().find(|e| e.key == env.key) {
            Some(existing) => existing.merge(env),
            None => current.push(env.clone()),
        }
    }
}

impl Merge for AutoUpdateConfig {
    fn merge(&mut self, changed: &Self) {
        flag(&mut self.enabled, changed.enabled);
        string(&mut self.schedule, &changed.schedule);
    }
}

impl Merge for ClusterConfig {
    fn merge(&mut self, changed: &Self) {
        string(&mut self.chart_repository, &changed.chart_repository);
        string(&mut self.cluster_name, &changed.cluster_name);
        list(&mut self.dev_env_approvers, &changed.dev_env_approvers);
        string(&mut self.docker_registry_org, &changed.docker_registry_org);
        string(&mut self.environment_git_owner, &changed.environment_git_owner);
        flag(&mut self.environment_git_public, changed.environment_git_public);
        string(&mut self.git_kind, &changed.git_kind);
        string(&mut self.git_name, &changed.git_name);
        flag(&mut self.git_public, changed.git_public);
        string(&mut self.git_server, &changed.git_server);
        string(&mut self.external_dns_sa_name, &changed.external_dns_sa_name);
        string(&mut self.kaniko_sa_name, &changed.kaniko_sa_name);
        string(&mut self.namespace, &changed.namespace);
        string(&mut self.project_id, &changed.project_id);
        string(&mut self.provider, &changed.provider);
        string(&mut self.region, &changed.region);
        string(&mut self.registry, &changed.registry);
        flag(&mut self.strict_permissions, changed.strict_permissions);
        string(&mut self.zone, &changed.zone);
    }
}

impl Merge for EnvironmentConfig {
    fn merge(&mut self, changed: &Self) {
        string(&mut self.owner, &changed.owner);
        string(&mut self.repository, &changed.repository);
        string(&mut self.git_server, &changed.git_server);
        string(&mut self.git_kind, &changed.git_kind);
        self.ingress.merge(&changed.ingress);
        flag(&mut self.remote_cluster, changed.remote_cluster);
        string(&mut self.promotion_strategy, &changed.promotion_strategy);
        string(&mut self.url_template, &changed.url_template);
    }
}

impl Merge for IngressConfig {
    fn merge(&mut self, changed: &Self) {
        string(&mut self.cloud_dns_secret_name, &changed.cloud_dns_secret_name);
        string(&mut self.domain, &changed.domain);
        string(&mut self.domain_issuer_url, &changed.domain_issuer_url);
        flag(&mut self.external_dns, changed.external_dns);
        flag(&mut self.ignore_load_balancer, changed.ignore_load_balancer);
        string(&mut self.kind, &changed.kind);
        string(&mut self.namespace_sub_domain, &changed.namespace_sub_domain);
        string(&mut self.service_type, &changed.service_type);
        self.tls.merge(&changed.tls);
    }
}

impl Merge for TlsConfig {
    fn merge(&mut self, changed: &Self) {
        string(&mut self.email, &changed.email);
        flag(&mut self.enabled, changed.enabled);
        flag(&mut self.production, changed.production);
        string(&mut self.secret_name, &changed.secret_name);
    }
}

impl Merge for StorageConfig {
    fn merge(&mut self, changed: &Self) {
        self.logs.merge(&changed.logs);
        self.reports.merge(&changed.reports);
        self.repository.merge(&changed.repository);
        self.backup.merge(&changed.backup);
    }
}

impl Merge for StorageEntryConfig {
    fn merge(&mut self, changed: &Self) {
        flag(&mut self.enabled, changed.enabled);
        string(&mut self.url, &changed.url);
    }
}

impl Merge for VaultConfig {
    fn merge(&mut self, changed: &Self) {
        string(&mut self.name, &changed.name);
        string(&mut self.bucket, &changed.bucket);
        string(&mut self.keyring, &changed.keyring);
        string(&mut self.key, &changed.key);
        string(&mut self.service_account, &changed.service_account);
    }
}

impl Merge for VeleroConfig {
    fn merge(&mut self, changed: &Self) {
        string(&mut self.namespace, &changed.namespace);
        string(&mut self.schedule, &changed.schedule);
        string(&mut self.time_to_live, &changed.time_to_live);
        string(&mut self.service_account, &changed.service_account);
    }
}

impl Merge for VersionStreamConfig {
    fn merge(&mut self, changed: &Self) {
        string(&mut self.url, &changed.url);
        string(&mut self.reference, &changed.reference);
    }
}
