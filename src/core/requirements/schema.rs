//! Known-property validation for requirements files.
//!
//! Failures are reported as `<path>: <problem>` where the path is dotted
//! (`environments.0.ingress`) and the document root is `(root)`.

use serde_yml::Value;

const ROOT: &[&str] = &[
    "autoUpdate",
    "bootConfigURL",
    "buildPackURL",
    "buildPackRef",
    "cluster",
    "environments",
    "gitops",
    "helmfile",
    "kaniko",
    "ingress",
    "repository",
    "secretStorage",
    "storage",
    "terraform",
    "vault",
    "velero",
    "versionStream",
    "webhook",
];

const AUTO_UPDATE: &[&str] = &["enabled", "schedule"];

const CLUSTER: &[&str] = &[
    "chartRepository",
    "clusterName",
    "devEnvApprovers",
    "dockerRegistryOrg",
    "environmentGitOwner",
    "environmentGitPublic",
    "gitKind",
    "gitName",
    "gitPublic",
    "gitServer",
    "externalDNSSAName",
    "kanikoSAName",
    "namespace",
    "project",
    "provider",
    "region",
    "registry",
    "strictPermissions",
    "zone",
];

const ENVIRONMENT: &[&str] = &[
    "key",
    "owner",
    "repository",
    "gitServer",
    "gitKind",
    "ingress",
    "remoteCluster",
    "promotionStrategy",
    "urlTemplate",
];

const INGRESS: &[&str] = &[
    "cloud_dns_secret_name",
    "domain",
    "domainIssuerURL",
    "externalDNS",
    "ignoreLoadBalancer",
    "kind",
    "namespaceSubDomain",
    "serviceType",
    "tls",
];

const TLS: &[&str] = &["email", "enabled", "production", "secretName"];
const STORAGE: &[&str] = &["logs", "reports", "repository", "backup"];
const STORAGE_ENTRY: &[&str] = &["enabled", "url"];
const VAULT: &[&str] = &["name", "bucket", "keyring", "key", "serviceAccount"];
const VELERO: &[&str] = &["namespace", "schedule", "ttl", "serviceAccount"];
const VERSION_STREAM: &[&str] = &["url", "ref"];

/// Collect every property the requirements model would silently drop.
pub fn validate(document: &Value) -> Vec<String> {
    let mut failures = Vec::new();
    check_object(document, "(root)", ROOT, &mut failures);

    if let Some(value) = document.get("autoUpdate") {
        check_object(value, "autoUpdate", AUTO_UPDATE, &mut failures);
    }
    if let Some(value) = document.get("cluster") {
        check_object(value, "cluster", CLUSTER, &mut failures);
    }
    if let Some(value) = document.get("ingress") {
        check_ingress(value, "ingress", &mut failures);
    }
    if let Some(value) = document.get("storage") {
        check_object(value, "storage", STORAGE, &mut failures);
        for entry in STORAGE {
            if let Some(entry_value) = value.get(*entry) {
                check_object(entry_value, &format!("storage.{}", entry), STORAGE_ENTRY, &mut failures);
            }
        }
    }
    if let Some(value) = document.get("vault") {
        check_object(value, "vault", VAULT, &mut failures);
    }
    if let Some(value) = document.get("velero") {
        check_object(value, "velero", VELERO, &mut failures);
    }
    if let Some(value) = document.get("versionStream") {
        check_object(value, "versionStream", VERSION_STREAM, &mut failures);
    }
    if let Some(value) = document.get("environments") {
        match value.as_sequence() {
            Some(environments) => {
                for (i, env) in environments.iter().enumerate() {
                    let path = format!("environments.{}", i);
                    check_object(env, &path, ENVIRONMENT, &mut failures);
                    if let Some(ingress) = env.get("ingress") {
                        check_ingress(ingress, &format!("{}.ingress", path), &mut failures);
                    }
                }
            }
            None if value.is_null() => {}
            None => failures.push("environments: Invalid type. Expected: array".to_string()),
        }
    }

    failures
}

fn check_ingress(value: &Value, path: &str, failures: &mut Vec<String>) {
    check_object(value, path, INGRESS, failures);
    if let Some(tls) = value.get("tls") {
        check_object(tls, &format!("{}.tls", path), TLS, failures);
    }
}

fn check_object(value: &Value, path: &str, allowed: &[&str], failures: &mut Vec<String>) {
    let Some(mapping) = value.as_mapping() else {
        if !value.is_null() {
            failures.push(format!("{}: Invalid type. Expected: object", path));
        }
        return;
    };
    for key in mapping.keys() {
        match key.as_str() {
            Some(name) if allowed.contains(&name) => {}
            Some(name) => failures.push(format!("{}: Additional property {} is not allowed", path, name)),
            None => failures.push(format!("{}: Invalid property name", path)),
        }
    }
}
