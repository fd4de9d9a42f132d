//! Cluster access through `kubectl`.
//!
//! Reads use `-o json`; writes pipe a manifest into `kubectl apply -f -`, so
//! creating and updating a resource are the same call.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::utils::command;

pub const LABEL_TEAM: &str = "team";
pub const LABEL_ENV: &str = "env";
pub const LABEL_VALUE_DEV_ENVIRONMENT: &str = "dev";

pub const CONFIG_MAP_INSTALL: &str = "jx-install-config";
pub const INSTALL_KUBE_PROVIDER: &str = "kubeProvider";
pub const INSTALL_PROJECT_ID: &str = "projectID";
pub const INSTALL_CLUSTER_NAME: &str = "clusterName";
pub const INSTALL_SECRETS_LOCATION: &str = "secretsLocation";
pub const INSTALL_REGION: &str = "region";
pub const INSTALL_ZONE: &str = "zone";

pub const SECRET_VELERO: &str = "velero-secret";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn named(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMap {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// A secret with its data already base64 decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secret {
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentKind {
    Development,
    Permanent,
    Preview,
    Test,
    Edit,
    #[serde(other)]
    Unknown,
}

/// The `jenkins.io/v1` Environment custom resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: EnvironmentSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EnvironmentKind>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub promotion_strategy: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub source: EnvironmentSource,
    #[serde(default)]
    pub team_settings: TeamSettings,
    #[serde(default, skip_serializing_if = "crate::requirements::is_false")]
    pub remote_cluster: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub reference: String,
}

/// Team settings stored on the dev environment. Only the fields this tool
/// reads or writes are typed; everything else round trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub boot_requirements: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_server: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Environment {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn kind(&self) -> EnvironmentKind {
        self.spec.kind.unwrap_or(EnvironmentKind::Unknown)
    }

    pub fn is_development(&self) -> bool {
        self.kind() == EnvironmentKind::Development
    }
}

/// Sort environments by `order`, then name.
pub fn sort_environments(environments: &mut [Environment]) {
    environments.sort_by(|a, b| {
        a.spec
            .order
            .cmp(&b.spec.order)
            .then_with(|| a.metadata.name.cmp(&b.metadata.name))
    });
}

/// The cluster operations the verify and generate commands need.
pub trait KubeClient {
    fn current_context(&self) -> Result<String>;
    /// Namespace of the current context, `default` when unset.
    fn current_namespace(&self) -> Result<String>;
    fn set_current_namespace(&self, namespace: &str) -> Result<()>;

    fn list_namespaces(&self) -> Result<Vec<String>>;
    fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;
    fn apply_namespace(&self, namespace: &Namespace) -> Result<()>;

    fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;
    fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;
    fn apply_secret(&self, secret: &Secret) -> Result<()>;

    fn list_environments(&self, namespace: &str) -> Result<Vec<Environment>>;
    fn apply_environment(&self, environment: &Environment) -> Result<()>;
}

/// [`KubeClient`] shelling out to `kubectl`.
#[derive(Debug, Default)]
pub struct Kubectl {
    context: Option<String>,
}

#[derive(Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct RawSecret {
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

impl Kubectl {
    pub fn new() -> Self {
        Self { context: None }
    }

    /// Pin every call to a kube context instead of the current one.
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
        }
    }

    fn args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut all = Vec::with_capacity(args.len() + 2);
        if let Some(context) = &self.context {
            all.push("--context");
            all.push(context.as_str());
        }
        all.extend_from_slice(args);
        all
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let args = self.args(args);
        let output = command::capture("kubectl", &args, None)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::kube_command_failed(output.failure_details(&args)))
        }
    }

    /// `kubectl get ... -o json`, `None` when the object does not exist.
    fn get_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<Option<T>> {
        let mut all = args.to_vec();
        all.extend_from_slice(&["-o", "json"]);
        let args = self.args(&all);
        let output = command::capture("kubectl", &args, None)?;
        if !output.success {
            if output.stderr.contains("NotFound") || output.stderr.contains("not found") {
                return Ok(None);
            }
            return Err(Error::kube_command_failed(output.failure_details(&args)));
        }
        parse_json(&output.stdout, &args.join(" ")).map(Some)
    }

    fn apply(&self, manifest: &Value) -> Result<()> {
        let input = serde_json::to_string(manifest)
            .map_err(|e| Error::internal_json(e.to_string(), Some("marshal manifest".to_string())))?;
        let args = self.args(&["apply", "-f", "-"]);
        let output = command::capture_with_stdin("kubectl", &args, &input)?;
        if output.success {
            Ok(())
        } else {
            Err(Error::kube_command_failed(output.failure_details(&args)))
        }
    }
}

fn parse_json<T: DeserializeOwned>(text: &str, context: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::internal_json(e.to_string(), Some(context.to_string())))
}

fn to_manifest<T: Serialize>(api_version: &str, kind: &str, object: &T) -> Result<Value> {
    let mut value = serde_json::to_value(object)
        .map_err(|e| Error::internal_json(e.to_string(), Some(format!("marshal {}", kind))))?;
    if let Some(map) = value.as_object_mut() {
        map.insert("apiVersion".to_string(), json!(api_version));
        map.insert("kind".to_string(), json!(kind));
    }
    Ok(value)
}

impl KubeClient for Kubectl {
    fn current_context(&self) -> Result<String> {
        if let Some(context) = &self.context {
            return Ok(context.clone());
        }
        self.run(&["config", "current-context"])
    }

    fn current_namespace(&self) -> Result<String> {
        let ns = self.run(&["config", "view", "--minify", "-o", "jsonpath={..namespace}"])?;
        Ok(if ns.trim().is_empty() {
            "default".to_string()
        } else {
            ns.trim().to_string()
        })
    }

    fn set_current_namespace(&self, namespace: &str) -> Result<()> {
        let flag = format!("--namespace={}", namespace);
        self.run(&["config", "set-context", "--current", flag.as_str()]).map(|_| ())
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        let list: Option<List<Namespace>> = self.get_json(&["get", "namespaces"])?;
        Ok(list
            .map(|l| l.items.into_iter().map(|ns| ns.metadata.name).collect())
            .unwrap_or_default())
    }

    fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        self.get_json(&["get", "namespace", name])
    }

    fn apply_namespace(&self, namespace: &Namespace) -> Result<()> {
        self.apply(&to_manifest("v1", "Namespace", namespace)?)
    }

    fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        self.get_json(&["get", "configmap", name, "-n", namespace])
    }

    fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        self.apply(&to_manifest("v1", "ConfigMap", config_map)?)
    }

    fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let raw: Option<RawSecret> = self.get_json(&["get", "secret", name, "-n", namespace])?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let mut data = BTreeMap::new();
        for (key, value) in raw.data {
            let decoded = BASE64.decode(value.as_bytes()).map_err(|e| {
                Error::internal_unexpected(format!("secret {}/{} key {} is not base64: {}", namespace, name, key, e))
            })?;
            data.insert(key, decoded);
        }
        Ok(Some(Secret {
            metadata: raw.metadata,
            data,
        }))
    }

    fn apply_secret(&self, secret: &Secret) -> Result<()> {
        let data: BTreeMap<&String, String> = secret
            .data
            .iter()
            .map(|(k, v)| (k, BASE64.encode(v)))
            .collect();
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "type": "Opaque",
            "metadata": secret.metadata,
            "data": data,
        });
        self.apply(&manifest)
    }

    fn list_environments(&self, namespace: &str) -> Result<Vec<Environment>> {
        let list: Option<List<Environment>> =
            self.get_json(&["get", "environments.jenkins.io", "-n", namespace])?;
        Ok(list.map(|l| l.items).unwrap_or_default())
    }

    fn apply_environment(&self, environment: &Environment) -> Result<()> {
        self.apply(&to_manifest("jenkins.io/v1", "Environment", environment)?)
    }
}

/// Look up the Environment resources of `namespace` by name, sorted by
/// order then name.
pub fn get_environments(kube: &dyn KubeClient, namespace: &str) -> Result<Vec<Environment>> {
    let mut environments = kube
        .list_environments(namespace)
        .map_err(|e| e.with_context(format!("failed to load Environments in namespace {}", namespace)))?;
    sort_environments(&mut environments);
    Ok(environments)
}

/// Set `key` in the config map data when `value` is not blank.
/// Returns whether anything changed.
pub fn modify_map_if_not_blank(data: &mut BTreeMap<String, String>, key: &str, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    if data.get(key).map(String::as_str) == Some(value) {
        return false;
    }
    data.insert(key.to_string(), value.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environments_sort_by_order_then_name() {
        let env = |name: &str, order: i32| Environment {
            metadata: ObjectMeta::named(name, "jx"),
            spec: EnvironmentSpec {
                order,
                ..Default::default()
            },
        };
        let mut environments = vec![env("production", 200), env("staging", 100), env("dev", 0), env("alpha", 100)];
        sort_environments(&mut environments);
        let names: Vec<&str> = environments.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["dev", "alpha", "staging", "production"]);
    }

    #[test]
    fn environment_resource_parses() {
        let json = r#"{
            "apiVersion": "jenkins.io/v1",
            "kind": "Environment",
            "metadata": {"name": "dev", "namespace": "jx", "labels": {"env": "dev", "team": "jx"}},
            "spec": {
                "kind": "Development",
                "namespace": "jx",
                "order": 0,
                "promotionStrategy": "Never",
                "source": {"url": "https://github.com/acme/environment-demo-dev.git", "ref": "master"},
                "teamSettings": {"gitServer": "https://github.com", "promotionEngine": "Prow"}
            }
        }"#;
        let env: Environment = serde_json::from_str(json).unwrap();
        assert!(env.is_development());
        assert_eq!(env.spec.source.reference, "master");
        assert_eq!(env.spec.team_settings.git_server, "https://github.com");
        assert_eq!(env.spec.team_settings.extra["promotionEngine"], "Prow");

        let manifest = to_manifest("jenkins.io/v1", "Environment", &env).unwrap();
        assert_eq!(manifest["kind"], "Environment");
        assert_eq!(manifest["spec"]["teamSettings"]["promotionEngine"], "Prow");
    }

    #[test]
    fn unknown_environment_kind_is_tolerated() {
        let env: Environment =
            serde_json::from_str(r#"{"metadata": {"name": "x"}, "spec": {"kind": "Sandbox"}}"#).unwrap();
        assert_eq!(env.kind(), EnvironmentKind::Unknown);
    }

    #[test]
    fn blank_values_leave_map_untouched() {
        let mut data = BTreeMap::new();
        assert!(modify_map_if_not_blank(&mut data, INSTALL_KUBE_PROVIDER, "gke"));
        assert!(!modify_map_if_not_blank(&mut data, INSTALL_KUBE_PROVIDER, "gke"));
        assert!(!modify_map_if_not_blank(&mut data, INSTALL_ZONE, ""));
        assert_eq!(data.len(), 1);
    }
}
