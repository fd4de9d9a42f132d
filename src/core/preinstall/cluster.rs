use std::collections::BTreeMap;
use std::net::UdpSocket;

use crate::cloud;
use crate::error::{Error, Result};
use crate::gcloud::{self, GCloud};
use crate::helm::{self, Helm};
use crate::kube::{self, ConfigMap, KubeClient, Namespace, ObjectMeta, Secret};
use crate::naming;
use crate::requirements::{RequirementsConfig, WebhookType};
use crate::utils::io;

const KIND_REGISTRY_PORT: u16 = 5000;

/// Check the namespace is labelled as the team's development environment.
pub fn verify_dev_namespace(kube: &dyn KubeClient, namespace: &str) -> Result<()> {
    let ns = kube.get_namespace(namespace)?.ok_or_else(|| {
        Error::validation_invalid_argument(
            "namespace",
            format!("namespace {} does not exist", namespace),
            Some(namespace.to_string()),
            None,
        )
    })?;
    let labels = &ns.metadata.labels;
    if labels.get(kube::LABEL_TEAM).map_or(true, String::is_empty) {
        return Err(Error::validation_invalid_argument(
            "namespace",
            format!("namespace {} has no team label", namespace),
            Some(namespace.to_string()),
            None,
        ));
    }
    Ok(())
}

/// Create the namespace if needed and label it as the team's development
/// environment.
pub fn ensure_dev_namespace(kube: &dyn KubeClient, namespace: &str) -> Result<()> {
    let mut ns = kube.get_namespace(namespace)?.unwrap_or_else(|| Namespace {
        metadata: ObjectMeta::named(namespace, ""),
    });
    let labels = &mut ns.metadata.labels;
    let before = labels.clone();
    if labels.get(kube::LABEL_TEAM).map_or(true, String::is_empty) {
        labels.insert(kube::LABEL_TEAM.to_string(), namespace.to_string());
    }
    labels.insert(kube::LABEL_ENV.to_string(), kube::LABEL_VALUE_DEV_ENVIRONMENT.to_string());
    if *labels != before {
        crate::log_status!("preinstall", "Labelling namespace {} as the development environment", namespace);
        kube.apply_namespace(&ns)?;
    }
    Ok(())
}

/// Make sure `namespace` exists.
pub fn ensure_namespace(kube: &dyn KubeClient, namespace: &str) -> Result<()> {
    if kube.get_namespace(namespace)?.is_none() {
        crate::log_status!("preinstall", "Creating namespace {}", namespace);
        kube.apply_namespace(&Namespace {
            metadata: ObjectMeta::named(namespace, ""),
        })?;
    }
    Ok(())
}

/// Adjust ingress for clusters without a load balancer.
///
/// Wildcard DNS domains and `NodePort` are cleared unless the load balancer
/// is explicitly ignored. On kind the ingress is exposed on a node port and
/// the registry and domain use `host_ip`. Returns whether anything changed.
pub fn verify_ingress(requirements: &mut RequirementsConfig, host_ip: impl Fn() -> Option<String>) -> bool {
    let mut modified = false;
    let ingress = &mut requirements.ingress;
    if !ingress.ignore_load_balancer {
        if ingress.is_auto_dns_domain() {
            ingress.domain.clear();
            modified = true;
        }
        if ingress.service_type == "NodePort" {
            ingress.service_type.clear();
            modified = true;
        }
    }

    if requirements.cluster.provider == cloud::KIND {
        let ingress = &mut requirements.ingress;
        if ingress.service_type != "NodePort" {
            ingress.service_type = "NodePort".to_string();
            modified = true;
        }
        if !ingress.ignore_load_balancer {
            ingress.ignore_load_balancer = true;
            modified = true;
        }
        let needs_ip = requirements.cluster.registry.is_empty() || ingress.domain.is_empty();
        if needs_ip {
            match host_ip() {
                Some(ip) => {
                    if requirements.cluster.registry.is_empty() {
                        requirements.cluster.registry = format!("{}:{}", ip, KIND_REGISTRY_PORT);
                        modified = true;
                    }
                    if ingress.domain.is_empty() {
                        ingress.domain = format!("{}.nip.io", ip);
                        modified = true;
                    }
                }
                None => crate::log_warn!("preinstall", "could not find the IP address of this host"),
            }
        }
    }
    modified
}

/// IP address of the interface that routes to the internet.
pub fn outbound_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

/// Record the cluster details in the `jx-install-config` config map.
pub fn save_install_config(kube: &dyn KubeClient, namespace: &str, requirements: &RequirementsConfig) -> Result<bool> {
    let existing = kube.get_config_map(namespace, kube::CONFIG_MAP_INSTALL)?;
    let created = existing.is_none();
    let mut config_map = existing.unwrap_or_else(|| ConfigMap {
        metadata: ObjectMeta::named(kube::CONFIG_MAP_INSTALL, namespace),
        data: BTreeMap::new(),
    });

    let cluster = &requirements.cluster;
    let secrets_location = requirements
        .secret_storage
        .map(|s| s.location_kind())
        .unwrap_or_default();
    let data = &mut config_map.data;
    let mut modified = false;
    for (key, value) in [
        (kube::INSTALL_KUBE_PROVIDER, cluster.provider.as_str()),
        (kube::INSTALL_PROJECT_ID, cluster.project_id.as_str()),
        (kube::INSTALL_CLUSTER_NAME, cluster.cluster_name.as_str()),
        (kube::INSTALL_SECRETS_LOCATION, secrets_location),
        (kube::INSTALL_REGION, cluster.region.as_str()),
        (kube::INSTALL_ZONE, cluster.zone.as_str()),
    ] {
        modified |= kube::modify_map_if_not_blank(data, key, value);
    }

    if created || modified {
        kube.apply_config_map(&config_map)
            .map_err(|e| e.with_context(format!("saving {} config map in namespace {}", kube::CONFIG_MAP_INSTALL, namespace)))?;
    }
    Ok(created || modified)
}

/// Helm 2 clients need initialising, and the chart museum repository must be
/// registered.
pub fn verify_helm(helm_client: &dyn Helm, chart_museum_name: &str, chart_museum_url: &str) -> Result<()> {
    let version = helm_client.version()?;
    if !helm::is_helm3(&version) {
        helm_client
            .init_client_only()
            .map_err(|e| e.with_context("initialising the helm 2 client"))?;
    }
    let repos = helm_client.list_repos()?;
    if helm::repo_name_for_url(&repos, chart_museum_url).is_none() {
        crate::log_status!("preinstall", "Adding helm repository {} {}", chart_museum_name, chart_museum_url);
        helm_client.add_repo(chart_museum_name, chart_museum_url)?;
    }
    Ok(())
}

/// Create the Velero secret holding a service account key on GKE.
pub fn verify_velero(
    kube: &dyn KubeClient,
    gcloud_client: &dyn GCloud,
    requirements: &RequirementsConfig,
    lazy_create: bool,
) -> Result<()> {
    let namespace = &requirements.velero.namespace;
    if requirements.cluster.provider != cloud::GKE || namespace.is_empty() {
        return Ok(());
    }
    if kube.get_secret(namespace, kube::SECRET_VELERO)?.is_some() {
        return Ok(());
    }
    if !lazy_create {
        return Err(Error::validation_invalid_argument(
            "velero",
            format!("secret {} does not exist in namespace {}", kube::SECRET_VELERO, namespace),
            Some(namespace.to_string()),
            None,
        )
        .with_hint("run with --lazy-create=true to create the velero service account and secret"));
    }

    let cluster = &requirements.cluster;
    let backup_url = &requirements.storage.backup.url;
    if backup_url.is_empty() {
        return Err(Error::config_missing_key("storage.backup.url", None)
            .with_context("missing requirements.storage.backup.url"));
    }

    let service_account = naming::to_valid_name_truncated(&format!("{}-vo", cluster.cluster_name), 30);
    crate::log_status!("preinstall", "Configuring Velero service account {}", service_account);

    let dir = std::env::temp_dir().join(format!("jx-velero-{}", uuid::Uuid::new_v4().simple()));
    io::ensure_dir(&dir, "create velero key dir")?;
    let result = create_velero_secret(
        kube,
        gcloud_client,
        requirements,
        &service_account,
        backup_url,
        &dir,
    );
    io::remove_dir_all(&dir, "remove velero key dir")?;
    result
}

fn create_velero_secret(
    kube: &dyn KubeClient,
    gcloud_client: &dyn GCloud,
    requirements: &RequirementsConfig,
    service_account: &str,
    backup_url: &str,
    dir: &std::path::Path,
) -> Result<()> {
    let project = &requirements.cluster.project_id;
    let namespace = &requirements.velero.namespace;
    let key_file = gcloud_client
        .get_or_create_service_account(service_account, project, dir, gcloud::VELERO_SERVICE_ACCOUNT_ROLES)
        .map_err(|e| e.with_context("creating the velero service account"))?;
    gcloud_client
        .configure_bucket_roles(project, service_account, backup_url, gcloud::VELERO_SERVICE_ACCOUNT_ROLES)
        .map_err(|e| e.with_context(format!("granting the velero service account access to {}", backup_url)))?;

    let key = io::read_file(&key_file, "read velero service account key")?;
    ensure_namespace(kube, namespace)?;
    let secret = Secret {
        metadata: ObjectMeta::named(kube::SECRET_VELERO, namespace),
        data: BTreeMap::from([("cloud".to_string(), key.into_bytes())]),
    };
    kube.apply_secret(&secret)
        .map_err(|e| e.with_context(format!("creating secret {} in namespace {}", kube::SECRET_VELERO, namespace)))?;
    crate::log_status!("preinstall", "Created secret {} in namespace {}", kube::SECRET_VELERO, namespace);
    Ok(())
}

/// Lighthouse refuses to start without its `config` and `plugins` config
/// maps and their keys.
pub fn verify_lighthouse_config(kube: &dyn KubeClient, namespace: &str, requirements: &RequirementsConfig) -> Result<()> {
    if requirements.webhook != Some(WebhookType::Lighthouse) {
        return Ok(());
    }
    for (name, key, value) in [
        ("config", "config.yaml", "pod_namespace: jx\n"),
        ("plugins", "plugins.yaml", "cat: {}\n"),
    ] {
        let mut config_map = kube.get_config_map(namespace, name)?.unwrap_or_else(|| ConfigMap {
            metadata: ObjectMeta::named(name, namespace),
            data: BTreeMap::new(),
        });
        if config_map.data.contains_key(key) {
            continue;
        }
        config_map.data.insert(key.to_string(), value.to_string());
        kube.apply_config_map(&config_map)
            .map_err(|e| e.with_context(format!("saving lighthouse {} config map", name)))?;
        crate::log_status!("preinstall", "Added {} to lighthouse config map {} in namespace {}", key, name, namespace);
    }
    Ok(())
}
