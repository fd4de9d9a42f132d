use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gits::{self, KIND_GITHUB};
use crate::kube::Environment;
use crate::requirements::{EnvironmentConfig, RepositoryType, RequirementsConfig, WebhookType};

/// Default exposecontroller URL template for environment services.
pub const EXPOSE_DEFAULT_URL_TEMPLATE: &str = "{{.Service}}-{{.Namespace}}.{{.Domain}}";

/// Values written into `env/values.yaml` of a new environment repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelmValuesConfig {
    #[serde(rename = "expose", skip_serializing_if = "Option::is_none")]
    pub expose_controller: Option<ExposeController>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposeController {
    #[serde(default)]
    pub config: ExposeControllerConfig,
    #[serde(default)]
    pub production: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposeControllerConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exposer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http: String,
    #[serde(default, rename = "tlsacme", skip_serializing_if = "String::is_empty")]
    pub tls_acme: String,
    #[serde(default, rename = "tlsSecretName", skip_serializing_if = "String::is_empty")]
    pub tls_secret_name: String,
    #[serde(default, rename = "urltemplate", skip_serializing_if = "String::is_empty")]
    pub url_template: String,
}

/// Exposecontroller settings for an environment, from its own ingress
/// config falling back to the cluster domain.
pub fn create_environment_helm_values(requirements: &RequirementsConfig, environment: &Environment) -> Result<HelmValuesConfig> {
    let name = environment.name();
    let env = requirements.environment(name).map_err(|e| {
        e.with_context(format!(
            "looking the configuration of environment {:?} in the requirements configuration",
            name
        ))
    })?;

    let tls = &env.ingress.tls;
    let domain = if env.ingress.domain.is_empty() {
        requirements.ingress.domain.clone()
    } else {
        env.ingress.domain.clone()
    };
    let url_template = if env.url_template.is_empty() {
        EXPOSE_DEFAULT_URL_TEMPLATE.to_string()
    } else {
        env.url_template.clone()
    };

    let mut config = ExposeControllerConfig {
        domain: domain.clone(),
        exposer: "Ingress".to_string(),
        http: (!tls.enabled).to_string(),
        tls_acme: tls.enabled.to_string(),
        url_template,
        ..Default::default()
    };
    // exposecontroller turns TLS on whenever a secret name is present
    if tls.enabled {
        let secret_name = if !tls.secret_name.is_empty() {
            tls.secret_name.clone()
        } else if tls.production {
            format!("tls-{}-p", domain)
        } else {
            format!("tls-{}-s", domain)
        };
        config.tls_secret_name = secret_name.replace('.', "-");
    }

    Ok(HelmValuesConfig {
        expose_controller: Some(ExposeController {
            config,
            production: tls.production,
        }),
    })
}

/// Requirements for an environment repository that does not have any yet.
pub fn new_remote_requirements() -> RequirementsConfig {
    let mut requirements = RequirementsConfig::new();
    requirements.repository = Some(RepositoryType::Unknown);
    requirements
}

fn configure_remote_environment(environment: &Environment, config: &mut EnvironmentConfig) -> Result<()> {
    config.key = "dev".to_string();
    config.promotion_strategy = environment.spec.promotion_strategy.clone();
    config.remote_cluster = environment.spec.remote_cluster;

    let url = &environment.spec.source.url;
    if url.is_empty() {
        return Ok(());
    }
    let info = gits::parse_git_url(url)?;
    if !info.organisation.is_empty() {
        config.owner = info.organisation.clone();
    }
    if !info.name.is_empty() {
        config.repository = info.name.clone();
    }
    if config.git_kind.is_empty() && info.is_github() {
        config.git_kind = KIND_GITHUB.to_string();
    }
    if config.git_server.is_empty() {
        config.git_server = info.host_url();
    }
    Ok(())
}

fn set_if_empty(target: &mut String, value: &str, fallback: &str) {
    if target.is_empty() {
        *target = if value.is_empty() { fallback } else { value }.to_string();
    }
}

/// Derive the requirements of a remote environment repository from the
/// development requirements. The remote repository becomes its own `dev`
/// environment booting into the environment's namespace.
pub fn modify_environment_requirements(
    dev: &RequirementsConfig,
    environment: &mut Environment,
    remote: &mut RequirementsConfig,
) -> Result<()> {
    let mut found = None;
    for (index, config) in remote.environments.iter_mut().enumerate() {
        if config.key == "dev" {
            configure_remote_environment(environment, config)?;
            found = Some(index);
        }
    }
    let owner = match found {
        Some(index) => remote.environments[index].owner.clone(),
        None => {
            let mut config = EnvironmentConfig::default();
            configure_remote_environment(environment, &mut config)?;
            let owner = config.owner.clone();
            remote.environments.push(config);
            owner
        }
    };

    if remote.cluster.dev_env_approvers.is_empty() {
        remote.cluster.dev_env_approvers = dev.cluster.dev_env_approvers.clone();
    }
    remote.gitops = true;
    remote.helmfile = true;
    remote.kaniko = dev.kaniko;
    remote.webhook = Some(WebhookType::Lighthouse);
    remote.secret_storage = dev.secret_storage;
    if !environment.spec.source.url.is_empty() {
        remote.boot_config_url = environment.spec.source.url.clone();
    }

    let cluster = &mut remote.cluster;
    set_if_empty(&mut cluster.provider, &dev.cluster.provider, "");
    set_if_empty(&mut cluster.environment_git_owner, &owner, "");
    cluster.environment_git_public = dev.cluster.environment_git_public;
    set_if_empty(&mut cluster.git_kind, &dev.cluster.git_kind, KIND_GITHUB);
    set_if_empty(&mut cluster.git_name, &dev.cluster.git_name, KIND_GITHUB);
    set_if_empty(&mut cluster.git_server, &dev.cluster.git_server, gits::GITHUB_URL);

    set_if_empty(&mut remote.ingress.kind, &dev.ingress.kind, "");
    if !dev.ingress.service_type.is_empty() && remote.ingress.service_type.is_empty() {
        remote.ingress.service_type = dev.ingress.service_type.clone();
    }

    if environment.spec.namespace.is_empty() {
        environment.spec.namespace = format!("jx-{}", environment.name());
    }
    remote.cluster.namespace = environment.spec.namespace.clone();
    crate::log_status!(
        "environments",
        "setting the remote environment {} requirements namespace to {}",
        environment.name(),
        remote.cluster.namespace
    );

    set_if_empty(&mut remote.version_stream.url, &dev.version_stream.url, "");
    set_if_empty(&mut remote.version_stream.reference, &dev.version_stream.reference, "");
    remote.ingress.ignore_load_balancer = dev.ingress.ignore_load_balancer;
    if remote.ingress.namespace_sub_domain.is_empty() {
        remote.ingress.namespace_sub_domain = format!("-{}.", remote.cluster.namespace);
    }
    set_if_empty(&mut remote.velero.schedule, &dev.velero.schedule, "");
    set_if_empty(&mut remote.velero.time_to_live, &dev.velero.time_to_live, "");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::{EnvironmentKind, EnvironmentSource, EnvironmentSpec, ObjectMeta};
    use crate::requirements::SecretStorageType;

    fn environment(name: &str, url: &str) -> Environment {
        Environment {
            metadata: ObjectMeta::named(name, "jx"),
            spec: EnvironmentSpec {
                kind: Some(EnvironmentKind::Permanent),
                promotion_strategy: "Manual".to_string(),
                remote_cluster: true,
                source: EnvironmentSource {
                    url: url.to_string(),
                    reference: "master".to_string(),
                },
                ..Default::default()
            },
        }
    }

    fn dev_requirements() -> RequirementsConfig {
        let mut dev = RequirementsConfig::new();
        dev.cluster.provider = "gke".to_string();
        dev.cluster.dev_env_approvers = vec!["alice".to_string()];
        dev.cluster.environment_git_public = true;
        dev.secret_storage = Some(SecretStorageType::Vault);
        dev.kaniko = true;
        dev.ingress.ignore_load_balancer = true;
        dev.ingress.service_type = "LoadBalancer".to_string();
        dev.version_stream.url = "https://github.com/jenkins-x/jenkins-x-versions.git".to_string();
        dev.version_stream.reference = "v1.0.10".to_string();
        dev.velero.schedule = "0 * * * *".to_string();
        dev
    }

    #[test]
    fn remote_requirements_boot_the_environment_as_dev() {
        let dev = dev_requirements();
        let mut env = environment("production", "https://github.com/acme/environment-prod.git");
        let mut remote = new_remote_requirements();

        modify_environment_requirements(&dev, &mut env, &mut remote).unwrap();

        let config = remote.environment("dev").unwrap();
        assert_eq!(config.owner, "acme");
        assert_eq!(config.repository, "environment-prod");
        assert_eq!(config.git_kind, "github");
        assert_eq!(config.git_server, "https://github.com");
        assert_eq!(config.promotion_strategy, "Manual");
        assert!(config.remote_cluster);

        assert!(remote.gitops);
        assert!(remote.helmfile);
        assert!(remote.kaniko);
        assert_eq!(remote.webhook, Some(WebhookType::Lighthouse));
        assert_eq!(remote.secret_storage, Some(SecretStorageType::Vault));
        assert_eq!(remote.repository, Some(RepositoryType::Unknown));
        assert_eq!(remote.boot_config_url, "https://github.com/acme/environment-prod.git");
        assert_eq!(remote.cluster.provider, "gke");
        assert_eq!(remote.cluster.environment_git_owner, "acme");
        assert_eq!(remote.cluster.dev_env_approvers, vec!["alice"]);
        assert_eq!(remote.cluster.git_server, "https://github.com");
        assert_eq!(remote.cluster.namespace, "jx-production");
        assert_eq!(env.spec.namespace, "jx-production");
        assert_eq!(remote.ingress.namespace_sub_domain, "-jx-production.");
        assert_eq!(remote.ingress.service_type, "LoadBalancer");
        assert!(remote.ingress.ignore_load_balancer);
        assert_eq!(remote.version_stream.reference, "v1.0.10");
        assert_eq!(remote.velero.schedule, "0 * * * *");
    }

    #[test]
    fn existing_remote_values_are_kept() {
        let dev = dev_requirements();
        let mut env = environment("staging", "https://github.com/acme/environment-staging.git");
        env.spec.namespace = "staging".to_string();
        let mut remote = new_remote_requirements();
        remote.cluster.git_server = "https://github.example.com".to_string();
        remote.cluster.provider = "eks".to_string();

        modify_environment_requirements(&dev, &mut env, &mut remote).unwrap();

        assert_eq!(remote.cluster.git_server, "https://github.example.com");
        assert_eq!(remote.cluster.provider, "eks");
        assert_eq!(remote.cluster.namespace, "staging");
        assert_eq!(remote.environments.iter().filter(|e| e.key == "dev").count(), 1);
    }

    #[test]
    fn helm_values_default_tls_secret_name() {
        let mut requirements = RequirementsConfig::new();
        requirements.ingress.domain = "example.com".to_string();
        let staging = requirements.environments.iter_mut().find(|e| e.key == "staging").unwrap();
        staging.ingress.tls.enabled = true;

        let values = create_environment_helm_values(&requirements, &environment("staging", "")).unwrap();
        let expose = values.expose_controller.unwrap();
        assert_eq!(expose.config.domain, "example.com");
        assert_eq!(expose.config.exposer, "Ingress");
        assert_eq!(expose.config.http, "false");
        assert_eq!(expose.config.tls_acme, "true");
        assert_eq!(expose.config.tls_secret_name, "tls-example-com-s");
        assert_eq!(expose.config.url_template, EXPOSE_DEFAULT_URL_TEMPLATE);
        assert!(!expose.production);
    }

    #[test]
    fn helm_values_without_tls_have_no_secret() {
        let mut requirements = RequirementsConfig::new();
        requirements.ingress.domain = "example.com".to_string();
        let production = requirements.environments.iter_mut().find(|e| e.key == "production").unwrap();
        production.ingress.domain = "prod.example.com".to_string();
        production.url_template = "{{.Service}}.{{.Domain}}".to_string();

        let values = create_environment_helm_values(&requirements, &environment("production", "")).unwrap();
        let config = values.expose_controller.unwrap().config;
        assert_eq!(config.domain, "prod.example.com");
        assert_eq!(config.http, "true");
        assert!(config.tls_secret_name.is_empty());
        assert_eq!(config.url_template, "{{.Service}}.{{.Domain}}");

        assert!(create_environment_helm_values(&requirements, &environment("qa", "")).is_err());
    }
}
