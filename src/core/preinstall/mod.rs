//! Checks a cluster and its requirements before booting Jenkins X into it,
//! creating what is missing along the way.

mod cluster;
mod gather;
mod storage;
mod validate;

pub use cluster::{
    ensure_dev_namespace, ensure_namespace, outbound_ip, save_install_config, verify_dev_namespace, verify_helm,
    verify_ingress, verify_lighthouse_config, verify_velero,
};
pub use gather::{check_batch_requirements, gather_git_requirements, gather_requirements, normalize_cluster, write_owners_file, Owners};
pub use storage::verify_storage;
pub use validate::{
    default_environment_repositories, deploy_namespace, validate_requirements, validate_secrets_yaml, verify_tls,
    DEFAULT_SECRETS_YAML,
};

use serde::Serialize;
use std::path::PathBuf;

use crate::buckets::{self, BucketProvider};
use crate::cloud;
use crate::defaults::Defaults;
use crate::error::Result;
use crate::gcloud::GCloud;
use crate::gits::Gitter;
use crate::helm::Helm;
use crate::kube::KubeClient;
use crate::packages::{self, PackageProbe};
use crate::prompt::Prompter;
use crate::requirements;
use crate::versionstream::VersionResolver;

#[derive(Debug, Clone, Default)]
pub struct PreinstallOptions {
    pub dir: PathBuf,
    /// `true`, `false` or empty to decide from the requirements.
    pub lazy_create_flag: String,
    pub namespace: String,
    pub provider_values_dir: Option<PathBuf>,
    pub workload_identity: bool,
    pub disable_verify_packages: bool,
    pub disable_verify_helm: bool,
    pub default_helmfile_secrets: bool,
    pub no_secret_yaml_validate: bool,
    pub in_cluster: bool,
    pub versions_dir: PathBuf,
    pub defaults: Defaults,
}

/// Everything preinstall talks to outside the process.
pub struct Clients<'a> {
    pub kube: &'a dyn KubeClient,
    pub helm: &'a dyn Helm,
    pub gitter: &'a dyn Gitter,
    pub gcloud: &'a dyn GCloud,
    pub prompter: &'a dyn Prompter,
    pub packages: &'a dyn PackageProbe,
    /// Bucket provider override; `None` picks one from the cluster provider.
    pub buckets: Option<&'a dyn BucketProvider>,
}

/// Environment variables preinstall reads.
#[derive(Debug, Clone, Default)]
pub struct PreinstallEnv {
    pub secrets_yaml: Option<String>,
    pub deploy_namespace: Option<String>,
    pub versions_repo_url: Option<String>,
    pub versions_repo_ref: Option<String>,
    pub override_tls_warning: bool,
}

impl PreinstallEnv {
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            secrets_yaml: var("JX_SECRETS_YAML"),
            deploy_namespace: var("DEPLOY_NAMESPACE"),
            versions_repo_url: var("JX_VERSIONS_REPO_URL"),
            versions_repo_ref: var("JX_VERSIONS_REPO_REF"),
            override_tls_warning: var("JX_OVERRIDE_TLS_WARNING").is_some_and(|v| v == "true"),
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreinstallReport {
    pub requirements_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets_yaml: Option<String>,
    pub namespace: String,
    pub provider: String,
    pub cluster_name: String,
    pub lazy_create: bool,
}

/// Run every preinstall check in order, stopping at the first failure.
pub fn run(options: &PreinstallOptions, clients: &Clients<'_>, env: &PreinstallEnv) -> Result<PreinstallReport> {
    let (mut requirements, file) = requirements::load_requirements_config(&options.dir, true)?;
    requirements.override_from_environment();
    let mut report = PreinstallReport {
        requirements_file: file.display().to_string(),
        ..Default::default()
    };

    if requirements.helmfile && !options.no_secret_yaml_validate {
        let secrets = validate_secrets_yaml(env.secrets_yaml.as_deref(), options.default_helmfile_secrets)?;
        std::env::set_var("JX_SECRETS_YAML", &secrets);
        report.secrets_yaml = Some(secrets.display().to_string());
    }

    gather_requirements(&mut requirements, &file, options, clients, env)
        .map_err(|e| e.with_context("error gathering requirements"))?;

    if validate_requirements(&mut requirements, &file, &options.defaults.charts.bucket_repo_charts_url)? {
        requirements.save_config(&file)?;
    }

    let lazy_create = requirements.is_lazy_create_secrets(&options.lazy_create_flag)?;
    let namespace = deploy_namespace(&options.namespace, &requirements, env.deploy_namespace.as_deref());
    crate::log_status!("preinstall", "Booting into namespace {} with lazy create {}", namespace, lazy_create);

    verify_tls(&requirements, clients.prompter, env.override_tls_warning, &options.defaults.tls_doc_url)?;

    let kube = clients.kube;
    if let Err(err) = verify_dev_namespace(kube, &namespace) {
        if !lazy_create {
            return Err(err.with_hint("run with --lazy-create=true to create and label the namespace"));
        }
        ensure_dev_namespace(kube, &namespace)?;
        verify_dev_namespace(kube, &namespace)?;
    }

    if verify_ingress(&mut requirements, outbound_ip) {
        requirements.save_config(&file)?;
    }

    kube.set_current_namespace(&namespace)
        .map_err(|e| e.with_context(format!("switching to namespace {}", namespace)))?;

    if !options.disable_verify_packages {
        let resolver = VersionResolver::new(&options.versions_dir);
        packages::verify_packages(clients.packages, packages::REQUIRED_PACKAGES, Some(&resolver))?;
    }

    save_install_config(kube, &namespace, &requirements)?;

    let owned_buckets;
    let bucket_provider = match clients.buckets {
        Some(provider) => Some(provider),
        None => {
            owned_buckets = buckets::provider_for(&requirements);
            owned_buckets.as_deref()
        }
    };
    verify_storage(&mut requirements, &file, bucket_provider, clients.prompter)?;

    if !requirements.helmfile && !options.disable_verify_helm {
        verify_helm(
            clients.helm,
            &options.defaults.charts.chart_museum_repo_name,
            &options.defaults.charts.chart_museum_url,
        )?;
    }

    verify_velero(kube, clients.gcloud, &requirements, lazy_create)?;
    verify_lighthouse_config(kube, &namespace, &requirements)?;

    if lazy_create && (requirements.cluster.provider == cloud::EKS || requirements.cluster.provider == cloud::AWS) {
        let values_dir = options
            .provider_values_dir
            .clone()
            .unwrap_or_else(|| options.versions_dir.join("kubeProviders"));
        crate::log_warn!(
            "preinstall",
            "service accounts for EKS are not created lazily, make sure the IAM roles described in {} exist",
            values_dir.display()
        );
    }

    crate::log_status!("preinstall", "Cluster looks good, you are ready to 'jx boot' now!");
    report.namespace = namespace;
    report.provider = requirements.cluster.provider.clone();
    report.cluster_name = requirements.cluster.cluster_name.clone();
    report.lazy_create = lazy_create;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::{RequirementsConfig, WebhookType};
    use crate::testing::{FakeBuckets, FakeGCloud, FakeGit, FakeHelm, FakeKube, ScriptedPrompter};
    use semver::Version;
    use std::collections::BTreeMap;
    use std::fs;

    struct Installed;

    impl PackageProbe for Installed {
        fn installed_version(&self, _package: &str) -> Result<Option<Version>> {
            Ok(Some(Version::new(9, 9, 9)))
        }
    }

    fn requirements_dir() -> tempfile::TempDir {
        requirements_dir_with(false)
    }

    fn requirements_dir_with(helmfile: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut requirements = RequirementsConfig::new();
        requirements.helmfile = helmfile;
        requirements.cluster.provider = cloud::GKE.to_string();
        requirements.cluster.project_id = "my-project".to_string();
        requirements.cluster.zone = "europe-west1-b".to_string();
        requirements.cluster.cluster_name = "dev".to_string();
        requirements.cluster.environment_git_owner = "acme".to_string();
        requirements.cluster.git_server = "https://github.com".to_string();
        requirements.webhook = Some(WebhookType::Lighthouse);
        requirements.storage.logs.enabled = true;
        requirements.ingress.tls.enabled = true;
        requirements.save_config(&dir.path().join("jx-requirements.yml")).unwrap();
        dir
    }

    fn options(dir: &std::path::Path) -> PreinstallOptions {
        PreinstallOptions {
            dir: dir.to_path_buf(),
            versions_dir: dir.join("versions"),
            ..Default::default()
        }
    }

    #[test]
    fn batch_run_prepares_the_cluster() {
        let dir = requirements_dir();
        let kube = FakeKube::new("default");
        let helm = FakeHelm::new(Version::new(3, 2, 4));
        let git = FakeGit {
            tags: vec!["v1.0.10".to_string()],
            ..Default::default()
        };
        let gcloud = FakeGCloud::default();
        let prompter = ScriptedPrompter::batch();
        let buckets = FakeBuckets::default();
        let clients = Clients {
            kube: &kube,
            helm: &helm,
            gitter: &git,
            gcloud: &gcloud,
            prompter: &prompter,
            packages: &Installed,
            buckets: Some(&buckets),
        };

        let report = run(&options(dir.path()), &clients, &PreinstallEnv::default()).unwrap();

        assert_eq!(report.namespace, "jx");
        assert!(report.lazy_create);
        assert_eq!(*kube.current_namespace.borrow(), "jx");
        let labels = kube.get_namespace("jx").unwrap().unwrap().metadata.labels;
        assert_eq!(labels, BTreeMap::from([("env".to_string(), "dev".to_string()), ("team".to_string(), "jx".to_string())]));
        assert!(kube.config_map("jx", "jx-install-config").is_some());
        assert!(kube.config_map("jx", "config").is_some());
        assert!(helm.repos.borrow().contains_key("jenkins-x"));
        assert!(report.secrets_yaml.is_none());
        assert!(!dir.path().join("secrets.yaml").exists());

        let saved = fs::read_to_string(dir.path().join("jx-requirements.yml")).unwrap();
        assert!(saved.contains("environment-dev-staging"));
        assert!(saved.contains("v1.0.10"));
    }

    #[test]
    fn helmfile_installs_get_a_default_secrets_file() {
        let dir = requirements_dir_with(true);
        let kube = FakeKube::new("default");
        let helm = FakeHelm::new(Version::new(3, 2, 4));
        let git = FakeGit {
            tags: vec!["v1.0.10".to_string()],
            ..Default::default()
        };
        let gcloud = FakeGCloud::default();
        let prompter = ScriptedPrompter::batch();
        let buckets = FakeBuckets::default();
        let clients = Clients {
            kube: &kube,
            helm: &helm,
            gitter: &git,
            gcloud: &gcloud,
            prompter: &prompter,
            packages: &Installed,
            buckets: Some(&buckets),
        };
        let secrets = dir.path().join("secrets.yaml");
        let env = PreinstallEnv {
            secrets_yaml: Some(secrets.display().to_string()),
            ..Default::default()
        };

        let report = run(&options(dir.path()), &clients, &env).unwrap();

        assert_eq!(report.secrets_yaml, Some(secrets.display().to_string()));
        assert!(secrets.exists());
        assert!(!helm.repos.borrow().contains_key("jenkins-x"));
    }

    #[test]
    fn helmfile_installs_need_a_secrets_file() {
        let dir = requirements_dir_with(true);
        let kube = FakeKube::new("default");
        let helm = FakeHelm::new(Version::new(3, 2, 4));
        let git = FakeGit::default();
        let gcloud = FakeGCloud::default();
        let prompter = ScriptedPrompter::batch();
        let clients = Clients {
            kube: &kube,
            helm: &helm,
            gitter: &git,
            gcloud: &gcloud,
            prompter: &prompter,
            packages: &Installed,
            buckets: None,
        };

        let err = run(&options(dir.path()), &clients, &PreinstallEnv::default()).unwrap_err();
        assert!(err.message.starts_with("no $JX_SECRETS_YAML environment variable defined."));
        assert!(kube.get_namespace("jx").unwrap().is_none());
    }

    #[test]
    fn unlabelled_namespace_fails_without_lazy_create() {
        let dir = requirements_dir();
        let kube = FakeKube::new("default");
        let helm = FakeHelm::new(Version::new(3, 2, 4));
        let git = FakeGit::default();
        let gcloud = FakeGCloud::default();
        let prompter = ScriptedPrompter::batch();
        let clients = Clients {
            kube: &kube,
            helm: &helm,
            gitter: &git,
            gcloud: &gcloud,
            prompter: &prompter,
            packages: &Installed,
            buckets: None,
        };
        let mut opts = options(dir.path());
        opts.lazy_create_flag = "false".to_string();
        opts.no_secret_yaml_validate = true;

        let err = run(&opts, &clients, &PreinstallEnv::default()).unwrap_err();
        assert_eq!(err.message, "namespace jx does not exist");
        assert!(kube.get_namespace("jx").unwrap().is_none());
    }
}
