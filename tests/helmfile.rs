use semver::Version;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use jx::defaults::Defaults;
use jx::envctx::EnvironmentContext;
use jx::helm::Helm;
use jx::helmfile::{self, GenerateOptions, GeneratedValues, HelmState};
use jx::kube::{ConfigMap, Environment, KubeClient, Namespace, Secret};
use jx::requirements::{RequirementsConfig, REQUIREMENTS_VALUES_FILE_NAME};
use jx::versionstream::VersionResolver;
use jx::yaml;
use jx::Result;

struct Cluster {
    namespaces: Vec<String>,
}

impl KubeClient for Cluster {
    fn current_context(&self) -> Result<String> {
        Ok("kind-dev".to_string())
    }

    fn current_namespace(&self) -> Result<String> {
        Ok("jx".to_string())
    }

    fn set_current_namespace(&self, _namespace: &str) -> Result<()> {
        Ok(())
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.clone())
    }

    fn get_namespace(&self, _name: &str) -> Result<Option<Namespace>> {
        Ok(None)
    }

    fn apply_namespace(&self, _namespace: &Namespace) -> Result<()> {
        Ok(())
    }

    fn get_config_map(&self, _namespace: &str, _name: &str) -> Result<Option<ConfigMap>> {
        Ok(None)
    }

    fn apply_config_map(&self, _config_map: &ConfigMap) -> Result<()> {
        Ok(())
    }

    fn get_secret(&self, _namespace: &str, _name: &str) -> Result<Option<Secret>> {
        Ok(None)
    }

    fn apply_secret(&self, _secret: &Secret) -> Result<()> {
        Ok(())
    }

    fn list_environments(&self, _namespace: &str) -> Result<Vec<Environment>> {
        Ok(Vec::new())
    }

    fn apply_environment(&self, _environment: &Environment) -> Result<()> {
        Ok(())
    }
}

struct NoRepos;

impl Helm for NoRepos {
    fn version(&self) -> Result<Version> {
        Ok(Version::new(3, 2, 4))
    }

    fn list_repos(&self) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    fn add_repo(&self, _name: &str, _url: &str) -> Result<()> {
        Ok(())
    }

    fn init_client_only(&self) -> Result<()> {
        Ok(())
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn version_stream(root: &Path) {
    write(
        &root.join("charts/repositories.yml"),
        "repositories:\n- prefix: jenkins-x\n  urls:\n  - https://storage.googleapis.com/chartmuseum.jenkins-x.io\n",
    );
    write(&root.join("charts/jenkins-x/tekton.yml"), "version: 0.0.57\n");
    write(&root.join("charts/jenkins-x/lighthouse.yml"), "version: 0.0.633\n");
    write(
        &root.join("apps/jenkins-x/lighthouse/defaults.yml"),
        "namespace: jx\nphase: system\nhooks:\n- name: crds\n  events: [presync]\n  command: kubectl\n  args: [apply, -f, crds]\n",
    );
    write(&root.join("apps/jenkins-x/lighthouse/values.yaml"), "replicas: 1\n");
}

fn context(stream: &Path) -> EnvironmentContext {
    let mut requirements = RequirementsConfig::new();
    requirements.cluster.cluster_name = "dev".to_string();
    EnvironmentContext::new(requirements, VersionResolver::new(stream), "jx")
}

fn options(dir: &Path) -> GenerateOptions {
    GenerateOptions {
        dir: dir.to_path_buf(),
        defaults: Defaults::default(),
        ..Default::default()
    }
}

#[test]
fn generates_phase_helmfiles_from_apps() {
    let stream = tempfile::tempdir().unwrap();
    version_stream(stream.path());
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("jx-apps.yml"),
        "apps:\n- name: jenkins-x/lighthouse\n- name: jenkins-x/tekton\n  namespace: tekton-pipelines\n",
    );
    write(&dir.path().join("system/lighthouse/values.yaml"), "image: {}\n");
    write(&dir.path().join("apps/generated/stale/values.yaml"), "namespaces: [stale]\n");

    let cluster = Cluster {
        namespaces: vec!["jx".to_string(), "kube-system".to_string()],
    };
    let files = helmfile::generate(&options(dir.path()), &context(stream.path()), &cluster, &NoRepos).unwrap();
    assert_eq!(
        files,
        vec![dir.path().join("apps/helmfile.yaml"), dir.path().join("system/helmfile.yaml")]
    );
    assert!(dir.path().join(REQUIREMENTS_VALUES_FILE_NAME).exists());

    let apps: HelmState = yaml::read_file(&files[0]).unwrap();
    assert_eq!(apps.bases, vec!["../environments.yaml"]);
    assert!(apps.helm_defaults.atomic && apps.helm_defaults.wait);
    assert_eq!(apps.helm_defaults.timeout, 520);
    let names: Vec<&str> = apps.repositories.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["jenkins-x", "zloeber"]);

    assert_eq!(apps.releases.len(), 2);
    let shim = &apps.releases[0];
    assert_eq!(shim.name, "namespace-tekton-pipelines");
    assert_eq!(shim.namespace, "jx");
    assert_eq!(shim.chart, "zloeber/namespace");
    assert_eq!(shim.values, vec!["generated/tekton-pipelines/values.yaml"]);
    let tekton = &apps.releases[1];
    assert_eq!(tekton.name, "tekton");
    assert_eq!(tekton.chart, "jenkins-x/tekton");
    assert_eq!(tekton.version, "0.0.57");
    assert_eq!(tekton.namespace, "tekton-pipelines");
    assert_eq!(tekton.needs, vec!["jx/namespace-tekton-pipelines"]);
    assert_eq!(tekton.values, vec![format!("../{}", REQUIREMENTS_VALUES_FILE_NAME)]);

    let generated: GeneratedValues =
        yaml::read_file(&dir.path().join("apps/generated/tekton-pipelines/values.yaml")).unwrap();
    assert_eq!(generated.namespaces, vec!["tekton-pipelines"]);
    assert!(!dir.path().join("apps/generated/stale").exists());

    let system: HelmState = yaml::read_file(&files[1]).unwrap();
    assert_eq!(system.releases.len(), 1);
    let lighthouse = &system.releases[0];
    assert_eq!(lighthouse.name, "lighthouse");
    assert_eq!(lighthouse.namespace, "jx");
    assert_eq!(lighthouse.version, "0.0.633");
    assert!(lighthouse.needs.is_empty());
    assert_eq!(lighthouse.hooks.len(), 1);
    assert_eq!(
        lighthouse.values,
        vec![
            stream.path().join("apps/jenkins-x/lighthouse/values.yaml").display().to_string(),
            format!("../{}", REQUIREMENTS_VALUES_FILE_NAME),
            "lighthouse/values.yaml".to_string(),
        ]
    );
}

#[test]
fn empty_phase_gets_placeholder_release() {
    let stream = tempfile::tempdir().unwrap();
    version_stream(stream.path());
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("jx-apps.yml"),
        "apps:\n- name: jenkins-x/tekton\n  version: 0.0.60\n",
    );

    let cluster = Cluster {
        namespaces: vec!["jx".to_string()],
    };
    let files = helmfile::generate(&options(dir.path()), &context(stream.path()), &cluster, &NoRepos).unwrap();

    let apps: HelmState = yaml::read_file(&files[0]).unwrap();
    assert_eq!(apps.releases[0].version, "0.0.60");
    assert_eq!(apps.releases[0].namespace, "jx");

    let system: HelmState = yaml::read_file(&files[1]).unwrap();
    assert_eq!(system.releases.len(), 1);
    assert_eq!(system.releases[0].name, "empty");
    assert_eq!(system.releases[0].chart, "jenkins-x/empty");
    assert_eq!(system.repositories.len(), 1);
    assert_eq!(system.repositories[0].name, "jenkins-x");
    assert_eq!(system.repositories[0].url, "https://storage.googleapis.com/chartmuseum.jenkins-x.io");
}

#[test]
fn missing_apps_file_is_an_error() {
    let stream = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cluster = Cluster { namespaces: Vec::new() };
    let err = helmfile::generate(&options(dir.path()), &context(stream.path()), &cluster, &NoRepos).unwrap_err();
    assert!(err.message.starts_with("failed to load applications"));
}
