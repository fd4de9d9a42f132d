use serde::{Deserialize, Serialize};
use std::fs;

use crate::paths;

/// Root configuration structure for jx.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JxConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via jx.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default = "default_charts")]
    pub charts: ChartsConfig,

    #[serde(default = "default_helmfile")]
    pub helmfile: HelmfileDefaults,

    #[serde(default = "default_environment_repos")]
    pub environment_repos: EnvironmentRepoConfig,

    #[serde(default = "default_version_stream")]
    pub version_stream: VersionStreamDefaults,

    #[serde(default = "default_tls_doc_url")]
    pub tls_doc_url: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            charts: default_charts(),
            helmfile: default_helmfile(),
            environment_repos: default_environment_repos(),
            version_stream: default_version_stream(),
            tls_doc_url: default_tls_doc_url(),
        }
    }
}

/// Well known chart repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartsConfig {
    pub chart_museum_url: String,
    pub chart_museum_repo_name: String,
    pub namespace_repo_name: String,
    pub namespace_repo_url: String,
    pub namespace_chart: String,
    pub empty_chart: String,
    pub bucket_repo_charts_url: String,
}

/// `helmDefaults` written into every generated helmfile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmfileDefaults {
    pub timeout: u32,
    pub kind_timeout: u32,
    pub bases: Vec<String>,
}

/// Template repositories new environment repositories are created from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRepoConfig {
    pub default_git_url: String,
    pub helmfile_git_url: String,
    pub helmfile_local_git_url: String,
    pub boot_config_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStreamDefaults {
    pub url: String,
    pub reference: String,
    pub build_pack_url: String,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_charts() -> ChartsConfig {
    ChartsConfig {
        chart_museum_url: "https://storage.googleapis.com/chartmuseum.jenkins-x.io".to_string(),
        chart_museum_repo_name: "jenkins-x".to_string(),
        namespace_repo_name: "zloeber".to_string(),
        namespace_repo_url: "git+https://github.com/zloeber/helm-namespace@chart".to_string(),
        namespace_chart: "zloeber/namespace".to_string(),
        empty_chart: "jenkins-x/empty".to_string(),
        bucket_repo_charts_url: "http://bucketrepo/bucketrepo/charts/".to_string(),
    }
}

fn default_helmfile() -> HelmfileDefaults {
    HelmfileDefaults {
        timeout: 520,
        kind_timeout: 2 * 60 * 60,
        bases: vec!["../environments.yaml".to_string()],
    }
}

fn default_environment_repos() -> EnvironmentRepoConfig {
    EnvironmentRepoConfig {
        default_git_url: "https://github.com/jenkins-x/default-environment-charts.git".to_string(),
        helmfile_git_url: "https://github.com/jenkins-x/default-environment-helmfile.git"
            .to_string(),
        helmfile_local_git_url: "https://github.com/jenkins-x/default-environment-helmfile-local.git"
            .to_string(),
        boot_config_url: "https://github.com/jenkins-x/jenkins-x-boot-config.git".to_string(),
    }
}

fn default_version_stream() -> VersionStreamDefaults {
    VersionStreamDefaults {
        url: "https://github.com/jenkins-x/jenkins-x-versions.git".to_string(),
        reference: "master".to_string(),
        build_pack_url: "https://github.com/jenkins-x-buildpacks/jenkins-x-kubernetes.git"
            .to_string(),
    }
}

fn default_tls_doc_url() -> String {
    "https://jenkins-x.io/docs/getting-started/setup/boot/#ingress".to_string()
}

// =============================================================================
// Loading
// =============================================================================

/// Load jx.json, falling back to built-in defaults when the file is missing
/// or cannot be parsed.
pub fn load_config() -> JxConfig {
    let Ok(path) = paths::jx_json() else {
        return JxConfig::default();
    };

    if !path.exists() {
        return JxConfig::default();
    }

    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<JxConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                crate::log_warn!("config", "ignoring invalid {}: {}", path.display(), e);
                JxConfig::default()
            }
        },
        Err(_) => JxConfig::default(),
    }
}

pub fn load() -> Defaults {
    load_config().defaults
}
