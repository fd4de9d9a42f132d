//! The `jx-apps.yml` application manifest.

use serde::{Deserialize, Serialize};
use serde_yml::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::helmfile::{Dependency, Hook, RepositorySpec};
use crate::utils::{io, yaml};

pub const APP_CONFIG_FILE_NAME: &str = "jx-apps.yml";

/// Which helmfile an app is installed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Apps,
    System,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Apps, Phase::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Apps => "apps",
            Phase::System => "system",
        }
    }

    /// Parse a phase name from the version stream, where blank means unset.
    pub fn parse(value: &str) -> Result<Option<Phase>> {
        match value.trim() {
            "" => Ok(None),
            "apps" => Ok(Some(Phase::Apps)),
            "system" => Ok(Some(Phase::System)),
            other => Err(Error::validation_invalid_argument(
                "phase",
                format!("unknown phase {}", other),
                Some(other.to_string()),
                Some(vec!["apps".to_string(), "system".to_string()]),
            )),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub apps: Vec<App>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositorySpec>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<Hook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recreate_pods: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_on_fail: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_patches: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategic_merge_patches: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adopt: Vec<String>,
}

/// Load `jx-apps.yml` from `dir`.
pub fn load_app_config(dir: &Path) -> Result<(AppConfig, PathBuf)> {
    let file = dir.join(APP_CONFIG_FILE_NAME);
    if !io::file_exists(&file) {
        return Err(Error::apps_not_found(dir.display().to_string()));
    }
    let content = io::read_file(&file, "read apps")?;
    let config: AppConfig = yaml::from_str(&content, &file.display().to_string())?;

    for (i, app) in config.apps.iter().enumerate() {
        if app.name.trim().is_empty() {
            return Err(Error::config_invalid_value(
                format!("apps.{}.name", i),
                None,
                format!("app {} in {} has no name", i, file.display()),
            ));
        }
    }
    Ok((config, file))
}

pub fn save_app_config(config: &AppConfig, dir: &Path) -> Result<()> {
    yaml::write_file(&dir.join(APP_CONFIG_FILE_NAME), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_apps_with_phases() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(APP_CONFIG_FILE_NAME),
            r#"defaultNamespace: jx
repositories:
- name: bitnami
  url: https://charts.bitnami.com/bitnami
apps:
- name: jenkins-x/lighthouse
- name: stable/nginx-ingress
  phase: system
  namespace: nginx
  wait: true
"#,
        )
        .unwrap();

        let (config, file) = load_app_config(dir.path()).unwrap();
        assert_eq!(file, dir.path().join(APP_CONFIG_FILE_NAME));
        assert_eq!(config.default_namespace, "jx");
        assert_eq!(config.repositories[0].name, "bitnami");
        assert_eq!(config.apps[0].phase, None);
        assert_eq!(config.apps[1].phase, Some(Phase::System));
        assert_eq!(config.apps[1].wait, Some(true));
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(APP_CONFIG_FILE_NAME),
            "apps:\n- name: foo\n  phase: later\n",
        )
        .unwrap();

        let err = load_app_config(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_yaml");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_app_config(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "apps.not_found");
    }

    #[test]
    fn phase_parse() {
        assert_eq!(Phase::parse("").unwrap(), None);
        assert_eq!(Phase::parse("system").unwrap(), Some(Phase::System));
        assert!(Phase::parse("later").is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            apps: vec![App {
                name: "jenkins-x/tekton".to_string(),
                phase: Some(Phase::Apps),
                ..Default::default()
            }],
            ..Default::default()
        };
        save_app_config(&config, dir.path()).unwrap();
        let (loaded, _) = load_app_config(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
