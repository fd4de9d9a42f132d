//! `.jenkins-x/Deployfile`: how apps are deployed into a remote environment
//! repository that has no `jx-apps.yml`.
//!
//! The file deliberately has no `.yaml` extension so config sync tooling
//! does not pick it up as a cluster resource.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::utils::{io, yaml};

pub const DEPLOY_CONFIG_DIR: &str = ".jenkins-x";
pub const DEPLOY_CONFIG_FILE_NAME: &str = "Deployfile";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub metadata: DeployMetadata,
    #[serde(default)]
    pub spec: DeploySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySpec {
    /// Folder inside the repository that kpt deploys apps into.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kpt_path: String,
    /// Replaces the Environment namespace when set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

pub fn deploy_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DEPLOY_CONFIG_DIR).join(DEPLOY_CONFIG_FILE_NAME)
}

/// Load the deploy config for a project, `None` when it has none.
pub fn load_deploy_config(project_dir: &Path) -> Result<Option<(DeployConfig, PathBuf)>> {
    load_deploy_config_file(&deploy_config_path(project_dir))
}

pub fn load_deploy_config_file(path: &Path) -> Result<Option<(DeployConfig, PathBuf)>> {
    if !io::file_exists(path) {
        return Ok(None);
    }
    let config = yaml::read_file(path)?;
    Ok(Some((config, path.to_path_buf())))
}
