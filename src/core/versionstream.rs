//! The version stream: a git repository of pinned versions for charts,
//! git repositories and packages, plus per-app install defaults.
//!
//! Layout:
//!
//! ```text
//! charts/repositories.yml          chart repository prefixes
//! charts/<prefix>/<chart>.yml      stable chart versions
//! git/<host>/<owner>/<repo>.yml    stable git versions
//! packages/<name>.yml              minimum CLI versions
//! apps/<prefix>/<chart>/defaults.yml
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::gits::Gitter;
use crate::helmfile::Hook;
use crate::utils::{io, yaml};

const DEFAULTS_FILE_NAME: &str = "defaults.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Chart,
    Git,
    Package,
}

impl VersionKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            VersionKind::Chart => "charts",
            VersionKind::Git => "git",
            VersionKind::Package => "packages",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StableVersion {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPrefixes {
    #[serde(default)]
    pub repositories: Vec<RepositoryURLs>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryURLs {
    pub prefix: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl RepositoryPrefixes {
    /// Prefix registered for a chart repository URL, ignoring a trailing `/`.
    pub fn prefix_for_url(&self, url: &str) -> Option<&str> {
        let wanted = url.trim_end_matches('/');
        self.repositories
            .iter()
            .find(|r| r.urls.iter().any(|u| u.trim_end_matches('/') == wanted))
            .map(|r| r.prefix.as_str())
    }

    pub fn urls_for_prefix(&self, prefix: &str) -> &[String] {
        self.repositories
            .iter()
            .find(|r| r.prefix == prefix)
            .map(|r| r.urls.as_slice())
            .unwrap_or(&[])
    }
}

/// Install defaults for an app shipped in the version stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefaults {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub hooks: Vec<Hook>,
}

/// Resolves versions from a checked out version stream directory.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    pub versions_dir: PathBuf,
}

impl VersionResolver {
    pub fn new(versions_dir: impl Into<PathBuf>) -> Self {
        Self {
            versions_dir: versions_dir.into(),
        }
    }

    fn version_file(&self, kind: VersionKind, name: &str) -> PathBuf {
        let name = match kind {
            VersionKind::Git => git_version_name(name),
            _ => name.to_string(),
        };
        self.versions_dir
            .join(kind.dir_name())
            .join(format!("{}.yml", name))
    }

    /// The pinned version of `name`, empty when the stream does not pin it.
    pub fn stable_version(&self, kind: VersionKind, name: &str) -> Result<StableVersion> {
        let path = self.version_file(kind, name);
        if !io::file_exists(&path) {
            crate::log_debug!("versionstream", "no stable version for {} at {}", name, path.display());
            return Ok(StableVersion::default());
        }
        yaml::read_file(&path)
    }

    pub fn stable_version_number(&self, kind: VersionKind, name: &str) -> Result<String> {
        Ok(self.stable_version(kind, name)?.version)
    }

    pub fn repository_prefixes(&self) -> Result<RepositoryPrefixes> {
        let path = self.versions_dir.join("charts").join("repositories.yml");
        if !io::file_exists(&path) {
            return Ok(RepositoryPrefixes::default());
        }
        yaml::read_file(&path)
    }

    /// Defaults and extra values files for a chart, both optional.
    ///
    /// Values files are returned as absolute paths, `values.yaml.gotmpl`
    /// before `values.yaml`.
    pub fn app_defaults(&self, chart_name: &str) -> Result<(AppDefaults, Vec<String>)> {
        let app_dir = self.versions_dir.join("apps").join(chart_name);

        let values_files = ["values.yaml.gotmpl", "values.yaml"]
            .iter()
            .map(|name| app_dir.join(name))
            .filter(|path| io::file_exists(path))
            .map(|path| path.display().to_string())
            .collect();

        let defaults_file = app_dir.join(DEFAULTS_FILE_NAME);
        let defaults = if io::file_exists(&defaults_file) {
            yaml::read_file(&defaults_file)?
        } else {
            AppDefaults::default()
        };
        Ok((defaults, values_files))
    }
}

/// `https://github.com/org/repo.git` becomes `github.com/org/repo`.
fn git_version_name(url: &str) -> String {
    let url = url.trim();
    let url = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url).to_string()
}

/// Clone or refresh the version stream at `dir` and check out `reference`.
///
/// A branch reference is locked to the most recent tag on it; the returned
/// string is the reference actually checked out.
pub fn clone_versions_repo(gitter: &dyn Gitter, url: &str, reference: &str, dir: &Path) -> Result<String> {
    let reference = if reference.is_empty() { "master" } else { reference };
    let fail = |e: Error| {
        Error::version_stream_failed(
            format!("failed to prepare version stream {} at {}: {}", url, reference, e.message),
            dir.display().to_string(),
        )
    };

    if dir.join(".git").is_dir() {
        gitter.fetch_tags(dir).map_err(fail)?;
    } else {
        io::remove_dir_all(dir, "reset version stream")?;
        crate::log_status!("versionstream", "Cloning {} into {}", url, dir.display());
        gitter.clone_repo(url, dir).map_err(fail)?;
    }

    let tags = gitter.tags(dir).map_err(fail)?;
    if tags.iter().any(|t| t == reference) {
        gitter.checkout(dir, reference).map_err(fail)?;
        return Ok(reference.to_string());
    }

    gitter.checkout(dir, reference).map_err(fail)?;
    match gitter.latest_tag(dir).map_err(fail)? {
        Some(tag) => {
            gitter.checkout(dir, &tag).map_err(fail)?;
            Ok(tag)
        }
        None => Ok(reference.to_string()),
    }
}
