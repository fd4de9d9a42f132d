//! The `helm` client: version detection and chart repositories.

use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::utils::command;

pub trait Helm {
    /// Client version, e.g. `3.2.4`.
    fn version(&self) -> Result<Version>;
    /// Configured repositories, name to URL.
    fn list_repos(&self) -> Result<BTreeMap<String, String>>;
    fn add_repo(&self, name: &str, url: &str) -> Result<()>;
    /// `helm init --client-only`, only meaningful for Helm 2.
    fn init_client_only(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct HelmCli {
    binary: String,
}

#[derive(Deserialize)]
struct RepoEntry {
    name: String,
    url: String,
}

impl HelmCli {
    pub fn new() -> Self {
        Self {
            binary: "helm".to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = command::capture(&self.binary, args, None)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::helm_command_failed(output.failure_details(args)))
        }
    }
}

impl Helm for HelmCli {
    fn version(&self) -> Result<Version> {
        let out = self
            .run(&["version", "--short", "--client"])
            .or_else(|_| self.run(&["version", "--short"]))?;
        parse_version(&out).ok_or_else(|| {
            Error::helm_command_failed(crate::error::ToolCommandFailedDetails {
                command: "version --short".to_string(),
                exit_code: None,
                stderr: format!("cannot parse helm version from {:?}", out),
            })
        })
    }

    fn list_repos(&self) -> Result<BTreeMap<String, String>> {
        let output = command::capture(&self.binary, &["repo", "list", "-o", "json"], None)?;
        if !output.success {
            // Helm exits non-zero when nothing is configured yet.
            if output.error_text().contains("no repositories") {
                return Ok(BTreeMap::new());
            }
            return Err(Error::helm_command_failed(output.failure_details(&["repo", "list"])));
        }
        let entries: Vec<RepoEntry> = serde_json::from_str(&output.stdout)
            .map_err(|e| Error::internal_json(e.to_string(), Some("helm repo list".to_string())))?;
        Ok(entries.into_iter().map(|r| (r.name, r.url)).collect())
    }

    fn add_repo(&self, name: &str, url: &str) -> Result<()> {
        self.run(&["repo", "add", name, url])?;
        crate::log_status!("helm", "Added repository {} {}", name, url);
        Ok(())
    }

    fn init_client_only(&self) -> Result<()> {
        self.run(&["init", "--client-only"]).map(|_| ())
    }
}

/// Pull a semantic version out of `helm version --short` output, which
/// looks like `v3.2.4+g0ad800e` or `Client: v2.16.1+gbbdfe5e`.
pub fn parse_version(output: &str) -> Option<Version> {
    crate::packages::parse_version(output)
}

pub fn is_helm3(version: &Version) -> bool {
    version.major >= 3
}

/// Name of the repository serving `url`, comparing URLs without a
/// trailing slash.
pub fn repo_name_for_url<'a>(repos: &'a BTreeMap<String, String>, url: &str) -> Option<&'a str> {
    let wanted = url.trim_end_matches('/');
    repos
        .iter()
        .find(|(_, u)| u.trim_end_matches('/') == wanted)
        .map(|(name, _)| name.as_str())
}
