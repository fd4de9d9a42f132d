//! Everything resolved about the environment a command runs against.

use std::path::Path;

use crate::defaults;
use crate::error::Result;
use crate::gits::Gitter;
use crate::paths;
use crate::requirements::{self, RequirementsConfig};
use crate::versionstream::{self, AppDefaults, VersionResolver};

pub struct EnvironmentContext {
    pub requirements: RequirementsConfig,
    pub version_resolver: VersionResolver,
    pub dev_namespace: String,
}

/// A chart reference from `jx-apps.yml` split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartDetails {
    /// `prefix/chart` or a bare chart name.
    pub name: String,
    pub prefix: String,
    pub local_name: String,
    /// Repository URL, or a local directory.
    pub repository: String,
}

impl EnvironmentContext {
    pub fn new(requirements: RequirementsConfig, version_resolver: VersionResolver, dev_namespace: impl Into<String>) -> Self {
        Self {
            requirements,
            version_resolver,
            dev_namespace: dev_namespace.into(),
        }
    }

    /// Load the requirements found from `dir` and check out the version
    /// stream they point at.
    pub fn load(dir: &Path, gitter: &dyn Gitter, dev_namespace: &str) -> Result<Self> {
        let (requirements, _) = requirements::load_requirements_config(dir, true)?;
        let defaults = defaults::load();
        let url = if requirements.version_stream.url.is_empty() {
            defaults.version_stream.url
        } else {
            requirements.version_stream.url.clone()
        };
        let versions_dir = paths::versions_dir()?;
        versionstream::clone_versions_repo(gitter, &url, &requirements.version_stream.reference, &versions_dir)?;
        Ok(Self::new(requirements, VersionResolver::new(versions_dir), dev_namespace))
    }

    /// Split a chart name and find its repository, looking the prefix up in
    /// the version stream when no repository is given.
    pub fn chart_details(&self, chart_name: &str, repository: &str) -> Result<ChartDetails> {
        let (prefix, local_name) = match chart_name.split_once('/') {
            Some((prefix, local)) => (prefix.to_string(), local.to_string()),
            None => (String::new(), chart_name.to_string()),
        };
        let mut details = ChartDetails {
            name: chart_name.to_string(),
            prefix,
            local_name,
            repository: repository.to_string(),
        };

        if details.repository.is_empty() && !details.prefix.is_empty() {
            let prefixes = self.version_resolver.repository_prefixes()?;
            match prefixes.urls_for_prefix(&details.prefix).first() {
                Some(url) => details.repository = url.clone(),
                None => crate::log_warn!(
                    "helmfile",
                    "no repository URL known for prefix {} of chart {}",
                    details.prefix,
                    chart_name
                ),
            }
        }
        Ok(details)
    }

    pub fn application_defaults(&self, chart_name: &str) -> Result<(AppDefaults, Vec<String>)> {
        self.version_resolver.app_defaults(chart_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn chart_details_resolve_prefix_urls() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("charts")).unwrap();
        fs::write(
            dir.path().join("charts/repositories.yml"),
            "repositories:\n- prefix: jenkins-x\n  urls:\n  - https://storage.googleapis.com/chartmuseum.jenkins-x.io\n",
        )
        .unwrap();
        let ctx = EnvironmentContext::new(RequirementsConfig::new(), VersionResolver::new(dir.path()), "jx");

        let details = ctx.chart_details("jenkins-x/tekton", "").unwrap();
        assert_eq!(details.prefix, "jenkins-x");
        assert_eq!(details.local_name, "tekton");
        assert_eq!(details.repository, "https://storage.googleapis.com/chartmuseum.jenkins-x.io");

        let explicit = ctx.chart_details("nginx-ingress", "https://charts.helm.sh/stable").unwrap();
        assert_eq!(explicit.prefix, "");
        assert_eq!(explicit.local_name, "nginx-ingress");
        assert_eq!(explicit.repository, "https://charts.helm.sh/stable");

        let unknown = ctx.chart_details("acme/thing", "").unwrap();
        assert_eq!(unknown.repository, "");
    }
}
