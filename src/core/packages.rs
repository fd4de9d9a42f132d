//! Command line tools the cluster commands shell out to.

use semver::Version;

use crate::error::{Error, Result};
use crate::utils::command;
use crate::versionstream::{VersionKind, VersionResolver};

pub const REQUIRED_PACKAGES: &[&str] = &["kubectl", "git", "helm"];

pub trait PackageProbe {
    /// Installed version of `package`, `None` when it is not on the PATH.
    fn installed_version(&self, package: &str) -> Result<Option<Version>>;
}

#[derive(Debug, Default)]
pub struct PathProbe;

impl PathProbe {
    pub fn new() -> Self {
        Self
    }
}

fn version_args(package: &str) -> &'static [&'static str] {
    match package {
        "kubectl" => &["version", "--client", "--short"],
        "helm" => &["version", "--short", "--client"],
        _ => &["version"],
    }
}

impl PackageProbe for PathProbe {
    fn installed_version(&self, package: &str) -> Result<Option<Version>> {
        let args = version_args(package);
        let output = match command::capture(package, args, None) {
            Ok(output) => output,
            Err(_) => return Ok(None),
        };
        if !output.success {
            // helm 2 rejects --client together with --short on some versions
            if package == "helm" {
                let retry = command::capture(package, &["version", "--short"], None)?;
                if retry.success {
                    return Ok(parse_version(&retry.stdout).or(Some(Version::new(0, 0, 0))));
                }
            }
            return Ok(None);
        }
        Ok(parse_version(&output.stdout).or(Some(Version::new(0, 0, 0))))
    }
}

/// First `x.y.z` looking word, ignoring a `v` prefix and build metadata.
pub fn parse_version(output: &str) -> Option<Version> {
    output.split_whitespace().find_map(|word| {
        let word = word.trim_start_matches('v');
        let word = word.split('+').next().unwrap_or(word);
        Version::parse(word).ok().or_else(|| {
            // git on macOS reports `2.24.3 (Apple Git-128)`, others `2.25.1.windows.1`
            let parts: Vec<&str> = word.split('.').take(3).collect();
            if parts.len() == 3 && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty()) {
                Version::parse(&parts.join(".")).ok()
            } else {
                None
            }
        })
    })
}

/// Check every package is installed. Versions older than the version stream
/// pins are reported as warnings.
pub fn verify_packages(
    probe: &dyn PackageProbe,
    packages: &[&str],
    resolver: Option<&VersionResolver>,
) -> Result<()> {
    for package in packages {
        let installed = probe
            .installed_version(package)?
            .ok_or_else(|| Error::package_missing(*package))?;

        let Some(resolver) = resolver else {
            continue;
        };
        let wanted = resolver.stable_version_number(VersionKind::Package, package)?;
        if wanted.is_empty() {
            continue;
        }
        match parse_version(&wanted) {
            Some(wanted) if installed < wanted => crate::log_warn!(
                "packages",
                "{} {} is older than the recommended version {}",
                package,
                installed,
                wanted
            ),
            Some(_) => {}
            None => crate::log_debug!("packages", "cannot parse version {} of {}", wanted, package),
        }
    }
    crate::log_status!("packages", "Verified packages {}", packages.join(", "));
    Ok(())
}
