use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::{command, io};

use super::provider::{GitProvider, GitRepo};
use super::{add_user_to_url, normalize_url};

pub const DEFAULT_GIT_USER: &str = "jenkins-x-bot";
pub const DEFAULT_GIT_EMAIL: &str = "jenkins-x@googlegroups.com";

/// Operations on local git working copies.
pub trait Gitter {
    fn clone_repo(&self, url: &str, dir: &Path) -> Result<()>;
    fn fetch_tags(&self, dir: &Path) -> Result<()>;
    fn checkout(&self, dir: &Path, commitish: &str) -> Result<()>;
    /// Most recent tag reachable from `HEAD`.
    fn latest_tag(&self, dir: &Path) -> Result<Option<String>>;
    fn tags(&self, dir: &Path) -> Result<Vec<String>>;
    fn add(&self, dir: &Path, pattern: &str) -> Result<()>;
    fn has_changes(&self, dir: &Path) -> Result<bool>;
    fn commit(&self, dir: &Path, message: &str) -> Result<()>;
    fn push(&self, dir: &Path, remote: &str, force: bool, refspec: &str) -> Result<()>;
    /// Remote name to fetch URL.
    fn remotes(&self, dir: &Path) -> Result<BTreeMap<String, String>>;
    /// Add the remote, or change its URL when it already exists.
    fn set_remote_url(&self, dir: &Path, name: &str, url: &str) -> Result<()>;
    fn config_value(&self, dir: Option<&Path>, key: &str) -> Option<String>;
    fn set_config_value(&self, dir: Option<&Path>, key: &str, value: &str) -> Result<()>;
}

/// [`Gitter`] backed by the `git` binary.
#[derive(Debug, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = command::capture("git", args, Some(dir))?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::git_command_failed(format!(
                "git {} failed in {}: {}",
                args.join(" "),
                dir.display(),
                output.error_text()
            )))
        }
    }
}

impl Gitter for GitCli {
    fn clone_repo(&self, url: &str, dir: &Path) -> Result<()> {
        io::ensure_dir(dir, "git clone")?;
        let target = dir.to_string_lossy();
        self.git(dir, &["clone", url, target.as_ref()]).map(|_| ())
    }

    fn fetch_tags(&self, dir: &Path) -> Result<()> {
        self.git(dir, &["fetch", "--tags", "origin"]).map(|_| ())
    }

    fn checkout(&self, dir: &Path, commitish: &str) -> Result<()> {
        self.git(dir, &["checkout", commitish]).map(|_| ())
    }

    fn latest_tag(&self, dir: &Path) -> Result<Option<String>> {
        let output = command::capture("git", &["describe", "--tags", "--abbrev=0"], Some(dir))?;
        if output.success && !output.stdout.is_empty() {
            Ok(Some(output.stdout))
        } else {
            Ok(None)
        }
    }

    fn tags(&self, dir: &Path) -> Result<Vec<String>> {
        let out = self.git(dir, &["tag", "--list"])?;
        Ok(out.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }

    fn add(&self, dir: &Path, pattern: &str) -> Result<()> {
        self.git(dir, &["add", pattern]).map(|_| ())
    }

    fn has_changes(&self, dir: &Path) -> Result<bool> {
        let out = self.git(dir, &["status", "--porcelain"])?;
        Ok(!out.is_empty())
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        self.git(dir, &["commit", "-m", message]).map(|_| ())
    }

    fn push(&self, dir: &Path, remote: &str, force: bool, refspec: &str) -> Result<()> {
        let mut args = vec!["push", remote, refspec];
        if force {
            args.push("--force");
        }
        self.git(dir, &args).map(|_| ())
    }

    fn remotes(&self, dir: &Path) -> Result<BTreeMap<String, String>> {
        let out = self.git(dir, &["remote", "-v"])?;
        let mut remotes = BTreeMap::new();
        for line in out.lines() {
            let mut parts = line.split_whitespace();
            if let (Some(name), Some(url), Some("(fetch)")) = (parts.next(), parts.next(), parts.next()) {
                remotes.insert(name.to_string(), url.to_string());
            }
        }
        Ok(remotes)
    }

    fn set_remote_url(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        if self.remotes(dir)?.contains_key(name) {
            self.git(dir, &["remote", "set-url", name, url]).map(|_| ())
        } else {
            self.git(dir, &["remote", "add", name, url]).map(|_| ())
        }
    }

    fn config_value(&self, dir: Option<&Path>, key: &str) -> Option<String> {
        let output = match dir {
            Some(dir) => command::capture("git", &["config", "--get", key], Some(dir)),
            None => command::capture("git", &["config", "--global", "--get", key], None),
        }
        .ok()?;
        (output.success && !output.stdout.is_empty()).then_some(output.stdout)
    }

    fn set_config_value(&self, dir: Option<&Path>, key: &str, value: &str) -> Result<()> {
        match dir {
            Some(dir) => self.git(dir, &["config", key, value]).map(|_| ()),
            None => command::run("git", &["config", "--global", key, value], "git config")
                .map(|_| ())
                .map_err(|e| Error::git_command_failed(e.message)),
        }
    }
}

/// Make sure commits have an author, defaulting to the bot identity.
pub fn ensure_user_and_email(gitter: &dyn Gitter, dir: Option<&Path>) -> Result<(String, String)> {
    let user = match gitter.config_value(dir, "user.name") {
        Some(user) => user,
        None => {
            gitter.set_config_value(dir, "user.name", DEFAULT_GIT_USER)?;
            DEFAULT_GIT_USER.to_string()
        }
    };
    let email = match gitter.config_value(dir, "user.email") {
        Some(email) => email,
        None => {
            gitter.set_config_value(dir, "user.email", DEFAULT_GIT_EMAIL)?;
            DEFAULT_GIT_EMAIL.to_string()
        }
    };
    Ok((user, email))
}

/// Find the tag naming `version`, spelled with or without a `v` prefix.
pub fn find_tag_for_version(gitter: &dyn Gitter, dir: &Path, version: &str) -> Result<Option<String>> {
    if version.is_empty() {
        return Ok(None);
    }
    gitter.fetch_tags(dir)?;
    let bare = version.trim_start_matches('v');
    let candidates = [bare.to_string(), format!("v{}", bare)];
    let tags = gitter.tags(dir)?;
    Ok(candidates
        .into_iter()
        .find(|candidate| tags.iter().any(|t| t == candidate)))
}

/// Name of the remote whose URL points at `url`, ignoring credentials.
pub fn remote_for_url(gitter: &dyn Gitter, dir: &Path, url: &str) -> Result<Option<String>> {
    let wanted = strip_credentials(url);
    Ok(gitter
        .remotes(dir)?
        .into_iter()
        .find(|(_, remote)| strip_credentials(remote) == wanted)
        .map(|(name, _)| name))
}

fn strip_credentials(url: &str) -> String {
    let normalized = normalize_url(url);
    if let Some((scheme, rest)) = normalized.split_once("://") {
        let rest = rest.rsplit_once('@').map(|(_, host)| host).unwrap_or(rest);
        return format!("{}://{}", scheme, rest);
    }
    normalized
}

/// Create `owner/name` on the provider and seed it with `from_url` at
/// `commitish`, pushed as the `master` branch.
pub fn duplicate_repo(
    gitter: &dyn Gitter,
    provider: &dyn GitProvider,
    owner: &str,
    name: &str,
    from_url: &str,
    commitish: &str,
    private: bool,
) -> Result<GitRepo> {
    let repo = provider.create_repository(owner, name, private)?;

    let work_dir = std::env::temp_dir().join(format!("jx-duplicate-{}", uuid::Uuid::new_v4()));
    let result = (|| {
        gitter.clone_repo(from_url, &work_dir)?;
        gitter.checkout(&work_dir, commitish)?;
        let push_url = add_user_to_url(&repo.clone_url, provider.current_username(), provider.token())?;
        gitter.set_remote_url(&work_dir, "duplicate", &push_url)?;
        gitter.push(&work_dir, "duplicate", true, "HEAD:refs/heads/master")
    })();
    io::remove_dir_all(&work_dir, "remove duplicate work dir")?;
    result.map_err(|e| e.with_context(format!("duplicating {} to {}/{}", from_url, owner, name)))?;

    crate::log_status!("git", "Duplicated {} at {} to {}", from_url, commitish, repo.html_url);
    Ok(repo)
}
