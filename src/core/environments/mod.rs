//! Makes sure every GitOps environment has a git repository, creating and
//! seeding the ones that are missing.

mod pipeline;
mod remote;

pub use pipeline::{pipeline_user, set_pipeline_git_env_vars, PARAMETERS_FILE, PROJECT_CONFIG_FILE_NAME};
pub use remote::{
    create_environment_helm_values, modify_environment_requirements, new_remote_requirements, ExposeController,
    ExposeControllerConfig, HelmValuesConfig, EXPOSE_DEFAULT_URL_TEMPLATE,
};

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::defaults::Defaults;
use crate::error::{Error, Result};
use crate::gits::{self, AuthConfig, GitProvider, GitRepository, Gitter};
use crate::kube::{self, Environment, EnvironmentKind, KubeClient};
use crate::requirements::{self, RequirementsConfig, REQUIREMENTS_CONFIG_FILE_NAME};
use crate::utils::{io, yaml};
use crate::versionstream::{VersionKind, VersionResolver};

pub const CONFIG_REPO_URL: &str = "CONFIG_REPO_URL";
pub const CONFIG_BASE_REF: &str = "CONFIG_BASE_REF";
const JENKINS_X_REMOTE: &str = "jenkins-x";
const ENV_VALUES_FILE: &str = "env/values.yaml";

#[derive(Debug, Clone, Default)]
pub struct EnvironmentsOptions {
    pub dir: PathBuf,
    pub versions_dir: PathBuf,
    pub defaults: Defaults,
}

/// Environment variables the command reads.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentsEnv {
    pub config_repo_url: Option<String>,
    pub config_base_ref: Option<String>,
    /// Running inside the boot pipeline.
    pub jx_boot: bool,
    pub disable_push_updates_to_dev: bool,
}

impl EnvironmentsEnv {
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            config_repo_url: var(CONFIG_REPO_URL),
            config_base_ref: var(CONFIG_BASE_REF),
            jx_boot: var("JX_INTERPRET_PIPELINE").is_some_and(|v| v == "true"),
            disable_push_updates_to_dev: var("JX_DISABLE_PUSH_UPDATES_TO_DEV_ENVIRONMENT").is_some_and(|v| v == "true"),
        }
    }

    /// The boot config repository URL and ref, both of which are required.
    pub fn boot_config(&self) -> Result<(String, String)> {
        let missing: Vec<String> = [
            (CONFIG_REPO_URL, &self.config_repo_url),
            (CONFIG_BASE_REF, &self.config_base_ref),
        ]
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| format!("the environment variable {} must be specified", name))
        .collect();
        match (&self.config_repo_url, &self.config_base_ref) {
            (Some(url), Some(reference)) => {
                crate::log_debug!("environments", "{}={} {}={}", CONFIG_REPO_URL, url, CONFIG_BASE_REF, reference);
                Ok((url.clone(), reference.clone()))
            }
            _ => Err(Error::validation_missing_argument(CONFIG_REPO_URL, missing.join("\n"))),
        }
    }
}

pub struct EnvClients<'a> {
    pub kube: &'a dyn KubeClient,
    pub gitter: &'a dyn Gitter,
    pub auth: &'a AuthConfig,
    /// Provider override; `None` builds one from the pipeline auth.
    pub provider: Option<&'a dyn GitProvider>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentsReport {
    pub requirements_file: String,
    pub namespace: String,
    pub verified: Vec<String>,
}

/// Namespace of the dev environment: the team of the current namespace.
pub fn dev_namespace(kube: &dyn KubeClient) -> Result<String> {
    let current = kube.current_namespace()?;
    let team = kube
        .get_namespace(&current)?
        .and_then(|ns| ns.metadata.labels.get(kube::LABEL_TEAM).cloned())
        .filter(|team| !team.is_empty());
    Ok(team.unwrap_or(current))
}

fn dev_environment(environments: &[Environment]) -> Option<&Environment> {
    environments
        .iter()
        .find(|e| e.name() == kube::LABEL_VALUE_DEV_ENVIRONMENT)
}

/// Keep a copy of the requirements in the dev environment team settings.
pub fn store_requirements_in_team_settings(
    kube: &dyn KubeClient,
    environments: &[Environment],
    requirements: &RequirementsConfig,
) -> Result<()> {
    let Some(dev) = dev_environment(environments) else {
        crate::log_warn!("environments", "no dev Environment found to store the requirements in");
        return Ok(());
    };
    crate::log_status!("environments", "Storing the requirements in team settings in the dev environment");
    let mut dev = dev.clone();
    dev.spec.team_settings.boot_requirements = yaml::to_string(requirements, "team settings requirements")?;
    dev.spec.team_settings.git_server = requirements.cluster.git_server.clone();
    kube.apply_environment(&dev).map_err(|e| {
        e.with_context("there was a problem saving the current state of the requirements file in TeamSettings in the dev environment")
    })
}

/// Requirements previously stored on the dev environment, if any.
pub fn requirements_from_team_settings(environments: &[Environment]) -> Result<Option<RequirementsConfig>> {
    let Some(dev) = dev_environment(environments) else {
        return Ok(None);
    };
    let stored = &dev.spec.team_settings.boot_requirements;
    if stored.is_empty() {
        return Ok(None);
    }
    requirements::parse_requirements(stored, "team settings")
        .map(Some)
        .map_err(|e| e.with_context("failed to load requirements from team settings"))
}

/// Environments that need a repository: permanent ones, plus the
/// development environment when it is managed through GitOps.
fn needs_repository(environment: &Environment, gitops: bool) -> bool {
    if environment.spec.source.url.is_empty() {
        return false;
    }
    match environment.kind() {
        EnvironmentKind::Permanent => true,
        EnvironmentKind::Development => gitops,
        _ => false,
    }
}

/// Copy the cluster ingress into the development environment's config.
pub fn update_environment_ingress_config(
    requirements: &mut RequirementsConfig,
    file: &Path,
    environment: &Environment,
) -> Result<()> {
    if !environment.is_development() {
        return Ok(());
    }
    let ingress = requirements.ingress.clone();
    if let Some(config) = requirements
        .environments
        .iter_mut()
        .find(|e| e.key == environment.name())
    {
        config.ingress = ingress;
    }
    requirements.save_config(file)
}

pub fn run(options: &EnvironmentsOptions, clients: &EnvClients<'_>, env: &EnvironmentsEnv) -> Result<EnvironmentsReport> {
    let namespace = dev_namespace(clients.kube)?;
    let (mut requirements, file) = requirements::load_requirements_config(&options.dir, true)?;
    let environments = kube::get_environments(clients.kube, &namespace)?;

    if io::file_exists(&file) {
        store_requirements_in_team_settings(clients.kube, &environments, &requirements)?;
    } else if let Some(stored) = requirements_from_team_settings(&environments)? {
        requirements = stored;
    }

    let mut report = EnvironmentsReport {
        requirements_file: file.display().to_string(),
        namespace,
        verified: Vec::new(),
    };
    for environment in &environments {
        if !needs_repository(environment, requirements.gitops) {
            continue;
        }
        let url = environment.spec.source.url.clone();
        crate::log_status!(
            "environments",
            "Validating git repository for {} environment at URL {}",
            environment.name(),
            url
        );
        update_environment_ingress_config(&mut requirements, &file, environment)
            .map_err(|e| e.with_context(format!("updating the ingress config for environment {:?}", environment.name())))?;
        let mut environment = environment.clone();
        validate_git_repository(options, clients, env, &requirements, &mut environment, &url)?;
        report.verified.push(environment.name().to_string());
    }

    crate::log_status!("environments", "Environment git repositories look good");
    Ok(report)
}

fn validate_git_repository(
    options: &EnvironmentsOptions,
    clients: &EnvClients<'_>,
    env: &EnvironmentsEnv,
    requirements: &RequirementsConfig,
    environment: &mut Environment,
    url: &str,
) -> Result<()> {
    let info = gits::parse_git_url(url)
        .map_err(|e| e.with_context(format!("failed to parse git URL {} for environment {}", url, environment.name())))?;
    let server_url = info.host_url();

    let (server, user) = clients.auth.pipeline_auth();
    let server = server.ok_or_else(|| {
        Error::validation_missing_argument(
            "gitAuth",
            format!("no auth server found for git server {} from gitURL {}", server_url, url),
        )
    })?;
    let user = user.ok_or_else(|| {
        Error::validation_missing_argument(
            "gitAuth",
            format!("no pipeline user found for git server {} from gitURL {}", server_url, url),
        )
    })?;
    if user.is_invalid() {
        return Err(Error::validation_invalid_argument(
            "gitAuth",
            format!("validating user '{}' of server '{}'", user.username, server.name),
            Some(user.username.clone()),
            None,
        ));
    }

    let owned_provider;
    let provider = match clients.provider {
        Some(provider) => provider,
        None => {
            owned_provider = gits::create_provider(server, user).map_err(|e| e.with_context("unable to create git provider"))?;
            owned_provider.as_ref()
        }
    };

    let (git_user, git_email) = gits::ensure_user_and_email(clients.gitter, None)?;
    crate::log_debug!("environments", "committing as {} <{}>", git_user, git_email);

    if environment.name() == kube::LABEL_VALUE_DEV_ENVIRONMENT || environment.is_development() {
        if env.jx_boot && requirements.gitops && !env.disable_push_updates_to_dev {
            handle_dev_environment_repository(options, clients.gitter, provider, env, requirements, &info)
                .map_err(|e| e.with_context("handle dev environment repository"))?;
        }
        return Ok(());
    }

    let fork_url = if requirements.helmfile {
        if environment.spec.remote_cluster {
            &options.defaults.environment_repos.helmfile_git_url
        } else {
            &options.defaults.environment_repos.helmfile_local_git_url
        }
    } else {
        &options.defaults.environment_repos.default_git_url
    };
    let helm_values = if requirements.helmfile {
        None
    } else {
        Some(create_environment_helm_values(requirements, environment).map_err(|e| e.with_context("creating environment helm values"))?)
    };

    create_environment_repository(clients.gitter, provider, requirements, environment, &info, fork_url, helm_values.as_ref())
        .map_err(|e| e.with_context(format!("failed to create git repository for gitURL {}", url)))
}

/// Make sure the remote repository of a permanent environment exists, then
/// regenerate its requirements from the development requirements.
fn create_environment_repository(
    gitter: &dyn Gitter,
    provider: &dyn GitProvider,
    requirements: &RequirementsConfig,
    environment: &mut Environment,
    info: &GitRepository,
    fork_url: &str,
    helm_values: Option<&HelmValuesConfig>,
) -> Result<()> {
    let dir = std::env::temp_dir().join(format!("jx-env-repo-{}", uuid::Uuid::new_v4().simple()));
    let result = (|| {
        let existing = provider.get_repository(&info.organisation, &info.name)?;
        let repo = match existing {
            Some(repo) => {
                crate::log_status!("environments", "Environment repository {} already exists", repo.html_url);
                gitter.clone_repo(&repo.clone_url, &dir)?;
                repo
            }
            None => {
                let private = !requirements.cluster.environment_git_public;
                let repo = provider.create_repository(&info.organisation, &info.name, private)?;
                crate::log_status!("environments", "Created environment repository {} from {}", repo.html_url, fork_url);
                gitter.clone_repo(fork_url, &dir)?;
                if let Some(values) = helm_values {
                    write_helm_values(&dir, values)?;
                }
                repo
            }
        };

        let push_url = gits::add_user_to_url(&repo.clone_url, provider.current_username(), provider.token())?;
        gitter.set_remote_url(&dir, "origin", &push_url)?;

        let file = environment_requirements_file(&dir);
        let mut remote = if io::file_exists(&file) {
            requirements::load_requirements_config_file(&file, true)
                .map_err(|e| e.with_context("failed to load environment requirements"))?
        } else {
            new_remote_requirements()
        };
        modify_environment_requirements(requirements, environment, &mut remote)
            .map_err(|e| e.with_context("failed to modify environment requirements"))?;
        remote
            .save_config(&file)
            .map_err(|e| e.with_context("failed to save environment requirements"))?;

        gitter.add(&dir, "*")?;
        if gitter.has_changes(&dir)? {
            gitter.commit(&dir, "modify environment requirements configuration")?;
        }
        gitter.push(&dir, "origin", false, "master")?;
        crate::log_status!("environments", "Pushed Git repository to {}", repo.html_url);
        Ok(())
    })();
    io::remove_dir_all(&dir, "remove environment repository clone")?;
    result
}

fn write_helm_values(dir: &Path, values: &HelmValuesConfig) -> Result<()> {
    let file = dir.join(ENV_VALUES_FILE);
    let mut existing: serde_yml::Value = if io::file_exists(&file) {
        yaml::read_file(&file)?
    } else {
        serde_yml::Value::Mapping(serde_yml::Mapping::new())
    };
    let overlay = serde_yml::to_value(values).map_err(|e| Error::internal_yaml(e.to_string(), Some("helm values".to_string())))?;
    match (existing.as_mapping_mut(), overlay) {
        (Some(target), serde_yml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                target.insert(key, value);
            }
        }
        (_, overlay) => existing = overlay,
    }
    yaml::write_file(&file, &existing)
}

fn handle_dev_environment_repository(
    options: &EnvironmentsOptions,
    gitter: &dyn Gitter,
    provider: &dyn GitProvider,
    env: &EnvironmentsEnv,
    requirements: &RequirementsConfig,
    info: &GitRepository,
) -> Result<()> {
    let (from_url, from_ref) = env.boot_config()?;
    let dir = std::path::absolute(&options.dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("resolving {} to absolute path", options.dir.display()))))?;

    let repo = match provider.get_repository(&info.organisation, &info.name)? {
        Some(repo) => repo,
        None => create_dev_environment_repository(options, gitter, provider, requirements, info, &dir, &from_url, &from_ref)
            .map_err(|e| e.with_context(format!("creating remote for dev environment {}", info.name)))?,
    };

    push_dev_environment_updates(gitter, provider, &repo, &dir)
        .map_err(|e| e.with_context(format!("error updating dev environment for {}", info.name)))?;

    gitter
        .set_remote_url(&dir, JENKINS_X_REMOTE, &from_url)
        .map_err(|e| e.with_context(format!("setting {} remote to boot config {}", JENKINS_X_REMOTE, from_url)))
}

#[allow(clippy::too_many_arguments)]
fn create_dev_environment_repository(
    options: &EnvironmentsOptions,
    gitter: &dyn Gitter,
    provider: &dyn GitProvider,
    requirements: &RequirementsConfig,
    info: &GitRepository,
    dir: &Path,
    from_url: &str,
    from_ref: &str,
) -> Result<gits::GitRepo> {
    let boot_config_url = &options.defaults.environment_repos.boot_config_url;
    let mut reference = from_ref.to_string();
    if gits::normalize_url(from_url) == gits::normalize_url(boot_config_url) && reference == "master" {
        let resolver = VersionResolver::new(&options.versions_dir);
        reference = resolver
            .stable_version_number(VersionKind::Git, from_url)
            .map_err(|e| e.with_context(format!("failed to resolve version for {}", from_url)))?;
        if reference.is_empty() {
            crate::log_status!("environments", "Attempting to resolve version for upstream boot config {}", boot_config_url);
            reference = resolver.stable_version_number(VersionKind::Git, boot_config_url)?;
        }
        if reference.is_empty() {
            reference = from_ref.to_string();
        }
    }

    let commitish = match gits::find_tag_for_version(gitter, dir, &reference) {
        Ok(Some(tag)) => tag,
        Ok(None) => format!("origin/{}", reference),
        Err(e) => {
            crate::log_debug!("environments", "finding tag for {}: {}", reference, e.message);
            format!("origin/{}", reference)
        }
    };
    crate::log_debug!("environments", "duplicating {} at {}", from_url, commitish);

    let private = !requirements.cluster.environment_git_public;
    gits::duplicate_repo(gitter, provider, &info.organisation, &info.name, from_url, &commitish, private)
}

fn push_dev_environment_updates(gitter: &dyn Gitter, provider: &dyn GitProvider, repo: &gits::GitRepo, dir: &Path) -> Result<()> {
    let push_url = gits::add_user_to_url(&repo.clone_url, provider.current_username(), provider.token())?;
    let remote = match gits::remote_for_url(gitter, dir, &repo.clone_url)? {
        Some(remote) => remote,
        None => {
            gitter.set_remote_url(dir, "origin", &push_url)?;
            "origin".to_string()
        }
    };

    for (name, value) in set_pipeline_git_env_vars(dir).map_err(|e| e.with_context("failed to modify dev environment config"))? {
        std::env::set_var(name, value);
    }

    if gitter.has_changes(dir).map_err(|e| e.with_context("unable to check for changes"))? {
        gitter.add(dir, ".")?;
        gitter
            .commit(dir, "chore(config): update configuration")
            .map_err(|e| e.with_context(format!("unable to commit changes to environment repo in {}", dir.display())))?;
    }

    gitter
        .push(dir, &remote, true, "master")
        .map_err(|e| e.with_context(format!("unable to push {} to {}", dir.display(), repo.clone_url)))?;
    crate::log_status!("environments", "Pushed Git repository to {}", repo.html_url);
    Ok(())
}

/// `jx-requirements.yml` inside an environment repository clone.
pub fn environment_requirements_file(dir: &Path) -> PathBuf {
    dir.join(REQUIREMENTS_CONFIG_FILE_NAME)
}
