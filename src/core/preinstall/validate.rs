use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::gits;
use crate::naming;
use crate::prompt::Prompter;
use crate::requirements::{RepositoryType, RequirementsConfig, SecretStorageType, WebhookType};
use crate::utils::io;

pub const DEFAULT_SECRETS_YAML: &str = r#"secrets:
  adminUser:
    username: "admin"
    password: ""
  hmacToken: ""
  pipelineUser:
    username: ""
    email: ""
    token: ""
"#;

const SECRETS_DOC_URL: &str =
    "https://github.com/jenkins-x/enhancements/blob/master/proposals/2/docs/getting-started.md#setting-up-your-secrets";

/// Resolve the helmfile secrets file, writing a skeleton when it does not
/// exist yet so `helmfile lint` can run.
///
/// Without `$JX_SECRETS_YAML` a temporary location is used when
/// `default_helmfile_secrets` is set; otherwise it is an error.
pub fn validate_secrets_yaml(secrets_yaml: Option<&str>, default_helmfile_secrets: bool) -> Result<PathBuf> {
    let path = match secrets_yaml.filter(|s| !s.is_empty()) {
        Some(path) => PathBuf::from(path),
        None if default_helmfile_secrets => std::env::temp_dir()
            .join(format!("jx-secrets-{}", uuid::Uuid::new_v4().simple()))
            .join("secrets.yaml"),
        None => {
            return Err(Error::validation_missing_argument(
                "JX_SECRETS_YAML",
                format!(
                    "no $JX_SECRETS_YAML environment variable defined.\nPlease point this at your 'secrets.yaml' file.\nSee {}",
                    SECRETS_DOC_URL
                ),
            ))
        }
    };

    if !io::file_exists(&path) {
        io::write_file_atomic(&path, DEFAULT_SECRETS_YAML, "write default secrets")?;
        crate::log_status!("preinstall", "Generated a default empty secrets YAML file at {}", path.display());
    }
    Ok(path)
}

/// Check the webhook suits the git provider and fill in derived defaults.
/// Returns whether the requirements changed.
pub fn validate_requirements(
    requirements: &mut RequirementsConfig,
    file: &Path,
    bucket_repo_charts_url: &str,
) -> Result<bool> {
    if requirements.webhook == Some(WebhookType::Prow) {
        let kind = &requirements.cluster.git_kind;
        let server = &requirements.cluster.git_server;
        let github_kind = kind.is_empty() || kind == gits::KIND_GITHUB;
        let github_server = server.is_empty() || gits::is_github_server(server);
        if !github_kind || !github_server {
            return Err(Error::config_invalid_value(
                "webhook",
                Some("prow".to_string()),
                format!(
                    "invalid requirements in file {} cannot use prow as a webhook for git kind: {} server: {}. Please try using lighthouse instead",
                    file.display(),
                    kind,
                    server
                ),
            ));
        }
    }

    let mut modified = false;
    if requirements.repository == Some(RepositoryType::Bucketrepo) && requirements.cluster.chart_repository.is_empty() {
        requirements.cluster.chart_repository = bucket_repo_charts_url.to_string();
        modified = true;
    }
    modified |= default_environment_repositories(requirements);
    Ok(modified)
}

/// Name every environment repository that has no name yet:
/// `environment-<cluster>`, or `environment-<cluster>-<key>` when there is
/// more than one environment.
pub fn default_environment_repositories(requirements: &mut RequirementsConfig) -> bool {
    let cluster_name = requirements.cluster.cluster_name.clone();
    let several = requirements.environments.len() > 1;
    let mut modified = false;

    for env in requirements.environments.iter_mut().filter(|e| e.repository.is_empty()) {
        let name = if !several {
            format!("environment-{}", cluster_name)
        } else if cluster_name.is_empty() {
            format!("environment-{}", env.key)
        } else {
            format!("environment-{}-{}", cluster_name, env.key)
        };
        env.repository = naming::to_valid_name(&name);
        modified = true;
    }
    modified
}

/// Namespace to boot into: the flag, the requirements, `$DEPLOY_NAMESPACE`,
/// then `jx`.
pub fn deploy_namespace(flag: &str, requirements: &RequirementsConfig, deploy_namespace_env: Option<&str>) -> String {
    [
        Some(flag),
        Some(requirements.cluster.namespace.as_str()),
        deploy_namespace_env,
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|ns| !ns.is_empty())
    .unwrap_or("jx")
    .to_string()
}

/// Warn when secrets would travel without TLS and ask before carrying on.
pub fn verify_tls(
    requirements: &RequirementsConfig,
    prompter: &dyn Prompter,
    override_warning: bool,
    doc_url: &str,
) -> Result<()> {
    if requirements.ingress.tls.enabled {
        return Ok(());
    }

    let mut confirm = false;
    if requirements.secret_storage == Some(SecretStorageType::Vault) {
        crate::log_warn!(
            "preinstall",
            "Vault is enabled and TLS is not enabled. This means your secrets will be sent to and from your cluster in the clear. See {} for more information",
            doc_url
        );
        confirm = true;
    }
    if requirements.webhook != Some(WebhookType::None) {
        crate::log_warn!(
            "preinstall",
            "TLS is not enabled so your webhooks will be called using HTTP. This means your webhook secret will be sent to your cluster in the clear. See {} for more information",
            doc_url
        );
        confirm = true;
    }
    if override_warning || prompter.is_batch() || !confirm {
        return Ok(());
    }

    if !prompter.confirm("Do you wish to continue?", false)? {
        return Err(Error::prompt_aborted("cannot continue because TLS is not enabled.")
            .with_hint("Jenkins X needs TLS enabled to send secrets securely. We strongly recommend enabling TLS."));
    }
    Ok(())
}
