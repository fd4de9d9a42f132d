use serde::Serialize;
use serde_yml::Value;
use std::env;
use std::path::{Path, PathBuf};

use super::{schema, RequirementsConfig};
use crate::error::{Error, Result};
use crate::utils::{io, yaml};

pub const REQUIREMENTS_CONFIG_FILE_NAME: &str = "jx-requirements.yml";
pub const REQUIREMENTS_CONFIG_FILE_NAME_ALT: &str = "jx-requirements.yaml";

/// Helmfile values file exposing the requirements to chart templates.
pub const REQUIREMENTS_VALUES_FILE_NAME: &str = "jx-requirements.values.yaml.gotmpl";

/// Wrapper written to the values file, so templates read `.Values.jxRequirements`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsValues<'a> {
    pub jx_requirements: &'a RequirementsConfig,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("resolve current dir".to_string())))?;
    Ok(cwd.join(path))
}

/// Search `dir` and then each parent directory for a requirements file.
///
/// Returns the loaded requirements and the file they came from. When no
/// file exists anywhere up the tree the error carries no file name.
pub fn load_requirements_config(
    dir: &Path,
    fail_on_validation_errors: bool,
) -> Result<(RequirementsConfig, PathBuf)> {
    let start = if dir.as_os_str().is_empty() {
        absolute(Path::new("."))?
    } else {
        absolute(dir)?
    };

    let mut current: Option<&Path> = Some(start.as_path());
    while let Some(path) = current {
        for name in [REQUIREMENTS_CONFIG_FILE_NAME, REQUIREMENTS_CONFIG_FILE_NAME_ALT] {
            let file = path.join(name);
            if file.is_file() {
                let requirements = load_file(&file, fail_on_validation_errors)?;
                return Ok((requirements, file));
            }
        }
        current = path.parent();
    }

    Err(Error::requirements_not_found(start.display().to_string()))
}

/// Load a specific requirements file, returning fresh defaults when it
/// does not exist yet.
pub fn load_requirements_config_file(
    path: &Path,
    fail_on_validation_errors: bool,
) -> Result<RequirementsConfig> {
    let path = absolute(path)?;
    if !path.is_file() {
        return Ok(RequirementsConfig::new());
    }
    load_file(&path, fail_on_validation_errors)
}

fn load_file(path: &Path, fail_on_validation_errors: bool) -> Result<RequirementsConfig> {
    let content = io::read_file(path, "read requirements")?;
    parse(&content, &path.display().to_string(), fail_on_validation_errors)
}

/// Parse requirements YAML, rejecting properties the model does not know.
pub fn parse_requirements(content: &str, source: &str) -> Result<RequirementsConfig> {
    parse(content, source, true)
}

fn parse(content: &str, source: &str, fail_on_validation_errors: bool) -> Result<RequirementsConfig> {
    let mut value: Value = yaml::from_str(content, source)?;
    if value.is_null() {
        value = Value::Mapping(Default::default());
    }

    migrate_environment_git_private(&mut value)?;

    let failures = schema::validate(&value);
    if !failures.is_empty() {
        let err = Error::validation_schema_failed(source, failures);
        if fail_on_validation_errors {
            return Err(err);
        }
        crate::log_warn!("requirements", "{}", err.message);
    }

    let mut requirements: RequirementsConfig = serde_yml::from_value(value)
        .map_err(|e| Error::config_invalid_yaml(source, e))?;
    requirements.add_defaults();
    Ok(requirements)
}

/// `environmentGitPrivate` predates `environmentGitPublic`; translate it and
/// refuse files that set both.
fn migrate_environment_git_private(value: &mut Value) -> Result<()> {
    let Some(cluster) = value.get_mut("cluster").and_then(Value::as_mapping_mut) else {
        return Ok(());
    };
    let Some(private) = cluster.remove("environmentGitPrivate") else {
        return Ok(());
    };
    if cluster.contains_key("environmentGitPublic") {
        return Err(Error::config_invalid_value(
            "cluster.environmentGitPrivate",
            private.as_bool().map(|b| b.to_string()),
            "environmentGitPublic and environmentGitPrivate specified together, only EnvironmentGitPublic should be used",
        ));
    }
    let private = private.as_bool().unwrap_or(false);
    cluster.insert(
        Value::String("environmentGitPublic".to_string()),
        Value::Bool(!private),
    );
    Ok(())
}

impl RequirementsConfig {
    /// Write the requirements to `path`. Helmfile based installs also get the
    /// values file next to it.
    pub fn save_config(&self, path: &Path) -> Result<()> {
        yaml::write_file(path, self)?;
        if self.helmfile {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            save_requirements_values_file(self, dir)?;
        }
        Ok(())
    }

    /// Merge `changed` into these requirements and save the result.
    pub fn merge_save(&mut self, changed: &RequirementsConfig, path: &Path) -> Result<()> {
        use super::Merge;
        self.merge(changed);
        self.save_config(path)
    }
}

pub fn save_requirements_values_file(requirements: &RequirementsConfig, dir: &Path) -> Result<()> {
    let values = RequirementsValues {
        jx_requirements: requirements,
    };
    yaml::write_file(&dir.join(REQUIREMENTS_VALUES_FILE_NAME), &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::{SecretStorageType, WebhookType};
    use std::fs;

    const EXISTING: &str = r#"cluster:
  clusterName: my-cluster
  provider: gke
  environmentGitOwner: jstrachan
kaniko: true
secretStorage: vault
ingress:
  domain: cheese.co.uk
environments:
  - key: dev
  - key: staging
"#;

    #[test]
    fn loads_existing_file_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(REQUIREMENTS_CONFIG_FILE_NAME);
        fs::write(&file, EXISTING).unwrap();

        let (requirements, found) = load_requirements_config(dir.path(), true).unwrap();
        assert_eq!(found, file);
        assert!(requirements.kaniko);
        assert_eq!(requirements.cluster.cluster_name, "my-cluster");
        assert_eq!(requirements.secret_storage, Some(SecretStorageType::Vault));
        assert_eq!(requirements.ingress.domain, "cheese.co.uk");

        requirements.save_config(&file).unwrap();
        let (reloaded, _) = load_requirements_config(dir.path(), true).unwrap();
        assert_eq!(reloaded, requirements);
    }

    #[test]
    fn kaniko_false_survives_save() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(REQUIREMENTS_CONFIG_FILE_NAME);
        let requirements = RequirementsConfig::new();
        requirements.save_config(&file).unwrap();

        let loaded = load_requirements_config_file(&file, true).unwrap();
        assert!(!loaded.kaniko);
    }

    #[test]
    fn searches_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("e/f/g");
        fs::create_dir_all(&nested).unwrap();
        let file = dir.path().join("e").join(REQUIREMENTS_CONFIG_FILE_NAME);
        fs::write(&file, "webhook: prow\n").unwrap();

        let (requirements, found) = load_requirements_config(&nested, true).unwrap();
        assert_eq!(found, file);
        assert_eq!(requirements.webhook, Some(WebhookType::Prow));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let err = load_requirements_config(&nested, true).unwrap_err();
        assert_eq!(err.code.as_str(), "requirements.not_found");
    }

    #[test]
    fn missing_specific_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded =
            load_requirements_config_file(&dir.path().join(REQUIREMENTS_CONFIG_FILE_NAME), true)
                .unwrap();
        assert_eq!(loaded, RequirementsConfig::new());
    }

    #[test]
    fn unknown_property_names_file_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(REQUIREMENTS_CONFIG_FILE_NAME);
        fs::write(&file, "environments:\n  - key: dev\n    namespace: jx\n").unwrap();

        let err = load_requirements_config(dir.path(), true).unwrap_err();
        assert_eq!(
            err.message,
            format!(
                "validation failures in YAML file {}:\nenvironments.0: Additional property namespace is not allowed",
                file.display()
            )
        );
    }

    #[test]
    fn unknown_property_is_tolerated_when_not_strict() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(REQUIREMENTS_CONFIG_FILE_NAME);
        fs::write(&file, "environments:\n  - key: dev\n    namespace: jx\n").unwrap();

        let (requirements, _) = load_requirements_config(dir.path(), false).unwrap();
        assert_eq!(requirements.environments[0].key, "dev");
    }

    #[test]
    fn environment_git_private_is_inverted() {
        let requirements =
            parse_requirements("cluster:\n  environmentGitPrivate: true\n", "test").unwrap();
        assert!(!requirements.cluster.environment_git_public);

        let requirements =
            parse_requirements("cluster:\n  environmentGitPrivate: false\n", "test").unwrap();
        assert!(requirements.cluster.environment_git_public);

        let requirements =
            parse_requirements("cluster:\n  environmentGitPublic: true\n", "test").unwrap();
        assert!(requirements.cluster.environment_git_public);
    }

    #[test]
    fn public_and_private_together_fail() {
        let err = parse_requirements(
            "cluster:\n  environmentGitPublic: true\n  environmentGitPrivate: true\n",
            "test",
        )
        .unwrap_err();
        assert!(err.message.contains("only EnvironmentGitPublic should be used"));
    }

    #[test]
    fn values_file_only_written_for_helmfile() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(REQUIREMENTS_CONFIG_FILE_NAME);
        let values = dir.path().join(REQUIREMENTS_VALUES_FILE_NAME);
        let mut requirements = RequirementsConfig::new();
        requirements.cluster.cluster_name = "jx_rocks".to_string();

        requirements.save_config(&file).unwrap();
        assert!(file.exists());
        assert!(!values.exists());

        requirements.helmfile = true;
        requirements.save_config(&file).unwrap();
        assert!(values.exists());
        let content = fs::read_to_string(&values).unwrap();
        assert!(content.starts_with("jxRequirements:"));
        assert!(content.contains("clusterName: jx_rocks"));
    }

    #[test]
    fn empty_file_gets_defaults() {
        let requirements = parse_requirements("", "empty").unwrap();
        assert_eq!(requirements.cluster.namespace, "jx");
        assert_eq!(requirements.webhook, Some(WebhookType::Prow));
    }
}
