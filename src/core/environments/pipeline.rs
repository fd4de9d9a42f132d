use serde_yml::{Mapping, Value};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::{io, yaml};

pub const PROJECT_CONFIG_FILE_NAME: &str = "jenkins-x.yml";
pub const PARAMETERS_FILE: &str = "env/parameters.yaml";

pub const GIT_AUTHOR_NAME: &str = "GIT_AUTHOR_NAME";
pub const GIT_AUTHOR_EMAIL: &str = "GIT_AUTHOR_EMAIL";
pub const GIT_COMMITTER_NAME: &str = "GIT_COMMITTER_NAME";
pub const GIT_COMMITTER_EMAIL: &str = "GIT_COMMITTER_EMAIL";

const RELEASE_ENVIRONMENT_PATH: &[&str] = &["pipelineConfig", "pipelines", "release", "pipeline", "environment"];

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// The value under `key`, replaced by `empty` when missing or null.
fn child_or_insert<'a>(mapping: &'a mut Mapping, key: &str, empty: Value) -> Result<&'a mut Value> {
    if mapping.get(key).map_or(true, Value::is_null) {
        mapping.insert(Value::String(key.to_string()), empty);
    }
    mapping
        .get_mut(key)
        .ok_or_else(|| Error::internal_unexpected(format!("{} missing after insert", key)))
}

fn child_mapping<'a>(mapping: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping> {
    let entry = child_or_insert(mapping, key, Value::Mapping(Mapping::new()))?;
    entry.as_mapping_mut().ok_or_else(|| {
        Error::config_invalid_value(key, None, format!("{} in {} is not a mapping", key, PROJECT_CONFIG_FILE_NAME))
    })
}

/// Pipeline user name and email from `env/parameters.yaml`, when both are set.
pub fn pipeline_user(dir: &Path) -> Result<Option<(String, String)>> {
    let file = dir.join(PARAMETERS_FILE);
    if !io::file_exists(&file) {
        return Ok(None);
    }
    let parameters: Value = yaml::read_file(&file)?;
    let get = |key: &str| {
        lookup(&parameters, &["pipelineUser", key])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let (username, email) = (get("username"), get("email"));
    if username.is_empty() || email.is_empty() {
        return Ok(None);
    }
    Ok(Some((username, email)))
}

/// Make the release pipeline commit as the pipeline user by adding the git
/// author and committer variables to `jenkins-x.yml`. Variables already in
/// the pipeline keep their values. Returns the variables that apply.
pub fn set_pipeline_git_env_vars(dir: &Path) -> Result<Vec<(String, String)>> {
    let Some((username, email)) = pipeline_user(dir)? else {
        return Ok(Vec::new());
    };

    let file = dir.join(PROJECT_CONFIG_FILE_NAME);
    let mut config: Value = if io::file_exists(&file) {
        yaml::read_file(&file)?
    } else {
        Value::Mapping(Mapping::new())
    };
    if config.is_null() {
        config = Value::Mapping(Mapping::new());
    }

    let root = config.as_mapping_mut().ok_or_else(|| {
        Error::config_invalid_yaml(file.display().to_string(), "expected a mapping at the top level")
    })?;
    let (parents, last) = RELEASE_ENVIRONMENT_PATH.split_at(RELEASE_ENVIRONMENT_PATH.len() - 1);
    let mut mapping = root;
    for key in parents {
        mapping = child_mapping(mapping, key)?;
    }
    let env = child_or_insert(mapping, last[0], Value::Sequence(Vec::new()))?;
    let env = env.as_sequence_mut().ok_or_else(|| {
        Error::config_invalid_value("environment", None, "release pipeline environment is not a list")
    })?;

    let wanted = [
        (GIT_AUTHOR_NAME, &username),
        (GIT_COMMITTER_NAME, &username),
        (GIT_AUTHOR_EMAIL, &email),
        (GIT_COMMITTER_EMAIL, &email),
    ];
    for (name, value) in wanted {
        let exists = env
            .iter()
            .any(|entry| entry.get("name").and_then(Value::as_str) == Some(name));
        if !exists {
            let mut entry = Mapping::new();
            entry.insert(Value::String("name".to_string()), Value::String(name.to_string()));
            entry.insert(Value::String("value".to_string()), Value::String(value.clone()));
            env.push(Value::Mapping(entry));
        }
    }

    yaml::write_file(&file, &config).map_err(|e| e.with_context(format!("failed to write to {}", file.display())))?;
    Ok(wanted
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}
