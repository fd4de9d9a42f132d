use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidYaml,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationSchemaFailed,

    RequirementsNotFound,
    AppsNotFound,
    EnvironmentNotFound,

    KubeCommandFailed,
    HelmCommandFailed,
    GitCommandFailed,
    GitProviderFailed,
    BucketCommandFailed,
    CloudCommandFailed,
    VersionStreamFailed,
    PackageMissing,

    PromptAborted,

    InternalIoError,
    InternalJsonError,
    InternalYamlError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidYaml => "config.invalid_yaml",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationSchemaFailed => "validation.schema_failed",

            ErrorCode::RequirementsNotFound => "requirements.not_found",
            ErrorCode::AppsNotFound => "apps.not_found",
            ErrorCode::EnvironmentNotFound => "environment.not_found",

            ErrorCode::KubeCommandFailed => "kube.command_failed",
            ErrorCode::HelmCommandFailed => "helm.command_failed",
            ErrorCode::GitCommandFailed => "git.command_failed",
            ErrorCode::GitProviderFailed => "git.provider_failed",
            ErrorCode::BucketCommandFailed => "bucket.command_failed",
            ErrorCode::CloudCommandFailed => "cloud.command_failed",
            ErrorCode::VersionStreamFailed => "versionstream.failed",
            ErrorCode::PackageMissing => "package.missing",

            ErrorCode::PromptAborted => "prompt.aborted",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalYamlError => "internal.yaml_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCommandFailedDetails {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_missing_argument(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::ValidationMissingArgument,
            problem,
            serde_json::json!({ "field": field }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });
        Self::new(ErrorCode::ValidationInvalidArgument, problem, details)
    }

    /// Schema violations found while loading a YAML file. The message lists
    /// one `<path>: <problem>` line per violation.
    pub fn validation_schema_failed(file: impl Into<String>, failures: Vec<String>) -> Self {
        let file = file.into();
        let message = format!(
            "validation failures in YAML file {}:\n{}",
            file,
            failures.join("\n")
        );
        Self::new(
            ErrorCode::ValidationSchemaFailed,
            message,
            serde_json::json!({ "file": file, "failures": failures }),
        )
    }

    pub fn requirements_not_found(dir: impl Into<String>) -> Self {
        let dir = dir.into();
        Self::new(
            ErrorCode::RequirementsNotFound,
            format!(
                "no {} file found in {} or any parent directory",
                crate::requirements::REQUIREMENTS_CONFIG_FILE_NAME,
                dir
            ),
            serde_json::json!({ "dir": dir }),
        )
    }

    pub fn apps_not_found(dir: impl Into<String>) -> Self {
        let dir = dir.into();
        Self::new(
            ErrorCode::AppsNotFound,
            format!(
                "no {} file found in {}",
                crate::apps::APP_CONFIG_FILE_NAME,
                dir
            ),
            serde_json::json!({ "dir": dir }),
        )
        .with_hint("Run the command from the root of an environment git repository")
    }

    pub fn environment_not_found(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::EnvironmentNotFound,
            format!("environment {} not found in the requirements", key),
            serde_json::json!({ "id": key }),
        )
    }

    pub fn kube_command_failed(details: ToolCommandFailedDetails) -> Self {
        let message = format!("kubectl {} failed", details.command);
        Self::new(ErrorCode::KubeCommandFailed, message, to_details(details))
    }

    pub fn helm_command_failed(details: ToolCommandFailedDetails) -> Self {
        let message = format!("helm {} failed", details.command);
        Self::new(ErrorCode::HelmCommandFailed, message, to_details(details))
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn git_provider_failed(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(
            ErrorCode::GitProviderFailed,
            message,
            serde_json::json!({ "status": status }),
        )
    }

    pub fn bucket_command_failed(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::BucketCommandFailed,
            message,
            serde_json::json!({ "url": url.into() }),
        )
    }

    pub fn cloud_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CloudCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn version_stream_failed(message: impl Into<String>, dir: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::VersionStreamFailed,
            message,
            serde_json::json!({ "dir": dir.into() }),
        )
    }

    pub fn package_missing(package: impl Into<String>) -> Self {
        let package = package.into();
        Self::new(
            ErrorCode::PackageMissing,
            format!("required binary {} was not found on the PATH", package),
            serde_json::json!({ "package": package }),
        )
    }

    pub fn prompt_aborted(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PromptAborted,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let message = format!("missing required configuration key {}", key);
        Self::new(
            ErrorCode::ConfigMissingKey,
            message,
            to_details(ConfigMissingKeyDetails { key, path }),
        )
    }

    pub fn config_invalid_yaml(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidYaml,
            format!("failed to unmarshal YAML file {}: {}", path, err),
            serde_json::json!({ "path": path, "error": err.to_string() }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.clone(),
        });
        Self::new(ErrorCode::ConfigInvalidValue, problem, details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = match &context {
            Some(ctx) => format!("{}: {}", ctx, error),
            None => error.clone(),
        };
        Self::new(
            ErrorCode::InternalIoError,
            message,
            to_details(InternalErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_yaml(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalYamlError,
            "YAML error",
            to_details(InternalErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            error.clone(),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Prefix the message with what was being attempted, keeping the code.
    pub fn with_context(mut self, context: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }
}
