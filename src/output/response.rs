//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use jx::error::Hint;
use jx::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize response".to_string())))
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: (!err.hints.is_empty()).then(|| err.hints.clone()),
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(Error::internal_io(e.to_string(), Some("write stdout".to_string())));
    }
    Ok(())
}

pub fn map_cmd_result_to_json<T: Serialize>(result: Result<(T, i32)>) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(err.to_string(), Some("serialize response".to_string()))),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidYaml
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument
        | ErrorCode::ValidationSchemaFailed
        | ErrorCode::PromptAborted => 2,

        ErrorCode::RequirementsNotFound
        | ErrorCode::AppsNotFound
        | ErrorCode::EnvironmentNotFound
        | ErrorCode::PackageMissing => 4,

        ErrorCode::KubeCommandFailed
        | ErrorCode::HelmCommandFailed
        | ErrorCode::GitCommandFailed
        | ErrorCode::GitProviderFailed
        | ErrorCode::BucketCommandFailed
        | ErrorCode::CloudCommandFailed
        | ErrorCode::VersionStreamFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalYamlError
        | ErrorCode::InternalUnexpected => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => print_response(&CliResponse::success(data)),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_exit_codes() {
        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::requirements_not_found("/tmp")));
        assert_eq!(code, 4);
        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::validation_missing_argument("cluster.provider", "missing")));
        assert_eq!(code, 2);
        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::git_command_failed("push rejected")));
        assert_eq!(code, 20);
        let (value, code) = map_cmd_result_to_json(Ok((vec!["a"], 0)));
        assert_eq!(code, 0);
        assert_eq!(value.unwrap(), serde_json::json!(["a"]));
    }

    #[test]
    fn error_envelope_omits_empty_hints() {
        let err = Error::prompt_aborted("finishing execution");
        let json = serde_json::to_value(CliResponse::<()>::from_error(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "prompt.aborted");
        assert!(json["error"].get("hints").is_none());
    }
}
