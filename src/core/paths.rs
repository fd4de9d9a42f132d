use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base jx home directory: `$JX_HOME` (a leading `~` is expanded), or `~/.jx`.
pub fn jx_home() -> Result<PathBuf> {
    if let Ok(home) = env::var("JX_HOME") {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&home).into_owned()));
        }
    }

    #[cfg(windows)]
    {
        let profile = env::var("USERPROFILE").map_err(|_| {
            Error::internal_unexpected(
                "USERPROFILE environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(profile).join(".jx"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".jx"))
    }
}

/// Tool defaults file
pub fn jx_json() -> Result<PathBuf> {
    Ok(jx_home()?.join("jx.json"))
}

/// Git server credentials
pub fn git_auth_yaml() -> Result<PathBuf> {
    Ok(jx_home()?.join("gitAuth.yaml"))
}

/// Local clone of the version stream
pub fn versions_dir() -> Result<PathBuf> {
    Ok(jx_home()?.join("jenkins-x-versions"))
}
