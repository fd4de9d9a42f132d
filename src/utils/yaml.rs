use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::io;

/// Parse a YAML document, naming `source` in the error.
pub fn from_str<T: DeserializeOwned>(content: &str, source: &str) -> Result<T> {
    serde_yml::from_str(content).map_err(|e| Error::config_invalid_yaml(source, e))
}

pub fn to_string<T: Serialize>(data: &T, context: &str) -> Result<String> {
    serde_yml::to_string(data).map_err(|e| Error::internal_yaml(e.to_string(), Some(context.to_string())))
}

pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = io::read_file(path, "read YAML file")?;
    from_str(&content, &path.display().to_string())
}

pub fn write_file<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = to_string(data, &format!("marshal {}", path.display()))?;
    io::write_file_atomic(path, &content, &format!("save file {}", path.display()))
}
