//! Git server credentials stored in `~/.jx/gitAuth.yaml`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::utils::{io, yaml};

use super::{kind_from_server, normalize_url, KIND_GITHUB};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub servers: Vec<AuthServer>,
    #[serde(default, rename = "defaultusername", skip_serializing_if = "String::is_empty")]
    pub default_username: String,
    #[serde(default, rename = "currentserver", skip_serializing_if = "String::is_empty")]
    pub current_server: String,
    #[serde(default, rename = "pipelineserver", skip_serializing_if = "String::is_empty")]
    pub pipeline_server: String,
    #[serde(default, rename = "pipelineusername", skip_serializing_if = "String::is_empty")]
    pub pipeline_username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthServer {
    pub url: String,
    #[serde(default)]
    pub users: Vec<UserAuth>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, rename = "currentuser", skip_serializing_if = "String::is_empty")]
    pub current_user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default, rename = "apitoken", skip_serializing_if = "String::is_empty")]
    pub api_token: String,
    #[serde(default, rename = "bearertoken", skip_serializing_if = "String::is_empty")]
    pub bearer_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl UserAuth {
    /// Token used against the provider API, whichever form was stored.
    pub fn token(&self) -> &str {
        if !self.api_token.is_empty() {
            &self.api_token
        } else if !self.bearer_token.is_empty() {
            &self.bearer_token
        } else {
            &self.password
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.username.is_empty() || self.token().is_empty()
    }
}

impl AuthServer {
    pub fn kind(&self) -> &str {
        if !self.kind.is_empty() {
            &self.kind
        } else {
            kind_from_server(&self.url).unwrap_or(KIND_GITHUB)
        }
    }

    pub fn find_user(&self, username: &str) -> Option<&UserAuth> {
        self.users.iter().find(|u| u.username == username)
    }
}

/// Load the auth config. A missing file is an empty config.
pub fn load_auth_config(path: &Path) -> Result<AuthConfig> {
    if !io::file_exists(path) {
        return Ok(AuthConfig::default());
    }
    yaml::read_file(path)
}

impl AuthConfig {
    pub fn find_server(&self, url: &str) -> Option<&AuthServer> {
        let wanted = normalize_url(url);
        self.servers.iter().find(|s| normalize_url(&s.url) == wanted)
    }

    fn find_server_mut(&mut self, url: &str) -> Option<&mut AuthServer> {
        let wanted = normalize_url(url);
        self.servers.iter_mut().find(|s| normalize_url(&s.url) == wanted)
    }

    /// The server and user pipelines authenticate as.
    ///
    /// Falls back to the current server and its current user when no
    /// pipeline server is recorded.
    pub fn pipeline_auth(&self) -> (Option<&AuthServer>, Option<&UserAuth>) {
        let server_url = if self.pipeline_server.is_empty() {
            &self.current_server
        } else {
            &self.pipeline_server
        };
        let server = self
            .find_server(server_url)
            .or_else(|| if self.servers.len() == 1 { self.servers.first() } else { None });
        let Some(server) = server else {
            return (None, None);
        };

        let username = [&self.pipeline_username, &server.current_user, &self.default_username]
            .into_iter()
            .find(|u| !u.is_empty());
        let user = match username {
            Some(name) => server.find_user(name),
            None => server.users.first(),
        };
        (Some(server), user)
    }

    /// Register `GIT_USERNAME` / `GIT_API_TOKEN` as the pipeline user of
    /// `server_url`. Nothing changes unless both are set.
    pub fn apply_environment<F>(&mut self, server_url: &str, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let (Some(username), Some(token)) = (get("GIT_USERNAME"), get("GIT_API_TOKEN")) else {
            return;
        };

        let url = if server_url.is_empty() { super::GITHUB_URL } else { server_url };
        if self.find_server(url).is_none() {
            self.servers.push(AuthServer {
                url: url.to_string(),
                kind: kind_from_server(url).unwrap_or(KIND_GITHUB).to_string(),
                ..Default::default()
            });
        }
        if let Some(server) = self.find_server_mut(url) {
            match server.users.iter_mut().find(|u| u.username == username) {
                Some(user) => user.api_token = token,
                None => server.users.push(UserAuth {
                    username: username.clone(),
                    api_token: token,
                    ..Default::default()
                }),
            }
            server.current_user = username.clone();
        }
        self.pipeline_server = url.to_string();
        self.pipeline_username = username;
    }
}
