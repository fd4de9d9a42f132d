//! Hosted git providers reached over their REST APIs.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};

use super::auth::{AuthServer, UserAuth};
use super::{GITHUB_HOST, KIND_GITHUB, KIND_GITLAB};

const USER_AGENT: &str = concat!("jx/", env!("CARGO_PKG_VERSION"));

/// A repository as reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitRepo {
    pub owner: String,
    pub name: String,
    pub clone_url: String,
    pub html_url: String,
    pub private: bool,
}

pub trait GitProvider {
    fn kind(&self) -> &str;
    fn server_url(&self) -> &str;
    fn current_username(&self) -> &str;
    fn token(&self) -> &str;
    /// Look up `owner/name`, `None` when the provider does not know it.
    fn get_repository(&self, owner: &str, name: &str) -> Result<Option<GitRepo>>;
    fn create_repository(&self, owner: &str, name: &str, private: bool) -> Result<GitRepo>;
}

/// Build the provider for a server kind.
pub fn create_provider(server: &AuthServer, user: &UserAuth) -> Result<Box<dyn GitProvider>> {
    match server.kind() {
        KIND_GITHUB => Ok(Box::new(GitHubProvider::new(&server.url, user))),
        KIND_GITLAB => Ok(Box::new(GitLabProvider::new(&server.url, user))),
        other => Err(Error::validation_invalid_argument(
            "gitKind",
            format!("unsupported git kind {} for server {}", other, server.url),
            Some(other.to_string()),
            Some(vec![KIND_GITHUB.to_string(), KIND_GITLAB.to_string()]),
        )),
    }
}

fn http_error(e: reqwest::Error) -> Error {
    Error::git_provider_failed(
        format!("HTTP request failed: {}", e),
        e.status().map(|s| s.as_u16()),
    )
}

fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(Error::git_provider_failed(
            format!("{} failed: HTTP {}: {}", what, status.as_u16(), body),
            Some(status.as_u16()),
        ));
    }
    response.json::<T>().map_err(|e| {
        Error::internal_json(e.to_string(), Some(format!("parse response of {}", what)))
    })
}

fn read_optional<T: DeserializeOwned>(response: Response, what: &str) -> Result<Option<T>> {
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    read_json(response, what).map(Some)
}

pub struct GitHubProvider {
    client: Client,
    server_url: String,
    api_url: String,
    username: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    owner: GitHubOwner,
    clone_url: String,
    html_url: String,
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

impl From<GitHubRepo> for GitRepo {
    fn from(repo: GitHubRepo) -> Self {
        GitRepo {
            owner: repo.owner.login,
            name: repo.name,
            clone_url: repo.clone_url,
            html_url: repo.html_url,
            private: repo.private,
        }
    }
}

/// REST root for a GitHub server: the public API or Enterprise's `/api/v3`.
pub(crate) fn github_api_url(server_url: &str) -> String {
    let server = server_url.trim_end_matches('/');
    let host = server.split_once("://").map(|(_, h)| h).unwrap_or(server);
    if server.is_empty() || host == GITHUB_HOST || host == "www.github.com" {
        "https://api.github.com".to_string()
    } else {
        format!("{}/api/v3", server)
    }
}

impl GitHubProvider {
    pub fn new(server_url: &str, user: &UserAuth) -> Self {
        Self {
            client: Client::new(),
            server_url: server_url.to_string(),
            api_url: github_api_url(server_url),
            username: user.username.clone(),
            token: user.token().to_string(),
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github.v3+json");
        if self.token.is_empty() {
            builder
        } else {
            builder.header("Authorization", format!("token {}", self.token))
        }
    }
}

impl GitProvider for GitHubProvider {
    fn kind(&self) -> &str {
        KIND_GITHUB
    }

    fn server_url(&self) -> &str {
        &self.server_url
    }

    fn current_username(&self) -> &str {
        &self.username
    }

    fn token(&self) -> &str {
        &self.token
    }

    fn get_repository(&self, owner: &str, name: &str) -> Result<Option<GitRepo>> {
        let url = format!("{}/repos/{}/{}", self.api_url, owner, name);
        let response = self.request(self.client.get(&url)).send().map_err(http_error)?;
        let repo: Option<GitHubRepo> = read_optional(response, &format!("get repository {}/{}", owner, name))?;
        Ok(repo.map(GitRepo::from))
    }

    fn create_repository(&self, owner: &str, name: &str, private: bool) -> Result<GitRepo> {
        let url = if owner == self.username {
            format!("{}/user/repos", self.api_url)
        } else {
            format!("{}/orgs/{}/repos", self.api_url, owner)
        };
        let body = json!({ "name": name, "private": private });
        let response = self
            .request(self.client.post(&url).json(&body))
            .send()
            .map_err(http_error)?;
        let repo: GitHubRepo = read_json(response, &format!("create repository {}/{}", owner, name))?;
        crate::log_status!("git", "Created repository {}", repo.html_url);
        Ok(repo.into())
    }
}

pub struct GitLabProvider {
    client: Client,
    server_url: String,
    api_url: String,
    username: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    path: String,
    namespace: GitLabNamespace,
    http_url_to_repo: String,
    web_url: String,
    #[serde(default)]
    visibility: String,
}

#[derive(Debug, Deserialize)]
struct GitLabNamespace {
    id: u64,
    full_path: String,
    #[serde(default)]
    kind: String,
}

impl From<GitLabProject> for GitRepo {
    fn from(project: GitLabProject) -> Self {
        GitRepo {
            owner: project.namespace.full_path,
            name: project.path,
            clone_url: project.http_url_to_repo,
            html_url: project.web_url,
            private: project.visibility != "public",
        }
    }
}

/// GitLab accepts `group/sub/project` paths as ids once URL-encoded.
fn encode_path(path: &str) -> String {
    path.replace('/', "%2F")
}

impl GitLabProvider {
    pub fn new(server_url: &str, user: &UserAuth) -> Self {
        let server = server_url.trim_end_matches('/');
        let server = if server.is_empty() { "https://gitlab.com" } else { server };
        Self {
            client: Client::new(),
            server_url: server.to_string(),
            api_url: format!("{}/api/v4", server),
            username: user.username.clone(),
            token: user.token().to_string(),
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("User-Agent", USER_AGENT);
        if self.token.is_empty() {
            builder
        } else {
            builder.header("PRIVATE-TOKEN", self.token.clone())
        }
    }

    fn namespace(&self, owner: &str) -> Result<GitLabNamespace> {
        let url = format!("{}/namespaces/{}", self.api_url, encode_path(owner));
        let response = self.request(self.client.get(&url)).send().map_err(http_error)?;
        read_json(response, &format!("get namespace {}", owner))
    }
}

impl GitProvider for GitLabProvider {
    fn kind(&self) -> &str {
        KIND_GITLAB
    }

    fn server_url(&self) -> &str {
        &self.server_url
    }

    fn current_username(&self) -> &str {
        &self.username
    }

    fn token(&self) -> &str {
        &self.token
    }

    fn get_repository(&self, owner: &str, name: &str) -> Result<Option<GitRepo>> {
        let url = format!(
            "{}/projects/{}",
            self.api_url,
            encode_path(&format!("{}/{}", owner, name))
        );
        let response = self.request(self.client.get(&url)).send().map_err(http_error)?;
        let project: Option<GitLabProject> =
            read_optional(response, &format!("get project {}/{}", owner, name))?;
        Ok(project.map(GitRepo::from))
    }

    fn create_repository(&self, owner: &str, name: &str, private: bool) -> Result<GitRepo> {
        let visibility = if private { "private" } else { "public" };
        let mut body = json!({ "name": name, "path": name, "visibility": visibility });
        if owner != self.username {
            let namespace = self.namespace(owner)?;
            crate::log_debug!("git", "creating project in {} namespace {}", namespace.kind, namespace.full_path);
            body["namespace_id"] = json!(namespace.id);
        }
        let url = format!("{}/projects", self.api_url);
        let response = self
            .request(self.client.post(&url).json(&body))
            .send()
            .map_err(http_error)?;
        let project: GitLabProject = read_json(response, &format!("create project {}/{}", owner, name))?;
        crate::log_status!("git", "Created project {}", project.web_url);
        Ok(project.into())
    }
}
