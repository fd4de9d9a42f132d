//! In-memory stand-ins for the cluster, helm, git and prompts.

use semver::Version;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use crate::buckets::BucketProvider;
use crate::error::{Error, Result};
use crate::gcloud::GCloud;
use crate::gits::{GitProvider, GitRepo, Gitter};
use crate::helm::Helm;
use crate::kube::{ConfigMap, Environment, KubeClient, Namespace, ObjectMeta, Secret};
use crate::prompt::Prompter;

#[derive(Default)]
pub struct FakeKube {
    pub context: String,
    pub current_namespace: RefCell<String>,
    pub namespaces: RefCell<BTreeMap<String, Namespace>>,
    pub config_maps: RefCell<BTreeMap<(String, String), ConfigMap>>,
    pub secrets: RefCell<BTreeMap<(String, String), Secret>>,
    pub environments: RefCell<Vec<Environment>>,
}

impl FakeKube {
    pub fn new(current_namespace: &str) -> Self {
        Self {
            context: "minikube".to_string(),
            current_namespace: RefCell::new(current_namespace.to_string()),
            ..Default::default()
        }
    }

    pub fn with_namespace(self, name: &str, labels: &[(&str, &str)]) -> Self {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: name.to_string(),
                labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                ..Default::default()
            },
        };
        self.namespaces.borrow_mut().insert(name.to_string(), namespace);
        self
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.config_maps
            .borrow()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

impl KubeClient for FakeKube {
    fn current_context(&self) -> Result<String> {
        Ok(self.context.clone())
    }

    fn current_namespace(&self) -> Result<String> {
        Ok(self.current_namespace.borrow().clone())
    }

    fn set_current_namespace(&self, namespace: &str) -> Result<()> {
        *self.current_namespace.borrow_mut() = namespace.to_string();
        Ok(())
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.borrow().keys().cloned().collect())
    }

    fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces.borrow().get(name).cloned())
    }

    fn apply_namespace(&self, namespace: &Namespace) -> Result<()> {
        self.namespaces
            .borrow_mut()
            .insert(namespace.metadata.name.clone(), namespace.clone());
        Ok(())
    }

    fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.config_map(namespace, name))
    }

    fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let key = (config_map.metadata.namespace.clone(), config_map.metadata.name.clone());
        self.config_maps.borrow_mut().insert(key, config_map.clone());
        Ok(())
    }

    fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self
            .secrets
            .borrow()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    fn apply_secret(&self, secret: &Secret) -> Result<()> {
        let key = (secret.metadata.namespace.clone(), secret.metadata.name.clone());
        self.secrets.borrow_mut().insert(key, secret.clone());
        Ok(())
    }

    fn list_environments(&self, namespace: &str) -> Result<Vec<Environment>> {
        Ok(self
            .environments
            .borrow()
            .iter()
            .filter(|e| e.metadata.namespace == namespace)
            .cloned()
            .collect())
    }

    fn apply_environment(&self, environment: &Environment) -> Result<()> {
        let mut environments = self.environments.borrow_mut();
        environments.retain(|e| {
            e.metadata.name != environment.metadata.name || e.metadata.namespace != environment.metadata.namespace
        });
        environments.push(environment.clone());
        Ok(())
    }
}

pub struct FakeHelm {
    pub version: Version,
    pub repos: RefCell<BTreeMap<String, String>>,
    pub initialised: RefCell<bool>,
}

impl FakeHelm {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            repos: RefCell::new(BTreeMap::new()),
            initialised: RefCell::new(false),
        }
    }
}

impl Helm for FakeHelm {
    fn version(&self) -> Result<Version> {
        Ok(self.version.clone())
    }

    fn list_repos(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.repos.borrow().clone())
    }

    fn add_repo(&self, name: &str, url: &str) -> Result<()> {
        self.repos.borrow_mut().insert(name.to_string(), url.to_string());
        Ok(())
    }

    fn init_client_only(&self) -> Result<()> {
        *self.initialised.borrow_mut() = true;
        Ok(())
    }
}

/// Records every call; clones write the seeded files for the URL.
#[derive(Default)]
pub struct FakeGit {
    pub calls: RefCell<Vec<String>>,
    pub tags: Vec<String>,
    pub changes: bool,
    pub seeds: BTreeMap<String, Vec<(String, String)>>,
    pub remotes: RefCell<BTreeMap<String, String>>,
    pub config: RefCell<BTreeMap<String, String>>,
    pub cloned: RefCell<Vec<PathBuf>>,
}

impl FakeGit {
    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }
}

impl Gitter for FakeGit {
    fn clone_repo(&self, url: &str, dir: &Path) -> Result<()> {
        self.record(format!("clone {}", url));
        fs::create_dir_all(dir).map_err(|e| Error::internal_io(e.to_string(), None))?;
        for (file, content) in self.seeds.get(url).into_iter().flatten() {
            let path = dir.join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::internal_io(e.to_string(), None))?;
            }
            fs::write(&path, content).map_err(|e| Error::internal_io(e.to_string(), None))?;
        }
        self.remotes.borrow_mut().insert("origin".to_string(), url.to_string());
        self.cloned.borrow_mut().push(dir.to_path_buf());
        Ok(())
    }

    fn fetch_tags(&self, _dir: &Path) -> Result<()> {
        self.record("fetch".to_string());
        Ok(())
    }

    fn checkout(&self, _dir: &Path, commitish: &str) -> Result<()> {
        self.record(format!("checkout {}", commitish));
        Ok(())
    }

    fn latest_tag(&self, _dir: &Path) -> Result<Option<String>> {
        Ok(self.tags.last().cloned())
    }

    fn tags(&self, _dir: &Path) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    fn add(&self, _dir: &Path, pattern: &str) -> Result<()> {
        self.record(format!("add {}", pattern));
        Ok(())
    }

    fn has_changes(&self, _dir: &Path) -> Result<bool> {
        Ok(self.changes)
    }

    fn commit(&self, _dir: &Path, message: &str) -> Result<()> {
        self.record(format!("commit {}", message));
        Ok(())
    }

    fn push(&self, _dir: &Path, remote: &str, force: bool, refspec: &str) -> Result<()> {
        self.record(format!("push {} {} {}", remote, force, refspec));
        Ok(())
    }

    fn remotes(&self, _dir: &Path) -> Result<BTreeMap<String, String>> {
        Ok(self.remotes.borrow().clone())
    }

    fn set_remote_url(&self, _dir: &Path, name: &str, url: &str) -> Result<()> {
        self.record(format!("remote {} {}", name, url));
        self.remotes.borrow_mut().insert(name.to_string(), url.to_string());
        Ok(())
    }

    fn config_value(&self, _dir: Option<&Path>, key: &str) -> Option<String> {
        self.config.borrow().get(key).cloned()
    }

    fn set_config_value(&self, _dir: Option<&Path>, key: &str, value: &str) -> Result<()> {
        self.config.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub repos: RefCell<BTreeMap<String, GitRepo>>,
    pub created: RefCell<Vec<(String, bool)>>,
}

impl FakeProvider {
    pub fn with_repo(self, owner: &str, name: &str) -> Self {
        let repo = fake_repo(owner, name, false);
        self.repos.borrow_mut().insert(format!("{}/{}", owner, name), repo);
        self
    }
}

fn fake_repo(owner: &str, name: &str, private: bool) -> GitRepo {
    GitRepo {
        owner: owner.to_string(),
        name: name.to_string(),
        clone_url: format!("https://github.com/{}/{}.git", owner, name),
        html_url: format!("https://github.com/{}/{}", owner, name),
        private,
    }
}

impl GitProvider for FakeProvider {
    fn kind(&self) -> &str {
        "github"
    }

    fn server_url(&self) -> &str {
        "https://github.com"
    }

    fn current_username(&self) -> &str {
        "bot"
    }

    fn token(&self) -> &str {
        "secret"
    }

    fn get_repository(&self, owner: &str, name: &str) -> Result<Option<GitRepo>> {
        Ok(self.repos.borrow().get(&format!("{}/{}", owner, name)).cloned())
    }

    fn create_repository(&self, owner: &str, name: &str, private: bool) -> Result<GitRepo> {
        let full_name = format!("{}/{}", owner, name);
        let repo = fake_repo(owner, name, private);
        self.repos.borrow_mut().insert(full_name.clone(), repo.clone());
        self.created.borrow_mut().push((full_name, private));
        Ok(repo)
    }
}

/// Answers questions from a script, falling back to the defaults.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub batch: bool,
    pub answers: RefCell<VecDeque<String>>,
    pub confirms: RefCell<VecDeque<bool>>,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn batch() -> Self {
        Self {
            batch: true,
            ..Default::default()
        }
    }

    pub fn answering(answers: &[&str], confirms: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
            confirms: RefCell::new(confirms.iter().copied().collect()),
            ..Default::default()
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn is_batch(&self) -> bool {
        self.batch
    }

    fn pick_name(&self, message: &str, _options: &[&str], default: &str) -> Result<String> {
        self.asked.borrow_mut().push(message.to_string());
        Ok(self
            .answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| default.to_string()))
    }

    fn pick_value(&self, message: &str, default: &str, required: bool) -> Result<String> {
        self.asked.borrow_mut().push(message.to_string());
        let answer = self
            .answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| default.to_string());
        if required && answer.is_empty() {
            return Err(Error::prompt_aborted(format!("no answer for {}", message)));
        }
        Ok(answer)
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        self.asked.borrow_mut().push(message.to_string());
        Ok(self.confirms.borrow_mut().pop_front().unwrap_or(default))
    }
}

#[derive(Default)]
pub struct FakeGCloud {
    pub projects: Vec<String>,
    pub zones: Vec<String>,
    pub connected: RefCell<Vec<String>>,
}

impl GCloud for FakeGCloud {
    fn list_projects(&self) -> Result<Vec<String>> {
        Ok(self.projects.clone())
    }

    fn list_zones(&self, _project: &str) -> Result<Vec<String>> {
        Ok(self.zones.clone())
    }

    fn connect_to_cluster(&self, project: &str, zone: &str, cluster: &str) -> Result<()> {
        self.connected
            .borrow_mut()
            .push(format!("{}/{}/{}", project, zone, cluster));
        Ok(())
    }

    fn get_or_create_service_account(&self, name: &str, _project: &str, dir: &Path, _roles: &[&str]) -> Result<PathBuf> {
        let file = dir.join(format!("{}.key.json", name));
        fs::write(&file, format!("{{\"client_email\":\"{}\"}}", name))
            .map_err(|e| Error::internal_io(e.to_string(), None))?;
        Ok(file)
    }

    fn configure_bucket_roles(&self, _project: &str, _service_account: &str, _bucket: &str, _roles: &[&str]) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBuckets {
    pub created: RefCell<Vec<String>>,
    pub ensured: RefCell<Vec<String>>,
}

impl BucketProvider for FakeBuckets {
    fn create_new_bucket_for_cluster(&self, cluster_name: &str, kind: &str) -> Result<String> {
        let url = format!("gs://{}-{}", cluster_name, kind);
        self.created.borrow_mut().push(url.clone());
        Ok(url)
    }

    fn ensure_bucket_is_created(&self, url: &str) -> Result<()> {
        self.ensured.borrow_mut().push(url.to_string());
        Ok(())
    }
}
