use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cloud;
use crate::error::{Error, Result};
use crate::gits;
use crate::requirements::{ClusterConfig, RequirementsConfig};
use crate::utils::yaml;
use crate::versionstream::{self, VersionKind, VersionResolver};

use super::{Clients, PreinstallEnv, PreinstallOptions};

const GKE_REGISTRY: &str = "gcr.io";

/// Approvers and reviewers of the development environment repository.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Owners {
    pub approvers: Vec<String>,
    pub reviewers: Vec<String>,
}

fn batch_mode_missing(field: &str) -> Error {
    Error::validation_missing_argument(
        format!("cluster.{}", field),
        format!("please specify '{}' in jx-requirements when running  in  batch mode", field),
    )
}

/// Batch mode cannot ask, so the fields questions would fill must be set.
pub fn check_batch_requirements(requirements: &RequirementsConfig) -> Result<()> {
    let cluster = &requirements.cluster;
    if cluster.provider.is_empty() {
        return Err(batch_mode_missing("provider"));
    }
    if (cluster.provider == cloud::EKS || cluster.provider == cloud::AWS) && cluster.region.is_empty() {
        return Err(batch_mode_missing("region"));
    }
    if cluster.provider == cloud::GKE {
        if cluster.project_id.is_empty() {
            return Err(batch_mode_missing("project"));
        }
        if cluster.zone.is_empty() {
            return Err(batch_mode_missing("zone"));
        }
    }
    if cluster.environment_git_owner.is_empty() {
        return Err(batch_mode_missing("environmentGitOwner"));
    }
    if cluster.cluster_name.is_empty() {
        return Err(batch_mode_missing("clusterName"));
    }
    Ok(())
}

/// Fill in whatever cluster, git and version stream details are missing,
/// then save the requirements and the `OWNERS` file.
pub fn gather_requirements(
    requirements: &mut RequirementsConfig,
    file: &Path,
    options: &PreinstallOptions,
    clients: &Clients<'_>,
    env: &PreinstallEnv,
) -> Result<()> {
    let prompter = clients.prompter;
    if prompter.is_batch() {
        check_batch_requirements(requirements)?;
    }

    if requirements.cluster.provider.is_empty() {
        requirements.cluster.provider = prompter
            .pick_name("Select Kubernetes provider", cloud::KUBERNETES_PROVIDERS, "")
            .map_err(|e| e.with_context("selecting Kubernetes provider"))?;
    }

    let provider = requirements.cluster.provider.clone();
    if provider != cloud::GKE && provider != cloud::EKS {
        crate::log_status!(
            "preinstall",
            "jx boot has only been validated on GKE and EKS, we'd love feedback and contributions for other Kubernetes providers"
        );
        if !prompter.is_batch() && !prompter.confirm("Continue execution anyway?", true)? {
            return Err(Error::prompt_aborted("finishing execution"));
        }
    }

    if provider == cloud::GKE {
        gather_gke(&mut requirements.cluster, options, clients)?;
    } else if provider == cloud::EKS || provider == cloud::AWS {
        gather_eks(&mut requirements.cluster, clients)?;
    }

    if requirements.cluster.cluster_name.is_empty() && !prompter.is_batch() {
        requirements.cluster.cluster_name = prompter
            .pick_value("Cluster name", "", true)
            .map_err(|e| e.with_context("getting cluster name"))?;
        if requirements.cluster.cluster_name.is_empty() {
            return Err(Error::validation_missing_argument("clusterName", "no cluster name provided"));
        }
    }

    normalize_cluster(&mut requirements.cluster);

    gather_git_requirements(requirements, clients)
        .map_err(|e| e.with_context("error gathering git requirements"))?;

    lock_version_stream(requirements, options, clients, env)?;

    requirements
        .save_config(file)
        .map_err(|e| e.with_context("error saving requirements file"))?;
    write_owners_file(&options.dir, requirements)
        .map_err(|e| e.with_context(format!("writing approvers to OWNERS file in {}", options.dir.display())))?;
    Ok(())
}

fn gather_gke(cluster: &mut ClusterConfig, options: &PreinstallOptions, clients: &Clients<'_>) -> Result<()> {
    let prompter = clients.prompter;
    let (mut current_project, mut current_zone, mut current_cluster) = (String::new(), String::new(), String::new());
    let mut auto_accept = false;

    if cluster.project_id.is_empty() || cluster.zone.is_empty() || cluster.cluster_name.is_empty() {
        let context = clients
            .kube
            .current_context()
            .map_err(|e| e.with_context("loading kubeconfig"))?;
        if let Some((project, zone, name)) = cloud::parse_gke_context(&context) {
            current_project = project;
            current_zone = zone;
            current_cluster = name;
        }
        if !current_cluster.is_empty() && !current_project.is_empty() && !current_zone.is_empty() {
            crate::log_status!(
                "preinstall",
                "Currently connected cluster is {} in {} in project {}",
                current_cluster,
                current_zone,
                current_project
            );
            auto_accept = prompter.confirm(&format!("Do you want to jx boot the {} cluster?", current_cluster), true)?;
        } else {
            crate::log_status!("preinstall", "Enter the cluster you want to jx boot");
        }
    }

    if cluster.project_id.is_empty() {
        cluster.project_id = if auto_accept && !current_project.is_empty() {
            current_project.clone()
        } else {
            pick_google_project(clients, &current_project).map_err(|e| e.with_context("getting project ID"))?
        };
    }
    if cluster.zone.is_empty() {
        cluster.zone = if auto_accept && !current_zone.is_empty() {
            current_zone.clone()
        } else {
            pick_google_zone(clients, &cluster.project_id, &current_zone)
                .map_err(|e| e.with_context("getting GKE Zone"))?
        };
    }
    if cluster.cluster_name.is_empty() {
        if auto_accept && !current_cluster.is_empty() {
            cluster.cluster_name = current_cluster.clone();
        } else {
            cluster.cluster_name = prompter
                .pick_value("Cluster name", &current_cluster, true)
                .map_err(|e| e.with_context("getting cluster name"))?;
            if cluster.cluster_name.is_empty() {
                return Err(Error::validation_missing_argument("clusterName", "no cluster name provided"));
            }
        }
    }
    if cluster.registry.is_empty() {
        cluster.registry = GKE_REGISTRY.to_string();
    }

    if !auto_accept {
        if !options.workload_identity && !options.in_cluster {
            crate::log_status!("preinstall", "Connecting to cluster {}", cluster.cluster_name);
            clients
                .gcloud
                .connect_to_cluster(&cluster.project_id, &cluster.zone, &cluster.cluster_name)?;
        } else {
            crate::log_status!("preinstall", "no need to reconnect to cluster");
        }
    }
    Ok(())
}

fn pick_google_project(clients: &Clients<'_>, current: &str) -> Result<String> {
    let projects = clients.gcloud.list_projects()?;
    if projects.len() == 1 {
        return Ok(projects[0].clone());
    }
    if projects.is_empty() {
        return clients.prompter.pick_value("Google Cloud Project", current, true);
    }
    let options: Vec<&str> = projects.iter().map(String::as_str).collect();
    clients.prompter.pick_name("Google Cloud Project", &options, current)
}

fn pick_google_zone(clients: &Clients<'_>, project: &str, current: &str) -> Result<String> {
    let zones = clients.gcloud.list_zones(project)?;
    if zones.is_empty() {
        return clients.prompter.pick_value("Google Cloud Zone", current, true);
    }
    let options: Vec<&str> = zones.iter().map(String::as_str).collect();
    clients.prompter.pick_name("Google Cloud Zone", &options, current)
}

fn gather_eks(cluster: &mut ClusterConfig, clients: &Clients<'_>) -> Result<()> {
    let prompter = clients.prompter;
    let (mut current_cluster, mut current_region) = (String::new(), String::new());
    let mut auto_accept = false;

    if cluster.region.is_empty() || cluster.cluster_name.is_empty() {
        let context = clients.kube.current_context().map_err(|e| {
            e.with_context("there was a problem obtaining the current cluster name and region")
        })?;
        if let Some((name, region)) = cloud::parse_eks_context(&context) {
            current_cluster = name;
            current_region = region;
        }
        if !current_cluster.is_empty() && !current_region.is_empty() {
            crate::log_status!(
                "preinstall",
                "Currently connected cluster is {} in region {}",
                current_cluster,
                current_region
            );
            auto_accept = prompter.confirm(&format!("Do you want to jx boot the {} cluster?", current_cluster), true)?;
        } else {
            crate::log_status!("preinstall", "Enter the cluster you want to jx boot");
        }
    }

    if cluster.region.is_empty() && auto_accept && !current_region.is_empty() {
        cluster.region = current_region;
    }
    if cluster.cluster_name.is_empty() {
        cluster.cluster_name = if auto_accept && !current_cluster.is_empty() {
            current_cluster
        } else {
            prompter
                .pick_value("Cluster name", &current_cluster, true)
                .map_err(|e| e.with_context("getting cluster name"))?
        };
    }
    Ok(())
}

/// Trim the cluster identifiers and lowercase all but the project.
pub fn normalize_cluster(cluster: &mut ClusterConfig) {
    cluster.provider = cluster.provider.trim().to_lowercase();
    cluster.project_id = cluster.project_id.trim().to_string();
    cluster.zone = cluster.zone.trim().to_lowercase();
    cluster.region = cluster.region.trim().to_lowercase();
    cluster.cluster_name = cluster.cluster_name.trim().to_lowercase();
}

/// Fix the git kind of public servers and ask for the environment owner and
/// the development environment approvers.
pub fn gather_git_requirements(requirements: &mut RequirementsConfig, clients: &Clients<'_>) -> Result<()> {
    let prompter = clients.prompter;
    let cluster = &mut requirements.cluster;
    cluster.environment_git_owner = cluster.environment_git_owner.trim().to_string();

    if let Some(kind) = gits::kind_from_server(&cluster.git_server) {
        cluster.git_kind = kind.to_string();
    }

    if cluster.environment_git_owner.is_empty() {
        cluster.environment_git_owner = prompter
            .pick_value("Git Owner name for environment repositories", "", true)
            .map_err(|e| e.with_context("error configuring git owner for env repositories"))?;

        let (visibility, other, value) = if cluster.environment_git_public {
            ("public", "private", "false")
        } else {
            ("private", "public", "true")
        };
        crate::log_status!(
            "preinstall",
            "Environment repos will be {}, if you want to create {} environment repos, please set environmentGitPublic to {} in jx-requirements.yml",
            visibility,
            other,
            value
        );
    }

    if cluster.dev_env_approvers.is_empty() && !prompter.is_batch() {
        let approvers = prompter
            .pick_value(
                "Comma-separated git provider usernames of approvers for development environment repository",
                "",
                true,
            )
            .map_err(|e| e.with_context("configuring approvers for development environment repository"))?;
        cluster.dev_env_approvers = approvers
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
    }
    Ok(())
}

/// Default the version stream from the environment, lock its ref to a tag
/// and pin the build pack to the version the stream recommends.
fn lock_version_stream(
    requirements: &mut RequirementsConfig,
    options: &PreinstallOptions,
    clients: &Clients<'_>,
    env: &PreinstallEnv,
) -> Result<()> {
    let stream = &mut requirements.version_stream;
    if stream.reference.is_empty() {
        stream.reference = env.versions_repo_ref.clone().unwrap_or_default();
    }
    if stream.url.is_empty() {
        stream.url = env.versions_repo_url.clone().unwrap_or_default();
    }

    let url = if stream.url.is_empty() {
        options.defaults.version_stream.url.clone()
    } else {
        stream.url.clone()
    };
    let reference = if stream.reference.is_empty() {
        options.defaults.version_stream.reference.clone()
    } else {
        stream.reference.clone()
    };
    let locked = versionstream::clone_versions_repo(clients.gitter, &url, &reference, &options.versions_dir)
        .map_err(|e| e.with_context("resolving version stream ref"))?;
    if !locked.is_empty() && locked != stream.reference {
        crate::log_status!(
            "preinstall",
            "Locking version stream {} to release {}. Jenkins X will use this release rather than {} to resolve all versions from now on.",
            url,
            locked,
            stream.reference
        );
        stream.reference = locked;
    }

    if requirements.build_pack_url.is_empty() {
        requirements.build_pack_url = options.defaults.version_stream.build_pack_url.clone();
    }
    if requirements.build_pack_ref.is_empty() || requirements.build_pack_ref == "master" {
        let resolver = VersionResolver::new(&options.versions_dir);
        let version = resolver
            .stable_version_number(VersionKind::Git, &requirements.build_pack_url)
            .map_err(|e| {
                e.with_context(format!(
                    "failed to resolve git version of {} in the version stream at dir {}",
                    requirements.build_pack_url,
                    options.versions_dir.display()
                ))
            })?;
        if version.is_empty() {
            crate::log_warn!(
                "preinstall",
                "the version stream at {} does not have a stable git version for {}",
                options.versions_dir.display(),
                requirements.build_pack_url
            );
        } else {
            crate::log_status!("preinstall", "setting the build pack {} to version {}", requirements.build_pack_url, version);
            requirements.build_pack_ref = version;
        }
    }
    Ok(())
}

/// Write `OWNERS` into `dir` when approvers are configured.
pub fn write_owners_file(dir: &Path, requirements: &RequirementsConfig) -> Result<Option<PathBuf>> {
    let approvers = &requirements.cluster.dev_env_approvers;
    if approvers.is_empty() {
        return Ok(None);
    }
    let owners = Owners {
        approvers: approvers.clone(),
        reviewers: approvers.clone(),
    };
    let file = dir.join("OWNERS");
    yaml::write_file(&file, &owners)?;
    crate::log_status!(
        "preinstall",
        "Wrote approvers {} to {}",
        approvers.join(", "),
        file.display()
    );
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::Defaults;
    use crate::testing::{FakeGCloud, FakeGit, FakeHelm, FakeKube, ScriptedPrompter};
    use semver::Version;
    use std::collections::BTreeMap;
    use std::fs;

    struct Harness {
        kube: FakeKube,
        helm: FakeHelm,
        git: FakeGit,
        gcloud: FakeGCloud,
        packages: crate::packages::PathProbe,
    }

    impl Harness {
        fn new(context: &str) -> Self {
            let mut kube = FakeKube::new("jx");
            kube.context = context.to_string();
            Self {
                kube,
                helm: FakeHelm::new(Version::new(3, 2, 4)),
                git: FakeGit {
                    tags: vec!["v1.0.10".to_string()],
                    seeds: BTreeMap::from([(
                        Defaults::default().version_stream.url,
                        vec![(
                            "git/github.com/jenkins-x-buildpacks/jenkins-x-kubernetes.yml".to_string(),
                            "version: 1.0.40\n".to_string(),
                        )],
                    )]),
                    ..Default::default()
                },
                gcloud: FakeGCloud {
                    projects: vec!["alpha".to_string(), "beta".to_string()],
                    zones: vec!["europe-west1-b".to_string()],
                    ..Default::default()
                },
                packages: crate::packages::PathProbe::new(),
            }
        }

        fn clients<'a>(&'a self, prompter: &'a ScriptedPrompter) -> Clients<'a> {
            Clients {
                kube: &self.kube,
                helm: &self.helm,
                gitter: &self.git,
                gcloud: &self.gcloud,
                prompter,
                packages: &self.packages,
                buckets: None,
            }
        }
    }

    fn options(dir: &Path) -> PreinstallOptions {
        PreinstallOptions {
            dir: dir.to_path_buf(),
            versions_dir: dir.join("versions"),
            defaults: Defaults::default(),
            ..Default::default()
        }
    }

    #[test]
    fn batch_mode_names_the_first_missing_field() {
        let mut requirements = RequirementsConfig::new();
        let err = check_batch_requirements(&requirements).unwrap_err();
        assert_eq!(
            err.message,
            "please specify 'provider' in jx-requirements when running  in  batch mode"
        );

        requirements.cluster.provider = cloud::GKE.to_string();
        requirements.cluster.project_id = "p".to_string();
        let err = check_batch_requirements(&requirements).unwrap_err();
        assert!(err.message.starts_with("please specify 'zone'"));

        requirements.cluster.zone = "z".to_string();
        requirements.cluster.environment_git_owner = "acme".to_string();
        let err = check_batch_requirements(&requirements).unwrap_err();
        assert!(err.message.starts_with("please specify 'clusterName'"));

        requirements.cluster.cluster_name = "dev".to_string();
        assert!(check_batch_requirements(&requirements).is_ok());

        let mut eks = RequirementsConfig::new();
        eks.cluster.provider = cloud::EKS.to_string();
        assert!(check_batch_requirements(&eks)
            .unwrap_err()
            .message
            .starts_with("please specify 'region'"));
    }

    #[test]
    fn gke_details_come_from_the_current_context() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("jx-requirements.yml");
        let harness = Harness::new("gke_my-project_europe-west1-b_Dev");
        let prompter = ScriptedPrompter::answering(&["acme", "alice, bob"], &[true]);
        let mut requirements = RequirementsConfig::new();
        requirements.cluster.provider = cloud::GKE.to_string();

        let opts = options(dir.path());
        gather_requirements(&mut requirements, &file, &opts, &harness.clients(&prompter), &PreinstallEnv::default())
            .unwrap();

        let cluster = &requirements.cluster;
        assert_eq!(cluster.project_id, "my-project");
        assert_eq!(cluster.zone, "europe-west1-b");
        assert_eq!(cluster.cluster_name, "dev");
        assert_eq!(cluster.registry, "gcr.io");
        assert_eq!(cluster.environment_git_owner, "acme");
        assert_eq!(cluster.dev_env_approvers, vec!["alice", "bob"]);
        assert!(harness.gcloud.connected.borrow().is_empty());

        assert_eq!(requirements.version_stream.reference, "v1.0.10");
        assert_eq!(requirements.build_pack_ref, "1.0.40");
        assert!(file.exists());

        let owners = fs::read_to_string(dir.path().join("OWNERS")).unwrap();
        assert!(owners.contains("approvers:"));
        assert!(owners.contains("- alice"));
    }

    #[test]
    fn declined_context_prompts_and_connects() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("jx-requirements.yml");
        let harness = Harness::new("gke_my-project_europe-west1-b_dev");
        let prompter = ScriptedPrompter::answering(&["beta", "europe-west1-b", "other", "acme", "alice"], &[false]);
        let mut requirements = RequirementsConfig::new();
        requirements.cluster.provider = cloud::GKE.to_string();

        gather_requirements(
            &mut requirements,
            &file,
            &options(dir.path()),
            &harness.clients(&prompter),
            &PreinstallEnv::default(),
        )
        .unwrap();

        assert_eq!(requirements.cluster.project_id, "beta");
        assert_eq!(requirements.cluster.cluster_name, "other");
        assert_eq!(*harness.gcloud.connected.borrow(), vec!["beta/europe-west1-b/other"]);
    }

    #[test]
    fn unvalidated_provider_can_be_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::new("kind-kind");
        let prompter = ScriptedPrompter::answering(&[], &[false]);
        let mut requirements = RequirementsConfig::new();
        requirements.cluster.provider = cloud::KIND.to_string();

        let err = gather_requirements(
            &mut requirements,
            &dir.path().join("jx-requirements.yml"),
            &options(dir.path()),
            &harness.clients(&prompter),
            &PreinstallEnv::default(),
        )
        .unwrap_err();
        assert_eq!(err.message, "finishing execution");
    }

    #[test]
    fn public_servers_fix_git_kind() {
        let harness = Harness::new("kind-kind");
        let prompter = ScriptedPrompter::batch();
        let mut requirements = RequirementsConfig::new();
        requirements.cluster.environment_git_owner = " acme ".to_string();
        requirements.cluster.git_server = "https://gitlab.com".to_string();
        requirements.cluster.git_kind = "github".to_string();

        gather_git_requirements(&mut requirements, &harness.clients(&prompter)).unwrap();
        assert_eq!(requirements.cluster.git_kind, "gitlab");
        assert_eq!(requirements.cluster.environment_git_owner, "acme");
        assert!(requirements.cluster.dev_env_approvers.is_empty());
    }

    #[test]
    fn cluster_fields_are_normalized() {
        let mut cluster = ClusterConfig {
            provider: " GKE ".to_string(),
            project_id: " My-Project ".to_string(),
            zone: "Europe-West1-B".to_string(),
            cluster_name: " Dev ".to_string(),
            ..Default::default()
        };
        normalize_cluster(&mut cluster);
        assert_eq!(cluster.provider, "gke");
        assert_eq!(cluster.project_id, "My-Project");
        assert_eq!(cluster.zone, "europe-west1-b");
        assert_eq!(cluster.cluster_name, "dev");
    }
}
