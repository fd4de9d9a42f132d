use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::apps::{load_app_config, App, AppConfig, Phase};
use crate::cloud;
use crate::defaults::Defaults;
use crate::envctx::{ChartDetails, EnvironmentContext};
use crate::error::Result;
use crate::helm::{self, Helm};
use crate::kube::KubeClient;
use crate::requirements::{save_requirements_values_file, REQUIREMENTS_VALUES_FILE_NAME};
use crate::utils::{io, yaml};
use crate::versionstream::{RepositoryPrefixes, VersionKind};

use super::{HelmSpec, HelmState, ReleaseSpec, RepositorySpec};

pub const HELMFILE_FILE_NAME: &str = "helmfile.yaml";
const GENERATED_DIR: &str = "generated";
const EMPTY_RELEASE_NAME: &str = "empty";

/// Values of the namespace creation chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedValues {
    pub namespaces: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Directory holding `jx-apps.yml` and per-app values directories.
    pub dir: PathBuf,
    /// Where the phase helmfiles are written, `dir` when unset.
    pub output_dir: Option<PathBuf>,
    /// Extra values files added to every release.
    pub value_files: Vec<String>,
    /// Secrets values file, usually `$JX_SECRETS_YAML`.
    pub secrets_yaml: Option<String>,
    pub ignore_namespace_check: bool,
    pub defaults: Defaults,
}

impl GenerateOptions {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.dir)
    }

    /// Values files for every release, in the order helmfile layers them.
    fn release_value_files(&self) -> Vec<String> {
        let mut files = self.value_files.clone();
        files.push(format!("../{}", REQUIREMENTS_VALUES_FILE_NAME));
        if let Some(secrets) = self.secrets_yaml.as_deref().filter(|s| !s.is_empty()) {
            files.push(secrets.to_string());
        }
        files
    }
}

/// The inputs to plan a single phase's helmfile.
pub struct PhaseInput<'a> {
    pub phase: Phase,
    pub apps: Vec<App>,
    /// Chart details keyed by app name.
    pub charts: &'a BTreeMap<String, ChartDetails>,
    pub app_config: &'a AppConfig,
    /// Helm repositories configured locally, name to URL.
    pub local_repos: &'a BTreeMap<String, String>,
    pub prefixes: &'a RepositoryPrefixes,
    pub current_namespace: &'a str,
    /// Namespaces that already exist in the cluster.
    pub existing_namespaces: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    pub phase: Phase,
    pub state: HelmState,
    /// Namespaces that get a `namespace-<ns>` creation release.
    pub generated_namespaces: Vec<String>,
}

fn is_url(repository: &str) -> bool {
    repository
        .split_once("://")
        .map(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
        .unwrap_or(false)
}

/// Add `repository` unless one with the same name is already listed.
pub fn add_repository_if_needed(repositories: &mut Vec<RepositorySpec>, repository: RepositorySpec) {
    if !repositories.iter().any(|r| r.name == repository.name) {
        repositories.push(repository);
    }
}

/// Values files found next to the helmfiles for `app`.
///
/// `dir/<phase>/<app>/<file>` is used relative to the phase being generated;
/// the system phase also picks up files from the apps phase. Charts named
/// `prefix/chart` are looked up by their local name too.
pub fn extra_app_values(dir: &Path, app_name: &str, file_name: &str, phase: Phase) -> Vec<String> {
    let mut phases = vec![phase];
    if phase == Phase::System {
        phases.push(Phase::Apps);
    }

    let mut names = vec![app_name];
    if let Some((_, local)) = app_name.split_once('/') {
        if !local.contains('/') {
            names.push(local);
        }
    }

    let mut answer = Vec::new();
    for candidate_phase in phases {
        for name in &names {
            let file = dir.join(candidate_phase.as_str()).join(name).join(file_name);
            if !io::file_exists(&file) {
                continue;
            }
            if candidate_phase == phase {
                answer.push(format!("{}/{}", name, file_name));
            } else {
                answer.push(format!("../{}/{}/{}", candidate_phase, name, file_name));
            }
        }
    }
    answer
}

/// Compute the helmfile of one phase without touching the cluster.
pub fn plan_phase(ctx: &EnvironmentContext, options: &GenerateOptions, input: PhaseInput<'_>) -> Result<PhasePlan> {
    let charts = &options.defaults.charts;

    // Chart repository URL (or local directory) to repository name.
    let mut repos: BTreeMap<String, String> = BTreeMap::new();
    let mut resolved: BTreeMap<String, ChartDetails> = BTreeMap::new();
    for app in &input.apps {
        let Some(details) = input.charts.get(&app.name) else {
            continue;
        };
        let mut details = details.clone();

        if !is_url(&details.repository) {
            repos.insert(details.repository.clone(), details.repository.clone());
        } else {
            if !repos.contains_key(&details.repository) {
                let name = helm::repo_name_for_url(input.local_repos, &details.repository)
                    .or_else(|| input.prefixes.prefix_for_url(&details.repository))
                    .map(str::to_string)
                    .filter(|p| !p.is_empty())
                    .or_else(|| Some(details.prefix.clone()).filter(|p| !p.is_empty()))
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                repos.insert(details.repository.clone(), name);
            }
            if !details.name.contains('/') {
                if let Some(prefix) = repos.get(&details.repository) {
                    details.name = format!("{}/{}", prefix, details.name);
                }
            }
        }
        resolved.insert(app.name.clone(), details);
    }

    let mut repositories: Vec<RepositorySpec> = Vec::new();
    for (url, name) in &repos {
        if is_url(url) && !repositories.iter().any(|r| &r.url == url) {
            repositories.push(RepositorySpec::new(name.clone(), url.clone()));
        }
    }
    for repository in &input.app_config.repositories {
        if !repositories.iter().any(|r| r.url == repository.url) {
            repositories.push(repository.clone());
        }
    }

    let default_namespace = [
        input.app_config.default_namespace.as_str(),
        ctx.requirements.cluster.namespace.as_str(),
        ctx.dev_namespace.as_str(),
    ]
    .into_iter()
    .find(|ns| !ns.is_empty())
    .unwrap_or_default()
    .to_string();

    let value_files = options.release_value_files();
    let mut releases = Vec::new();
    for app in &input.apps {
        let Some(details) = resolved.get(&app.name) else {
            continue;
        };

        let version = if app.version.is_empty() {
            ctx.version_resolver
                .stable_version_number(VersionKind::Chart, &details.name)
                .map_err(|e| e.with_context(format!("failed to resolve version of chart {}", details.name)))?
        } else {
            app.version.clone()
        };
        let namespace = if app.namespace.is_empty() {
            default_namespace.clone()
        } else {
            app.namespace.clone()
        };

        let mut values = app.values.clone();
        values.extend(value_files.iter().cloned());
        values.extend(extra_app_values(&options.dir, &app.name, "values.yaml", input.phase));
        values.extend(extra_app_values(&options.dir, &app.name, "values.yaml.gotmpl", input.phase));

        let name = if app.alias.is_empty() {
            details.local_name.clone()
        } else {
            app.alias.clone()
        };

        releases.push(ReleaseSpec {
            name,
            namespace,
            chart: details.name.clone(),
            version,
            values,
            needs: Vec::new(),
            hooks: app.hooks.clone(),
            wait: app.wait,
            timeout: app.timeout,
            recreate_pods: app.recreate_pods,
            force: app.force,
            installed: app.installed,
            atomic: app.atomic,
            cleanup_on_fail: app.cleanup_on_fail,
            dependencies: app.dependencies.clone(),
            json_patches: app.json_patches.clone(),
            strategic_merge_patches: app.strategic_merge_patches.clone(),
            adopt: app.adopt.clone(),
        });
    }

    // helmfile sync fails on a helmfile without releases
    if releases.is_empty() {
        releases.push(ReleaseSpec {
            name: EMPTY_RELEASE_NAME.to_string(),
            chart: charts.empty_chart.clone(),
            namespace: default_namespace.clone(),
            ..Default::default()
        });
        add_repository_if_needed(
            &mut repositories,
            RepositorySpec::new(charts.chart_museum_repo_name.clone(), charts.chart_museum_url.clone()),
        );
    }

    let generated_namespaces = add_namespace_releases(&mut repositories, &mut releases, &input, options);

    repositories.sort_by(|a, b| a.name.cmp(&b.name));

    let timeout = if ctx.requirements.cluster.provider == cloud::KIND {
        options.defaults.helmfile.kind_timeout
    } else {
        options.defaults.helmfile.timeout
    };
    let state = HelmState {
        bases: options.defaults.helmfile.bases.clone(),
        helm_defaults: HelmSpec {
            atomic: true,
            verify: false,
            wait: true,
            timeout,
            force: false,
        },
        repositories,
        releases,
    };

    Ok(PhasePlan {
        phase: input.phase,
        state,
        generated_namespaces,
    })
}

/// Releases installing into a namespace that does not exist yet get a
/// `namespace-<ns>` release creating it, installed first.
fn add_namespace_releases(
    repositories: &mut Vec<RepositorySpec>,
    releases: &mut Vec<ReleaseSpec>,
    input: &PhaseInput<'_>,
    options: &GenerateOptions,
) -> Vec<String> {
    let charts = &options.defaults.charts;
    let current = input.current_namespace;
    let mut shims: Vec<ReleaseSpec> = Vec::new();
    let mut generated = Vec::new();

    for i in 0..releases.len() {
        let namespace = releases[i].namespace.clone();
        let exists = !options.ignore_namespace_check && input.existing_namespaces.iter().any(|ns| *ns == namespace);
        if namespace.is_empty() || namespace == current || exists {
            continue;
        }

        let shim_name = format!("namespace-{}", namespace);
        let already_created = shims.iter().chain(releases.iter()).any(|r| r.name == shim_name);
        releases[i].needs = vec![format!("{}/{}", current, shim_name)];
        if already_created {
            continue;
        }

        add_repository_if_needed(
            repositories,
            RepositorySpec::new(charts.namespace_repo_name.clone(), charts.namespace_repo_url.clone()),
        );
        shims.push(ReleaseSpec {
            name: shim_name,
            namespace: current.to_string(),
            chart: charts.namespace_chart.clone(),
            values: vec![format!("{}/{}/values.yaml", GENERATED_DIR, namespace)],
            ..Default::default()
        });
        generated.push(namespace);
    }

    if !shims.is_empty() {
        shims.append(releases);
        *releases = shims;
    }
    generated
}

/// Write `<output>/<phase>/helmfile.yaml` and the generated namespace
/// values, replacing whatever a previous run generated.
pub fn write_phase(output_dir: &Path, plan: &PhasePlan) -> Result<PathBuf> {
    let phase_dir = output_dir.join(plan.phase.as_str());
    let generated_dir = phase_dir.join(GENERATED_DIR);
    io::remove_dir_all(&generated_dir, "delete generated values")?;

    for namespace in &plan.generated_namespaces {
        let values = GeneratedValues {
            namespaces: vec![namespace.clone()],
        };
        yaml::write_file(&generated_dir.join(namespace).join("values.yaml"), &values)?;
    }

    let file = phase_dir.join(HELMFILE_FILE_NAME);
    yaml::write_file(&file, &plan.state)?;
    crate::log_status!("helmfile", "Wrote {}", file.display());
    Ok(file)
}

/// Apply the version stream defaults and split the apps by phase.
fn resolve_apps(
    ctx: &EnvironmentContext,
    app_config: &AppConfig,
) -> Result<(BTreeMap<String, ChartDetails>, Vec<App>, Vec<App>)> {
    let mut charts = BTreeMap::new();
    let mut apps_phase = Vec::new();
    let mut system_phase = Vec::new();

    for app in &app_config.apps {
        let details = ctx.chart_details(&app.name, &app.repository).map_err(|e| {
            e.with_context(format!(
                "failed to resolve chart details for {} repository {}",
                app.name, app.repository
            ))
        })?;

        let (defaults, values_files) = ctx.application_defaults(&details.name)?;
        let mut app = app.clone();
        app.hooks.extend(defaults.hooks);
        app.values.extend(values_files);
        if app.namespace.is_empty() {
            app.namespace = defaults.namespace;
        }
        if app.phase.is_none() {
            app.phase = Phase::parse(&defaults.phase)?;
        }
        charts.insert(app.name.clone(), details);

        match app.phase.unwrap_or(Phase::Apps) {
            Phase::Apps => apps_phase.push(app),
            Phase::System => system_phase.push(app),
        }
    }
    Ok((charts, apps_phase, system_phase))
}

/// Generate the helmfile of every phase from `jx-apps.yml`.
pub fn generate(
    options: &GenerateOptions,
    ctx: &EnvironmentContext,
    kube: &dyn KubeClient,
    helm: &dyn Helm,
) -> Result<Vec<PathBuf>> {
    let output_dir = options.output_dir();
    let (app_config, _) = load_app_config(&options.dir).map_err(|e| e.with_context("failed to load applications"))?;

    if !io::file_exists(&output_dir.join(REQUIREMENTS_VALUES_FILE_NAME)) {
        save_requirements_values_file(&ctx.requirements, output_dir)
            .map_err(|e| e.with_context("failed to save requirements yaml file"))?;
    }

    let prefixes = ctx.version_resolver.repository_prefixes()?;
    let local_repos = helm.list_repos().map_err(|e| e.with_context("failed listing helm repos"))?;
    let (charts, apps_phase, system_phase) = resolve_apps(ctx, &app_config)?;

    let current_namespace = kube.current_namespace()?;
    let existing_namespaces = if options.ignore_namespace_check {
        Vec::new()
    } else {
        kube.list_namespaces().map_err(|e| e.with_context("failed to list namespaces"))?
    };

    let mut files = Vec::new();
    for (phase, apps) in [(Phase::Apps, apps_phase), (Phase::System, system_phase)] {
        let input = PhaseInput {
            phase,
            apps,
            charts: &charts,
            app_config: &app_config,
            local_repos: &local_repos,
            prefixes: &prefixes,
            current_namespace: &current_namespace,
            existing_namespaces: &existing_namespaces,
        };
        let plan = plan_phase(ctx, options, input)
            .map_err(|e| e.with_context(format!("failed to generate {} helmfile", phase)))?;
        files.push(write_phase(output_dir, &plan)?);
    }
    Ok(files)
}
