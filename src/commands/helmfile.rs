use clap::Args;
use serde::Serialize;

use jx::defaults;
use jx::envctx::EnvironmentContext;
use jx::environments::dev_namespace;
use jx::gits::GitCli;
use jx::helm::HelmCli;
use jx::helmfile::{self, GenerateOptions};
use jx::kube::Kubectl;

use super::{resolve_dir, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct HelmfileArgs {
    /// Directory to look for a jx-apps.yml file in
    #[arg(long, alias = "Dir", default_value = ".")]
    pub dir: String,

    /// Directory to write the helmfiles to, defaults to --dir
    #[arg(long, alias = "outputDir")]
    pub output_dir: Option<String>,

    /// Values file or URL added to every release (repeatable)
    #[arg(long = "values", value_name = "FILE")]
    pub value_files: Vec<String>,

    /// Do not add namespace releases for namespaces missing from the cluster
    #[arg(long)]
    pub ignore_namespace_check: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmfileOutput {
    pub command: String,
    pub dir: String,
    pub output_dir: String,
    pub helmfiles: Vec<String>,
}

pub fn run(args: HelmfileArgs, _global: &GlobalArgs) -> CmdResult<HelmfileOutput> {
    let dir = resolve_dir(&args.dir)?;
    let output_dir = args.output_dir.as_deref().map(resolve_dir).transpose()?;

    let kube = Kubectl::new();
    let helm = HelmCli::new();
    let git = GitCli::new();

    let namespace = dev_namespace(&kube)?;
    let ctx = EnvironmentContext::load(&dir, &git, &namespace)
        .map_err(|e| e.with_context("failed to create environment context"))?;

    let options = GenerateOptions {
        dir: dir.clone(),
        output_dir,
        value_files: args.value_files,
        secrets_yaml: std::env::var("JX_SECRETS_YAML").ok(),
        ignore_namespace_check: args.ignore_namespace_check,
        defaults: defaults::load(),
    };
    let files = helmfile::generate(&options, &ctx, &kube, &helm)?;

    Ok((
        HelmfileOutput {
            command: "create.helmfile".to_string(),
            dir: dir.display().to_string(),
            output_dir: options.output_dir().display().to_string(),
            helmfiles: files.iter().map(|f| f.display().to_string()).collect(),
        },
        0,
    ))
}
