use clap::Args;
use std::path::PathBuf;

use jx::defaults;
use jx::gcloud::GCloudCli;
use jx::gits::GitCli;
use jx::helm::HelmCli;
use jx::kube::Kubectl;
use jx::packages::PathProbe;
use jx::paths;
use jx::preinstall::{self, Clients, PreinstallEnv, PreinstallOptions, PreinstallReport};
use jx::prompt::TerminalPrompter;

use super::{enable_debug, resolve_dir, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct PreinstallArgs {
    /// Directory to look for the jx-requirements.yml file in
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// true/false to lazily create missing resources; decided from the requirements when unset
    #[arg(long = "lazy-create", default_value = "")]
    pub lazy_create: String,

    /// Namespace Jenkins X is booted into, defaults to $DEPLOY_NAMESPACE
    #[arg(long, default_value = "")]
    pub namespace: String,

    /// Directory of kubernetes provider specific files
    #[arg(long)]
    pub provider_values_dir: Option<String>,

    /// Using GKE Workload Identity, so do not reconnect to the cluster
    #[arg(long)]
    pub workload_identity: bool,

    /// Skip checking the versions of installed packages
    #[arg(long)]
    pub disable_verify_packages: bool,

    /// Skip checking the helm client and repositories
    #[arg(long)]
    pub disable_verify_helm: bool,

    /// Generate default secrets when $JX_SECRETS_YAML is not set
    #[arg(long)]
    pub default_helmfile_secrets: bool,

    /// Skip validating the secrets YAML file
    #[arg(long)]
    pub no_secret_yaml_validate: bool,

    /// Output debug logs
    #[arg(long)]
    pub debug: bool,
}

pub fn run(args: PreinstallArgs, global: &GlobalArgs) -> CmdResult<PreinstallReport> {
    enable_debug(args.debug);

    let options = PreinstallOptions {
        dir: resolve_dir(&args.dir)?,
        lazy_create_flag: args.lazy_create,
        namespace: args.namespace,
        provider_values_dir: args
            .provider_values_dir
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned())),
        workload_identity: args.workload_identity,
        disable_verify_packages: args.disable_verify_packages,
        disable_verify_helm: args.disable_verify_helm,
        default_helmfile_secrets: args.default_helmfile_secrets,
        no_secret_yaml_validate: args.no_secret_yaml_validate,
        in_cluster: std::env::var("KUBERNETES_SERVICE_HOST").is_ok_and(|v| !v.is_empty()),
        versions_dir: paths::versions_dir()?,
        defaults: defaults::load(),
    };

    let kube = Kubectl::new();
    let helm = HelmCli::new();
    let git = GitCli::new();
    let gcloud = GCloudCli::new();
    let prompter = TerminalPrompter::new(global.batch_mode);
    let packages = PathProbe::new();
    let clients = Clients {
        kube: &kube,
        helm: &helm,
        gitter: &git,
        gcloud: &gcloud,
        prompter: &prompter,
        packages: &packages,
        buckets: None,
    };

    let report = preinstall::run(&options, &clients, &PreinstallEnv::from_process())?;
    Ok((report, 0))
}
