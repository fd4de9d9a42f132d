use clap::Args;

use jx::defaults;
use jx::environments::{self, EnvClients, EnvironmentsEnv, EnvironmentsOptions, EnvironmentsReport};
use jx::gits::{load_auth_config, GitCli};
use jx::kube::Kubectl;
use jx::paths;
use jx::requirements;

use super::{resolve_dir, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct EnvironmentsArgs {
    /// Directory to look for the jx-requirements.yml file in, defaults to the working directory
    #[arg(short, long, default_value = "")]
    pub dir: String,
}

pub fn run(args: EnvironmentsArgs, _global: &GlobalArgs) -> CmdResult<EnvironmentsReport> {
    let dir = resolve_dir(&args.dir)?;
    let options = EnvironmentsOptions {
        dir: dir.clone(),
        versions_dir: paths::versions_dir()?,
        defaults: defaults::load(),
    };

    let mut auth = load_auth_config(&paths::git_auth_yaml()?)?;
    let git_server = requirements::load_requirements_config(&dir, false)
        .map(|(requirements, _)| requirements.cluster.git_server)
        .unwrap_or_default();
    auth.apply_environment(&git_server, |name| std::env::var(name).ok());

    let kube = Kubectl::new();
    let git = GitCli::new();
    let clients = EnvClients {
        kube: &kube,
        gitter: &git,
        auth: &auth,
        provider: None,
    };

    let report = environments::run(&options, &clients, &EnvironmentsEnv::from_process())?;
    Ok((report, 0))
}
