// Requirements and generation
pub mod apps;
pub mod defaults;
pub mod deploy_config;
pub mod helmfile;
pub mod naming;
pub mod requirements;
pub mod versionstream;

// Verification commands
pub mod environments;
pub mod preinstall;

// Clients for external tools and services
pub mod buckets;
pub mod cloud;
pub mod gcloud;
pub mod gits;
pub mod helm;
pub mod kube;
pub mod packages;
pub mod prompt;

pub mod envctx;
pub mod error;
pub mod paths;

#[cfg(test)]
pub mod testing;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
