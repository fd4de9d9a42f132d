//! Google Cloud through the `gcloud` and `gsutil` CLIs.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::command;

/// Roles granted to the Velero backup service account.
pub const VELERO_SERVICE_ACCOUNT_ROLES: &[&str] = &[
    "roles/compute.storageAdmin",
    "roles/storage.admin",
    "roles/storage.objectAdmin",
];

pub trait GCloud {
    fn list_projects(&self) -> Result<Vec<String>>;
    fn list_zones(&self, project: &str) -> Result<Vec<String>>;
    /// Fetch credentials for the cluster and make it the current context.
    fn connect_to_cluster(&self, project: &str, zone: &str, cluster: &str) -> Result<()>;
    /// Make sure the service account exists with `roles`, and write a new
    /// key for it into `dir`. Returns the key file.
    fn get_or_create_service_account(&self, name: &str, project: &str, dir: &Path, roles: &[&str]) -> Result<PathBuf>;
    /// Grant the service account `roles` on `bucket`.
    fn configure_bucket_roles(&self, project: &str, service_account: &str, bucket: &str, roles: &[&str]) -> Result<()>;
}

pub fn service_account_email(name: &str, project: &str) -> String {
    format!("{}@{}.iam.gserviceaccount.com", name, project)
}

#[derive(Debug, Default)]
pub struct GCloudCli;

impl GCloudCli {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = command::capture(program, args, None)?;
        if !output.success {
            return Err(Error::cloud_command_failed(format!(
                "{} {} failed: {}",
                program,
                args.join(" "),
                output.error_text()
            )));
        }
        Ok(output.stdout)
    }

    fn lines(&self, args: &[&str]) -> Result<Vec<String>> {
        let out = self.run("gcloud", args)?;
        let mut values: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        values.sort();
        Ok(values)
    }
}

impl GCloud for GCloudCli {
    fn list_projects(&self) -> Result<Vec<String>> {
        self.lines(&["projects", "list", "--format=value(projectId)"])
    }

    fn list_zones(&self, project: &str) -> Result<Vec<String>> {
        self.lines(&["compute", "zones", "list", "--project", project, "--format=value(name)"])
    }

    fn connect_to_cluster(&self, project: &str, zone: &str, cluster: &str) -> Result<()> {
        self.run(
            "gcloud",
            &["container", "clusters", "get-credentials", cluster, "--zone", zone, "--project", project],
        )?;
        Ok(())
    }

    fn get_or_create_service_account(&self, name: &str, project: &str, dir: &Path, roles: &[&str]) -> Result<PathBuf> {
        let email = service_account_email(name, project);
        let filter = format!("email:{}", email);
        let existing = self.run(
            "gcloud",
            &["iam", "service-accounts", "list", "--project", project, "--filter", &filter, "--format=value(email)"],
        )?;

        if existing.trim().is_empty() {
            crate::log_status!("gcloud", "Creating service account {}", email);
            self.run(
                "gcloud",
                &["iam", "service-accounts", "create", name, "--project", project, "--display-name", name],
            )?;
            let member = format!("serviceAccount:{}", email);
            for role in roles {
                self.run(
                    "gcloud",
                    &["projects", "add-iam-policy-binding", project, "--member", &member, "--role", role],
                )?;
            }
        }

        let key_file = dir.join(format!("{}.key.json", name));
        let key_path = key_file.display().to_string();
        self.run(
            "gcloud",
            &["iam", "service-accounts", "keys", "create", &key_path, "--iam-account", &email, "--project", project],
        )?;
        Ok(key_file)
    }

    fn configure_bucket_roles(&self, project: &str, service_account: &str, bucket: &str, roles: &[&str]) -> Result<()> {
        let email = service_account_email(service_account, project);
        for role in roles {
            let binding = format!("serviceAccount:{}:{}", email, role);
            self.run("gsutil", &["iam", "ch", &binding, bucket])?;
        }
        Ok(())
    }
}
