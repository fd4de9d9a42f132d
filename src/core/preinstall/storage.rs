use std::path::Path;

use crate::buckets::BucketProvider;
use crate::error::Result;
use crate::naming;
use crate::prompt::Prompter;
use crate::requirements::{RequirementsConfig, StorageEntryConfig};

/// Long term storage entries with the text used when asking for them.
const STORAGE_ENTRIES: &[(&str, &str)] = &[
    ("logs", "Long term log storage"),
    ("reports", "Long term report storage"),
    ("repository", "Chart repository"),
    ("backup", "backup storage"),
];

fn entry_mut<'a>(requirements: &'a mut RequirementsConfig, name: &str) -> Option<&'a mut StorageEntryConfig> {
    let storage = &mut requirements.storage;
    match name {
        "logs" => Some(&mut storage.logs),
        "reports" => Some(&mut storage.reports),
        "repository" => Some(&mut storage.repository),
        "backup" => Some(&mut storage.backup),
        _ => None,
    }
}

/// Make sure every enabled storage entry has a bucket.
///
/// Missing URLs are asked for; an empty answer creates a new bucket for the
/// cluster. Batch mode only warns. The requirements file is saved whenever a
/// URL is filled in.
pub fn verify_storage(
    requirements: &mut RequirementsConfig,
    file: &Path,
    buckets: Option<&dyn BucketProvider>,
    prompter: &dyn Prompter,
) -> Result<()> {
    for (name, text) in STORAGE_ENTRIES {
        let cloud_provider = requirements.is_cloud_provider();
        let cluster_name = requirements.cluster.cluster_name.clone();
        let provider = requirements.cluster.provider.clone();
        let Some(entry) = entry_mut(requirements, name) else {
            continue;
        };

        if !entry.enabled {
            if cloud_provider {
                crate::log_warn!(
                    "preinstall",
                    "Your requirements have not enabled cloud storage for {} - we recommend enabling this for kubernetes provider {}",
                    name,
                    provider
                );
            }
            continue;
        }

        if entry.url.is_empty() {
            if prompter.is_batch() {
                crate::log_warn!(
                    "preinstall",
                    "no URL configured for {} bucket in batch mode, please specify storage.{}.url in jx-requirements.yml",
                    name,
                    name
                );
                continue;
            }
            let answer = prompter.pick_value(
                &format!("{} bucket URL. Press enter to create and use a new bucket", text),
                "",
                false,
            )?;
            entry.url = match answer.trim() {
                "" => match buckets {
                    Some(buckets) => buckets
                        .create_new_bucket_for_cluster(&naming::to_valid_name(&cluster_name), &naming::to_valid_name(name))
                        .map_err(|e| e.with_context(format!("creating a new bucket for {}", name)))?,
                    None => {
                        crate::log_warn!(
                            "preinstall",
                            "cannot create a {} bucket for kubernetes provider {}",
                            name,
                            provider
                        );
                        continue;
                    }
                },
                url => url.to_string(),
            };
            let url = entry.url.clone();
            crate::log_status!("preinstall", "Using {} bucket {}", name, url);
            requirements
                .save_config(file)
                .map_err(|e| e.with_context(format!("saving requirements after configuring {} bucket", name)))?;
        }

        let Some(entry) = entry_mut(requirements, name) else {
            continue;
        };
        if let Some(buckets) = buckets {
            buckets
                .ensure_bucket_is_created(&entry.url)
                .map_err(|e| e.with_context(format!("ensuring {} bucket {} exists", name, entry.url)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBuckets, ScriptedPrompter};

    fn enabled(requirements: &mut RequirementsConfig) {
        requirements.cluster.provider = "gke".to_string();
        requirements.cluster.cluster_name = "Dev".to_string();
        requirements.storage.logs.enabled = true;
        requirements.storage.reports.enabled = true;
    }

    #[test]
    fn empty_answers_create_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("jx-requirements.yml");
        let mut requirements = RequirementsConfig::new();
        enabled(&mut requirements);
        let buckets = FakeBuckets::default();
        let prompter = ScriptedPrompter::answering(&["", "gs://my-reports"], &[]);

        verify_storage(&mut requirements, &file, Some(&buckets), &prompter).unwrap();

        assert_eq!(requirements.storage.logs.url, "gs://dev-logs");
        assert_eq!(requirements.storage.reports.url, "gs://my-reports");
        assert_eq!(*buckets.created.borrow(), vec!["gs://dev-logs"]);
        assert_eq!(*buckets.ensured.borrow(), vec!["gs://dev-logs", "gs://my-reports"]);
        assert!(std::fs::read_to_string(&file).unwrap().contains("gs://my-reports"));
        assert_eq!(
            prompter.asked.borrow()[0],
            "Long term log storage bucket URL. Press enter to create and use a new bucket"
        );
    }

    #[test]
    fn batch_mode_leaves_missing_urls_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut requirements = RequirementsConfig::new();
        enabled(&mut requirements);
        requirements.storage.reports.url = "gs://reports".to_string();
        let buckets = FakeBuckets::default();

        verify_storage(
            &mut requirements,
            &dir.path().join("jx-requirements.yml"),
            Some(&buckets),
            &ScriptedPrompter::batch(),
        )
        .unwrap();

        assert!(requirements.storage.logs.url.is_empty());
        assert!(buckets.created.borrow().is_empty());
        assert_eq!(*buckets.ensured.borrow(), vec!["gs://reports"]);
        assert!(!dir.path().join("jx-requirements.yml").exists());
    }
}
