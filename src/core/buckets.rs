//! Long term storage buckets on the cluster's cloud provider.

use crate::cloud;
use crate::error::{Error, Result};
use crate::naming;
use crate::requirements::RequirementsConfig;
use crate::utils::command;

const MAX_BUCKET_NAME_LENGTH: usize = 63;

pub trait BucketProvider {
    /// Create a fresh bucket for `cluster_name` and return its URL.
    fn create_new_bucket_for_cluster(&self, cluster_name: &str, kind: &str) -> Result<String>;
    /// Create the bucket behind `url` unless it already exists.
    fn ensure_bucket_is_created(&self, url: &str) -> Result<()>;
}

/// Pick the bucket provider for the requirements' cloud, if it has one.
pub fn provider_for(requirements: &RequirementsConfig) -> Option<Box<dyn BucketProvider>> {
    match requirements.cluster.provider.as_str() {
        cloud::GKE => Some(Box::new(GcsBuckets::new(requirements))),
        cloud::EKS | cloud::AWS => Some(Box::new(S3Buckets::new(requirements))),
        _ => None,
    }
}

/// `<cluster>-<kind>-<random>`, lowercase and short enough for any cloud.
pub fn new_bucket_name(cluster_name: &str, kind: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let base = naming::to_valid_name(&format!("{}-{}", cluster_name, kind));
    let max_base = MAX_BUCKET_NAME_LENGTH - 9;
    let base = naming::to_valid_name_truncated(&base, max_base);
    format!("{}-{}", base, &suffix[..8])
}

/// Split `gs://name/path` into scheme and bucket name.
pub fn parse_bucket_url(url: &str) -> Result<(String, String)> {
    let (scheme, rest) = url.split_once("://").ok_or_else(|| {
        Error::bucket_command_failed(format!("invalid bucket URL {}", url), url)
    })?;
    let name = rest.split('/').next().unwrap_or_default();
    if name.is_empty() {
        return Err(Error::bucket_command_failed(
            format!("bucket URL {} has no bucket name", url),
            url,
        ));
    }
    Ok((scheme.to_string(), name.to_string()))
}

/// GKE regions are the zone minus its final `-<letter>`.
pub fn region_from_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, suffix)) if suffix.len() == 1 => region.to_string(),
        _ => zone.to_string(),
    }
}

pub struct GcsBuckets {
    project: String,
    location: String,
}

impl GcsBuckets {
    pub fn new(requirements: &RequirementsConfig) -> Self {
        let cluster = &requirements.cluster;
        let location = if !cluster.region.is_empty() {
            cluster.region.clone()
        } else {
            region_from_zone(&cluster.zone)
        };
        Self {
            project: cluster.project_id.clone(),
            location,
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let url = format!("gs://{}", name);
        let output = command::capture("gsutil", &["ls", "-b", &url], None)?;
        Ok(output.success)
    }

    fn create(&self, name: &str) -> Result<()> {
        let url = format!("gs://{}", name);
        let mut args = vec!["mb"];
        if !self.project.is_empty() {
            args.extend_from_slice(&["-p", self.project.as_str()]);
        }
        if !self.location.is_empty() {
            args.extend_from_slice(&["-l", self.location.as_str()]);
        }
        args.push(url.as_str());
        let output = command::capture("gsutil", &args, None)?;
        if !output.success {
            return Err(Error::bucket_command_failed(
                format!("failed to create bucket {}: {}", url, output.error_text()),
                url,
            ));
        }
        crate::log_status!("storage", "Created bucket {}", url);
        Ok(())
    }
}

impl BucketProvider for GcsBuckets {
    fn create_new_bucket_for_cluster(&self, cluster_name: &str, kind: &str) -> Result<String> {
        let name = new_bucket_name(cluster_name, kind);
        self.create(&name)?;
        Ok(format!("gs://{}", name))
    }

    fn ensure_bucket_is_created(&self, url: &str) -> Result<()> {
        let (scheme, name) = parse_bucket_url(url)?;
        if scheme != "gs" {
            return Err(Error::bucket_command_failed(
                format!("bucket {} is not a Google Cloud Storage URL", url),
                url,
            ));
        }
        if self.exists(&name)? {
            return Ok(());
        }
        self.create(&name)
    }
}

pub struct S3Buckets {
    region: String,
}

impl S3Buckets {
    pub fn new(requirements: &RequirementsConfig) -> Self {
        Self {
            region: requirements.cluster.region.clone(),
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let output = command::capture("aws", &["s3api", "head-bucket", "--bucket", name], None)?;
        Ok(output.success)
    }

    fn create(&self, name: &str) -> Result<()> {
        let constraint = format!("LocationConstraint={}", self.region);
        let mut args = vec!["s3api", "create-bucket", "--bucket", name];
        if !self.region.is_empty() {
            args.extend_from_slice(&["--region", self.region.as_str()]);
            // us-east-1 rejects an explicit location constraint.
            if self.region != "us-east-1" {
                args.extend_from_slice(&["--create-bucket-configuration", constraint.as_str()]);
            }
        }
        let output = command::capture("aws", &args, None)?;
        if !output.success {
            return Err(Error::bucket_command_failed(
                format!("failed to create bucket s3://{}: {}", name, output.error_text()),
                format!("s3://{}", name),
            ));
        }
        crate::log_status!("storage", "Created bucket s3://{}", name);
        Ok(())
    }
}

impl BucketProvider for S3Buckets {
    fn create_new_bucket_for_cluster(&self, cluster_name: &str, kind: &str) -> Result<String> {
        let name = new_bucket_name(cluster_name, kind);
        self.create(&name)?;
        Ok(format!("s3://{}", name))
    }

    fn ensure_bucket_is_created(&self, url: &str) -> Result<()> {
        let (scheme, name) = parse_bucket_url(url)?;
        if scheme != "s3" {
            return Err(Error::bucket_command_failed(
                format!("bucket {} is not an S3 URL", url),
                url,
            ));
        }
        if self.exists(&name)? {
            return Ok(());
        }
        self.create(&name)
    }
}
