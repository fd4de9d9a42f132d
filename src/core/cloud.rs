//! Kubernetes provider names and the storage schemes that go with them.

pub const AKS: &str = "aks";
pub const ALIBABA: &str = "alibaba";
pub const AWS: &str = "aws";
pub const EKS: &str = "eks";
pub const GKE: &str = "gke";
pub const ICP: &str = "icp";
pub const IKS: &str = "iks";
pub const JX_INFRA: &str = "jx-infra";
pub const KUBERNETES: &str = "kubernetes";
pub const KIND: &str = "kind";
pub const OKE: &str = "oke";
pub const OPENSHIFT: &str = "openshift";
pub const PKS: &str = "pks";

/// Every provider a requirements file may name.
pub const KUBERNETES_PROVIDERS: &[&str] = &[
    GKE, OKE, AKS, AWS, EKS, KIND, KUBERNETES, IKS, OPENSHIFT, JX_INFRA, PKS, ICP, ALIBABA,
];

/// Providers backed by a public cloud, where long term storage is expected.
const CLOUD_PROVIDERS: &[&str] = &[GKE, EKS, AKS, AWS, ALIBABA, OKE, IKS];

/// All providers, sorted and comma separated, for help text.
pub fn kubernetes_provider_options() -> String {
    let mut values: Vec<&str> = KUBERNETES_PROVIDERS.to_vec();
    values.sort_unstable();
    values.join(", ")
}

pub fn is_cloud_provider(provider: &str) -> bool {
    CLOUD_PROVIDERS.contains(&provider)
}

/// Bucket URL scheme native to a provider, empty when there is none.
pub fn bucket_scheme(provider: &str) -> &'static str {
    match provider {
        GKE => "gs",
        EKS | AWS => "s3",
        AKS => "azblob",
        _ => "",
    }
}

/// Split a GKE kubeconfig context, `gke_<project>_<zone>_<cluster>`, into
/// project, zone and cluster name.
pub fn parse_gke_context(context: &str) -> Option<(String, String, String)> {
    let rest = context.strip_prefix("gke_")?;
    let mut parts = rest.splitn(3, '_');
    let project = parts.next()?;
    let zone = parts.next()?;
    let cluster = parts.next()?;
    if project.is_empty() || zone.is_empty() || cluster.is_empty() {
        return None;
    }
    Some((project.to_string(), zone.to_string(), cluster.to_string()))
}

/// Cluster name and region of an EKS context, as written by
/// `aws eks update-kubeconfig` (`arn:aws:eks:<region>:<account>:cluster/<name>`)
/// or by eksctl (`<user>@<name>.<region>.eksctl.io`).
pub fn parse_eks_context(context: &str) -> Option<(String, String)> {
    if let Some(arn) = context.strip_prefix("arn:aws:eks:") {
        let mut parts = arn.splitn(3, ':');
        let region = parts.next()?;
        let _account = parts.next()?;
        let name = parts.next()?.strip_prefix("cluster/")?;
        if region.is_empty() || name.is_empty() {
            return None;
        }
        return Some((name.to_string(), region.to_string()));
    }

    let host = context.rsplit_once('@').map(|(_, host)| host).unwrap_or(context);
    let host = host.strip_suffix(".eksctl.io")?;
    let (name, region) = host.rsplit_once('.')?;
    if name.is_empty() || region.is_empty() {
        return None;
    }
    Some((name.to_string(), region.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gke_contexts() {
        assert_eq!(
            parse_gke_context("gke_my-project_europe-west1-b_dev_cluster"),
            Some(("my-project".to_string(), "europe-west1-b".to_string(), "dev_cluster".to_string()))
        );
        assert_eq!(parse_gke_context("minikube"), None);
        assert_eq!(parse_gke_context("gke_project_zone"), None);
    }

    #[test]
    fn eks_contexts() {
        assert_eq!(
            parse_eks_context("arn:aws:eks:us-west-2:123456789012:cluster/jx"),
            Some(("jx".to_string(), "us-west-2".to_string()))
        );
        assert_eq!(
            parse_eks_context("admin@tekton-mole.eu-west-1.eksctl.io"),
            Some(("tekton-mole".to_string(), "eu-west-1".to_string()))
        );
        assert_eq!(parse_eks_context("kind-kind"), None);
    }

    #[test]
    fn provider_options_are_sorted() {
        let options = kubernetes_provider_options();
        assert!(options.starts_with("aks, alibaba, aws, eks, gke"));
        assert!(options.ends_with("pks"));
    }

    #[test]
    fn bucket_schemes() {
        assert_eq!(bucket_scheme(GKE), "gs");
        assert_eq!(bucket_scheme(EKS), "s3");
        assert_eq!(bucket_scheme(KIND), "");
        assert!(is_cloud_provider(GKE));
        assert!(!is_cloud_provider(KIND));
    }
}
