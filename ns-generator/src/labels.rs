//! Well-known metadata keys and object names written by the generator.

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "ns-provisioner";
pub const NETWORK_ISOLATED_LABEL: &str = "ns-provisioner/network-isolated";
pub const DESCRIPTION_ANNOTATION: &str = "ns-provisioner/description";
pub const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

pub const LIMIT_RANGE_NAME: &str = "default-limits";
pub const NETWORK_POLICY_NAME: &str = "isolate-namespace";

/// Label selector matching every namespace this service manages.
pub fn managed_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY_VALUE)
}
