use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{LimitRange, LimitRangeItem, LimitRangeSpec, Namespace};
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use ns_core::{ResourceLimits, ResourceQuantity};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::labels::{
    DESCRIPTION_ANNOTATION, LIMIT_RANGE_NAME, MANAGED_BY_LABEL, MANAGED_BY_VALUE,
    NAMESPACE_NAME_LABEL, NETWORK_ISOLATED_LABEL, NETWORK_POLICY_NAME,
};

/// Namespaces whose pods may reach an isolated namespace unless configured otherwise.
pub const DEFAULT_SHARED_NAMESPACES: &[&str] = &["ingress-nginx", "monitoring"];

/// The resources realizing one namespace. Never persisted, only recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedManifestSet {
    #[schema(value_type = Object)]
    pub namespace: Namespace,
    #[schema(value_type = Object)]
    pub limit_range: LimitRange,
    #[schema(value_type = Option<Object>)]
    pub network_policy: Option<NetworkPolicy>,
}

/// Kind/name/namespace triple identifying a cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceRef {
    pub fn namespace(name: &str) -> Self {
        Self {
            kind: "Namespace".to_string(),
            name: name.to_string(),
            namespace: None,
        }
    }

    pub fn limit_range(namespace: &str) -> Self {
        Self {
            kind: "LimitRange".to_string(),
            name: LIMIT_RANGE_NAME.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }

    pub fn network_policy(namespace: &str) -> Self {
        Self {
            kind: "NetworkPolicy".to_string(),
            name: NETWORK_POLICY_NAME.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }
}

impl GeneratedManifestSet {
    /// Objects in the set, namespace first.
    pub fn resources(&self) -> Vec<ResourceRef> {
        let name = self.namespace.metadata.name.clone().unwrap_or_default();
        let mut refs = vec![ResourceRef::namespace(&name), ResourceRef::limit_range(&name)];
        if self.network_policy.is_some() {
            refs.push(ResourceRef::network_policy(&name));
        }
        refs
    }

    /// Render as a multi-document YAML stream.
    pub fn to_yaml(&self) -> Result<String, serde_yaml_ng::Error> {
        let mut docs = vec![
            serde_yaml_ng::to_string(&self.namespace)?,
            serde_yaml_ng::to_string(&self.limit_range)?,
        ];
        if let Some(policy) = &self.network_policy {
            docs.push(serde_yaml_ng::to_string(policy)?);
        }
        Ok(docs.join("---\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestGenerator {
    shared_namespaces: Vec<String>,
}

impl Default for ManifestGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SHARED_NAMESPACES.iter().copied())
    }
}

impl ManifestGenerator {
    pub fn new<I, S>(shared_namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shared_namespaces: shared_namespaces.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shared_namespaces(&self) -> &[String] {
        &self.shared_namespaces
    }

    /// Produce the manifest set for an already validated request.
    pub fn generate(
        &self,
        name: &str,
        description: Option<&str>,
        limits: &ResourceLimits,
        network_isolated: bool,
    ) -> GeneratedManifestSet {
        GeneratedManifestSet {
            namespace: self.namespace(name, description, network_isolated),
            limit_range: self.limit_range(name, limits),
            network_policy: network_isolated.then(|| self.network_policy(name)),
        }
    }

    pub fn namespace(
        &self,
        name: &str,
        description: Option<&str>,
        network_isolated: bool,
    ) -> Namespace {
        let labels = BTreeMap::from([
            (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
            (
                NETWORK_ISOLATED_LABEL.to_string(),
                network_isolated.to_string(),
            ),
        ]);
        let annotations = description.map(|d| {
            BTreeMap::from([(DESCRIPTION_ANNOTATION.to_string(), d.to_string())])
        });

        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                annotations,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn limit_range(&self, namespace: &str, limits: &ResourceLimits) -> LimitRange {
        let pair = |cpu: &str, memory: &str| {
            BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(memory.to_string())),
            ])
        };

        LimitRange {
            metadata: ObjectMeta {
                name: Some(LIMIT_RANGE_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    MANAGED_BY_VALUE.to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(LimitRangeSpec {
                limits: vec![LimitRangeItem {
                    type_: "Container".to_string(),
                    default_request: Some(pair(&limits.cpu.request, &limits.memory.request)),
                    default: Some(pair(&limits.cpu.limit, &limits.memory.limit)),
                    ..Default::default()
                }],
            }),
        }
    }

    /// Ingress restricted to pods in the same namespace plus the shared-service namespaces.
    pub fn network_policy(&self, namespace: &str) -> NetworkPolicy {
        let same_namespace = NetworkPolicyPeer {
            pod_selector: Some(LabelSelector::default()),
            ..Default::default()
        };
        let shared = self.shared_namespaces.iter().map(|shared| NetworkPolicyPeer {
            namespace_selector: Some(LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    NAMESPACE_NAME_LABEL.to_string(),
                    shared.clone(),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        });

        NetworkPolicy {
            metadata: ObjectMeta {
                name: Some(NETWORK_POLICY_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    MANAGED_BY_VALUE.to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(NetworkPolicySpec {
                pod_selector: LabelSelector::default(),
                policy_types: Some(vec!["Ingress".to_string()]),
                ingress: Some(vec![NetworkPolicyIngressRule {
                    from: Some(std::iter::once(same_namespace).chain(shared).collect()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Recover the limits a generated limit range was built from.
pub fn limits_from_limit_range(limit_range: &LimitRange) -> Option<ResourceLimits> {
    let item = limit_range
        .spec
        .as_ref()?
        .limits
        .iter()
        .find(|item| item.type_ == "Container")?;
    let requests = item.default_request.as_ref()?;
    let limits = item.default.as_ref()?;

    Some(ResourceLimits::new(
        ResourceQuantity::new(requests.get("cpu")?.0.clone(), limits.get("cpu")?.0.clone()),
        ResourceQuantity::new(
            requests.get("memory")?.0.clone(),
            limits.get("memory")?.0.clone(),
        ),
    ))
}
