use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{LimitRange, Namespace};
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use ns_generator::labels::{
    managed_selector, DESCRIPTION_ANNOTATION, LIMIT_RANGE_NAME, NETWORK_ISOLATED_LABEL,
};
use ns_generator::limits_from_limit_range;
use tracing::{debug, instrument};

use crate::error::RegistryError;
use crate::registry::{ListFilter, NamespacePhase, NamespaceRecord, NamespaceRegistry};

/// Namespace registry backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeRegistry {
    client: Client,
}

impl KubeRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with an explicit kubeconfig, or the in-cluster/default config.
    pub async fn connect(kubeconfig: Option<PathBuf>) -> Result<Self, RegistryError> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(&path).map_err(|e| {
                    RegistryError::Unavailable(format!(
                        "Failed to read kubeconfig {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        RegistryError::Unavailable(format!("Invalid kubeconfig {}: {}", path.display(), e))
                    })?;
                Client::try_from(config).map_err(api_error)?
            }
            None => Client::try_default().await.map_err(api_error)?,
        };

        Ok(Self::new(client))
    }

    async fn limit_range(&self, namespace: &str) -> Result<Option<LimitRange>, RegistryError> {
        Api::<LimitRange>::namespaced(self.client.clone(), namespace)
            .get_opt(LIMIT_RANGE_NAME)
            .await
            .map_err(api_error)
    }
}

/// Client errors from the API server are final; a retry gets the same answer.
fn api_error(err: kube::Error) -> RegistryError {
    match err {
        kube::Error::Api(response)
            if (400..500).contains(&response.code) && !matches!(response.code, 408 | 429) =>
        {
            RegistryError::Api(format!("{} ({}): {}", response.reason, response.code, response.message))
        }
        other => RegistryError::Unavailable(other.to_string()),
    }
}

/// Build a record from a namespace object and its provisioner limit range.
pub fn record_from_objects(namespace: &Namespace, limit_range: Option<&LimitRange>) -> NamespaceRecord {
    let metadata = &namespace.metadata;
    let labels = metadata.labels.clone().unwrap_or_default();

    NamespaceRecord {
        name: metadata.name.clone().unwrap_or_default(),
        description: metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(DESCRIPTION_ANNOTATION).cloned()),
        network_isolated: labels.get(NETWORK_ISOLATED_LABEL).map(String::as_str) == Some("true"),
        labels,
        resource_limits: limit_range.and_then(limits_from_limit_range),
        phase: NamespacePhase::from_status(
            namespace.status.as_ref().and_then(|s| s.phase.as_deref()),
        ),
        created_at: metadata.creation_timestamp.as_ref().map(|t| t.0),
    }
}

#[async_trait]
impl NamespaceRegistry for KubeRegistry {
    #[instrument(skip(self))]
    async fn get(&self, name: &str) -> Result<Option<NamespaceRecord>, RegistryError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let Some(namespace) = namespaces.get_opt(name).await.map_err(api_error)? else {
            return Ok(None);
        };

        let limit_range = self.limit_range(name).await?;
        Ok(Some(record_from_objects(&namespace, limit_range.as_ref())))
    }

    #[instrument(skip(self), fields(selector = ?filter.selector()))]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<NamespaceRecord>, RegistryError> {
        let selector = match filter.selector() {
            Some(user) => format!("{},{}", managed_selector(), user),
            None => managed_selector(),
        };

        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = namespaces
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(api_error)?;

        let limit_ranges: Api<LimitRange> = Api::all(self.client.clone());
        let limit_ranges: HashMap<String, LimitRange> = limit_ranges
            .list(&ListParams::default().fields(&format!("metadata.name={}", LIMIT_RANGE_NAME)))
            .await
            .map_err(api_error)?
            .items
            .into_iter()
            .filter_map(|lr| Some((lr.metadata.namespace.clone()?, lr)))
            .collect();

        debug!(count = namespaces.items.len(), "Listed managed namespaces");

        Ok(namespaces
            .items
            .iter()
            .map(|ns| {
                let name = ns.metadata.name.as_deref().unwrap_or_default();
                record_from_objects(ns, limit_ranges.get(name))
            })
            .collect())
    }
}
