use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ns_core::ResourceLimits;
use ns_generator::labels::{
    DESCRIPTION_ANNOTATION, LIMIT_RANGE_NAME, MANAGED_BY_LABEL, MANAGED_BY_VALUE, NETWORK_ISOLATED_LABEL,
};
use ns_generator::{limits_from_limit_range, GeneratedManifestSet, ManifestGenerator, ResourceRef};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{OrchestratorError, RegistryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum NamespacePhase {
    Active,
    Terminating,
    Unknown,
}

impl NamespacePhase {
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Active") | None => NamespacePhase::Active,
            Some("Terminating") => NamespacePhase::Terminating,
            Some(_) => NamespacePhase::Unknown,
        }
    }
}

/// A provisioned namespace as the cluster currently reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRecord {
    pub name: String,
    pub description: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub network_isolated: bool,
    pub resource_limits: Option<ResourceLimits>,
    pub phase: NamespacePhase,
    pub created_at: Option<DateTime<Utc>>,
}

impl NamespaceRecord {
    /// Build the record a manifest set produces once applied.
    pub fn from_manifests(manifests: &GeneratedManifestSet, created_at: DateTime<Utc>) -> Self {
        let metadata = &manifests.namespace.metadata;
        let labels = metadata.labels.clone().unwrap_or_default();

        Self {
            name: metadata.name.clone().unwrap_or_default(),
            description: metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(DESCRIPTION_ANNOTATION).cloned()),
            network_isolated: labels.get(NETWORK_ISOLATED_LABEL).map(String::as_str) == Some("true"),
            labels,
            resource_limits: limits_from_limit_range(&manifests.limit_range),
            phase: NamespacePhase::Active,
            created_at: Some(created_at),
        }
    }

    /// Regenerate the manifests this namespace was provisioned from.
    pub fn manifests(&self, generator: &ManifestGenerator) -> Result<GeneratedManifestSet> {
        let limits = self
            .resource_limits
            .as_ref()
            .ok_or_else(|| OrchestratorError::MissingLimitRange {
                namespace: self.name.clone(),
                limit_range: LIMIT_RANGE_NAME,
            })?;

        Ok(generator.generate(
            &self.name,
            self.description.as_deref(),
            limits,
            self.network_isolated,
        ))
    }

    /// Objects a deletion workflow removes for this namespace.
    pub fn resources(&self) -> Vec<ResourceRef> {
        let mut refs = vec![ResourceRef::namespace(&self.name)];
        if self.resource_limits.is_some() {
            refs.push(ResourceRef::limit_range(&self.name));
        }
        if self.network_isolated {
            refs.push(ResourceRef::network_policy(&self.name));
        }
        refs
    }

    pub fn is_managed(&self) -> bool {
        self.labels.get(MANAGED_BY_LABEL).map(String::as_str) == Some(MANAGED_BY_VALUE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

/// Equality-based label selector (`k=v`, `k==v`, `k!=v`, `k`, `!k`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    raw: Option<String>,
    requirements: Vec<Requirement>,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(selector: Option<&str>) -> Result<Self> {
        let raw = match selector.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(Self::default()),
        };

        let mut requirements = Vec::new();
        for term in raw.split(',').map(str::trim) {
            let requirement = if let Some((k, v)) = term.split_once("!=") {
                Requirement::NotEquals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once("==") {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once('=') {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some(k) = term.strip_prefix('!') {
                Requirement::NotExists(k.trim().to_string())
            } else {
                Requirement::Exists(term.to_string())
            };

            let key = match &requirement {
                Requirement::Equals(k, _)
                | Requirement::NotEquals(k, _)
                | Requirement::Exists(k)
                | Requirement::NotExists(k) => k,
            };
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(OrchestratorError::InvalidInput(format!(
                    "Invalid label selector term '{}'",
                    term
                )));
            }
            requirements.push(requirement);
        }

        Ok(Self {
            raw: Some(raw.to_string()),
            requirements,
        })
    }

    /// The selector in Kubernetes string form, if any.
    pub fn selector(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| match req {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::NotExists(k) => !labels.contains_key(k),
        })
    }
}

/// Read-only view of namespace state held by the cluster.
///
/// All mutation goes through workflows so every change is auditable; this
/// trait deliberately has no write methods.
#[async_trait]
pub trait NamespaceRegistry: Send + Sync {
    async fn get(&self, name: &str) -> std::result::Result<Option<NamespaceRecord>, RegistryError>;

    async fn list(
        &self,
        filter: &ListFilter,
    ) -> std::result::Result<Vec<NamespaceRecord>, RegistryError>;

    async fn exists(&self, name: &str) -> std::result::Result<bool, RegistryError> {
        Ok(self.get(name).await?.is_some())
    }
}
