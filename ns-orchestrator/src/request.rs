//! Caller-facing request payloads and the validated plans derived from them.

use k8s_openapi::api::core::v1::LimitRange;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use ns_core::{validate_description, validate_namespace_name, ResourceLimits, ValidationError};
use ns_generator::labels::NETWORK_ISOLATED_LABEL;
use ns_generator::{limits_from_limit_range, GeneratedManifestSet, ManifestGenerator, ResourceRef};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{OrchestratorError, Result};
use crate::registry::NamespaceRecord;

fn default_network_isolated() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNamespaceRequest {
    #[schema(example = "svc-api")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub resource_limits: ResourceLimits,
    #[serde(default = "default_network_isolated")]
    pub network_isolated: bool,
    #[serde(default)]
    pub dry_run: bool,
}

/// A create request that passed validation. Only obtainable through
/// [`CreateNamespaceRequest::into_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedNamespace {
    name: String,
    description: Option<String>,
    resource_limits: ResourceLimits,
    network_isolated: bool,
}

impl ValidatedNamespace {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, generator: &ManifestGenerator) -> GeneratedManifestSet {
        generator.generate(
            &self.name,
            self.description.as_deref(),
            &self.resource_limits,
            self.network_isolated,
        )
    }
}

/// The fork taken after validation. A dry run carries nothing that can
/// reach the registry or the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatePlan {
    DryRun(ValidatedNamespace),
    Live(ValidatedNamespace),
}

impl CreateNamespaceRequest {
    /// Validate the request, failing on the first rule violated.
    pub fn into_plan(self) -> std::result::Result<CreatePlan, ValidationError> {
        validate_namespace_name(&self.name)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        self.resource_limits.validate()?;

        let validated = ValidatedNamespace {
            name: self.name,
            description: self.description,
            resource_limits: self.resource_limits,
            network_isolated: self.network_isolated,
        };

        Ok(if self.dry_run {
            CreatePlan::DryRun(validated)
        } else {
            CreatePlan::Live(validated)
        })
    }
}

/// Partial update: each field is independently present or absent, and only
/// present fields are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateNamespaceRequest {
    /// An empty string clears the description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resource_limits: Option<ResourceLimits>,
    #[serde(default)]
    pub network_isolated: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "resource", rename_all = "lowercase")]
pub enum NetworkPolicyChange {
    Apply(NetworkPolicy),
    Remove(ResourceRef),
}

/// The change set handed to an update workflow. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_isolated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_range: Option<LimitRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicyChange>,
}

impl UpdateChanges {
    /// Apply the change set to a record the way the update workflow does.
    pub fn apply_to(&self, record: &mut NamespaceRecord) {
        if let Some(description) = &self.description {
            record.description = (!description.is_empty()).then(|| description.clone());
        }
        if let Some(limits) = self.limit_range.as_ref().and_then(limits_from_limit_range) {
            record.resource_limits = Some(limits);
        }
        if let Some(isolated) = self.network_isolated {
            record.network_isolated = isolated;
            record
                .labels
                .insert(NETWORK_ISOLATED_LABEL.to_string(), isolated.to_string());
        }
    }
}

impl UpdateNamespaceRequest {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.resource_limits.is_none() && self.network_isolated.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "Update must change at least one of description, resourceLimits, networkIsolated"
                    .to_string(),
            ));
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(limits) = &self.resource_limits {
            limits.validate()?;
        }
        Ok(())
    }

    /// Build the change set, generating manifests only for the fields present.
    pub fn changes(&self, namespace: &str, generator: &ManifestGenerator) -> UpdateChanges {
        UpdateChanges {
            description: self.description.clone(),
            network_isolated: self.network_isolated,
            limit_range: self
                .resource_limits
                .as_ref()
                .map(|limits| generator.limit_range(namespace, limits)),
            network_policy: self.network_isolated.map(|isolated| {
                if isolated {
                    NetworkPolicyChange::Apply(generator.network_policy(namespace))
                } else {
                    NetworkPolicyChange::Remove(ResourceRef::network_policy(namespace))
                }
            }),
        }
    }

    /// The record as it will look once the update is applied.
    pub fn merge_onto(&self, record: &NamespaceRecord) -> NamespaceRecord {
        let mut merged = record.clone();
        if let Some(description) = &self.description {
            merged.description = (!description.is_empty()).then(|| description.clone());
        }
        if let Some(limits) = &self.resource_limits {
            merged.resource_limits = Some(limits.clone());
        }
        if let Some(isolated) = self.network_isolated {
            merged.network_isolated = isolated;
            merged
                .labels
                .insert(NETWORK_ISOLATED_LABEL.to_string(), isolated.to_string());
        }
        merged
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DeleteNamespaceRequest {
    /// Bypass protected-resource checks in the deletion workflow
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub dry_run: bool,
}
