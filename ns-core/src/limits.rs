use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{QuantityField, ResourceKind, Result, ValidationError};
use crate::quantity::{CpuQuantity, MemoryQuantity, CPU_GRAMMAR, MEMORY_GRAMMAR};

/// A request/limit pair for one resource dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResourceQuantity {
    #[schema(example = "100m")]
    pub request: String,
    #[schema(example = "500m")]
    pub limit: String,
}

impl ResourceQuantity {
    pub fn new(request: impl Into<String>, limit: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            limit: limit.into(),
        }
    }
}

/// CPU and memory constraints applied as the namespace's container defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResourceLimits {
    pub cpu: ResourceQuantity,
    pub memory: ResourceQuantity,
}

impl ResourceLimits {
    pub fn new(cpu: ResourceQuantity, memory: ResourceQuantity) -> Self {
        Self { cpu, memory }
    }

    pub fn validate(&self) -> Result<()> {
        validate_resource_limits(self)
    }
}

fn parse_cpu(field: QuantityField, raw: &str) -> Result<CpuQuantity> {
    CpuQuantity::parse(raw).ok_or_else(|| ValidationError::MalformedQuantity {
        field,
        value: raw.to_string(),
        expected: CPU_GRAMMAR,
    })
}

fn parse_memory(field: QuantityField, raw: &str) -> Result<MemoryQuantity> {
    MemoryQuantity::parse(raw).ok_or_else(|| ValidationError::MalformedQuantity {
        field,
        value: raw.to_string(),
        expected: MEMORY_GRAMMAR,
    })
}

/// Validate all four quantities and their request/limit ordering.
///
/// Fails on the first problem found, checking syntax of every field before
/// any ordering so a malformed limit is never reported as an ordering error.
pub fn validate_resource_limits(limits: &ResourceLimits) -> Result<()> {
    let cpu_request = parse_cpu(QuantityField::CpuRequest, &limits.cpu.request)?;
    let cpu_limit = parse_cpu(QuantityField::CpuLimit, &limits.cpu.limit)?;
    let memory_request = parse_memory(QuantityField::MemoryRequest, &limits.memory.request)?;
    let memory_limit = parse_memory(QuantityField::MemoryLimit, &limits.memory.limit)?;

    if cpu_limit < cpu_request {
        return Err(ValidationError::InvalidLimitOrdering {
            resource: ResourceKind::Cpu,
            request: limits.cpu.request.clone(),
            limit: limits.cpu.limit.clone(),
        });
    }

    if memory_limit < memory_request {
        return Err(ValidationError::InvalidLimitOrdering {
            resource: ResourceKind::Memory,
            request: limits.memory.request.clone(),
            limit: limits.memory.limit.clone(),
        });
    }

    Ok(())
}
