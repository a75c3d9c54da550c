use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// The four quantity strings carried by a [`crate::ResourceLimits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityField {
    CpuRequest,
    CpuLimit,
    MemoryRequest,
    MemoryLimit,
}

impl Display for QuantityField {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            QuantityField::CpuRequest => "cpu.request",
            QuantityField::CpuLimit => "cpu.limit",
            QuantityField::MemoryRequest => "memory.request",
            QuantityField::MemoryLimit => "memory.limit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ResourceKind::Cpu => f.write_str("cpu"),
            ResourceKind::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid namespace name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Description must be at most {max} characters (got {len})")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("Malformed quantity for {field}: '{value}' (expected {expected})")]
    MalformedQuantity {
        field: QuantityField,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid limit ordering for {resource}: limit {limit} is less than request {request}")]
    InvalidLimitOrdering {
        resource: ResourceKind,
        request: String,
        limit: String,
    },
}

impl ValidationError {
    /// Short identifier of the rule that rejected the input.
    pub fn rule(&self) -> &'static str {
        match self {
            ValidationError::InvalidName { .. } => "name_grammar",
            ValidationError::DescriptionTooLong { .. } => "description_length",
            ValidationError::MalformedQuantity { .. } => "malformed_quantity",
            ValidationError::InvalidLimitOrdering { .. } => "limit_ordering",
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;
