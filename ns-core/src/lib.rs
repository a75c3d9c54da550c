//! Pure validation logic for namespace provisioning.
//!
//! Nothing in this crate performs I/O. Every function is side-effect free and
//! safe to call concurrently from any number of request handlers.

pub mod error;
pub mod limits;
pub mod quantity;
pub mod validation;

pub use error::{QuantityField, ResourceKind, Result, ValidationError};
pub use limits::{validate_resource_limits, ResourceLimits, ResourceQuantity};
pub use quantity::{CpuQuantity, MemoryQuantity};
pub use validation::{validate_description, validate_namespace_name};
