//! Declarative resource synthesis for provisioned namespaces.
//!
//! [`ManifestGenerator::generate`] is a pure function of its inputs: the same
//! name, description, limits and isolation flag always produce structurally
//! identical output, so a dry-run preview matches what a live run submits.

pub mod labels;
pub mod manifest;

pub use manifest::{
    limits_from_limit_range, GeneratedManifestSet, ManifestGenerator, ResourceRef,
    DEFAULT_SHARED_NAMESPACES,
};
