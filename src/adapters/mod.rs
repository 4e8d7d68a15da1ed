//! Adapters for object metadata encoding and stamping

pub mod operator_metadata;
pub mod version_annotations;
