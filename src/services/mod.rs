//! Storage seams and the gallery flows built on them.

pub mod blob_store;
#[cfg(test)]
pub mod fake;
pub mod filename;
pub mod gallery_service;
pub mod metadata_store;
