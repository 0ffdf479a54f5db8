//! Core data models for the photo gallery.
//!
//! `Photo` is the catalog entry shown on the index page, `Entity` is how the
//! metadata store files it, and `StoredObject` is the blob store's record of
//! the payload itself.

pub mod entity;
pub mod object;
pub mod photo;
