//! Defines the two routes of the gallery.
//!
//! - `GET  /`       : gallery page with the upload form
//! - `POST /upload` : multipart upload, field `form_file`
//!
//! Nothing else is served; public image URLs point at the blob store.

use crate::{
    handlers::gallery_handlers::{index, upload_photo},
    services::gallery_service::GalleryService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the gallery router.
///
/// The router carries shared state (`GalleryService`) to both handlers.
/// Upload bodies larger than `max_upload_bytes` fail while being read.
pub fn routes(max_upload_bytes: usize) -> Router<GalleryService> {
    Router::new().route("/", get(index)).route(
        "/upload",
        post(upload_photo).layer(DefaultBodyLimit::max(max_upload_bytes)),
    )
}
