//! HTTP handlers for the gallery page and image uploads.
//!
//! Uploads stream to a staging file instead of being buffered in memory;
//! storage concerns are delegated to `GalleryService`.

use crate::{
    errors::AppError,
    handlers::pages::render_index,
    models::photo::Photo,
    services::gallery_service::GalleryService,
};
use axum::{
    extract::{Multipart, State, multipart::Field},
    response::{Html, Redirect},
};
use futures::StreamExt;
use std::io;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "form_file";

/// `GET /`
///
/// Image sources are rebuilt from the configured bucket and each record's
/// name rather than taken from the stored `url`.
pub async fn index(State(service): State<GalleryService>) -> Html<String> {
    let photos: Vec<Photo> = service
        .list_photos()
        .await
        .into_iter()
        .map(|photo| {
            let url = service.public_url(&photo.name);
            Photo::new(photo.name, url)
        })
        .collect();

    tracing::debug!(count = photos.len(), "rendering gallery");
    Html(render_index(&photos))
}

/// `POST /upload`
///
/// Invalid or missing files redirect back to `/` without comment; only a
/// storage failure produces an error page.
pub async fn upload_photo(
    State(service): State<GalleryService>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "upload rejected: unreadable multipart body");
                return Ok(Redirect::to("/"));
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        return receive_file(&service, field).await;
    }

    tracing::warn!("upload rejected: form carried no `{}` field", UPLOAD_FIELD);
    Ok(Redirect::to("/"))
}

async fn receive_file(service: &GalleryService, field: Field<'_>) -> Result<Redirect, AppError> {
    let raw_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);

    let name = match service.accept_filename(raw_name.as_deref()) {
        Ok(name) => name,
        Err(reason) => {
            tracing::warn!(filename = ?raw_name, %reason, "upload rejected");
            return Ok(Redirect::to("/"));
        }
    };

    tracing::info!(
        filename = ?raw_name,
        stored_as = %name,
        content_type = ?content_type,
        "receiving upload"
    );

    let body = field.map(|chunk| chunk.map_err(io::Error::other));
    let staged = service.stage(&name, body).await?;
    service.store_staged(&name, &staged, content_type).await?;

    Ok(Redirect::to("/"))
}
