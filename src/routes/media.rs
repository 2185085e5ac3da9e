use actix_multipart::Multipart;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;
use sha2::{Digest, Sha256};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::routes::AppState;
use crate::storage::MediaStoreError;

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct MediaUploadResponse {
    pub hash: String,
    pub mime: String,
    pub size: usize,
    pub duplicate: bool, // true when the file was already stored
}

const ALLOWED_MIME: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp", "video/mp4", "video/webm"];

/// Bytes buffered before the content type is sniffed and the per-kind limit applied.
const SNIFF_LEN: usize = 8192;

#[utoipa::path(
    post,
    path = "/api/media",
    responses(
        (status = 201, description = "File stored (new)", body = MediaUploadResponse),
        (status = 200, description = "File already existed (idempotent)", body = MediaUploadResponse),
        (status = 400, description = "No `file` field"),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type")
    ),
    security(("bearer" = []))
)]
pub async fn upload_media(_auth: Auth, data: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    let limits = data.media_limits;
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        tracing::warn!("multipart error: {e}");
        ApiError::bad_request("malformed multipart body")
    })? {
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }

        let mut bytes: Vec<u8> = Vec::new();
        let mut hasher = Sha256::new();
        let mut mime: Option<String> = None;
        // Until sniffed, the larger of the two limits applies.
        let mut limit = limits.max_image_bytes.max(limits.max_video_bytes);
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            tracing::warn!("multipart read error: {e}");
            ApiError::bad_request("malformed multipart body")
        })? {
            if bytes.len() + chunk.len() > limit {
                return Err(ApiError::PayloadTooLarge);
            }
            hasher.update(&chunk);
            bytes.extend_from_slice(&chunk);
            if mime.is_none() && bytes.len() >= SNIFF_LEN {
                let m = allowed_mime(&bytes)?;
                limit = limit_for(&m, limits);
                if bytes.len() > limit {
                    return Err(ApiError::PayloadTooLarge);
                }
                mime = Some(m);
            }
        }
        let mime = match mime {
            Some(m) => m,
            None => {
                let m = allowed_mime(&bytes)?;
                if bytes.len() > limit_for(&m, limits) {
                    return Err(ApiError::PayloadTooLarge);
                }
                m
            }
        };

        let hash = format!("{:x}", hasher.finalize());
        let (status, duplicate) = match data.media_store.save(&hash, &mime, &bytes).await {
            Ok(()) => (StatusCode::CREATED, false),
            Err(MediaStoreError::Duplicate) => (StatusCode::OK, true),
            Err(e) => {
                tracing::error!("media store save error: {e}");
                return Err(ApiError::Internal);
            }
        };
        tracing::info!(%hash, %mime, size = bytes.len(), duplicate, "media upload");
        let resp = MediaUploadResponse { hash, mime, size: bytes.len(), duplicate };
        return Ok(HttpResponse::build(status).json(resp));
    }
    Err(ApiError::bad_request("multipart field `file` is required"))
}

fn allowed_mime(bytes: &[u8]) -> Result<String, ApiError> {
    match infer::get(bytes).map(|t| t.mime_type()) {
        Some(m) if ALLOWED_MIME.contains(&m) => Ok(m.to_string()),
        _ => Err(ApiError::UnsupportedMediaType),
    }
}

fn limit_for(mime: &str, limits: crate::config::MediaLimits) -> usize {
    if mime.starts_with("video/") {
        limits.max_video_bytes
    } else {
        limits.max_image_bytes
    }
}

#[utoipa::path(
    get,
    path = "/media/{hash}",
    params(("hash" = String, Path, description = "SHA-256 hex digest")),
    responses((status = 200, description = "Stored bytes"), (status = 404, description = "Unknown hash"))
)]
pub async fn get_media(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    stored_media(&data, &path.into_inner()).await
}

/// Immutable response carrying the stored bytes for `hash`.
pub(crate) async fn stored_media(data: &AppState, hash: &str) -> Result<HttpResponse, ApiError> {
    match data.media_store.load(hash).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, mime))
            .insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"))
            .body(bytes)),
        Err(MediaStoreError::NotFound) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!("media store load error: {e}");
            Err(ApiError::Internal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaLimits;

    #[test]
    fn sniffing_accepts_only_listed_types() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(allowed_mime(&png).unwrap(), "image/png");
        let pdf = b"%PDF-1.7\n";
        assert!(matches!(allowed_mime(pdf), Err(ApiError::UnsupportedMediaType)));
        assert!(matches!(allowed_mime(b"plain text"), Err(ApiError::UnsupportedMediaType)));
    }

    #[test]
    fn videos_get_the_larger_limit() {
        let limits = MediaLimits { max_image_bytes: 10, max_video_bytes: 100 };
        assert_eq!(limit_for("video/mp4", limits), 100);
        assert_eq!(limit_for("image/gif", limits), 10);
    }
}
