//! HTTP handlers for the auth handshake, listing, download, and upload
//! endpoints.

use axum::body::Body;
use axum::extract::{ConnectInfo, Multipart, Query, State};
use axum::http::{header, HeaderMap, Response, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use crate::common::AppError;
use crate::config::CHUNK_SIZE;
use crate::listing;
use crate::server::auth::{self, AuthToken};
use crate::server::stream::ProgressBody;
use crate::server::AppState;
use crate::utils::security;

#[derive(Deserialize)]
pub struct AuthRequest {
    password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct PathQuery {
    path: String,
}

/// POST /auth — password handshake. Issues a session token on match,
/// 401 on mismatch; no token is ever issued for a wrong password.
pub async fn auth_handler(
    State(state): State<AppState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<Value>, AppError> {
    if !auth::verify_password(&state.password, &request.password) {
        tracing::warn!("auth handshake rejected: wrong password");
        return Err(AppError::Unauthorized("wrong password".to_string()));
    }

    let token = state.tokens.issue();
    tracing::info!("auth handshake accepted");
    Ok(Json(json!({ "token": token })))
}

/// GET /list?path=<rel> — authenticated directory listing.
pub async fn list_handler(
    AuthToken(_): AuthToken,
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Vec<listing::Entry>>, AppError> {
    let entries = listing::list(&state.registry, &query.path)?;
    tracing::debug!(path = %query.path, count = entries.len(), "listing served");
    Ok(Json(entries))
}

/// GET /download?path=<rel> — authenticated file download with byte-range
/// support. Each request registers its own ActiveDownload entry.
pub async fn download_handler(
    AuthToken(_): AuthToken,
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response<Body>, AppError> {
    let path = listing::resolve_file(&state.registry, &query.path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::NotFound(format!("cannot open {}: {e}", query.path)))?;
    let total_size = file
        .metadata()
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .len();

    let range = match headers.get(header::RANGE) {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| AppError::BadRequest("unreadable Range header".to_string()))?;
            Some(parse_range(raw, total_size)?)
        }
        None => None,
    };

    let (offset, length) = range.unwrap_or((0, total_size));
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let peer = peer_label(&connect);
    let id = state.store.begin_download(&file_name, length, &peer);
    tracing::info!(id, file = %file_name, offset, length, peer = %peer, "serving download");

    let body = ProgressBody::new(file.take(length), CHUNK_SIZE, state.store.clone(), id);

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        );

    if range.is_some() {
        let end = offset + length.saturating_sub(1);
        response = response
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {offset}-{end}/{total_size}"),
            );
    }

    response
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(e.into()))
}

/// POST /upload — authenticated multipart upload streamed into the
/// receive directory. The file name must be a single path component;
/// collisions get a ` (N)` suffix.
pub async fn upload_handler(
    AuthToken(_): AuthToken,
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue; // not a file part
        };

        security::validate_upload_filename(&file_name)
            .map_err(|e| AppError::BadRequest(format!("invalid file name: {e}")))?;

        let (dest, mut out) = create_unique(&state.receive_dir, &file_name)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("cannot create upload file: {e}")))?;

        let mut size: u64 = 0;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    out.write_all(&chunk)
                        .await
                        .map_err(|e| AppError::Internal(e.into()))?;
                    size += chunk.len() as u64;
                }
                Ok(None) => break,
                Err(e) => {
                    // sender vanished mid-upload; drop the partial file
                    drop(out);
                    let _ = tokio::fs::remove_file(&dest).await;
                    return Err(AppError::BadRequest(format!("upload interrupted: {e}")));
                }
            }
        }
        out.flush().await.map_err(|e| AppError::Internal(e.into()))?;

        let stored_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);
        let peer = peer_label(&connect);
        state
            .store
            .record_received(&stored_name, dest.clone(), &peer, size);

        return Ok(Json(json!({ "storedName": stored_name, "size": size })));
    }

    Err(AppError::BadRequest(
        "multipart body contained no file".to_string(),
    ))
}

pub async fn health_handler() -> &'static str {
    "OK"
}

fn peer_label(connect: &Option<ConnectInfo<SocketAddr>>) -> String {
    connect
        .as_ref()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parse a `Range` header against the file size, returning
/// `(offset, length)`. Only single `bytes=` ranges are supported;
/// multipart ranges are rejected as malformed.
fn parse_range(raw: &str, total_size: u64) -> Result<(u64, u64), AppError> {
    let spec = raw
        .strip_prefix("bytes=")
        .ok_or_else(|| AppError::BadRequest(format!("unsupported Range unit: {raw}")))?;

    if spec.contains(',') {
        return Err(AppError::BadRequest(
            "multipart ranges are not supported".to_string(),
        ));
    }

    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| AppError::BadRequest(format!("malformed Range: {raw}")))?;

    let parse = |s: &str| {
        s.parse::<u64>()
            .map_err(|_| AppError::BadRequest(format!("malformed Range: {raw}")))
    };

    let (start, end) = match (start_str.is_empty(), end_str.is_empty()) {
        // bytes=a-b
        (false, false) => {
            let start = parse(start_str)?;
            let end = parse(end_str)?;
            if end < start {
                return Err(AppError::BadRequest(format!("malformed Range: {raw}")));
            }
            (start, end.min(total_size.saturating_sub(1)))
        }
        // bytes=a-
        (false, true) => (parse(start_str)?, total_size.saturating_sub(1)),
        // bytes=-n (suffix)
        (true, false) => {
            let suffix = parse(end_str)?;
            if suffix == 0 {
                return Err(AppError::RangeNotSatisfiable(
                    "zero-length suffix range".to_string(),
                ));
            }
            (
                total_size.saturating_sub(suffix),
                total_size.saturating_sub(1),
            )
        }
        (true, true) => return Err(AppError::BadRequest(format!("malformed Range: {raw}"))),
    };

    if start >= total_size {
        return Err(AppError::RangeNotSatisfiable(format!(
            "range starts at {start} but file is {total_size} bytes"
        )));
    }

    Ok((start, end - start + 1))
}

/// Claim a destination for an uploaded name, appending a ` (N)` suffix
/// before the extension block until a create succeeds. `create_new`
/// makes each claim atomic, so concurrent uploads of the same name
/// always land in distinct files.
async fn create_unique(
    dir: &Path,
    file_name: &str,
) -> std::io::Result<(PathBuf, tokio::fs::File)> {
    // split at the first dot so "a.tar.gz" renames to "a (1).tar.gz"
    let (stem, extensions) = match file_name.find('.') {
        Some(0) | None => (file_name, ""),
        Some(pos) => file_name.split_at(pos),
    };

    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            dir.join(file_name)
        } else {
            dir.join(format!("{stem} ({counter}){extensions}"))
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_and_bounded_ranges_resolve_to_offset_and_length() {
        assert_eq!(parse_range("bytes=0-99", 1000).unwrap(), (0, 100));
        assert_eq!(parse_range("bytes=500-999", 1000).unwrap(), (500, 500));
        // end clamps to the last byte
        assert_eq!(parse_range("bytes=900-5000", 1000).unwrap(), (900, 100));
    }

    #[test]
    fn open_ended_and_suffix_ranges() {
        assert_eq!(parse_range("bytes=200-", 1000).unwrap(), (200, 800));
        assert_eq!(parse_range("bytes=-100", 1000).unwrap(), (900, 100));
        // suffix longer than the file serves the whole file
        assert_eq!(parse_range("bytes=-5000", 1000).unwrap(), (0, 1000));
    }

    #[test]
    fn malformed_ranges_are_bad_requests() {
        assert!(matches!(
            parse_range("chunks=0-10", 1000),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_range("bytes=10-5", 1000),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_range("bytes=-", 1000),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_range("bytes=0-10,20-30", 1000),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn out_of_bounds_ranges_are_unsatisfiable() {
        assert!(matches!(
            parse_range("bytes=1000-", 1000),
            Err(AppError::RangeNotSatisfiable(_))
        ));
        assert!(matches!(
            parse_range("bytes=-0", 1000),
            Err(AppError::RangeNotSatisfiable(_))
        ));
    }

    #[tokio::test]
    async fn collision_suffix_lands_before_the_extension_block() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.tar.gz"), b"x").unwrap();

        let (first, _) = create_unique(dir.path(), "report.tar.gz").await.unwrap();
        assert_eq!(first, dir.path().join("report (1).tar.gz"));

        let (second, _) = create_unique(dir.path(), "report.tar.gz").await.unwrap();
        assert_eq!(second, dir.path().join("report (2).tar.gz"));
    }

    #[tokio::test]
    async fn free_names_are_claimed_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let (dest, _) = create_unique(dir.path(), "new.txt").await.unwrap();
        assert_eq!(dest, dir.path().join("new.txt"));
        assert!(dest.exists());
    }
}
