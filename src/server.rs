//! Routing and per-request dispatch.

use std::io;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::headers::{AcceptRanges, ContentLength, HeaderMapExt};
use tower_http::trace::TraceLayer;

use crate::error::ServeError;
use crate::file::FileMetadata;
use crate::path::{self, ResolvedPath};
use crate::range;
use crate::{listing, stream};

/// Shared, read-only server state.
#[derive(Debug, Clone)]
pub struct ServeState {
    root: Arc<PathBuf>,
}

impl ServeState {
    /// Canonicalizes `root` once; every request is resolved against it.
    pub async fn new(root: impl AsRef<FsPath>) -> io::Result<Self> {
        let root = tokio::fs::canonicalize(root.as_ref()).await?;
        if !tokio::fs::metadata(&root).await?.is_dir() {
            return Err(io::Error::other(format!("{} is not a directory", root.display())));
        }
        Ok(ServeState { root: Arc::new(root) })
    }

    pub fn root(&self) -> &FsPath {
        &self.root
    }
}

/// Builds the router: every `GET` path maps onto the served tree.
pub fn router(state: ServeState) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/{*path}", get(serve_path))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn serve_root(
    State(state): State<ServeState>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    dispatch(&state, "", headers.get(header::RANGE)).await
}

async fn serve_path(
    State(state): State<ServeState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    dispatch(&state, &path, headers.get(header::RANGE)).await
}

/// Answers a single request for `request_path` (relative to the root, as
/// received in the URL), honoring an optional `Range` header.
pub async fn dispatch(
    state: &ServeState,
    request_path: &str,
    range: Option<&HeaderValue>,
) -> Result<Response, ServeError> {
    let resolved = path::resolve(state.root(), request_path).await?;
    let stat = tokio::fs::metadata(resolved.as_path()).await?;

    if stat.is_dir() {
        let url_path = format!("/{}", request_path.trim_start_matches('/'));
        let listing = listing::render(resolved.as_path(), &url_path).await;
        let content_type = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];
        return Ok((StatusCode::OK, content_type, listing).into_response());
    }

    let file = FileMetadata::new(resolved.as_path(), &stat);
    // an empty `Range:` counts as no header at all
    match range.filter(|value| !value.is_empty()) {
        Some(range_header) => partial_download(&resolved, &file, range_header).await,
        None => full_download(&resolved, &file).await,
    }
}

async fn full_download(resolved: &ResolvedPath, file: &FileMetadata) -> Result<Response, ServeError> {
    let body = stream::stream_full(resolved.as_path()).await?;
    let headers = download_headers(file, body.remaining())?;
    tracing::debug!(path = %resolved.as_path().display(), size = body.remaining(), "full download");
    Ok((StatusCode::OK, headers, body).into_response())
}

async fn partial_download(
    resolved: &ResolvedPath,
    file: &FileMetadata,
    range_header: &HeaderValue,
) -> Result<Response, ServeError> {
    let range = range_header
        .to_str()
        .map_err(|_| range::RangeError::Malformed)
        .and_then(|raw| range::parse(raw, file.size))
        .map_err(|err| ServeError::range(err, file.size))?;

    let length = range.len();
    let body = stream::stream(resolved.as_path(), range.start, length).await?;

    let mut headers = download_headers(file, length)?;
    // formatted by hand: an inverted range is echoed as received
    let content_range = format!("bytes {}-{}/{}", range.start, range.end, file.size);
    headers.insert(header::CONTENT_RANGE, HeaderValue::from_str(&content_range)?);

    tracing::debug!(
        path = %resolved.as_path().display(),
        start = range.start,
        end = range.end,
        length,
        "partial download"
    );
    Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
}

fn download_headers(file: &FileMetadata, content_length: u64) -> Result<HeaderMap, ServeError> {
    let mut headers = HeaderMap::new();
    headers.typed_insert(AcceptRanges::bytes());
    headers.typed_insert(ContentLength(content_length));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&file.content_disposition())?,
    );
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(&file.content_type())?);
    Ok(headers)
}
