//! # shareserve
//!
//! Serves a directory tree over HTTP with [`axum`][1]. Directories render as
//! a plain-text listing, files are sent as downloads and honor single
//! `Range: bytes=<start>-[<end>]` requests with `206 Partial Content`.
//!
//! Request paths are confined to the served root (see [`path::resolve`]),
//! `Range` headers are parsed by [`range::parse`] and file bodies are
//! streamed in bounded chunks by [`ChunkStream`].
//!
//! ```no_run
//! use shareserve::{router, ServeState};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let state = ServeState::new("/data").await?;
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, router(state)).await
//! }
//! ```
//!
//! [1]: https://docs.rs/axum

pub mod config;
mod error;
mod file;
pub mod listing;
pub mod path;
pub mod range;
mod server;
mod stream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncSeek;

pub use config::Config;
pub use error::{ConfigError, ServeError};
pub use file::FileMetadata;
pub use path::{ResolveError, ResolvedPath};
pub use range::{RangeError, RangeSpec};
pub use server::{dispatch, router, ServeState};
pub use stream::{stream, stream_full, ChunkStream, CHUNK_SIZE};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}
