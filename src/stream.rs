use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::{cmp, mem};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::{pin_project, pinned_drop};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

use crate::AsyncSeekStart;

/// Upper bound on the size of a single chunk, and so on the memory held by
/// one in-flight download.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Opens `path` and streams `length` bytes starting at `offset`.
pub async fn stream(path: &Path, offset: u64, length: u64) -> io::Result<ChunkStream<File>> {
    let file = File::open(path).await?;
    Ok(ChunkStream::new(file, offset, length))
}

/// Opens `path` and streams the whole file, sized from the open handle.
pub async fn stream_full(path: &Path) -> io::Result<ChunkStream<File>> {
    let file = File::open(path).await?;
    let length = file.metadata().await?.len();
    Ok(ChunkStream::new(file, 0, length))
}

/// Response body stream over a byte interval of `B`. Implements [`Stream`],
/// [`Body`], and [`IntoResponse`].
///
/// Chunks are produced in offset order and are never larger than
/// [`CHUNK_SIZE`]. If the source runs out before `length` bytes were read the
/// stream simply ends. After an I/O error the stream is finished. The body is
/// owned by the stream, so dropping the stream closes it.
#[pin_project(PinnedDrop)]
pub struct ChunkStream<B> {
    state: StreamState,
    remaining: u64,
    #[pin]
    body: B,
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64 },
    Seeking,
    Reading { buffer: BytesMut },
    Done,
}

impl<B: AsyncRead + AsyncSeekStart> ChunkStream<B> {
    pub fn new(body: B, offset: u64, length: u64) -> Self {
        ChunkStream {
            state: StreamState::Seek { start: offset },
            remaining: length,
            body,
        }
    }
}

impl<B> ChunkStream<B> {
    /// Bytes still to be sent, assuming the source is long enough.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<B> std::fmt::Debug for ChunkStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("state", &self.state)
            .field("remaining", &self.remaining)
            .finish()
    }
}

#[pinned_drop]
impl<B> PinnedDrop for ChunkStream<B> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if *this.remaining > 0 && !matches!(this.state, StreamState::Done) {
            tracing::debug!(remaining = *this.remaining, "download abandoned");
        }
    }
}

impl<B: AsyncRead + AsyncSeekStart + Send + 'static> IntoResponse for ChunkStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: AsyncRead + AsyncSeekStart> Body for ChunkStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn is_end_stream(&self) -> bool {
        self.remaining == 0 || matches!(self.state, StreamState::Done)
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: AsyncRead + AsyncSeekStart> Stream for ChunkStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        if *this.remaining == 0 {
            *this.state = StreamState::Done;
            return Poll::Ready(None);
        }

        if let StreamState::Seek { start } = *this.state {
            match this.body.as_mut().start_seek(start) {
                Err(e) => {
                    *this.state = StreamState::Done;
                    return Poll::Ready(Some(Err(e)));
                }
                Ok(()) => { *this.state = StreamState::Seeking; }
            }
        }

        if let StreamState::Seeking = *this.state {
            match this.body.as_mut().poll_complete(cx) {
                Poll::Pending => { return Poll::Pending; }
                Poll::Ready(Err(e)) => {
                    *this.state = StreamState::Done;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Ok(())) => {
                    let buffer = allocate_buffer(*this.remaining);
                    *this.state = StreamState::Reading { buffer };
                }
            }
        }

        let buffer = match this.state {
            StreamState::Reading { buffer } => buffer,
            StreamState::Done => { return Poll::Ready(None); }
            // both seek states either advance to Reading above or return early
            StreamState::Seek { .. } | StreamState::Seeking => unreachable!(),
        };

        let uninit = buffer.spare_capacity_mut();

        // never more than one chunk, and never past the end of the interval
        let nbytes = cmp::min(
            cmp::min(uninit.len(), CHUNK_SIZE),
            usize::try_from(*this.remaining).unwrap_or(usize::MAX),
        );

        let mut read_buf = ReadBuf::uninit(&mut uninit[..nbytes]);

        match this.body.as_mut().poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => {
                *this.state = StreamState::Done;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Ok(())) => match read_buf.filled().len() {
                0 => {
                    tracing::debug!(remaining = *this.remaining, "source ended early");
                    *this.state = StreamState::Done;
                    Poll::Ready(None)
                }
                n => {
                    // SAFETY: poll_read has initialized `n` more bytes of the
                    // spare capacity, and `buffer.len()` is 0 here
                    unsafe { buffer.set_len(buffer.len() + n); }

                    // n <= remaining because of the cmp::min above
                    *this.remaining -= n as u64;

                    let next = allocate_buffer(*this.remaining);
                    let chunk = mem::replace(buffer, next);
                    Poll::Ready(Some(Ok(chunk.freeze())))
                }
            },
        }
    }
}

fn allocate_buffer(remaining: u64) -> BytesMut {
    let capacity = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| cmp::min(r, CHUNK_SIZE));
    BytesMut::with_capacity(capacity)
}
