//! Upload progress reporting.
//!
//! [`ProgressStream`] sits between a byte source and the HTTP body. Every
//! chunk that passes through bumps a running total and the callback sees an
//! [`UploadProgress`] with the new value.

use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use apkforge_protocol::{ProgressCallback, UploadProgress};
use futures_util::Stream;
use tokio_util::io::ReaderStream;

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Stream adapter that reports how many bytes have been yielded so far.
pub struct ProgressStream<S> {
    inner: S,
    transferred: u64,
    total: u64,
    on_progress: ProgressCallback,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, total: u64, on_progress: ProgressCallback) -> Self {
        Self {
            inner,
            transferred: 0,
            total,
            on_progress,
        }
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl<S, B, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<B, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.transferred += chunk.as_ref().len() as u64;
                (this.on_progress)(UploadProgress::new(this.transferred, this.total));
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Opens `path` as a chunked stream that reports progress as it is read.
///
/// The total is the file size at open time. An initial report of zero bytes
/// is sent before any data moves.
pub async fn open_progress_stream(
    path: &Path,
    on_progress: ProgressCallback,
) -> Result<ProgressStream<ReaderStream<tokio::fs::File>>, TransferError> {
    let file = tokio::fs::File::open(path).await?;
    let total = file.metadata().await?.len();
    on_progress(UploadProgress::new(0, total));
    let reader = ReaderStream::with_capacity(file, DEFAULT_CHUNK_SIZE);
    Ok(ProgressStream::new(reader, total, on_progress))
}
