//! Progress-reporting response body for file downloads.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::Take;
use tokio_util::io::ReaderStream;

use crate::store::{TransferId, TransferStore};

/// Wraps the file reader stream and reports every chunk to the store.
///
/// A clean end of stream marks the transfer complete. If the client
/// disconnects, hyper drops the body mid-stream and the store entry
/// simply freezes at its last reported progress — a stalled download
/// stays observable instead of vanishing.
pub struct ProgressBody {
    inner: ReaderStream<Take<File>>,
    store: TransferStore,
    id: TransferId,
    sent: u64,
    finished: bool,
}

impl ProgressBody {
    pub fn new(reader: Take<File>, capacity: usize, store: TransferStore, id: TransferId) -> Self {
        Self {
            inner: ReaderStream::with_capacity(reader, capacity),
            store,
            id,
            sent: 0,
            finished: false,
        }
    }
}

impl Stream for ProgressBody {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                this.store.report_download_progress(this.id, this.sent);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                tracing::warn!(id = this.id, "read failed mid-download: {err}");
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if !this.finished {
                    this.finished = true;
                    this.store.complete_download(this.id);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
