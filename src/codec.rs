//! Reassembly of frames from the raw byte stream read off the USB stick.
//!
//! Wire format:
//! ```text
//! ┌──────┬────────┬────────┬─────────────────┬──────────┐
//! │ 0xA4 │ len N  │ msg id │ payload (N B)   │ XOR sum  │
//! └──────┴────────┴────────┴─────────────────┴──────────┘
//! ```
//!
//! A single USB read may return part of a frame or several frames back to
//! back. Bytes before a sync byte are skipped; a frame with a bad checksum is
//! dropped and the search for the next sync byte resumes one byte later.

use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tracing::warn;

use crate::protocol::{checksum, SYNC};

/// Largest payload length the radio emits
const MAX_PAYLOAD: usize = 32;

/// Streaming frame decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete, checksum-valid frame
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            let start = self.buf.iter().position(|&b| b == SYNC)?;
            self.buf.advance(start);

            if self.buf.len() < 2 {
                return None;
            }

            let length = usize::from(self.buf[1]);
            if length == 0 || length > MAX_PAYLOAD {
                self.buf.advance(1);
                continue;
            }

            let total = length + 4;
            if self.buf.len() < total {
                return None;
            }

            if checksum(&self.buf[..total - 1]) == self.buf[total - 1] {
                return Some(self.buf.split_to(total).freeze());
            }

            warn!("Dropping frame with bad checksum: {:02X?}", &self.buf[..total]);
            self.buf.advance(1);
        }
    }

    /// Number of buffered bytes not yet returned as frames
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Turn a stream of raw byte chunks into a stream of frames
pub fn frame_stream<S>(chunks: S) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Bytes> + Unpin + Send,
{
    stream::unfold(
        (chunks, FrameDecoder::new()),
        |(mut chunks, mut decoder)| async move {
            loop {
                if let Some(frame) = decoder.next_frame() {
                    return Some((frame, (chunks, decoder)));
                }
                let chunk = chunks.next().await?;
                decoder.extend(&chunk);
            }
        },
    )
}
