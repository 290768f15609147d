use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::RunFlags;
use crate::media::filter::read_chunk;
use crate::queue::BoundedQueue;

/// Moves forward-path PCM from the capture source into the ingest queue.
///
/// Every queue entry is exactly `chunk_bytes` long. A short read (the source
/// is flushing or closing) is zero-padded and followed by one full chunk of
/// silence. When the queue is full the oldest entry is evicted; the consumer
/// never holds up the camera.
pub struct IngestWorker {
    source: Box<dyn Read + Send>,
    queue: Arc<BoundedQueue<Vec<u8>>>,
    chunk_bytes: usize,
    push_timeout: Duration,
    flags: RunFlags,
}

impl IngestWorker {
    pub fn new(
        source: Box<dyn Read + Send>,
        queue: Arc<BoundedQueue<Vec<u8>>>,
        chunk_bytes: usize,
        push_timeout: Duration,
        flags: RunFlags,
    ) -> Self {
        Self {
            source,
            queue,
            chunk_bytes: chunk_bytes.max(1),
            push_timeout,
            flags,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("ingest".into())
            .spawn(move || self.run())
    }

    /// Run until the source closes or the run stops. Returns chunks read.
    pub fn run(mut self) -> u64 {
        tracing::info!(chunk_bytes = self.chunk_bytes, "starting audio ingest");
        let mut chunks: u64 = 0;

        while self.flags.is_running() {
            let mut chunk = vec![0u8; self.chunk_bytes];
            let read = match read_chunk(&mut self.source, &mut chunk) {
                Ok(0) => {
                    tracing::warn!("no audio data from capture source, ingest stopping");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    if !self.flags.is_running() {
                        break;
                    }
                    tracing::error!(error = %e, "error reading doorbell audio");
                    self.flags.sleep(self.push_timeout);
                    continue;
                }
            };

            self.push(chunk);
            if read < self.chunk_bytes {
                tracing::debug!(read, "short read, flushing with silence");
                self.push(vec![0u8; self.chunk_bytes]);
            }

            chunks += 1;
            if chunks % 100 == 0 {
                tracing::info!(chunks, queued = self.queue.len(), "processed audio chunks");
            }
        }

        tracing::info!(chunks, "audio ingest stopped");
        chunks
    }

    fn push(&self, chunk: Vec<u8>) {
        match self.queue.force_push(chunk, self.push_timeout) {
            Ok(Some(_)) => tracing::debug!("ingest queue full, dropped oldest chunk"),
            Ok(None) => {}
            Err(_) => tracing::warn!("ingest queue full, dropping audio chunk"),
        }
    }
}
