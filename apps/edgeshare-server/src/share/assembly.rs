//! Streaming reassembly of a finalized file
//!
//! Chunks are read one at a time, in index order. Each chunk is held in
//! memory until its digest checks out and only then forwarded, so at most
//! one chunk is buffered and a corrupt chunk never reaches the client.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use sha2::{Digest, Sha256};

use crate::error::GoneReason;
use crate::storage::{BlobRead, BlobStore, ByteStream};

use super::cleanup::Cleanup;
use super::types::FileSession;

struct AssemblyState {
    blobs: Arc<dyn BlobStore>,
    cleanup: Cleanup,
    session: FileSession,
    next_index: usize,
    finished: bool,
}

enum Step {
    Emit(Bytes),
    Fail(io::Error),
    Done,
}

impl AssemblyState {
    async fn step(&mut self) -> Step {
        let Some(key) = self.session.chunk_keys.get(self.next_index).cloned() else {
            return Step::Done;
        };
        let index = self.next_index;
        self.next_index += 1;

        let body = match self.blobs.open(&key).await {
            Ok(BlobRead::Present(body)) => body,
            Ok(BlobRead::Absent) => {
                tracing::warn!(
                    file_id = %self.session.id,
                    chunk_index = index,
                    "Chunk evicted during download"
                );
                self.cleanup
                    .purge(&self.session, GoneReason::ChunkMissing)
                    .await;
                return Step::Fail(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("chunk {} is no longer available", index),
                ));
            }
            Err(e) => {
                tracing::error!(
                    file_id = %self.session.id,
                    chunk_index = index,
                    error = %e,
                    "Failed to open chunk"
                );
                return Step::Fail(io::Error::new(io::ErrorKind::Other, e.to_string()));
            }
        };

        match read_chunk(body).await {
            Ok((bytes, digest)) => match self.verify(index, digest) {
                Ok(()) => Step::Emit(bytes),
                Err(e) => Step::Fail(e),
            },
            Err(e) => Step::Fail(e),
        }
    }

    fn verify(&self, index: usize, actual: String) -> io::Result<()> {
        let Some(expected) = self.session.chunk_digest(index) else {
            return Ok(());
        };

        if actual == expected {
            return Ok(());
        }

        tracing::error!(
            file_id = %self.session.id,
            chunk_index = index,
            expected = %expected,
            actual = %actual,
            "Chunk digest mismatch"
        );
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("chunk {} failed integrity check", index),
        ))
    }
}

/// Collect one chunk body and its hex SHA-256.
async fn read_chunk(mut body: ByteStream) -> io::Result<(Bytes, String)> {
    let mut buf = BytesMut::new();
    let mut hasher = Sha256::new();
    while let Some(frame) = body.next().await {
        let frame = frame?;
        hasher.update(&frame);
        buf.extend_from_slice(&frame);
    }
    Ok((buf.freeze(), hex::encode(hasher.finalize())))
}

/// Lazily concatenate a session's chunks into one byte stream.
///
/// The stream ends with an error if a chunk vanishes or fails its digest,
/// and yields nothing further after an error.
pub fn assemble(blobs: Arc<dyn BlobStore>, cleanup: Cleanup, session: FileSession) -> ByteStream {
    let state = AssemblyState {
        blobs,
        cleanup,
        session,
        next_index: 0,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        match state.step().await {
            Step::Emit(bytes) => Some((Ok(bytes), state)),
            Step::Fail(e) => {
                state.finished = true;
                Some((Err(e), state))
            }
            Step::Done => None,
        }
    })
    .boxed()
}
