//! Cursor management for a single shard read.
//!
//! A [`StreamHandle`] starts without a cursor. The first read asks the
//! transport for an initial cursor at the handle's start position; every
//! fetch then hands back the cursor for the next batch, which replaces the
//! old one. A closed shard eventually returns no next cursor, at which point
//! the handle is marked exhausted and stays that way until it is reset.
//!
//! ```text
//!            reset_cursor
//!   ┌──────────────────────────────┐
//!   ▼                              │
//! Unset ──ensure_cursor──▶ At(token) ──advance(Some)──▶ At(next)
//!                              │
//!                              └──advance(None)──▶ Exhausted
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::stream::{CursorState, ShardIterator, StreamHandle};
use crate::transport::RecordTransport;

/// Moves the cursor of stream handles.
#[derive(Clone)]
pub struct CursorManager {
    transport: Arc<dyn RecordTransport>,
}

impl CursorManager {
    pub fn new(transport: Arc<dyn RecordTransport>) -> Self {
        Self { transport }
    }

    /// Forget the handle's read position, including an exhausted marker.
    pub fn reset_cursor(&self, handle: &mut StreamHandle) {
        handle.cursor = CursorState::Unset;
    }

    /// Acquire the initial cursor if the handle has none.
    ///
    /// Fails with [`ClientError::ShardExhausted`] once the shard has been
    /// read to its end, and with [`ClientError::CursorAcquisition`] when the
    /// transport refuses the request. Neither is retried.
    pub async fn ensure_cursor(&self, handle: &mut StreamHandle) -> Result<ShardIterator> {
        match &handle.cursor {
            CursorState::At(token) => return Ok(token.clone()),
            CursorState::Exhausted => {
                return Err(ClientError::ShardExhausted {
                    stream: handle.name().to_string(),
                    shard: handle.shard_id().to_string(),
                })
            }
            CursorState::Unset => {}
        }

        let token = self
            .transport
            .initial_cursor(handle.name(), handle.shard_id(), handle.start())
            .await
            .map_err(|source| ClientError::CursorAcquisition {
                stream: handle.name().to_string(),
                shard: handle.shard_id().to_string(),
                source,
            })?;

        debug!(
            stream = %handle.name(),
            shard = %handle.shard_id(),
            start = %handle.start(),
            "Acquired initial cursor"
        );

        handle.cursor = CursorState::At(token.clone());
        Ok(token)
    }

    /// Replace the cursor with the one returned by the last fetch.
    pub fn advance(&self, handle: &mut StreamHandle, next: Option<ShardIterator>) {
        handle.cursor = match next {
            Some(token) => CursorState::At(token),
            None => {
                debug!(
                    stream = %handle.name(),
                    shard = %handle.shard_id(),
                    "Shard closed, cursor exhausted"
                );
                CursorState::Exhausted
            }
        };
    }

    pub(crate) fn transport(&self) -> &Arc<dyn RecordTransport> {
        &self.transport
    }
}
