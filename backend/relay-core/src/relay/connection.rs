//! Line-framed JSON over a byte stream.

use crate::error::handler::HandlerError;

use common::ErrorLocation;

use std::panic::Location;

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf, split,
};

/// Longest line accepted from a peer, excluding the newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// What [`PeerConnection::peek_status`] saw on the read side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    /// Connected, nothing sent.
    Idle,
    /// End of stream or a read error.
    Closed,
    /// Bytes are waiting that nobody asked for.
    Unsolicited,
}

/// One peer connection, read and written a JSON line at a time.
pub struct PeerConnection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S> PeerConnection<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S) -> Self {
        let (reader, writer) = split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Read and parse the next line.
    ///
    /// Returns `Ok(None)` on a clean end of stream.
    ///
    /// # Errors
    ///
    /// - [`HandlerError::Read`] - transport failure or oversized line
    /// - [`HandlerError::Json`] - the line is not valid JSON
    pub async fn read_message(&mut self) -> Result<Option<Value>, HandlerError> {
        let mut line = String::new();
        let limit = (MAX_LINE_BYTES + 1) as u64;

        let read = (&mut self.reader)
            .take(limit)
            .read_line(&mut line)
            .await
            .map_err(|e| HandlerError::Read {
                message: format!("Failed to read line from peer: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if read == 0 {
            return Ok(None);
        }

        if !line.ends_with('\n') && read > MAX_LINE_BYTES {
            return Err(HandlerError::Read {
                message: format!("Peer line exceeds {MAX_LINE_BYTES} bytes"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let value = serde_json::from_str(line.trim_end())?;
        Ok(Some(value))
    }

    /// Serialize `message` and write it as one line.
    ///
    /// # Errors
    ///
    /// - [`HandlerError::Json`] - serialization failed
    /// - [`HandlerError::Send`] - the write or flush failed
    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> Result<(), HandlerError> {
        let mut bytes = serde_json::to_vec(message)?;
        bytes.push(b'\n');

        self.writer
            .write_all(&bytes)
            .await
            .map_err(|e| HandlerError::Send {
                message: format!("Failed to write line to peer: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        self.writer.flush().await.map_err(|e| HandlerError::Send {
            message: format!("Failed to flush peer connection: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Check the read side without waiting.
    ///
    /// Unread data stays buffered for the next [`read_message`](Self::read_message).
    /// A read error counts as closed; "nothing to read yet" is idle.
    pub fn peek_status(&mut self) -> PeerStatus {
        match self.reader.fill_buf().now_or_never() {
            Some(Ok([])) => PeerStatus::Closed,
            Some(Ok(_)) => PeerStatus::Unsolicited,
            Some(Err(_)) => PeerStatus::Closed,
            None => PeerStatus::Idle,
        }
    }

    /// Shut down the write side.
    pub async fn shutdown(&mut self) -> Result<(), HandlerError> {
        self.writer.shutdown().await.map_err(HandlerError::from)
    }
}
