// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request/reply framing of the ADB host protocol.
//!
//! Requests are ASCII strings prefixed with their length as four hexadecimal
//! digits (`000Chost:devices`). The server answers with a four byte status,
//! `OKAY` or `FAIL`; a `FAIL` is followed by a length-prefixed message.
//! Values are sent the same way as requests.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

use super::ConnectionCloser;

const OKAY: &[u8; 4] = b"OKAY";
const FAIL: &[u8; 4] = b"FAIL";

/// Largest request the four digit length prefix can describe.
const MAX_REQUEST_LEN: usize = 0xFFFF;

/// A connection to an ADB server.
///
/// Every read races the connection's [`ConnectionCloser`]: once the closer
/// fires, a pending read returns [`ProtocolError::Closed`].
///
/// # Examples
///
/// ```
/// use adb_tracker::protocol::AdbConnection;
/// use tokio::io::AsyncWriteExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), adb_tracker::ProtocolError> {
/// let (client, mut server) = tokio::io::duplex(64);
/// let mut connection = AdbConnection::new(client);
///
/// server.write_all(b"OKAY0005hello").await?;
/// connection.read_status().await?;
/// assert_eq!(connection.read_value().await?, b"hello");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AdbConnection<S> {
    stream: S,
    closer: ConnectionCloser,
}

impl<S> AdbConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an established stream.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closer: ConnectionCloser::new(),
        }
    }

    /// Returns a handle that closes this connection.
    #[must_use]
    pub fn closer(&self) -> ConnectionCloser {
        self.closer.clone()
    }

    /// Returns `true` once the connection has been closed locally.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Sends a length-prefixed request.
    ///
    /// # Errors
    ///
    /// Returns error if the request is too long, the connection was closed
    /// or the write fails.
    pub async fn send(&mut self, request: &str) -> Result<(), ProtocolError> {
        if request.len() > MAX_REQUEST_LEN {
            return Err(ProtocolError::InvalidLength(format!(
                "request of {} bytes",
                request.len()
            )));
        }
        if self.closer.is_closed() {
            return Err(ProtocolError::Closed);
        }

        tracing::debug!(request = %request, "Sending ADB request");

        let framed = format!("{:04x}{request}", request.len());
        self.stream.write_all(framed.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads the `OKAY`/`FAIL` status word.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Fail`] with the server message on `FAIL`,
    /// [`ProtocolError::UnexpectedReply`] on anything else.
    pub async fn read_status(&mut self) -> Result<(), ProtocolError> {
        let status = self.read_exact_bytes(4).await?;
        match status.as_slice() {
            s if s == OKAY => Ok(()),
            s if s == FAIL => {
                let message = self.read_value().await?;
                Err(ProtocolError::Fail(
                    String::from_utf8_lossy(&message).into_owned(),
                ))
            }
            other => Err(ProtocolError::UnexpectedReply {
                expected: "OKAY or FAIL",
                got: String::from_utf8_lossy(other).into_owned(),
            }),
        }
    }

    /// Sends a request and waits for `OKAY`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send) and [`read_status`](Self::read_status).
    pub async fn request(&mut self, request: &str) -> Result<(), ProtocolError> {
        self.send(request).await?;
        self.read_status().await
    }

    /// Reads one length-prefixed value.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PrematureEof`] if the stream ends before the
    /// value is complete, [`ProtocolError::InvalidLength`] on a malformed
    /// prefix.
    pub async fn read_value(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let prefix = self.read_exact_bytes(4).await?;
        let len = parse_length(&prefix)?;
        self.read_exact_bytes(len).await
    }

    /// Reads exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PrematureEof`] if the stream ends first and
    /// [`ProtocolError::Closed`] if the connection is closed while waiting.
    pub async fn read_exact_bytes(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            let read = tokio::select! {
                biased;
                () = self.closer.closed() => return Err(ProtocolError::Closed),
                read = self.stream.read(&mut buf[filled..]) => read?,
            };
            if read == 0 {
                return Err(ProtocolError::PrematureEof {
                    expected: len,
                    received: filled,
                });
            }
            filled += read;
        }

        Ok(buf)
    }

    /// Closes the connection and shuts the stream down.
    ///
    /// # Errors
    ///
    /// Returns error if the stream shutdown fails.
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.closer.close();
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Parses a four hexadecimal digit length prefix.
fn parse_length(prefix: &[u8]) -> Result<usize, ProtocolError> {
    let invalid = || ProtocolError::InvalidLength(String::from_utf8_lossy(prefix).into_owned());

    if prefix.len() != 4 || !prefix.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid());
    }
    let digits = std::str::from_utf8(prefix).map_err(|_| invalid())?;
    usize::from_str_radix(digits, 16).map_err(|_| invalid())
}
