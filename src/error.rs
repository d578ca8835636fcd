// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the device tracker.
//!
//! Failures fall into three groups: transport errors raised while talking to
//! the ADB server ([`ProtocolError`]), malformed replies ([`ParseError`]) and
//! tracker-level failures such as an escalated connection loss or a
//! subscriber that panicked during dispatch.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while talking to the ADB server.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a server reply.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The tracked connection ended before a complete reply was read.
    ///
    /// This is raised by the tracker read loop on top of the `error` event
    /// so that an unexpected disconnect is never silent.
    #[error("connection closed")]
    ConnectionClosed,

    /// A subscriber callback panicked while an event was being dispatched.
    #[error("subscriber panicked: {0}")]
    SubscriberPanicked(String),

    /// The tracker task terminated abnormally.
    #[error("tracker task failed: {0}")]
    TaskFailed(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns `true` if this error reports a connection that ended in the
    /// middle of a reply.
    #[must_use]
    pub fn is_premature_eof(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::PrematureEof { .. }))
    }

    /// Returns `true` if this error was caused by closing the connection
    /// locally.
    #[must_use]
    pub fn is_closed_locally(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::Closed))
    }
}

/// Errors related to the ADB host protocol and its transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O failure on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection to the server failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connecting timed out.
    #[error("connection timed out after {0} ms")]
    Timeout(u64),

    /// The connection ended before the expected number of bytes arrived.
    #[error("premature end of stream: expected {expected} bytes, received {received}")]
    PrematureEof {
        /// Number of bytes the reader was waiting for.
        expected: usize,
        /// Number of bytes actually received before the stream ended.
        received: usize,
    },

    /// The server rejected the request.
    #[error("server replied FAIL: {0}")]
    Fail(String),

    /// The server sent something other than a status word.
    #[error("unexpected reply {got:?}, expected {expected}")]
    UnexpectedReply {
        /// What the reader was expecting.
        expected: &'static str,
        /// What was received instead.
        got: String,
    },

    /// A length prefix was not four hexadecimal digits.
    #[error("invalid length prefix: {0:?}")]
    InvalidLength(String),

    /// The connection was closed from this side.
    #[error("connection closed locally")]
    Closed,
}

/// Errors related to parsing server replies.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A payload was not valid UTF-8.
    #[error("invalid UTF-8 in reply: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A device list line did not contain a serial and a status.
    #[error("malformed device line: {0:?}")]
    MalformedDeviceLine(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premature_eof_display() {
        let err = ProtocolError::PrematureEof {
            expected: 4,
            received: 1,
        };
        assert_eq!(
            err.to_string(),
            "premature end of stream: expected 4 bytes, received 1"
        );
    }

    #[test]
    fn premature_eof_classification() {
        let err: Error = ProtocolError::PrematureEof {
            expected: 4,
            received: 0,
        }
        .into();
        assert!(err.is_premature_eof());
        assert!(!err.is_closed_locally());

        let err: Error = ProtocolError::Closed.into();
        assert!(!err.is_premature_eof());
        assert!(err.is_closed_locally());
    }

    #[test]
    fn io_error_is_not_premature_eof() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: Error = ProtocolError::from(io).into();
        assert!(!err.is_premature_eof());
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::MalformedDeviceLine("garbage".to_string());
        assert_eq!(err.to_string(), "malformed device line: \"garbage\"");
    }

    #[test]
    fn fail_display() {
        let err = ProtocolError::Fail("unknown host service".to_string());
        assert_eq!(err.to_string(), "server replied FAIL: unknown host service");
    }
}
