//! WebSocket frame metadata and the transport seam.
//!
//! `FrameTransport` mirrors the ESP-IDF `httpd_ws_recv_frame` contract: a
//! zero-length probe reports the pending frame's type and length, then a
//! sized read fetches the payload. The Linux server adapts tungstenite to the
//! same two calls.

use std::fmt;

/// WebSocket frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// UTF-8 text frame.
    Text,
    /// Binary frame.
    Binary,
    /// Later fragment of a text or binary message.
    Continuation,
    /// Ping control frame.
    Ping,
    /// Pong control frame.
    Pong,
    /// Close control frame.
    Close,
}

impl FrameKind {
    /// Control frames are answered by the server library, not echoed.
    pub fn is_control(self) -> bool {
        matches!(self, FrameKind::Ping | FrameKind::Pong | FrameKind::Close)
    }

    /// Bytes reserved after the payload for a terminator.
    pub fn headroom(self) -> usize {
        match self {
            FrameKind::Text => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Text => "text",
            FrameKind::Binary => "binary",
            FrameKind::Continuation => "continuation",
            FrameKind::Ping => "ping",
            FrameKind::Pong => "pong",
            FrameKind::Close => "close",
        };
        f.write_str(name)
    }
}

/// Result of a probe read.
///
/// Servers that do not reassemble fragmented messages hand over one fragment
/// per frame; `fin` tells whether it is the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: FrameKind,
    /// Payload length in bytes, excluding any terminator.
    pub len: usize,
    /// Final fragment of its message.
    pub fin: bool,
}

impl FrameHeader {
    /// A complete, unfragmented frame.
    pub fn new(kind: FrameKind, len: usize) -> Self {
        Self::fragment(kind, len, true)
    }

    pub fn fragment(kind: FrameKind, len: usize, fin: bool) -> Self {
        Self { kind, len, fin }
    }
}

/// Why the server invoked the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Upgrade request (HTTP GET); no frame is pending.
    Handshake,
    /// A frame is waiting in the transport buffer.
    Data,
    /// The connection has been closed.
    Closed,
}

/// One connection event as seen by the echo handler.
pub trait FrameTransport {
    /// Error raised by the transport; carries the underlying status code.
    type Error: fmt::Debug + fmt::Display;

    /// Phase of the current invocation.
    fn phase(&self) -> Phase;

    /// Zero-length read: learn the pending frame's type and length.
    fn probe(&mut self) -> Result<FrameHeader, Self::Error>;

    /// Read the pending payload into `buf`, returning the bytes written.
    ///
    /// `buf` is at least as long as the probed length.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Send `payload` on the same connection as a frame with the type and
    /// fragmentation of `frame`.
    fn send(&mut self, frame: FrameHeader, payload: &[u8]) -> Result<(), Self::Error>;
}
