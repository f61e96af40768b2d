//! Blocking WebSocket connection exposed through [`FrameTransport`].
//!
//! tungstenite reads whole messages, so the connection keeps the last data
//! message pending: `probe` reports its type and length without consuming
//! it and `read` hands out the payload. Control frames are answered by
//! tungstenite and never reach the handler.

use std::io::{Read, Write};

use thiserror::Error;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, HandshakeError, Message, WebSocket};
use tracing::debug;
use ws_echo_core::{FrameHeader, FrameKind, FrameTransport, Phase};

/// Errors raised by a WebSocket connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The upgrade request was rejected or malformed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The underlying WebSocket failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// `probe` or `read` was called with no data frame pending.
    #[error("no frame pending")]
    NoPendingFrame,

    /// A text echo was requested for bytes that are not UTF-8.
    #[error("text payload is not valid UTF-8")]
    InvalidUtf8,

    /// Only data frames can be sent.
    #[error("cannot send {0} frame")]
    Unsupported(FrameKind),

    /// Messages are sent whole; tungstenite never hands out fragments.
    #[error("cannot send a partial frame")]
    Fragmented,
}

/// One accepted WebSocket connection.
pub struct WsConnection<S> {
    socket: WebSocket<S>,
    phase: Phase,
    pending: Option<Message>,
}

impl<S: Read + Write> WsConnection<S> {
    /// Complete the upgrade handshake, rejecting any path but `path` with 404.
    pub fn accept(stream: S, path: &str) -> Result<Self, TransportError> {
        let callback = |req: &Request, resp: Response| {
            if req.uri().path() == path {
                return Ok(resp);
            }
            debug!(path = req.uri().path(), "Rejecting upgrade for unknown path");
            let mut reject = ErrorResponse::new(Some(format!("no endpoint at {}", req.uri().path())));
            *reject.status_mut() = StatusCode::NOT_FOUND;
            Err(reject)
        };

        let socket = tungstenite::accept_hdr(stream, callback).map_err(|e| match e {
            HandshakeError::Failure(err) => TransportError::Handshake(err.to_string()),
            HandshakeError::Interrupted(_) => {
                TransportError::Handshake("stream would block during handshake".to_string())
            }
        })?;

        Ok(Self::from_socket(socket))
    }

    /// Wrap an already upgraded socket. The first phase is `Handshake`.
    pub fn from_socket(socket: WebSocket<S>) -> Self {
        Self {
            socket,
            phase: Phase::Handshake,
            pending: None,
        }
    }

    /// Block until the next data frame arrives.
    ///
    /// Returns `false` once the peer has closed the connection; the phase is
    /// then `Closed`.
    pub fn next_frame(&mut self) -> Result<bool, TransportError> {
        self.pending = None;
        loop {
            match self.socket.read() {
                Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                    self.pending = Some(msg);
                    self.phase = Phase::Data;
                    return Ok(true);
                }
                // Keep reading so tungstenite flushes the close reply.
                Ok(Message::Close(_)) => continue,
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed
                    | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake),
                ) => {
                    self.phase = Phase::Closed;
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close the connection after a failed handler call.
    pub fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
        self.phase = Phase::Closed;
    }
}

impl<S: Read + Write> FrameTransport for WsConnection<S> {
    type Error = TransportError;

    fn phase(&self) -> Phase {
        self.phase
    }

    fn probe(&mut self) -> Result<FrameHeader, TransportError> {
        match &self.pending {
            Some(Message::Text(text)) => Ok(FrameHeader::new(FrameKind::Text, text.len())),
            Some(Message::Binary(data)) => Ok(FrameHeader::new(FrameKind::Binary, data.len())),
            _ => Err(TransportError::NoPendingFrame),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let payload = match self.pending.take() {
            Some(Message::Text(text)) => text.into_bytes(),
            Some(Message::Binary(data)) => data,
            _ => return Err(TransportError::NoPendingFrame),
        };
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        Ok(n)
    }

    fn send(&mut self, frame: FrameHeader, payload: &[u8]) -> Result<(), TransportError> {
        if !frame.fin {
            return Err(TransportError::Fragmented);
        }
        let msg = match frame.kind {
            FrameKind::Text => {
                let text =
                    String::from_utf8(payload.to_vec()).map_err(|_| TransportError::InvalidUtf8)?;
                Message::Text(text)
            }
            FrameKind::Binary => Message::Binary(payload.to_vec()),
            other => return Err(TransportError::Unsupported(other)),
        };
        self.socket.send(msg)?;
        Ok(())
    }
}
