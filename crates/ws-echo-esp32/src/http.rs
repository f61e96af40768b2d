//! The `/ws` endpoint on the ESP-IDF HTTP server.
//!
//! [`EspWsTransport`] adapts `EspHttpWsConnection` to [`FrameTransport`] so
//! the shared [`EchoHandler`] runs unchanged on the device.

use std::sync::Arc;

use embedded_svc::ws::FrameType;
use esp_idf_svc::http::server::{ws::EspHttpWsConnection, Configuration, EspHttpServer};
use esp_idf_svc::sys::{esp_err_t, EspError, ESP_ERR_INVALID_ARG, ESP_ERR_NO_MEM, ESP_FAIL};
use log::info;
use ws_echo_core::{
    EchoHandler, FrameHeader, FrameKind, FrameTransport, HandlerError, LedPin, Phase, ECHO_PATH,
    LOG_TARGET,
};

/// One handler invocation's view of a WebSocket session.
pub struct EspWsTransport<'a> {
    ws: &'a mut EspHttpWsConnection,
}

impl<'a> EspWsTransport<'a> {
    pub fn new(ws: &'a mut EspHttpWsConnection) -> Self {
        Self { ws }
    }
}

/// Text lengths reported by the server include a NUL terminator.
fn payload_len(kind: FrameKind, reported: usize) -> usize {
    reported.saturating_sub(kind.headroom())
}

/// Kind and final-fragment flag of a received frame.
fn frame_kind(frame_type: FrameType) -> (FrameKind, bool) {
    match frame_type {
        FrameType::Text(fragmented) => (FrameKind::Text, !fragmented),
        FrameType::Binary(fragmented) => (FrameKind::Binary, !fragmented),
        FrameType::Continue(fin) => (FrameKind::Continuation, fin),
        FrameType::Ping => (FrameKind::Ping, true),
        FrameType::Pong => (FrameKind::Pong, true),
        FrameType::Close | FrameType::SocketClose => (FrameKind::Close, true),
    }
}

/// Inverse of [`frame_kind`] for the frames the handler echoes.
fn echo_type(frame: FrameHeader) -> Option<FrameType> {
    match frame.kind {
        FrameKind::Text => Some(FrameType::Text(!frame.fin)),
        FrameKind::Binary => Some(FrameType::Binary(!frame.fin)),
        FrameKind::Continuation => Some(FrameType::Continue(frame.fin)),
        FrameKind::Ping | FrameKind::Pong | FrameKind::Close => None,
    }
}

impl FrameTransport for EspWsTransport<'_> {
    type Error = EspError;

    fn phase(&self) -> Phase {
        if self.ws.is_new() {
            Phase::Handshake
        } else if self.ws.is_closed() {
            Phase::Closed
        } else {
            Phase::Data
        }
    }

    fn probe(&mut self) -> Result<FrameHeader, EspError> {
        let (frame_type, reported) = self.ws.recv(&mut [])?;
        let (kind, fin) = frame_kind(frame_type);
        Ok(FrameHeader::fragment(kind, payload_len(kind, reported), fin))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EspError> {
        let (frame_type, reported) = self.ws.recv(buf)?;
        let (kind, _) = frame_kind(frame_type);
        Ok(payload_len(kind, reported))
    }

    fn send(&mut self, frame: FrameHeader, payload: &[u8]) -> Result<(), EspError> {
        let Some(frame_type) = echo_type(frame) else {
            return Err(EspError::from_infallible::<{ ESP_ERR_INVALID_ARG as esp_err_t }>());
        };
        self.ws.send(frame_type, payload)
    }
}

/// Status code the server sees for a failed handler call.
pub fn status_of(err: HandlerError<EspError>) -> EspError {
    match err {
        HandlerError::Probe(e) | HandlerError::Read { error: e, .. } | HandlerError::Send(e) => e,
        HandlerError::Allocation { .. } => {
            EspError::from_infallible::<{ ESP_ERR_NO_MEM as esp_err_t }>()
        }
        HandlerError::ShortRead { .. } => EspError::from_infallible::<{ ESP_FAIL as esp_err_t }>(),
    }
}

/// Start the HTTP server on `port` with the echo handler on `/ws`.
///
/// Control frames are left to the server, so ping/pong and close never reach
/// the handler as data.
pub fn start_server<P>(
    port: u16,
    handler: Arc<EchoHandler<P>>,
) -> Result<EspHttpServer<'static>, EspError>
where
    P: LedPin + 'static,
{
    let mut server = EspHttpServer::new(&Configuration {
        http_port: port,
        ..Default::default()
    })?;

    info!(target: LOG_TARGET, "Registering URI handlers");
    server.ws_handler(ECHO_PATH, move |ws: &mut EspHttpWsConnection| {
        let mut transport = EspWsTransport::new(ws);
        handler.handle(&mut transport).map(|_| ()).map_err(status_of)
    })?;

    info!(target: LOG_TARGET, "Echo endpoint ready at ws://<ip>:{}{}", port, ECHO_PATH);
    Ok(server)
}
