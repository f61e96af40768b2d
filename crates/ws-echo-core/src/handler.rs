//! The echo handler.
//!
//! Invoked by the server once per WebSocket event on `/ws`. On a data event
//! it probes the pending frame, reads it into an exactly sized buffer, sends
//! the same frame back and toggles the LED once the send has succeeded.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::frame::{FrameHeader, FrameKind, FrameTransport, Phase};
use crate::led::{Led, LedPin, Level};
use crate::LOG_TARGET;

/// Tuning for the echo handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoConfig {
    /// Largest payload the handler will allocate for. `None` means unbounded.
    pub max_payload_len: Option<usize>,
}

/// What a single invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Upgrade accepted, nothing read.
    Accepted,
    /// Connection close acknowledged.
    Closed,
    /// Zero-length frame; nothing echoed, LED untouched.
    Empty,
    /// Control frame left to the server library.
    Ignored(FrameKind),
    /// Frame echoed and LED toggled to `led`.
    Echoed {
        kind: FrameKind,
        len: usize,
        led: Level,
    },
}

/// Failure of a single handler invocation.
///
/// None of these are retried. The server library decides what happens to
/// the connection.
#[derive(Debug, Error)]
pub enum HandlerError<E> {
    /// The zero-length probe failed.
    #[error("failed to get frame length: {0}")]
    Probe(E),

    /// No buffer could be obtained for the payload.
    #[error("cannot allocate buffer for {len} byte frame")]
    Allocation { len: usize },

    /// The payload read failed.
    #[error("failed to read {len} byte payload: {error}")]
    Read { len: usize, error: E },

    /// The transport delivered fewer bytes than the probe announced.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Sending the echo failed.
    #[error("failed to send echo frame: {0}")]
    Send(E),
}

impl<E> HandlerError<E> {
    /// The transport error behind this failure, if any.
    pub fn transport(&self) -> Option<&E> {
        match self {
            HandlerError::Probe(e) | HandlerError::Read { error: e, .. } | HandlerError::Send(e) => {
                Some(e)
            }
            HandlerError::Allocation { .. } | HandlerError::ShortRead { .. } => None,
        }
    }

    /// Allocation failures are the only ones not caused by the connection.
    pub fn is_allocation(&self) -> bool {
        matches!(self, HandlerError::Allocation { .. })
    }
}

/// Echo handler with the LED it toggles.
///
/// The LED is the only state that outlives an invocation. It sits behind a
/// mutex so handlers running for different connections toggle it one at a
/// time.
pub struct EchoHandler<P> {
    led: Mutex<Led<P>>,
    config: EchoConfig,
}

impl<P: LedPin> EchoHandler<P> {
    /// Create a handler around an initialized (off) LED.
    pub fn new(led: Led<P>, config: EchoConfig) -> Self {
        Self {
            led: Mutex::new(led),
            config,
        }
    }

    /// Current LED level.
    pub fn led_level(&self) -> Level {
        self.led.lock().unwrap_or_else(PoisonError::into_inner).level()
    }

    /// Handle one server event for a connection.
    pub fn handle<T: FrameTransport>(&self, conn: &mut T) -> Result<Outcome, HandlerError<T::Error>> {
        match conn.phase() {
            Phase::Handshake => {
                info!(target: LOG_TARGET, "Handshake done, new connection opened");
                return Ok(Outcome::Accepted);
            }
            Phase::Closed => {
                info!(target: LOG_TARGET, "Connection closed");
                return Ok(Outcome::Closed);
            }
            Phase::Data => {}
        }

        let header = conn.probe().map_err(|e| {
            error!(target: LOG_TARGET, "Failed to get frame len: {}", e);
            HandlerError::Probe(e)
        })?;

        if header.kind.is_control() {
            debug!(target: LOG_TARGET, "Ignoring {} frame", header.kind);
            return Ok(Outcome::Ignored(header.kind));
        }
        if header.len == 0 {
            debug!(target: LOG_TARGET, "Empty {} frame, nothing to echo", header.kind);
            return Ok(Outcome::Empty);
        }

        let mut buf = self.allocate(header)?;

        let read = conn.read(&mut buf).map_err(|e| {
            error!(target: LOG_TARGET, "Failed to read frame payload: {}", e);
            HandlerError::Read {
                len: header.len,
                error: e,
            }
        })?;
        if read < header.len {
            error!(
                target: LOG_TARGET,
                "Short read: expected {} bytes, got {}", header.len, read
            );
            return Err(HandlerError::ShortRead {
                expected: header.len,
                actual: read,
            });
        }

        let payload = &buf[..header.len];
        log_payload(header.kind, payload);

        if let Err(e) = conn.send(header, payload) {
            error!(target: LOG_TARGET, "Failed to send echo frame: {}", e);
            return Err(HandlerError::Send(e));
        }

        let led = self.toggle_led();
        Ok(Outcome::Echoed {
            kind: header.kind,
            len: header.len,
            led,
        })
    }

    /// Buffer of exactly `len` bytes plus the frame kind's headroom.
    fn allocate<E>(&self, header: FrameHeader) -> Result<Vec<u8>, HandlerError<E>> {
        let too_large = HandlerError::Allocation { len: header.len };

        if let Some(max) = self.config.max_payload_len {
            if header.len > max {
                error!(
                    target: LOG_TARGET,
                    "Frame of {} bytes exceeds limit of {}", header.len, max
                );
                return Err(too_large);
            }
        }

        let Some(size) = header.len.checked_add(header.kind.headroom()) else {
            return Err(too_large);
        };
        let mut buf = Vec::new();
        if buf.try_reserve_exact(size).is_err() {
            error!(target: LOG_TARGET, "Out of memory for {} byte frame", header.len);
            return Err(too_large);
        }
        buf.resize(size, 0);
        Ok(buf)
    }

    fn toggle_led(&self) -> Level {
        let mut led = self.led.lock().unwrap_or_else(PoisonError::into_inner);
        match led.toggle() {
            Ok(level) => level,
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to drive LED: {}", e);
                led.level()
            }
        }
    }
}

impl<P> fmt::Debug for EchoHandler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn log_payload(kind: FrameKind, payload: &[u8]) {
    match kind {
        FrameKind::Text => info!(target: LOG_TARGET, "Received: {}", String::from_utf8_lossy(payload)),
        _ => info!(target: LOG_TARGET, "Received {} byte {} frame", payload.len(), kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::tests::RecordingPin;
    use pretty_assertions::assert_eq;

    /// Scripted transport holding at most one pending frame.
    #[derive(Debug)]
    struct FakeTransport {
        phase: Phase,
        pending: Option<(FrameKind, Vec<u8>)>,
        fail_probe: bool,
        fail_read: bool,
        truncate_to: Option<usize>,
        fail_send: bool,
        read_buf_len: Option<usize>,
        fin: bool,
        sent: Vec<(FrameKind, Vec<u8>)>,
        sent_fin: Vec<bool>,
    }

    impl FakeTransport {
        fn with_phase(phase: Phase) -> Self {
            Self {
                phase,
                pending: None,
                fail_probe: false,
                fail_read: false,
                truncate_to: None,
                fail_send: false,
                read_buf_len: None,
                fin: true,
                sent: Vec::new(),
                sent_fin: Vec::new(),
            }
        }

        fn frame(kind: FrameKind, payload: &[u8]) -> Self {
            let mut t = Self::with_phase(Phase::Data);
            t.pending = Some((kind, payload.to_vec()));
            t
        }

        fn fragment(kind: FrameKind, payload: &[u8], fin: bool) -> Self {
            let mut t = Self::frame(kind, payload);
            t.fin = fin;
            t
        }

        fn text(payload: &str) -> Self {
            Self::frame(FrameKind::Text, payload.as_bytes())
        }
    }

    impl FrameTransport for FakeTransport {
        type Error = i32;

        fn phase(&self) -> Phase {
            self.phase
        }

        fn probe(&mut self) -> Result<FrameHeader, i32> {
            if self.fail_probe {
                return Err(-1);
            }
            let (kind, payload) = self.pending.as_ref().ok_or(-2)?;
            Ok(FrameHeader::fragment(*kind, payload.len(), self.fin))
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
            self.read_buf_len = Some(buf.len());
            if self.fail_read {
                return Err(-3);
            }
            let (_, payload) = self.pending.take().ok_or(-2)?;
            let n = self.truncate_to.unwrap_or(payload.len());
            buf[..n].copy_from_slice(&payload[..n]);
            Ok(n)
        }

        fn send(&mut self, frame: FrameHeader, payload: &[u8]) -> Result<(), i32> {
            if self.fail_send {
                return Err(-4);
            }
            self.sent.push((frame.kind, payload.to_vec()));
            self.sent_fin.push(frame.fin);
            Ok(())
        }
    }

    fn handler() -> EchoHandler<RecordingPin> {
        let led = Led::init(RecordingPin::default()).unwrap();
        EchoHandler::new(led, EchoConfig::default())
    }

    fn physical_level(handler: &EchoHandler<RecordingPin>) -> Option<Level> {
        handler.led.lock().unwrap().pin().physical()
    }

    #[test]
    fn test_handshake_accepts_without_reading() {
        let handler = handler();
        let mut conn = FakeTransport::with_phase(Phase::Handshake);
        // Probe would fail if it were called.
        conn.fail_probe = true;

        assert_eq!(handler.handle(&mut conn).unwrap(), Outcome::Accepted);
        assert!(conn.sent.is_empty());
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_closed_is_acknowledged() {
        let handler = handler();
        let mut conn = FakeTransport::with_phase(Phase::Closed);

        assert_eq!(handler.handle(&mut conn).unwrap(), Outcome::Closed);
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_hello_is_echoed_and_led_turns_on() {
        let handler = handler();
        let mut conn = FakeTransport::text("hello");

        let outcome = handler.handle(&mut conn).unwrap();

        assert_eq!(
            outcome,
            Outcome::Echoed {
                kind: FrameKind::Text,
                len: 5,
                led: Level::High,
            }
        );
        assert_eq!(conn.sent, vec![(FrameKind::Text, b"hello".to_vec())]);
        assert_eq!(conn.sent_fin, vec![true]);
        assert_eq!(physical_level(&handler), Some(Level::High));
    }

    #[test]
    fn test_text_buffer_has_terminator_headroom() {
        let handler = handler();
        let mut conn = FakeTransport::text("hello");
        handler.handle(&mut conn).unwrap();
        assert_eq!(conn.read_buf_len, Some(6));

        let mut conn = FakeTransport::frame(FrameKind::Binary, &[1, 2, 3]);
        handler.handle(&mut conn).unwrap();
        assert_eq!(conn.read_buf_len, Some(3));
    }

    #[test]
    fn test_binary_frame_keeps_its_type() {
        let handler = handler();
        let mut conn = FakeTransport::frame(FrameKind::Binary, &[0, 159, 146, 150]);

        handler.handle(&mut conn).unwrap();

        assert_eq!(conn.sent, vec![(FrameKind::Binary, vec![0, 159, 146, 150])]);
    }

    #[test]
    fn test_fragments_keep_type_and_final_flag() {
        let handler = handler();

        let mut first = FakeTransport::fragment(FrameKind::Text, b"hel", false);
        handler.handle(&mut first).unwrap();
        let mut rest = FakeTransport::fragment(FrameKind::Continuation, b"lo", true);
        handler.handle(&mut rest).unwrap();

        assert_eq!(first.sent, vec![(FrameKind::Text, b"hel".to_vec())]);
        assert_eq!(first.sent_fin, vec![false]);
        assert_eq!(rest.sent, vec![(FrameKind::Continuation, b"lo".to_vec())]);
        assert_eq!(rest.sent_fin, vec![true]);
        assert_eq!(rest.read_buf_len, Some(2));
        // One toggle per echoed frame.
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_payloads_round_trip_unchanged() {
        let handler = handler();
        let long = "x".repeat(4096);
        let payloads = ["a", "Hello ESP32! Message #1", "ünïcødé ✓", long.as_str()];

        for payload in payloads {
            let mut conn = FakeTransport::text(payload);
            handler.handle(&mut conn).unwrap();
            assert_eq!(conn.sent, vec![(FrameKind::Text, payload.as_bytes().to_vec())]);
        }
    }

    #[test]
    fn test_two_echoes_restore_led() {
        let handler = handler();
        let before = handler.led_level();

        handler.handle(&mut FakeTransport::text("one")).unwrap();
        handler.handle(&mut FakeTransport::text("two")).unwrap();

        assert_eq!(handler.led_level(), before);
        assert_eq!(physical_level(&handler), Some(before));
    }

    #[test]
    fn test_empty_frame_does_nothing() {
        let handler = handler();
        let mut conn = FakeTransport::text("");

        assert_eq!(handler.handle(&mut conn).unwrap(), Outcome::Empty);
        assert!(conn.sent.is_empty());
        assert_eq!(conn.read_buf_len, None);
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_probe_failure_propagates() {
        let handler = handler();
        let mut conn = FakeTransport::text("hello");
        conn.fail_probe = true;

        let err = handler.handle(&mut conn).unwrap_err();

        assert!(matches!(err, HandlerError::Probe(-1)));
        assert_eq!(err.transport(), Some(&-1));
        assert!(conn.sent.is_empty());
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_read_failure_propagates() {
        let handler = handler();
        let mut conn = FakeTransport::text("hello");
        conn.fail_read = true;

        let err = handler.handle(&mut conn).unwrap_err();

        assert!(matches!(err, HandlerError::Read { len: 5, error: -3 }));
        assert!(conn.sent.is_empty());
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let handler = handler();
        let mut conn = FakeTransport::text("hello");
        conn.truncate_to = Some(3);

        let err = handler.handle(&mut conn).unwrap_err();

        assert!(matches!(
            err,
            HandlerError::ShortRead {
                expected: 5,
                actual: 3
            }
        ));
        assert!(conn.sent.is_empty());
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_send_failure_leaves_led_unchanged() {
        let handler = handler();
        let mut conn = FakeTransport::text("hello");
        conn.fail_send = true;

        let err = handler.handle(&mut conn).unwrap_err();

        assert!(matches!(err, HandlerError::Send(-4)));
        assert_eq!(handler.led_level(), Level::Low);
        assert_eq!(physical_level(&handler), Some(Level::Low));
    }

    #[test]
    fn test_oversized_frame_is_allocation_error() {
        let led = Led::init(RecordingPin::default()).unwrap();
        let handler = EchoHandler::new(
            led,
            EchoConfig {
                max_payload_len: Some(4),
            },
        );
        let mut conn = FakeTransport::text("hello");

        let err = handler.handle(&mut conn).unwrap_err();

        assert!(err.is_allocation());
        assert_eq!(err.transport(), None);
        assert_eq!(conn.read_buf_len, None);
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_control_frames_are_not_echoed() {
        let handler = handler();
        let mut conn = FakeTransport::frame(FrameKind::Ping, b"ping");

        assert_eq!(
            handler.handle(&mut conn).unwrap(),
            Outcome::Ignored(FrameKind::Ping)
        );
        assert!(conn.sent.is_empty());
        assert_eq!(handler.led_level(), Level::Low);
    }

    #[test]
    fn test_led_write_failure_still_reports_echo() {
        let handler = handler();
        handler.led.lock().unwrap().pin_mut().fail = true;
        let mut conn = FakeTransport::text("hello");

        let outcome = handler.handle(&mut conn).unwrap();

        assert!(matches!(outcome, Outcome::Echoed { led: Level::High, .. }));
        assert_eq!(conn.sent.len(), 1);
    }

    #[test]
    fn test_error_messages() {
        let err: HandlerError<i32> = HandlerError::ShortRead {
            expected: 5,
            actual: 2,
        };
        assert_eq!(err.to_string(), "short read: expected 5 bytes, got 2");

        let err: HandlerError<i32> = HandlerError::Allocation { len: 70000 };
        assert_eq!(err.to_string(), "cannot allocate buffer for 70000 byte frame");
    }
}
