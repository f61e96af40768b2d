//! Echo server accept loop.
//!
//! Connections are accepted on tokio and then served on the blocking pool,
//! one thread per connection. Each connection calls the handler once for the
//! handshake, once per data frame and once when it closes, however it
//! closes. A read or handler error closes that connection and nothing else.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use ws_echo_core::{EchoHandler, HandlerError, LedPin, Outcome};

use crate::config::ServerConfig;
use crate::connection::{TransportError, WsConnection};

/// Errors that stop the server or a connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError<TransportError>),
}

/// WebSocket echo server bound to a listening socket.
pub struct EchoServer<P> {
    config: ServerConfig,
    listener: TcpListener,
    handler: Arc<EchoHandler<P>>,
}

impl<P: LedPin + 'static> EchoServer<P> {
    /// Bind the listening socket.
    pub async fn bind(config: ServerConfig, handler: Arc<EchoHandler<P>>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self {
            config,
            listener,
            handler,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            "Echo server listening on ws://{}{}",
            self.local_addr()?,
            self.config.path
        );

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let stream = match stream.into_std() {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to detach connection from {}: {}", addr, e);
                    continue;
                }
            };

            let handler = self.handler.clone();
            let path = self.config.path.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = serve_connection(stream, addr, &path, &handler) {
                    warn!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Serve one connection to completion on the current thread.
fn serve_connection<P: LedPin>(
    stream: TcpStream,
    addr: SocketAddr,
    path: &str,
    handler: &EchoHandler<P>,
) -> Result<(), ServerError> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;

    let mut conn = WsConnection::accept(stream, path)?;
    info!("New connection from {}", addr);
    handler.handle(&mut conn)?;

    loop {
        match conn.next_frame() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!("Closing {} after read error: {}", addr, e);
                conn.close();
                break;
            }
        }

        match handler.handle(&mut conn) {
            Ok(Outcome::Echoed { len, led, .. }) => {
                debug!("Echoed {} bytes to {}, LED {}", len, addr, led);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Closing {} after handler error: {}", addr, e);
                conn.close();
                break;
            }
        }
    }

    handler.handle(&mut conn)?;
    Ok(())
}
