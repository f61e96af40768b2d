//! Boot sequence.
//!
//! Storage, LED, network and server are brought up in that fixed order.
//! Failures in the first three halt the boot. A server that fails to start
//! is logged and the device keeps running without it.

use std::fmt;
use std::sync::Arc;

use log::{error, info};
use thiserror::Error;

use crate::handler::{EchoConfig, EchoHandler};
use crate::led::{Led, LedPin};
use crate::storage::{init_storage, StorageBackend, StorageError};
use crate::LOG_TARGET;

/// Hardware and network collaborators needed to boot.
pub trait Platform {
    type Storage: StorageBackend;
    type Pin: LedPin;
    /// Handle keeping the HTTP server alive.
    type Server;
    type Error: fmt::Debug + fmt::Display;

    /// Persistent storage the network stack depends on.
    fn storage(&mut self) -> &mut Self::Storage;

    /// Reset the LED pin, configure it as an output and switch it off.
    fn init_led(&mut self) -> Result<Led<Self::Pin>, Self::Error>;

    /// Block until the network link is up.
    fn connect_network(&mut self) -> Result<(), Self::Error>;

    /// Start the server and register the echo handler on `/ws`.
    fn start_server(
        &mut self,
        handler: Arc<EchoHandler<Self::Pin>>,
    ) -> Result<Self::Server, Self::Error>;
}

/// Running system after a successful boot.
pub struct Booted<P, S> {
    pub handler: Arc<EchoHandler<P>>,
    /// `None` if the server failed to start.
    pub server: Option<S>,
}

impl<P, S> fmt::Debug for Booted<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Booted")
            .field("server_running", &self.server.is_some())
            .finish_non_exhaustive()
    }
}

/// A boot step that cannot be recovered from.
#[derive(Debug, Error)]
pub enum BootError<S, E> {
    #[error("{0}")]
    Storage(StorageError<S>),

    #[error("failed to configure LED: {0}")]
    Led(E),

    #[error("failed to connect network: {0}")]
    Network(E),
}

/// Run the boot sequence once.
pub fn boot<X: Platform>(
    platform: &mut X,
    config: EchoConfig,
) -> Result<Booted<X::Pin, X::Server>, BootError<<X::Storage as StorageBackend>::Error, X::Error>>
{
    init_storage(platform.storage()).map_err(BootError::Storage)?;

    let led = platform.init_led().map_err(BootError::Led)?;

    info!(target: LOG_TARGET, "Starting WiFi station");
    platform.connect_network().map_err(BootError::Network)?;

    let handler = Arc::new(EchoHandler::new(led, config));
    let server = match platform.start_server(handler.clone()) {
        Ok(server) => {
            info!(target: LOG_TARGET, "Echo endpoint registered");
            Some(server)
        }
        Err(e) => {
            error!(target: LOG_TARGET, "Error starting server: {}", e);
            None
        }
    };

    Ok(Booted { handler, server })
}
