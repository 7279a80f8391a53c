//! Listener and accept loop.

use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::room::RoomHandle;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Owns the room dispatcher and the shutdown channel shared by the accept
/// loop and the room.
///
/// The administrative surface (`status`, `connections`, `kick`, `reset`) is
/// reached through [`TycoonServer::room`].
pub struct TycoonServer {
    config: ServerConfig,
    room: RoomHandle,
    shutdown_sender: broadcast::Sender<()>,
}

impl TycoonServer {
    /// Creates the server and spawns its room dispatcher. Must be called
    /// from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;
        let (shutdown_sender, _) = broadcast::channel(1);
        let room = RoomHandle::spawn(config.clone(), shutdown_sender.subscribe());
        Ok(Self {
            config,
            room,
            shutdown_sender,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn room(&self) -> RoomHandle {
        self.room.clone()
    }

    /// Stops the accept loop and closes every connection with 1001.
    pub fn shutdown(&self) {
        info!("🛑 Shutdown requested");
        if self.shutdown_sender.send(()).is_err() {
            debug!("No shutdown listeners left");
        }
    }

    /// Binds the configured address.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        bind_listener(self.config.bind_address)
    }

    /// Binds and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accepts connections on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener address unavailable: {e}")))?;
        info!("🚀 Tycoon server listening on ws://{}/ws/{{player_name}}", local);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let idle_timeout = self.config.idle_timeout();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted TCP connection from {}", addr);
                        let room = self.room.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, room, idle_timeout).await {
                                error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

fn bind_listener(address: SocketAddr) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
    socket.set_reuse_address(true).ok();

    socket
        .bind(&address.into())
        .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
    socket
        .listen(1024)
        .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

    let std_listener: StdTcpListener = socket.into();
    std_listener
        .set_nonblocking(true)
        .map_err(|e| ServerError::Network(format!("Set nonblocking failed: {e}")))?;

    let listener = TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))?;
    info!("✅ Listener bound on {}", address);
    Ok(listener)
}
