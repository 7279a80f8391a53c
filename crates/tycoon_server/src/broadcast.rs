//! Delivery of notifications to bound connections.
//!
//! Each connection is represented by a [`ClientHandle`], the sending half of
//! the queue its writer task drains. A send fails only once that writer has
//! gone away, and a failed connection is unbound on the spot. Callers get the
//! dropped names back and announce those departures themselves, so delivery
//! never re-enters disconnect handling.

use crate::error::DeliveryError;
use crate::protocol::{Notification, Outbound};
use crate::registry::SessionRegistry;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Sending side of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ClientHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), DeliveryError> {
        self.sender
            .send(Outbound::Text(text.into()))
            .map_err(|_| DeliveryError)
    }

    pub fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let text = notification.to_text().map_err(|e| {
            error!("Failed to serialize {} notification: {}", notification.kind(), e);
            DeliveryError
        })?;
        self.send_text(text)
    }

    /// Asks the writer to send a close frame and stop.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), DeliveryError> {
        self.sender
            .send(Outbound::Close {
                code,
                reason: reason.into(),
            })
            .map_err(|_| DeliveryError)
    }
}

/// Sends to every bound connection. Failed connections are unbound and
/// their names returned in delivery order.
pub fn broadcast(registry: &mut SessionRegistry, notification: &Notification) -> Vec<String> {
    let text = match notification.to_text() {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize {} notification: {}", notification.kind(), e);
            return Vec::new();
        }
    };

    let failed: Vec<String> = registry
        .bindings()
        .filter(|(_, binding)| binding.handle.send_text(text.clone()).is_err())
        .map(|(name, _)| name.to_string())
        .collect();

    for name in &failed {
        warn!("📭 Delivery of {} to {} failed, unbinding", notification.kind(), name);
        registry.remove(name, None);
    }
    failed
}

/// Sends privately to one player. Returns the player's name if the
/// connection failed and was unbound.
pub fn unicast(
    registry: &mut SessionRegistry,
    name: &str,
    notification: &Notification,
) -> Option<String> {
    let handle = registry.handle(name)?;
    if handle.send(notification).is_ok() {
        return None;
    }
    warn!("📭 Delivery of {} to {} failed, unbinding", notification.kind(), name);
    registry.remove(name, None);
    Some(name.to_string())
}
