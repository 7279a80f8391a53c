//! Bounded log of connection lifecycle events, kept for the admin surface.

use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::net::IpAddr;
use tracing::{info, warn};

/// Number of events retained.
pub const HISTORY_CAPACITY: usize = 100;

/// Window used for the "recent" statistics.
const RECENT_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEventKind {
    Attempt,
    Rejected,
    Reconnect,
    Connected,
    HostAssigned,
    Disconnected,
    HostMigrated,
    RoomReset,
    Kicked,
    DeliveryFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionEvent {
    pub timestamp: u64,
    pub kind: ConnectionEventKind,
    pub player: String,
    pub details: String,
    pub address: Option<String>,
    pub total_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatistics {
    pub total_events: usize,
    pub recent_connects: usize,
    pub recent_disconnects: usize,
    pub active_addresses: Vec<String>,
}

#[derive(Debug)]
pub struct ConnectionHistory {
    events: VecDeque<ConnectionEvent>,
    capacity: usize,
}

impl ConnectionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(
        &mut self,
        kind: ConnectionEventKind,
        player: &str,
        details: impl Into<String>,
        address: Option<IpAddr>,
        total_connections: usize,
    ) {
        let event = ConnectionEvent {
            timestamp: current_timestamp(),
            kind,
            player: player.to_string(),
            details: details.into(),
            address: address.map(|address| address.to_string()),
            total_connections,
        };

        match kind {
            ConnectionEventKind::Rejected | ConnectionEventKind::DeliveryFailed => warn!(
                "🔌 {:?} {} ({}) total={}",
                kind, event.player, event.details, total_connections
            ),
            _ => info!(
                "🔌 {:?} {} ({}) total={}",
                kind, event.player, event.details, total_connections
            ),
        }

        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Up to `count` most recent events, oldest first.
    pub fn recent(&self, count: usize) -> Vec<ConnectionEvent> {
        let skip = self.events.len().saturating_sub(count);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn statistics(&self, active_addresses: BTreeSet<String>) -> ConnectionStatistics {
        let recent = self.recent(RECENT_WINDOW);
        let count = |kinds: &[ConnectionEventKind]| {
            recent.iter().filter(|e| kinds.contains(&e.kind)).count()
        };
        ConnectionStatistics {
            total_events: self.events.len(),
            recent_connects: count(&[ConnectionEventKind::Connected, ConnectionEventKind::Reconnect]),
            recent_disconnects: count(&[ConnectionEventKind::Disconnected]),
            active_addresses: active_addresses.into_iter().collect(),
        }
    }
}

impl Default for ConnectionHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
