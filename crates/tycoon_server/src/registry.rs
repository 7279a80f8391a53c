//! Session registry: which player is bound to which live connection.
//!
//! The registry is plain data owned by the room dispatcher. It enforces the
//! admission rules, per-address connection caps, color ownership and host
//! identity. It never sends anything itself.

use crate::broadcast::ClientHandle;
use crate::error::{AdmissionError, RoomError};
use crate::ConnectionId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;

/// Colors players can pick from.
pub const PLAYER_COLORS: [&str; 6] = [
    "#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4", "#ffeaa7", "#dda0dd",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Lobby,
    InProgress,
}

/// A player's live connection.
#[derive(Debug, Clone)]
pub struct Binding {
    pub conn_id: ConnectionId,
    pub address: IpAddr,
    pub handle: ClientHandle,
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub conn_id: ConnectionId,
    /// The player is rejoining a game in progress.
    pub reconnect: bool,
    /// The player became host on joining.
    pub host: bool,
}

#[derive(Debug)]
pub struct SessionRegistry {
    bindings: HashMap<String, Binding>,
    address_counts: HashMap<IpAddr, usize>,
    colors: HashMap<String, String>,
    host: Option<String>,
    phase: RoomPhase,
    roster: HashSet<String>,
    max_per_address: usize,
    next_conn_id: ConnectionId,
}

impl SessionRegistry {
    pub fn new(max_per_address: usize) -> Self {
        Self {
            bindings: HashMap::new(),
            address_counts: HashMap::new(),
            colors: HashMap::new(),
            host: None,
            phase: RoomPhase::Lobby,
            roster: HashSet::new(),
            max_per_address,
            next_conn_id: 1,
        }
    }

    /// Binds `name` to a new connection from `address`.
    ///
    /// Rules are checked in order: a game in progress only readmits its own
    /// players, the address cap applies to everyone but those rejoining
    /// players, and a name can be bound only once.
    pub fn admit(
        &mut self,
        name: &str,
        address: IpAddr,
        handle: ClientHandle,
    ) -> Result<Admission, AdmissionError> {
        let in_progress = self.phase == RoomPhase::InProgress;
        if in_progress && !self.roster.contains(name) {
            return Err(AdmissionError::RoomClosed(name.to_string()));
        }
        let reconnect = in_progress;

        if !reconnect && self.address_count(address) >= self.max_per_address {
            return Err(AdmissionError::AddressLimit {
                address: address.to_string(),
                limit: self.max_per_address,
            });
        }
        if self.bindings.contains_key(name) {
            return Err(AdmissionError::DuplicateName(name.to_string()));
        }

        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;
        self.bindings.insert(
            name.to_string(),
            Binding {
                conn_id,
                address,
                handle,
            },
        );
        *self.address_counts.entry(address).or_insert(0) += 1;

        let host = self.host.as_deref().map_or(true, |host| !self.bindings.contains_key(host));
        if host {
            self.host = Some(name.to_string());
        }

        Ok(Admission {
            conn_id,
            reconnect,
            host,
        })
    }

    /// Unbinds a player, releasing their color and address slot.
    ///
    /// With `Some(conn_id)` the binding is removed only if it still belongs
    /// to that connection, so a superseded connection cannot unbind its
    /// successor. The host is left as is; see [`SessionRegistry::migrate_host`].
    pub fn remove(&mut self, name: &str, conn_id: Option<ConnectionId>) -> Option<Binding> {
        let current = self.bindings.get(name)?;
        if conn_id.is_some_and(|id| id != current.conn_id) {
            return None;
        }
        let binding = self.bindings.remove(name)?;
        self.colors.remove(name);
        if let Some(count) = self.address_counts.get_mut(&binding.address) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.address_counts.remove(&binding.address);
            }
        }
        Some(binding)
    }

    /// Hands the host role to the earliest-joined bound player if the
    /// current host is gone. Returns the new host when it changed.
    pub fn migrate_host(&mut self) -> Option<String> {
        if self.host.as_deref().is_some_and(|host| self.bindings.contains_key(host)) {
            return None;
        }
        let next = self.bindings().next().map(|(name, _)| name.to_string());
        self.host = next.clone();
        next
    }

    /// Claims a palette color. Re-claiming one's own color succeeds without
    /// change and returns `false`.
    pub fn choose_color(&mut self, name: &str, color: &str) -> Result<bool, RoomError> {
        if !PLAYER_COLORS.contains(&color) {
            return Err(RoomError::UnknownColor(color.to_string()));
        }
        match self.colors.iter().find(|(_, held)| held.as_str() == color) {
            Some((holder, _)) if holder == name => return Ok(false),
            Some(_) => return Err(RoomError::ColorTaken(color.to_string())),
            None => {}
        }
        self.colors.insert(name.to_string(), color.to_string());
        Ok(true)
    }

    /// Leaves the lobby. Only `roster` may join from now on.
    pub fn begin_game(&mut self, roster: &[String]) {
        self.phase = RoomPhase::InProgress;
        self.roster = roster.iter().cloned().collect();
    }

    /// Returns the room to an empty lobby, yielding the bindings that were
    /// still live.
    pub fn clear(&mut self) -> Vec<(String, Binding)> {
        let drained = self
            .player_names()
            .into_iter()
            .filter_map(|name| self.bindings.remove(&name).map(|binding| (name, binding)))
            .collect();
        self.address_counts.clear();
        self.colors.clear();
        self.host = None;
        self.phase = RoomPhase::Lobby;
        self.roster.clear();
        drained
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn in_progress(&self) -> bool {
        self.phase == RoomPhase::InProgress
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn handle(&self, name: &str) -> Option<&ClientHandle> {
        self.bindings.get(name).map(|binding| &binding.handle)
    }

    /// Bound players in join order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        let mut bindings: Vec<(&str, &Binding)> = self
            .bindings
            .iter()
            .map(|(name, binding)| (name.as_str(), binding))
            .collect();
        bindings.sort_by_key(|(_, binding)| binding.conn_id);
        bindings.into_iter()
    }

    pub fn player_names(&self) -> Vec<String> {
        self.bindings().map(|(name, _)| name.to_string()).collect()
    }

    pub fn address_count(&self, address: IpAddr) -> usize {
        self.address_counts.get(&address).copied().unwrap_or(0)
    }

    pub fn address_connections(&self) -> BTreeMap<String, usize> {
        self.address_counts
            .iter()
            .map(|(address, count)| (address.to_string(), *count))
            .collect()
    }

    pub fn player_addresses(&self) -> BTreeMap<String, String> {
        self.bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.address.to_string()))
            .collect()
    }

    pub fn player_colors(&self) -> BTreeMap<String, String> {
        self.colors
            .iter()
            .map(|(name, color)| (name.clone(), color.clone()))
            .collect()
    }

    pub fn available_colors(&self) -> Vec<String> {
        PLAYER_COLORS
            .iter()
            .filter(|color| !self.colors.values().any(|held| held == *color))
            .map(|color| color.to_string())
            .collect()
    }
}
