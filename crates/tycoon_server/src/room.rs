//! The room dispatcher.
//!
//! One task owns the [`RoomState`] (registry, game and history) and applies
//! [`RoomCommand`]s one at a time, including every broadcast a command causes.
//! Connection tasks and the admin surface talk to it through a cloneable
//! [`RoomHandle`].

use crate::broadcast::{self, ClientHandle};
use crate::config::ServerConfig;
use crate::error::{AdmissionError, RoomError, ServerError};
use crate::history::{ConnectionEvent, ConnectionEventKind, ConnectionHistory, ConnectionStatistics};
use crate::protocol::{
    Intent, Notification, Outcome, CLOSE_GOING_AWAY, CLOSE_KICKED, CLOSE_NORMAL,
    CLOSE_ROOM_RESET,
};
use crate::registry::SessionRegistry;
use crate::ConnectionId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::IpAddr;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use tycoon_engine::{BoardCatalog, Game};

/// Capacity of the dispatcher's command queue.
const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Number of history entries returned by [`RoomHandle::connections`].
const REPORTED_HISTORY: usize = 50;

pub enum RoomCommand {
    Connect {
        name: String,
        address: IpAddr,
        handle: ClientHandle,
        reply: oneshot::Sender<Result<ConnectionId, AdmissionError>>,
    },
    Intent {
        name: String,
        conn_id: ConnectionId,
        intent: Intent,
    },
    Disconnected {
        name: String,
        conn_id: ConnectionId,
        reason: String,
    },
    Status {
        reply: oneshot::Sender<RoomStatus>,
    },
    Connections {
        reply: oneshot::Sender<ConnectionsReport>,
    },
    Kick {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    Reset {
        reply: oneshot::Sender<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStatus {
    pub total_connections: usize,
    pub players: Vec<String>,
    pub host: Option<String>,
    pub address_connections: BTreeMap<String, usize>,
    pub player_addresses: BTreeMap<String, String>,
    pub game_started: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionsReport {
    pub current_connections: RoomStatus,
    pub connection_history: Vec<ConnectionEvent>,
    pub statistics: ConnectionStatistics,
}

/// Cloneable sender side of the dispatcher.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    commands: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Spawns the dispatcher on the current runtime.
    pub fn spawn(config: ServerConfig, shutdown: tokio::sync::broadcast::Receiver<()>) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let state = RoomState::new(config);
        tokio::spawn(state.run(receiver, shutdown));
        Self { commands }
    }

    async fn submit(&self, command: RoomCommand) -> Result<(), ServerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServerError::RoomStopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, ServerError> {
        let (reply, response) = oneshot::channel();
        self.submit(command(reply)).await?;
        response.await.map_err(|_| ServerError::RoomStopped)
    }

    /// Asks the room to admit `name`. On success the handle is bound and
    /// starts receiving notifications.
    pub async fn connect(
        &self,
        name: &str,
        address: IpAddr,
        handle: ClientHandle,
    ) -> Result<ConnectionId, ServerError> {
        let name = name.to_string();
        let admitted = self
            .request(|reply| RoomCommand::Connect {
                name,
                address,
                handle,
                reply,
            })
            .await?;
        Ok(admitted?)
    }

    pub async fn intent(
        &self,
        name: &str,
        conn_id: ConnectionId,
        intent: Intent,
    ) -> Result<(), ServerError> {
        self.submit(RoomCommand::Intent {
            name: name.to_string(),
            conn_id,
            intent,
        })
        .await
    }

    pub async fn disconnected(
        &self,
        name: &str,
        conn_id: ConnectionId,
        reason: impl Into<String>,
    ) -> Result<(), ServerError> {
        self.submit(RoomCommand::Disconnected {
            name: name.to_string(),
            conn_id,
            reason: reason.into(),
        })
        .await
    }

    pub async fn status(&self) -> Result<RoomStatus, ServerError> {
        self.request(|reply| RoomCommand::Status { reply }).await
    }

    /// Status plus recent connection history and statistics.
    pub async fn connections(&self) -> Result<ConnectionsReport, ServerError> {
        self.request(|reply| RoomCommand::Connections { reply }).await
    }

    /// Closes a player's connection. Returns false if they were not connected.
    pub async fn kick(&self, name: &str) -> Result<bool, ServerError> {
        let name = name.to_string();
        self.request(|reply| RoomCommand::Kick { name, reply }).await
    }

    /// Closes every connection and clears all room and game state.
    /// Returns the number of connections closed.
    pub async fn reset(&self) -> Result<usize, ServerError> {
        self.request(|reply| RoomCommand::Reset { reply }).await
    }
}

/// Everything the room knows. Owned by exactly one dispatcher task.
#[derive(Debug)]
pub struct RoomState {
    config: ServerConfig,
    catalog: BoardCatalog,
    registry: SessionRegistry,
    game: Option<Game>,
    history: ConnectionHistory,
    departures: VecDeque<(String, String)>,
}

impl RoomState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = SessionRegistry::new(config.max_connections_per_address);
        Self {
            config,
            catalog: BoardCatalog::standard(),
            registry,
            game: None,
            history: ConnectionHistory::default(),
            departures: VecDeque::new(),
        }
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<RoomCommand>,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) {
        info!("🏠 Room dispatcher started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, closing room");
                    break;
                }
            }
        }
        let closed = self.close_everyone(CLOSE_GOING_AWAY, "server shutting down");
        info!("🏠 Room dispatcher stopped, closed {} connection(s)", closed);
    }

    pub fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Connect {
                name,
                address,
                handle,
                reply,
            } => {
                let result = self.connect(&name, address, handle);
                let _ = reply.send(result);
            }
            RoomCommand::Intent {
                name,
                conn_id,
                intent,
            } => self.intent(&name, conn_id, intent),
            RoomCommand::Disconnected {
                name,
                conn_id,
                reason,
            } => self.disconnect(&name, conn_id, &reason),
            RoomCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            RoomCommand::Connections { reply } => {
                let _ = reply.send(self.connections());
            }
            RoomCommand::Kick { name, reply } => {
                let _ = reply.send(self.kick(&name));
            }
            RoomCommand::Reset { reply } => {
                let _ = reply.send(self.reset());
            }
        }
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn connect(
        &mut self,
        name: &str,
        address: IpAddr,
        handle: ClientHandle,
    ) -> Result<ConnectionId, AdmissionError> {
        self.history.record(
            ConnectionEventKind::Attempt,
            name,
            "",
            Some(address),
            self.registry.len(),
        );

        let admission = match self.registry.admit(name, address, handle) {
            Ok(admission) => admission,
            Err(e) => {
                self.history.record(
                    ConnectionEventKind::Rejected,
                    name,
                    e.to_string(),
                    Some(address),
                    self.registry.len(),
                );
                return Err(e);
            }
        };

        let kind = if admission.reconnect {
            ConnectionEventKind::Reconnect
        } else {
            ConnectionEventKind::Connected
        };
        self.history.record(
            kind,
            name,
            format!("connection #{}", admission.conn_id),
            Some(address),
            self.registry.len(),
        );
        if admission.host {
            self.history.record(
                ConnectionEventKind::HostAssigned,
                name,
                "",
                Some(address),
                self.registry.len(),
            );
        }

        match self.reconnect_snapshot(name) {
            Some(snapshot) if admission.reconnect => self.unicast(name, &snapshot),
            _ => self.broadcast_player_list(),
        }
        self.drain_departures();
        Ok(admission.conn_id)
    }

    pub fn intent(&mut self, name: &str, conn_id: ConnectionId, intent: Intent) {
        if self.registry.binding(name).map(|binding| binding.conn_id) != Some(conn_id) {
            debug!("Ignoring {} from superseded connection #{}", intent.action(), conn_id);
            return;
        }
        debug!("📨 {} -> {}", name, intent.action());

        match intent {
            Intent::Ping => self.unicast(name, &Notification::Pong),
            Intent::ChooseColor { color } => self.choose_color(name, &color),
            Intent::LeaveRoom => self.leave(name, conn_id),
            Intent::StartGame => self.start_game(name),
            intent => self.play(name, intent),
        }
        self.drain_departures();
    }

    /// Handles a lost connection. A close from a superseded connection is
    /// ignored.
    pub fn disconnect(&mut self, name: &str, conn_id: ConnectionId, reason: &str) {
        if self.registry.remove(name, Some(conn_id)).is_some() {
            self.departures.push_back((name.to_string(), reason.to_string()));
        }
        self.drain_departures();
    }

    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            total_connections: self.registry.len(),
            players: self.registry.player_names(),
            host: self.registry.host().map(str::to_string),
            address_connections: self.registry.address_connections(),
            player_addresses: self.registry.player_addresses(),
            game_started: self.registry.in_progress(),
        }
    }

    pub fn connections(&self) -> ConnectionsReport {
        let status = self.status();
        let active: BTreeSet<String> = status.player_addresses.values().cloned().collect();
        ConnectionsReport {
            connection_history: self.history.recent(REPORTED_HISTORY),
            statistics: self.history.statistics(active),
            current_connections: status,
        }
    }

    pub fn kick(&mut self, name: &str) -> bool {
        let Some(binding) = self.registry.binding(name) else {
            return false;
        };
        let conn_id = binding.conn_id;
        let address = binding.address;
        let _ = binding.handle.close(CLOSE_KICKED, "kicked by administrator");
        self.history.record(
            ConnectionEventKind::Kicked,
            name,
            "",
            Some(address),
            self.registry.len(),
        );
        self.disconnect(name, conn_id, "kicked by administrator");
        true
    }

    pub fn reset(&mut self) -> usize {
        let closed = self.close_everyone(CLOSE_ROOM_RESET, "room reset by administrator");
        self.history.record(
            ConnectionEventKind::RoomReset,
            "admin",
            format!("closed {} connection(s)", closed),
            None,
            0,
        );
        closed
    }

    fn close_everyone(&mut self, code: u16, reason: &str) -> usize {
        let bindings = self.registry.clear();
        for (_, binding) in &bindings {
            let _ = binding.handle.close(code, reason);
        }
        self.game = None;
        self.departures.clear();
        bindings.len()
    }

    fn leave(&mut self, name: &str, conn_id: ConnectionId) {
        if let Some(handle) = self.registry.handle(name) {
            let _ = handle.close(CLOSE_NORMAL, "left room");
        }
        self.disconnect(name, conn_id, "left room");
    }

    fn choose_color(&mut self, name: &str, color: &str) {
        match self.registry.choose_color(name, color) {
            Ok(_) => {
                let selected = Notification::ColorSelected {
                    player: name.to_string(),
                    color: color.to_string(),
                };
                self.unicast(name, &selected);
                self.broadcast_player_list();
            }
            Err(e) => self.reject(name, &e.to_string(), "choose_color"),
        }
    }

    fn start_game(&mut self, name: &str) {
        if self.registry.in_progress() {
            return self.reject(name, &RoomError::AlreadyStarted.to_string(), "start_game");
        }
        if self.registry.host() != Some(name) {
            return self.reject(name, &RoomError::NotHost.to_string(), "start_game");
        }

        let players = self.registry.player_names();
        let game = self.catalog.build().and_then(|board| {
            Game::with_options(&players, &self.config.rules, board, StdRng::from_entropy())
        });
        let game = match game {
            Ok(game) => game,
            Err(e) => return self.reject(name, &e.to_string(), "start_game"),
        };

        info!("🎮 {} started the game with {:?}", name, players);
        let started = Notification::GameStarted {
            state: game.state(),
            host: self.registry.host().map(str::to_string),
            player_colors: self.registry.player_colors(),
            board: self.catalog.board_layout(),
        };
        self.registry.begin_game(&players);
        self.game = Some(game);
        self.broadcast(&started);
    }

    /// Applies a game intent. Results are broadcast, except financial
    /// options which only the requester sees.
    fn play(&mut self, name: &str, intent: Intent) {
        let action = intent.action();
        let Some(game) = self.game.as_mut() else {
            return self.reject(name, &RoomError::NotStarted.to_string(), action);
        };

        let result = match intent {
            Intent::Roll => game
                .roll(name)
                .map(|report| Notification::TurnResult { report }),
            Intent::BuyProperty => game
                .buy_property(name)
                .map(|report| Notification::BuyResult { outcome: Outcome::Applied(report) }),
            Intent::UpgradeProperty => game
                .upgrade_property(name)
                .map(|report| Notification::UpgradeResult {
                    outcome: Outcome::Applied(report),
                }),
            Intent::MortgageProperty { property_name } => game
                .mortgage_property(name, &property_name)
                .map(|report| Notification::MortgageResult { report }),
            Intent::RedeemProperty { property_name } => game
                .redeem_property(name, &property_name)
                .map(|report| Notification::RedeemResult { outcome: Outcome::Applied(report) }),
            Intent::SellProperty { property_name } => game
                .sell_property(name, &property_name)
                .map(|report| Notification::SellResult { report }),
            Intent::EndTurn => game
                .end_turn(name)
                .map(|report| Notification::TurnEnded { report }),
            Intent::GetFinancialOptions => {
                let options = game
                    .financial_options(name)
                    .map(|options| Notification::FinancialOptions { options });
                match options {
                    Ok(options) => self.unicast(name, &options),
                    Err(e) => self.reject(name, &e.to_string(), action),
                }
                return;
            }
            Intent::Ping
            | Intent::ChooseColor { .. }
            | Intent::LeaveRoom
            | Intent::StartGame => return,
        };

        match result {
            Ok(notification) => {
                self.broadcast(&notification);
                self.skip_disconnected_turns();
            }
            Err(e) => {
                debug!("Rejected {} from {}: {}", action, name, e);
                let unaffordable = e
                    .is_insufficient_funds()
                    .then(|| Notification::unaffordable(action, name, e.to_string()))
                    .flatten();
                match unaffordable {
                    Some(result) => self.broadcast(&result),
                    None => self.reject(name, &e.to_string(), action),
                }
            }
        }
    }

    /// Ends the turns of players who are not connected, as long as someone
    /// who is connected can still play.
    fn skip_disconnected_turns(&mut self) {
        let mut skipped = Vec::new();
        if let Some(game) = self.game.as_mut() {
            for _ in 0..game.players().len() {
                if game.is_game_over() {
                    break;
                }
                let current = game.current_player().name().to_string();
                if self.registry.is_bound(&current) {
                    break;
                }
                let someone_connected = game
                    .players()
                    .iter()
                    .any(|player| player.is_active() && self.registry.is_bound(player.name()));
                if !someone_connected {
                    break;
                }
                match game.end_turn(&current) {
                    Ok(report) => {
                        info!("⏭️ Ending turn of disconnected player {}", current);
                        skipped.push(report);
                    }
                    Err(_) => break,
                }
            }
        }
        for report in skipped {
            self.broadcast(&Notification::TurnEnded { report });
        }
    }

    fn reconnect_snapshot(&self, name: &str) -> Option<Notification> {
        let game = self.game.as_ref()?;
        Some(Notification::GameReconnect {
            state: game.state(),
            host: self.registry.host().map(str::to_string),
            player_colors: self.registry.player_colors(),
            board: self.catalog.board_layout(),
            message: format!("Welcome back, {}! The game is in progress", name),
        })
    }

    fn broadcast_player_list(&mut self) {
        let list = Notification::PlayerList {
            players: self.registry.player_names(),
            host: self.registry.host().map(str::to_string),
            player_colors: self.registry.player_colors(),
            available_colors: self.registry.available_colors(),
        };
        self.broadcast(&list);
    }

    fn reject(&mut self, name: &str, message: &str, action: &str) {
        self.unicast(name, &Notification::error(message, Some(action)));
    }

    fn broadcast(&mut self, notification: &Notification) {
        for name in broadcast::broadcast(&mut self.registry, notification) {
            self.delivery_failed(name);
        }
    }

    fn unicast(&mut self, name: &str, notification: &Notification) {
        if let Some(name) = broadcast::unicast(&mut self.registry, name, notification) {
            self.delivery_failed(name);
        }
    }

    fn delivery_failed(&mut self, name: String) {
        self.history.record(
            ConnectionEventKind::DeliveryFailed,
            &name,
            "",
            None,
            self.registry.len(),
        );
        self.departures.push_back((name, "delivery failed".to_string()));
    }

    /// Announces queued departures. Each announcement may queue more, but
    /// only for bindings it removed, so the loop ends.
    fn drain_departures(&mut self) {
        while let Some((name, reason)) = self.departures.pop_front() {
            self.finish_departure(&name, &reason);
        }
    }

    fn finish_departure(&mut self, name: &str, reason: &str) {
        self.history.record(
            ConnectionEventKind::Disconnected,
            name,
            reason,
            None,
            self.registry.len(),
        );

        if let Some(host) = self.registry.migrate_host() {
            self.history.record(
                ConnectionEventKind::HostMigrated,
                &host,
                format!("from {}", name),
                None,
                self.registry.len(),
            );
        }

        if self.registry.is_empty() {
            info!("🧹 Last player left, resetting the room");
            self.close_everyone(CLOSE_NORMAL, "room closed");
            self.history.record(
                ConnectionEventKind::RoomReset,
                name,
                "all players left",
                None,
                0,
            );
            return;
        }

        let left = Notification::PlayerLeft {
            player: name.to_string(),
            remaining_players: self.registry.player_names(),
            new_host: self.registry.host().map(str::to_string),
            disconnect_reason: reason.to_string(),
        };
        self.broadcast(&left);
        self.broadcast_player_list();
        self.skip_disconnected_turns();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Outbound;
    use serde_json::Value;
    use std::net::Ipv4Addr;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tycoon_engine::GameRules;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(172, 16, 0, last))
    }

    fn room() -> RoomState {
        RoomState::new(ServerConfig::default())
    }

    fn join(
        room: &mut RoomState,
        name: &str,
        last: u8,
    ) -> (ConnectionId, UnboundedReceiver<Outbound>) {
        let (handle, rx) = ClientHandle::new();
        let conn_id = room.connect(name, addr(last), handle).unwrap();
        (conn_id, rx)
    }

    /// Drains queued frames, returning the JSON bodies of text frames.
    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Outbound::Text(text) = frame {
                messages.push(serde_json::from_str(&text).unwrap());
            }
        }
        messages
    }

    fn types(messages: &[Value]) -> Vec<String> {
        messages
            .iter()
            .map(|m| m["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_lobby_joins_broadcast_player_list() {
        let mut room = room();
        let (_, mut a) = join(&mut room, "A", 1);
        let (_, mut b) = join(&mut room, "B", 2);

        let a_messages = drain(&mut a);
        assert_eq!(types(&a_messages), vec!["player_list", "player_list"]);
        let last = &a_messages[1];
        assert_eq!(last["players"], serde_json::json!(["A", "B"]));
        assert_eq!(last["host"], "A");
        assert_eq!(last["available_colors"].as_array().unwrap().len(), 6);
        assert_eq!(types(&drain(&mut b)), vec!["player_list"]);
    }

    #[test]
    fn test_only_host_starts_with_enough_players() {
        let mut room = room();
        let (a_id, mut a) = join(&mut room, "A", 1);
        room.intent("A", a_id, Intent::StartGame);
        let errors = drain(&mut a);
        assert_eq!(errors.last().unwrap()["type"], "error");
        assert!(room.game().is_none());

        let (b_id, mut b) = join(&mut room, "B", 2);
        room.intent("B", b_id, Intent::StartGame);
        let last = drain(&mut b).pop().unwrap();
        assert_eq!(last["message"], "Only the host can start the game");
        assert_eq!(last["action"], "start_game");

        drain(&mut a);
        room.intent("A", a_id, Intent::StartGame);
        let started = drain(&mut a).pop().unwrap();
        assert_eq!(started["type"], "game_started");
        assert_eq!(started["current_player"], "A");
        assert_eq!(started["players"][0]["cash"], 1500);
        assert_eq!(started["board"].as_array().unwrap().len(), 28);
        assert_eq!(drain(&mut b).pop().unwrap()["type"], "game_started");
        assert!(room.status().game_started);
    }

    #[test]
    fn test_unknown_player_rejected_while_in_progress() {
        let mut room = room();
        let (a_id, _a) = join(&mut room, "A", 1);
        let (_b_id, _b) = join(&mut room, "B", 2);
        room.intent("A", a_id, Intent::StartGame);
        let before = room.status();

        let (handle, _rx) = ClientHandle::new();
        let err = room.connect("Z", addr(9), handle).unwrap_err();
        assert_eq!(err, AdmissionError::RoomClosed("Z".to_string()));
        assert_eq!(err.close_code(), 4003);
        assert_eq!(room.status(), before);
    }

    #[test]
    fn test_reconnect_receives_snapshot() {
        let mut room = room();
        let (a_id, mut a) = join(&mut room, "A", 1);
        let (b_id, _b) = join(&mut room, "B", 2);
        room.intent("A", a_id, Intent::StartGame);
        room.disconnect("B", b_id, "connection reset");
        drain(&mut a);

        let (_, mut b) = join(&mut room, "B", 1);
        let messages = drain(&mut b);
        assert_eq!(types(&messages), vec!["game_reconnect"]);
        assert_eq!(messages[0]["players"].as_array().unwrap().len(), 2);
        assert!(drain(&mut a).is_empty());
    }

    #[test]
    fn test_failed_delivery_is_announced_as_departure() {
        let mut room = room();
        let (a_id, mut a) = join(&mut room, "A", 1);
        let (_, b) = join(&mut room, "B", 2);
        let (_, mut c) = join(&mut room, "C", 3);
        drop(b);
        drain(&mut a);
        drain(&mut c);

        room.intent("A", a_id, Intent::ChooseColor { color: "#96ceb4".to_string() });

        let a_messages = drain(&mut a);
        assert_eq!(
            types(&a_messages),
            vec!["color_selected", "player_list", "player_left", "player_list"]
        );
        assert_eq!(a_messages[2]["player"], "B");
        assert_eq!(a_messages[2]["disconnect_reason"], "delivery failed");
        assert_eq!(types(&drain(&mut c)), vec!["player_list", "player_left", "player_list"]);

        let status = room.status();
        assert_eq!(status.players, vec!["A".to_string(), "C".to_string()]);
        assert!(!status.address_connections.contains_key("172.16.0.2"));
    }

    #[test]
    fn test_host_leaving_migrates_host() {
        let mut room = room();
        let (a_id, _a) = join(&mut room, "A", 1);
        let (_, mut b) = join(&mut room, "B", 2);
        let (_, _c) = join(&mut room, "C", 3);
        drain(&mut b);

        room.intent("A", a_id, Intent::LeaveRoom);

        let messages = drain(&mut b);
        assert_eq!(messages[0]["type"], "player_left");
        assert_eq!(messages[0]["new_host"], "B");
        assert_eq!(messages[0]["disconnect_reason"], "left room");
        assert_eq!(room.status().host.as_deref(), Some("B"));
    }

    #[test]
    fn test_leave_closes_with_normal_code() {
        let mut room = room();
        let (a_id, mut a) = join(&mut room, "A", 1);
        let (_, _b) = join(&mut room, "B", 2);
        drain(&mut a);
        room.intent("A", a_id, Intent::LeaveRoom);

        let frame = a.try_recv().unwrap();
        assert_eq!(frame, Outbound::Close { code: 1000, reason: "left room".to_string() });
    }

    #[test]
    fn test_last_departure_tears_room_down() {
        let mut room = room();
        let (a_id, _a) = join(&mut room, "A", 1);
        let (b_id, _b) = join(&mut room, "B", 2);
        room.intent("A", a_id, Intent::StartGame);

        room.disconnect("A", a_id, "closed");
        room.disconnect("B", b_id, "closed");

        assert!(room.game().is_none());
        let status = room.status();
        assert!(!status.game_started);
        assert_eq!(status.host, None);
        assert_eq!(status.total_connections, 0);

        // The lobby is open again to anyone.
        join(&mut room, "Z", 9);
        assert_eq!(room.status().host.as_deref(), Some("Z"));
    }

    #[test]
    fn test_stale_disconnect_is_ignored() {
        let mut room = room();
        let (old_id, _old) = join(&mut room, "A", 1);
        room.disconnect("A", old_id, "closed");
        let (new_id, _new) = join(&mut room, "A", 1);

        room.disconnect("A", old_id, "late close");
        assert!(room.registry().is_bound("A"));
        assert_eq!(room.registry().binding("A").unwrap().conn_id, new_id);
    }

    #[test]
    fn test_game_errors_go_to_requester_only() {
        let mut room = room();
        let (a_id, mut a) = join(&mut room, "A", 1);
        let (b_id, mut b) = join(&mut room, "B", 2);
        room.intent("A", a_id, Intent::StartGame);
        drain(&mut a);
        drain(&mut b);

        room.intent("B", b_id, Intent::Roll);
        let errors = drain(&mut b);
        assert_eq!(types(&errors), vec!["error"]);
        assert_eq!(errors[0]["message"], "It is not B's turn");
        assert_eq!(errors[0]["action"], "roll");
        assert!(drain(&mut a).is_empty());

        room.intent("A", a_id, Intent::GetFinancialOptions);
        let options = drain(&mut a);
        assert_eq!(types(&options), vec!["financial_options"]);
        assert_eq!(options[0]["money"], 1500);
        assert!(drain(&mut b).is_empty());
    }

    #[test]
    fn test_unaffordable_buy_reports_failed_result() {
        let rules = GameRules { starting_cash: 1, ..GameRules::default() };
        let mut room = RoomState::new(ServerConfig::default().with_rules(rules));
        let (a_id, mut a) = join(&mut room, "A", 1);
        let (_, mut b) = join(&mut room, "B", 2);
        room.intent("A", a_id, Intent::StartGame);
        // country2 costs $2.
        let game = room.game.as_mut().unwrap();
        game.roll_with("A", [1, 1]).unwrap();
        assert_eq!(game.pending_action().unwrap().property, "country2");
        drain(&mut a);
        drain(&mut b);

        room.intent("A", a_id, Intent::BuyProperty);

        for messages in [drain(&mut a), drain(&mut b)] {
            assert_eq!(types(&messages), vec!["buy_result"]);
            assert_eq!(messages[0]["success"], false);
            assert_eq!(messages[0]["player"], "A");
            assert_eq!(messages[0]["message"], "Insufficient funds: need $2, have $1");
        }
        let game = room.game().unwrap();
        assert_eq!(game.player("A").unwrap().cash, 1);
        assert!(game.pending_action().is_some());
        assert_eq!(game.board().property(2).unwrap().owner(), None);
    }

    #[test]
    fn test_end_turn_broadcasts_to_everyone() {
        let mut room = room();
        let (a_id, mut a) = join(&mut room, "A", 1);
        let (_, mut b) = join(&mut room, "B", 2);
        room.intent("A", a_id, Intent::StartGame);
        drain(&mut a);
        drain(&mut b);

        room.intent("A", a_id, Intent::EndTurn);
        let ended = drain(&mut b).pop().unwrap();
        assert_eq!(ended["type"], "turn_ended");
        assert_eq!(ended["current_player"], "B");
        assert_eq!(drain(&mut a).pop().unwrap()["type"], "turn_ended");
    }

    #[test]
    fn test_disconnected_players_turn_is_skipped() {
        let mut room = room();
        let (a_id, mut a) = join(&mut room, "A", 1);
        let (b_id, _b) = join(&mut room, "B", 2);
        let (_, _c) = join(&mut room, "C", 3);
        room.intent("A", a_id, Intent::StartGame);

        room.disconnect("B", b_id, "closed");
        drain(&mut a);
        room.intent("A", a_id, Intent::EndTurn);

        let messages = drain(&mut a);
        assert_eq!(types(&messages), vec!["turn_ended", "turn_ended"]);
        assert_eq!(messages[1]["player"], "B");
        assert_eq!(room.game().unwrap().current_player().name(), "C");
    }

    #[test]
    fn test_kick_and_reset() {
        let mut room = room();
        let (_, mut a) = join(&mut room, "A", 1);
        let (_, mut b) = join(&mut room, "B", 2);
        drain(&mut a);

        assert!(room.kick("A"));
        assert!(!room.kick("A"));
        assert_eq!(
            a.try_recv().unwrap(),
            Outbound::Close { code: 4003, reason: "kicked by administrator".to_string() }
        );
        assert_eq!(room.status().host.as_deref(), Some("B"));

        drain(&mut b);
        assert_eq!(room.reset(), 1);
        assert_eq!(
            b.try_recv().unwrap(),
            Outbound::Close { code: 4004, reason: "room reset by administrator".to_string() }
        );
        assert_eq!(room.status().total_connections, 0);

        let report = room.connections();
        assert!(report.statistics.total_events > 0);
        assert!(report
            .connection_history
            .iter()
            .any(|event| event.kind == ConnectionEventKind::Kicked));
    }
}
